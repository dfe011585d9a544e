//! Split conformal prediction.
//!
//! Wraps a single point model and a held-out calibration split to produce
//! prediction intervals with a distribution-free, finite-sample coverage
//! guarantee. The guarantee requires residuals from data the model never
//! trained on (the splitter's job) and the finite-sample-corrected rank
//! `ceil((n + 1) * coverage)` rather than the naive empirical quantile
//! (enforced here).
use crate::data::{DatasetView, Interval};
use crate::errors::ConformaError;
use crate::model::PointModel;
use crate::utils::{finite_sample_rank, validate_coverage};

/// Per-row interval offsets below and above the point prediction.
///
/// The default fitted width is a single global pair; locally-weighted or
/// otherwise adaptive conformal variants substitute their own implementation
/// without the interval-consuming side changing.
pub trait WidthFunction: Send + Sync {
    /// `(below, above)` offsets for one row of `x`.
    fn offsets(&self, x: &DatasetView, row: usize) -> (f64, f64);
}

/// One offset pair shared by every row, the plain split-conformal width.
pub struct GlobalWidth {
    pub below: f64,
    pub above: f64,
}

impl WidthFunction for GlobalWidth {
    fn offsets(&self, _x: &DatasetView, _row: usize) -> (f64, f64) {
        (self.below, self.above)
    }
}

/// How calibration residuals are scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResidualMode {
    /// One absolute-residual quantile, the same offset on both sides.
    Symmetric,
    /// Separate signed-residual quantiles below and above, for models with
    /// asymmetric error distributions.
    Asymmetric,
}

struct FittedCalibration {
    model: Box<dyn PointModel>,
    width: Box<dyn WidthFunction>,
    /// The calibrated global offsets, kept alongside `width` for reporting.
    base_offsets: (f64, f64),
    /// Sorted nonconformity scores, kept for diagnostics; immutable.
    residuals: Vec<f64>,
}

/// A split conformal calibrator: `Untrained -> Fitted`, never back.
///
/// A fitted calibrator is immutable; recalibrating means constructing a new
/// instance, which keeps concurrent evaluation free of synchronization.
pub struct ConformalCalibrator {
    target_coverage: f64,
    mode: ResidualMode,
    fitted: Option<FittedCalibration>,
}

impl ConformalCalibrator {
    /// * `target_coverage` - Interval coverage level in (0, 1), e.g. 0.9.
    pub fn new(target_coverage: f64) -> Result<Self, ConformaError> {
        validate_coverage(target_coverage)?;
        Ok(ConformalCalibrator {
            target_coverage,
            mode: ResidualMode::Symmetric,
            fitted: None,
        })
    }

    pub fn set_mode(mut self, mode: ResidualMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn target_coverage(&self) -> f64 {
        self.target_coverage
    }

    pub fn is_fit(&self) -> bool {
        self.fitted.is_some()
    }

    /// Sorted calibration scores of a fitted calibrator.
    pub fn residuals(&self) -> Option<&[f64]> {
        self.fitted.as_ref().map(|f| f.residuals.as_slice())
    }

    /// The calibrated global `(below, above)` offsets of a fitted calibrator.
    pub fn half_width(&self) -> Option<(f64, f64)> {
        self.fitted.as_ref().map(|f| f.base_offsets)
    }

    /// Train the model on the training split, then calibrate on the held-out
    /// calibration split.
    ///
    /// * `model` - A cold model; fit here on `train`.
    /// * `train` - Training split.
    /// * `calibration` - Held-out calibration split, later in time.
    pub fn fit(
        &mut self,
        mut model: Box<dyn PointModel>,
        train: &DatasetView,
        calibration: &DatasetView,
    ) -> Result<(), ConformaError> {
        if self.fitted.is_some() {
            return Err(ConformaError::AlreadyFitted("ConformalCalibrator"));
        }
        model.fit(train, train.targets())?;
        self.calibrate(model, calibration)
    }

    /// Calibrate around a model that was already trained elsewhere.
    pub fn fit_pretrained(
        &mut self,
        model: Box<dyn PointModel>,
        calibration: &DatasetView,
    ) -> Result<(), ConformaError> {
        if self.fitted.is_some() {
            return Err(ConformaError::AlreadyFitted("ConformalCalibrator"));
        }
        self.calibrate(model, calibration)
    }

    fn calibrate(
        &mut self,
        model: Box<dyn PointModel>,
        calibration: &DatasetView,
    ) -> Result<(), ConformaError> {
        let n = calibration.rows();
        if n == 0 {
            return Err(ConformaError::InsufficientCalibrationData { n: 0, required: 1 });
        }
        let preds = model.predict(calibration)?;
        let y = calibration.targets();

        let (residuals, width) = match self.mode {
            ResidualMode::Symmetric => {
                let mut scores: Vec<f64> =
                    y.iter().zip(&preds).map(|(y_, p)| (y_ - p).abs()).collect();
                scores.sort_by(|a, b| a.total_cmp(b));
                let rank = finite_sample_rank(n, self.target_coverage)?;
                let w = scores[rank - 1];
                (scores, GlobalWidth { below: w, above: w })
            }
            ResidualMode::Asymmetric => {
                // Each side gets its own quantile at level (1 + coverage) / 2,
                // so the two miscoverage halves still sum to 1 - coverage.
                let side_level = (1.0 + self.target_coverage) / 2.0;
                let rank = finite_sample_rank(n, side_level)?;
                let mut above_scores: Vec<f64> =
                    y.iter().zip(&preds).map(|(y_, p)| y_ - p).collect();
                let mut below_scores: Vec<f64> = above_scores.iter().map(|s| -s).collect();
                above_scores.sort_by(|a, b| a.total_cmp(b));
                below_scores.sort_by(|a, b| a.total_cmp(b));
                let width = GlobalWidth {
                    below: below_scores[rank - 1],
                    above: above_scores[rank - 1],
                };
                (above_scores, width)
            }
        };

        self.fitted = Some(FittedCalibration {
            model,
            base_offsets: (width.below, width.above),
            width: Box::new(width),
            residuals,
        });
        Ok(())
    }

    /// Prediction intervals for every row of `x`, point prediction plus the
    /// calibrated offsets.
    pub fn predict_interval(&self, x: &DatasetView) -> Result<Vec<Interval>, ConformaError> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or(ConformaError::NotFitted("ConformalCalibrator"))?;
        let preds = fitted.model.predict(x)?;
        Ok(preds
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let (below, above) = fitted.width.offsets(x, i);
                Interval::new(p - below, p + above)
            })
            .collect())
    }

    /// Point predictions of the wrapped model, for point-accuracy reporting.
    pub fn predict_point(&self, x: &DatasetView) -> Result<Vec<f64>, ConformaError> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or(ConformaError::NotFitted("ConformalCalibrator"))?;
        fitted.model.predict(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;
    use chrono::{TimeZone, Utc};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn dataset(xs: Vec<f64>, ys: Vec<f64>) -> Dataset {
        let t0 = Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap();
        let timestamps = (0..ys.len() as i64).map(|h| t0 + chrono::Duration::hours(h)).collect();
        Dataset::new(timestamps, xs, 1, ys).unwrap()
    }

    /// Always predicts zero, so targets are their own residuals.
    struct ZeroModel {
        fitted: bool,
    }

    impl ZeroModel {
        fn fitted() -> Box<dyn PointModel> {
            Box::new(ZeroModel { fitted: true })
        }
    }

    impl PointModel for ZeroModel {
        fn fit(&mut self, _x: &DatasetView, _y: &[f64]) -> Result<(), ConformaError> {
            if self.fitted {
                return Err(ConformaError::AlreadyFitted("ZeroModel"));
            }
            self.fitted = true;
            Ok(())
        }
        fn predict(&self, x: &DatasetView) -> Result<Vec<f64>, ConformaError> {
            if !self.fitted {
                return Err(ConformaError::NotFitted("ZeroModel"));
            }
            Ok(vec![0.0; x.rows()])
        }
    }

    #[test]
    fn test_finite_sample_width() {
        // Residuals 1..=10 at coverage 0.9: rank ceil(11 * 0.9) = 10, w = 10.
        let ys: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        let cal = dataset(vec![0.0; 10], ys);
        let mut calibrator = ConformalCalibrator::new(0.9).unwrap();
        calibrator.fit_pretrained(ZeroModel::fitted(), &cal.view()).unwrap();

        let test = dataset(vec![0.0, 0.0], vec![5.0, -20.0]);
        let intervals = calibrator.predict_interval(&test.view()).unwrap();
        assert_eq!(intervals[0], Interval::new(-10.0, 10.0));
        assert!(intervals[0].contains(5.0));
        assert!(!intervals[1].contains(-20.0));
        assert_eq!(calibrator.half_width(), Some((10.0, 10.0)));
        assert_eq!(calibrator.residuals().unwrap().len(), 10);
    }

    #[test]
    fn test_insufficient_calibration_data() {
        // Coverage 0.95 needs at least 19 calibration rows.
        let cal = dataset(vec![0.0; 10], (1..=10).map(|i| i as f64).collect());
        let mut calibrator = ConformalCalibrator::new(0.95).unwrap();
        let err = calibrator
            .fit_pretrained(ZeroModel::fitted(), &cal.view())
            .unwrap_err();
        assert!(matches!(
            err,
            ConformaError::InsufficientCalibrationData { n: 10, required: 19 }
        ));
    }

    #[test]
    fn test_empty_calibration_split() {
        let d = dataset(vec![0.0; 10], (1..=10).map(|i| i as f64).collect());
        let empty = d.view().slice(0, 0);
        let mut calibrator = ConformalCalibrator::new(0.9).unwrap();
        assert!(matches!(
            calibrator.fit_pretrained(ZeroModel::fitted(), &empty),
            Err(ConformaError::InsufficientCalibrationData { n: 0, .. })
        ));
    }

    #[test]
    fn test_not_fitted_and_refit() {
        let d = dataset(vec![0.0, 0.0], vec![1.0, 2.0]);
        let calibrator = ConformalCalibrator::new(0.5).unwrap();
        assert!(matches!(
            calibrator.predict_interval(&d.view()),
            Err(ConformaError::NotFitted(_))
        ));

        let mut calibrator = ConformalCalibrator::new(0.5).unwrap();
        calibrator.fit_pretrained(ZeroModel::fitted(), &d.view()).unwrap();
        assert!(matches!(
            calibrator.fit_pretrained(ZeroModel::fitted(), &d.view()),
            Err(ConformaError::AlreadyFitted(_))
        ));
    }

    #[test]
    fn test_predict_interval_idempotent() {
        let cal = dataset(vec![0.0; 10], (1..=10).map(|i| i as f64).collect());
        let mut calibrator = ConformalCalibrator::new(0.8).unwrap();
        calibrator.fit_pretrained(ZeroModel::fitted(), &cal.view()).unwrap();
        let test = dataset(vec![0.0; 5], vec![1., 2., 3., 4., 5.]);
        let first = calibrator.predict_interval(&test.view()).unwrap();
        let second = calibrator.predict_interval(&test.view()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_asymmetric_offsets() {
        // Model under-predicts by 1..=9: all signed residuals positive.
        let ys: Vec<f64> = (1..=9).map(|i| i as f64).collect();
        let cal = dataset(vec![0.0; 9], ys);
        let mut calibrator = ConformalCalibrator::new(0.6).unwrap().set_mode(ResidualMode::Asymmetric);
        calibrator.fit_pretrained(ZeroModel::fitted(), &cal.view()).unwrap();

        let test = dataset(vec![0.0], vec![5.0]);
        let intervals = calibrator.predict_interval(&test.view()).unwrap();
        // Side level (1 + 0.6) / 2 = 0.8, rank ceil(10 * 0.8) = 8.
        // above = 8th smallest of [1..9] = 8; below = 8th smallest of
        // [-9..-1] = -2, which pulls the lower bound above the prediction.
        assert_eq!(intervals[0], Interval::new(2.0, 8.0));
    }

    #[test]
    fn test_coverage_convergence() {
        // Average empirical coverage over many independent calibration draws
        // stays at or above the target, per the finite-sample guarantee.
        let mut rng = StdRng::seed_from_u64(7);
        let n_cal = 100;
        let n_test = 200;
        let draws = 200;
        let mut total_coverage = 0.0;
        for _ in 0..draws {
            let cal_y: Vec<f64> = (0..n_cal).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let cal = dataset(vec![0.0; n_cal], cal_y);
            let mut calibrator = ConformalCalibrator::new(0.9).unwrap();
            calibrator.fit_pretrained(ZeroModel::fitted(), &cal.view()).unwrap();

            let test_y: Vec<f64> = (0..n_test).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let test = dataset(vec![0.0; n_test], test_y);
            let intervals = calibrator.predict_interval(&test.view()).unwrap();
            let covered = intervals
                .iter()
                .zip(test.view().targets())
                .filter(|(iv, y)| iv.contains(**y))
                .count();
            total_coverage += covered as f64 / n_test as f64;
        }
        let mean_coverage = total_coverage / draws as f64;
        // The guarantee is >= 0.9 in expectation (the exact mean here is
        // 91/101); the assertion leaves room for sampling noise only.
        assert!(
            mean_coverage >= 0.885,
            "mean coverage {} fell below the 0.9 target",
            mean_coverage
        );
    }
}
