//! Interval and quantile scoring.
//!
//! Pure functions over ground truth and predictions: empirical coverage
//! (with a Wilson score band, since raw coverage on a finite test set is a
//! noisy estimator), average width, pinball loss, and calibration-curve
//! points. Coverage and width are only meaningful together, so the composite
//! [`IntervalMetrics`] always reports both.
//!
//! Every function takes an optional row mask so that slice analysis can
//! restrict scoring to a subset without recomputing any predictions. An
//! empty selection yields `NaN`, never a panic.
use crate::data::Interval;
use crate::ensemble::QuantilePredictions;
use serde::{Deserialize, Serialize};

/// Two-sided 95% normal quantile used for coverage bands.
pub const WILSON_Z: f64 = 1.959963984540054;

#[inline]
fn masked<'a>(mask: Option<&'a [bool]>, i: usize) -> bool {
    mask.map_or(true, |m| m[i])
}

/// Empirical coverage: the fraction of rows whose target falls inside the
/// interval. `NaN` when the mask selects no rows.
pub fn empirical_coverage(y: &[f64], intervals: &[Interval], mask: Option<&[bool]>) -> f64 {
    let mut hits = 0usize;
    let mut n = 0usize;
    for (i, (y_, iv)) in y.iter().zip(intervals).enumerate() {
        if masked(mask, i) {
            n += 1;
            if iv.contains(*y_) {
                hits += 1;
            }
        }
    }
    if n == 0 {
        return f64::NAN;
    }
    hits as f64 / n as f64
}

/// Wilson score band for a binomial proportion.
///
/// * `hits` - Number of successes.
/// * `n` - Number of trials.
/// * `z` - Two-sided normal quantile, e.g. [`WILSON_Z`].
pub fn wilson_band(hits: usize, n: usize, z: f64) -> (f64, f64) {
    if n == 0 {
        return (f64::NAN, f64::NAN);
    }
    let n_ = n as f64;
    let p = hits as f64 / n_;
    let z2 = z * z;
    let denom = 1.0 + z2 / n_;
    let center = (p + z2 / (2.0 * n_)) / denom;
    let half = z / denom * (p * (1.0 - p) / n_ + z2 / (4.0 * n_ * n_)).sqrt();
    (center - half, center + half)
}

/// Mean interval width, the sharpness measure. `NaN` on an empty selection.
pub fn mean_width(intervals: &[Interval], mask: Option<&[bool]>) -> f64 {
    let mut total = 0.0;
    let mut n = 0usize;
    for (i, iv) in intervals.iter().enumerate() {
        if masked(mask, i) {
            total += iv.width();
            n += 1;
        }
    }
    if n == 0 {
        return f64::NAN;
    }
    total / n as f64
}

/// Mean absolute error of a point forecast. `NaN` on an empty selection.
pub fn mae(y: &[f64], yhat: &[f64], mask: Option<&[bool]>) -> f64 {
    let mut total = 0.0;
    let mut n = 0usize;
    for (i, (y_, p)) in y.iter().zip(yhat).enumerate() {
        if masked(mask, i) {
            total += (y_ - p).abs();
            n += 1;
        }
    }
    if n == 0 {
        return f64::NAN;
    }
    total / n as f64
}

/// Root mean squared error of a point forecast. `NaN` on an empty selection.
pub fn rmse(y: &[f64], yhat: &[f64], mask: Option<&[bool]>) -> f64 {
    let mut total = 0.0;
    let mut n = 0usize;
    for (i, (y_, p)) in y.iter().zip(yhat).enumerate() {
        if masked(mask, i) {
            total += (y_ - p) * (y_ - p);
            n += 1;
        }
    }
    if n == 0 {
        return f64::NAN;
    }
    (total / n as f64).sqrt()
}

/// Mean pinball loss of one quantile prediction vector at level `q`.
pub fn pinball_loss(y: &[f64], yhat: &[f64], q: f64, mask: Option<&[bool]>) -> f64 {
    let mut total = 0.0;
    let mut n = 0usize;
    for (i, (y_, p)) in y.iter().zip(yhat).enumerate() {
        if masked(mask, i) {
            let s = y_ - p;
            total += if s >= 0.0 { q * s } else { (q - 1.0) * s };
            n += 1;
        }
    }
    if n == 0 {
        return f64::NAN;
    }
    total / n as f64
}

/// One point of a calibration curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    /// Nominal quantile level.
    pub nominal: f64,
    /// Empirical CDF: fraction of targets at or below the prediction.
    pub empirical: f64,
}

/// Composite interval metrics; coverage and width always travel together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalMetrics {
    /// Empirical coverage on the selected rows.
    pub coverage: f64,
    /// Wilson band around the coverage estimate.
    pub coverage_lower: f64,
    pub coverage_upper: f64,
    /// Mean interval width (sharpness).
    pub mean_width: f64,
    /// Pinball loss averaged over the scored quantile levels.
    pub pinball: f64,
    /// Calibration-curve points, one per scored quantile level.
    pub calibration_curve: Vec<CalibrationPoint>,
    /// Number of rows scored.
    pub n: usize,
}

/// What a method under evaluation produced on the test split.
///
/// Interval-only methods (split conformal) score pinball and calibration on
/// their two implied quantile levels, `(1 - coverage) / 2` and its mirror;
/// methods with a full quantile surface score every trained level.
pub struct MethodOutput {
    pub name: String,
    pub coverage_target: f64,
    pub intervals: Vec<Interval>,
    pub quantiles: Option<QuantilePredictions>,
}

impl MethodOutput {
    /// Wrap a plain interval sequence.
    pub fn from_intervals(name: &str, coverage_target: f64, intervals: Vec<Interval>) -> Self {
        MethodOutput {
            name: name.to_string(),
            coverage_target,
            intervals,
            quantiles: None,
        }
    }

    /// Wrap a quantile surface, extracting the interval at the target
    /// coverage from its levels.
    pub fn from_quantiles(
        name: &str,
        coverage_target: f64,
        quantiles: QuantilePredictions,
    ) -> Result<Self, crate::errors::ConformaError> {
        let intervals = quantiles.interval(coverage_target)?;
        Ok(MethodOutput {
            name: name.to_string(),
            coverage_target,
            intervals,
            quantiles: Some(quantiles),
        })
    }
}

/// Score one method on (a masked subset of) the test split.
pub fn evaluate(output: &MethodOutput, y: &[f64], mask: Option<&[bool]>) -> IntervalMetrics {
    let coverage = empirical_coverage(y, &output.intervals, mask);
    let n = match mask {
        Some(m) => m.iter().filter(|&&b| b).count(),
        None => y.len(),
    };
    let hits = if coverage.is_nan() {
        0
    } else {
        (coverage * n as f64).round() as usize
    };
    let (coverage_lower, coverage_upper) = if n == 0 {
        (f64::NAN, f64::NAN)
    } else {
        wilson_band(hits, n, WILSON_Z)
    };

    let (pinball, calibration_curve) = match &output.quantiles {
        Some(quantiles) => {
            let mut total = 0.0;
            let mut curve = Vec::with_capacity(quantiles.levels().len());
            for &q in quantiles.levels() {
                // The level is trained, so the lookup cannot fail.
                let preds = quantiles.level_slice(q).unwrap_or_default();
                total += pinball_loss(y, &preds, q, mask);
                curve.push(CalibrationPoint {
                    nominal: q,
                    empirical: empirical_cdf(y, &preds, mask),
                });
            }
            (total / quantiles.levels().len() as f64, curve)
        }
        None => {
            // Interval bounds are implicit quantile predictions at the two
            // tail levels of the target coverage.
            let q_lo = (1.0 - output.coverage_target) / 2.0;
            let q_hi = 1.0 - q_lo;
            let lowers: Vec<f64> = output.intervals.iter().map(|iv| iv.lower).collect();
            let uppers: Vec<f64> = output.intervals.iter().map(|iv| iv.upper).collect();
            let pinball = 0.5
                * (pinball_loss(y, &lowers, q_lo, mask) + pinball_loss(y, &uppers, q_hi, mask));
            let curve = vec![
                CalibrationPoint {
                    nominal: q_lo,
                    empirical: empirical_cdf(y, &lowers, mask),
                },
                CalibrationPoint {
                    nominal: q_hi,
                    empirical: empirical_cdf(y, &uppers, mask),
                },
            ];
            (pinball, curve)
        }
    };

    IntervalMetrics {
        coverage,
        coverage_lower,
        coverage_upper,
        mean_width: mean_width(&output.intervals, mask),
        pinball,
        calibration_curve,
        n,
    }
}

/// Fraction of targets at or below the quantile prediction; `NaN` on an
/// empty selection. A well-calibrated level-q prediction lands near q.
pub fn empirical_cdf(y: &[f64], yhat: &[f64], mask: Option<&[bool]>) -> f64 {
    let mut below = 0usize;
    let mut n = 0usize;
    for (i, (y_, p)) in y.iter().zip(yhat).enumerate() {
        if masked(mask, i) {
            n += 1;
            if *y_ <= *p {
                below += 1;
            }
        }
    }
    if n == 0 {
        return f64::NAN;
    }
    below as f64 / n as f64
}
