//! Quantile ensembles.
//!
//! One pinball-loss regressor per requested quantile level, trained
//! independently (and concurrently, no shared state) and queried jointly.
//! Independently trained quantile models can cross; the ensemble repairs
//! every returned row by rearrangement and counts how often it had to, since
//! a high crossing rate is a model-misspecification signal worth surfacing.
use crate::data::{DatasetView, Interval};
use crate::errors::ConformaError;
use crate::model::{ModelFactory, PointModel};
use crate::objective::Objective;
use crate::utils::{validate_coverage, validate_levels};
use log::warn;
use rayon::prelude::*;

/// A set of per-quantile regressors behind one joint prediction call.
pub struct QuantileEnsemble {
    levels: Vec<f64>,
    models: Vec<Box<dyn PointModel>>,
    failed_levels: Vec<f64>,
}

impl QuantileEnsemble {
    /// Train one quantile regressor per level.
    ///
    /// Levels that fail to train are logged and excluded rather than failing
    /// the whole ensemble; fitting only errors when no level survives.
    ///
    /// * `factory` - Builds a cold model for each quantile objective.
    /// * `train` - Training split.
    /// * `levels` - Quantile levels, strictly ascending, all in (0, 1).
    pub fn fit(
        factory: &dyn ModelFactory,
        train: &DatasetView,
        levels: &[f64],
    ) -> Result<Self, ConformaError> {
        validate_levels(levels)?;
        let y = train.targets();

        let outcomes: Vec<(f64, Result<Box<dyn PointModel>, ConformaError>)> = levels
            .par_iter()
            .map(|&q| {
                let mut model = factory.build(Objective::QuantileLoss { quantile: q });
                let outcome = model.fit(train, y).map(|_| model);
                (q, outcome)
            })
            .collect();

        let mut fitted_levels = Vec::with_capacity(levels.len());
        let mut models = Vec::with_capacity(levels.len());
        let mut failed_levels = Vec::new();
        let mut first_error = None;
        for (q, outcome) in outcomes {
            match outcome {
                Ok(model) => {
                    fitted_levels.push(q);
                    models.push(model);
                }
                Err(e) => {
                    warn!("quantile level {} failed to train and is excluded: {}", q, e);
                    failed_levels.push(q);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if models.is_empty() {
            // Nothing survived, so partial results are not an option.
            return Err(first_error.unwrap_or_else(|| {
                ConformaError::InvalidParameter(
                    "levels".to_string(),
                    "at least one trainable quantile level".to_string(),
                    "none".to_string(),
                )
            }));
        }

        Ok(QuantileEnsemble {
            levels: fitted_levels,
            models,
            failed_levels,
        })
    }

    /// Quantile levels that trained successfully, ascending.
    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    /// Quantile levels that failed to train and were excluded.
    pub fn failed_levels(&self) -> &[f64] {
        &self.failed_levels
    }

    /// Predict all quantile levels jointly, one value per level per row.
    ///
    /// Per-row monotonicity in the level is enforced by sorting; the number
    /// of rows that needed the correction is carried on the result.
    pub fn predict(&self, x: &DatasetView) -> Result<QuantilePredictions, ConformaError> {
        let per_model: Vec<Vec<f64>> = self
            .models
            .par_iter()
            .map(|model| model.predict(x))
            .collect::<Result<_, _>>()?;

        let rows = x.rows();
        let k = self.levels.len();
        let mut values = vec![0.0; rows * k];
        for (c, preds) in per_model.iter().enumerate() {
            for (i, v) in preds.iter().enumerate() {
                values[i * k + c] = *v;
            }
        }

        let mut crossing_corrected = 0;
        for i in 0..rows {
            let row = &mut values[i * k..(i + 1) * k];
            if row.windows(2).any(|w| w[0] > w[1]) {
                row.sort_by(|a, b| a.total_cmp(b));
                crossing_corrected += 1;
            }
        }
        if crossing_corrected > 0 {
            warn!(
                "quantile crossing corrected on {} of {} rows",
                crossing_corrected, rows
            );
        }

        Ok(QuantilePredictions {
            levels: self.levels.clone(),
            values,
            rows,
            crossing_corrected,
        })
    }
}

/// Joint quantile predictions for a block of rows, monotone per row.
pub struct QuantilePredictions {
    levels: Vec<f64>,
    /// Row-major, `rows * levels.len()` long.
    values: Vec<f64>,
    rows: usize,
    crossing_corrected: usize,
}

impl QuantilePredictions {
    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of rows whose raw predictions crossed and were rearranged.
    pub fn crossing_corrected(&self) -> usize {
        self.crossing_corrected
    }

    /// All level predictions for one row, ascending in the level.
    pub fn row(&self, i: usize) -> &[f64] {
        let k = self.levels.len();
        &self.values[i * k..(i + 1) * k]
    }

    fn level_index(&self, q: f64) -> Result<usize, ConformaError> {
        self.levels
            .iter()
            .position(|l| (l - q).abs() < 1e-9)
            .ok_or_else(|| {
                ConformaError::InvalidParameter(
                    "level".to_string(),
                    format!("one of the trained quantile levels {:?}", self.levels),
                    format!("{}", q),
                )
            })
    }

    /// Predictions for a single quantile level across all rows.
    pub fn level_slice(&self, q: f64) -> Result<Vec<f64>, ConformaError> {
        let c = self.level_index(q)?;
        let k = self.levels.len();
        Ok((0..self.rows).map(|i| self.values[i * k + c]).collect())
    }

    /// Two-sided intervals at the given coverage, taken from the
    /// `(1 - coverage) / 2` and `1 - (1 - coverage) / 2` levels.
    /// Both levels must have been trained.
    pub fn interval(&self, coverage: f64) -> Result<Vec<Interval>, ConformaError> {
        validate_coverage(coverage)?;
        let lo_level = (1.0 - coverage) / 2.0;
        let lo = self.level_index(lo_level)?;
        let hi = self.level_index(1.0 - lo_level)?;
        let k = self.levels.len();
        Ok((0..self.rows)
            .map(|i| Interval::new(self.values[i * k + lo], self.values[i * k + hi]))
            .collect())
    }
}
