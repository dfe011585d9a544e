//! Conditional evaluation over named subsets of the test period.
//!
//! A slice is a named boolean mask over a test view, built once from a
//! predicate and then used read-only. Slices matching zero rows are an
//! expected, interesting case (sparse extreme-event subsets), so they yield
//! `NaN` metrics and a warning flag instead of an error, and never abort the
//! evaluation of their siblings.
use crate::data::{DatasetView, Observation};
use crate::errors::ConformaError;
use crate::evaluator::{evaluate, IntervalMetrics, MethodOutput};
use crate::report::{EvaluationReport, IntervalSeries, MethodReport, SliceMetrics};
use crate::utils::empirical_quantile;
use chrono::Timelike;
use hashbrown::HashMap;
use log::warn;
use rayon::prelude::*;

/// A named, precomputed row mask over one test view.
pub struct Slice {
    name: String,
    mask: Vec<bool>,
}

impl Slice {
    /// Build a slice by evaluating a predicate on every observation.
    pub fn from_predicate<F>(name: &str, view: &DatasetView, predicate: F) -> Self
    where
        F: Fn(&Observation) -> bool,
    {
        let mask = (0..view.rows())
            .map(|i| predicate(&view.observation(i)))
            .collect();
        Slice {
            name: name.to_string(),
            mask,
        }
    }

    /// Rows whose target exceeds the view's own `q`-th target quantile --
    /// the "extreme demand" slice.
    pub fn extreme_target(name: &str, view: &DatasetView, q: f64) -> Result<Self, ConformaError> {
        if !(q > 0.0 && q < 1.0) {
            return Err(ConformaError::InvalidParameter(
                "q".to_string(),
                "a quantile level in (0, 1)".to_string(),
                format!("{}", q),
            ));
        }
        let threshold = empirical_quantile(view.targets(), q);
        let mask = view.targets().iter().map(|y| *y > threshold).collect();
        Ok(Slice {
            name: name.to_string(),
            mask,
        })
    }

    /// Rows whose hour of day lies in `[start_hour, end_hour)`. Wraps past
    /// midnight when `start_hour > end_hour`.
    pub fn hour_range(name: &str, view: &DatasetView, start_hour: u32, end_hour: u32) -> Self {
        let mask = view
            .timestamps()
            .iter()
            .map(|t| {
                let h = t.hour();
                if start_hour <= end_hour {
                    h >= start_hour && h < end_hour
                } else {
                    h >= start_hour || h < end_hour
                }
            })
            .collect();
        Slice {
            name: name.to_string(),
            mask,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// Number of rows the slice selects.
    pub fn matched(&self) -> usize {
        self.mask.iter().filter(|&&b| b).count()
    }
}

/// Re-runs the interval evaluator restricted to each named slice.
pub struct SliceAnalyzer {
    slices: Vec<Slice>,
}

impl SliceAnalyzer {
    pub fn new(slices: Vec<Slice>) -> Self {
        SliceAnalyzer { slices }
    }

    /// Score every method overall and on every slice.
    ///
    /// Slices are pure reads over immutable predictions, so all (method,
    /// slice) cells evaluate in parallel.
    ///
    /// * `test` - The test view the method outputs are aligned to.
    /// * `methods` - One output bundle per interval-producing method.
    pub fn analyze(&self, test: &DatasetView, methods: &[MethodOutput]) -> EvaluationReport {
        let y = test.targets();
        let mut report = EvaluationReport::new(test.horizon());

        for output in methods {
            let overall = evaluate(output, y, None);

            let slice_metrics: Vec<(String, SliceMetrics)> = self
                .slices
                .par_iter()
                .map(|slice| {
                    let matched = slice.matched();
                    let empty = matched == 0;
                    let metrics: IntervalMetrics = evaluate(output, y, Some(slice.mask()));
                    if empty {
                        warn!(
                            "slice '{}' matched no rows for method '{}', reporting NaN metrics",
                            slice.name, output.name
                        );
                    }
                    (
                        slice.name.clone(),
                        SliceMetrics {
                            metrics,
                            matched,
                            empty,
                        },
                    )
                })
                .collect();

            let mut slices = HashMap::new();
            for (name, metrics) in slice_metrics {
                slices.insert(name, metrics);
            }

            report.methods.insert(
                output.name.clone(),
                MethodReport {
                    coverage_target: output.coverage_target,
                    overall,
                    slices,
                    series: IntervalSeries {
                        timestamps: test.timestamps().to_vec(),
                        intervals: output.intervals.clone(),
                    },
                },
            );
        }

        report
    }
}
