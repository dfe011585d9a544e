//! Chronological data splitting.
//!
//! Every coverage guarantee downstream assumes the train / calibration / test
//! splits are ordered in time with no leakage:
//! `max(t(train)) < min(t(calibration)) < min(t(test))`. The splitter is the
//! only component allowed to cut a dataset, and it refuses any configuration
//! that would break the invariant or produce an empty split.
use crate::data::{Dataset, DatasetView};
use crate::errors::ConformaError;
use chrono::{DateTime, Utc};

/// How to cut the dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SplitSpec {
    /// Fractions of the row count, in chronological order. Each must be
    /// positive and the sum must not exceed 1; any remainder at the end of
    /// the range is left unused.
    Fractions { train: f64, calibration: f64, test: f64 },
    /// Explicit boundary instants: train covers `(.., train_end]`,
    /// calibration `(train_end, calibration_end]`, test the rest.
    Cutoffs {
        train_end: DateTime<Utc>,
        calibration_end: DateTime<Utc>,
    },
}

/// The three chronologically ordered, disjoint splits.
#[derive(Clone, Copy)]
pub struct SplitSet<'a> {
    pub train: DatasetView<'a>,
    pub calibration: DatasetView<'a>,
    pub test: DatasetView<'a>,
}

/// Cuts a dataset into train / calibration / test views.
pub struct ChronoSplitter {
    spec: SplitSpec,
}

impl ChronoSplitter {
    pub fn new(spec: SplitSpec) -> Self {
        ChronoSplitter { spec }
    }

    /// Split the dataset, validating the configuration against its range.
    pub fn split<'a>(&self, data: &'a Dataset) -> Result<SplitSet<'a>, ConformaError> {
        let view = data.view();
        let rows = view.rows();
        let (n_train, n_calibration, n_test) = match self.spec {
            SplitSpec::Fractions { train, calibration, test } => {
                for (name, f) in [("train", train), ("calibration", calibration), ("test", test)] {
                    if f <= 0.0 {
                        return Err(ConformaError::InvalidSplit(format!(
                            "the {} fraction must be positive, got {}",
                            name, f
                        )));
                    }
                }
                let sum = train + calibration + test;
                if sum > 1.0 + 1e-12 {
                    return Err(ConformaError::InvalidSplit(format!(
                        "fractions must sum to at most 1, got {}",
                        sum
                    )));
                }
                // The epsilon keeps 100 * 0.6 = 59.999... from flooring to 59.
                let count = |f: f64| (rows as f64 * f + 1e-9).floor() as usize;
                let n_train = count(train);
                let n_calibration = count(calibration);
                // When the fractions exhaust the range, the test split takes
                // every remaining row rather than dropping a flooring residue.
                let n_test = if (sum - 1.0).abs() < 1e-12 {
                    rows - n_train - n_calibration
                } else {
                    count(test).min(rows - n_train - n_calibration)
                };
                (n_train, n_calibration, n_test)
            }
            SplitSpec::Cutoffs { train_end, calibration_end } => {
                if train_end >= calibration_end {
                    return Err(ConformaError::InvalidSplit(format!(
                        "train_end {} must precede calibration_end {}",
                        train_end, calibration_end
                    )));
                }
                let ts = view.timestamps();
                let first = ts[0];
                let last = ts[rows - 1];
                if train_end < first || calibration_end >= last {
                    return Err(ConformaError::InvalidSplit(format!(
                        "cutoffs ({}, {}) fall outside the data range [{}, {}]",
                        train_end, calibration_end, first, last
                    )));
                }
                let n_train = ts.partition_point(|t| *t <= train_end);
                let n_calibration = ts.partition_point(|t| *t <= calibration_end) - n_train;
                (n_train, n_calibration, rows - n_train - n_calibration)
            }
        };

        if n_train == 0 || n_calibration == 0 || n_test == 0 {
            return Err(ConformaError::InvalidSplit(format!(
                "every split must be non-empty, got train={}, calibration={}, test={}",
                n_train, n_calibration, n_test
            )));
        }

        Ok(SplitSet {
            train: view.slice(0, n_train),
            calibration: view.slice(n_train, n_train + n_calibration),
            test: view.slice(n_train + n_calibration, n_train + n_calibration + n_test),
        })
    }
}

/// Rolling-origin evaluation: repeatedly advance the split boundary through
/// the dataset and emit one [`SplitSet`] per fold.
///
/// * `data` - The full dataset.
/// * `train_min` - Rows in the first fold's train split; later folds grow it.
/// * `calibration` - Rows in every calibration split.
/// * `test` - Rows in every test split.
/// * `step` - Rows the boundary advances between folds.
pub fn rolling_origin(
    data: &Dataset,
    train_min: usize,
    calibration: usize,
    test: usize,
    step: usize,
) -> Result<Vec<SplitSet<'_>>, ConformaError> {
    if train_min == 0 || calibration == 0 || test == 0 || step == 0 {
        return Err(ConformaError::InvalidSplit(
            "rolling-origin window sizes and step must all be positive".to_string(),
        ));
    }
    let view = data.view();
    let rows = view.rows();
    if train_min + calibration + test > rows {
        return Err(ConformaError::InvalidSplit(format!(
            "rolling-origin windows need {} rows but the dataset has {}",
            train_min + calibration + test,
            rows
        )));
    }

    let mut folds = Vec::new();
    let mut boundary = train_min;
    while boundary + calibration + test <= rows {
        folds.push(SplitSet {
            train: view.slice(0, boundary),
            calibration: view.slice(boundary, boundary + calibration),
            test: view.slice(boundary + calibration, boundary + calibration + test),
        });
        boundary += step;
    }
    Ok(folds)
}
