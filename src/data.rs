//! Data containers for feature-engineered time series.
//!
//! The crate operates on a [`Dataset`]: a chronologically ordered block of
//! `(timestamp, feature_vector, target)` rows produced by an upstream
//! feature-engineering step. Features are stored column major so that any
//! contiguous row range exposes each feature as a contiguous slice, which is
//! what chronological splits are: borrowed, immutable row-range views.
use crate::errors::ConformaError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single row of a dataset, materialized for predicate evaluation.
#[derive(Debug, Clone)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub features: Vec<f64>,
    pub target: f64,
}

/// An owned, immutable, chronologically ordered dataset.
///
/// Construction validates shape and ordering once, after which the data is
/// never mutated. Each dataset is specific to one forecast horizon: features
/// at time `t` must only use information available at or before `t`, which is
/// the responsibility of the upstream feature engineering.
pub struct Dataset {
    timestamps: Vec<DateTime<Utc>>,
    /// Feature values in column-major order, `rows * cols` long.
    features: Vec<f64>,
    targets: Vec<f64>,
    rows: usize,
    cols: usize,
    horizon: usize,
}

impl Dataset {
    /// Create a new dataset.
    ///
    /// * `timestamps` - One instant per row, strictly increasing.
    /// * `features` - Feature values in column-major order, `rows * cols` long.
    /// * `cols` - Number of feature columns.
    /// * `targets` - One target value per row.
    pub fn new(
        timestamps: Vec<DateTime<Utc>>,
        features: Vec<f64>,
        cols: usize,
        targets: Vec<f64>,
    ) -> Result<Self, ConformaError> {
        let rows = timestamps.len();
        if rows == 0 {
            return Err(ConformaError::InvalidParameter(
                "timestamps".to_string(),
                "at least one observation".to_string(),
                "an empty dataset".to_string(),
            ));
        }
        if targets.len() != rows {
            return Err(ConformaError::InvalidParameter(
                "targets".to_string(),
                format!("{} values", rows),
                format!("{}", targets.len()),
            ));
        }
        if features.len() != rows * cols {
            return Err(ConformaError::InvalidParameter(
                "features".to_string(),
                format!("{} values ({} rows x {} cols)", rows * cols, rows, cols),
                format!("{}", features.len()),
            ));
        }
        if timestamps.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConformaError::InvalidParameter(
                "timestamps".to_string(),
                "strictly increasing timestamps without duplicates".to_string(),
                "an unordered or duplicated sequence".to_string(),
            ));
        }
        Ok(Dataset {
            timestamps,
            features,
            targets,
            rows,
            cols,
            horizon: 1,
        })
    }

    /// Tag the dataset with the forecast horizon it was engineered for.
    ///
    /// * `horizon` - Number of steps ahead, H >= 1.
    pub fn with_horizon(mut self, horizon: usize) -> Result<Self, ConformaError> {
        if horizon == 0 {
            return Err(ConformaError::InvalidParameter(
                "horizon".to_string(),
                "an integer >= 1".to_string(),
                "0".to_string(),
            ));
        }
        self.horizon = horizon;
        Ok(self)
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of feature columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// The forecast horizon this dataset was engineered for.
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// A view over the whole dataset.
    pub fn view(&self) -> DatasetView<'_> {
        DatasetView {
            data: self,
            start: 0,
            end: self.rows,
        }
    }
}

/// A borrowed, contiguous row range of a [`Dataset`].
///
/// Views are cheap to copy and immutable; chronological splits hand these out
/// rather than copying data.
#[derive(Clone, Copy)]
pub struct DatasetView<'a> {
    data: &'a Dataset,
    start: usize,
    end: usize,
}

impl<'a> DatasetView<'a> {
    /// Number of rows in the view.
    pub fn rows(&self) -> usize {
        self.end - self.start
    }

    /// Number of feature columns.
    pub fn cols(&self) -> usize {
        self.data.cols
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The forecast horizon of the underlying dataset.
    pub fn horizon(&self) -> usize {
        self.data.horizon
    }

    /// Get a single feature value.
    ///
    /// * `i` - Row within the view.
    /// * `j` - Feature column.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data.features[j * self.data.rows + self.start + i]
    }

    /// Get one feature column of the view as a contiguous slice.
    pub fn get_col(&self, col: usize) -> &'a [f64] {
        let base = col * self.data.rows;
        &self.data.features[base + self.start..base + self.end]
    }

    /// Target values of the view.
    pub fn targets(&self) -> &'a [f64] {
        &self.data.targets[self.start..self.end]
    }

    /// Timestamps of the view.
    pub fn timestamps(&self) -> &'a [DateTime<Utc>] {
        &self.data.timestamps[self.start..self.end]
    }

    /// Materialize one row for predicate evaluation.
    pub fn observation(&self, i: usize) -> Observation {
        let features = (0..self.data.cols).map(|j| self.get(i, j)).collect();
        Observation {
            timestamp: self.data.timestamps[self.start + i],
            features,
            target: self.data.targets[self.start + i],
        }
    }

    /// A sub-range of this view. Bounds are relative to the view.
    pub fn slice(&self, start: usize, end: usize) -> DatasetView<'a> {
        assert!(start <= end && self.start + end <= self.end);
        DatasetView {
            data: self.data,
            start: self.start + start,
            end: self.start + end,
        }
    }
}

/// A two-sided prediction interval with `lower <= upper`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
}

impl Interval {
    pub fn new(lower: f64, upper: f64) -> Self {
        debug_assert!(lower <= upper || lower.is_nan() || upper.is_nan());
        Interval { lower, upper }
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, y: f64) -> bool {
        self.lower <= y && y <= self.upper
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hours: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::hours(hours)
    }

    fn hourly(n: usize) -> Vec<DateTime<Utc>> {
        (0..n as i64).map(ts).collect()
    }

    #[test]
    fn test_dataset_validation() {
        // Shape mismatch in targets.
        assert!(Dataset::new(hourly(3), vec![0.0; 6], 2, vec![0.0; 2]).is_err());
        // Shape mismatch in features.
        assert!(Dataset::new(hourly(3), vec![0.0; 5], 2, vec![0.0; 3]).is_err());
        // Empty.
        assert!(Dataset::new(vec![], vec![], 0, vec![]).is_err());
        // Duplicate timestamp.
        let mut t = hourly(3);
        t[2] = t[1];
        assert!(Dataset::new(t, vec![0.0; 6], 2, vec![0.0; 3]).is_err());
        // Out of order.
        let mut t = hourly(3);
        t.swap(0, 1);
        assert!(Dataset::new(t, vec![0.0; 6], 2, vec![0.0; 3]).is_err());
        // Zero horizon.
        let d = Dataset::new(hourly(3), vec![0.0; 6], 2, vec![0.0; 3]).unwrap();
        assert!(d.with_horizon(0).is_err());
    }

    #[test]
    fn test_view_column_slices() {
        // Column major: col 0 = [1, 2, 3], col 1 = [4, 5, 6].
        let d = Dataset::new(hourly(3), vec![1., 2., 3., 4., 5., 6.], 2, vec![10., 20., 30.]).unwrap();
        let v = d.view();
        assert_eq!(v.get_col(0), &[1., 2., 3.]);
        assert_eq!(v.get_col(1), &[4., 5., 6.]);
        assert_eq!(v.get(1, 1), 5.0);

        let s = v.slice(1, 3);
        assert_eq!(s.rows(), 2);
        assert_eq!(s.get_col(0), &[2., 3.]);
        assert_eq!(s.get_col(1), &[5., 6.]);
        assert_eq!(s.targets(), &[20., 30.]);
        assert_eq!(s.timestamps()[0], ts(1));

        let o = s.observation(0);
        assert_eq!(o.features, vec![2., 5.]);
        assert_eq!(o.target, 20.0);
    }

    #[test]
    fn test_interval() {
        let i = Interval::new(1.0, 3.0);
        assert_eq!(i.width(), 2.0);
        assert!(i.contains(1.0));
        assert!(i.contains(3.0));
        assert!(!i.contains(3.1));
    }
}
