//! Structured evaluation output.
//!
//! The report is the crate's outbound interface: per-method interval series
//! aligned to test timestamps plus the full metric set overall and per
//! slice, all serializable for downstream tabulation or plotting.
use crate::data::Interval;
use crate::evaluator::IntervalMetrics;
use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use serde::Serialize;

/// An interval sequence aligned to test timestamps.
#[derive(Debug, Clone, Serialize)]
pub struct IntervalSeries {
    pub timestamps: Vec<DateTime<Utc>>,
    pub intervals: Vec<Interval>,
}

/// Metrics for one slice, with its match count and the empty-slice flag.
#[derive(Debug, Clone, Serialize)]
pub struct SliceMetrics {
    pub metrics: IntervalMetrics,
    /// Rows the slice matched.
    pub matched: usize,
    /// Set when the slice matched no rows; the metrics are then all NaN.
    pub empty: bool,
}

/// Everything reported about one interval-producing method.
#[derive(Debug, Clone, Serialize)]
pub struct MethodReport {
    pub coverage_target: f64,
    pub overall: IntervalMetrics,
    pub slices: HashMap<String, SliceMetrics>,
    pub series: IntervalSeries,
}

/// The full evaluation report: method name to its results.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    /// Forecast horizon of the evaluated dataset.
    pub horizon: usize,
    pub methods: HashMap<String, MethodReport>,
}

impl EvaluationReport {
    pub fn new(horizon: usize) -> Self {
        EvaluationReport {
            horizon,
            methods: HashMap::new(),
        }
    }

    /// Serialize the report to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::CalibrationPoint;
    use chrono::TimeZone;

    #[test]
    fn test_report_serializes() {
        let t0 = Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap();
        let mut report = EvaluationReport::new(24);
        report.methods.insert(
            "conformal".to_string(),
            MethodReport {
                coverage_target: 0.8,
                overall: IntervalMetrics {
                    coverage: 0.81,
                    coverage_lower: 0.78,
                    coverage_upper: 0.84,
                    mean_width: 120.5,
                    pinball: 14.2,
                    calibration_curve: vec![CalibrationPoint {
                        nominal: 0.1,
                        empirical: 0.11,
                    }],
                    n: 500,
                },
                slices: HashMap::new(),
                series: IntervalSeries {
                    timestamps: vec![t0],
                    intervals: vec![Interval::new(100.0, 220.0)],
                },
            },
        );
        let json = report.to_json().unwrap();
        assert!(json.contains("\"conformal\""));
        assert!(json.contains("\"horizon\": 24"));
        assert!(json.contains("\"coverage\": 0.81"));
    }
}
