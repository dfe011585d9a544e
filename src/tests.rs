//! End-to-end flow over the synthetic load series: split, calibrate both
//! interval methods, and score them.
use crate::evaluator::MethodOutput;
use crate::synthetic::synthetic_load_dataset;
use crate::{
    ChronoSplitter, ConformalCalibrator, LinearModel, Objective, PointModel, QuantileEnsemble,
    Slice, SliceAnalyzer, SplitSpec,
};

fn factory(objective: Objective) -> Box<dyn PointModel> {
    Box::new(
        LinearModel::default()
            .set_objective(objective)
            .set_l2(0.001)
            .set_iterations(1_000),
    )
}

#[test]
fn test_end_to_end_calibrated_evaluation() {
    let data = synthetic_load_dataset(3_000, 24, 42);
    let splitter = ChronoSplitter::new(SplitSpec::Fractions {
        train: 0.6,
        calibration: 0.2,
        test: 0.2,
    });
    let splits = splitter.split(&data).unwrap();
    let coverage = 0.8;

    let mut calibrator = ConformalCalibrator::new(coverage).unwrap();
    calibrator
        .fit(factory(Objective::SquaredLoss), &splits.train, &splits.calibration)
        .unwrap();
    let conformal_intervals = calibrator.predict_interval(&splits.test).unwrap();

    let ensemble = QuantileEnsemble::fit(&factory, &splits.train, &[0.1, 0.5, 0.9]).unwrap();
    assert!(ensemble.failed_levels().is_empty());
    let quantile_preds = ensemble.predict(&splits.test).unwrap();

    let methods = vec![
        MethodOutput::from_intervals("conformal", coverage, conformal_intervals),
        MethodOutput::from_quantiles("quantile_ensemble", coverage, quantile_preds).unwrap(),
    ];
    let slices = vec![
        Slice::extreme_target("extreme_demand", &splits.test, 0.95).unwrap(),
        Slice::hour_range("evening_peak", &splits.test, 17, 21),
    ];
    let report = SliceAnalyzer::new(slices).analyze(&splits.test, &methods);

    // The conformal guarantee holds regardless of how good the point model
    // is; on 600 test rows the empirical coverage lands near the target.
    let conformal = &report.methods["conformal"];
    assert!(
        conformal.overall.coverage > 0.7 && conformal.overall.coverage < 0.92,
        "conformal coverage {} strayed from the 0.8 target",
        conformal.overall.coverage
    );
    assert!(conformal.overall.mean_width > 0.0);
    assert!(conformal.overall.coverage_lower < conformal.overall.coverage);
    assert!(conformal.overall.coverage_upper > conformal.overall.coverage);

    let ensemble_report = &report.methods["quantile_ensemble"];
    assert!(ensemble_report.overall.pinball.is_finite());
    assert_eq!(ensemble_report.overall.calibration_curve.len(), 3);
    assert_eq!(ensemble_report.series.intervals.len(), splits.test.rows());
    assert_eq!(ensemble_report.series.timestamps, splits.test.timestamps().to_vec());

    // Both slices matched something on this series.
    for method in report.methods.values() {
        for slice in method.slices.values() {
            assert!(!slice.empty);
            assert!(slice.metrics.coverage.is_finite());
        }
    }

    let json = report.to_json().unwrap();
    assert!(json.contains("quantile_ensemble"));
    assert!(json.contains("extreme_demand"));
}
