//! Calibrated Load-Forecast Intervals
//! ==================================
//! Split a synthetic hourly load series chronologically, build prediction
//! intervals two ways -- a **quantile ensemble** and **split conformal**
//! around a point model -- then score coverage, sharpness, and pinball loss
//! overall and on an extreme-demand slice.
//!
//! ```bash
//! cargo run --release --example load_forecast
//! ```

use conforma::evaluator::{mae, rmse, MethodOutput};
use conforma::synthetic::synthetic_load_dataset;
use conforma::{
    ChronoSplitter, ColumnBaseline, ConformalCalibrator, LinearModel, Objective, PointModel,
    QuantileEnsemble, Slice, SliceAnalyzer, SplitSpec,
};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    // ------------------------------------------------------------------
    // 1. A feature-engineered hourly dataset, 24h-ahead horizon
    // ------------------------------------------------------------------
    let data = synthetic_load_dataset(4_000, 24, 42);
    println!("{} hourly rows, {} features, horizon {}h", data.rows(), data.cols(), data.horizon());

    // ------------------------------------------------------------------
    // 2. Chronological split: train / calibration / test
    // ------------------------------------------------------------------
    let splitter = ChronoSplitter::new(SplitSpec::Fractions {
        train: 0.6,
        calibration: 0.2,
        test: 0.2,
    });
    let splits = splitter.split(&data)?;
    println!(
        "train={} calibration={} test={} rows",
        splits.train.rows(),
        splits.calibration.rows(),
        splits.test.rows()
    );

    let coverage = 0.8;

    // ------------------------------------------------------------------
    // 3. Split conformal around a squared-loss point model
    // ------------------------------------------------------------------
    let point_model = Box::new(
        LinearModel::default()
            .set_objective(Objective::SquaredLoss)
            .set_l2(0.001)
            .set_iterations(2_000),
    );
    let mut calibrator = ConformalCalibrator::new(coverage)?;
    calibrator.fit(point_model, &splits.train, &splits.calibration)?;
    let (below, above) = calibrator.half_width().expect("calibrator was just fit");
    println!("conformal half-width: -{:.0} / +{:.0} MW", below, above);

    let conformal_intervals = calibrator.predict_interval(&splits.test)?;

    let point_preds = calibrator.predict_point(&splits.test)?;
    println!(
        "point model: MAE {:.0} MW, RMSE {:.0} MW",
        mae(splits.test.targets(), &point_preds, None),
        rmse(splits.test.targets(), &point_preds, None)
    );

    // The same calibration machinery around a seasonal-naive baseline:
    // feature column 1 is the load one week earlier.
    let mut naive_calibrator = ConformalCalibrator::new(coverage)?;
    naive_calibrator.fit(
        Box::new(ColumnBaseline::new(1)),
        &splits.train,
        &splits.calibration,
    )?;
    let naive_intervals = naive_calibrator.predict_interval(&splits.test)?;

    // ------------------------------------------------------------------
    // 4. Quantile ensemble at the interval's tail levels plus the median
    // ------------------------------------------------------------------
    let factory = |objective: Objective| -> Box<dyn PointModel> {
        Box::new(
            LinearModel::default()
                .set_objective(objective)
                .set_l2(0.001)
                .set_iterations(2_000),
        )
    };
    let ensemble = QuantileEnsemble::fit(&factory, &splits.train, &[0.1, 0.5, 0.9])?;
    let quantile_preds = ensemble.predict(&splits.test)?;
    if quantile_preds.crossing_corrected() > 0 {
        println!(
            "corrected quantile crossing on {} of {} rows",
            quantile_preds.crossing_corrected(),
            quantile_preds.rows()
        );
    }

    // ------------------------------------------------------------------
    // 5. Evaluate both methods, overall and per slice
    // ------------------------------------------------------------------
    let methods = vec![
        MethodOutput::from_intervals("conformal", coverage, conformal_intervals),
        MethodOutput::from_intervals("seasonal_naive_conformal", coverage, naive_intervals),
        MethodOutput::from_quantiles("quantile_ensemble", coverage, quantile_preds)?,
    ];

    let slices = vec![
        Slice::extreme_target("extreme_demand", &splits.test, 0.95)?,
        Slice::hour_range("evening_peak", &splits.test, 17, 21),
    ];
    let report = SliceAnalyzer::new(slices).analyze(&splits.test, &methods);

    println!(
        "\n{:<20} {:>10} {:>18} {:>12} {:>10}",
        "method", "coverage", "coverage band", "mean width", "pinball"
    );
    println!("{}", "-".repeat(74));
    for (name, method) in &report.methods {
        let m = &method.overall;
        println!(
            "{:<20} {:>10.3} {:>8.3} -{:>8.3} {:>12.0} {:>10.1}",
            name, m.coverage, m.coverage_lower, m.coverage_upper, m.mean_width, m.pinball
        );
        for (slice_name, s) in &method.slices {
            println!(
                "  {:<18} {:>10.3} {:>18} {:>12.0} {:>10.1}  ({} rows)",
                slice_name,
                s.metrics.coverage,
                "",
                s.metrics.mean_width,
                s.metrics.pinball,
                s.matched
            );
        }
    }

    println!("\n{}", report.to_json()?);
    Ok(())
}
