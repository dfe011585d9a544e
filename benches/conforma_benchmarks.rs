use conforma::evaluator::MethodOutput;
use conforma::synthetic::synthetic_load_dataset;
use conforma::{
    ChronoSplitter, ConformalCalibrator, LinearModel, Objective, PointModel, QuantileEnsemble,
    Slice, SliceAnalyzer, SplitSpec,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

pub fn calibration_benchmarks(c: &mut Criterion) {
    let data = synthetic_load_dataset(5_000, 24, 0);
    let splitter = ChronoSplitter::new(SplitSpec::Fractions {
        train: 0.6,
        calibration: 0.2,
        test: 0.2,
    });
    let splits = splitter.split(&data).unwrap();

    c.bench_function("conformal fit", |b| {
        b.iter(|| {
            let model = Box::new(LinearModel::default().set_iterations(200));
            let mut calibrator = ConformalCalibrator::new(0.9).unwrap();
            calibrator
                .fit(model, black_box(&splits.train), black_box(&splits.calibration))
                .unwrap();
            calibrator
        })
    });

    let model = Box::new(LinearModel::default().set_iterations(200));
    let mut calibrator = ConformalCalibrator::new(0.9).unwrap();
    calibrator.fit(model, &splits.train, &splits.calibration).unwrap();
    c.bench_function("conformal predict_interval", |b| {
        b.iter(|| calibrator.predict_interval(black_box(&splits.test)).unwrap())
    });

    let factory = |objective: Objective| -> Box<dyn PointModel> {
        Box::new(LinearModel::default().set_objective(objective).set_iterations(200))
    };
    let ensemble = QuantileEnsemble::fit(&factory, &splits.train, &[0.05, 0.25, 0.5, 0.75, 0.95]).unwrap();
    c.bench_function("ensemble predict", |b| {
        b.iter(|| ensemble.predict(black_box(&splits.test)).unwrap())
    });

    let intervals = calibrator.predict_interval(&splits.test).unwrap();
    let methods = vec![MethodOutput::from_intervals("conformal", 0.9, intervals)];
    let slices = vec![
        Slice::extreme_target("extreme", &splits.test, 0.95).unwrap(),
        Slice::hour_range("evening", &splits.test, 17, 21),
    ];
    let analyzer = SliceAnalyzer::new(slices);
    c.bench_function("slice analyze", |b| {
        b.iter(|| analyzer.analyze(black_box(&splits.test), black_box(&methods)))
    });
}

criterion_group!(benches, calibration_benchmarks);
criterion_main!(benches);
