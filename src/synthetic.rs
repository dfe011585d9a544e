//! Synthetic hourly-load generation for demos, benches, and tests.
//!
//! Produces a feature-engineered dataset the way an upstream pipeline would:
//! a smooth daily/weekly demand shape plus noise as the target, and lagged
//! and calendar features computed only from information available at
//! forecast time.
use crate::data::Dataset;
use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

/// Number of feature columns produced by [`synthetic_load_dataset`].
pub const SYNTHETIC_COLS: usize = 4;

/// A seeded synthetic hourly electricity-load dataset with `rows` rows.
///
/// Features per row: load one hour earlier, load one week (168 h) earlier,
/// and sin/cos encodings of the hour of day. The target is the load one
/// `horizon` hours after the feature timestamp.
pub fn synthetic_load_dataset(rows: usize, horizon: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let t0: DateTime<Utc> = Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap();

    // Enough raw hours to cover the weekly lag and the horizon.
    let warmup = 168;
    let total = warmup + rows + horizon;
    let load: Vec<f64> = (0..total)
        .map(|h| {
            let hour = h as f64;
            let daily = (2.0 * PI * hour / 24.0 - PI / 2.0).sin();
            let weekly = (2.0 * PI * hour / 168.0).sin();
            50_000.0 + 8_000.0 * daily + 2_000.0 * weekly + rng.gen_range(-1_500.0..1_500.0)
        })
        .collect();

    let mut timestamps = Vec::with_capacity(rows);
    let mut lag_1 = Vec::with_capacity(rows);
    let mut lag_168 = Vec::with_capacity(rows);
    let mut hour_sin = Vec::with_capacity(rows);
    let mut hour_cos = Vec::with_capacity(rows);
    let mut targets = Vec::with_capacity(rows);

    for i in 0..rows {
        let h = warmup + i;
        let ts = t0 + Duration::hours(h as i64);
        let hour = ts.hour() as f64;
        timestamps.push(ts);
        lag_1.push(load[h - 1]);
        lag_168.push(load[h - 168]);
        hour_sin.push((2.0 * PI * hour / 24.0).sin());
        hour_cos.push((2.0 * PI * hour / 24.0).cos());
        targets.push(load[h + horizon]);
    }

    let mut features = Vec::with_capacity(rows * SYNTHETIC_COLS);
    features.extend(lag_1);
    features.extend(lag_168);
    features.extend(hour_sin);
    features.extend(hour_cos);

    Dataset::new(timestamps, features, SYNTHETIC_COLS, targets)
        .and_then(|d| d.with_horizon(horizon.max(1)))
        .expect("synthetic dataset construction is well-formed")
}
