//! Shared synthetic data for integration tests.

#![allow(dead_code)]

use std::io::Write;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use realty::data::{from_records, Dataset, PropertyRecord, RecordSchema};
use realty::TrainConfig;

pub const NEIGHBORHOODS: [&str; 3] = ["A", "B", "C"];

fn premium(hood: &str) -> f64 {
    match hood {
        "B" => 40_000.0,
        "C" => 90_000.0,
        _ => 0.0,
    }
}

/// Noise-free price for the synthetic market.
pub fn true_price(area: f64, bedrooms: f64, bathrooms: f64, hood: &str) -> f64 {
    50_000.0 + 2_000.0 * area + 10_000.0 * bedrooms + 15_000.0 * bathrooms + premium(hood)
}

/// `n` labelled rows with area, bedrooms, bathrooms, neighborhood and price.
pub fn synthetic_records(n: usize, seed: u64) -> Vec<PropertyRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let area: f64 = rng.gen_range(50.0..250.0);
            let bedrooms = f64::from(rng.gen_range(1..=5u8));
            let bathrooms = f64::from(rng.gen_range(1..=3u8));
            let hood = NEIGHBORHOODS[rng.gen_range(0..NEIGHBORHOODS.len())];
            let noise: f64 = rng.gen_range(-10_000.0..10_000.0);
            PropertyRecord::new()
                .with("area", (area * 10.0).round() / 10.0)
                .with("bedrooms", bedrooms)
                .with("bathrooms", bathrooms)
                .with("neighborhood", hood)
                .with("price", true_price(area, bedrooms, bathrooms, hood) + noise)
        })
        .collect()
}

pub fn synthetic_dataset(n: usize, seed: u64) -> Dataset {
    from_records(synthetic_records(n, seed), RecordSchema::property()).unwrap()
}

/// Configuration used across the end-to-end tests.
pub fn test_config() -> TrainConfig {
    TrainConfig {
        min_rows: 50,
        validation_fraction: 0.2,
        seed: 42,
        ..TrainConfig::default()
    }
}

pub fn std_dev(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// Write records as CSV with the columns the property schema expects.
pub fn write_csv(path: &Path, records: &[PropertyRecord]) {
    let mut file = std::fs::File::create(path).unwrap();
    writeln!(file, "area,bedrooms,bathrooms,neighborhood,price").unwrap();
    for r in records {
        writeln!(
            file,
            "{},{},{},{},{}",
            r.number("area").unwrap(),
            r.number("bedrooms").unwrap(),
            r.number("bathrooms").unwrap(),
            r.text("neighborhood").unwrap(),
            r.number("price").unwrap()
        )
        .unwrap();
    }
}
