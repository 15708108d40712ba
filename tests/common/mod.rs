#![allow(dead_code)]

use env_logger::{Builder, Env};
use uair::{Dataset, Record};

// Initialize test logger
pub fn init() {
    let _ = Builder::from_env(Env::default().default_filter_or("warn")).try_init();
}

/// A deterministic grid of cities covering both labels.
pub fn synthetic_records() -> Vec<Record> {
    let mut records = Vec::new();
    for i in 0..12 {
        for j in 0..8 {
            let air = 10.0 + i as f64 * 7.5;
            let water = 5.0 + j as f64 * 12.5;
            records.push(Record::new(format!("City{}x{}", i, j), air, water));
        }
    }
    records
}

pub fn synthetic_dataset() -> Dataset {
    Dataset::from_records(synthetic_records()).expect("synthetic records are finite")
}

/// Renders records in the quoted, space-padded layout of the source table.
pub fn to_csv(records: &[Record]) -> String {
    let mut out = String::from("\"City\", \"Region\", \"Country\", \"AirQuality\", \"WaterPollution\"\n");
    for r in records {
        out.push_str(&format!(
            "\"{}\", \"Region\", \"Country\", {}, {}\n",
            r.city, r.air_quality, r.water_pollution
        ));
    }
    out
}
