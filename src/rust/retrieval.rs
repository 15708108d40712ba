use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_TOLERANCE;
use crate::dataset::{Dataset, Record};

/// A point in (air quality, water pollution) space with a symmetric window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityQuery {
    pub air_quality: f64,
    pub water_pollution: f64,
    pub tolerance: f64,
}

impl SimilarityQuery {
    pub fn new(air_quality: f64, water_pollution: f64) -> Self {
        Self {
            air_quality,
            water_pollution,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Both indices must fall inside their closed window.
    pub fn matches(&self, record: &Record) -> bool {
        within(record.air_quality, self.air_quality, self.tolerance)
            && within(record.water_pollution, self.water_pollution, self.tolerance)
    }
}

fn within(value: f64, center: f64, tolerance: f64) -> bool {
    value >= center - tolerance && value <= center + tolerance
}

/// Returns every record inside the window, in dataset order.
///
/// An empty result means no city is comparable; it is not an error.
pub fn find_similar(dataset: &Dataset, query: &SimilarityQuery) -> Vec<Record> {
    dataset
        .iter()
        .filter(|record| query.matches(record))
        .cloned()
        .collect()
}
