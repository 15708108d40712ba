use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Half-width of the window used by similarity lookups.
pub const DEFAULT_TOLERANCE: f64 = 5.0;

/// File name of the persisted pipeline inside the artifact directory.
pub const ARTIFACT_FILE_NAME: &str = "text_classifier.json";

/// Upper bound on the dataset source size.
pub const MAX_DATASET_BYTES: u64 = 64 * 1024 * 1024;

/// Upper bound on a persisted artifact.
pub const MAX_ARTIFACT_BYTES: u64 = 256 * 1024 * 1024;

/// Thresholds of the sustainability rule.
///
/// A city is eligible when its air quality is strictly above `min_air_quality`
/// and its water pollution is strictly below `max_water_pollution`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelRule {
    pub min_air_quality: f64,
    pub max_water_pollution: f64,
}

impl Default for LabelRule {
    fn default() -> Self {
        Self {
            min_air_quality: 50.0,
            max_water_pollution: 60.0,
        }
    }
}

/// How many candidate features a tree node considers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    Sqrt,
    All,
    Fixed(usize),
}

impl MaxFeatures {
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = match self {
            Self::Sqrt => (n_features as f64).sqrt().floor() as usize,
            Self::All => n_features,
            Self::Fixed(n) => *n,
        };
        n.clamp(1, n_features.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_features: MaxFeatures,
    /// `None` grows every tree until its leaves are pure.
    pub max_depth: Option<usize>,
    pub bootstrap: bool,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_features: MaxFeatures::Sqrt,
            max_depth: None,
            bootstrap: true,
        }
    }
}

/// Settings for one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Fraction of the pairs held out from training.
    pub split_ratio: f64,
    pub seed: u64,
    pub forest: ForestConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            split_ratio: 0.2,
            seed: 42,
            forest: ForestConfig::default(),
        }
    }
}

/// Returns the default directory for persisted pipelines.
pub fn default_artifact_dir() -> PathBuf {
    // 1. Check environment variable
    if let Ok(path) = env::var("UAIR_HOME") {
        return PathBuf::from(path).join("artifacts");
    }

    // 2. Use platform-specific data directory
    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("uair").join("artifacts");
    }

    // 3. Fallback to user's home directory
    if let Some(home_dir) = dirs::home_dir() {
        return home_dir.join(".local").join("share").join("uair").join("artifacts");
    }

    env::temp_dir().join("uair").join("artifacts")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(12), 3);
        assert_eq!(MaxFeatures::Sqrt.resolve(1), 1);
        assert_eq!(MaxFeatures::All.resolve(7), 7);
        assert_eq!(MaxFeatures::Fixed(50).resolve(7), 7);
        assert_eq!(MaxFeatures::Fixed(0).resolve(7), 1);
    }

    #[test]
    fn test_defaults_match_reference_run() {
        let config = PipelineConfig::default();
        assert_eq!(config.split_ratio, 0.2);
        assert_eq!(config.seed, 42);
        assert_eq!(config.forest.n_trees, 100);
        assert_eq!(LabelRule::default().min_air_quality, 50.0);
        assert_eq!(LabelRule::default().max_water_pollution, 60.0);
    }

    #[test]
    fn test_default_artifact_dir() {
        env::set_var("UAIR_HOME", "/tmp/test-uair");
        let path = default_artifact_dir();
        assert!(path.to_str().unwrap().contains("/tmp/test-uair/artifacts"));
        env::remove_var("UAIR_HOME");

        let path = default_artifact_dir();
        assert!(path.to_str().unwrap().contains("uair"));
    }
}
