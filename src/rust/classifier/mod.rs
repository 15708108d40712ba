use std::collections::HashMap;

mod error;
mod utils;
pub mod builder;
#[allow(clippy::module_inception)]
mod classifier;
pub mod forest;
pub mod vectorizer;

pub use error::ClassifierError;
pub use classifier::TrainedPipeline;
pub use builder::{train, EvaluationReport, PipelineBuilder};

use crate::dataset::Label;

/// Information about a fitted pipeline
#[derive(Debug, Clone)]
pub struct PipelineInfo {
    /// Number of terms in the frozen vocabulary
    pub vocabulary_size: usize,
    /// Number of trees in the forest
    pub n_trees: usize,
    /// Number of pairs the forest was fitted on
    pub train_size: usize,
    /// Training examples per label
    pub class_counts: HashMap<Label, usize>,
    pub seed: u64,
    pub split_ratio: f64,
}
