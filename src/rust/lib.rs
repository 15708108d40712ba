//! Sustainability labeling, text classification and similarity lookups over a
//! table of per-city air quality and water pollution indices.
//!
//! # Basic Usage
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use uair::{Dataset, LabelRule, Label, PipelineBuilder, Record, SimilarityQuery, find_similar};
//!
//! let dataset = Dataset::from_records(vec![
//!     Record::new("CityX", 60.0, 40.0),
//!     Record::new("CityY", 30.0, 70.0),
//! ])?;
//!
//! let pipeline = PipelineBuilder::new()
//!     .add_pairs(dataset.training_pairs(&LabelRule::default()))?
//!     .build()?;
//! let label = pipeline.predict("CityX has air quality 60 and water pollution 40")?;
//! assert_eq!(label, Label::Eligible);
//!
//! let similar = find_similar(&dataset, &SimilarityQuery::new(62.0, 42.0));
//! assert_eq!(similar[0].city, "CityX");
//! # Ok(())
//! # }
//! ```
//!
//! # Serving
//!
//! [`AppContext`] owns the dataset and the published pipeline and is meant to be
//! shared across request handlers with `Arc`:
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use uair::{AppContext, ArtifactStore};
//! use std::sync::Arc;
//!
//! let context = Arc::new(AppContext::open("cities.csv", ArtifactStore::new_default()?)?);
//! let label = context.classify("Oslo has air quality 80 and water pollution 20")?;
//! let similar = context.retrieve_similar(80.0, 20.0);
//! # Ok(())
//! # }
//! ```

pub mod artifact_store;
pub mod classifier;
pub mod config;
pub mod context;
pub mod dataset;
pub mod retrieval;
pub mod summary;

pub use artifact_store::{ArtifactError, ArtifactStore};
pub use classifier::{train, ClassifierError, EvaluationReport, PipelineBuilder, PipelineInfo, TrainedPipeline};
pub use config::{ForestConfig, LabelRule, MaxFeatures, PipelineConfig, DEFAULT_TOLERANCE};
pub use context::{train_and_persist, AppContext};
pub use dataset::{derive, Dataset, DatasetError, Label, LabeledRecord, Record};
pub use retrieval::{find_similar, SimilarityQuery};
pub use summary::{DatasetSummary, HistogramBin};

/// Any failure surfaced by the library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

pub fn init_logger() {
    env_logger::init();
}
