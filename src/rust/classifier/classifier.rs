use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::forest::RandomForest;
use super::vectorizer::TfidfVectorizer;
use super::PipelineInfo;
use crate::config::PipelineConfig;
use crate::dataset::Label;

/// A fitted TF-IDF vectorizer feeding a random forest.
///
/// The pipeline is immutable once built: predictions never change its state, so
/// it can be shared across threads behind an `Arc`.
///
/// ```rust
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use uair::{Label, PipelineBuilder};
/// use std::sync::Arc;
/// use std::thread;
///
/// let pipeline = Arc::new(PipelineBuilder::new()
///     .add_pair("Oslo has air quality 80 and water pollution 20", Label::Eligible)?
///     .add_pair("Delhi has air quality 20 and water pollution 80", Label::NotEligible)?
///     .build()?);
///
/// let pipeline_clone = Arc::clone(&pipeline);
/// thread::spawn(move || {
///     pipeline_clone.predict("Oslo has air quality 80").unwrap();
/// }).join().unwrap();
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedPipeline {
    vectorizer: TfidfVectorizer,
    forest: RandomForest,
    config: PipelineConfig,
    class_counts: [usize; 2],
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<TrainedPipeline>();
    }
};

impl TrainedPipeline {
    pub(crate) fn new(
        vectorizer: TfidfVectorizer,
        forest: RandomForest,
        config: PipelineConfig,
        class_counts: [usize; 2],
    ) -> Self {
        Self {
            vectorizer,
            forest,
            config,
            class_counts,
        }
    }

    /// Creates a new PipelineBuilder for fluent construction
    pub fn builder() -> super::builder::PipelineBuilder {
        super::builder::PipelineBuilder::new()
    }

    /// Returns information about the fitted pipeline
    pub fn info(&self) -> PipelineInfo {
        PipelineInfo {
            vocabulary_size: self.vectorizer.vocabulary_size(),
            n_trees: self.forest.n_trees(),
            train_size: self.class_counts.iter().sum(),
            class_counts: Label::ALL
                .into_iter()
                .map(|l| (l, self.class_counts[l.index()]))
                .collect(),
            seed: self.config.seed,
            split_ratio: self.config.split_ratio,
        }
    }

    /// Predicts the label of a description.
    ///
    /// Terms outside the training vocabulary are ignored; a description made only
    /// of unknown terms is classified from the all-zero vector.
    ///
    /// # Errors
    /// `ValidationError` if the description is empty or whitespace.
    pub fn predict(&self, description: &str) -> Result<Label, ClassifierError> {
        Self::validate_input(description)?;
        Ok(self.predict_label(description))
    }

    /// Predicts the label and returns the number of trees voting for each label.
    pub fn predict_with_votes(&self, description: &str) -> Result<(Label, HashMap<Label, usize>), ClassifierError> {
        Self::validate_input(description)?;
        let features = self.vectorizer.transform(description);
        let votes = self.forest.votes(&features);
        let label = self.forest.predict(&features);
        let votes = Label::ALL.into_iter().map(|l| (l, votes[l.index()])).collect();
        Ok((label, votes))
    }

    pub(crate) fn predict_label(&self, description: &str) -> Label {
        self.forest.predict(&self.vectorizer.transform(description))
    }

    pub fn vectorizer(&self) -> &TfidfVectorizer {
        &self.vectorizer
    }

    /// Checks that a deserialized pipeline is internally consistent.
    pub(crate) fn validate(&self) -> Result<(), ClassifierError> {
        self.vectorizer.validate()?;
        self.forest.validate()?;
        if self.forest.n_features() != self.vectorizer.vocabulary_size() {
            return Err(ClassifierError::ValidationError(format!(
                "Forest expects {} features, vectorizer produces {}",
                self.forest.n_features(),
                self.vectorizer.vocabulary_size()
            )));
        }
        Ok(())
    }

    fn validate_input(description: &str) -> Result<(), ClassifierError> {
        if description.trim().is_empty() {
            return Err(ClassifierError::ValidationError("Input text cannot be empty".into()));
        }
        Ok(())
    }
}
