use log::{info, warn};
use serde::Serialize;

use super::classifier::TrainedPipeline;
use super::error::ClassifierError;
use super::forest::{FeatureColumns, RandomForest};
use super::utils::split_indices;
use super::vectorizer::{SparseVector, TfidfVectorizer};
use crate::config::{ForestConfig, PipelineConfig};
use crate::dataset::Label;

/// Holdout statistics from one training run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub train_size: usize,
    pub holdout_size: usize,
    /// Fraction of holdout pairs predicted correctly, `None` when the holdout is empty
    pub holdout_accuracy: Option<f64>,
}

/// A builder for training a [`TrainedPipeline`] with a fluent interface.
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    pairs: Vec<(String, Label)>,
    config: PipelineConfig,
}

impl PipelineBuilder {
    /// Creates a builder with the default split ratio, seed and forest settings
    ///
    /// # Example
    /// ```
    /// use uair::PipelineBuilder;
    ///
    /// let builder = PipelineBuilder::new().with_seed(7);
    /// ```
    pub fn new() -> Self {
        Self {
            pairs: Vec::new(),
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Sets the fraction of pairs held out from training
    ///
    /// # Returns
    /// * `Err(ClassifierError::ValidationError)` if the ratio is outside `[0, 1)`
    pub fn with_split_ratio(mut self, ratio: f64) -> Result<Self, ClassifierError> {
        Self::validate_split_ratio(ratio)?;
        self.config.split_ratio = ratio;
        Ok(self)
    }

    pub fn with_forest(mut self, forest: ForestConfig) -> Self {
        self.config.forest = forest;
        self
    }

    fn validate_split_ratio(ratio: f64) -> Result<(), ClassifierError> {
        if !(0.0..1.0).contains(&ratio) {
            return Err(ClassifierError::ValidationError(format!(
                "Split ratio must be in [0, 1), got {}",
                ratio
            )));
        }
        Ok(())
    }

    /// Adds one training pair
    ///
    /// # Returns
    /// * `Err(ClassifierError::ValidationError)` if the description is empty
    pub fn add_pair(mut self, description: impl Into<String>, label: Label) -> Result<Self, ClassifierError> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(ClassifierError::ValidationError(format!(
                "Description {} cannot be empty",
                self.pairs.len() + 1
            )));
        }
        self.pairs.push((description, label));
        Ok(self)
    }

    pub fn add_pairs<I, S>(self, pairs: I) -> Result<Self, ClassifierError>
    where
        I: IntoIterator<Item = (S, Label)>,
        S: Into<String>,
    {
        pairs
            .into_iter()
            .try_fold(self, |builder, (description, label)| builder.add_pair(description, label))
    }

    /// Builds and returns the trained pipeline
    ///
    /// # Returns
    /// * `Err(ClassifierError::InsufficientData)` if either label has no example in the training split
    /// * `Err(ClassifierError::ValidationError)` if no pairs were added or the descriptions hold no terms
    ///
    /// # Example
    /// ```
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// use uair::{Label, PipelineBuilder};
    ///
    /// let pipeline = PipelineBuilder::new()
    ///     .add_pair("CityX has air quality 60 and water pollution 40", Label::Eligible)?
    ///     .add_pair("CityY has air quality 30 and water pollution 70", Label::NotEligible)?
    ///     .build()?;
    /// assert_eq!(pipeline.predict("CityX has air quality 60 and water pollution 40")?, Label::Eligible);
    /// # Ok(())
    /// # }
    /// ```
    pub fn build(self) -> Result<TrainedPipeline, ClassifierError> {
        self.build_with_report().map(|(pipeline, _)| pipeline)
    }

    /// Like [`PipelineBuilder::build`], also scoring the pipeline on the holdout split
    pub fn build_with_report(self) -> Result<(TrainedPipeline, EvaluationReport), ClassifierError> {
        Self::validate_split_ratio(self.config.split_ratio)?;
        if self.pairs.is_empty() {
            return Err(ClassifierError::ValidationError("At least one training pair is required".into()));
        }

        let (train_idx, holdout_idx) = split_indices(self.pairs.len(), self.config.split_ratio, self.config.seed);
        info!(
            "Training on {} pairs, holding out {} (seed {})",
            train_idx.len(),
            holdout_idx.len(),
            self.config.seed
        );

        let train_labels: Vec<Label> = train_idx.iter().map(|&i| self.pairs[i].1).collect();
        let mut class_counts = [0usize; 2];
        for label in &train_labels {
            class_counts[label.index()] += 1;
        }
        if let Some(missing) = Label::ALL.into_iter().find(|l| class_counts[l.index()] == 0) {
            return Err(ClassifierError::InsufficientData {
                missing,
                train_size: train_labels.len(),
            });
        }

        let train_docs: Vec<&str> = train_idx.iter().map(|&i| self.pairs[i].0.as_str()).collect();
        let vectorizer = TfidfVectorizer::fit(&train_docs)?;
        let rows: Vec<SparseVector> = train_docs.iter().map(|d| vectorizer.transform(d)).collect();
        let columns = FeatureColumns::from_rows(&rows, vectorizer.vocabulary_size());
        info!("Vocabulary frozen at {} terms", vectorizer.vocabulary_size());

        let forest = RandomForest::fit(&columns, &train_labels, &self.config.forest, self.config.seed)?;
        let pipeline = TrainedPipeline::new(vectorizer, forest, self.config, class_counts);

        let holdout_accuracy = if holdout_idx.is_empty() {
            None
        } else {
            let correct = holdout_idx
                .iter()
                .filter(|&&i| pipeline.predict_label(&self.pairs[i].0) == self.pairs[i].1)
                .count();
            Some(correct as f64 / holdout_idx.len() as f64)
        };
        match holdout_accuracy {
            Some(accuracy) => info!("Holdout accuracy: {:.3}", accuracy),
            None => warn!("Holdout split is empty; accuracy not measured"),
        }

        let report = EvaluationReport {
            train_size: train_idx.len(),
            holdout_size: holdout_idx.len(),
            holdout_accuracy,
        };
        Ok((pipeline, report))
    }
}

/// Trains a pipeline on `(description, label)` pairs with the given holdout ratio and seed.
pub fn train<S: Into<String>>(
    pairs: impl IntoIterator<Item = (S, Label)>,
    split_ratio: f64,
    seed: u64,
) -> Result<TrainedPipeline, ClassifierError> {
    PipelineBuilder::new()
        .with_seed(seed)
        .with_split_ratio(split_ratio)?
        .add_pairs(pairs)?
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs() -> Vec<(String, Label)> {
        (0..20)
            .map(|i| {
                let air = 30 + i * 3;
                let water = 80 - i * 3;
                let label = if air > 50 && water < 60 { Label::Eligible } else { Label::NotEligible };
                (format!("City{} has air quality {} and water pollution {}", i, air, water), label)
            })
            .collect()
    }

    #[test]
    fn test_invalid_split_ratio() {
        assert!(PipelineBuilder::new().with_split_ratio(1.0).is_err());
        assert!(PipelineBuilder::new().with_split_ratio(-0.1).is_err());
        assert!(PipelineBuilder::new().with_split_ratio(0.0).is_ok());
    }

    #[test]
    fn test_empty_description_rejected() {
        assert!(matches!(
            PipelineBuilder::new().add_pair("   ", Label::Eligible),
            Err(ClassifierError::ValidationError(_))
        ));
    }

    #[test]
    fn test_no_pairs_rejected() {
        assert!(matches!(
            PipelineBuilder::new().build(),
            Err(ClassifierError::ValidationError(_))
        ));
    }

    #[test]
    fn test_single_class_is_insufficient() {
        let result = train(
            vec![("a city here", Label::Eligible), ("another city there", Label::Eligible)],
            0.0,
            42,
        );
        assert!(matches!(
            result,
            Err(ClassifierError::InsufficientData { missing: Label::NotEligible, train_size: 2 })
        ));
    }

    #[test]
    fn test_report_sizes() {
        let (_, report) = PipelineBuilder::new().add_pairs(pairs()).unwrap().build_with_report().unwrap();
        assert_eq!(report.train_size, 16);
        assert_eq!(report.holdout_size, 4);
        let accuracy = report.holdout_accuracy.unwrap();
        assert!((0.0..=1.0).contains(&accuracy));
    }

    #[test]
    fn test_empty_holdout_has_no_accuracy() {
        let (_, report) = PipelineBuilder::new()
            .with_split_ratio(0.0)
            .unwrap()
            .add_pairs(pairs())
            .unwrap()
            .build_with_report()
            .unwrap();
        assert_eq!(report.holdout_size, 0);
        assert_eq!(report.holdout_accuracy, None);
    }

    #[test]
    fn test_same_seed_same_pipeline() {
        let a = train(pairs(), 0.2, 42).unwrap();
        let b = train(pairs(), 0.2, 42).unwrap();
        assert_eq!(a, b);
    }
}
