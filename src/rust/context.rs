use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use log::{info, warn};

use crate::artifact_store::{self, ArtifactError, ArtifactStore};
use crate::classifier::{ClassifierError, EvaluationReport, PipelineBuilder, TrainedPipeline};
use crate::config::{LabelRule, PipelineConfig, DEFAULT_TOLERANCE};
use crate::dataset::{self, Dataset, Label, Record};
use crate::retrieval::{find_similar, SimilarityQuery};
use crate::summary::DatasetSummary;
use crate::Error;

/// Loads `source_path`, trains a pipeline on its derived pairs and publishes it at `artifact_path`.
pub fn train_and_persist<P: AsRef<Path>, Q: AsRef<Path>>(
    source_path: P,
    artifact_path: Q,
    rule: &LabelRule,
    config: &PipelineConfig,
) -> Result<(TrainedPipeline, EvaluationReport), Error> {
    let dataset = dataset::load(source_path)?;
    let (pipeline, report) = fit(&dataset, rule, config)?;
    artifact_store::save(&pipeline, artifact_path)?;
    Ok((pipeline, report))
}

fn fit(
    dataset: &Dataset,
    rule: &LabelRule,
    config: &PipelineConfig,
) -> Result<(TrainedPipeline, EvaluationReport), ClassifierError> {
    PipelineBuilder::new()
        .with_config(config.clone())
        .add_pairs(dataset.training_pairs(rule))?
        .build_with_report()
}

/// Everything a request handler needs: the dataset and the published pipeline.
///
/// The dataset never changes after construction. The pipeline sits behind a
/// single `Arc` that is swapped whole on retrain or reload, so a prediction
/// keeps using the version it started with.
#[derive(Debug)]
pub struct AppContext {
    dataset: Arc<Dataset>,
    store: ArtifactStore,
    rule: LabelRule,
    config: PipelineConfig,
    pipeline: RwLock<Option<Arc<TrainedPipeline>>>,
    training: Mutex<()>,
}

impl AppContext {
    pub fn new(dataset: Dataset, store: ArtifactStore) -> Self {
        Self {
            dataset: Arc::new(dataset),
            store,
            rule: LabelRule::default(),
            config: PipelineConfig::default(),
            pipeline: RwLock::new(None),
            training: Mutex::new(()),
        }
    }

    pub fn with_rule(mut self, rule: LabelRule) -> Self {
        self.rule = rule;
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Loads the dataset and, when one exists, the published pipeline.
    ///
    /// A missing artifact is not an error here; `classify` reports it until
    /// [`AppContext::retrain`] or [`AppContext::reload`] succeeds. A corrupt
    /// artifact is.
    pub fn open<P: AsRef<Path>>(source_path: P, store: ArtifactStore) -> Result<Self, Error> {
        let context = Self::new(dataset::load(source_path)?, store);
        match context.reload() {
            Ok(()) => {}
            Err(Error::Artifact(ArtifactError::Missing(path))) => {
                warn!("No artifact at {:?}; classification is unavailable until training", path);
            }
            Err(e) => return Err(e),
        }
        Ok(context)
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn rule(&self) -> &LabelRule {
        &self.rule
    }

    /// The currently published pipeline.
    pub fn pipeline(&self) -> Result<Arc<TrainedPipeline>, ClassifierError> {
        let slot = self.pipeline.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        slot.as_ref().map(Arc::clone).ok_or(ClassifierError::NotTrained)
    }

    pub fn is_trained(&self) -> bool {
        self.pipeline().is_ok()
    }

    /// Replaces the in-memory pipeline.
    pub fn publish(&self, pipeline: TrainedPipeline) {
        let mut slot = self.pipeline.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(Arc::new(pipeline));
        info!("Published new pipeline");
    }

    pub fn classify(&self, description: &str) -> Result<Label, Error> {
        Ok(self.pipeline()?.predict(description)?)
    }

    pub fn retrieve_similar(&self, air_quality: f64, water_pollution: f64) -> Vec<Record> {
        self.retrieve_similar_within(air_quality, water_pollution, DEFAULT_TOLERANCE)
    }

    pub fn retrieve_similar_within(&self, air_quality: f64, water_pollution: f64, tolerance: f64) -> Vec<Record> {
        let query = SimilarityQuery::new(air_quality, water_pollution).with_tolerance(tolerance);
        find_similar(&self.dataset, &query)
    }

    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary::from_dataset(&self.dataset)
    }

    /// Trains on the context's dataset, persists the result, then publishes it.
    ///
    /// Only one retrain runs at a time. The previous pipeline keeps serving
    /// until the new one is on disk.
    pub fn retrain(&self) -> Result<EvaluationReport, Error> {
        let _guard = self.training.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let (pipeline, report) = fit(&self.dataset, &self.rule, &self.config)?;
        self.store.save(&pipeline)?;
        self.publish(pipeline);
        Ok(report)
    }

    /// Reads the artifact from the store and publishes it.
    pub fn reload(&self) -> Result<(), Error> {
        let pipeline = self.store.load()?;
        self.publish(pipeline);
        Ok(())
    }
}
