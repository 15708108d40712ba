mod common;

use std::sync::Arc;
use std::thread;

use uair::{
    AppContext, ArtifactStore, ForestConfig, Label, LabelRule, MaxFeatures, PipelineBuilder, PipelineConfig,
    TrainedPipeline,
};

fn setup_test_pipeline() -> TrainedPipeline {
    PipelineBuilder::new()
        .add_pairs(common::synthetic_dataset().training_pairs(&LabelRule::default()))
        .unwrap()
        .build()
        .expect("Failed to train pipeline")
}

#[test]
fn test_prediction_is_deterministic() {
    let a = setup_test_pipeline();
    let b = setup_test_pipeline();
    for record in common::synthetic_records() {
        let text = record.description();
        assert_eq!(a.predict(&text).unwrap(), b.predict(&text).unwrap());
    }
}

#[test]
fn test_different_seed_still_fits_training_rows() {
    let pipeline = PipelineBuilder::new()
        .with_seed(7)
        .with_split_ratio(0.0)
        .unwrap()
        .add_pairs(common::synthetic_dataset().training_pairs(&LabelRule::default()))
        .unwrap()
        .build()
        .unwrap();

    let rule = LabelRule::default();
    let correct = common::synthetic_records()
        .iter()
        .filter(|r| pipeline.predict(&r.description()).unwrap() == r.label(&rule))
        .count();
    // Every row was seen in training; the forest should agree with most of them.
    assert!(correct * 10 >= 96 * 7, "only {} of 96 training rows recovered", correct);
}

#[test]
fn test_out_of_vocabulary_text_gets_a_label() {
    let pipeline = setup_test_pipeline();
    let (label, votes) = pipeline.predict_with_votes("lorem ipsum dolor").unwrap();
    assert_eq!(votes.values().sum::<usize>(), 100);
    assert_eq!(pipeline.predict("sit amet").unwrap(), label);
}

#[test]
fn test_custom_forest() {
    let pipeline = PipelineBuilder::new()
        .with_forest(ForestConfig {
            n_trees: 9,
            max_features: MaxFeatures::All,
            max_depth: Some(3),
            bootstrap: true,
        })
        .add_pairs(common::synthetic_dataset().training_pairs(&LabelRule::default()))
        .unwrap()
        .build()
        .unwrap();
    assert_eq!(pipeline.info().n_trees, 9);
}

#[test]
fn test_shared_across_threads() {
    let pipeline = Arc::new(setup_test_pipeline());
    let expected = pipeline.predict("City0x7 has air quality 10 and water pollution 92.5").unwrap();

    let mut handles = vec![];
    for _ in 0..4 {
        let pipeline = Arc::clone(&pipeline);
        handles.push(thread::spawn(move || {
            pipeline.predict("City0x7 has air quality 10 and water pollution 92.5").unwrap()
        }));
    }
    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[tokio::test]
async fn test_concurrent_requests_during_retrain() -> Result<(), Box<dyn std::error::Error>> {
    common::init();
    let dir = tempfile::tempdir()?;
    let config = PipelineConfig {
        forest: ForestConfig {
            n_trees: 10,
            ..ForestConfig::default()
        },
        ..PipelineConfig::default()
    };
    let context = Arc::new(
        AppContext::new(common::synthetic_dataset(), ArtifactStore::new(dir.path())?).with_config(config),
    );
    context.retrain()?;

    let retrainer = {
        let context = Arc::clone(&context);
        tokio::task::spawn_blocking(move || context.retrain())
    };
    let requests: Vec<_> = (0..16)
        .map(|i| {
            let context = Arc::clone(&context);
            tokio::task::spawn_blocking(move || {
                let text = format!("City{}x{} has air quality 40", i % 12, i % 8);
                (context.classify(&text), context.retrieve_similar(40.0, 30.0).len())
            })
        })
        .collect();

    for request in requests {
        let (label, similar) = request.await?;
        assert!(matches!(label, Ok(Label::Eligible) | Ok(Label::NotEligible)));
        assert!(similar > 0);
    }
    retrainer.await??;
    assert!(context.store().verify()?);
    Ok(())
}

#[test]
fn test_blocking_context_helpers() {
    let dir = tempfile::tempdir().unwrap();
    let context = AppContext::new(common::synthetic_dataset(), ArtifactStore::new(dir.path()).unwrap());
    let summary = tokio_test::block_on(async { context.summary() });
    assert_eq!(summary.count, 96);
    assert!(summary.mean_air_quality.is_some());
}
