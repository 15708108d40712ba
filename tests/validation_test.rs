mod common;

use std::fs;

use uair::{
    artifact_store, dataset, train, AppContext, ArtifactError, ArtifactStore, ClassifierError, DatasetError, Error,
    Label, PipelineBuilder,
};

#[test]
fn test_missing_required_column() {
    let raw = "\"City\", \"Region\", \"AirQuality\"\n\"A\", \"R\", 10\n";
    let result = dataset::load_from_reader(raw.as_bytes());
    assert!(matches!(result, Err(DatasetError::Schema(ref column)) if column == "WaterPollution"));
}

#[test]
fn test_bad_number_fails_whole_load() {
    let mut csv = common::to_csv(&common::synthetic_records()[..3]);
    csv.push_str("\"Broken\", \"R\", \"C\", 12.5, abc\n");
    let result = dataset::load_from_reader(csv.as_bytes());
    assert!(matches!(result, Err(DatasetError::Parse { row: 4, .. })));
}

#[test]
fn test_missing_source_file() {
    let result = dataset::load("/nonexistent/cities.csv");
    assert!(matches!(result, Err(DatasetError::Io(_))));
}

#[test]
fn test_single_label_training_is_rejected() {
    let pairs = vec![
        ("Alpha has air quality 70 and water pollution 10", Label::Eligible),
        ("Beta has air quality 80 and water pollution 20", Label::Eligible),
        ("Gamma has air quality 90 and water pollution 30", Label::Eligible),
    ];
    let result = train(pairs, 0.2, 42);
    assert!(matches!(
        result,
        Err(ClassifierError::InsufficientData {
            missing: Label::NotEligible,
            ..
        })
    ));
}

#[test]
fn test_empty_prediction_input() {
    let pipeline = PipelineBuilder::new()
        .add_pair("CityX has air quality 60 and water pollution 40", Label::Eligible)
        .unwrap()
        .add_pair("CityY has air quality 30 and water pollution 70", Label::NotEligible)
        .unwrap()
        .build()
        .unwrap();
    assert!(matches!(pipeline.predict(""), Err(ClassifierError::ValidationError(_))));
}

#[test]
fn test_missing_artifact() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let result = artifact_store::load(dir.path().join("absent.json"));
    assert!(matches!(result, Err(ArtifactError::Missing(_))));
    Ok(())
}

#[test]
fn test_truncated_artifact_is_corrupt() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let store = ArtifactStore::new(dir.path())?;
    let pipeline = train(common::synthetic_dataset().training_pairs(&Default::default()), 0.2, 42)?;
    let path = store.save(&pipeline)?;

    let bytes = fs::read(&path)?;
    fs::write(&path, &bytes[..bytes.len() / 2])?;
    assert!(matches!(store.load(), Err(ArtifactError::Corrupt { .. })));

    fs::write(&path, "{\"format\":\"something-else\",\"version\":1,\"sha256\":\"\",\"payload\":\"\"}")?;
    assert!(matches!(store.load(), Err(ArtifactError::Corrupt { .. })));
    Ok(())
}

#[test]
fn test_corrupt_artifact_blocks_context_open() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let source = dir.path().join("cities.csv");
    fs::write(&source, common::to_csv(&common::synthetic_records()))?;
    let store = ArtifactStore::new(dir.path().join("artifacts"))?;
    fs::write(store.artifact_path(), "not json")?;

    let result = AppContext::open(&source, store);
    assert!(matches!(result, Err(Error::Artifact(ArtifactError::Corrupt { .. }))));
    Ok(())
}
