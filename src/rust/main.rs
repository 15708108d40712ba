use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use uair::{dataset, AppContext, ArtifactStore, ForestConfig, LabelRule, PipelineConfig, DEFAULT_TOLERANCE};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// CSV file with City, AirQuality and WaterPollution columns
    #[arg(short, long, env = "UAIR_DATASET", default_value = "cities_air_quality_water_pollution.csv")]
    dataset: PathBuf,

    /// Directory holding the trained pipeline (defaults to the platform data dir)
    #[arg(short, long, env = "UAIR_ARTIFACTS")]
    artifacts: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train the text classifier on the dataset and publish it
    Train {
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Fraction of rows held out from training
        #[arg(long, default_value_t = 0.2)]
        split_ratio: f64,
        #[arg(long, default_value_t = 100)]
        trees: usize,
    },
    /// Predict the label of one or more descriptions
    Classify {
        #[arg(required = true)]
        texts: Vec<String>,
    },
    /// List cities whose indices fall inside the window around the query
    Similar {
        #[arg(long)]
        air: f64,
        #[arg(long)]
        water: f64,
        #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
        tolerance: f64,
    },
    /// Print dataset averages and index distributions as JSON
    Summary,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let store = match &args.artifacts {
        Some(dir) => ArtifactStore::new(dir),
        None => ArtifactStore::new_default(),
    }
    .context("Failed to open artifact directory")?;

    let start_time = Instant::now();
    // Training replaces the artifact, so it must not require a readable one.
    let context = match args.command {
        Command::Train { .. } => dataset::load(&args.dataset)
            .map(|d| AppContext::new(d, store))
            .map_err(uair::Error::from),
        _ => AppContext::open(&args.dataset, store),
    }
    .with_context(|| format!("Failed to open dataset {:?}", args.dataset))?;
    info!("Loaded {} cities in {:.2?}", context.dataset().len(), start_time.elapsed());

    match args.command {
        Command::Train { seed, split_ratio, trees } => {
            let config = PipelineConfig {
                split_ratio,
                seed,
                forest: ForestConfig {
                    n_trees: trees,
                    ..ForestConfig::default()
                },
            };
            let context = context.with_rule(LabelRule::default()).with_config(config);
            let report = context.retrain()?;
            println!("Trained on {} rows, held out {}", report.train_size, report.holdout_size);
            if let Some(accuracy) = report.holdout_accuracy {
                println!("Holdout accuracy: {:.1}%", accuracy * 100.0);
            }
            println!("Artifact: {}", context.store().artifact_path().display());
        }
        Command::Classify { texts } => {
            classify_all(Arc::new(context), texts).await?;
        }
        Command::Similar { air, water, tolerance } => {
            let cities = context.retrieve_similar_within(air, water, tolerance);
            if cities.is_empty() {
                println!("No cities with similar indices.");
            }
            for city in cities {
                println!("{:<30} {:>10.2} {:>10.2}", city.city, city.air_quality, city.water_pollution);
            }
        }
        Command::Summary => {
            println!("{}", serde_json::to_string_pretty(&context.summary())?);
        }
    }

    Ok(())
}

/// Classifies each text on the blocking pool; every request runs independently.
async fn classify_all(context: Arc<AppContext>, texts: Vec<String>) -> Result<()> {
    let classify_start = Instant::now();
    let handles: Vec<_> = texts
        .into_iter()
        .map(|text| {
            let context = Arc::clone(&context);
            tokio::task::spawn_blocking(move || {
                let result = context.classify(&text);
                (text, result)
            })
        })
        .collect();

    let mut failures = 0;
    for handle in handles {
        let (text, result) = handle.await?;
        match result {
            Ok(label) => println!("{} => {}", text, label),
            Err(e) => {
                failures += 1;
                eprintln!("Error classifying '{}': {}", text, e);
            }
        }
    }
    info!("Classification time: {:.2?}", classify_start.elapsed());

    if failures > 0 {
        anyhow::bail!("{} classification(s) failed", failures);
    }
    Ok(())
}
