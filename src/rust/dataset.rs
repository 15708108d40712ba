use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::{LabelRule, MAX_DATASET_BYTES};

const CITY_COLUMN: &str = "City";
const AIR_QUALITY_COLUMN: &str = "AirQuality";
const WATER_POLLUTION_COLUMN: &str = "WaterPollution";
const REGION_COLUMN: &str = "Region";
const COUNTRY_COLUMN: &str = "Country";

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Schema error: missing required column '{0}'")]
    Schema(String),
    #[error("Parse error at row {row}, column '{column}': cannot read '{value}' as a finite number")]
    Parse {
        row: usize,
        column: String,
        value: String,
    },
    #[error("Dataset source is too large ({size} bytes, max is {max})")]
    TooLarge { size: u64, max: u64 },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Binary sustainability classification of a city.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    Eligible,
    NotEligible,
}

impl Label {
    pub const ALL: [Label; 2] = [Label::Eligible, Label::NotEligible];

    pub(crate) fn index(self) -> usize {
        match self {
            Label::Eligible => 0,
            Label::NotEligible => 1,
        }
    }

    pub(crate) fn from_index(index: usize) -> Self {
        if index == 0 {
            Label::Eligible
        } else {
            Label::NotEligible
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Eligible => write!(f, "Eligible"),
            Label::NotEligible => write!(f, "Not Eligible"),
        }
    }
}

/// One row of the source table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub city: String,
    pub region: Option<String>,
    pub country: Option<String>,
    pub air_quality: f64,
    pub water_pollution: f64,
}

impl Record {
    pub fn new(city: impl Into<String>, air_quality: f64, water_pollution: f64) -> Self {
        Self {
            city: city.into(),
            region: None,
            country: None,
            air_quality,
            water_pollution,
        }
    }

    pub fn label(&self, rule: &LabelRule) -> Label {
        if self.air_quality > rule.min_air_quality && self.water_pollution < rule.max_water_pollution {
            Label::Eligible
        } else {
            Label::NotEligible
        }
    }

    /// Renders the record as the text fed to the classifier.
    pub fn description(&self) -> String {
        format!(
            "{} has air quality {} and water pollution {}",
            self.city, self.air_quality, self.water_pollution
        )
    }
}

/// A record together with its derived label and description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledRecord {
    pub record: Record,
    pub label: Label,
    pub description: String,
}

pub fn derive(record: &Record, rule: &LabelRule) -> LabeledRecord {
    LabeledRecord {
        record: record.clone(),
        label: record.label(rule),
        description: record.description(),
    }
}

/// Records in source order. Read-only once loaded.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    /// Builds a dataset from already parsed records, rejecting non-finite indices.
    pub fn from_records(records: Vec<Record>) -> Result<Self, DatasetError> {
        for (i, record) in records.iter().enumerate() {
            check_finite(i + 1, AIR_QUALITY_COLUMN, record.air_quality)?;
            check_finite(i + 1, WATER_POLLUTION_COLUMN, record.water_pollution)?;
        }
        Ok(Self { records })
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    pub fn labeled<'a>(&'a self, rule: &'a LabelRule) -> impl Iterator<Item = LabeledRecord> + 'a {
        self.records.iter().map(move |r| derive(r, rule))
    }

    /// The (description, label) pairs the text classifier trains on.
    pub fn training_pairs(&self, rule: &LabelRule) -> Vec<(String, Label)> {
        self.labeled(rule).map(|l| (l.description, l.label)).collect()
    }
}

fn check_finite(row: usize, column: &str, value: f64) -> Result<(), DatasetError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(DatasetError::Parse {
            row,
            column: column.to_string(),
            value: value.to_string(),
        })
    }
}

/// Strips surrounding whitespace and every quote character.
pub fn normalize_identifier(raw: &str) -> String {
    raw.trim().replace('"', "").trim().to_string()
}

fn parse_number(row: usize, column: &str, raw: &str) -> Result<f64, DatasetError> {
    let cleaned = normalize_identifier(raw);
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| DatasetError::Parse {
            row,
            column: column.to_string(),
            value: raw.to_string(),
        })
}

/// Loads the dataset from a CSV file on disk.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Dataset, DatasetError> {
    let path = path.as_ref();
    let size = fs::metadata(path)?.len();
    if size > MAX_DATASET_BYTES {
        return Err(DatasetError::TooLarge {
            size,
            max: MAX_DATASET_BYTES,
        });
    }
    info!("Loading dataset from {:?} ({} bytes)", path, size);
    load_from_reader(File::open(path)?)
}

/// Loads the dataset from any CSV source.
///
/// Column names are normalized before lookup. A missing `City`, `AirQuality` or
/// `WaterPollution` column is a schema error, and any row whose indices do not
/// parse fails the whole load.
pub fn load_from_reader<R: Read>(reader: R) -> Result<Dataset, DatasetError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(normalize_identifier)
        .collect();
    debug!("Normalized columns: {:?}", headers);

    let position = |name: &str| headers.iter().position(|h| h == name);
    let required = |name: &str| position(name).ok_or_else(|| DatasetError::Schema(name.to_string()));

    let city_idx = required(CITY_COLUMN)?;
    let air_idx = required(AIR_QUALITY_COLUMN)?;
    let water_idx = required(WATER_POLLUTION_COLUMN)?;
    let region_idx = position(REGION_COLUMN);
    let country_idx = position(COUNTRY_COLUMN);

    let mut records = Vec::new();
    for (i, row) in csv_reader.records().enumerate() {
        let row = row?;
        let row_number = i + 1;
        let field = |idx: usize| row.get(idx).unwrap_or("");

        records.push(Record {
            city: normalize_identifier(field(city_idx)),
            region: region_idx.map(|idx| normalize_identifier(field(idx))),
            country: country_idx.map(|idx| normalize_identifier(field(idx))),
            air_quality: parse_number(row_number, AIR_QUALITY_COLUMN, field(air_idx))?,
            water_pollution: parse_number(row_number, WATER_POLLUTION_COLUMN, field(water_idx))?,
        });
    }

    info!("Loaded {} records", records.len());
    Ok(Dataset { records })
}
