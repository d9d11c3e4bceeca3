//! Pipeline configuration.
//!
//! Every constant the training and serving paths depend on lives here so it
//! can be swapped in tests or overridden from a JSON file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const COL_AREA: &str = "Area";
pub const COL_ZONE: &str = "Zone";
pub const COL_TIME: &str = "Time";
pub const COL_CLASS: &str = "Class";
pub const COL_PEOPLE_FREQUENCY: &str = "People.Frequency";
pub const COL_POLICE_STATION: &str = "Is.Police_Station";
pub const COL_BAR: &str = "Is.Bar";
pub const COL_TIER: &str = "Tier";
pub const COL_RESIDENCE_LEVEL: &str = "Residence.Level";

/// Columns fed to the classifiers, in encoder order.
pub const FEATURE_COLUMNS: [&str; 3] = [COL_AREA, COL_ZONE, COL_TIME];

/// Display-only columns carried alongside each record.
pub const AUX_COLUMNS: [&str; 5] = [
    COL_PEOPLE_FREQUENCY,
    COL_POLICE_STATION,
    COL_BAR,
    COL_TIER,
    COL_RESIDENCE_LEVEL,
];

/// Default-fill table and class label codes used while cleaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// `{column: default_value}` applied to empty or absent cells.
    pub defaults: BTreeMap<String, String>,
    /// `{class_label: code}`; codes must be 0 (Unsafe) or 1 (Safe).
    pub class_codes: BTreeMap<String, u8>,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        let defaults = [
            (COL_PEOPLE_FREQUENCY, "Medium"),
            (COL_POLICE_STATION, "No"),
            (COL_BAR, "No"),
            (COL_TIER, "Middle"),
            (COL_RESIDENCE_LEVEL, "Medium"),
            (COL_CLASS, "Safe"),
            (COL_ZONE, "unknown"),
            (COL_TIME, "afternoon"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let class_codes = [("Safe", 1), ("Unsafe", 0)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        CleaningConfig {
            defaults,
            class_codes,
        }
    }
}

impl CleaningConfig {
    /// Default for `column`, if the table has one.
    pub fn default_for(&self, column: &str) -> Option<&str> {
        self.defaults.get(column).map(String::as_str)
    }
}

/// Balancing, splitting and model hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Oversample when `minority / majority` falls below this.
    pub imbalance_threshold: f64,
    /// Fraction of rows held out for evaluation.
    pub test_ratio: f64,
    pub seed: u64,
    /// Nearest minority neighbours considered by SMOTE.
    pub smote_neighbors: usize,
    pub logistic_max_iterations: u64,
    pub forest_trees: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            imbalance_threshold: 0.5,
            test_ratio: 0.2,
            seed: 42,
            smote_neighbors: 5,
            logistic_max_iterations: 2000,
            forest_trees: 150,
        }
    }
}

/// Codes used for the numeric variant of a reshaped dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReshapeConfig {
    /// `{crime_type: class_label}`; unlisted types are `Safe`.
    pub crime_risk: BTreeMap<String, String>,
    /// `{category_label: integer_code}` shared by every categorical column.
    pub numeric_codes: BTreeMap<String, i64>,
}

impl Default for ReshapeConfig {
    fn default() -> Self {
        let crime_risk = [
            ("Murder", "Unsafe"),
            ("Robbery", "Unsafe"),
            ("Assault", "Unsafe"),
            ("Theft", "Safe"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let numeric_codes = [
            ("Morning", 0),
            ("Afternoon", 1),
            ("Evening", 2),
            ("Night", 3),
            ("Low", 0),
            ("Medium", 1),
            ("High", 2),
            ("Yes", 1),
            ("No", 0),
            ("Middle", 1),
            ("Outer", 2),
            ("Safe", 1),
            ("Unsafe", 0),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        ReshapeConfig {
            crime_risk,
            numeric_codes,
        }
    }
}

/// A city and the CSV file holding its records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSource {
    pub city: String,
    pub file: PathBuf,
}

impl DatasetSource {
    pub fn new(city: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        DatasetSource {
            city: city.into(),
            file: file.into(),
        }
    }

    /// Artifact key: the CSV file stem (`safety_data.csv` → `safety_data`).
    pub fn key(&self) -> String {
        self.file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.city.to_lowercase())
    }

    /// Resolve a relative file against `dir`.
    pub fn resolved(&self, dir: &Path) -> PathBuf {
        if self.file.is_absolute() {
            self.file.clone()
        } else {
            dir.join(&self.file)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub cleaning: CleaningConfig,
    pub training: TrainingConfig,
    pub reshape: ReshapeConfig,
    pub datasets: Vec<DatasetSource>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            cleaning: CleaningConfig::default(),
            training: TrainingConfig::default(),
            reshape: ReshapeConfig::default(),
            datasets: vec![
                DatasetSource::new("Chennai", "safety_data.csv"),
                DatasetSource::new("Bangalore", "bangalore_safety.csv"),
                DatasetSource::new("Karnataka", "Karnataka_cleaned.csv"),
            ],
        }
    }
}

impl PipelineConfig {
    /// Reads a JSON config; sections left out keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("invalid config {}", path.display()))
    }

    /// Looks up a dataset by city name, ignoring case.
    pub fn dataset(&self, city: &str) -> Option<&DatasetSource> {
        self.datasets
            .iter()
            .find(|d| d.city.eq_ignore_ascii_case(city))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fill_table_has_eight_columns() {
        let cfg = CleaningConfig::default();
        assert_eq!(cfg.defaults.len(), 8);
        assert_eq!(cfg.default_for(COL_TIER), Some("Middle"));
        assert_eq!(cfg.default_for(COL_AREA), None);
        assert_eq!(cfg.class_codes["Safe"], 1);
        assert_eq!(cfg.class_codes["Unsafe"], 0);
    }

    #[test]
    fn dataset_key_is_file_stem() {
        let src = DatasetSource::new("Chennai", "data/safety_data.csv");
        assert_eq!(src.key(), "safety_data");
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: PipelineConfig =
            serde_json::from_str(r#"{"training": {"forest_trees": 10}}"#).unwrap();
        assert_eq!(cfg.training.forest_trees, 10);
        assert_eq!(cfg.training.seed, 42);
        assert_eq!(cfg.datasets.len(), 3);
        assert!(cfg.dataset("bangalore").is_some());
    }
}
