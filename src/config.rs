//! Training configuration

use crate::error::{ChurnError, Result};
use crate::model::ForestParams;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything the training pipeline needs besides the data itself.
///
/// Every field has a default, so a YAML file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Label column
    pub label_column: String,
    /// Label value meaning "churned"
    pub positive_label: String,
    /// Label value meaning "stayed"
    pub negative_label: String,
    /// Pure identifier columns, dropped when present
    pub id_columns: Vec<String>,
    /// Columns stored as text that must be parsed as numbers; rows that fail are dropped
    pub numeric_columns: Vec<String>,
    /// Restrict training to these attributes (all remaining columns when unset)
    pub features: Option<Vec<String>>,
    /// Share of rows held out for evaluation
    pub test_fraction: f64,
    /// Seed of the train/test shuffle
    pub split_seed: u64,
    pub forest: ForestParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            label_column: "Churn".to_string(),
            positive_label: "Yes".to_string(),
            negative_label: "No".to_string(),
            id_columns: vec!["customerID".to_string()],
            numeric_columns: vec!["TotalCharges".to_string()],
            features: None,
            test_fraction: 0.2,
            split_seed: 42,
            forest: ForestParams::default(),
        }
    }
}

impl TrainingConfig {
    /// Read a YAML configuration file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.test_fraction) {
            return Err(ChurnError::Config(format!(
                "test_fraction must be in [0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.forest.n_trees == 0 {
            return Err(ChurnError::Config("forest.n_trees must be positive".to_string()));
        }
        if self.positive_label == self.negative_label {
            return Err(ChurnError::Config(
                "positive and negative labels must differ".to_string(),
            ));
        }
        Ok(())
    }
}
