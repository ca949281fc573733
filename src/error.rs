//! Error types for churn scoring and training

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by encoding, scoring, training and artifact handling
#[derive(Error, Debug)]
pub enum ChurnError {
    /// A numeric attribute required by the schema is absent or null
    #[error("record {row}: missing numeric attribute '{attribute}'")]
    MissingAttribute { row: usize, attribute: String },

    /// An attribute carries the wrong kind of value for its schema column
    #[error("record {row}: attribute '{attribute}' must be {expected}")]
    AttributeType {
        row: usize,
        attribute: String,
        expected: &'static str,
    },

    /// The operation is not available for this model type
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    /// Serialized model or schema is missing or corrupt
    #[error("failed to load artifact from {path}: {reason}")]
    ArtifactLoad { path: PathBuf, reason: String },

    /// Feature schema is malformed
    #[error("invalid feature schema: {0}")]
    Schema(String),

    /// Training data lacks the label column
    #[error("label column '{0}' not found")]
    MissingLabel(String),

    /// Label value is neither the positive nor the negative label
    #[error("row {row}: unrecognised label '{value}'")]
    InvalidLabel { row: usize, value: String },

    /// Nothing left to train on
    #[error("empty dataset: {0}")]
    EmptyDataset(String),

    /// Classifier fitting failed
    #[error("training failed: {0}")]
    Training(String),

    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// Plot rendering failed
    #[error("chart rendering failed: {0}")]
    Chart(String),

    #[error("data error: {0}")]
    Data(#[from] polars::prelude::PolarsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, ChurnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_attribute_message() {
        let error = ChurnError::MissingAttribute {
            row: 3,
            attribute: "tenure".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "record 3: missing numeric attribute 'tenure'"
        );
    }

    #[test]
    fn test_artifact_load_message() {
        let error = ChurnError::ArtifactLoad {
            path: PathBuf::from("models/model.json"),
            reason: "file not found".to_string(),
        };
        assert!(error.to_string().contains("models/model.json"));
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let error: ChurnError = io_error.into();
        assert!(matches!(error, ChurnError::Io(_)));
        assert!(error.to_string().contains("gone"));
    }
}
