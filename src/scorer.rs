//! Churn scoring over a shared, read-only artifact

use crate::artifact::ChurnArtifact;
use crate::error::{ChurnError, Result};
use crate::model::{ChurnModel, RandomForest};
use crate::reconcile::SchemaReconciler;
use crate::record::RawRecord;
use crate::schema::FeatureSchema;
use ndarray::{Array1, Array2, Axis};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Lower bound of the medium band, in percent
pub const MEDIUM_RISK_PERCENT: f64 = 30.0;
/// Lower bound of the high band, in percent
pub const HIGH_RISK_PERCENT: f64 = 70.0;

/// Presentation band for a churn probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl RiskBand {
    /// Band for a probability on the 0-100 scale. Boundaries belong to the upper band.
    pub fn from_percent(percent: f64) -> Self {
        if percent < MEDIUM_RISK_PERCENT {
            RiskBand::Low
        } else if percent < HIGH_RISK_PERCENT {
            RiskBand::Medium
        } else {
            RiskBand::High
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskBand::Low => "low",
            RiskBand::Medium => "medium",
            RiskBand::High => "high",
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Probability on the 0-100 scale
pub fn to_percent(probability: f64) -> f64 {
    probability * 100.0
}

/// Percentage rounded to two decimals for display
pub fn display_percent(probability: f64) -> f64 {
    (to_percent(probability) * 100.0).round() / 100.0
}

/// Column name paired with its model importance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureWeight {
    pub column: String,
    pub weight: f64,
}

/// Scores raw records with one immutable artifact.
///
/// Cloning is cheap and every clone shares the same artifact, so a scorer
/// can be handed to as many concurrent callers as needed.
#[derive(Debug)]
pub struct ChurnScorer<M = RandomForest> {
    artifact: Arc<ChurnArtifact<M>>,
}

impl<M> Clone for ChurnScorer<M> {
    fn clone(&self) -> Self {
        Self {
            artifact: Arc::clone(&self.artifact),
        }
    }
}

impl<M: ChurnModel> ChurnScorer<M> {
    pub fn new(artifact: Arc<ChurnArtifact<M>>) -> Self {
        Self { artifact }
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.artifact.schema()
    }

    pub fn artifact(&self) -> &ChurnArtifact<M> {
        &self.artifact
    }

    /// Unrounded churn probabilities in [0, 1], one per record, in input order.
    /// Fails on the first record that cannot be encoded.
    pub fn score(&self, records: &[RawRecord]) -> Result<Vec<f64>> {
        let encoded = SchemaReconciler::new(self.schema()).encode(records)?;
        Ok(self.predict(&encoded.matrix).to_vec())
    }

    /// Probability for one record; identical to `score(&[record])[0]`
    pub fn score_one(&self, record: &RawRecord) -> Result<f64> {
        let row = SchemaReconciler::new(self.schema()).encode_record(record)?;
        Ok(self.predict(&row.insert_axis(Axis(0)))[0])
    }

    /// Score every record independently; invalid records fail alone
    pub fn score_each(&self, records: &[RawRecord]) -> Vec<Result<f64>> {
        let batch = SchemaReconciler::new(self.schema()).encode_each(records);

        let valid: Vec<&Array1<f64>> = batch.rows.iter().filter_map(|r| r.as_ref().ok()).collect();
        let mut matrix = Array2::zeros((valid.len(), self.schema().len()));
        for (i, row) in valid.iter().enumerate() {
            matrix.row_mut(i).assign(*row);
        }
        let mut probabilities = self.predict(&matrix).into_iter();

        batch
            .rows
            .into_iter()
            .map(|row| match row {
                Ok(_) => Ok(probabilities.next().unwrap_or(f64::NAN)),
                Err(e) => {
                    warn!(error = %e, "record could not be scored");
                    Err(e)
                }
            })
            .collect()
    }

    /// Importances paired with schema columns, sorted ascending by weight
    pub fn feature_importance(&self) -> Result<Vec<FeatureWeight>> {
        let weights = self
            .artifact
            .model()
            .feature_importance()
            .ok_or(ChurnError::UnsupportedOperation(
                "model does not expose feature importances",
            ))?;

        let mut pairs: Vec<FeatureWeight> = self
            .schema()
            .column_names()
            .into_iter()
            .zip(weights)
            .map(|(column, weight)| FeatureWeight {
                column: column.to_string(),
                weight,
            })
            .collect();
        pairs.sort_by(|a, b| a.weight.total_cmp(&b.weight));
        Ok(pairs)
    }

    fn predict(&self, matrix: &Array2<f64>) -> Array1<f64> {
        if matrix.nrows() == 0 {
            return Array1::zeros(0);
        }
        self.artifact
            .model()
            .predict_probabilities(matrix)
            .mapv(|p| p.clamp(0.0, 1.0))
    }
}

impl<M: ChurnModel + Serialize + DeserializeOwned> ChurnScorer<M> {
    /// Load the artifact from `dir` and build a scorer around it
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Arc::new(ChurnArtifact::load(dir)?)))
    }
}
