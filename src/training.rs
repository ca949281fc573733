//! Offline training: labeled table to persisted churn artifact

use crate::artifact::ChurnArtifact;
use crate::config::TrainingConfig;
use crate::data::{load_table, Table};
use crate::error::{ChurnError, Result};
use crate::model::{ChurnModel, RandomForest};
use crate::reconcile::SchemaReconciler;
use crate::record::Value;
use crate::schema::FeatureSchema;
use linfa::prelude::*;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::Path;
use tracing::{info, warn};

/// Row counts and held-out quality of one training run
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub rows_read: usize,
    /// Rows dropped because a numeric-designated column failed to parse
    pub coercion_failures: usize,
    /// Rows dropped because some other column was empty
    pub incomplete_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub n_features: usize,
    pub positive_rate: f64,
    /// Held-out accuracy in [0, 1]; `None` when nothing was held out
    pub accuracy: Option<f64>,
}

/// Trained artifact plus the run summary
#[derive(Debug)]
pub struct TrainingOutcome {
    pub artifact: ChurnArtifact<RandomForest>,
    pub report: TrainingReport,
}

/// One-shot batch job producing a `ChurnArtifact`
#[derive(Debug, Clone, Default)]
pub struct TrainingPipeline {
    config: TrainingConfig,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train from a CSV file
    pub fn run_csv(&self, path: impl AsRef<Path>) -> Result<TrainingOutcome> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading training data");
        let table = load_table(path)?;
        self.run(table)
    }

    /// Train from an in-memory table
    pub fn run(&self, mut table: Table) -> Result<TrainingOutcome> {
        self.config.validate()?;
        let config = &self.config;

        if !table.has_column(&config.label_column) {
            return Err(ChurnError::MissingLabel(config.label_column.clone()));
        }
        let rows_read = table.len();
        if rows_read == 0 {
            return Err(ChurnError::EmptyDataset("input has no rows".to_string()));
        }

        let mut coercion_failures = 0;
        for column in &config.numeric_columns {
            let dropped = table.coerce_numeric(column);
            if dropped > 0 {
                warn!(column = %column, dropped, "dropped rows with non-numeric values");
            }
            coercion_failures += dropped;
        }
        if table.is_empty() {
            return Err(ChurnError::EmptyDataset(format!(
                "all {} rows failed numeric coercion",
                rows_read
            )));
        }

        let incomplete_rows = table.drop_incomplete();
        if incomplete_rows > 0 {
            warn!(dropped = incomplete_rows, "dropped rows with missing values");
        }
        if table.is_empty() {
            return Err(ChurnError::EmptyDataset(
                "no complete rows remain".to_string(),
            ));
        }

        for id in &config.id_columns {
            if table.drop_column(id) {
                info!(column = %id, "dropped identifier column");
            }
        }

        let labels = self.extract_labels(&mut table)?;
        if let Some(features) = &config.features {
            table.retain_columns(features)?;
        }

        let schema = FeatureSchema::derive(&table.columns, &table.records)?;
        if schema.is_empty() {
            return Err(ChurnError::Schema("no feature columns remain".to_string()));
        }
        let encoded = SchemaReconciler::new(&schema).encode(&table.records)?;
        info!(
            rows = encoded.matrix.nrows(),
            features = schema.len(),
            "encoded training table"
        );

        let (train_idx, test_idx) = split_indices(labels.len(), config.test_fraction, config.split_seed);
        let x_train = encoded.matrix.select(Axis(0), &train_idx);
        let y_train = labels.select(Axis(0), &train_idx);

        info!(trees = config.forest.n_trees, rows = train_idx.len(), "fitting random forest");
        let model = RandomForest::fit(&x_train, &y_train, &config.forest)?;

        let accuracy = if test_idx.is_empty() {
            None
        } else {
            let x_test = encoded.matrix.select(Axis(0), &test_idx);
            let y_test = labels.select(Axis(0), &test_idx);
            Some(evaluate(&model, x_test, y_test)?)
        };
        if let Some(accuracy) = accuracy {
            info!(accuracy = %format!("{:.2}%", accuracy * 100.0), "held-out evaluation");
        }

        let positives = labels.iter().filter(|&&l| l == 1).count();
        let report = TrainingReport {
            rows_read,
            coercion_failures,
            incomplete_rows,
            train_rows: train_idx.len(),
            test_rows: test_idx.len(),
            n_features: model.n_features(),
            positive_rate: positives as f64 / labels.len() as f64,
            accuracy,
        };

        Ok(TrainingOutcome {
            artifact: ChurnArtifact::new(model, schema)?,
            report,
        })
    }

    /// Map the label column to 0/1 and remove it from the table
    fn extract_labels(&self, table: &mut Table) -> Result<Array1<usize>> {
        let config = &self.config;
        let labels = table
            .records
            .iter()
            .enumerate()
            .map(|(row, record)| match record.get(&config.label_column) {
                Some(Value::Category(v)) if *v == config.positive_label => Ok(1),
                Some(Value::Category(v)) if *v == config.negative_label => Ok(0),
                other => Err(ChurnError::InvalidLabel {
                    row,
                    value: other.map(|v| v.to_string()).unwrap_or_default(),
                }),
            })
            .collect::<Result<Vec<usize>>>()?;
        table.drop_column(&config.label_column);
        Ok(Array1::from_vec(labels))
    }
}

/// Shuffle row indices with a fixed seed and hold out `ceil(n * fraction)` of them.
///
/// At least one row always stays in the training partition.
pub fn split_indices(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_test = ((n as f64 * test_fraction).ceil() as usize).min(n.saturating_sub(1));
    let train = indices.split_off(n_test);
    (train, indices)
}

fn evaluate(model: &RandomForest, x_test: Array2<f64>, y_test: Array1<usize>) -> Result<f64> {
    let predicted = model.predict(&x_test);
    let test = Dataset::new(x_test, y_test);
    let cm = predicted
        .confusion_matrix(&test)
        .map_err(|e| ChurnError::Training(e.to_string()))?;
    Ok(f64::from(cm.accuracy()))
}
