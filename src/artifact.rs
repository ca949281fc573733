//! Persisted (model, schema) pair produced by training and loaded for scoring

use crate::error::{ChurnError, Result};
use crate::model::{ChurnModel, RandomForest};
use crate::schema::FeatureSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Serialized classifier
pub const MODEL_FILE: &str = "model.json";
/// Serialized ordered schema column list
pub const SCHEMA_FILE: &str = "schema.json";

/// A trained model together with the schema it was trained against
#[derive(Debug, Clone)]
pub struct ChurnArtifact<M = RandomForest> {
    model: M,
    schema: FeatureSchema,
}

impl<M: ChurnModel> ChurnArtifact<M> {
    /// Pair a model with its schema; the model must expect exactly one input per schema column
    pub fn new(model: M, schema: FeatureSchema) -> Result<Self> {
        if model.n_features() != schema.len() {
            return Err(ChurnError::Schema(format!(
                "model expects {} features but schema has {} columns",
                model.n_features(),
                schema.len()
            )));
        }
        Ok(Self { model, schema })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }
}

impl<M: ChurnModel + Serialize + DeserializeOwned> ChurnArtifact<M> {
    /// Write `model.json` and `schema.json` into `dir`, creating it if needed
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        write_json(&dir.join(MODEL_FILE), &self.model)?;
        write_json(&dir.join(SCHEMA_FILE), &self.schema)?;

        info!(dir = %dir.display(), columns = self.schema.len(), "saved churn artifact");
        Ok(())
    }

    /// Load both blobs from `dir`. Any missing, unreadable or inconsistent
    /// blob is an `ArtifactLoad` error.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let model: M = read_json(&dir.join(MODEL_FILE))?;
        let schema: FeatureSchema = read_json(&dir.join(SCHEMA_FILE))?;

        let artifact = Self::new(model, schema).map_err(|e| ChurnError::ArtifactLoad {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;

        info!(
            dir = %dir.display(),
            columns = artifact.schema.len(),
            version = artifact.schema.version(),
            "loaded churn artifact"
        );
        Ok(artifact)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let load_error = |reason: String| ChurnError::ArtifactLoad {
        path: path.to_path_buf(),
        reason,
    };
    let file = File::open(path).map_err(|e| load_error(e.to_string()))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| load_error(e.to_string()))
}
