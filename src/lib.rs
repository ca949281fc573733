//! ChurnForge: customer churn scoring with a schema-aligned random forest
//!
//! Raw customer records mix numeric and categorical attributes. Training
//! one-hot encodes them into a frozen [`FeatureSchema`]; every later scoring
//! call reconciles its input against that schema so the classifier always
//! sees the same columns in the same order.

pub mod artifact;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod record;
pub mod schema;
pub mod scorer;
pub mod training;
pub mod viz;

// Re-export public items for easier access
pub use artifact::ChurnArtifact;
pub use cli::Args;
pub use config::TrainingConfig;
pub use data::{load_table, Table};
pub use error::{ChurnError, Result};
pub use model::{ChurnModel, ForestParams, RandomForest};
pub use reconcile::{encode, SchemaReconciler};
pub use record::{CustomerProfile, RawRecord, Value};
pub use schema::FeatureSchema;
pub use scorer::{ChurnScorer, RiskBand};
pub use training::{TrainingOutcome, TrainingPipeline};
