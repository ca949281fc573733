//! Command-line interface definitions and argument parsing

use crate::record::{
    ContractType, CustomerProfile, InternetService, OnlineSecurity, PaymentMethod, RawRecord,
    TechSupport, Value,
};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Customer churn scoring with a random forest over one-hot encoded attributes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Train a model from a labeled CSV file and save the artifact
    Train(TrainArgs),
    /// Predict churn for a single customer
    Predict(PredictArgs),
    /// Score every row of a CSV file and write the results
    Batch(BatchArgs),
    /// Show feature importances of the trained model
    Importance(ImportanceArgs),
}

#[derive(ClapArgs, Debug)]
pub struct TrainArgs {
    /// Path to the labeled training CSV
    #[arg(short, long)]
    pub data: PathBuf,

    /// Directory receiving model.json and schema.json
    #[arg(short, long, default_value = "models")]
    pub artifacts: PathBuf,

    /// YAML training configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of trees (overrides the configuration)
    #[arg(long)]
    pub trees: Option<usize>,

    /// Seed for both the split and the forest (overrides the configuration)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Comma-separated attributes to train on (overrides the configuration)
    #[arg(long, value_delimiter = ',')]
    pub features: Option<Vec<String>>,
}

#[derive(ClapArgs, Debug)]
pub struct PredictArgs {
    /// Directory holding the trained artifact
    #[arg(short, long, default_value = "models")]
    pub artifacts: PathBuf,

    /// Contract duration in months
    #[arg(long, default_value = "12", value_parser = clap::value_parser!(u32).range(0..=100))]
    pub tenure: u32,

    /// Monthly charges
    #[arg(long, default_value = "50.0")]
    pub monthly_charges: f64,

    /// Total charges
    #[arg(long, default_value = "600.0")]
    pub total_charges: f64,

    #[arg(long, value_enum, default_value = "month-to-month")]
    pub contract: ContractType,

    #[arg(long, value_enum, default_value = "dsl")]
    pub internet_service: InternetService,

    #[arg(long, value_enum, default_value = "yes")]
    pub online_security: OnlineSecurity,

    #[arg(long, value_enum, default_value = "yes")]
    pub tech_support: TechSupport,

    #[arg(long, value_enum, default_value = "electronic-check")]
    pub payment_method: PaymentMethod,

    /// Extra attribute as KEY=VALUE, for models trained on more attributes.
    /// Numeric-looking values are passed as numbers. Repeatable.
    #[arg(long = "attr", value_name = "KEY=VALUE")]
    pub extra: Vec<String>,
}

#[derive(ClapArgs, Debug)]
pub struct BatchArgs {
    /// Directory holding the trained artifact
    #[arg(short, long, default_value = "models")]
    pub artifacts: PathBuf,

    /// CSV file with one customer per row
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output CSV with the appended probability column
    #[arg(short, long, default_value = "churn_predictions.csv")]
    pub output: PathBuf,

    /// Rows to print as a preview
    #[arg(long, default_value = "20")]
    pub preview: usize,
}

#[derive(ClapArgs, Debug)]
pub struct ImportanceArgs {
    /// Directory holding the trained artifact
    #[arg(short, long, default_value = "models")]
    pub artifacts: PathBuf,

    /// Also render a bar chart to this PNG file
    #[arg(short, long)]
    pub plot: Option<PathBuf>,
}

impl PredictArgs {
    pub fn profile(&self) -> CustomerProfile {
        CustomerProfile {
            tenure: self.tenure,
            monthly_charges: self.monthly_charges,
            total_charges: self.total_charges,
            contract: self.contract,
            internet_service: self.internet_service,
            online_security: self.online_security,
            tech_support: self.tech_support,
            payment_method: self.payment_method,
        }
    }

    /// The profile plus any `--attr` extras, extras winning on conflicts
    pub fn record(&self) -> crate::Result<RawRecord> {
        let mut record = self.profile().to_record();
        for raw in &self.extra {
            let (key, value) = parse_attribute(raw)?;
            record.insert(key, value);
        }
        Ok(record)
    }
}

/// Parse `KEY=VALUE`; values that parse as numbers become numeric
pub fn parse_attribute(raw: &str) -> crate::Result<(String, Value)> {
    let (key, value) = raw.split_once('=').ok_or_else(|| {
        crate::ChurnError::Config(format!("attribute must be KEY=VALUE, got '{}'", raw))
    })?;
    let key = key.trim();
    if key.is_empty() {
        return Err(crate::ChurnError::Config(format!(
            "attribute name missing in '{}'",
            raw
        )));
    }
    let value = match value.trim().parse::<f64>() {
        Ok(n) => Value::Number(n),
        Err(_) => Value::Category(value.to_string()),
    };
    Ok((key.to_string(), value))
}
