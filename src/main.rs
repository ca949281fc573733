//! ChurnForge: customer churn scoring CLI
//!
//! Trains a random forest on a labeled customer table, then scores single
//! customers or whole CSV files against the saved artifact.

use anyhow::{Context, Result};
use churnforge::cli::{Args, BatchArgs, Command, ImportanceArgs, PredictArgs, TrainArgs};
use churnforge::data::{append_probabilities, frame_to_table, read_csv, write_csv};
use churnforge::record::{ContractType, InternetService, PaymentMethod};
use churnforge::scorer::{display_percent, RiskBand};
use churnforge::{viz, ChurnError, ChurnScorer, TrainingConfig, TrainingPipeline};
use clap::Parser;
use std::path::Path;
use std::time::Instant;
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match &args.command {
        Command::Train(train) => run_training(train),
        Command::Predict(predict) => run_prediction(predict),
        Command::Batch(batch) => run_batch(batch),
        Command::Importance(importance) => run_importance(importance),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}

/// Load the artifact or refuse to continue
fn load_scorer(dir: &Path) -> Result<ChurnScorer> {
    ChurnScorer::from_dir(dir)
        .with_context(|| format!("cannot start scoring without a valid artifact in {}", dir.display()))
}

fn run_training(args: &TrainArgs) -> Result<()> {
    println!("=== Training Pipeline ===\n");
    let start_time = Instant::now();

    let mut config = match &args.config {
        Some(path) => TrainingConfig::from_yaml_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => TrainingConfig::default(),
    };
    if let Some(trees) = args.trees {
        config.forest.n_trees = trees;
    }
    if let Some(seed) = args.seed {
        config.split_seed = seed;
        config.forest.seed = seed;
    }
    if let Some(features) = &args.features {
        config.features = Some(features.clone());
    }

    let outcome = TrainingPipeline::new(config)
        .run_csv(&args.data)
        .with_context(|| format!("training on {} failed", args.data.display()))?;
    let report = &outcome.report;

    println!("✓ Rows read: {}", report.rows_read);
    println!("  Dropped (non-numeric values): {}", report.coercion_failures);
    println!("  Dropped (missing values): {}", report.incomplete_rows);
    println!(
        "  Train/test split: {} / {} rows",
        report.train_rows, report.test_rows
    );
    println!("  Features: {}", report.n_features);
    println!("  Churn rate: {:.1}%", report.positive_rate * 100.0);
    match report.accuracy {
        Some(accuracy) => println!("✓ Accuracy (held out): {:.2}%", accuracy * 100.0),
        None => println!("  Accuracy: n/a (no held-out rows)"),
    }

    outcome.artifact.save(&args.artifacts)?;

    println!("\n=== Training Complete ===");
    println!("Artifact saved to: {}", args.artifacts.display());
    println!("Total processing time: {:.2}s", start_time.elapsed().as_secs_f64());

    Ok(())
}

fn run_prediction(args: &PredictArgs) -> Result<()> {
    println!("=== Prediction Mode ===");
    let scorer = load_scorer(&args.artifacts)?;

    let schema = scorer.schema();
    for variant in schema.unknown_variants::<ContractType>() {
        warn!(?variant, "contract type unknown to the model");
    }
    for variant in schema.unknown_variants::<InternetService>() {
        warn!(?variant, "internet service unknown to the model");
    }
    for variant in schema.unknown_variants::<PaymentMethod>() {
        warn!(?variant, "payment method unknown to the model");
    }

    let record = args.record()?;
    let probability = scorer.score_one(&record)?;
    let percent = display_percent(probability);
    let band = RiskBand::from_percent(percent);

    let marker = match band {
        RiskBand::Low => "✅",
        RiskBand::Medium => "⚠️",
        RiskBand::High => "🚨",
    };
    println!("\n{} Churn probability: {:.2}%", marker, percent);
    println!("  Risk band: {}", band);

    Ok(())
}

fn run_batch(args: &BatchArgs) -> Result<()> {
    println!("=== Batch Scoring ===");
    let start_time = Instant::now();
    let scorer = load_scorer(&args.artifacts)?;

    let mut df = read_csv(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let mut table = frame_to_table(&df)?;
    println!("✓ Loaded {} rows from {}", table.len(), args.input.display());

    // Blank cells turn a numeric column textual; parse the rest back
    for attribute in scorer.schema().numeric_attributes() {
        let unparsed = table.parse_numeric(attribute);
        if unparsed > 0 {
            warn!(attribute, unparsed, "non-numeric values in numeric column");
        }
    }

    let results = scorer.score_each(&table.records);
    let failed = results.iter().filter(|r| r.is_err()).count();
    let probabilities: Vec<Option<f64>> = results.into_iter().map(|r| r.ok()).collect();

    append_probabilities(&mut df, &probabilities)?;
    write_csv(&mut df, &args.output)?;

    println!("✓ Scored {} rows", probabilities.len() - failed);
    if failed > 0 {
        println!("  {} rows could not be scored (empty probability cell)", failed);
    }
    println!("\n{}", df.head(Some(args.preview)));
    println!("\nResults saved to: {}", args.output.display());
    println!("Processing time: {:.2}s", start_time.elapsed().as_secs_f64());

    Ok(())
}

fn run_importance(args: &ImportanceArgs) -> Result<()> {
    let scorer = load_scorer(&args.artifacts)?;

    let weights = match scorer.feature_importance() {
        Ok(weights) => weights,
        Err(ChurnError::UnsupportedOperation(reason)) => {
            println!("ℹ️ This model does not support feature importance ({})", reason);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    viz::print_feature_importance(&weights);
    if let Some(plot) = &args.plot {
        viz::create_importance_chart(&weights, plot)?;
        println!("\nChart saved to: {}", plot.display());
    }

    Ok(())
}
