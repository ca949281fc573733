//! Integration tests for ChurnForge

use churnforge::data::{
    append_probabilities, frame_to_table, read_csv, write_csv, PROBABILITY_COLUMN,
};
use churnforge::model::ForestParams;
use churnforge::record::{
    ContractType, InternetService, OnlineSecurity, PaymentMethod, TechSupport,
};
use churnforge::{
    encode, load_table, ChurnError, ChurnScorer, CustomerProfile, RawRecord, TrainingConfig,
    TrainingPipeline,
};
use std::io::Write;
use std::sync::Arc;
use tempfile::{tempdir, NamedTempFile};

const HEADER: &str = "customerID,gender,SeniorCitizen,tenure,Contract,InternetService,\
OnlineSecurity,TechSupport,PaymentMethod,MonthlyCharges,TotalCharges";

/// One Telco-style row; churners sit on short month-to-month fiber contracts
fn customer_row(i: usize) -> (String, bool) {
    let churn = i % 3 == 0;
    let gender = if i % 2 == 0 { "Female" } else { "Male" };
    let senior = i % 4 == 1;
    let row = if churn {
        let tenure = 1 + i % 6;
        let monthly = 80.0 + (i % 10) as f64;
        format!(
            "C{:04},{},{},{},Month-to-month,Fiber optic,No,No,Electronic check,{:.2},{:.2}",
            i,
            gender,
            senior as u8,
            tenure,
            monthly,
            monthly * tenure as f64
        )
    } else {
        let tenure = 24 + i % 40;
        let monthly = 40.0 + (i % 15) as f64;
        let contract = if i % 2 == 0 { "Two year" } else { "One year" };
        let payment = match i % 3 {
            1 => "Bank transfer (automatic)",
            _ => "Credit card (automatic)",
        };
        let internet = if i % 5 == 0 { "No" } else { "DSL" };
        format!(
            "C{:04},{},{},{},{},{},Yes,Yes,{},{:.2},{:.2}",
            i,
            gender,
            senior as u8,
            tenure,
            contract,
            internet,
            payment,
            monthly,
            monthly * tenure as f64
        )
    };
    (row, churn)
}

/// Labeled training file; row 7 carries a blank TotalCharges
fn create_training_csv(n: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{},Churn", HEADER).unwrap();
    for i in 0..n {
        let (mut row, churn) = customer_row(i);
        if i == 7 {
            let cut = row.rfind(',').unwrap();
            row.truncate(cut);
            row.push_str(", ");
        }
        writeln!(file, "{},{}", row, if churn { "Yes" } else { "No" }).unwrap();
    }
    file
}

/// Unlabeled scoring file; `blank_row` gets a blank TotalCharges
fn create_scoring_csv(n: usize, blank_row: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    for i in 0..n {
        let (mut row, _) = customer_row(i + 1000);
        if i == blank_row {
            let cut = row.rfind(',').unwrap();
            row.truncate(cut);
            row.push_str(", ");
        }
        writeln!(file, "{}", row).unwrap();
    }
    file
}

fn small_forest() -> TrainingConfig {
    TrainingConfig {
        forest: ForestParams {
            n_trees: 15,
            ..ForestParams::default()
        },
        ..TrainingConfig::default()
    }
}

fn scoring_records(n: usize) -> Vec<RawRecord> {
    let file = create_scoring_csv(n, usize::MAX);
    load_table(file.path()).unwrap().records
}

#[test]
fn test_end_to_end_pipeline() {
    let training_file = create_training_csv(90);
    let outcome = TrainingPipeline::new(small_forest())
        .run_csv(training_file.path())
        .unwrap();

    let report = &outcome.report;
    assert_eq!(report.rows_read, 90);
    assert_eq!(report.coercion_failures, 1);
    assert_eq!(report.train_rows + report.test_rows, 89);
    assert_eq!(report.test_rows, 18);
    assert!(report.accuracy.unwrap() > 0.9);

    let schema = outcome.artifact.schema();
    assert!(schema.position("customerID").is_none());
    assert!(schema.position("Churn").is_none());
    assert!(schema.position("TotalCharges").is_some());
    // References are the lexicographically smallest categories
    assert!(schema.dummy_position("Contract", "Month-to-month").is_none());
    assert!(schema.dummy_position("Contract", "Two year").is_some());
    assert!(schema
        .dummy_position("PaymentMethod", "Bank transfer (automatic)")
        .is_none());
    assert_eq!(report.n_features, schema.len());
}

#[test]
fn test_reloaded_artifact_scores_identically() {
    let training_file = create_training_csv(60);
    let outcome = TrainingPipeline::new(small_forest())
        .run_csv(training_file.path())
        .unwrap();

    let dir = tempdir().unwrap();
    outcome.artifact.save(dir.path()).unwrap();
    let reloaded: ChurnScorer = ChurnScorer::from_dir(dir.path()).unwrap();
    let in_memory = ChurnScorer::new(Arc::new(outcome.artifact));

    assert_eq!(
        reloaded.schema().column_names(),
        in_memory.schema().column_names()
    );

    let records = scoring_records(25);
    let before = in_memory.score(&records).unwrap();
    let after = reloaded.score(&records).unwrap();
    assert_eq!(before.len(), 25);
    for (a, b) in before.iter().zip(&after) {
        assert!((a - b).abs() < 1e-12);
    }
}

#[test]
fn test_single_and_batch_scores_agree() {
    let training_file = create_training_csv(60);
    let outcome = TrainingPipeline::new(small_forest())
        .run_csv(training_file.path())
        .unwrap();
    let scorer = ChurnScorer::new(Arc::new(outcome.artifact));

    let records = scoring_records(12);
    let batch = scorer.score(&records).unwrap();
    for (record, expected) in records.iter().zip(&batch) {
        let single = scorer.score_one(record).unwrap();
        assert!((0.0..=1.0).contains(&single));
        assert!((single - expected).abs() < 1e-12);
    }

    // Encoding of one record does not depend on its neighbours
    let schema = scorer.schema();
    let together = encode(&records, schema).unwrap();
    for (i, record) in records.iter().enumerate() {
        let alone = encode(std::slice::from_ref(record), schema).unwrap();
        assert_eq!(alone.row(0), together.row(i));
    }
}

#[test]
fn test_unseen_category_scores_like_reference() {
    let training_file = create_training_csv(60);
    let outcome = TrainingPipeline::new(small_forest())
        .run_csv(training_file.path())
        .unwrap();
    let scorer = ChurnScorer::new(Arc::new(outcome.artifact));
    let width = scorer.schema().len();

    let base = scoring_records(1).remove(0);
    let mut unseen = base.clone();
    unseen.insert("PaymentMethod", "Cryptocurrency");
    let mut reference = base;
    reference.insert("PaymentMethod", "Bank transfer (automatic)");

    let encoded = encode(&[unseen.clone(), reference.clone()], scorer.schema()).unwrap();
    assert_eq!(encoded.ncols(), width);
    assert_eq!(encoded.row(0), encoded.row(1));
    assert!(!scorer
        .schema()
        .column_names()
        .contains(&"PaymentMethod_Cryptocurrency"));

    assert_eq!(
        scorer.score_one(&unseen).unwrap(),
        scorer.score_one(&reference).unwrap()
    );
}

#[test]
fn test_profile_scoring_with_feature_selection() {
    let training_file = create_training_csv(60);
    let mut config = small_forest();
    config.features = Some(
        [
            "tenure",
            "MonthlyCharges",
            "TotalCharges",
            "Contract",
            "InternetService",
            "OnlineSecurity",
            "TechSupport",
            "PaymentMethod",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
    );
    let outcome = TrainingPipeline::new(config)
        .run_csv(training_file.path())
        .unwrap();
    let scorer = ChurnScorer::new(Arc::new(outcome.artifact));

    let risky = CustomerProfile {
        tenure: 2,
        monthly_charges: 85.0,
        total_charges: 170.0,
        contract: ContractType::MonthToMonth,
        internet_service: InternetService::FiberOptic,
        online_security: OnlineSecurity::No,
        tech_support: TechSupport::No,
        payment_method: PaymentMethod::ElectronicCheck,
    };
    let loyal = CustomerProfile {
        tenure: 60,
        monthly_charges: 45.0,
        total_charges: 2700.0,
        contract: ContractType::TwoYear,
        internet_service: InternetService::Dsl,
        online_security: OnlineSecurity::Yes,
        tech_support: TechSupport::Yes,
        payment_method: PaymentMethod::CreditCard,
    };

    let risky_score = scorer.score_one(&risky.to_record()).unwrap();
    let loyal_score = scorer.score_one(&loyal.to_record()).unwrap();
    assert!(risky_score > loyal_score);
}

#[test]
fn test_profile_without_extras_misses_attributes() {
    let training_file = create_training_csv(60);
    let outcome = TrainingPipeline::new(small_forest())
        .run_csv(training_file.path())
        .unwrap();
    let scorer = ChurnScorer::new(Arc::new(outcome.artifact));

    let record = CustomerProfile {
        tenure: 12,
        monthly_charges: 50.0,
        total_charges: 600.0,
        contract: ContractType::MonthToMonth,
        internet_service: InternetService::Dsl,
        online_security: OnlineSecurity::Yes,
        tech_support: TechSupport::Yes,
        payment_method: PaymentMethod::ElectronicCheck,
    }
    .to_record();

    assert!(matches!(
        scorer.score_one(&record),
        Err(ChurnError::MissingAttribute { attribute, .. }) if attribute == "SeniorCitizen"
    ));
}

#[test]
fn test_batch_scoring_writes_probability_column() {
    let training_file = create_training_csv(60);
    let outcome = TrainingPipeline::new(small_forest())
        .run_csv(training_file.path())
        .unwrap();
    let scorer = ChurnScorer::new(Arc::new(outcome.artifact));

    let input = create_scoring_csv(10, 4);
    let mut df = read_csv(input.path()).unwrap();
    let mut table = frame_to_table(&df).unwrap();
    let unparsed: usize = scorer
        .schema()
        .numeric_attributes()
        .map(|attribute| table.parse_numeric(attribute))
        .sum();
    assert_eq!(unparsed, 1);

    let results = scorer.score_each(&table.records);
    assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
    assert!(results[4].is_err());

    let probabilities: Vec<Option<f64>> = results.into_iter().map(|r| r.ok()).collect();
    append_probabilities(&mut df, &probabilities).unwrap();

    let output = tempdir().unwrap();
    let path = output.path().join("churn_predictions.csv");
    write_csv(&mut df, &path).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 11);
    assert!(lines[0].ends_with(PROBABILITY_COLUMN));
    assert!(lines[5].ends_with(','));
    for (i, line) in lines.iter().enumerate().skip(1) {
        if i == 5 {
            continue;
        }
        let percent: f64 = line.rsplit(',').next().unwrap().parse().unwrap();
        assert!((0.0..=100.0).contains(&percent));
    }
}

#[test]
fn test_feature_importance_covers_schema() {
    let training_file = create_training_csv(60);
    let outcome = TrainingPipeline::new(small_forest())
        .run_csv(training_file.path())
        .unwrap();
    let scorer = ChurnScorer::new(Arc::new(outcome.artifact));

    let weights = scorer.feature_importance().unwrap();
    assert_eq!(weights.len(), scorer.schema().len());
    let total: f64 = weights.iter().map(|w| w.weight).sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert!(weights.windows(2).all(|w| w[0].weight <= w[1].weight));
}

#[test]
fn test_blank_totals_everywhere_is_fatal() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{},Churn", HEADER).unwrap();
    for i in 0..10 {
        let (mut row, churn) = customer_row(i);
        let cut = row.rfind(',').unwrap();
        row.truncate(cut);
        writeln!(file, "{}, ,{}", row, if churn { "Yes" } else { "No" }).unwrap();
    }

    let result = TrainingPipeline::new(small_forest()).run_csv(file.path());
    assert!(matches!(result, Err(ChurnError::EmptyDataset(_))));
}

#[test]
fn test_missing_artifact_is_reported() {
    let dir = tempdir().unwrap();
    let result: churnforge::Result<ChurnScorer> =
        ChurnScorer::from_dir(dir.path().join("nothing-here"));
    assert!(matches!(result, Err(ChurnError::ArtifactLoad { .. })));
}

#[test]
fn test_training_without_label_fails() {
    let file = create_scoring_csv(10, usize::MAX);
    let result = TrainingPipeline::new(small_forest()).run_csv(file.path());
    assert!(matches!(result, Err(ChurnError::MissingLabel(label)) if label == "Churn"));
}
