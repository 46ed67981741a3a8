use std::io::Write;

use claimguard_pipeline::{CliOverrides, ModelKind, Pipeline, PipelineConfig};
use tempfile::NamedTempFile;

const HEADER: &str = "months_as_customer,age,policy_number,policy_bind_date,policy_state,policy_deductable,\
insured_zip,insured_sex,incident_date,incident_type,collision_type,incident_severity,authorities_contacted,\
incident_state,incident_city,incident_location,property_damage,police_report_available,total_claim_amount,\
injury_claim,insured_hobbies,auto_make,auto_model,auto_year,fraud_reported,_c39";

fn claims_csv(rows: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    let collisions = ["Front Collision", "Rear Collision", "Side Collision", "?"];
    for i in 0..rows {
        let fraud = i % 3 == 0;
        // fraud claims are severe and large
        let severity = if fraud { "Major Damage" } else if i % 2 == 0 { "Minor Damage" } else { "Trivial Damage" };
        let injury = if fraud { 9000 + (i * 37) % 500 } else { 2000 + (i * 53) % 700 };
        writeln!(
            file,
            "{},{},{},2014-01-{:02},OH,{},{},{},2015-02-{:02},Single Vehicle Collision,{},{},{},NY,Columbus,{} Main St,{},{},{},{},chess,Saab,92x,{},{},",
            10 + (i * 7) % 300,
            25 + i % 40,
            100_000 + i,
            1 + i % 28,
            [500, 1000, 2000][i % 3],
            430_000 + i,
            if i % 2 == 0 { "MALE" } else { "FEMALE" },
            1 + i % 28,
            collisions[i % 4],
            severity,
            if i % 5 == 0 { "Police" } else { "Fire" },
            i,
            if i % 4 == 1 { "?" } else { "NO" },
            if i % 6 == 2 { "?" } else { "YES" },
            injury * 6,
            injury,
            2000 + i % 15,
            if fraud { "Y" } else { "N" },
        )
        .unwrap();
    }
    file.flush().unwrap();
    file
}

fn config(path: &std::path::Path, models: Vec<ModelKind>) -> PipelineConfig {
    let toml = r#"
[selection]
cv_folds = 3

[models.knn]
k = 5

[models.decision_tree.grid]
criterion = ["gini", "entropy"]
max_depth = [2, 4]

[models.ada_boost.grid]
n_estimators = [10, 20]
algorithm = ["SAMME"]

[models.random_forest]
n_estimators = 15
"#;
    let mut config = PipelineConfig::from_toml(toml).unwrap();
    config.apply_cli_overrides(&CliOverrides {
        data: Some(path.to_path_buf()),
        models: Some(models),
        ..CliOverrides::default()
    });
    config.validate().unwrap();
    config
}

#[test]
fn test_run_end_to_end() {
    let csv = claims_csv(120);
    let models = vec![
        ModelKind::Knn,
        ModelKind::DecisionTree,
        ModelKind::RandomForest,
        ModelKind::AdaBoost,
        ModelKind::Voting,
    ];
    let report = Pipeline::new(config(csv.path(), models)).run().unwrap();

    let dataset = &report.dataset;
    assert_eq!(dataset.rows, 120);
    assert_eq!(dataset.raw_columns, 26);
    assert_eq!((dataset.n_train, dataset.n_test), (90, 30));
    assert!(dataset.dropped.iter().any(|c| c == "_c39"));
    assert!(dataset.dropped.iter().any(|c| c == "total_claim_amount"));
    assert!(dataset
        .missing_before_imputation
        .iter()
        .any(|(c, n)| c == "collision_type" && *n == 30));
    assert_eq!(dataset.imputed.len(), 4);
    assert_eq!(dataset.class_balance, vec![("N".to_string(), 80), ("Y".to_string(), 40)]);
    assert!(dataset.features.iter().any(|f| f == "incident_severity_Minor Damage"));

    let names: Vec<&str> = report.models.iter().map(|m| m.model.as_str()).collect();
    assert_eq!(
        names,
        vec!["KNN", "Decision Tree", "Random Forest", "Ada Boost", "Voting Classifier"]
    );
    for model in &report.models {
        assert!(model.test_accuracy > 0.9, "{} scored {}", model.model, model.test_accuracy);
        let total: usize = model.confusion_matrix.iter().flatten().sum();
        assert_eq!(total, 30);
    }
    let tree = &report.models[1];
    assert_eq!(tree.grid_search.as_ref().unwrap().n_candidates, 4);

    let scores: Vec<f64> = report.leaderboard.entries.iter().map(|e| e.score).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn test_report_written_as_json() {
    let csv = claims_csv(60);
    let report = Pipeline::new(config(csv.path(), vec![ModelKind::DecisionTree]))
        .run()
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.json");
    report.write_json(&path).unwrap();

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["dataset"]["rows"], 60);
    assert_eq!(json["models"][0]["model"], "Decision Tree");
    assert!(json["models"][0]["grid_search"]["best_params"]["max_depth"].is_i64());
    assert_eq!(json["leaderboard"][0]["model"], "Decision Tree");
}

#[test]
fn test_unknown_config_key_is_rejected() {
    assert!(PipelineConfig::from_toml("[split]\nseeed = 1\n").is_err());
}

#[test]
fn test_inspect_reads_raw_table() {
    let csv = claims_csv(24);
    let mut config = PipelineConfig::default();
    config.data.path = Some(csv.path().to_path_buf());
    let inspection = Pipeline::new(config).inspect().unwrap();
    assert_eq!(inspection.rows, 24);
    assert!(inspection.to_string().contains("incident_severity: Major Damage, Trivial Damage, Minor Damage"));
}
