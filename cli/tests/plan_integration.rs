//! Integration tests for the planner CLI: config + snapshot in, plan and
//! audit trail out.

use std::path::Path;

use holistic_planner_cli::config::Config;
use holistic_planner_cli::error::Error;
use holistic_planner_cli::run::{self, PlanOptions};

fn snapshot_json() -> &'static str {
    r#"{
        "timestamp": "2026-03-02T09:00:00Z",
        "available_cash": 1000.0,
        "positions": [
            { "symbol": "AAPL", "quantity": 20, "avg_price": 100.0, "current_price": 150.0,
              "market_value_eur": 3000.0 },
            { "symbol": "SAP", "quantity": 10, "avg_price": 120.0, "current_price": 100.0 }
        ],
        "securities": [
            { "symbol": "AAPL", "name": "Apple", "country": "US", "quality_score": 0.8 },
            { "symbol": "SAP", "name": "SAP", "country": "DE", "quality_score": 0.9 },
            { "symbol": "ASML", "name": "ASML", "country": "NL", "quality_score": 0.85 }
        ],
        "prices": { "AAPL": 150.0, "SAP": 100.0, "ASML": 50.0 },
        "country_weights": { "US": 0.4, "DE": 0.3, "NL": 0.3 }
    }"#
}

/// Write a snapshot and a planner document into `dir`; return the CLI config.
fn setup(dir: &Path, planner_toml: &str) -> (Config, std::path::PathBuf) {
    let snapshot = dir.join("snapshot.json");
    std::fs::write(&snapshot, snapshot_json()).unwrap();
    let planner = dir.join("planner.toml");
    std::fs::write(&planner, planner_toml).unwrap();

    let cli_toml = format!(
        "[planner]\nconfig = \"planner.toml\"\nbucket = \"core\"\n\n[evaluation]\nbatch_size = 5\n\n[logging]\ndir = \"{}\"\n",
        dir.join("logs").display()
    );
    let cli_path = dir.join("config.toml");
    std::fs::write(&cli_path, cli_toml).unwrap();
    (Config::load(&cli_path).unwrap(), snapshot)
}

fn default_planner_toml() -> String {
    holistic_planner::PlannerConfiguration::default()
        .to_toml_string()
        .unwrap()
}

// ============================================================================
// plan
// ============================================================================

#[test]
fn plan_writes_audit_trail() {
    let dir = tempfile::tempdir().unwrap();
    let (config, snapshot) = setup(dir.path(), &default_planner_toml());

    let plan = run::plan(&config, &snapshot, &PlanOptions::default()).unwrap();
    assert!(plan.feasible);
    assert!((plan.improvement - (plan.end_state_score - plan.current_score)).abs() < 1e-9);

    let contents = std::fs::read_to_string(config.audit_path()).unwrap();
    let events: Vec<serde_json::Value> = contents
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let names: Vec<&str> = events.iter().map(|e| e["event"].as_str().unwrap()).collect();
    assert_eq!(
        names,
        vec!["plan_started", "opportunities_identified", "plan_created"]
    );
    assert_eq!(events[0]["bucket"], "core");
    assert_eq!(
        events[2]["steps"].as_array().unwrap().len(),
        plan.steps.len()
    );
}

#[test]
fn plan_is_repeatable() {
    let dir = tempfile::tempdir().unwrap();
    let (config, snapshot) = setup(dir.path(), &default_planner_toml());

    let a = run::plan(&config, &snapshot, &PlanOptions::default()).unwrap();
    let b = run::plan(&config, &snapshot, &PlanOptions::default()).unwrap();
    assert_eq!(a.steps, b.steps);

    // Audit log is appended, not truncated.
    let contents = std::fs::read_to_string(config.audit_path()).unwrap();
    assert_eq!(contents.lines().count(), 6);
}

#[test]
fn incremental_reaches_full_result() {
    let dir = tempfile::tempdir().unwrap();
    let (config, snapshot) = setup(dir.path(), &default_planner_toml());

    let full = run::plan(&config, &snapshot, &PlanOptions::default()).unwrap();
    let opts = PlanOptions {
        bucket: Some("satellite".into()),
        incremental: true,
    };
    let incremental = run::plan(&config, &snapshot, &opts).unwrap();
    assert!((incremental.end_state_score - full.end_state_score).abs() < 1e-9);
}

#[test]
fn empty_planner_document_gives_empty_plan() {
    let dir = tempfile::tempdir().unwrap();
    let (config, snapshot) = setup(dir.path(), "[planner]\nname = \"idle\"\n");

    let plan = run::plan(&config, &snapshot, &PlanOptions::default()).unwrap();
    assert!(plan.steps.is_empty());
    assert_eq!(plan.improvement, 0.0);
}

// ============================================================================
// errors and exit codes
// ============================================================================

#[test]
fn unknown_module_is_a_validation_error() {
    let dir = tempfile::tempdir().unwrap();
    let (config, snapshot) = setup(
        dir.path(),
        "[opportunity_calculators.momentum]\nenabled = true\n",
    );

    let err = run::plan(&config, &snapshot, &PlanOptions::default()).unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(err.to_string().contains("momentum"));

    let report = run::validate(&config).unwrap();
    assert!(report.has_errors());
}

#[test]
fn missing_snapshot_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let (config, _) = setup(dir.path(), &default_planner_toml());

    let err = run::plan(&config, &dir.path().join("nope.json"), &PlanOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::SnapshotRead { .. }));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn default_document_validates_clean_of_errors() {
    let dir = tempfile::tempdir().unwrap();
    let (config, _) = setup(dir.path(), &default_planner_toml());

    let report = run::validate(&config).unwrap();
    assert!(!report.has_errors());
}
