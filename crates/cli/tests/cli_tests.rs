//! CLI integration tests

use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Build a command against an isolated home and model directory
fn pricer(home: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pricer"));
    cmd.env("HOME", home.path())
        .env("PRICER_N_TREES", "10")
        .env_remove("PRICER_CONFIG")
        .env_remove("PRICER_MODEL_DIR")
        .env_remove("RUST_LOG")
        .arg("--model-dir")
        .arg(home.path().join("models"));
    cmd
}

fn run(cmd: &mut Command) -> Output {
    cmd.output().expect("Failed to execute pricer")
}

fn stdout_json(output: &Output) -> Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("invalid JSON ({}): {}", e, stdout))
}

fn write_rows(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("rows.json");
    fs::write(&path, body).unwrap();
    path
}

const ROWS: &str = r#"[
    {"historical_price": 150, "price_tunisianet": 165, "price_mytech": 157.5, "historical_discount": 0.1, "category": "phones", "price": 160},
    {"historical_price": 300, "price_tunisianet": 330, "price_mytech": 315, "historical_discount": 0.1, "category": "phones", "price": 320},
    {"historical_price": "1,200 DT", "price_tunisianet": "1 320 DT", "category": "laptops", "price": "1,290 DT"},
    {"historical_price": 2400, "price_tunisianet": 2640, "price_mytech": 2520, "historical_discount": 0.15, "category": "laptops", "price": 2500},
    {"historical_price": 600, "category": "audio", "price": 640},
    {"historical_price": 900, "price_mytech": 945, "price": 930}
]"#;

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = run(Command::new(env!("CARGO_BIN_EXE_pricer")).arg("--help"));
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Product Pricer"), "Should show app name");
    for command in ["predict", "train", "features", "inspect"] {
        assert!(stdout.contains(command), "Should show {} command", command);
    }
    assert!(stdout.contains("--format"), "Should show format option");
    assert!(stdout.contains("--model-dir"), "Should show model-dir option");
    assert!(stdout.contains("--dump-metrics"), "Should show dump-metrics option");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = run(Command::new(env!("CARGO_BIN_EXE_pricer")).arg("--version"));
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("pricer"), "Should show binary name");
}

#[test]
fn test_predict_json_within_bounds() {
    let home = TempDir::new().unwrap();
    let output = run(pricer(&home).args([
        "--format", "json", "predict", "--title", "Laptop", "--price", "1000",
    ]));
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let prediction = stdout_json(&output);
    let price = prediction["price"].as_f64().unwrap();
    assert!((800.0..=1500.0).contains(&price), "price {}", price);
    assert_eq!(prediction["source"], "model");
    assert_eq!(prediction["anchor"], 1000.0);
    assert_eq!(prediction["model_version"], "rf-g1");
    assert!(home.path().join("models").join("price_model.json").exists());
    assert!(home.path().join("models").join("encoders.json").exists());
}

#[test]
fn test_predict_unparseable_price_uses_default_anchor() {
    let home = TempDir::new().unwrap();
    let output = run(pricer(&home).args([
        "--format", "json", "predict", "--title", "Phone", "--price", "on request",
    ]));
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["anchor"], 1000.0);
}

#[test]
fn test_predict_table_output() {
    let home = TempDir::new().unwrap();
    let output = run(pricer(&home).args([
        "predict",
        "--title",
        "Headphones",
        "--category",
        "audio",
        "--price",
        "250 DT",
    ]));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("Price Prediction"));
    assert!(stdout.contains("250.00 DT"));
}

#[test]
fn test_features_json() {
    let home = TempDir::new().unwrap();
    let output = run(pricer(&home).args(["--format", "json", "features", "--price", "1000"]));
    assert!(output.status.success());

    let body = stdout_json(&output);
    let features = &body["features"];
    assert_eq!(features["price_tunisianet"].as_f64().unwrap().round(), 1100.0);
    assert_eq!(features["price_mytech"].as_f64().unwrap().round(), 1050.0);
    assert_eq!(features["discount_impact"].as_f64().unwrap().round(), 100.0);
    assert_eq!(body["category"], "electronics");
}

#[test]
fn test_train_then_inspect() {
    let home = TempDir::new().unwrap();
    let rows = write_rows(home.path(), ROWS);

    let output = run(pricer(&home)
        .args(["--format", "json", "train", "--input"])
        .arg(&rows));
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let report = stdout_json(&output);
    assert_eq!(report["generation"], 2);
    assert_eq!(report["rows"], 6);

    // A fresh process loads the retrained model from disk
    let output = run(pricer(&home).args(["--format", "json", "inspect"]));
    assert!(output.status.success());
    let status = stdout_json(&output);
    assert_eq!(status["generation"], 2);
    assert_eq!(status["origin"], "loaded");
    let labels: Vec<&str> = status["categories"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["label"].as_str())
        .collect();
    for label in ["unknown", "electronics", "phones", "laptops", "audio"] {
        assert!(labels.contains(&label), "missing category {}", label);
    }
}

#[test]
fn test_train_json_lines() {
    let home = TempDir::new().unwrap();
    let rows = write_rows(
        home.path(),
        "{\"historical_price\": 100, \"price\": 105}\n{\"historical_price\": 700, \"price\": 720}\n",
    );

    let output = run(pricer(&home)
        .args(["--format", "json", "train", "--input"])
        .arg(&rows));
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(stdout_json(&output)["rows"], 2);
}

#[test]
fn test_empty_training_batch_fails_and_keeps_model() {
    let home = TempDir::new().unwrap();
    assert!(run(pricer(&home).arg("inspect")).status.success());
    let model_path = home.path().join("models").join("price_model.json");
    let before = fs::read(&model_path).unwrap();

    let rows = write_rows(home.path(), "[]");
    let output = run(pricer(&home).args(["train", "--input"]).arg(&rows));
    assert!(!output.status.success(), "Empty batch should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("empty"), "stderr: {}", stderr);

    assert_eq!(fs::read(&model_path).unwrap(), before);
}

#[test]
fn test_train_missing_target_fails() {
    let home = TempDir::new().unwrap();
    let rows = write_rows(home.path(), r#"[{"historical_price": 100, "price": 110}, {"historical_price": 200}]"#);

    let output = run(pricer(&home).args(["train", "--input"]).arg(&rows));
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("row 1"));
}

#[test]
fn test_corrupt_artifact_bootstraps() {
    let home = TempDir::new().unwrap();
    let models = home.path().join("models");
    fs::create_dir_all(&models).unwrap();
    fs::write(models.join("price_model.json"), "{ not a model").unwrap();

    let output = run(pricer(&home).args(["--format", "json", "inspect"]));
    assert!(output.status.success());
    let status = stdout_json(&output);
    assert_eq!(status["origin"], "bootstrapped");
    assert_eq!(status["model_version"], "rf-g1");
}

#[test]
fn test_model_dir_from_environment() {
    let home = TempDir::new().unwrap();
    let env_dir = home.path().join("env-models");

    let output = run(Command::new(env!("CARGO_BIN_EXE_pricer"))
        .env("HOME", home.path())
        .env("PRICER_N_TREES", "10")
        .env("PRICER_MODEL_DIR", &env_dir)
        .env_remove("PRICER_CONFIG")
        .args(["--format", "json", "inspect"]));
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(env_dir.join("price_model.json").exists());
}

#[test]
fn test_config_file() {
    let home = TempDir::new().unwrap();
    let config_path = home.path().join("pricer.toml");
    let file_dir = home.path().join("file-models");
    fs::write(
        &config_path,
        format!("model_dir = {:?}\nn_trees = 5\n", file_dir.display().to_string()),
    )
    .unwrap();

    let output = run(Command::new(env!("CARGO_BIN_EXE_pricer"))
        .env("HOME", home.path())
        .env_remove("PRICER_MODEL_DIR")
        .arg("--config")
        .arg(&config_path)
        .args(["--format", "json", "inspect"]));
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(file_dir.join("price_model.json").exists());
}

#[test]
fn test_dump_metrics() {
    let home = TempDir::new().unwrap();
    let output = run(pricer(&home).args([
        "--dump-metrics",
        "--format",
        "json",
        "predict",
        "--title",
        "Tablet",
    ]));
    assert!(output.status.success());

    // Metrics go to stderr; stdout stays valid JSON
    stdout_json(&output);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("pricer_predictions_total"));
    assert!(stderr.contains("pricer_model_generation"));
}

/// Test invalid command error handling
#[test]
fn test_invalid_command() {
    let output = run(Command::new(env!("CARGO_BIN_EXE_pricer")).arg("invalid-command"));
    assert!(!output.status.success(), "Invalid command should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("error") || stderr.contains("invalid"),
        "Should show error message"
    );
}

/// Test missing required argument error handling
#[test]
fn test_missing_title() {
    let output = run(Command::new(env!("CARGO_BIN_EXE_pricer")).arg("predict"));
    assert!(!output.status.success(), "Missing argument should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("required") || stderr.contains("--title"),
        "Should show error about missing argument"
    );
}
