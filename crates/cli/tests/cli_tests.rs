//! CLI integration tests

use std::io::Write;
use std::process::Command;

use tempfile::NamedTempFile;

fn run_cep(args: &[&str]) -> std::process::Output {
    let mut full_args = vec!["run", "-p", "cep-cli", "--quiet", "--"];
    full_args.extend_from_slice(args);
    Command::new("cargo")
        .args(&full_args)
        .output()
        .expect("Failed to execute command")
}

fn write_json(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes()).expect("Failed to write temp file");
    file
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = run_cep(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("Container Energy Predictor"),
        "Should show app name"
    );
    assert!(stdout.contains("predict"), "Should show predict command");
    assert!(stdout.contains("calibrate"), "Should show calibrate command");
    assert!(stdout.contains("validate"), "Should show validate command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = run_cep(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("cep"), "Should show binary name");
}

/// Calibrating against an exact line recovers its coefficients
#[test]
fn test_calibrate_recovers_line() {
    let container_node = write_json(
        r#"[
            {"container_cpu_cores": 0.5, "node_cpu_util_percent": 4.0},
            {"container_cpu_cores": 1.0, "node_cpu_util_percent": 5.0},
            {"container_cpu_cores": 1.5, "node_cpu_util_percent": 6.0},
            {"container_cpu_cores": 2.0, "node_cpu_util_percent": 7.0}
        ]"#,
    );
    let node_power = write_json(
        r#"[
            {"node_cpu_util_percent": 0.0, "node_power_watts": 54.0},
            {"node_cpu_util_percent": 50.0, "node_power_watts": 90.0},
            {"node_cpu_util_percent": 100.0, "node_power_watts": 126.0}
        ]"#,
    );

    let output = run_cep(&[
        "--format",
        "json",
        "calibrate",
        "--container-node",
        container_node.path().to_str().unwrap(),
        "--node-power",
        node_power.path().to_str().unwrap(),
    ]);
    assert!(output.status.success(), "calibrate should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let config: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("calibrate should emit JSON");
    let slope = config["container_to_node_slope"].as_f64().unwrap();
    let intercept = config["container_to_node_intercept"].as_f64().unwrap();
    assert!((slope - 2.0).abs() < 0.01, "slope was {slope}");
    assert!((intercept - 3.0).abs() < 0.01, "intercept was {intercept}");
    assert!((config["node_idle_power_watts"].as_f64().unwrap() - 54.0).abs() < 1e-9);
    assert!((config["node_max_power_watts"].as_f64().unwrap() - 126.0).abs() < 1e-9);
}

/// Calibration with a single measurement pair is rejected
#[test]
fn test_calibrate_insufficient_measurements() {
    let container_node =
        write_json(r#"[{"container_cpu_cores": 0.5, "node_cpu_util_percent": 15.0}]"#);
    let node_power = write_json(
        r#"[
            {"node_cpu_util_percent": 0.0, "node_power_watts": 54.0},
            {"node_cpu_util_percent": 100.0, "node_power_watts": 126.0}
        ]"#,
    );

    let output = run_cep(&[
        "calibrate",
        "--container-node",
        container_node.path().to_str().unwrap(),
        "--node-power",
        node_power.path().to_str().unwrap(),
    ]);
    assert!(!output.status.success(), "calibrate should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("at least 2 measurements"),
        "stderr was: {stderr}"
    );
}

/// A constant workload predicts power within the configured envelope
#[test]
fn test_predict_constant_workload() {
    let values: Vec<String> = std::iter::repeat("0.8".to_string()).take(90).collect();
    let request = write_json(&format!(
        r#"{{
            "container_name": "web",
            "pod_name": "web-0",
            "namespace": "default",
            "historical_cpu_cores": [{}],
            "container_cpu_request": 1.0,
            "node_current_util": 45.0,
            "node_idle_util": 5.0,
            "containers_on_node": [],
            "prediction_horizon_minutes": 30
        }}"#,
        values.join(", ")
    ));

    let output = run_cep(&[
        "--format",
        "json",
        "predict",
        "--input",
        request.path().to_str().unwrap(),
    ]);
    assert!(
        output.status.success(),
        "predict should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let result: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("predict should emit JSON");
    let watts = result["prediction"]["predicted_power_watts"].as_f64().unwrap();
    // Sole container on the node with default calibration bounds
    assert!(watts >= 53.88 && watts <= 126.34, "watts was {watts}");
    assert!(result["cost"]["energy_kwh"].as_f64().unwrap() > 0.0);
}

/// Short history is rejected with the insufficient-data message
#[test]
fn test_predict_insufficient_history() {
    let request = write_json(
        r#"{
            "container_name": "web",
            "pod_name": "web-0",
            "namespace": "default",
            "historical_cpu_cores": [0.5, 0.6],
            "container_cpu_request": 1.0,
            "node_current_util": 45.0,
            "node_idle_util": 5.0
        }"#,
    );

    let output = run_cep(&["predict", "--input", request.path().to_str().unwrap()]);
    assert!(!output.status.success(), "predict should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Insufficient historical data"),
        "stderr was: {stderr}"
    );
}

/// Validation on exact-line samples reports zero error
#[test]
fn test_validate_exact_calibration() {
    let calibration = write_json(
        r#"{
            "container_to_node_slope": 30.0,
            "container_to_node_intercept": 0.0,
            "node_util_to_power_slope": 0.7,
            "node_util_to_power_intercept": 54.0,
            "node_idle_power_watts": 54.0,
            "node_max_power_watts": 124.0
        }"#,
    );
    let samples = write_json(
        r#"[
            {"container_cpu_cores": 0.5, "actual_node_util": 15.0, "actual_power": 64.5},
            {"container_cpu_cores": 1.0, "actual_node_util": 30.0, "actual_power": 75.0}
        ]"#,
    );

    let output = run_cep(&[
        "--format",
        "json",
        "validate",
        "--calibration",
        calibration.path().to_str().unwrap(),
        "--samples",
        samples.path().to_str().unwrap(),
    ]);
    assert!(output.status.success(), "validate should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let metrics: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("validate should emit JSON");
    assert!(metrics["utilization_mae"].as_f64().unwrap().abs() < 1e-9);
    assert!(metrics["power_mae"].as_f64().unwrap().abs() < 1e-9);
}
