mod common;

use common::PartylineProcess;

#[test]
fn validate_valid_config() {
    let config = PartylineProcess::fixture_path("valid.yaml");
    let output = PartylineProcess::spawn_command(&["validate", config.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "validate should succeed for valid config: {}",
        String::from_utf8_lossy(&output.stdout)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains(": ok"));
}

#[test]
fn validate_reports_every_issue() {
    let config = PartylineProcess::fixture_path("invalid.yaml");
    let output = PartylineProcess::spawn_command(&[
        "validate",
        "--format",
        "json",
        config.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(2));

    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("output should be valid JSON");
    let report = &parsed[0];
    assert_eq!(report["valid"], false);
    assert_eq!(report["errors"].as_array().map(Vec::len), Some(3));
}

#[test]
fn validate_unknown_field_fails() {
    let config = PartylineProcess::fixture_path("malformed.yaml");
    let output = PartylineProcess::spawn_command(&["validate", config.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stdout).contains("unknown_knob"));
}

#[test]
fn validate_missing_file() {
    let output =
        PartylineProcess::spawn_command(&["validate", "/tmp/nonexistent_partyline_config.yaml"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("file not found"));
}

#[test]
fn run_with_missing_config_fails() {
    let output = PartylineProcess::spawn_command(&[
        "run",
        "--config",
        "/tmp/nonexistent_partyline_config.yaml",
    ]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn version_json_lists_games() {
    let output = PartylineProcess::spawn_command(&["version", "--format", "json"]);
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["name"], "partyline");
    assert_eq!(parsed["games"], serde_json::json!(["spycheck", "spyfall"]));
}

#[test]
fn completions_bash() {
    let output = PartylineProcess::spawn_command(&["completions", "bash"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("partyline"));
}

#[test]
fn unknown_subcommand_is_usage_error() {
    let output = PartylineProcess::spawn_command(&["explode"]);
    assert!(!output.status.success());
}
