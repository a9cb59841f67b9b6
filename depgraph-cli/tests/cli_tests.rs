//! Integration tests for the `depgraph` binary.
//!
//! Runs the built binary against local seed lists so no network is needed.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

fn example_config() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("depgraph.toml.example")
}

fn write_config(dir: &Path) -> PathBuf {
    let path = dir.join("depgraph.toml");
    fs::write(
        &path,
        r#"
[general]
log_level = "warn"
log_format = "json"

[crawler]
max_iterations = 3
"#,
    )
    .expect("should write config");
    path
}

fn depgraph() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_depgraph"));
    command.env_remove("RUST_LOG");
    command
}

#[tokio::test]
async fn test_example_config_is_valid() {
    let result = depgraph_core::config::DepGraphConfig::load(example_config()).await;
    assert!(result.is_ok(), "example config should load: {result:?}");
}

#[test]
fn test_empty_seed_list_writes_empty_graph() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = write_config(temp_dir.path());
    let seeds = temp_dir.path().join("seeds.json");
    let graph = temp_dir.path().join("graph.json");
    fs::write(&seeds, "[]").expect("should write seeds");

    let output = depgraph()
        .arg("--config")
        .arg(&config)
        .arg("--seed")
        .arg(&seeds)
        .arg("--output")
        .arg(&graph)
        .args(["--format", "json"])
        .output()
        .expect("should run depgraph");

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(report["nodes"], 0);
    assert_eq!(report["iterations"], 0);

    let written = fs::read_to_string(&graph).expect("graph should be written");
    assert_eq!(written.trim(), "{}");
}

#[test]
fn test_missing_config_exits_with_config_code() {
    let output = depgraph()
        .args(["--config", "/nonexistent/depgraph.toml"])
        .output()
        .expect("should run depgraph");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_missing_seed_list_fails() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = write_config(temp_dir.path());

    let output = depgraph()
        .arg("--config")
        .arg(&config)
        .arg("--seed")
        .arg(temp_dir.path().join("absent.json"))
        .arg("--output")
        .arg(temp_dir.path().join("graph.json"))
        .output()
        .expect("should run depgraph");

    assert_eq!(output.status.code(), Some(1));
    assert!(!temp_dir.path().join("graph.json").exists());
}
