//! CLI integration tests
//!
//! Runs the signalctl binary against a temporary SQLite catalog and the
//! in-process engine.

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
    config: PathBuf,
}

/// A temp dir with a config pointing at `catalog.db` and `memory://`.
fn workspace() -> Workspace {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    let catalog = dir.path().join("catalog.db");
    std::fs::write(
        &config,
        format!(
            "metadata_store = \"{}\"\nlog_level = \"warn\"\n\n[tsdb]\nurl = \"memory://\"\n\n[retry]\nmax_attempts = 1\n",
            catalog.display()
        ),
    )
    .unwrap();
    Workspace { dir, config }
}

fn signalctl(ws: &Workspace, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_signalctl"))
        .arg("--config")
        .arg(&ws.config)
        .args(args)
        .env("HOME", ws.dir.path())
        .env_remove("METADATA_STORE")
        .env_remove("TSDB_URL")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute signalctl")
}

fn json_stdout(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "signalctl failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn create_motor(ws: &Workspace) {
    json_stdout(&signalctl(
        ws,
        &["category", "create", "motor", "--name", "Motor", "--database", "plant"],
    ));
    json_stdout(&signalctl(
        ws,
        &["signal", "add", "motor", "current", "--type", "numeric", "--order", "1"],
    ));
    json_stdout(&signalctl(
        ws,
        &["signal", "add", "motor", "status", "--type", "string", "--order", "2"],
    ));
}

#[test]
fn test_help_flag() {
    let output = Command::new(env!("CARGO_BIN_EXE_signalctl"))
        .arg("--help")
        .output()
        .expect("Failed to execute signalctl");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("signalctl"));
    for command in ["category", "signal", "asset", "feature", "stream"] {
        assert!(stdout.contains(command), "help should list {}", command);
    }
}

#[test]
fn test_invalid_subcommand_fails() {
    let ws = workspace();
    assert!(!signalctl(&ws, &["nonexistent-command"]).status.success());
}

#[test]
fn test_catalog_persists_between_invocations() {
    let ws = workspace();
    create_motor(&ws);

    let categories = json_stdout(&signalctl(&ws, &["category", "list"]));
    assert_eq!(categories.as_array().unwrap().len(), 1);
    assert_eq!(categories[0]["code"], "motor");

    let signals = json_stdout(&signalctl(&ws, &["signal", "list", "motor"]));
    let codes: Vec<&str> = signals
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["code"].as_str().unwrap())
        .collect();
    assert_eq!(codes, vec!["current", "status"]);
}

#[test]
fn test_sync_reports_created_super_table() {
    let ws = workspace();
    create_motor(&ws);

    let result = json_stdout(&signalctl(&ws, &["category", "sync", "motor"]));
    assert_eq!(result["action"], "created");
    assert_eq!(result["super_table"], "raw_motor");

    let category = json_stdout(&signalctl(&ws, &["category", "show", "motor"]));
    assert_eq!(category["schema_fingerprint"], result["fingerprint"]);
}

#[test]
fn test_sync_all_skips_disabled_categories() {
    let ws = workspace();
    create_motor(&ws);
    json_stdout(&signalctl(
        &ws,
        &["category", "create", "pump", "--name", "Pump", "--database", "plant"],
    ));
    json_stdout(&signalctl(
        &ws,
        &["signal", "add", "pump", "pressure", "--type", "numeric"],
    ));
    assert!(signalctl(&ws, &["category", "disable", "pump"]).status.success());

    let report = json_stdout(&signalctl(&ws, &["category", "sync", "--all"]));
    assert_eq!(report["motor"]["action"], "created");
    assert!(report.get("pump").is_none());
}

#[test]
fn test_feature_register_and_compile() {
    let ws = workspace();
    create_motor(&ws);

    let feature = write_file(
        ws.dir.path(),
        "avg_current_1h.json",
        r#"{"name":"avg_current_1h","source_signal":"current","function":"avg","window":"1h","slide_interval":"10m"}"#,
    );
    let registered = json_stdout(&signalctl(
        &ws,
        &["feature", "register", "motor", feature.to_str().unwrap()],
    ));
    assert_eq!(registered["generation"], 1);

    let compiled = json_stdout(&signalctl(&ws, &["feature", "compile", "motor", "avg_current_1h"]));
    assert_eq!(compiled["stream_name"], "fs_motor_avg_current_1h_g1");
    let sql = compiled["sql"].as_str().unwrap();
    assert!(sql.contains("PARTITION BY `asset_id` INTERVAL(1h) SLIDING(10m)"));

    let task = json_stdout(&signalctl(&ws, &["stream", "create", "motor", "avg_current_1h"]));
    assert_eq!(task["status"], "created");
    let tasks = json_stdout(&signalctl(&ws, &["stream", "list", "--category", "motor"]));
    assert_eq!(tasks.as_array().unwrap().len(), 1);
}

#[test]
fn test_disallowed_function_is_rejected() {
    let ws = workspace();
    create_motor(&ws);

    let feature = write_file(
        ws.dir.path(),
        "median.json",
        r#"{"name":"median_current","source_signal":"current","function":"median","window":"1h"}"#,
    );
    let output = signalctl(
        &ws,
        &["feature", "compile", "motor", "--file", feature.to_str().unwrap()],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not allowed"));

    let features = json_stdout(&signalctl(&ws, &["feature", "list", "motor"]));
    assert!(features.as_array().unwrap().is_empty());
}

#[test]
fn test_config_init_then_show() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("signalhouse").join("config.toml");
    let run = |args: &[&str]| {
        Command::new(env!("CARGO_BIN_EXE_signalctl"))
            .arg("--config")
            .arg(&path)
            .args(args)
            .env("HOME", dir.path())
            .env_remove("METADATA_STORE")
            .env_remove("TSDB_URL")
            .output()
            .expect("Failed to execute signalctl")
    };

    assert!(run(&["config", "init"]).status.success());
    assert!(path.exists());
    assert!(!run(&["config", "init"]).status.success(), "init must not overwrite");

    let shown: Value = serde_json::from_slice(&run(&["config", "show"]).stdout).unwrap();
    assert_eq!(shown["tsdb"]["url"], "http://localhost:6041");
    assert_eq!(shown["retry"]["max_attempts"], 3);
}
