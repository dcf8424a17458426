use assert_cmd::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

fn repo_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("expected crates/<name> layout")
        .to_path_buf()
}

fn fixture() -> PathBuf {
    let path = repo_root().join("fixtures").join("basic.json");
    assert!(path.exists(), "fixture missing: {}", path.display());
    path
}

fn placed(report: &serde_json::Value) -> usize {
    report["classes"]
        .as_array()
        .expect("classes")
        .iter()
        .flat_map(|c| c["groups"].as_array().expect("groups").iter())
        .map(|g| g["members"].as_array().expect("members").len())
        .sum()
}

#[test]
fn cli_dispatches_fixture() {
    let exe = assert_cmd::cargo_bin!("roster-cli");
    let out = Command::new(&exe)
        .args(["dispatch", "--pretty", fixture().to_string_lossy().as_ref()])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&out).expect("json report");
    assert_eq!(report["classes"].as_array().expect("classes").len(), 3);
    assert_eq!(report["classes"][0]["class_name"], "初級");
    assert_eq!(placed(&report), 8);
    let warned = report["diagnostics"]
        .as_array()
        .expect("diagnostics")
        .iter()
        .any(|d| d["message"].as_str().is_some_and(|m| m.contains("不認識")));
    assert!(warned, "unknown introducer should be reported");
}

#[test]
fn cli_reads_stdin_and_config_file() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let config = tmp.path().join("roster.json");
    fs::write(&config, r#"{ "synthetic_id_base": 7000, "average": "literal" }"#)
        .expect("write config");
    let input = fs::read_to_string(fixture()).expect("read fixture");

    let exe = assert_cmd::cargo_bin!("roster-cli");
    let out = assert_cmd::Command::new(&exe)
        .args(["--config", config.to_string_lossy().as_ref(), "--sorted", "-"])
        .write_stdin(input)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let text = String::from_utf8(out).expect("utf8");
    assert!(text.contains("7000"), "synthetic ids should start at the configured base");
    let report: serde_json::Value = serde_json::from_str(&text).expect("json report");
    assert_eq!(placed(&report), 8);
}

#[test]
fn cli_check_prints_summary() {
    let exe = assert_cmd::cargo_bin!("roster-cli");
    let out = Command::new(&exe)
        .args(["check", fixture().to_string_lossy().as_ref()])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(out).expect("utf8");
    assert!(text.contains("4 leaders, 8 candidates, 0 warnings"), "{text}");
}

#[test]
fn cli_exit_codes() {
    let exe = assert_cmd::cargo_bin!("roster-cli");
    Command::new(&exe)
        .arg("--no-such-flag")
        .assert()
        .failure()
        .code(2);

    Command::new(&exe)
        .args([
            "--set",
            "max_iterations=0",
            fixture().to_string_lossy().as_ref(),
        ])
        .assert()
        .failure()
        .code(1);

    let tmp = tempfile::tempdir().expect("tempdir");
    let missing = tmp.path().join("missing.json");
    Command::new(&exe)
        .arg(missing.to_string_lossy().as_ref())
        .assert()
        .failure()
        .code(1);
}
