//! End-to-end CLI tests against the simulated devices.

use assert_cmd::Command;
use predicates::prelude::*;

fn fast_config(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("scanner_config.toml");
    std::fs::write(
        &path,
        r#"
[transport]
frame_period_s = 0.04

[recovery]
nudge_timeout_ms = 5
resettle_ms = 1
backoff_start_ms = 1

[scan]
settle_ms = 2
lead_in_ms = 0
"#,
    )
    .unwrap();
    path
}

#[test]
fn help_lists_commands() {
    Command::cargo_bin("filmscan")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("advance"))
        .stdout(predicate::str::contains("fast-forward"))
        .stdout(predicate::str::contains("self-check"));
}

#[test]
fn self_check_passes_in_sim_mode() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config(dir.path());
    Command::cargo_bin("filmscan")
        .unwrap()
        .args(["--config", config.to_str().unwrap(), "self-check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("self-check: ok"));
}

#[test]
fn scan_writes_frames_and_session_log() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config(dir.path());
    let output = dir.path().join("reel");

    Command::cargo_bin("filmscan")
        .unwrap()
        .args([
            "--config",
            config.to_str().unwrap(),
            "scan",
            "--output",
            output.to_str().unwrap(),
            "-n",
            "3",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Finished scanning 3 frames"));

    for i in 0..3 {
        assert!(output.join(format!("frame-{i:05}.dng")).exists());
    }
    assert!(output.join("scanner.log").exists());
}

#[test]
fn status_emits_json() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config(dir.path());
    let out = Command::cargo_bin("filmscan")
        .unwrap()
        .args(["--config", config.to_str().unwrap(), "status"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(value["is_scanning"], serde_json::json!(false));
    assert_eq!(value["current_frame_index"], serde_json::json!(0));
}

#[test]
fn invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("bad.toml");
    std::fs::write(&config, "[transport]\nspeed_rpm = -1.0\n").unwrap();

    Command::cargo_bin("filmscan")
        .unwrap()
        .args(["--config", config.to_str().unwrap(), "status"])
        .assert()
        .failure();
}
