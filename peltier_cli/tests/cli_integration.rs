//! Black-box tests of the `peltier` binary.

use std::io::Write;
use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;

fn peltier() -> Command {
    let mut cmd = Command::cargo_bin("peltier").expect("binary builds");
    cmd.timeout(Duration::from_secs(20));
    cmd
}

fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).expect("create");
    f.write_all(content.as_bytes()).expect("write");
    path
}

#[test]
fn view_replays_a_session_log() {
    let dir = tempfile::tempdir().unwrap();
    let log = write_file(
        &dir,
        "session.log",
        "[00:00:00] 21.0, 19.5, 20.0\n[00:00:05] 21.3, 19.8, 20.0\nnoise\n",
    );
    peltier()
        .args(["view", "--log"])
        .arg(&log)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 records over 5s"))
        .stdout(predicate::str::contains("1 unparsed lines skipped"));
}

#[test]
fn view_emits_json_records() {
    let dir = tempfile::tempdir().unwrap();
    let log = write_file(&dir, "session.log", "[00:00:00] 21.0, 19.5, 20.0\n");
    let out = peltier()
        .args(["--json", "view", "--log"])
        .arg(&log)
        .assert()
        .success();
    let stdout = String::from_utf8(out.get_output().stdout.clone()).unwrap();
    let v: serde_json::Value = serde_json::from_str(stdout.lines().next().unwrap()).unwrap();
    assert_eq!(v["inside_temp"], 21.0);
    assert_eq!(v["elapsed_s"], 0.0);
}

#[test]
fn view_overlays_a_profile() {
    let dir = tempfile::tempdir().unwrap();
    let log = write_file(&dir, "session.log", "[00:00:00] 21.0, 19.5, 20.0\n");
    let profile = write_file(&dir, "steps.profile", "0,20\n10,25\n");
    peltier()
        .args(["view", "--log"])
        .arg(&log)
        .args(["--profile"])
        .arg(&profile)
        .args(["--start-offset-s", "30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("profile overlay (started at 30s)"))
        .stdout(predicate::str::contains("40.0s  target 25.0"));
}

#[test]
fn view_rejects_an_unusable_log() {
    let dir = tempfile::tempdir().unwrap();
    let log = write_file(&dir, "session.log", "nothing to see\n");
    peltier()
        .args(["view", "--log"])
        .arg(&log)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no usable records"));
}

#[test]
fn send_requires_a_link() {
    peltier()
        .args(["send", "--temp", "25.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--port or --sim"));
}

#[test]
fn send_to_the_simulated_device_succeeds() {
    peltier()
        .args(["send", "--sim", "--temp", "25.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("setpoint 25.0"));
}

#[test]
fn send_rejects_out_of_range_temperatures() {
    peltier()
        .args(["send", "--sim", "--temp", "99.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("between 5 and 70"));
}

#[test]
fn run_with_lag_covering_duration_completes_against_the_sim() {
    let dir = tempfile::tempdir().unwrap();
    let profile = write_file(&dir, "steps.profile", "0,20\n10,25\n");
    peltier()
        .args(["run", "--sim", "--profile"])
        .arg(&profile)
        .args(["--lag-offset-s", "150"])
        .assert()
        .success()
        .stdout(predicate::str::contains("profile completed"));
}

#[test]
fn run_rejects_a_malformed_profile() {
    let dir = tempfile::tempdir().unwrap();
    let profile = write_file(&dir, "bad.profile", "not a profile\n");
    peltier()
        .args(["run", "--sim", "--profile"])
        .arg(&profile)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load"));
}

#[test]
fn invalid_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_file(&dir, "peltier.toml", "[scheduler]\ntick_ms = 0\n");
    peltier()
        .args(["--config"])
        .arg(&cfg)
        .arg("ports")
        .assert()
        .failure()
        .stderr(predicate::str::contains("tick_ms"));
}
