//! CLI integration tests
//!
//! Tests the sshbridge CLI using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;

fn sshbridge() -> Command {
    let mut cmd = Command::cargo_bin("sshbridge")
        .expect("Failed to locate sshbridge binary - ensure it's built before running tests");
    cmd.env_remove("SSHBRIDGE_CONFIG").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_help() {
    sshbridge()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sshbridge"))
        .stdout(predicate::str::contains("Terminal and file transfer client"));
}

#[test]
fn test_cli_version() {
    sshbridge()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sshbridge"));
}

#[test]
fn test_cli_lists_commands() {
    let output = sshbridge().arg("--help").output().unwrap();
    let help = String::from_utf8_lossy(&output.stdout);
    for command in ["login", "logout", "change-password", "list", "connect", "download", "upload"] {
        assert!(help.contains(command), "help is missing {}", command);
    }
}

#[test]
fn test_cli_list_help() {
    sshbridge()
        .args(["list", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--with-prod"));
}

#[test]
fn test_cli_connect_requires_server() {
    sshbridge()
        .arg("connect")
        .assert()
        .failure()
        .stderr(predicate::str::contains("<SERVER>"));
}

#[test]
fn test_cli_upload_help() {
    sshbridge()
        .args(["upload", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Remote target path"));
}

#[test]
fn test_cli_invalid_command() {
    sshbridge().arg("invalid-command").assert().failure();
}

#[test]
fn test_cli_config_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    sshbridge()
        .args(["config", "path", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_cli_config_show_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    sshbridge()
        .args(["config", "show", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("production_marker = \"PROD\""))
        .stdout(predicate::str::contains("settle_delay_ms = 1000"));
}

#[test]
fn test_cli_config_set_then_get() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    sshbridge()
        .args(["config", "set", "bridge.api_url", "http://127.0.0.1:9"])
        .arg("--config")
        .arg(&path)
        .assert()
        .success();

    sshbridge()
        .args(["config", "get", "bridge.api_url", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("http://127.0.0.1:9"));
}

#[test]
fn test_cli_config_get_unknown_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    sshbridge()
        .args(["config", "get", "bridge.nothing", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Key not found"));
}

#[test]
fn test_cli_status_without_login() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[bridge]\napi_url = \"http://127.0.0.1:9\"\n").unwrap();

    sshbridge()
        .arg("--config")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Not logged in"))
        .stdout(predicate::str::contains("http://127.0.0.1:9"));
}

#[test]
fn test_cli_logout_keeps_username() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "").unwrap();
    std::fs::write(
        dir.path().join("credentials.toml"),
        "token = \"abc\"\nusername = \"alice\"\n",
    )
    .unwrap();

    sshbridge()
        .arg("logout")
        .arg("--config")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged out successfully."));

    let credentials = std::fs::read_to_string(dir.path().join("credentials.toml")).unwrap();
    assert!(!credentials.contains("abc"));
    assert!(credentials.contains("alice"));
}

#[test]
fn test_cli_upload_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "").unwrap();

    sshbridge()
        .args(["upload", "web-1"])
        .arg(dir.path().join("missing.bin"))
        .arg("--config")
        .arg(&path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("missing.bin"));
}
