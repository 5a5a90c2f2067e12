//! End-to-end CLI tests for the timelapse-dl binary.

use std::path::Path;

use assert_cmd::Command;
use assert_cmd::assert::{Assert, OutputAssertExt};
use predicates::prelude::*;
use tempfile::TempDir;
use timelapse_dl_core::listing::ARCHIVES_PATH;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::socket_guard::{socket_skip_return, start_mock_server_or_skip};

macro_rules! require_mock_server {
    () => {{
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return socket_skip_return();
        };
        mock_server
    }};
}

/// Binary with an isolated config directory and no inherited password.
fn command(config_home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("timelapse-dl").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home)
        .env_remove("TIMELAPSE_PASS")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

fn host_of(server: &MockServer) -> String {
    server.uri().trim_start_matches("http://").to_string()
}

async fn mount_listing(server: &MockServer, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/{ARCHIVES_PATH}")))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .with_priority(10)
        .mount(server)
        .await;
}

async fn mount_archive(server: &MockServer, id: &str, status: u16, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/{ARCHIVES_PATH}")))
        .and(query_param("export", id))
        .respond_with(ResponseTemplate::new(status).set_body_bytes(body.to_vec()))
        .with_priority(1)
        .mount(server)
        .await;
}

/// Runs the prepared command off the async runtime so the mock camera keeps serving.
async fn run(mut cmd: Command) -> Assert {
    let output = tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap();
    output.assert()
}

#[test]
fn test_binary_help_displays_usage() {
    let config = TempDir::new().unwrap();
    command(config.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--rate-limit"))
        .stdout(predicate::str::contains("--check-size"));
}

#[test]
fn test_binary_version_displays_version() {
    let config = TempDir::new().unwrap();
    command(config.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("timelapse-dl"));
}

#[test]
fn test_binary_invalid_flag_returns_error() {
    let config = TempDir::new().unwrap();
    command(config.path())
        .arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_missing_credentials_fails_before_network() {
    let config = TempDir::new().unwrap();
    command(config.path())
        .args(["--host", "127.0.0.1:9"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Missing username"))
        .stdout(predicate::str::contains("Fetching").not());
}

#[test]
fn test_invalid_config_file_is_reported() {
    let config = TempDir::new().unwrap();
    let file = config.path().join("custom.toml");
    std::fs::write(&file, "concurrency = 4\n").unwrap();

    command(config.path())
        .arg("--config")
        .arg(&file)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to parse config file"));
}

#[test]
fn test_unreachable_camera_exits_2() {
    let config = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    command(config.path())
        .args(["--host", "127.0.0.1:9", "--user", "root", "--pass", "pw"])
        .args(["--timeout", "2", "--no-progress"])
        .arg("--outdir")
        .arg(out.path())
        .assert()
        .code(2)
        .stdout(predicate::str::contains(
            "Fetching timelapse archives from 127.0.0.1:9...",
        ))
        .stderr(predicate::str::contains("ERROR: Failed to fetch archives"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_listing_server_error_exits_2() {
    let mock_server = require_mock_server!();
    mount_listing(&mock_server, 500, "").await;
    let config = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    let mut cmd = command(config.path());
    cmd.args(["--host", host_of(&mock_server).as_str(), "-u", "root", "--pass", "pw"])
        .arg("--outdir")
        .arg(out.path());

    run(cmd)
        .await
        .code(2)
        .stderr(predicate::str::contains("HTTP 500"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_empty_listing_exits_0() {
    let mock_server = require_mock_server!();
    mount_listing(&mock_server, 200, "[]").await;
    let config = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    let mut cmd = command(config.path());
    cmd.args(["--host", host_of(&mock_server).as_str(), "-u", "root", "--pass", "pw"])
        .arg("--outdir")
        .arg(out.path());

    run(cmd)
        .await
        .success()
        .stdout(predicate::str::contains("No timelapse archives found on camera."));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_successful_run_downloads_and_exits_0() {
    let mock_server = require_mock_server!();
    mount_listing(
        &mock_server,
        200,
        r#"[{"id": 1, "filename": "day1.zip"}, {"id": 2, "filename": "day2.zip"}]"#,
    )
    .await;
    mount_archive(&mock_server, "1", 200, b"first archive").await;
    mount_archive(&mock_server, "2", 200, b"second archive").await;
    let config = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    let mut cmd = command(config.path());
    cmd.args(["--host", host_of(&mock_server).as_str(), "-u", "root", "--no-progress"])
        .env("TIMELAPSE_PASS", "pw")
        .arg("--outdir")
        .arg(out.path());

    run(cmd)
        .await
        .success()
        .stdout(predicate::str::contains("Found 2 timelapse archive(s) to download."))
        .stdout(predicate::str::contains("SAVE"))
        .stdout(predicate::str::contains("Done. downloaded=2 skipped=0 failed=0"));

    assert_eq!(
        std::fs::read(out.path().join("day1.zip")).unwrap(),
        b"first archive"
    );
    assert_eq!(
        std::fs::read(out.path().join("day2.zip")).unwrap(),
        b"second archive"
    );

    // Second run finds everything in place.
    let mut cmd = command(config.path());
    cmd.args(["--host", host_of(&mock_server).as_str(), "-u", "root", "--pass", "pw"])
        .arg("--outdir")
        .arg(out.path());
    run(cmd)
        .await
        .success()
        .stdout(predicate::str::contains("Done. downloaded=0 skipped=2 failed=0"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_archive_failure_exits_1() {
    let mock_server = require_mock_server!();
    mount_listing(
        &mock_server,
        200,
        r#"[{"id": 1, "filename": "ok.zip"}, {"id": 2, "filename": "gone.zip"}]"#,
    )
    .await;
    mount_archive(&mock_server, "1", 200, b"ok").await;
    mount_archive(&mock_server, "2", 404, b"").await;
    let config = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();

    let mut cmd = command(config.path());
    cmd.args(["--host", host_of(&mock_server).as_str(), "-u", "root", "--pass", "pw"])
        .args(["--max-retries", "0", "--no-progress"])
        .arg("--outdir")
        .arg(out.path());

    run(cmd)
        .await
        .code(1)
        .stdout(predicate::str::contains("Done. downloaded=1 skipped=0 failed=1"))
        .stderr(predicate::str::contains("FAIL  gone.zip: HTTP 404"))
        .stderr(predicate::str::contains("- gone.zip: HTTP 404"));

    assert!(!out.path().join("gone.zip").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_config_file_supplies_credentials_and_host() {
    let mock_server = require_mock_server!();
    mount_listing(&mock_server, 200, "[]").await;
    let config = TempDir::new().unwrap();
    let config_dir = config.path().join("timelapse-dl");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.toml"),
        format!(
            "host = \"{}\"\nuser = \"root\"\npassword = \"pw\"\n",
            host_of(&mock_server)
        ),
    )
    .unwrap();
    let out = TempDir::new().unwrap();

    let mut cmd = command(config.path());
    cmd.arg("--outdir").arg(out.path());

    run(cmd)
        .await
        .success()
        .stdout(predicate::str::contains(format!(
            "Fetching timelapse archives from {}...",
            host_of(&mock_server)
        )));
}
