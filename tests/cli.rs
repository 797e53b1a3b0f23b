//! Integration tests for the `swarm-upload` binary: flag validation, exit
//! codes and a full run against a mock Bee node.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to get a Command instance with no Bee settings leaking in from
/// the environment.
fn swarm_upload() -> Command {
    let mut cmd = Command::cargo_bin("swarm-upload").expect("Failed to find swarm-upload binary");
    cmd.env_remove("BEE_NODE_URL").env_remove("STAMP_BATCH_ID");
    cmd
}

#[test]
fn help_lists_flags() {
    swarm_upload()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--file-path"))
        .stdout(predicate::str::contains("--stamp-batch-id"))
        .stdout(predicate::str::contains("--redundancy-level"));
}

#[test]
fn missing_bee_node_url_fails() {
    swarm_upload()
        .args(["--file-path", "https://example.com/a.png", "--stamp-batch-id", "b"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--bee-node-url"));
}

#[test]
fn redundancy_level_out_of_range_fails_before_network() {
    // Nothing listens on port 9; reaching the network would fail differently.
    swarm_upload()
        .args([
            "--file-path",
            "https://example.com/a.png",
            "--bee-node-url",
            "http://127.0.0.1:9",
            "--stamp-batch-id",
            "b",
            "--redundancy-level",
            "5",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("redundancy-level"));
}

#[test]
fn unknown_local_file_fails() {
    let dir = tempdir().unwrap();
    swarm_upload()
        .current_dir(dir.path())
        .args([
            "--file-path",
            "missing.txt",
            "--bee-node-url",
            "http://127.0.0.1:9",
            "--stamp-batch-id",
            "b",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("file not found"));
}

#[tokio::test(flavor = "multi_thread")]
async fn uploads_local_file_and_writes_log() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bzz"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "reference": "abc123" })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    fs::write(dir.path().join("hello.md"), b"# hi").unwrap();
    let work = dir.path().to_path_buf();
    let uri = server.uri();

    let output = tokio::task::spawn_blocking(move || {
        swarm_upload()
            .current_dir(&work)
            .args([
                "--file-path",
                "hello.md",
                "--bee-node-url",
                uri.as_str(),
                "--stamp-batch-id",
                "b",
                "--temp-dir",
                work.to_str().unwrap(),
                "--no-progress",
            ])
            .assert()
            .success()
            .get_output()
            .clone()
    })
    .await
    .unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Filename: hello.md"));
    assert!(stdout.contains("ReferenceHash: abc123"));
    assert!(stdout.contains("https://gateway.ethswarm.org/access/abc123"));
    assert_eq!(
        fs::read_dir(dir.path().join("swarm_upload_logs")).unwrap().count(),
        1
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_item_gives_non_zero_exit_after_processing_all() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bzz"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "reference": "abc123" })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    fs::write(dir.path().join("ok.bin"), b"ok").unwrap();
    fs::write(dir.path().join("list.txt"), "nothere.bin\nok.bin\n").unwrap();
    let work = dir.path().to_path_buf();
    let uri = server.uri();

    tokio::task::spawn_blocking(move || {
        swarm_upload()
            .current_dir(&work)
            .args([
                "--file-path",
                "list.txt",
                "--bee-node-url",
                uri.as_str(),
                "--stamp-batch-id",
                "b",
                "--temp-dir",
                work.to_str().unwrap(),
                "--no-progress",
            ])
            .assert()
            .failure()
            .stdout(predicate::str::contains("ReferenceHash: abc123"))
            .stderr(predicate::str::contains("1 of 2 files failed"));
    })
    .await
    .unwrap();
}
