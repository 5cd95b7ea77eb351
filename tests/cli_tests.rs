//! End-to-end tests of the `listvault` binary.

use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn resources_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("resources")
}

fn listvault(documents: &Path) -> Command {
    let mut cmd = Command::cargo_bin("listvault").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("LISTVAULT_MODEL")
        .env("LISTVAULT_PASSPHRASE", "integration-secret")
        .arg("--documents")
        .arg(documents)
        .arg("--resources")
        .arg(resources_dir());
    cmd
}

fn stdout_json(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.arg("--json").assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).unwrap()
}

#[test]
fn test_init_creates_store() {
    let dir = TempDir::new().unwrap();
    let value = stdout_json(listvault(dir.path()).arg("init"));

    assert_eq!(value["model"], "Lists");
    assert_eq!(value["created"], true);
    assert!(dir.path().join("Lists.sqlite").exists());

    let again = stdout_json(listvault(dir.path()).arg("init"));
    assert_eq!(again["created"], false);
}

#[test]
fn test_add_then_count_and_list() {
    let dir = TempDir::new().unwrap();
    let added = stdout_json(
        listvault(dir.path())
            .args(["add", "List", "--set", "name=Groceries", "--set", "position=1"]),
    );
    assert_eq!(added["entity"], "List");
    assert_eq!(added["attributes"]["archived"], false);

    let count = stdout_json(listvault(dir.path()).args(["count", "List"]));
    assert_eq!(count["count"], 1);

    let listed = stdout_json(listvault(dir.path()).args(["list", "List"]));
    assert_eq!(listed[0]["attributes"]["name"], "Groceries");
    assert_eq!(listed[0]["id"], added["id"]);
}

#[test]
fn test_store_contents_are_encrypted() {
    let dir = TempDir::new().unwrap();
    listvault(dir.path())
        .args(["add", "Item", "--set", "title=unmistakable-plaintext-marker"])
        .assert()
        .success();

    let mut bytes = std::fs::read(dir.path().join("Lists.sqlite")).unwrap();
    if let Ok(wal) = std::fs::read(dir.path().join("Lists.sqlite-wal")) {
        bytes.extend(wal);
    }
    let needle = b"unmistakable-plaintext-marker";
    assert!(!bytes.windows(needle.len()).any(|w| w == needle));
}

#[test]
fn test_validation_failure_exit_code() {
    let dir = TempDir::new().unwrap();
    let output = listvault(dir.path())
        .args(["--json", "-q", "add", "List", "--set", "position=2"])
        .assert()
        .code(4)
        .get_output()
        .stderr
        .clone();
    let error: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(error["error"]["code"], "VALIDATION_FAILED");

    let count = stdout_json(listvault(dir.path()).args(["count", "List"]));
    assert_eq!(count["count"], 0);
}

#[test]
fn test_import_jsonl() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("items.jsonl");
    std::fs::write(
        &file,
        "{\"title\": \"Milk\"}\n\n{\"title\": \"Eggs\", \"quantity\": 12}\n{\"title\": \"Bread\"}\n",
    )
    .unwrap();

    let value = stdout_json(
        listvault(dir.path())
            .args(["import", "Item", "--batch-size", "2"])
            .arg(&file),
    );
    assert_eq!(value["imported"], 3);
    assert_eq!(value["batches"], 2);

    let count = stdout_json(listvault(dir.path()).args(["count", "Item"]));
    assert_eq!(count["count"], 3);
}

#[test]
fn test_wrong_passphrase_is_setup_error() {
    let dir = TempDir::new().unwrap();
    listvault(dir.path()).arg("init").assert().success();

    listvault(dir.path())
        .env("LISTVAULT_PASSPHRASE", "not-the-secret")
        .args(["count", "List"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_passphrase() {
    let dir = TempDir::new().unwrap();
    listvault(dir.path())
        .env_remove("LISTVAULT_PASSPHRASE")
        .arg("init")
        .assert()
        .code(6);
}

#[test]
fn test_corrupt_store_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("Lists.sqlite"), b"").unwrap();

    listvault(dir.path()).arg("init").assert().code(2);
}

#[test]
fn test_unknown_model() {
    let dir = TempDir::new().unwrap();
    listvault(dir.path())
        .args(["--model", "Recipes", "init"])
        .assert()
        .code(3);
}

#[test]
fn test_info_reports_counts() {
    let dir = TempDir::new().unwrap();
    listvault(dir.path())
        .args(["add", "Item", "--set", "title=Tea"])
        .assert()
        .success();

    let info = stdout_json(listvault(dir.path()).arg("info"));
    assert_eq!(info["model"], "Lists");
    assert_eq!(info["stored_model_version"], 1);
    assert_eq!(info["counts"]["Item"], 1);
    assert_eq!(info["counts"]["List"], 0);
}
