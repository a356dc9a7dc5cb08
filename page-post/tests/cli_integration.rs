//! Integration tests for page-post
//!
//! Nothing here reaches the network: the Graph API base URLs point at a
//! closed local port.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn setup_test_env() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");

    fs::write(
        &config_path,
        r#"
[page]
id = "1001"

[api]
base_url = "http://127.0.0.1:9"
video_base_url = "http://127.0.0.1:9"
timeout = "5s"
"#,
    )
    .unwrap();

    (temp_dir, config_path)
}

fn page_post(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("page-post").unwrap();
    cmd.current_dir(dir)
        .env_remove("PAGECAST_CONFIG")
        .env_remove("PAGECAST_PAGE_ID")
        .env("PAGECAST_ACCESS_TOKEN", "test-token")
        .env_remove("PAGECAST_LOG_FORMAT")
        .env_remove("PAGECAST_LOG_LEVEL")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_missing_file_is_invalid_input() {
    let (temp_dir, config_path) = setup_test_env();

    page_post(temp_dir.path())
        .arg("--config")
        .arg(&config_path)
        .arg("absent.jpg")
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Not a file"));
}

#[test]
fn test_unsupported_type_exit_code() {
    let (temp_dir, config_path) = setup_test_env();
    let notes = temp_dir.path().join("notes.txt");
    fs::write(&notes, b"hello").unwrap();

    let output = page_post(temp_dir.path())
        .arg("--config")
        .arg(&config_path)
        .arg(&notes)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Unsupported file type"));
    assert!(String::from_utf8(output.stdout).unwrap().trim().is_empty());
    assert!(notes.exists());
}

#[test]
fn test_invalid_output_format() {
    let (temp_dir, config_path) = setup_test_env();
    let photo = temp_dir.path().join("photo.jpg");
    fs::write(&photo, b"jpeg").unwrap();

    page_post(temp_dir.path())
        .arg("--config")
        .arg(&config_path)
        .arg("--format")
        .arg("xml")
        .arg(&photo)
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Invalid output format"));
}

#[test]
fn test_missing_token_is_config_error() {
    let (temp_dir, config_path) = setup_test_env();
    let photo = temp_dir.path().join("photo.jpg");
    fs::write(&photo, b"jpeg").unwrap();

    page_post(temp_dir.path())
        .env_remove("PAGECAST_ACCESS_TOKEN")
        .arg("--config")
        .arg(&config_path)
        .arg(&photo)
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("access_token_file"));
}

#[test]
fn test_transport_failure_keeps_file() {
    let (temp_dir, config_path) = setup_test_env();
    let clip = temp_dir.path().join("clip.mp4");
    fs::write(&clip, b"mp4").unwrap();

    page_post(temp_dir.path())
        .arg("--config")
        .arg(&config_path)
        .arg("--story")
        .arg(&clip)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error:"));

    assert!(clip.exists());
    assert!(!temp_dir.path().join("posted").join("clip.mp4").exists());
}

#[test]
fn test_failed_file_is_never_quarantined() {
    let (temp_dir, config_path) = setup_test_env();
    let mut content = fs::read_to_string(&config_path).unwrap();
    content.push_str("\n[directories]\nquarantine = \"failed\"\n\n[schedule]\nmax_attempts = 1\n");
    fs::write(&config_path, content).unwrap();
    fs::create_dir_all(temp_dir.path().join("failed")).unwrap();
    let clip = temp_dir.path().join("clip.mp4");
    fs::write(&clip, b"mp4").unwrap();

    page_post(temp_dir.path())
        .arg("--config")
        .arg(&config_path)
        .arg("--story")
        .arg(&clip)
        .assert()
        .failure()
        .code(1);

    assert!(clip.exists());
    assert!(!temp_dir.path().join("failed").join("clip.mp4").exists());
}
