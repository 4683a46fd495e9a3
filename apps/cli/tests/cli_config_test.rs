//! Integration tests for configuration loading and the `confcache config` command.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn confcache(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("confcache").unwrap();
    cmd.current_dir(temp_dir.path())
        .env_remove("CONFCACHE_ENABLED")
        .env_remove("CONFCACHE_CAPACITY")
        .env_remove("CONFCACHE_REFRESH_INTERVAL_MS")
        .env_remove("CONFCACHE_FETCH_TIMEOUT_MS");
    cmd
}

#[test]
fn test_config_defaults() {
    let temp_dir = TempDir::new().unwrap();

    confcache(&temp_dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[cache]"))
        .stdout(predicate::str::contains("enabled = true"))
        .stdout(predicate::str::contains("capacity = 500"))
        .stdout(predicate::str::contains("refresh_interval_ms = 300000"))
        .stdout(predicate::str::contains("fetch_timeout_ms = 10000"));
}

#[test]
fn test_config_file_in_current_directory() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("confcache.toml"), "[cache]\ncapacity = 42\n").unwrap();

    confcache(&temp_dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("capacity = 42"))
        .stdout(predicate::str::contains("refresh_interval_ms = 300000"));
}

#[test]
fn test_precedence_flags_over_env_over_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("custom.toml");
    std::fs::write(&path, "[cache]\ncapacity = 42\nfetch_timeout_ms = 1000\nrefresh_interval_ms = 5000\n")
        .unwrap();

    confcache(&temp_dir)
        .env("CONFCACHE_CAPACITY", "64")
        .env("CONFCACHE_FETCH_TIMEOUT_MS", "2000")
        .arg("--config")
        .arg(&path)
        .arg("--capacity")
        .arg("7")
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("capacity = 7"))
        .stdout(predicate::str::contains("fetch_timeout_ms = 2000"))
        .stdout(predicate::str::contains("refresh_interval_ms = 5000"));
}

#[test]
fn test_no_cache_flag() {
    let temp_dir = TempDir::new().unwrap();

    confcache(&temp_dir)
        .arg("--no-cache")
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("enabled = false"));
}

#[test]
fn test_missing_config_file_fails() {
    let temp_dir = TempDir::new().unwrap();

    confcache(&temp_dir)
        .arg("--config")
        .arg("nope.toml")
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn test_invalid_values_fail() {
    let temp_dir = TempDir::new().unwrap();

    confcache(&temp_dir)
        .env("CONFCACHE_CAPACITY", "lots")
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFCACHE_CAPACITY"));

    confcache(&temp_dir)
        .arg("--capacity")
        .arg("0")
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid capacity"));
}
