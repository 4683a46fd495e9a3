//! Integration tests for the `confcache watch` command.

use assert_cmd::Command;
use predicates::prelude::*;
use std::thread;
use std::time::Duration;
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
fn test_watch_reports_summary_when_nothing_changes() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("app.toml"), "level = 1").unwrap();

    confcache(&temp_dir)
        .arg("watch")
        .arg("app.toml")
        .arg("--interval-ms")
        .arg("50")
        .arg("--duration-secs")
        .arg("1")
        .assert()
        .success()
        .stdout(predicate::str::contains("watching 1 key(s)"))
        .stdout(predicate::str::contains("changed").not())
        .stdout(predicate::str::contains("refreshed=0"));
}

#[test]
fn test_watch_reports_changes_and_removals() {
    let temp_dir = TempDir::new().unwrap();
    let app = temp_dir.path().join("app.toml");
    let flags = temp_dir.path().join("flags.json");
    std::fs::write(&app, "level = 1").unwrap();
    std::fs::write(&flags, "{}").unwrap();

    let writer = {
        let app = app.clone();
        let flags = flags.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(600));
            std::fs::write(&app, "level = 2").unwrap();
            std::fs::remove_file(&flags).unwrap();
        })
    };

    confcache(&temp_dir)
        .arg("watch")
        .arg("app.toml")
        .arg("flags.json")
        .arg("--interval-ms")
        .arg("50")
        .arg("--duration-secs")
        .arg("3")
        .assert()
        .success()
        .stdout(predicate::str::contains("watching 2 key(s)"))
        .stdout(predicate::str::contains("changed app.toml: level = 2"))
        .stdout(predicate::str::contains("removed flags.json"));

    writer.join().unwrap();
}

#[test]
fn test_watch_fails_without_loadable_keys() {
    let temp_dir = TempDir::new().unwrap();

    confcache(&temp_dir)
        .arg("watch")
        .arg("missing.toml")
        .arg("--duration-secs")
        .arg("1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("None of the requested keys could be loaded"));
}

#[test]
fn test_watch_rejects_disabled_cache() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("app.toml"), "level = 1").unwrap();

    confcache(&temp_dir)
        .arg("--no-cache")
        .arg("watch")
        .arg("app.toml")
        .arg("--interval-ms")
        .arg("50")
        .arg("--duration-secs")
        .arg("1")
        .assert()
        .failure()
        .stdout(predicate::str::contains("removed").not())
        .stderr(predicate::str::contains("watch requires caching"));
}

#[test]
fn test_watch_keeps_keys_evicted_for_space() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("a.toml"), "a = 1").unwrap();
    std::fs::write(temp_dir.path().join("b.toml"), "b = 1").unwrap();

    confcache(&temp_dir)
        .arg("--capacity")
        .arg("1")
        .arg("watch")
        .arg("a.toml")
        .arg("b.toml")
        .arg("--interval-ms")
        .arg("50")
        .arg("--duration-secs")
        .arg("1")
        .assert()
        .success()
        .stdout(predicate::str::contains("watching 2 key(s)"))
        .stdout(predicate::str::contains("removed").not())
        .stdout(predicate::str::contains("no keys left").not());
}
