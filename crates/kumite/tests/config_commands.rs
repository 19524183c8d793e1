//! CLI tests for the config subcommands.

use assert_cmd::Command;
use predicates::prelude::*;

fn kumite() -> Command {
    Command::cargo_bin("kumite").unwrap()
}

#[test]
fn config_init_writes_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kumite.toml");

    kumite()
        .args(["--config", path.to_str().unwrap(), "config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote"));

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("baud_rate = 115200"));
    assert!(content.contains("gyakuZuki"));
}

#[test]
fn config_init_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kumite.toml");
    std::fs::write(&path, "# existing\n").unwrap();

    kumite()
        .args(["--config", path.to_str().unwrap(), "config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("refusing to overwrite"));
}

#[test]
fn config_show_prints_effective_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kumite.toml");
    std::fs::write(&path, "[server]\nport = 9000\n").unwrap();

    kumite()
        .args(["--config", path.to_str().unwrap(), "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("port = 9000"))
        .stdout(predicate::str::contains("device = \"/dev/ttyUSB0\""));
}

#[test]
fn config_show_rejects_invalid_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kumite.toml");
    std::fs::write(&path, "[aggregate]\nlabels = []\n").unwrap();

    kumite()
        .args(["--config", path.to_str().unwrap(), "config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config"));
}
