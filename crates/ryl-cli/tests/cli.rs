//! Binary-level tests for the non-interactive surfaces.

use assert_cmd::Command;
use predicates::prelude::*;

fn ryl(home: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ryl").unwrap();
    cmd.env("RYL_HOME", home.path());
    cmd
}

#[test]
fn help_lists_the_subcommands() {
    let home = tempfile::tempdir().unwrap();
    ryl(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("exec"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn exec_echo_prints_stream_and_result() {
    let home = tempfile::tempdir().unwrap();
    ryl(&home)
        .args(["exec", "--echo", "1+1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1+1"))
        .stdout(predicate::str::contains(" => 1+1"));
}

#[test]
fn exec_pipes_source_to_the_runtime_command() {
    let home = tempfile::tempdir().unwrap();
    ryl(&home)
        .args(["exec", "--command", "cat", "hello"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hello"));
}

#[test]
fn exec_runtime_error_exits_non_zero() {
    let home = tempfile::tempdir().unwrap();
    ryl(&home)
        .args(["exec", "--command", "exit 7", ""])
        .assert()
        .failure()
        .stderr(predicate::str::contains("7"));
}

#[test]
fn config_path_honors_the_home_override() {
    let home = tempfile::tempdir().unwrap();
    ryl(&home)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(home.path().to_str().unwrap()));
}

#[test]
fn config_show_renders_the_defaults() {
    let home = tempfile::tempdir().unwrap();
    ryl(&home)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("command = \"python3\""))
        .stdout(predicate::str::contains("eval_timeout_secs = 30"));
}

#[test]
fn config_show_reflects_the_config_file() {
    let home = tempfile::tempdir().unwrap();
    std::fs::write(
        home.path().join("config.toml"),
        "[runtime]\ncommand = \"lua\"\n",
    )
    .unwrap();
    ryl(&home)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("command = \"lua\""));
}

#[test]
fn echo_conflicts_with_a_runtime_command() {
    let home = tempfile::tempdir().unwrap();
    ryl(&home)
        .args(["exec", "--echo", "--command", "cat", "x"])
        .assert()
        .failure();
}
