//! Smoke tests for the `tether-demo` binary on its own, without the harness.

use assert_cmd::Command;
use predicates::prelude::*;

fn demo() -> Command {
    Command::cargo_bin("tether-demo").expect("tether-demo should be built")
}

#[test]
fn version_subcommand() {
    demo()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::eq("tether-demo v1.0.0\n"));
}

#[test]
fn hello_reads_an_answer_from_piped_stdin() {
    demo()
        .args(["hello", "--who", "Alice"])
        .write_stdin("cloudy\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello, Alice!"))
        .stdout(predicate::str::contains("take a jacket"));
}

#[test]
fn unrecognized_answer_keeps_the_default() {
    demo()
        .args(["hello"])
        .write_stdin("great\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello, World!"))
        .stdout(predicate::str::contains("awesome"));
}

#[test]
fn fail_writes_stderr_and_sets_exit_code() {
    demo()
        .args(["fail", "--code", "3", "went wrong"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("went wrong"));
}

#[test]
fn unknown_subcommand_is_rejected() {
    demo().arg("bogus").assert().failure();
}
