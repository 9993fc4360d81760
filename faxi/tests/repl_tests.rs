//! Drives the built `faxi` binary by feeding it scripted stdin, the way a
//! user would type lines at the `> ` prompt.

use assert_cmd::Command;
use predicates::prelude::*;

fn faxi() -> Command {
    Command::cargo_bin("faxi").unwrap()
}

#[test]
fn a_var_declared_on_one_line_is_visible_on_the_next() {
    faxi()
        .write_stdin("var x = 5;\nprint(x);\n")
        .assert()
        .success()
        .stdout("> > 5\n> ");
}

#[test]
fn each_line_sees_the_prior_lines_mutations() {
    faxi()
        .write_stdin("var a = 1;\na = a + 1;\nprint(a);\n")
        .assert()
        .success()
        .stdout("> > > > 2\n> ");
}

#[test]
fn a_parse_error_is_skipped_and_the_session_continues() {
    faxi()
        .write_stdin("var x = ;\nprint(1);\n")
        .assert()
        .success()
        .stdout("> > 1\n> ")
        .stderr(predicate::str::is_empty());
}

#[test]
fn a_runtime_error_prints_and_the_session_continues() {
    faxi()
        .write_stdin("var x = { a: int = 1; };\nx.a = \"oops\";\nprint(1);\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("1\n"))
        .stderr(predicate::str::contains("satisfy").or(predicate::str::contains("constraint")));
}

#[test]
fn empty_session_just_prints_the_prompt() {
    faxi().write_stdin("").assert().success().stdout("> ");
}

#[test]
fn verbose_flag_dumps_ir_per_line() {
    faxi()
        .arg("-v")
        .write_stdin("print(1);\n")
        .assert()
        .success()
        .stdout("> 1\n> ")
        .stderr(predicate::str::contains("fn "));
}
