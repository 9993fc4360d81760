//! Drives the built `interp` binary end to end, covering the six seeded
//! scenarios from the spec's testable-properties section and the
//! `<script> [args...] [-v]` CLI surface.

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

fn interp() -> Command {
    Command::cargo_bin("interp").unwrap()
}

fn script(src: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(src.as_bytes()).unwrap();
    f
}

#[test]
fn scenario_1_arithmetic_precedence() {
    let f = script("print(1 + 2 * 3);");
    interp().arg(f.path()).assert().success().stdout("7\n");
}

#[test]
fn scenario_2_method_recursion_with_this() {
    let f = script(
        "var f = method(n) { if (n <= 1) return 1; return n * this.f(n - 1); }; \
         var o = new { f = f; }; print(o.f(5));",
    );
    interp().arg(f.path()).assert().success().stdout("120\n");
}

#[test]
fn scenario_3_array_push_and_length() {
    let f = script("var a = [10, 20, 30]; a.push(40); print(a[3]); print(a.length);");
    interp().arg(f.path()).assert().success().stdout("40\n4\n");
}

#[test]
fn scenario_4_shadowing_assign_requires_existing_key() {
    let f = script("var x = { a = 1; }; x.a = 2; print(x.a); x.b = 3;");
    interp()
        .arg(f.path())
        .assert()
        .failure()
        .code(1)
        .stdout("2\n")
        .stderr(predicate::str::contains("key 'b' not found"));
}

#[test]
fn scenario_5_while_loop_prints_each_iteration() {
    let f = script("var i = 0; while (i < 3) { print(i); i = i + 1; }");
    interp().arg(f.path()).assert().success().stdout("0\n1\n2\n");
}

#[test]
fn scenario_6_string_concatenation_and_equality() {
    let f = script("var s = \"ab\" + \"cd\"; print(s == \"abcd\");");
    interp().arg(f.path()).assert().success().stdout("true\n");
}

#[test]
fn arithmetic_on_a_variable_produces_a_computed_int() {
    let f = script("var x = 1 + 2; print(x);");
    interp().arg(f.path()).assert().success().stdout("3\n");
}

#[test]
fn positional_args_become_the_arguments_array() {
    let f = script("print(arguments[0]); print(arguments.length);");
    interp().arg(f.path()).arg("hello").assert().success().stdout("hello\n1\n");
}

#[test]
fn verbose_flag_dumps_ir_and_cycle_count_to_stderr() {
    let f = script("print(1);");
    interp()
        .arg(f.path())
        .arg("-v")
        .assert()
        .success()
        .stdout("1\n")
        .stderr(predicate::str::contains("cycles:"));
}

#[test]
fn missing_script_argument_exits_nonzero() {
    interp().assert().failure().code(1);
}

#[test]
fn nonexistent_script_path_exits_nonzero() {
    interp().arg("/no/such/script.fax").assert().failure().code(1);
}

#[test]
fn parse_error_exits_nonzero_with_message() {
    let f = script("var x = ;");
    interp().arg(f.path()).assert().failure().code(1).stderr(predicate::str::contains("error:"));
}
