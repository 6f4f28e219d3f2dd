//! Regression test: the `glyphc` binary renders compile failures as miette
//! diagnostics on stderr and exits non-zero, without writing an output
//! file. Modeled on the teacher's `tests/cli_regression.rs` use of
//! `assert_cmd`/`predicates`.

use std::fs;

use assert_cmd::Command;
use predicates::str::contains;

#[test]
fn cli_reports_a_diagnostic_on_unbalanced_input() {
    let bad_file = "tests/bad_script.hql";
    fs::write(bad_file, "(defn add (x y) (+ x y)").unwrap();

    let mut cmd = Command::cargo_bin("glyphc").unwrap();
    cmd.arg(bad_file);
    cmd.assert().failure().stderr(contains("glyph::parse_error"));

    let _ = fs::remove_file(bad_file);
    let _ = fs::remove_file("tests/bad_script.js");
}

#[test]
fn cli_compiles_a_valid_file_to_js_alongside_it() {
    let good_file = "tests/good_script.hql";
    fs::write(good_file, "(defn add (x y) (+ x y))").unwrap();

    let mut cmd = Command::cargo_bin("glyphc").unwrap();
    cmd.arg(good_file);
    cmd.assert().success();

    let output = fs::read_to_string("tests/good_script.js").unwrap();
    assert!(output.contains("function add(x, y)"));

    let _ = fs::remove_file(good_file);
    let _ = fs::remove_file("tests/good_script.js");
}
