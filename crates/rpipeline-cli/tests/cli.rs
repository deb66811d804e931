//! Integration tests for the `rpipeline` binary.
//!
//! Each test launches the binary via `assert_cmd`, writes any required
//! fixture files to a temp directory, and asserts on exit code + output.

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[allow(deprecated)]
fn rpipeline() -> Command {
    Command::cargo_bin("rpipeline").expect("binary not found")
}

/// Write `contents` to a temporary file with the given suffix and return it.
fn temp_file(suffix: &str, contents: &str) -> NamedTempFile {
    let mut f = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    f.flush().unwrap();
    f
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const YEAR_RULE: &str = r#"
title: Tag Year
id: tag-year
when: {eq: [{field: source}, "web-01"]}
then:
  - call: set_field
    args: {field: year, value: 2010}
"#;

const DROP_RULE: &str = r#"
title: Drop Noise
when: {eq: [{field: level}, "debug"]}
then:
  - call: drop_message
"#;

const UNKNOWN_FUNCTION_RULE: &str = r#"
title: Broken
then:
  - call: grok
    args: {pattern: "%{IP}"}
"#;

const BROKEN_CONDITION_RULE: &str = r#"
title: Broken Condition
when: {not: {field: message}}
---
title: Later
then:
  - call: set_field
    args: {field: later, value: true}
"#;

// ---------------------------------------------------------------------------
// parse
// ---------------------------------------------------------------------------

#[test]
fn parse_valid_rule() {
    let rule = temp_file(".yml", YEAR_RULE);
    rpipeline()
        .args(["parse", rule.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Tag Year"))
        .stdout(predicate::str::contains("set_field"));
}

#[test]
fn parse_nonexistent_file() {
    rpipeline()
        .args(["parse", "/nonexistent/rule.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error parsing"));
}

#[test]
fn parse_reports_broken_documents_as_warnings() {
    let rule = temp_file(".yml", "title: [unclosed\n");
    rpipeline()
        .args(["parse", rule.path().to_str().unwrap()])
        .assert()
        .success()
        .stderr(predicate::str::contains("Warnings:"));
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

#[test]
fn validate_directory_with_valid_rules() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("year.yml"), YEAR_RULE).unwrap();
    std::fs::write(dir.path().join("drop.yaml"), DROP_RULE).unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not a rule").unwrap();

    rpipeline()
        .args(["validate", dir.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Parsed 2 rules"))
        .stdout(predicate::str::contains("Compiled OK:    2"));
}

#[test]
fn validate_reports_compile_errors() {
    let rule = temp_file(".yml", UNKNOWN_FUNCTION_RULE);
    rpipeline()
        .args(["validate", "--verbose", rule.path().to_str().unwrap()])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Compile errors: 1"))
        .stdout(predicate::str::contains("unknown function 'grok'"));
}

// ---------------------------------------------------------------------------
// functions
// ---------------------------------------------------------------------------

#[test]
fn functions_lists_builtin_signatures() {
    rpipeline()
        .arg("functions")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "rename_field(old_field: string, new_field: string, message?: message) -> void",
        ))
        .stdout(predicate::str::contains("to_ip("));
}

// ---------------------------------------------------------------------------
// eval
// ---------------------------------------------------------------------------

#[test]
fn eval_single_event() {
    let rule = temp_file(".yml", YEAR_RULE);
    rpipeline()
        .args([
            "eval",
            "--rules",
            rule.path().to_str().unwrap(),
            "--event",
            r#"{"message": "GET /", "source": "web-01"}"#,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""year":2010"#))
        .stdout(predicate::str::contains(r#""matched_rules":["tag-year"]"#))
        .stderr(predicate::str::contains("Loaded 1 rules"));
}

#[test]
fn eval_single_event_no_match() {
    let rule = temp_file(".yml", YEAR_RULE);
    rpipeline()
        .args([
            "eval",
            "--rules",
            rule.path().to_str().unwrap(),
            "--event",
            r#"{"message": "GET /", "source": "db-01"}"#,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""matched_rules":[]"#))
        .stdout(predicate::str::contains("year").not());
}

#[test]
fn eval_ndjson_stdin() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("year.yml"), YEAR_RULE).unwrap();
    std::fs::write(dir.path().join("drop.yml"), DROP_RULE).unwrap();

    let input = concat!(
        r#"{"message": "a", "source": "web-01"}"#,
        "\n",
        "\n",
        r#"{"message": "b", "source": "db-01", "level": "debug"}"#,
        "\n",
    );

    rpipeline()
        .args(["eval", "--rules", dir.path().to_str().unwrap()])
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""dropped":true"#))
        .stdout(predicate::str::contains(r#""year":2010"#))
        .stderr(predicate::str::contains("1 dropped"));
}

#[test]
fn eval_invalid_json_event() {
    let rule = temp_file(".yml", YEAR_RULE);
    rpipeline()
        .args([
            "eval",
            "--rules",
            rule.path().to_str().unwrap(),
            "--event",
            "{not json",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid JSON event"));
}

#[test]
fn eval_non_object_event() {
    let rule = temp_file(".yml", YEAR_RULE);
    rpipeline()
        .args([
            "eval",
            "--rules",
            rule.path().to_str().unwrap(),
            "--event",
            "[1, 2]",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid message"));
}

#[test]
fn eval_ndjson_skips_invalid_lines() {
    let rule = temp_file(".yml", YEAR_RULE);
    let input = "garbage\n{\"message\": \"ok\", \"source\": \"web-01\"}\n";
    rpipeline()
        .args(["eval", "--rules", rule.path().to_str().unwrap()])
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""year":2010"#))
        .stderr(predicate::str::contains("Invalid JSON on line 1"));
}

#[test]
fn eval_with_unknown_function_fails_to_load() {
    let rule = temp_file(".yml", UNKNOWN_FUNCTION_RULE);
    rpipeline()
        .args([
            "eval",
            "--rules",
            rule.path().to_str().unwrap(),
            "--event",
            "{}",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error compiling rules"));
}

#[test]
fn eval_halt_on_condition_error() {
    let rule = temp_file(".yml", BROKEN_CONDITION_RULE);
    let event = r#"{"message": "text"}"#;

    rpipeline()
        .args([
            "eval",
            "--rules",
            rule.path().to_str().unwrap(),
            "--event",
            event,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""later":true"#));

    rpipeline()
        .args([
            "eval",
            "--rules",
            rule.path().to_str().unwrap(),
            "--event",
            event,
            "--halt-on-condition-error",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("later").not())
        .stdout(predicate::str::contains("Broken Condition"));
}
