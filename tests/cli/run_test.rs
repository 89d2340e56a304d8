//! Single-run reports printed by the binary.

use super::common::{run_mock, sql_file};
use pretty_assertions::assert_eq;
use serde_json::Value;

#[test]
fn test_json_report_for_statement_under_cursor() {
    let file = sql_file("SELECT 1;\n\nSELECT 2;\n");
    let (code, stdout, stderr) = run_mock(&file, &["--cursor", "3:2", "--output", "json"]);
    assert_eq!(code, 0, "stderr: {stderr}");

    let report: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["request"]["query"], "SELECT 2");
    assert_eq!(report["request"]["row"], 3);
    assert_eq!(report["request"]["column"], 0);
    assert_eq!(report["result"]["kind"], "dql");
    assert_eq!(report["feed"]["notifications"][0]["kind"], "success");
    assert_eq!(report["feed"]["notifications"][0]["estimated_height"], 145);
    assert!(report["error"].is_null());
}

#[test]
fn test_selection_report() {
    let file = sql_file("SELECT 1; CREATE TABLE t (x INT);");
    let (code, stdout, _) = run_mock(&file, &["--select", "1:10-1:32", "--output", "json"]);
    assert_eq!(code, 0);

    let report: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["request"]["query"], "CREATE TABLE t (x INT)");
    assert_eq!(report["result"]["kind"], "ddl");
    assert_eq!(report["feed"]["notifications"][0]["kind"], "info");
}

#[test]
fn test_text_report() {
    let file = sql_file("SELECT 1");
    let (code, stdout, _) = run_mock(&file, &[]);
    assert_eq!(code, 0);
    assert!(stdout.starts_with("-- 1:0\nSELECT 1\n"));
    assert!(stdout.contains("Mock result for: SELECT 1"));
    assert!(stdout.contains("[Success] SELECT 1: 1 row"));
}

#[test]
fn test_nothing_to_run() {
    let file = sql_file("SELECT 1;\n\n");
    let (code, stdout, _) = run_mock(&file, &["--cursor", "3:0"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "Nothing to run at the caret.");
}

#[test]
fn test_invalid_cursor_fails() {
    let file = sql_file("SELECT 1");
    let (code, _, stderr) = run_mock(&file, &["--cursor", "nope"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Invalid position"));
}

#[test]
fn test_log_file_replaces_stderr_logging() {
    let file = sql_file("SELECT 1");
    let log_dir = tempfile::tempdir().unwrap();
    let log_path = log_dir.path().join("logs").join("run.log");

    let (code, _, stderr) = run_mock(&file, &["--log-file", log_path.to_str().unwrap()]);
    assert_eq!(code, 0, "stderr: {stderr}");
    assert!(log_path.exists());
    assert!(!stderr.contains("Loading config"));
}

#[test]
fn test_unwritable_log_file_fails() {
    let file = sql_file("SELECT 1");
    let log_path = file.path().join("run.log");

    let (code, _, stderr) = run_mock(&file, &["--log-file", log_path.to_str().unwrap()]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Could not create log directory"));
}
