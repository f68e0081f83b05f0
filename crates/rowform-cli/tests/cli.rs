//! Tests driving the `rowform` binary over temporary files

use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn rowform(args: &[&Path]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rowform"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run rowform")
}

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).unwrap()
}

const REQUEST: &str = r#"{
    "transformation": {
        "settings": {
            "expressions": [
                {"to": "Total", "formula": ".price * .qty", "type": "decimal", "precision": 2},
                {"to": "Check", "formula": "if .tax > 10 then drop_row else \"OK\" end"}
            ]
        },
        "columns": {
            "input": [
                {"id": "COL-1-0001", "name": "price", "type": "decimal"},
                {"id": "COL-1-0002", "name": "qty", "type": "integer"},
                {"id": "COL-1-0003", "name": "tax", "type": "integer"}
            ]
        }
    },
    "stream": {"id": "STR-1", "type": "pricing"},
    "batch": {"id": "BAT-1"}
}"#;

#[test]
fn test_validate_prints_overview() {
    let dir = TempDir::new().unwrap();
    let config = write(
        &dir,
        "config.json",
        r#"{
            "settings": {"expressions": [{"to": "Double", "formula": ".price * 2"}]},
            "columns": {"input": [{"id": "COL-1", "name": "price"}], "output": []}
        }"#,
    );

    let output = rowform(&[Path::new("validate"), config.as_path()]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "Double = .price * 2\n");
}

#[test]
fn test_validate_reports_errors() {
    let dir = TempDir::new().unwrap();
    let config = write(
        &dir,
        "config.json",
        r#"{
            "settings": {"expressions": [
                {"to": "A", "formula": ".price"},
                {"to": "A", "formula": ".price + 1"}
            ]},
            "columns": {"input": [{"id": "COL-1", "name": "price"}]}
        }"#,
    );

    let output = rowform(&[Path::new("validate"), config.as_path()]);
    assert!(!output.status.success());
    let error: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(
        error,
        serde_json::json!({"error": "Each `output column` must be unique."})
    );
}

#[test]
fn test_extract_input() {
    let dir = TempDir::new().unwrap();
    let body = write(
        &dir,
        "body.json",
        r#"{
            "expressions": [{"formula": ".b + .a"}, {"formula": ".a"}],
            "columns": [{"id": "COL-1", "name": "a"}, {"id": "COL-2", "name": "b"}, {"id": "COL-3", "name": "c"}]
        }"#,
    );

    let output = rowform(&[Path::new("extract-input"), body.as_path()]);
    assert!(output.status.success());
    let columns: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let names: Vec<&str> = columns
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["b", "a"]);
}

#[test]
fn test_run_json_lines() {
    let dir = TempDir::new().unwrap();
    let request = write(&dir, "request.json", REQUEST);
    let rows = write(
        &dir,
        "rows.jsonl",
        "{\"price\": 2.5, \"qty\": 3, \"tax\": 8}\n{\"price\": 1, \"qty\": 1, \"tax\": 20}\n{\"price\": \"x\", \"qty\": 2, \"tax\": 1}\n",
    );

    let output = rowform(&[Path::new("run"), request.as_path(), rows.as_path()]);
    assert!(output.status.success());
    let lines: Vec<serde_json::Value> = stdout(&output)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(
        lines[0],
        serde_json::json!({"status": "success", "row": {"Total": "7.50", "Check": "OK"}})
    );
    assert_eq!(lines[1], serde_json::json!({"status": "delete"}));
    assert_eq!(lines[2]["status"], "fail");
    assert_eq!(lines.len(), 3);
}

#[test]
fn test_run_csv_with_threads() {
    let dir = TempDir::new().unwrap();
    let request = write(&dir, "request.json", REQUEST);
    let mut csv = String::from("price,qty,tax\n");
    for i in 0..40 {
        csv.push_str(&format!("{i},2,{}\n", if i % 10 == 0 { 50 } else { 5 }));
    }
    let rows = write(&dir, "rows.csv", &csv);

    let output = rowform(&[
        Path::new("run"),
        request.as_path(),
        rows.as_path(),
        Path::new("--threads"),
        Path::new("4"),
    ]);
    assert!(output.status.success());

    let lines: Vec<serde_json::Value> = stdout(&output)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 40);
    for (i, line) in lines.iter().enumerate() {
        if i % 10 == 0 {
            assert_eq!(line["status"], "delete");
        } else {
            assert_eq!(line["row"]["Total"], format!("{}.00", i * 2));
        }
    }
}
