//! CSV persistence integration tests
//!
//! Verifies the exact on-disk artifact the sink produces: header row,
//! column order, float formatting, quoting, overwrite semantics, and
//! parent directory creation.

use medir::report::{ResultsSink, DEFAULT_OUTPUT};
use medir::runner::{SENTINEL_ERROR, SENTINEL_TIMEOUT};
use medir::{BenchmarkRecord, MedirError};
use tempfile::TempDir;

// ============================================================================
// Helper Functions
// ============================================================================

fn success_record() -> BenchmarkRecord {
    BenchmarkRecord {
        model: "llama3".to_string(),
        parameters: "8b".to_string(),
        answer: "four bases".to_string(),
        runtime_seconds: 5.0,
        tokens_per_second: 50.0,
    }
}

fn sentinel_record(answer: &str) -> BenchmarkRecord {
    BenchmarkRecord {
        model: "llama2".to_string(),
        parameters: "7b".to_string(),
        answer: answer.to_string(),
        runtime_seconds: 0.0,
        tokens_per_second: 0.0,
    }
}

// ============================================================================
// Artifact Format Tests
// ============================================================================

#[test]
fn test_empty_result_set_writes_header_only() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.csv");
    let sink = ResultsSink::new(&path);

    sink.persist(&[]).unwrap();

    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "Model,Parameters,Answer,Runtime (s),Speed (tokens/s)\n"
    );
}

#[test]
fn test_rows_keep_column_order_and_float_formatting() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rows.csv");
    let sink = ResultsSink::new(&path);

    sink.persist(&[success_record(), sentinel_record(SENTINEL_TIMEOUT)])
        .unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1], "llama3,8b,four bases,5.0,50.0");
    assert_eq!(lines[2], "llama2,7b,Timeout,0.0,0.0");
}

#[test]
fn test_fractional_metrics_are_not_truncated() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fractional.csv");
    let sink = ResultsSink::new(&path);

    let mut record = success_record();
    record.runtime_seconds = 7.5;
    record.tokens_per_second = 33.25;
    sink.persist(&[record]).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("7.5,33.25"));
}

#[test]
fn test_answers_containing_commas_are_quoted() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("quoted.csv");
    let sink = ResultsSink::new(&path);

    let mut record = success_record();
    record.answer = "A, C, G, T".to_string();
    sink.persist(&[record]).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("\"A, C, G, T\""));
}

#[test]
fn test_persisted_rows_deserialize_back_to_records() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("roundtrip.csv");
    let sink = ResultsSink::new(&path);

    let written = vec![success_record(), sentinel_record(SENTINEL_ERROR)];
    sink.persist(&written).unwrap();

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let read: Vec<BenchmarkRecord> = reader
        .deserialize()
        .collect::<std::result::Result<_, _>>()
        .unwrap();
    assert_eq!(read, written);
    assert!(read[1].is_failure());
}

// ============================================================================
// Destination Handling Tests
// ============================================================================

#[test]
fn test_missing_parent_directories_are_created() {
    let dir = TempDir::new().unwrap();
    let path = dir
        .path()
        .join("results")
        .join("nested")
        .join("bench.csv");
    let sink = ResultsSink::new(&path);

    sink.persist(&[success_record()]).unwrap();

    assert!(path.exists());
}

#[test]
fn test_persist_overwrites_previous_artifact() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("overwrite.csv");
    let sink = ResultsSink::new(&path);

    sink.persist(&[success_record(), sentinel_record(SENTINEL_TIMEOUT)])
        .unwrap();
    sink.persist(&[success_record()]).unwrap();

    // Second persist replaces the file, it never appends
    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 2);
}

#[test]
fn test_unwritable_destination_is_a_persist_error() {
    let dir = TempDir::new().unwrap();
    // The destination itself is a directory, so the writer cannot open it
    let sink = ResultsSink::new(dir.path());

    let err = sink.persist(&[success_record()]).unwrap_err();
    assert!(matches!(err, MedirError::PersistError(_)));
}

#[test]
fn test_default_destination_matches_documented_layout() {
    let sink = ResultsSink::new(DEFAULT_OUTPUT);
    assert_eq!(
        sink.destination(),
        std::path::Path::new("results/ollama_benchmark.csv")
    );
}
