//! JSON-lines replay through the library entry point.

mod common;

use std::fs::File;
use std::io::{BufReader, Write};
use std::sync::Arc;

use common::SimulatedRun;
use dichro_daq::experiment::Document;
use dichro_daq::replay::replay_stream;
use dichro_daq::{DichroCallback, DichroConfig, DichroError};
use tempfile::NamedTempFile;

fn callback() -> DichroCallback {
    DichroCallback::new(Arc::new(DichroConfig::default())).expect("valid config")
}

fn fixture(lines: &[String]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file.flush().unwrap();
    file
}

fn json_lines(docs: &[Document]) -> Vec<String> {
    docs.iter()
        .map(|d| serde_json::to_string(d).unwrap())
        .collect()
}

fn output_lines(out: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8(out.to_vec())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn test_replay_writes_events_then_group_summaries() {
    let mut run = SimulatedRun::dichro("energy");
    let mut docs = run.opening();
    docs.extend(run.cycle(7.10));
    docs.extend(run.cycle(7.11));
    docs.push(run.stop());
    let mut lines = json_lines(&docs);
    lines.insert(4, String::new());
    let file = fixture(&lines);

    let mut cb = callback();
    let mut out = Vec::new();
    let reader = BufReader::new(File::open(file.path()).unwrap());
    let summary = replay_stream(reader, &mut out, &mut cb).unwrap();

    assert_eq!(summary.documents, docs.len());
    assert_eq!(summary.events_written, 2);
    assert_eq!(summary.failed_windows, 0);
    assert_eq!(summary.groups, 1);
    assert_eq!(summary.stats.derived_emitted, 2);

    let written = output_lines(&out);
    assert_eq!(written.len(), 3);
    assert_eq!(written[0]["type"], "event");
    assert_eq!(written[1]["type"], "event");
    assert_eq!(written[1]["seq_num"], 2);
    assert_eq!(written[2]["axis"], "energy");
    assert_eq!(written[2]["runs"][0], run.run_uid());
}

#[test]
fn test_replay_counts_failed_windows_and_continues() {
    let mut run = SimulatedRun::dichro("energy");
    let mut docs = run.opening();
    docs.push(run.point(7.1, 10.0, 10.0));
    docs.push(run.point(7.1, 10.0, 0.0));
    docs.push(run.point(7.1, 10.0, 9.0));
    docs.push(run.point(7.1, 10.0, 10.0));
    docs.extend(run.cycle(7.2));
    docs.push(run.stop());
    let file = fixture(&json_lines(&docs));

    let mut cb = callback();
    let mut out = Vec::new();
    let reader = BufReader::new(File::open(file.path()).unwrap());
    let summary = replay_stream(reader, &mut out, &mut cb).unwrap();

    assert_eq!(summary.failed_windows, 1);
    assert_eq!(summary.events_written, 1);
    assert_eq!(summary.stats.windows_failed, 1);
}

#[test]
fn test_malformed_line_reports_line_number() {
    let run = SimulatedRun::dichro("energy");
    let mut lines = json_lines(&run.opening()[..2]);
    lines.push(r#"{"type": "event", "uid": "#.to_string());
    lines.push(serde_json::to_string(&run.stop()).unwrap());
    let file = fixture(&lines);

    let mut cb = callback();
    let mut out = Vec::new();
    let reader = BufReader::new(File::open(file.path()).unwrap());
    let err = replay_stream(reader, &mut out, &mut cb).unwrap_err();

    assert!(matches!(err, DichroError::Json { line: 3, .. }));
    assert!(err.to_string().starts_with("Malformed document on line 3"));
    assert!(out.is_empty());
}
