//! Durable output: snapshots, fallbacks, consolidation and the audit log

use std::fs::File;
use std::time::{Duration, SystemTime};

use rankscrape::extractor::{FieldValue, Record, RecordSchema};
use rankscrape::sink::{AuditLine, AuditLog, AuditMode, CsvSink, DurableSink, FlushOutcome, Severity};

mod common;

fn ranking(firm: &str, tier: &str, url: &str) -> Record {
    Record::new(
        vec![
            FieldValue::text("United Kingdom"),
            FieldValue::text("London"),
            FieldValue::text("Tax"),
            FieldValue::text(tier),
            FieldValue::text(firm),
        ],
        url,
    )
}

fn sink(dir: &std::path::Path) -> CsvSink {
    CsvSink::new(dir, "rankings", RecordSchema::rankings())
}

fn set_mtime(path: &std::path::Path, secs_ago: u64) {
    let file = File::options().write(true).open(path).expect("open for mtime");
    file.set_modified(SystemTime::now() - Duration::from_secs(secs_ago))
        .expect("set mtime");
}

#[test]
fn flush_is_byte_identical_for_identical_input() {
    let dir = common::create_test_dir().expect("temp dir");
    let sink = sink(dir.path());
    let records = vec![
        ranking("Alpha LLP", "Tier 1", "https://d.test/r/1"),
        ranking("Beta, Jones & Co", "Tier 2", "https://d.test/r/2"),
    ];

    let first = sink.flush("London", &records).expect("first flush");
    let FlushOutcome::Written(path) = first else {
        panic!("expected primary write, got {first:?}");
    };
    let before = std::fs::read(&path).expect("read");
    sink.flush("London", &records).expect("second flush");
    let after = std::fs::read(&path).expect("read");

    assert_eq!(before, after);
    assert_eq!(sink.load("London").expect("load"), records);
}

#[test]
fn consolidate_keeps_newest_write_per_provenance() {
    let dir = common::create_test_dir().expect("temp dir");
    let sink = sink(dir.path());
    let paths = sink.paths("London");
    std::fs::create_dir_all(&paths.dir).expect("dir");

    // Primary is the newest file, the two backups are older
    let old_backup = paths.dir.join("London_rankings_20240101-100000.csv");
    let new_backup = paths.dir.join("London_rankings_20240101-110000.csv");
    write_raw(&sink, &old_backup, &[
        ranking("Alpha LLP", "Tier 3", "u1"),
        ranking("Beta LLP", "Tier 3", "u2"),
    ]);
    write_raw(&sink, &new_backup, &[ranking("Alpha LLP", "Tier 2", "u1")]);
    write_raw(&sink, &paths.primary, &[
        ranking("Beta LLP", "Tier 1", "u2"),
        ranking("Gamma LLP", "Tier 1", "u3"),
    ]);
    set_mtime(&old_backup, 300);
    set_mtime(&new_backup, 200);
    set_mtime(&paths.primary, 100);

    let report = sink.consolidate("London").expect("consolidate");
    assert_eq!(report.sources, 3);
    assert_eq!(report.records, 3);
    assert_eq!(report.duplicates_dropped, 2);
    assert_eq!(report.backups_removed, 2);

    let merged = sink.load("London").expect("load");
    let tier_of = |url: &str| {
        merged
            .iter()
            .find(|r| r.provenance == url)
            .map(|r| r.values[3].as_cell().to_string())
    };
    assert_eq!(tier_of("u1").as_deref(), Some("Tier 2"));
    assert_eq!(tier_of("u2").as_deref(), Some("Tier 1"));
    assert_eq!(tier_of("u3").as_deref(), Some("Tier 1"));
    assert!(paths.backups().expect("list").is_empty());
}

#[test]
fn consolidate_prefers_newer_backup_over_stale_primary() {
    let dir = common::create_test_dir().expect("temp dir");
    let sink = sink(dir.path());
    let paths = sink.paths("Wales");
    std::fs::create_dir_all(&paths.dir).expect("dir");

    let backup = paths.dir.join("Wales_rankings_20240301-090000.csv");
    write_raw(&sink, &paths.primary, &[ranking("Alpha LLP", "Tier 4", "u1")]);
    write_raw(&sink, &backup, &[ranking("Alpha LLP", "Tier 1", "u1")]);
    set_mtime(&paths.primary, 500);
    set_mtime(&backup, 10);

    sink.consolidate("Wales").expect("consolidate");
    let merged = sink.load("Wales").expect("load");
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].values[3], FieldValue::text("Tier 1"));
}

#[test]
fn consolidate_without_backups_leaves_primary_alone() {
    let dir = common::create_test_dir().expect("temp dir");
    let sink = sink(dir.path());
    sink.flush("London", &[ranking("Alpha LLP", "Tier 1", "u1")])
        .expect("flush");

    let report = sink.consolidate("London").expect("consolidate");
    assert_eq!(report.sources, 0);
    assert_eq!(sink.load("London").expect("load").len(), 1);
}

#[test]
fn blocked_primary_falls_back_to_timestamped_file() {
    let dir = common::create_test_dir().expect("temp dir");
    let sink = sink(dir.path());
    let paths = sink.paths("London");
    // A directory where the primary should be makes the rename fail
    std::fs::create_dir_all(&paths.primary).expect("blocker");

    let records = vec![ranking("Alpha LLP", "Tier 1", "u1")];
    let outcome = sink.flush("London", &records).expect("flush falls back");
    let FlushOutcome::Fallback(path) = outcome else {
        panic!("expected fallback, got {outcome:?}");
    };
    assert!(paths.is_backup(&path));

    let again = sink.flush("London", &records).expect("second fallback");
    assert_ne!(again, FlushOutcome::Fallback(path.clone()));
    assert_eq!(paths.backups().expect("list").len(), 2);
}

#[test]
fn missing_values_are_written_as_sentinel() {
    let dir = common::create_test_dir().expect("temp dir");
    let sink = sink(dir.path());
    let record = Record::new(
        vec![
            FieldValue::text("United Kingdom"),
            FieldValue::text("London"),
            FieldValue::Missing,
            FieldValue::Missing,
            FieldValue::text("Alpha LLP"),
        ],
        "u1",
    );
    sink.flush("London", &[record.clone()]).expect("flush");

    let text = std::fs::read_to_string(sink.paths("London").primary).expect("read");
    assert!(text.starts_with("Region,Ranking Location,Practice Area,Ranking Table,Firm,Sourcelink"));
    assert!(text.contains("United Kingdom,London,N/A,N/A,Alpha LLP,u1"));
    assert_eq!(sink.load("London").expect("load"), vec![record]);
}

#[test]
fn audit_log_appends_after_reopen() {
    let dir = common::create_test_dir().expect("temp dir");
    let sink = sink(dir.path());

    let mut log = sink.open_audit("London", AuditMode::Overwrite).expect("open");
    log.append(AuditLine::info("Alpha LLP", "first"));
    log.close();
    let mut log = sink.open_audit("London", AuditMode::Append).expect("reopen");
    log.append(AuditLine::warn("Alpha LLP", "second"));
    log.close();

    let lines = AuditLog::read_lines(&sink.paths("London").audit).expect("read");
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].details[0], "first");
    assert_eq!(lines[1].severity, Severity::Warn);

    let raw = std::fs::read_to_string(sink.paths("London").audit).expect("read");
    assert_eq!(raw.matches("ActorName").count(), 1);

    // A fresh partition run starts the log over
    sink.open_audit("London", AuditMode::Overwrite)
        .expect("overwrite")
        .close();
    assert!(AuditLog::read_lines(&sink.paths("London").audit)
        .expect("read")
        .is_empty());
}

/// Write a snapshot straight to `path`, bypassing the primary file naming
fn write_raw(sink: &CsvSink, path: &std::path::Path, records: &[Record]) {
    let mut writer = csv::Writer::from_path(path).expect("writer");
    writer.write_record(&sink.schema().columns).expect("header");
    for record in records {
        writer
            .write_record(sink.schema().to_row(record))
            .expect("row");
    }
    writer.flush().expect("flush");
}
