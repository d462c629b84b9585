use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{error, info, warn};

use super::{
    AuditLog, AuditMode, ConsolidateReport, DurableSink, FlushOutcome, PartitionPaths,
};
use crate::error::{ScrapeError, ScrapeResult};
use crate::extractor::{Record, RecordSchema};

/// CSV snapshots, one directory per partition
#[derive(Debug, Clone)]
pub struct CsvSink {
    root: PathBuf,
    suffix: String,
    schema: RecordSchema,
}

impl CsvSink {
    pub fn new(root: impl Into<PathBuf>, suffix: impl Into<String>, schema: RecordSchema) -> Self {
        Self {
            root: root.into(),
            suffix: suffix.into(),
            schema,
        }
    }

    #[must_use]
    pub fn paths(&self, partition: &str) -> PartitionPaths {
        PartitionPaths::new(&self.root, partition, &self.suffix)
    }

    #[must_use]
    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// Write `records` to a sibling temp file, then rename it over `target`.
    fn write_snapshot(&self, target: &Path, records: &[Record]) -> ScrapeResult<()> {
        let tmp = target.with_extension("csv.tmp");
        let result = (|| -> ScrapeResult<()> {
            let mut writer = csv::Writer::from_path(&tmp)?;
            writer.write_record(&self.schema.columns)?;
            for record in records {
                writer.write_record(self.schema.to_row(record))?;
            }
            let file = writer
                .into_inner()
                .map_err(|e| ScrapeError::Io(e.into_error()))?;
            file.sync_all()?;
            std::fs::rename(&tmp, target)?;
            Ok(())
        })();
        if result.is_err() && tmp.exists() {
            let _ = std::fs::remove_file(&tmp);
        }
        result
    }

    fn read_snapshot(&self, path: &Path) -> ScrapeResult<Vec<Record>> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            records.push(self.schema.from_row(row.iter())?);
        }
        Ok(records)
    }
}

fn modified(path: &Path) -> SystemTime {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

/// Keep the last occurrence of every provenance, in the order those occurrences appear.
fn dedup_last_wins(records: Vec<Record>) -> Vec<Record> {
    let mut seen = HashSet::new();
    let mut kept: Vec<Record> = records
        .into_iter()
        .rev()
        .filter(|r| seen.insert(r.provenance.clone()))
        .collect();
    kept.reverse();
    kept
}

impl DurableSink for CsvSink {
    fn flush(&self, partition: &str, records: &[Record]) -> ScrapeResult<FlushOutcome> {
        if records.is_empty() {
            return Ok(FlushOutcome::Skipped);
        }
        let paths = self.paths(partition);
        std::fs::create_dir_all(&paths.dir)?;

        match self.write_snapshot(&paths.primary, records) {
            Ok(()) => {
                info!(
                    "Saved {} records for {partition} to {}",
                    records.len(),
                    paths.primary.display()
                );
                Ok(FlushOutcome::Written(paths.primary))
            }
            Err(e) => {
                let fallback = paths.fallback(chrono::Local::now());
                if matches!(&e, ScrapeError::Io(io) if io.kind() == io::ErrorKind::PermissionDenied)
                {
                    error!(
                        "Permission denied for {}; is it open in another program?",
                        paths.primary.display()
                    );
                } else {
                    error!("Could not replace {}: {}", paths.primary.display(), e);
                }
                warn!("Saving to a new file: {}", fallback.display());
                self.write_snapshot(&fallback, records).map_err(|fallback_err| {
                    error!("Could not save fallback file either: {fallback_err}");
                    match fallback_err {
                        ScrapeError::Io(io) if io.kind() == io::ErrorKind::PermissionDenied => {
                            ScrapeError::PermissionDenied { path: fallback.clone() }
                        }
                        other => other,
                    }
                })?;
                Ok(FlushOutcome::Fallback(fallback))
            }
        }
    }

    fn consolidate(&self, partition: &str) -> ScrapeResult<ConsolidateReport> {
        let paths = self.paths(partition);
        let backups = paths.backups()?;
        if backups.is_empty() {
            return Ok(ConsolidateReport::default());
        }
        info!(
            "Found {} backup file(s) for {partition}. Consolidating...",
            backups.len()
        );

        let mut sources: Vec<PathBuf> = backups.clone();
        if paths.primary.exists() {
            sources.push(paths.primary.clone());
        }
        // Oldest first, so later writes win the dedup
        sources.sort_by(|a, b| modified(a).cmp(&modified(b)).then_with(|| a.cmp(b)));

        let mut report = ConsolidateReport::default();
        let mut merged = Vec::new();
        let mut unreadable = HashSet::new();
        for source in &sources {
            match self.read_snapshot(source) {
                Ok(records) => {
                    report.sources += 1;
                    merged.extend(records);
                }
                Err(e) => {
                    warn!("Could not read {}: {}", source.display(), e.short_message());
                    unreadable.insert(source.clone());
                }
            }
        }
        if merged.is_empty() {
            info!("No data found in backup files for {partition}");
            return Ok(report);
        }

        let total = merged.len();
        let deduped = dedup_last_wins(merged);
        report.records = deduped.len();
        report.duplicates_dropped = total - deduped.len();

        let written = match self.flush(partition, &deduped)? {
            FlushOutcome::Written(path) | FlushOutcome::Fallback(path) => Some(path),
            FlushOutcome::Skipped => None,
        };

        for backup in backups {
            if unreadable.contains(&backup) || written.as_ref() == Some(&backup) {
                continue;
            }
            match std::fs::remove_file(&backup) {
                Ok(()) => report.backups_removed += 1,
                Err(e) => warn!("Could not remove backup {}: {e}", backup.display()),
            }
        }
        info!(
            "Merged {} records ({} duplicates dropped) into {}",
            report.records,
            report.duplicates_dropped,
            paths.primary.display()
        );
        Ok(report)
    }

    fn load(&self, partition: &str) -> ScrapeResult<Vec<Record>> {
        let paths = self.paths(partition);
        if !paths.primary.exists() {
            return Ok(Vec::new());
        }
        self.read_snapshot(&paths.primary)
    }

    fn open_audit(&self, partition: &str, mode: AuditMode) -> ScrapeResult<AuditLog> {
        let paths = self.paths(partition);
        AuditLog::open(&paths.audit, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::FieldValue;

    fn record(firm: &str, url: &str) -> Record {
        Record::new(
            vec![
                FieldValue::text("United Kingdom"),
                FieldValue::text("London"),
                FieldValue::text("Tax"),
                FieldValue::Missing,
                FieldValue::text(firm),
            ],
            url,
        )
    }

    #[test]
    fn flush_is_byte_identical_for_identical_input() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = CsvSink::new(dir.path(), "rankings", RecordSchema::rankings());
        let records = vec![record("Acme Corp", "u1"), record("Beta LLP", "u2")];

        sink.flush("London", &records).expect("first flush");
        let first = std::fs::read(sink.paths("London").primary).expect("read");
        sink.flush("London", &records).expect("second flush");
        let second = std::fs::read(sink.paths("London").primary).expect("read");

        assert_eq!(first, second);
        assert!(String::from_utf8_lossy(&first).contains(",N/A,"));
    }

    #[test]
    fn empty_flush_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = CsvSink::new(dir.path(), "rankings", RecordSchema::rankings());
        assert_eq!(sink.flush("London", &[]).expect("flush"), FlushOutcome::Skipped);
        assert!(!sink.paths("London").primary.exists());
    }

    #[test]
    fn unwritable_primary_falls_back_to_timestamped_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = CsvSink::new(dir.path(), "rankings", RecordSchema::rankings());
        let paths = sink.paths("London");
        // A directory where the primary should be makes the rename fail
        std::fs::create_dir_all(&paths.primary).expect("block primary");

        let outcome = sink
            .flush("London", &[record("Acme Corp", "u1")])
            .expect("flush");

        let FlushOutcome::Fallback(path) = outcome else {
            panic!("expected fallback, got {outcome:?}");
        };
        assert!(paths.is_backup(&path));
        assert_eq!(sink.read_snapshot(&path).expect("read").len(), 1);
    }

    #[test]
    fn load_reads_back_missing_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sink = CsvSink::new(dir.path(), "rankings", RecordSchema::rankings());
        let records = vec![record("Acme Corp", "u1")];
        sink.flush("London", &records).expect("flush");
        assert_eq!(sink.load("London").expect("load"), records);
        assert!(sink.load("Nowhere").expect("load").is_empty());
    }

    #[test]
    fn dedup_keeps_last_occurrence() {
        let kept = dedup_last_wins(vec![
            record("old", "u1"),
            record("other", "u2"),
            record("new", "u1"),
        ]);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].provenance, "u2");
        assert_eq!(kept[1].values[4], FieldValue::text("new"));
    }
}
