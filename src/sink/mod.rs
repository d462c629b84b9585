//! Durable output: record snapshots and per-partition audit logs
//!
//! Files live under `{output_dir}/{partition}/`:
//! - `{partition}_{suffix}.csv` primary snapshot, rewritten in full on each flush
//! - `{partition}_{suffix}_{YYYYmmdd-HHMMSS}.csv` fallbacks written when the
//!   primary cannot be replaced
//! - `log_region_{partition}.csv` append-only audit log

pub mod audit;
pub mod csv_sink;

use std::path::{Path, PathBuf};

use crate::error::ScrapeResult;
use crate::extractor::Record;
use crate::utils::sanitize_partition_name;

pub use audit::{AUDIT_COLUMNS, AuditLine, AuditLog, AuditMode, Severity};
pub use csv_sink::CsvSink;

/// Where a flush ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    Written(PathBuf),
    /// The primary could not be replaced; the snapshot went here instead
    Fallback(PathBuf),
    /// Nothing to write
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsolidateReport {
    /// Files read, primary included
    pub sources: usize,
    pub records: usize,
    pub duplicates_dropped: usize,
    pub backups_removed: usize,
}

pub trait DurableSink: Send + Sync {
    /// Replace the partition's snapshot with `records`.
    fn flush(&self, partition: &str, records: &[Record]) -> ScrapeResult<FlushOutcome>;

    /// Merge fallback files into the primary, last write per provenance winning.
    fn consolidate(&self, partition: &str) -> ScrapeResult<ConsolidateReport>;

    /// Records of the primary snapshot; empty if there is none yet.
    fn load(&self, partition: &str) -> ScrapeResult<Vec<Record>>;

    fn open_audit(&self, partition: &str, mode: AuditMode) -> ScrapeResult<AuditLog>;
}

/// File names of one partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPaths {
    pub dir: PathBuf,
    pub primary: PathBuf,
    pub audit: PathBuf,
    /// `{partition}_{suffix}_`; fallback file names start with it
    backup_prefix: String,
}

impl PartitionPaths {
    #[must_use]
    pub fn new(output_dir: &Path, partition: &str, suffix: &str) -> Self {
        let name = sanitize_partition_name(partition);
        let dir = output_dir.join(&name);
        Self {
            primary: dir.join(format!("{name}_{suffix}.csv")),
            audit: dir.join(format!("log_region_{name}.csv")),
            backup_prefix: format!("{name}_{suffix}_"),
            dir,
        }
    }

    /// Fallback file for a flush at `now`
    #[must_use]
    pub fn fallback(&self, now: chrono::DateTime<chrono::Local>) -> PathBuf {
        let stamp = now.format("%Y%m%d-%H%M%S");
        let first = self.dir.join(format!("{}{stamp}.csv", self.backup_prefix));
        if !first.exists() {
            return first;
        }
        // Two fallbacks within one second
        (2..)
            .map(|n| self.dir.join(format!("{}{stamp}-{n}.csv", self.backup_prefix)))
            .find(|p| !p.exists())
            .unwrap_or(first)
    }

    #[must_use]
    pub fn is_backup(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(&self.backup_prefix) && n.ends_with(".csv"))
    }

    /// Every fallback file currently on disk
    pub fn backups(&self) -> ScrapeResult<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut found = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && self.is_backup(&path) {
                found.push(path);
            }
        }
        found.sort();
        Ok(found)
    }
}
