//! Per-partition audit log
//!
//! One CSV line per status event, flushed as soon as it is written so a killed
//! process leaves a complete log behind.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{ScrapeError, ScrapeResult};
use crate::extractor::FieldReport;

pub const AUDIT_COLUMNS: [&str; 7] = [
    "ActorName",
    "Timestamp",
    "Severity",
    "Detail1",
    "Detail2",
    "Detail3",
    "Detail4",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warn,
    Error,
    Critical,
}

impl Severity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INFO" => Some(Self::Info),
            "WARN" => Some(Self::Warn),
            "ERROR" => Some(Self::Error),
            "CRITICAL" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLine {
    pub actor: String,
    pub timestamp: String,
    pub severity: Severity,
    pub details: [String; 4],
}

impl AuditLine {
    pub fn new(actor: impl Into<String>, severity: Severity, details: [String; 4]) -> Self {
        Self {
            actor: actor.into(),
            timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
            severity,
            details,
        }
    }

    /// A free-text status message in `Detail1`
    pub fn message(actor: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        // Keep one event on one physical line
        let message = message.into().replace(['\n', '\r'], " ");
        Self::new(
            actor,
            severity,
            [message, String::new(), String::new(), String::new()],
        )
    }

    pub fn info(actor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::message(actor, Severity::Info, message)
    }

    pub fn warn(actor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::message(actor, Severity::Warn, message)
    }

    pub fn critical(actor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::message(actor, Severity::Critical, message)
    }

    /// `[kind, short message, "", url]`
    pub fn failure(
        actor: impl Into<String>,
        severity: Severity,
        err: &ScrapeError,
        url: impl Into<String>,
    ) -> Self {
        Self::new(
            actor,
            severity,
            [
                err.kind().to_string(),
                err.short_message(),
                String::new(),
                url.into(),
            ],
        )
    }

    /// Per-field statuses of one extracted page, in report order
    pub fn fields(actor: impl Into<String>, fields: &[FieldReport]) -> Self {
        let mut details: [String; 4] = Default::default();
        for (slot, report) in details.iter_mut().zip(fields) {
            *slot = report.status.to_string();
        }
        Self::new(actor, Severity::Info, details)
    }

    fn row(&self) -> [&str; 7] {
        [
            &self.actor,
            &self.timestamp,
            self.severity.as_str(),
            &self.details[0],
            &self.details[1],
            &self.details[2],
            &self.details[3],
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditMode {
    /// Truncate and write the header; used at partition start
    Overwrite,
    /// Continue an existing log; used after a restart
    Append,
}

pub struct AuditLog {
    writer: csv::Writer<File>,
    path: PathBuf,
}

impl AuditLog {
    /// Open the log at `path`, creating its directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be opened.
    pub fn open(path: &Path, mode: AuditMode) -> ScrapeResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let needs_header = mode == AuditMode::Overwrite || !path.exists();
        let file = match mode {
            AuditMode::Overwrite => File::create(path)?,
            AuditMode::Append => OpenOptions::new().create(true).append(true).open(path)?,
        };
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if needs_header {
            writer.write_record(AUDIT_COLUMNS)?;
            writer.flush()?;
        }
        Ok(Self {
            writer,
            path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write and flush one line.
    ///
    /// # Errors
    ///
    /// Returns the underlying CSV or I/O error.
    pub fn try_append(&mut self, line: &AuditLine) -> ScrapeResult<()> {
        self.writer.write_record(line.row())?;
        self.writer.flush()?;
        Ok(())
    }

    /// Write one line; a failing audit log never stops the scrape.
    pub fn append(&mut self, line: AuditLine) {
        if let Err(e) = self.try_append(&line) {
            warn!(
                "Audit log {} write failed: {}",
                self.path.display(),
                e.short_message()
            );
        }
    }

    /// Flush and release the file handle.
    pub fn close(mut self) {
        if let Err(e) = self.writer.flush() {
            warn!("Audit log {} flush failed: {e}", self.path.display());
        }
    }

    /// Read a log back, skipping the header.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a line is malformed.
    pub fn read_lines(path: &Path) -> ScrapeResult<Vec<AuditLine>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;
        let mut lines = Vec::new();
        for row in reader.records() {
            let row = row?;
            let cell = |i: usize| row.get(i).unwrap_or_default().to_string();
            let severity = Severity::parse(&cell(2)).ok_or_else(|| {
                ScrapeError::Config(format!("unknown severity '{}' in {}", cell(2), path.display()))
            })?;
            lines.push(AuditLine {
                actor: cell(0),
                timestamp: cell(1),
                severity,
                details: [cell(3), cell(4), cell(5), cell(6)],
            });
        }
        Ok(lines)
    }
}
