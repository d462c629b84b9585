//! Error taxonomy for scrape orchestration
//!
//! Every failure carries the scope it belongs to. Field, item and page failures
//! are absorbed by the component that produced them. Partition failures,
//! `CriticalUnhandled` included, halt a single partition and the job moves on.

use std::path::PathBuf;

/// How far a failure is allowed to travel before it must be absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorScope {
    Field,
    Item,
    Page,
    Partition,
    Job,
}

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// A bounded wait ran out
    #[error("{what} timed out after {secs:.1}s")]
    Timeout { what: String, secs: f64 },

    /// An element reference no longer resolves on the live page
    #[error("stale element reference: {0}")]
    StaleReference(String),

    /// Navigation landed somewhere other than the expected detail page
    #[error("not a target page: {0}")]
    NotTargetPage(String),

    #[error("field '{field}' failed: {reason}")]
    FieldExtraction { field: String, reason: String },

    /// The top-level container of a detail page is absent
    #[error("container missing on {url}: {reason}")]
    ContainerMissing { url: String, reason: String },

    /// The listing changed under us between iterations
    #[error("listing changed: expected at least {expected} items, found {found}")]
    ListingInstability { expected: usize, found: usize },

    #[error("permission denied writing {}", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("browser error: {0}")]
    Browser(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("operation cancelled")]
    Cancelled,

    #[error("critical: {0}")]
    CriticalUnhandled(String),
}

impl ScrapeError {
    pub fn timeout(what: impl Into<String>, after: std::time::Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            secs: after.as_secs_f64(),
        }
    }

    pub fn browser(err: impl std::fmt::Display) -> Self {
        Self::Browser(err.to_string())
    }

    #[must_use]
    pub fn scope(&self) -> ErrorScope {
        match self {
            Self::FieldExtraction { .. } => ErrorScope::Field,
            Self::Timeout { .. } | Self::StaleReference(_) | Self::NotTargetPage(_) => {
                ErrorScope::Item
            }
            Self::ContainerMissing { .. } | Self::PermissionDenied { .. } => ErrorScope::Page,
            Self::ListingInstability { .. }
            | Self::Browser(_)
            | Self::Io(_)
            | Self::Csv(_)
            | Self::Cancelled
            | Self::CriticalUnhandled(_) => ErrorScope::Partition,
            Self::Config(_) => ErrorScope::Job,
        }
    }

    /// Whether an item may absorb this failure and let the walk continue.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::CriticalUnhandled(_) | Self::Config(_))
    }

    /// Short, taxonomy-level label used in audit lines.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "Timeout",
            Self::StaleReference(_) => "StaleReference",
            Self::NotTargetPage(_) => "NotTargetPage",
            Self::FieldExtraction { .. } => "FieldExtractionFailure",
            Self::ContainerMissing { .. } => "ContainerMissing",
            Self::ListingInstability { .. } => "ListingInstability",
            Self::PermissionDenied { .. } => "PermissionDenied",
            Self::Browser(_) => "Browser",
            Self::Config(_) => "Config",
            Self::Io(_) => "Io",
            Self::Csv(_) => "Csv",
            Self::Cancelled => "Cancelled",
            Self::CriticalUnhandled(_) => "CriticalUnhandled",
        }
    }

    /// First line of the rendered message; browser errors tend to carry stack dumps.
    #[must_use]
    pub fn short_message(&self) -> String {
        crate::utils::first_line(&self.to_string()).to_string()
    }
}

impl From<anyhow::Error> for ScrapeError {
    fn from(err: anyhow::Error) -> Self {
        // {:#} keeps the context chain
        Self::CriticalUnhandled(format!("{err:#}"))
    }
}

pub type ScrapeResult<T> = Result<T, ScrapeError>;
