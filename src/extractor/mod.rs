//! Turning rendered markup into records
//!
//! Extractors are pure: they get the markup and URL of one page and never touch
//! the browser. Each field is extracted on its own, so one missing element only
//! costs that field.

pub mod parcel;
pub mod ranking;
pub mod record;

use scraper::ElementRef as HtmlElement;

use crate::session::Locator;

pub use parcel::ParcelExtractor;
pub use ranking::RankingExtractor;
pub use record::{ExtractionStatus, FieldValue, Record, RecordSchema};

/// What the caller knows about the page being extracted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionContext {
    /// Work item the page belongs to; the actor of its audit lines
    pub item: String,
    /// Heading of the listing page the item came from
    pub location: Option<String>,
}

impl ExtractionContext {
    pub fn new(item: impl Into<String>, location: Option<String>) -> Self {
        Self {
            item: item.into(),
            location,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldReport {
    pub field: String,
    pub status: ExtractionStatus,
}

impl FieldReport {
    pub fn new(field: impl Into<String>, status: ExtractionStatus) -> Self {
        Self {
            field: field.into(),
            status,
        }
    }
}

/// Result of extracting one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Page {
        records: Vec<Record>,
        fields: Vec<FieldReport>,
        /// Sub-units (rows) that could not be turned into records
        skipped: Vec<String>,
    },
    /// The page has no top-level container; nothing was extracted
    ContainerMissing { provenance: String, reason: String },
}

impl Extraction {
    #[must_use]
    pub fn records(&self) -> &[Record] {
        match self {
            Self::Page { records, .. } => records,
            Self::ContainerMissing { .. } => &[],
        }
    }

    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        match self {
            Self::Page { records, .. } => records,
            Self::ContainerMissing { .. } => Vec::new(),
        }
    }
}

pub trait RecordExtractor: Send + Sync {
    fn schema(&self) -> &RecordSchema;

    /// Element that must be present before a page is worth reading
    fn ready(&self) -> &Locator;

    fn extract(&self, markup: &str, page_url: &str, ctx: &ExtractionContext) -> Extraction;
}

/// Trimmed text content of an element
pub(crate) fn element_text(element: HtmlElement<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Provenance for a page whose URL could not be read
pub(crate) fn provenance_or_sentinel(page_url: &str) -> String {
    if page_url.trim().is_empty() {
        crate::utils::constants::MISSING_SENTINEL.to_string()
    } else {
        page_url.to_string()
    }
}
