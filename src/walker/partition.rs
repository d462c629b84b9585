use std::fmt;

use crate::config::PartitionSpec;
use crate::extractor::{Record, RecordSchema};
use crate::session::ElementRef;

/// One entry of a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub name: String,
    pub index: usize,
    /// Only valid until the next navigation or context switch
    pub handle: Option<ElementRef>,
}

impl WorkItem {
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
            handle: None,
        }
    }
}

/// In-memory state of one partition for the duration of a job
#[derive(Debug, Clone)]
pub struct Partition {
    pub name: String,
    pub listing_url: String,
    pub items: Vec<WorkItem>,
    /// Index of the next item to process
    pub cursor: usize,
    pub records: Vec<Record>,
    /// Listing heading, copied into every record
    pub location: Option<String>,
}

impl Partition {
    pub fn new(spec: &PartitionSpec, listing_url: impl Into<String>) -> Self {
        Self {
            name: spec.name.clone(),
            listing_url: listing_url.into(),
            items: Vec::new(),
            cursor: 0,
            records: Vec::new(),
            location: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    Cancelled,
    ListingInstability { expected: usize, found: usize },
    Failed(String),
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled"),
            Self::ListingInstability { expected, found } => {
                write!(f, "listing changed: needed {expected} items, found {found}")
            }
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkerState {
    Listing,
    Processing(usize),
    Restarting,
    Done,
    Halted(HaltReason),
}

/// Where a resumed partition picks up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumePoint {
    /// No usable previous output
    Fresh,
    /// Continue with the item after `last`
    After { last: String, cursor: usize },
    /// The last recorded item is no longer on the listing
    NotFound { last: String },
}

impl ResumePoint {
    #[must_use]
    pub fn cursor(&self) -> usize {
        match self {
            Self::After { cursor, .. } => *cursor,
            Self::Fresh | Self::NotFound { .. } => 0,
        }
    }
}

/// Locate the item of the most recent record on the listing.
#[must_use]
pub fn resume_point(schema: &RecordSchema, records: &[Record], items: &[WorkItem]) -> ResumePoint {
    let Some(last) = records.iter().rev().find_map(|r| schema.item_value(r)) else {
        return ResumePoint::Fresh;
    };
    match items.iter().position(|item| item.name == last) {
        Some(pos) => ResumePoint::After {
            last: last.to_string(),
            cursor: pos + 1,
        },
        None => ResumePoint::NotFound {
            last: last.to_string(),
        },
    }
}
