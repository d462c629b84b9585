//! Typed records and their column layout

use std::fmt;

use crate::error::{ScrapeError, ScrapeResult};
use crate::utils::constants::MISSING_SENTINEL;

/// One cell of a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Missing,
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Cell as written to disk; `Missing` becomes the sentinel
    #[must_use]
    pub fn as_cell(&self) -> &str {
        match self {
            Self::Text(text) => text,
            Self::Missing => MISSING_SENTINEL,
        }
    }

    #[must_use]
    pub fn from_cell(cell: &str) -> Self {
        if cell == MISSING_SENTINEL {
            Self::Missing
        } else {
            Self::Text(cell.to_string())
        }
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

/// How one field of one page went
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionStatus {
    /// `via` names the fallback that produced the value, if any
    Done { via: Option<String> },
    Failed(String),
    NotAttempted,
}

impl ExtractionStatus {
    #[must_use]
    pub fn done() -> Self {
        Self::Done { via: None }
    }
}

impl fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done { via: None } => f.write_str("Done"),
            Self::Done { via: Some(via) } => write!(f, "Done ({via})"),
            Self::Failed(reason) => write!(f, "Failed: {reason}"),
            Self::NotAttempted => f.write_str("Not attempted"),
        }
    }
}

/// One output row; `values` holds every column except the provenance column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub values: Vec<FieldValue>,
    pub provenance: String,
}

impl Record {
    pub fn new(values: Vec<FieldValue>, provenance: impl Into<String>) -> Self {
        Self {
            values,
            provenance: provenance.into(),
        }
    }
}

/// Column layout of one deployment's output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    pub columns: Vec<String>,
    /// Column holding the page URL, the deduplication key
    pub provenance_column: usize,
    /// Column naming the work item a record came from; drives resume
    pub item_column: Option<usize>,
}

impl RecordSchema {
    /// `[Region, Ranking Location, Practice Area, Ranking Table, Firm, Sourcelink]`
    #[must_use]
    pub fn rankings() -> Self {
        Self {
            columns: [
                "Region",
                "Ranking Location",
                "Practice Area",
                "Ranking Table",
                "Firm",
                "Sourcelink",
            ]
            .map(String::from)
            .to_vec(),
            provenance_column: 5,
            item_column: Some(4),
        }
    }

    #[must_use]
    pub fn parcels() -> Self {
        Self {
            columns: [
                "Pin#",
                "Description",
                "Description1",
                "Account",
                "Parcel",
                "Year",
                "Billing Year",
                "Pin",
                "Total Tax",
                "Balance Due",
                "Sourcelink",
            ]
            .map(String::from)
            .to_vec(),
            provenance_column: 10,
            item_column: Some(0),
        }
    }

    /// Number of `Record::values` a record of this schema carries
    #[must_use]
    pub fn value_count(&self) -> usize {
        self.columns.len() - 1
    }

    /// Position of a full-row column inside `Record::values`
    fn value_index(&self, column: usize) -> Option<usize> {
        match column.cmp(&self.provenance_column) {
            std::cmp::Ordering::Less => Some(column),
            std::cmp::Ordering::Equal => None,
            std::cmp::Ordering::Greater => Some(column - 1),
        }
    }

    /// Cells of one record in file column order
    #[must_use]
    pub fn to_row<'a>(&self, record: &'a Record) -> Vec<&'a str> {
        let mut values = record.values.iter();
        (0..self.columns.len())
            .map(|column| {
                if column == self.provenance_column {
                    record.provenance.as_str()
                } else {
                    values.next().map_or(MISSING_SENTINEL, FieldValue::as_cell)
                }
            })
            .collect()
    }

    /// Parse one row read back from disk.
    ///
    /// # Errors
    ///
    /// Rejects rows whose width differs from the schema.
    pub fn from_row<'r>(&self, row: impl IntoIterator<Item = &'r str>) -> ScrapeResult<Record> {
        let cells: Vec<&str> = row.into_iter().collect();
        if cells.len() != self.columns.len() {
            return Err(ScrapeError::FieldExtraction {
                field: "row".to_string(),
                reason: format!(
                    "expected {} columns, found {}",
                    self.columns.len(),
                    cells.len()
                ),
            });
        }
        let provenance = cells[self.provenance_column].to_string();
        let values = cells
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != self.provenance_column)
            .map(|(_, cell)| FieldValue::from_cell(cell))
            .collect();
        Ok(Record { values, provenance })
    }

    /// Value of the item column, if present and not missing
    #[must_use]
    pub fn item_value<'a>(&self, record: &'a Record) -> Option<&'a str> {
        let index = self.value_index(self.item_column?)?;
        match record.values.get(index)? {
            FieldValue::Text(text) => Some(text),
            FieldValue::Missing => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_renders_as_sentinel_only_at_the_boundary() {
        let schema = RecordSchema::rankings();
        let record = Record::new(
            vec![
                FieldValue::text("United Kingdom"),
                FieldValue::text("London"),
                FieldValue::Missing,
                FieldValue::text("Tier 1"),
                FieldValue::text("Acme Corp"),
            ],
            "https://example.test/r/1",
        );
        assert_eq!(
            schema.to_row(&record),
            vec![
                "United Kingdom",
                "London",
                "N/A",
                "Tier 1",
                "Acme Corp",
                "https://example.test/r/1"
            ]
        );
        assert_eq!(schema.item_value(&record), Some("Acme Corp"));
    }

    #[test]
    fn from_row_rejects_wrong_width() {
        let schema = RecordSchema::rankings();
        assert!(schema.from_row(["a", "b"]).is_err());
    }

    #[test]
    fn from_row_reads_sentinel_as_missing() {
        let schema = RecordSchema::parcels();
        let row = [
            "12-34", "N/A", "d1", "acc", "p", "2024", "2023", "1234", "10.00", "0.00", "url",
        ];
        let record = schema.from_row(row).expect("row");
        assert!(record.values[1].is_missing());
        assert_eq!(record.provenance, "url");
        assert_eq!(schema.item_value(&record), Some("12-34"));
    }

    #[test]
    fn status_display_matches_audit_wording() {
        assert_eq!(ExtractionStatus::done().to_string(), "Done");
        assert_eq!(
            ExtractionStatus::Done {
                via: Some("Firms to watch".into())
            }
            .to_string(),
            "Done (Firms to watch)"
        );
        assert_eq!(
            ExtractionStatus::Failed("h1/a element not found".into()).to_string(),
            "Failed: h1/a element not found"
        );
    }
}
