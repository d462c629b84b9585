//! One record per row of a parcel search results grid

use scraper::{Html, Selector};

use super::{
    Extraction, ExtractionContext, ExtractionStatus, FieldReport, FieldValue, Record,
    RecordExtractor, RecordSchema, element_text, provenance_or_sentinel,
};
use crate::config::SiteProfile;
use crate::error::{ScrapeError, ScrapeResult};
use crate::session::Locator;

/// Grid cells in output column order; `Description1` is handled separately
const CELLS: [(&str, &str); 9] = [
    ("Pin#", "[aria-describedby='gridResults_PIN']"),
    (
        "Description",
        "[aria-describedby='gridResults_Description'] .pt-sr-name",
    ),
    ("Account", "[aria-describedby='gridResults_Account']"),
    (
        "Parcel",
        "[aria-describedby='gridResults_ParcelNumberFormatted']",
    ),
    ("Year", "[aria-describedby='gridResults_tyYEAR']"),
    (
        "Billing Year",
        "[aria-describedby='gridResults_tyYEAR_BILLING']",
    ),
    ("Pin", "[aria-describedby='gridResults_PIN']"),
    ("Total Tax", "[aria-describedby='gridResults_TotalTaxDisplay']"),
    (
        "Balance Due",
        "[aria-describedby='gridResults_BalanceDueDisplay']",
    ),
];

const ADDRESS_CELL: &str = "[aria-describedby='gridResults_Description'] .pt-sr-address";
const ADDRESS_PLACEHOLDER: &str = "-";

pub struct ParcelExtractor {
    schema: RecordSchema,
    ready: Locator,
    rows: Selector,
    cells: Vec<(&'static str, Selector)>,
    address: Selector,
}

fn compile(css: &str) -> ScrapeResult<Selector> {
    Selector::parse(css).map_err(|e| ScrapeError::Config(format!("invalid selector '{css}': {e}")))
}

impl ParcelExtractor {
    /// # Errors
    ///
    /// Returns `ScrapeError::Config` if the row locator does not parse.
    pub fn new(site: &SiteProfile) -> ScrapeResult<Self> {
        let cells = CELLS
            .iter()
            .map(|(name, css)| Ok((*name, compile(css)?)))
            .collect::<ScrapeResult<Vec<_>>>()?;
        Ok(Self {
            schema: RecordSchema::parcels(),
            ready: site.parcel_rows.clone(),
            rows: site.parcel_rows.selector()?,
            cells,
            address: compile(ADDRESS_CELL)?,
        })
    }

    fn row_record(
        &self,
        row: scraper::ElementRef<'_>,
        page_url: &str,
    ) -> Result<(Record, bool), String> {
        let mut cells = Vec::with_capacity(self.cells.len());
        for (name, selector) in &self.cells {
            let text = row
                .select(selector)
                .next()
                .map(element_text)
                .ok_or_else(|| format!("missing {name} cell"))?;
            cells.push(text);
        }

        let address = row
            .select(&self.address)
            .next()
            .map(element_text)
            .filter(|a| !a.is_empty());
        let fell_back = address.is_none();

        let mut values: Vec<FieldValue> = cells.into_iter().map(FieldValue::Text).collect();
        values.insert(
            2,
            FieldValue::text(address.unwrap_or_else(|| ADDRESS_PLACEHOLDER.to_string())),
        );

        // Every row of one search shares the page URL; the pin makes it unique
        let provenance = match values.first() {
            Some(FieldValue::Text(pin)) if !pin.is_empty() => format!("{page_url}#{pin}"),
            _ => page_url.to_string(),
        };
        Ok((Record::new(values, provenance), fell_back))
    }
}

impl RecordExtractor for ParcelExtractor {
    fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    fn ready(&self) -> &Locator {
        &self.ready
    }

    fn extract(&self, markup: &str, page_url: &str, ctx: &ExtractionContext) -> Extraction {
        let provenance = provenance_or_sentinel(page_url);
        let document = Html::parse_document(markup);
        let rows: Vec<_> = document.select(&self.rows).collect();
        if rows.is_empty() {
            return Extraction::ContainerMissing {
                provenance,
                reason: format!("no result rows for parcel {}", ctx.item),
            };
        }

        let mut records = Vec::with_capacity(rows.len());
        let mut skipped = Vec::new();
        let mut fallbacks = 0usize;
        for (i, row) in rows.iter().enumerate() {
            match self.row_record(*row, &provenance) {
                Ok((record, fell_back)) => {
                    fallbacks += usize::from(fell_back);
                    records.push(record);
                }
                Err(reason) => skipped.push(format!("row {}: {reason}", i + 1)),
            }
        }

        let rows_status = if skipped.is_empty() {
            ExtractionStatus::done()
        } else {
            ExtractionStatus::Failed(format!("{} of {} rows skipped", skipped.len(), rows.len()))
        };
        let address_status = if fallbacks == 0 {
            ExtractionStatus::done()
        } else {
            ExtractionStatus::Done {
                via: Some(format!("placeholder on {fallbacks} rows")),
            }
        };

        Extraction::Page {
            records,
            fields: vec![
                FieldReport::new("Rows", rows_status),
                FieldReport::new("Description1", address_status),
                FieldReport::new("Sourcelink", ExtractionStatus::done()),
            ],
            skipped,
        }
    }
}
