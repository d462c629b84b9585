//! One ranking record per detail page

use scraper::{Html, Selector};

use super::{
    Extraction, ExtractionContext, ExtractionStatus, FieldReport, FieldValue, Record,
    RecordExtractor, RecordSchema, element_text, provenance_or_sentinel,
};
use crate::config::SiteProfile;
use crate::error::ScrapeResult;
use crate::session::Locator;

pub struct RankingExtractor {
    schema: RecordSchema,
    ready: Locator,
    region_label: String,
    container: Selector,
    practice_area: Selector,
    firm: Selector,
    ranking_table: Selector,
    ranking_table_fallback: Selector,
    fallback_label: String,
}

impl RankingExtractor {
    /// Compile the site's record locators.
    ///
    /// # Errors
    ///
    /// Returns `ScrapeError::Config` if a locator does not parse.
    pub fn new(site: &SiteProfile, region_label: impl Into<String>) -> ScrapeResult<Self> {
        Ok(Self {
            schema: RecordSchema::rankings(),
            ready: site.record_ready.clone(),
            region_label: region_label.into(),
            container: site.record_container.selector()?,
            practice_area: site.practice_area.selector()?,
            firm: site.firm.selector()?,
            ranking_table: site.ranking_table.selector()?,
            ranking_table_fallback: site.ranking_table_fallback.selector()?,
            fallback_label: site.ranking_table_fallback_label.clone(),
        })
    }
}

fn text_field(
    container: scraper::ElementRef<'_>,
    selector: &Selector,
    what: &str,
) -> (FieldValue, ExtractionStatus) {
    match container.select(selector).next().map(element_text) {
        Some(text) if !text.is_empty() => (FieldValue::Text(text), ExtractionStatus::done()),
        Some(_) => (
            FieldValue::Missing,
            ExtractionStatus::Failed(format!("{what} element is empty")),
        ),
        None => (
            FieldValue::Missing,
            ExtractionStatus::Failed(format!("{what} element not found")),
        ),
    }
}

impl RecordExtractor for RankingExtractor {
    fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    fn ready(&self) -> &Locator {
        &self.ready
    }

    fn extract(&self, markup: &str, page_url: &str, ctx: &ExtractionContext) -> Extraction {
        let provenance = provenance_or_sentinel(page_url);
        let document = Html::parse_document(markup);
        let Some(container) = document.select(&self.container).next() else {
            return Extraction::ContainerMissing {
                provenance,
                reason: "header container not found on ranking page".to_string(),
            };
        };

        let (practice_area, practice_status) =
            text_field(container, &self.practice_area, "practice area");
        let (firm, firm_status) = text_field(container, &self.firm, "firm");

        let (table, table_status) = match container.select(&self.ranking_table).next() {
            Some(tier) => {
                let text = element_text(tier);
                if text.is_empty() {
                    (
                        FieldValue::Missing,
                        ExtractionStatus::Failed("tier element is empty".into()),
                    )
                } else {
                    (FieldValue::Text(text), ExtractionStatus::done())
                }
            }
            None if container.select(&self.ranking_table_fallback).next().is_some() => (
                FieldValue::text(&self.fallback_label),
                ExtractionStatus::Done {
                    via: Some(self.fallback_label.clone()),
                },
            ),
            None => (
                FieldValue::Missing,
                ExtractionStatus::Failed(format!(
                    "tier element and '{}' indicator not found",
                    self.fallback_label
                )),
            ),
        };

        let location = ctx
            .location
            .as_deref()
            .filter(|l| !l.is_empty())
            .map_or(FieldValue::Missing, FieldValue::text);

        let record = Record::new(
            vec![
                FieldValue::text(&self.region_label),
                location,
                practice_area,
                table,
                firm,
            ],
            provenance,
        );

        Extraction::Page {
            records: vec![record],
            fields: vec![
                FieldReport::new("Practice Area", practice_status),
                FieldReport::new("Ranking Table", table_status),
                FieldReport::new("Firm", firm_status),
                FieldReport::new("Sourcelink", ExtractionStatus::done()),
            ],
            skipped: Vec::new(),
        }
    }
}
