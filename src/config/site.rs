//! Site-specific locators
//!
//! Selector strings are brittle and change with every site redesign, so none of
//! them are baked into the orchestration code. Defaults target the ranking
//! directory and the county parcel search.

use serde::{Deserialize, Serialize};

use crate::session::Locator;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    /// Path of the page that lists every partition
    pub discovery_path: String,
    /// Links to partitions on the discovery page
    pub partition_links: Locator,
    /// Appended to a discovered partition href to reach its listing
    pub listing_suffix: String,
    /// Heading of a listing page; its text becomes the location column
    pub listing_heading: Locator,
    /// Container that must be visible before listing items are read
    pub listing_grid: Locator,
    /// One element per work item on the listing page
    pub listing_item: Locator,
    /// Heading of an item's detail page, probed for the item name
    pub detail_heading: Locator,
    /// Cards on an item page, each linking to one record page
    pub detail_cards: Locator,
    /// Section probed when `detail_cards` matches nothing
    pub detail_cards_container: Locator,
    pub detail_cards_fallback: Locator,
    /// Waited for on each record page before its markup is read
    pub record_ready: Locator,
    /// Top-level record container; absence fails the whole page
    pub record_container: Locator,
    pub practice_area: Locator,
    pub firm: Locator,
    pub ranking_table: Locator,
    /// Secondary indicator probed when `ranking_table` is absent
    pub ranking_table_fallback: Locator,
    pub ranking_table_fallback_label: String,
    pub cookie_button: Locator,
    pub cookie_label: String,
    pub parcel_mode_radio: Locator,
    pub parcel_input: Locator,
    pub parcel_submit: Locator,
    pub parcel_rows: Locator,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            discovery_path: "rankings#r/united-kingdom".to_string(),
            partition_links: Locator::new("h4 + ul a"),
            listing_suffix: "directory".to_string(),
            listing_heading: Locator::new("h1"),
            listing_grid: Locator::new("div.grid"),
            listing_item: Locator::new("div.grid article a h4"),
            detail_heading: Locator::new("h1"),
            detail_cards: Locator::new("a[href*='/rankings/ranking/']"),
            detail_cards_container: Locator::new("section.p-0"),
            detail_cards_fallback: Locator::new("section.p-0 a[href*='/rankings/ranking/']"),
            record_ready: Locator::new("header"),
            record_container: Locator::new("header.flex.flex-col.gap-4"),
            practice_area: Locator::new("h3.typography-heading-s a"),
            firm: Locator::new("h1.typography-heading-l a"),
            ranking_table: Locator::new(r"span.md\:typography-interface-l-bold"),
            ranking_table_fallback: Locator::new("img[alt='Firms to watch']"),
            ranking_table_fallback_label: "Firms to watch".to_string(),
            cookie_button: Locator::new("button"),
            cookie_label: crate::utils::constants::COOKIE_ACCEPT_LABEL.to_string(),
            parcel_mode_radio: Locator::new("input[value='parcel'][name='PropertySearchType']"),
            parcel_input: Locator::new("#pt-search-editor-1"),
            parcel_submit: Locator::new("#pt-search-button"),
            parcel_rows: Locator::new("#gridResults tbody tr"),
        }
    }
}

impl SiteProfile {
    /// Every locator with its field name, for validation messages
    pub(crate) fn locators(&self) -> Vec<(&'static str, &Locator)> {
        vec![
            ("partition_links", &self.partition_links),
            ("listing_heading", &self.listing_heading),
            ("listing_grid", &self.listing_grid),
            ("listing_item", &self.listing_item),
            ("detail_heading", &self.detail_heading),
            ("detail_cards", &self.detail_cards),
            ("detail_cards_container", &self.detail_cards_container),
            ("detail_cards_fallback", &self.detail_cards_fallback),
            ("record_ready", &self.record_ready),
            ("record_container", &self.record_container),
            ("practice_area", &self.practice_area),
            ("firm", &self.firm),
            ("ranking_table", &self.ranking_table),
            ("ranking_table_fallback", &self.ranking_table_fallback),
            ("cookie_button", &self.cookie_button),
            ("parcel_mode_radio", &self.parcel_mode_radio),
            ("parcel_input", &self.parcel_input),
            ("parcel_submit", &self.parcel_submit),
            ("parcel_rows", &self.parcel_rows),
        ]
    }
}
