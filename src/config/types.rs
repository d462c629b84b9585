//! Core configuration types for scrape jobs
//!
//! `ScrapeConfig` carries every tunable the orchestration engine reads. The
//! numeric thresholds are empirically chosen defaults, not invariants.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::site::SiteProfile;
use crate::coordinator::BatchPolicy;
use crate::utils::constants::{
    DEFAULT_BASE_URL, DEFAULT_COOKIE_WAIT_SECS, DEFAULT_OUTPUT_DIR, DEFAULT_OUTPUT_SUFFIX,
    DEFAULT_PARCEL_SEARCH_URL, DEFAULT_REGION_LABEL, DEFAULT_RESTART_CADENCE,
    DEFAULT_RESTART_PAUSE_SECS, DEFAULT_WAIT_TIMEOUT_SECS, DEFAULT_WORKERS, USER_AGENTS,
};

/// Inclusive bounds, in milliseconds, for one kind of randomized pause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    #[must_use]
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0, 0)
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min_ms <= self.max_ms
    }
}

/// Jitter bounds for every kind of browser action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayBounds {
    /// After loading the listing page
    pub navigation: DelayRange,
    /// Between opening consecutive detail cards
    pub card: DelayRange,
    /// After clicking an item on the listing
    pub post_click: DelayRange,
    /// After navigating back to the listing
    pub back: DelayRange,
    /// After dismissing the cookie banner
    pub cookie: DelayRange,
    /// Between keystrokes when typing into a form
    pub keystroke: DelayRange,
}

impl Default for DelayBounds {
    fn default() -> Self {
        Self {
            navigation: DelayRange::new(2_000, 4_000),
            card: DelayRange::new(800, 1_500),
            post_click: DelayRange::new(2_500, 4_500),
            back: DelayRange::new(3_000, 5_000),
            cookie: DelayRange::new(1_000, 2_000),
            keystroke: DelayRange::new(50, 150),
        }
    }
}

impl DelayBounds {
    /// No pauses at all; for tests and replay runs
    #[must_use]
    pub fn none() -> Self {
        Self {
            navigation: DelayRange::zero(),
            card: DelayRange::zero(),
            post_click: DelayRange::zero(),
            back: DelayRange::zero(),
            cookie: DelayRange::zero(),
            keystroke: DelayRange::zero(),
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&'static str, DelayRange)> {
        [
            ("navigation", self.navigation),
            ("card", self.card),
            ("post_click", self.post_click),
            ("back", self.back),
            ("cookie", self.cookie),
            ("keystroke", self.keystroke),
        ]
        .into_iter()
    }
}

/// A partition to process: display name plus its listing path under the base URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSpec {
    pub name: String,
    pub listing_path: String,
}

impl PartitionSpec {
    pub fn new(name: impl Into<String>, listing_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            listing_path: listing_path.into(),
        }
    }
}

/// Main configuration struct for scrape jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Directory site root; listing paths are joined onto it
    pub(crate) base_url: String,
    /// Root output directory, one sub-directory per partition
    pub(crate) output_dir: PathBuf,
    /// `{partition}_{suffix}.csv`
    pub(crate) output_suffix: String,
    /// Constant value of the Region column
    pub(crate) region_label: String,
    pub(crate) partitions: Vec<PartitionSpec>,
    /// Picked at random for every new browser session
    pub(crate) user_agents: Vec<String>,
    pub(crate) batch_policy: BatchPolicy,
    /// Processed items between scheduled session restarts
    pub(crate) restart_cadence: usize,
    pub(crate) restart_pause_secs: u64,
    /// Upper bound for every element and context wait
    pub(crate) wait_timeout_secs: u64,
    pub(crate) cookie_wait_secs: u64,
    pub(crate) delays: DelayBounds,
    pub(crate) headless: bool,
    /// Browser sessions in the worker pool
    pub(crate) workers: usize,
    pub(crate) site: SiteProfile,
    pub(crate) parcel_search_url: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
            region_label: DEFAULT_REGION_LABEL.to_string(),
            partitions: Vec::new(),
            user_agents: USER_AGENTS.iter().map(|ua| (*ua).to_string()).collect(),
            batch_policy: BatchPolicy::default(),
            restart_cadence: DEFAULT_RESTART_CADENCE,
            restart_pause_secs: DEFAULT_RESTART_PAUSE_SECS,
            wait_timeout_secs: DEFAULT_WAIT_TIMEOUT_SECS,
            cookie_wait_secs: DEFAULT_COOKIE_WAIT_SECS,
            delays: DelayBounds::default(),
            headless: true,
            workers: DEFAULT_WORKERS,
            site: SiteProfile::default(),
            parcel_search_url: DEFAULT_PARCEL_SEARCH_URL.to_string(),
        }
    }
}

impl ScrapeConfig {
    #[must_use]
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    #[must_use]
    pub fn cookie_wait(&self) -> Duration {
        Duration::from_secs(self.cookie_wait_secs)
    }

    #[must_use]
    pub fn restart_pause(&self) -> Duration {
        Duration::from_secs(self.restart_pause_secs)
    }

    /// Join a listing path onto the base URL, tolerating stray slashes.
    #[must_use]
    pub fn listing_url(&self, listing_path: &str) -> String {
        if listing_path.starts_with("http://") || listing_path.starts_with("https://") {
            return listing_path.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            listing_path.trim_start_matches('/')
        )
    }
}
