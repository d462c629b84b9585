//! Builder methods available for all states
//!
//! This module contains methods that can be called on the builder
//! regardless of its current type state.

use super::builder::ScrapeConfigBuilder;
use super::site::SiteProfile;
use super::types::{DelayBounds, PartitionSpec};
use crate::coordinator::BatchPolicy;

impl<State> ScrapeConfigBuilder<State> {
    /// Add one partition to process
    #[must_use]
    pub fn partition(mut self, name: impl Into<String>, listing_path: impl Into<String>) -> Self {
        self.draft
            .partitions
            .push(PartitionSpec::new(name, listing_path));
        self
    }

    #[must_use]
    pub fn partitions(mut self, partitions: Vec<PartitionSpec>) -> Self {
        self.draft.partitions = partitions;
        self
    }

    #[must_use]
    pub fn output_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.draft.output_suffix = suffix.into();
        self
    }

    #[must_use]
    pub fn region_label(mut self, label: impl Into<String>) -> Self {
        self.draft.region_label = label.into();
        self
    }

    /// Replace the user-agent pool
    #[must_use]
    pub fn user_agents(mut self, agents: Vec<String>) -> Self {
        self.draft.user_agents = agents;
        self
    }

    #[must_use]
    pub fn batch_policy(mut self, policy: BatchPolicy) -> Self {
        self.draft.batch_policy = policy;
        self
    }

    /// Processed items between scheduled browser restarts
    ///
    /// A long-lived browser context grows steadily in memory and keeps the same
    /// fingerprint, so the session is closed and reopened on this cadence.
    ///
    /// # Example
    /// ```rust
    /// # use rankscrape::config::ScrapeConfig;
    /// # fn main() -> anyhow::Result<()> {
    /// let config = ScrapeConfig::builder()
    ///     .output_dir("./out")
    ///     .base_url("https://www.legal500.com")
    ///     .restart_cadence(10)
    ///     .restart_pause_secs(30)
    ///     .build()?;
    /// assert_eq!(config.restart_cadence(), 10);
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn restart_cadence(mut self, items: usize) -> Self {
        self.draft.restart_cadence = items;
        self
    }

    #[must_use]
    pub fn restart_pause_secs(mut self, secs: u64) -> Self {
        self.draft.restart_pause_secs = secs;
        self
    }

    #[must_use]
    pub fn wait_timeout_secs(mut self, secs: u64) -> Self {
        self.draft.wait_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn cookie_wait_secs(mut self, secs: u64) -> Self {
        self.draft.cookie_wait_secs = secs;
        self
    }

    #[must_use]
    pub fn delays(mut self, delays: DelayBounds) -> Self {
        self.draft.delays = delays;
        self
    }

    /// Set browser headless mode
    ///
    /// Headed mode shows the browser window, which helps when a site changes
    /// its markup and locators need adjusting. It is overridden to headless in
    /// release builds.
    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.draft.headless = headless;
        self
    }

    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.draft.workers = workers;
        self
    }

    #[must_use]
    pub fn site(mut self, site: SiteProfile) -> Self {
        self.draft.site = site;
        self
    }

    #[must_use]
    pub fn parcel_search_url(mut self, url: impl Into<String>) -> Self {
        self.draft.parcel_search_url = url.into();
        self
    }
}
