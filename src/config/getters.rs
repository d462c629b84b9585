//! Getter methods for `ScrapeConfig`

use std::path::PathBuf;

use super::site::SiteProfile;
use super::types::{DelayBounds, PartitionSpec, ScrapeConfig};
use crate::coordinator::BatchPolicy;

impl ScrapeConfig {
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn output_dir(&self) -> &PathBuf {
        &self.output_dir
    }

    #[must_use]
    pub fn output_suffix(&self) -> &str {
        &self.output_suffix
    }

    #[must_use]
    pub fn region_label(&self) -> &str {
        &self.region_label
    }

    #[must_use]
    pub fn partitions(&self) -> &[PartitionSpec] {
        &self.partitions
    }

    #[must_use]
    pub fn user_agents(&self) -> &[String] {
        &self.user_agents
    }

    #[must_use]
    pub fn batch_policy(&self) -> BatchPolicy {
        self.batch_policy
    }

    #[must_use]
    pub fn restart_cadence(&self) -> usize {
        self.restart_cadence
    }

    #[must_use]
    pub fn restart_pause_secs(&self) -> u64 {
        self.restart_pause_secs
    }

    #[must_use]
    pub fn wait_timeout_secs(&self) -> u64 {
        self.wait_timeout_secs
    }

    #[must_use]
    pub fn cookie_wait_secs(&self) -> u64 {
        self.cookie_wait_secs
    }

    #[must_use]
    pub fn delays(&self) -> &DelayBounds {
        &self.delays
    }

    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    #[must_use]
    pub fn site(&self) -> &SiteProfile {
        &self.site
    }

    #[must_use]
    pub fn parcel_search_url(&self) -> &str {
        &self.parcel_search_url
    }

    /// Directory that holds a partition's files
    #[must_use]
    pub fn partition_dir(&self, partition: &str) -> PathBuf {
        self.output_dir
            .join(crate::utils::sanitize_partition_name(partition))
    }
}
