//! Type-safe builder for `ScrapeConfig` using the typestate pattern
//!
//! `output_dir` and `base_url` must be set, in that order, before `build()`
//! becomes available. Everything else falls back to the defaults in
//! `utils::constants`.

use anyhow::{Result, anyhow, bail};
use std::marker::PhantomData;
use std::path::PathBuf;

use super::types::ScrapeConfig;

// Type states for the builder
pub struct WithOutputDir;
pub struct WithBaseUrl;

pub struct ScrapeConfigBuilder<State = ()> {
    pub(crate) output_dir: Option<PathBuf>,
    pub(crate) base_url: Option<String>,
    /// Optional settings accumulate here and are carried across state changes
    pub(crate) draft: ScrapeConfig,
    pub(crate) _phantom: PhantomData<State>,
}

impl Default for ScrapeConfigBuilder<()> {
    fn default() -> Self {
        Self {
            output_dir: None,
            base_url: None,
            draft: ScrapeConfig::default(),
            _phantom: PhantomData,
        }
    }
}

impl ScrapeConfig {
    /// Create a builder for configuring a `ScrapeConfig` with a fluent interface
    #[must_use]
    pub fn builder() -> ScrapeConfigBuilder<()> {
        ScrapeConfigBuilder::default()
    }
}

impl ScrapeConfigBuilder<()> {
    pub fn output_dir(self, dir: impl Into<PathBuf>) -> ScrapeConfigBuilder<WithOutputDir> {
        ScrapeConfigBuilder {
            output_dir: Some(dir.into()),
            base_url: self.base_url,
            draft: self.draft,
            _phantom: PhantomData,
        }
    }
}

impl ScrapeConfigBuilder<WithOutputDir> {
    pub fn base_url(self, url: impl Into<String>) -> ScrapeConfigBuilder<WithBaseUrl> {
        let url_string = url.into();

        // Normalize URL: add https:// if no scheme is present
        let normalized_url =
            if url_string.starts_with("http://") || url_string.starts_with("https://") {
                url_string
            } else {
                format!("https://{url_string}")
            };

        ScrapeConfigBuilder {
            output_dir: self.output_dir,
            base_url: Some(normalized_url.trim_end_matches('/').to_string()),
            draft: self.draft,
            _phantom: PhantomData,
        }
    }
}

// Build method only available when all required fields are set
impl ScrapeConfigBuilder<WithBaseUrl> {
    pub fn build(self) -> Result<ScrapeConfig> {
        let mut config = self.draft;
        config.output_dir = self
            .output_dir
            .ok_or_else(|| anyhow!("output_dir is required"))?;
        config.base_url = self
            .base_url
            .ok_or_else(|| anyhow!("base_url is required"))?;

        // Enforce headless mode in release builds
        #[cfg(not(debug_assertions))]
        if !config.headless {
            tracing::warn!(
                "Forcing headless mode in release build. \
                Headed mode is only available in debug builds for development."
            );
            config.headless = true;
        }

        config.validate()?;
        Ok(config)
    }
}

impl ScrapeConfig {
    /// Check invariants that serde and the builder cannot express.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if url::Url::parse(&self.base_url).is_err() {
            bail!("base_url '{}' is not a valid URL", self.base_url);
        }
        if self.restart_cadence == 0 {
            bail!("restart_cadence must be at least 1");
        }
        if self.workers == 0 {
            bail!("workers must be at least 1");
        }
        if self.user_agents.is_empty() {
            bail!("user_agents must contain at least one entry");
        }
        if self.output_suffix.trim().is_empty() {
            bail!("output_suffix must not be empty");
        }
        self.batch_policy.validate()?;
        for (name, range) in self.delays.iter() {
            if !range.is_valid() {
                bail!(
                    "delay '{name}' has min {}ms above max {}ms",
                    range.min_ms,
                    range.max_ms
                );
            }
        }
        for (name, locator) in self.site.locators() {
            locator
                .validate()
                .map_err(|e| anyhow!("locator '{name}' is invalid: {e}"))?;
        }
        Ok(())
    }
}
