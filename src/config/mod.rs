//! Configuration module for scrape jobs
//!
//! This module provides the `ScrapeConfig` struct, its type-safe builder, the
//! site locator profile, and loading from a TOML file.

// Sub-modules
pub mod builder;
pub mod getters;
pub mod methods;
pub mod site;
pub mod types;

use anyhow::{Context, Result};
use std::path::Path;

// Re-exports for public API
pub use builder::{ScrapeConfigBuilder, WithBaseUrl, WithOutputDir};
pub use site::SiteProfile;
pub use types::{DelayBounds, DelayRange, PartitionSpec, ScrapeConfig};

impl ScrapeConfig {
    /// Parse a TOML document; missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or fails validation.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source).context("Failed to parse scrape config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&source)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }
}
