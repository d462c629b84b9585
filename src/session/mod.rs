//! Browser page sessions
//!
//! `PageSession` is the only way the orchestration code touches a browser.
//! Element handles are positional (`ElementRef`) and re-resolved on every use,
//! so a handle taken before a navigation fails loudly instead of pointing at a
//! detached node.

pub mod chromium;
pub mod cookies;
pub mod pacing;
pub mod wait;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{ScrapeError, ScrapeResult};

pub use chromium::{ChromiumSession, ChromiumSessionFactory};
pub use cookies::accept_cookies;
pub use pacing::{Pace, Pacing};
pub use wait::{Deadline, with_timeout};

/// A CSS selector kept as text until it is used
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    pub fn new(selector: impl Into<String>) -> Self {
        Self(selector.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check the selector parses.
    ///
    /// # Errors
    ///
    /// Returns the parser's message for a malformed selector.
    pub fn validate(&self) -> Result<(), String> {
        scraper::Selector::parse(&self.0)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    /// Compile for querying rendered markup.
    ///
    /// # Errors
    ///
    /// Returns `ScrapeError::Config` for a malformed selector.
    pub fn selector(&self) -> ScrapeResult<scraper::Selector> {
        scraper::Selector::parse(&self.0)
            .map_err(|e| ScrapeError::Config(format!("invalid selector '{}': {e}", self.0)))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one browsing context (tab)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(String);

impl ContextId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The `index`-th match of `locator` in `context`, resolved on use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
    pub context: ContextId,
    pub locator: Locator,
    pub index: usize,
}

impl ElementRef {
    pub fn new(context: ContextId, locator: Locator, index: usize) -> Self {
        Self {
            context,
            locator,
            index,
        }
    }

    pub(crate) fn stale(&self, why: &str) -> ScrapeError {
        ScrapeError::StaleReference(format!(
            "{}[{}] in {}: {why}",
            self.locator, self.index, self.context
        ))
    }
}

/// Capability surface of a live browser
///
/// Every wait is bounded; exceeding it yields `ScrapeError::Timeout`.
/// `open_in_new_context` may report success while the context never appears,
/// so callers check `contexts()` afterwards.
#[async_trait]
pub trait PageSession: Send {
    async fn navigate(&mut self, url: &str) -> ScrapeResult<()>;

    async fn go_back(&mut self) -> ScrapeResult<()>;

    /// First match of `locator` in the current context, polled until `timeout`
    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> ScrapeResult<ElementRef>;

    /// Every current match; an empty list is not an error
    async fn find_all(&mut self, locator: &Locator) -> ScrapeResult<Vec<ElementRef>>;

    async fn text(&mut self, element: &ElementRef) -> ScrapeResult<String>;

    async fn attribute(&mut self, element: &ElementRef, name: &str)
    -> ScrapeResult<Option<String>>;

    async fn click(&mut self, element: &ElementRef) -> ScrapeResult<()>;

    async fn type_text(&mut self, element: &ElementRef, text: &str) -> ScrapeResult<()>;

    /// Open the element's link in a new context without switching to it
    async fn open_in_new_context(&mut self, element: &ElementRef) -> ScrapeResult<ContextId>;

    /// Live contexts, in opening order
    async fn contexts(&mut self) -> ScrapeResult<Vec<ContextId>>;

    fn current_context(&self) -> ContextId;

    async fn switch_to(&mut self, context: &ContextId) -> ScrapeResult<()>;

    async fn close_current_context(&mut self) -> ScrapeResult<()>;

    async fn current_url(&mut self) -> ScrapeResult<String>;

    async fn rendered_markup(&mut self) -> ScrapeResult<String>;

    async fn shutdown(&mut self) -> ScrapeResult<()>;
}

/// Opens fresh sessions; used at partition start and on every restart
#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Session: PageSession;

    async fn open(&self) -> ScrapeResult<Self::Session>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_validation_reports_bad_selectors() {
        assert!(Locator::new("div.grid article a h4").validate().is_ok());
        assert!(Locator::new(r"span.md\:typography-interface-l-bold").validate().is_ok());
        assert!(Locator::new("div[").validate().is_err());
    }

    #[test]
    fn locator_round_trips_as_plain_string() {
        let json = serde_json::to_string(&Locator::new("h1")).expect("serialize");
        assert_eq!(json, "\"h1\"");
    }

    #[test]
    fn stale_error_names_the_reference() {
        let element = ElementRef::new(ContextId::new("tab-1"), Locator::new("h4"), 3);
        let err = element.stale("context closed");
        assert_eq!(err.kind(), "StaleReference");
        assert!(err.to_string().contains("h4[3] in tab-1"));
    }
}
