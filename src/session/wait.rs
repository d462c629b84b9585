//! Bounded waits for browser operations
//!
//! Nothing in a session may block indefinitely: one-shot operations go through
//! `with_timeout`, polling loops through `Deadline`.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{ScrapeError, ScrapeResult};
use crate::utils::constants::POLL_INTERVAL_MS;

/// Wrap an async browser operation with an explicit timeout
///
/// # Arguments
/// * `operation` - The future to run
/// * `timeout` - Upper bound on its runtime
/// * `what` - Human-readable name for the `Timeout` error
pub async fn with_timeout<F, T>(operation: F, timeout: Duration, what: &str) -> ScrapeResult<T>
where
    F: Future<Output = ScrapeResult<T>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => Err(ScrapeError::timeout(what, timeout)),
    }
}

/// End point of a polling loop
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
    interval: Duration,
}

impl Deadline {
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
            interval: Duration::from_millis(POLL_INTERVAL_MS),
        }
    }

    #[must_use]
    pub fn expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Sleep one poll interval, never past the deadline.
    ///
    /// Returns `false` once the deadline has passed.
    pub async fn tick(&self) -> bool {
        let now = Instant::now();
        if now >= self.at {
            return false;
        }
        tokio::time::sleep(self.interval.min(self.at - now)).await;
        true
    }

    /// The `Timeout` error for this deadline
    #[must_use]
    pub fn timed_out(&self, what: impl Into<String>) -> ScrapeError {
        ScrapeError::timeout(what, self.budget)
    }
}
