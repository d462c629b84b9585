use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::utils::constants::{
    DEFAULT_LARGE_BATCH_SIZE, DEFAULT_LARGE_BATCH_THRESHOLD, DEFAULT_MID_BATCH_SIZE,
    DEFAULT_SMALL_BATCH_MAX,
};

/// How many detail contexts to hold open at once, by card count
///
/// Small pages go in one batch, very large ones in bigger batches so the page
/// count stays bounded, and everything in between in `mid_batch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchPolicy {
    pub small_max: usize,
    pub mid_batch: usize,
    pub large_threshold: usize,
    pub large_batch: usize,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            small_max: DEFAULT_SMALL_BATCH_MAX,
            mid_batch: DEFAULT_MID_BATCH_SIZE,
            large_threshold: DEFAULT_LARGE_BATCH_THRESHOLD,
            large_batch: DEFAULT_LARGE_BATCH_SIZE,
        }
    }
}

impl BatchPolicy {
    #[must_use]
    pub fn batch_size(&self, total: usize) -> usize {
        if total <= self.small_max {
            total
        } else if total > self.large_threshold {
            self.large_batch
        } else {
            self.mid_batch
        }
    }

    /// Index ranges of consecutive batches covering `0..total`
    pub fn batches(&self, total: usize) -> impl Iterator<Item = Range<usize>> {
        let size = self.batch_size(total).max(1);
        (0..total)
            .step_by(size)
            .map(move |start| start..(start + size).min(total))
    }

    /// # Errors
    ///
    /// Rejects zero batch sizes and a large threshold below the small maximum.
    pub fn validate(&self) -> Result<()> {
        if self.mid_batch == 0 || self.large_batch == 0 {
            bail!("batch sizes must be at least 1");
        }
        if self.large_threshold < self.small_max {
            bail!(
                "large_threshold ({}) must not be below small_max ({})",
                self.large_threshold,
                self.small_max
            );
        }
        Ok(())
    }
}
