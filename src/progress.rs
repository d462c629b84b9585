//! Progress reporting abstraction for scrape jobs
//!
//! Defines the `ProgressReporter` trait for lifecycle event reporting, a no-op
//! implementation, and a channel-backed one for front-ends that render progress
//! themselves.

use tokio::sync::mpsc;

/// Trait for reporting scrape progress at key lifecycle events
///
/// Implementations can send updates to channels, log to console, update UI, etc.
pub trait ProgressReporter: Send + Sync {
    /// A partition's listing was read and `items` work items were found
    fn report_partition_started(&self, partition: &str, items: usize);

    fn report_item_started(&self, partition: &str, index: usize, item: &str);

    fn report_item_finished(&self, partition: &str, item: &str, records: usize);

    fn report_item_skipped(&self, partition: &str, item: &str, reason: &str);

    /// A session restart is beginning after `processed` items
    fn report_restart(&self, partition: &str, processed: usize);

    fn report_flushed(&self, partition: &str, total: usize);

    /// `halted` carries the reason when the partition did not run to the end
    fn report_partition_finished(&self, partition: &str, total: usize, halted: Option<&str>);

    fn report_error(&self, error: &str);
}

/// Progress reporter that does nothing
#[derive(Debug, Clone, Copy)]
pub struct NoOpProgress;

impl ProgressReporter for NoOpProgress {
    #[inline(always)]
    fn report_partition_started(&self, _partition: &str, _items: usize) {}

    #[inline(always)]
    fn report_item_started(&self, _partition: &str, _index: usize, _item: &str) {}

    #[inline(always)]
    fn report_item_finished(&self, _partition: &str, _item: &str, _records: usize) {}

    #[inline(always)]
    fn report_item_skipped(&self, _partition: &str, _item: &str, _reason: &str) {}

    #[inline(always)]
    fn report_restart(&self, _partition: &str, _processed: usize) {}

    #[inline(always)]
    fn report_flushed(&self, _partition: &str, _total: usize) {}

    #[inline(always)]
    fn report_partition_finished(&self, _partition: &str, _total: usize, _halted: Option<&str>) {}

    #[inline(always)]
    fn report_error(&self, _error: &str) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeEvent {
    PartitionStarted {
        partition: String,
        items: usize,
    },
    ItemStarted {
        partition: String,
        index: usize,
        item: String,
    },
    ItemFinished {
        partition: String,
        item: String,
        records: usize,
    },
    ItemSkipped {
        partition: String,
        item: String,
        reason: String,
    },
    Restart {
        partition: String,
        processed: usize,
    },
    Flushed {
        partition: String,
        total: usize,
    },
    PartitionFinished {
        partition: String,
        total: usize,
        halted: Option<String>,
    },
    Error(String),
}

/// Forwards every event to an unbounded channel; a closed receiver is ignored
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ScrapeEvent>,
}

impl ChannelProgress {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ScrapeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: ScrapeEvent) {
        let _ = self.tx.send(event);
    }
}

impl ProgressReporter for ChannelProgress {
    fn report_partition_started(&self, partition: &str, items: usize) {
        self.send(ScrapeEvent::PartitionStarted {
            partition: partition.to_string(),
            items,
        });
    }

    fn report_item_started(&self, partition: &str, index: usize, item: &str) {
        self.send(ScrapeEvent::ItemStarted {
            partition: partition.to_string(),
            index,
            item: item.to_string(),
        });
    }

    fn report_item_finished(&self, partition: &str, item: &str, records: usize) {
        self.send(ScrapeEvent::ItemFinished {
            partition: partition.to_string(),
            item: item.to_string(),
            records,
        });
    }

    fn report_item_skipped(&self, partition: &str, item: &str, reason: &str) {
        self.send(ScrapeEvent::ItemSkipped {
            partition: partition.to_string(),
            item: item.to_string(),
            reason: reason.to_string(),
        });
    }

    fn report_restart(&self, partition: &str, processed: usize) {
        self.send(ScrapeEvent::Restart {
            partition: partition.to_string(),
            processed,
        });
    }

    fn report_flushed(&self, partition: &str, total: usize) {
        self.send(ScrapeEvent::Flushed {
            partition: partition.to_string(),
            total,
        });
    }

    fn report_partition_finished(&self, partition: &str, total: usize, halted: Option<&str>) {
        self.send(ScrapeEvent::PartitionFinished {
            partition: partition.to_string(),
            total,
            halted: halted.map(str::to_string),
        });
    }

    fn report_error(&self, error: &str) {
        self.send(ScrapeEvent::Error(error.to_string()));
    }
}
