pub mod browser_profile;
pub mod browser_setup;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod extractor;
pub mod job;
pub mod pool;
pub mod progress;
pub mod session;
pub mod sink;
pub mod utils;
pub mod walker;

pub use browser_profile::{BrowserProfile, cleanup_stale_profiles, create_unique_profile};
pub use browser_setup::{
    download_managed_browser, find_browser_executable, launch_browser, mask_automation,
};
pub use config::{DelayBounds, DelayRange, PartitionSpec, ScrapeConfig, SiteProfile};
pub use coordinator::{BatchCoordinator, BatchOutcome, BatchPolicy};
pub use error::{ErrorScope, ScrapeError, ScrapeResult};
pub use extractor::{
    Extraction, ExtractionContext, ExtractionStatus, FieldReport, FieldValue, ParcelExtractor,
    RankingExtractor, Record, RecordExtractor, RecordSchema,
};
pub use job::{JobReport, ScrapeJob, discover_partitions};
pub use pool::{ItemOutcome, ItemResult, ItemTask, ParcelSearch, WorkerPool};
pub use progress::{ChannelProgress, NoOpProgress, ProgressReporter, ScrapeEvent};
pub use session::{
    ChromiumSession, ChromiumSessionFactory, ContextId, ElementRef, Locator, PageSession, Pacing,
    SessionFactory,
};
pub use sink::{AuditLine, AuditLog, AuditMode, CsvSink, DurableSink, FlushOutcome, Severity};
pub use walker::{PartitionReport, PartitionWalker, WalkerState, WorkItem};
