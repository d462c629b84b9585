//! Shared configuration defaults for rankscrape
//!
//! Batch thresholds and restart cadence were tuned empirically against the
//! ranking directory. They are defaults, not protocol; every one of them can be
//! overridden through `ScrapeConfig`.

/// Default directory site root
pub const DEFAULT_BASE_URL: &str = "https://www.legal500.com";

/// Fixed region column value for the ranking deployment
pub const DEFAULT_REGION_LABEL: &str = "United Kingdom";

/// Root directory that holds one sub-directory per partition
pub const DEFAULT_OUTPUT_DIR: &str = "Legal500_Scraped_Data";

/// Suffix in `{partition}_{suffix}.csv` and its backups
pub const DEFAULT_OUTPUT_SUFFIX: &str = "rankings";

/// Sentinel written to files for a field that could not be extracted
pub const MISSING_SENTINEL: &str = "N/A";

/// Counts at or below this run as a single batch
pub const DEFAULT_SMALL_BATCH_MAX: usize = 4;

/// Batch size for counts above `DEFAULT_SMALL_BATCH_MAX`
pub const DEFAULT_MID_BATCH_SIZE: usize = 4;

/// Counts above this use `DEFAULT_LARGE_BATCH_SIZE`
pub const DEFAULT_LARGE_BATCH_THRESHOLD: usize = 100;

pub const DEFAULT_LARGE_BATCH_SIZE: usize = 10;

/// Processed items between scheduled session restarts
pub const DEFAULT_RESTART_CADENCE: usize = 15;

/// Pause between closing and reopening the browser on a scheduled restart
pub const DEFAULT_RESTART_PAUSE_SECS: u64 = 120;

/// Upper bound for every element wait
pub const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 20;

/// Short wait for the cookie banner, which usually never shows
pub const DEFAULT_COOKIE_WAIT_SECS: u64 = 3;

/// Parallel browser sessions for pool-driven jobs
pub const DEFAULT_WORKERS: usize = 6;

/// Interval between polls of a bounded wait
pub const POLL_INTERVAL_MS: u64 = 250;

/// Parcel search form for the county property deployment
pub const DEFAULT_PARCEL_SEARCH_URL: &str =
    "https://marshall.countygovservices.com/Property/Property/Search";

/// Label of the cookie-consent button
pub const COOKIE_ACCEPT_LABEL: &str = "Accept All";

/// Actor name for job-level audit lines
pub const SCRIPT_STATUS_ACTOR: &str = "SCRIPT_STATUS";

/// User-agent pool; one is picked at random for every new session.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/119.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:109.0) Gecko/20100101 Firefox/119.0",
    "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/119.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/118.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/110.0.0.0 Safari/537.36 Edg/110.0.1587.41",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/109.0",
];

/// Output suffix of the parcel-search deployment
pub const PARCEL_OUTPUT_SUFFIX: &str = "results";
