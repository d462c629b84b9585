//! Tests for the type-safe configuration builder and TOML loading

use rankscrape::config::{DelayBounds, DelayRange, PartitionSpec, ScrapeConfig};
use rankscrape::coordinator::BatchPolicy;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

mod common;

#[test]
fn test_builder_requires_output_dir_and_base_url() {
    // This should not compile if uncommented - testing compile-time guarantees
    // let config = ScrapeConfig::builder().build();

    // This should also not compile - base_url must follow output_dir
    // let config = ScrapeConfig::builder()
    //     .base_url("https://example.com")
    //     .build();

    let temp_dir = TempDir::new().unwrap();
    let config = ScrapeConfig::builder()
        .output_dir(temp_dir.path().to_path_buf())
        .base_url("https://example.com")
        .build()
        .unwrap();

    assert_eq!(config.output_dir(), temp_dir.path());
    assert_eq!(config.base_url(), "https://example.com");
}

#[test]
fn test_builder_optional_fields_have_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config = ScrapeConfig::builder()
        .output_dir(temp_dir.path().to_path_buf())
        .base_url("https://example.com")
        .build()
        .unwrap();

    assert_eq!(config.restart_cadence(), 15);
    assert_eq!(config.restart_pause(), Duration::from_secs(120));
    assert_eq!(config.wait_timeout(), Duration::from_secs(20));
    assert_eq!(config.workers(), 6);
    assert_eq!(config.output_suffix(), "rankings");
    assert_eq!(config.region_label(), "United Kingdom");
    assert_eq!(config.batch_policy(), BatchPolicy::default());
    assert!(config.partitions().is_empty());
    assert!(!config.user_agents().is_empty());
    assert!(config.headless());
}

#[test]
fn test_builder_normalizes_base_url() {
    let config = ScrapeConfig::builder()
        .output_dir(PathBuf::from("/tmp/out"))
        .base_url("directory.example.com/")
        .build()
        .unwrap();

    assert_eq!(config.base_url(), "https://directory.example.com");
    assert_eq!(
        config.listing_url("/c/london/directory"),
        "https://directory.example.com/c/london/directory"
    );
    assert_eq!(
        config.listing_url("https://other.example.com/x"),
        "https://other.example.com/x"
    );
}

#[test]
fn test_builder_rejects_invalid_settings() {
    let base = || {
        ScrapeConfig::builder()
            .output_dir(PathBuf::from("/tmp/out"))
            .base_url("https://example.com")
    };

    assert!(base().restart_cadence(0).build().is_err());
    assert!(base().workers(0).build().is_err());
    assert!(base().user_agents(Vec::new()).build().is_err());
    assert!(
        base()
            .batch_policy(BatchPolicy {
                mid_batch: 0,
                ..BatchPolicy::default()
            })
            .build()
            .is_err()
    );

    let mut delays = DelayBounds::none();
    delays.card = DelayRange::new(500, 100);
    let err = base().delays(delays).build().unwrap_err();
    assert!(err.to_string().contains("card"));
}

#[test]
fn test_partition_dir_is_sanitized() {
    let config = ScrapeConfig::builder()
        .output_dir(PathBuf::from("/tmp/out"))
        .base_url("https://example.com")
        .partition("North: East / West?", "c/north/directory")
        .build()
        .unwrap();

    assert_eq!(
        config.partitions(),
        &[PartitionSpec::new("North: East / West?", "c/north/directory")]
    );
    assert_eq!(
        config.partition_dir("North: East / West?"),
        PathBuf::from("/tmp/out/North_East__West")
    );
}

#[test]
fn test_toml_file_overrides_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
base_url = "https://directory.test"
output_dir = "out"
restart_cadence = 4
workers = 2

[[partitions]]
name = "London"
listing_path = "c/london/directory"

[batch_policy]
large_batch = 20

[delays.card]
min_ms = 10
max_ms = 20

[site]
listing_item = "ul.firms li a"
"#
    )
    .unwrap();

    let config = ScrapeConfig::from_toml_file(file.path()).unwrap();
    assert_eq!(config.base_url(), "https://directory.test");
    assert_eq!(config.restart_cadence(), 4);
    assert_eq!(config.workers(), 2);
    assert_eq!(config.partitions().len(), 1);
    assert_eq!(config.batch_policy().large_batch, 20);
    assert_eq!(config.batch_policy().mid_batch, 4);
    assert_eq!(config.delays().card, DelayRange::new(10, 20));
    assert_eq!(config.site().listing_item.as_str(), "ul.firms li a");
    assert_eq!(config.site().listing_grid.as_str(), "div.grid");
}

#[test]
fn test_toml_rejects_bad_locator() {
    let err = ScrapeConfig::from_toml_str(
        r#"
[site]
firm = "h1["
"#,
    )
    .unwrap_err();
    assert!(format!("{err:#}").contains("firm"));
}

#[test]
fn test_common_config_is_pause_free() {
    let dir = common::create_test_dir().unwrap();
    let config = common::test_config(dir.path());
    assert_eq!(config.restart_pause(), Duration::ZERO);
    assert_eq!(config.cookie_wait(), Duration::ZERO);
    assert_eq!(*config.delays(), DelayBounds::none());
}
