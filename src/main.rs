// rankscrape: resumable browser scraping of directory listings.
//
// `regions` lists the partitions found on the directory root page, `rankings`
// walks them (or a chosen subset), `parcels` runs the parcel search pool over a
// CSV of parcel numbers. Ctrl-C stops after the current step and saves.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rankscrape::config::{PartitionSpec, ScrapeConfig};
use rankscrape::extractor::{RankingExtractor, RecordSchema};
use rankscrape::pool::{ParcelSearch, read_parcel_list, run_parcels};
use rankscrape::progress::NoOpProgress;
use rankscrape::session::{ChromiumSessionFactory, PageSession, SessionFactory};
use rankscrape::sink::CsvSink;
use rankscrape::walker::{HaltReason, WalkerState};
use rankscrape::utils::constants::PARCEL_OUTPUT_SUFFIX;
use rankscrape::{ScrapeJob, cleanup_stale_profiles, discover_partitions};

#[derive(Parser)]
#[command(name = "rankscrape", version, about)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted
    #[arg(long, short, global = true, env = "RANKSCRAPE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the partitions on the directory root page
    Regions {
        /// Print as JSON instead of one name per line
        #[arg(long)]
        json: bool,
    },
    /// Scrape rankings for every partition, or only the named ones
    Rankings {
        #[arg(long = "region", value_name = "NAME")]
        regions: Vec<String>,
    },
    /// Search every parcel number listed in the second column of a CSV file
    Parcels {
        #[arg(long, value_name = "FILE")]
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ScrapeConfig::from_toml_file(path)?,
        None => {
            let config = ScrapeConfig::default();
            config.validate()?;
            config
        }
    };

    match cleanup_stale_profiles() {
        Ok(0) => {}
        Ok(n) => info!("Removed {n} stale browser profiles"),
        Err(e) => warn!("Stale profile cleanup failed: {e:#}"),
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing the current step and saving");
            on_signal.cancel();
        }
    });

    match cli.command {
        Command::Regions { json } => regions(&config, json).await,
        Command::Rankings { regions } => rankings(&config, &regions, cancel).await,
        Command::Parcels { input } => parcels(&config, &input, cancel).await,
    }
}

async fn discover(config: &ScrapeConfig) -> Result<Vec<PartitionSpec>> {
    let factory = ChromiumSessionFactory::from_config(config);
    let mut session = factory.open().await.context("Failed to open browser")?;
    let found = discover_partitions(&mut session, config).await;
    if let Err(e) = session.shutdown().await {
        warn!("Browser shutdown failed: {}", e.short_message());
    }
    found.context("Partition discovery failed")
}

async fn regions(config: &ScrapeConfig, json: bool) -> Result<()> {
    let partitions = discover(config).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&partitions)?);
    } else {
        for partition in &partitions {
            println!("{}\t{}", partition.name, partition.listing_path);
        }
    }
    Ok(())
}

async fn rankings(
    config: &ScrapeConfig,
    wanted: &[String],
    cancel: CancellationToken,
) -> Result<()> {
    let available = if config.partitions().is_empty() {
        discover(config).await?
    } else {
        config.partitions().to_vec()
    };

    let selected: Vec<PartitionSpec> = if wanted.is_empty() {
        available
    } else {
        let mut selected = Vec::with_capacity(wanted.len());
        for name in wanted {
            let Some(spec) = available
                .iter()
                .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
            else {
                bail!("Unknown region '{name}'");
            };
            selected.push(spec.clone());
        }
        selected
    };
    info!("Processing {} regions", selected.len());

    let factory = ChromiumSessionFactory::from_config(config);
    let sink = CsvSink::new(
        config.output_dir().clone(),
        config.output_suffix(),
        RecordSchema::rankings(),
    );
    let extractor = RankingExtractor::new(config.site(), config.region_label())?;
    let progress = NoOpProgress;

    let job = ScrapeJob::new(config, &factory, &sink, &extractor, &progress, cancel);
    let report = job.run(&selected).await;

    info!(
        "Finished {}/{} regions, {} records in total",
        report.completed(),
        selected.len(),
        report.total_records()
    );
    for failed in report.failed() {
        if let WalkerState::Halted(HaltReason::Failed(reason)) = &failed.state {
            warn!("Region {} did not finish: {reason}", failed.name);
        }
    }
    if report.cancelled {
        warn!("Job was interrupted; rerun to resume");
    }
    Ok(())
}

async fn parcels(
    config: &ScrapeConfig,
    input: &std::path::Path,
    cancel: CancellationToken,
) -> Result<()> {
    let parcels = read_parcel_list(input)
        .with_context(|| format!("Failed to read parcel list {}", input.display()))?;
    if parcels.is_empty() {
        bail!("No parcel numbers in {}", input.display());
    }

    let factory = Arc::new(ChromiumSessionFactory::from_config(config));
    let sink = CsvSink::new(
        config.output_dir().clone(),
        PARCEL_OUTPUT_SUFFIX,
        RecordSchema::parcels(),
    );
    let task = Arc::new(ParcelSearch::from_config(config)?);

    let report = run_parcels(config, factory, &sink, task, parcels, &NoOpProgress, cancel).await?;
    info!(
        "Saved {} rows from {} parcels ({} failed)",
        report.records.len(),
        report.searched,
        report.failed
    );
    Ok(())
}
