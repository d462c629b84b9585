//! Parcel-search deployment: one search per parcel number, rows as records

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{ItemOutcome, ItemResult, ItemTask, WorkerPool};
use crate::config::{ScrapeConfig, SiteProfile};
use crate::error::{ScrapeError, ScrapeResult};
use crate::extractor::{Extraction, ExtractionContext, ParcelExtractor, Record, RecordExtractor};
use crate::progress::ProgressReporter;
use crate::session::{Pace, PageSession, Pacing, SessionFactory};
use crate::sink::{AuditLine, AuditMode, DurableSink, Severity};
use crate::utils::constants::SCRIPT_STATUS_ACTOR;
use crate::walker::WorkItem;

/// Partition name used for parcel output and its audit log
pub const PARCEL_PARTITION: &str = "parcels";

/// Fill in the search form for one parcel and extract the result grid
pub struct ParcelSearch {
    search_url: String,
    site: SiteProfile,
    extractor: ParcelExtractor,
    wait: Duration,
    pacing: Pacing,
}

impl ParcelSearch {
    /// # Errors
    ///
    /// Returns `ScrapeError::Config` if a grid locator does not parse.
    pub fn from_config(config: &ScrapeConfig) -> ScrapeResult<Self> {
        Ok(Self {
            search_url: config.parcel_search_url().to_string(),
            site: config.site().clone(),
            extractor: ParcelExtractor::new(config.site())?,
            wait: config.wait_timeout(),
            pacing: Pacing::new(*config.delays()),
        })
    }
}

#[async_trait]
impl<S: PageSession> ItemTask<S> for ParcelSearch {
    async fn run(&self, session: &mut S, item: &WorkItem) -> ScrapeResult<Vec<Record>> {
        session.navigate(&self.search_url).await?;

        match session.wait_for(&self.site.parcel_mode_radio, self.wait).await {
            Ok(radio) => session.click(&radio).await?,
            // The form sometimes opens in parcel mode already
            Err(e) => warn!("Parcel option not selectable: {}", e.short_message()),
        }

        let input = session.wait_for(&self.site.parcel_input, self.wait).await?;
        session.type_text(&input, &item.name).await?;

        let submit = session.wait_for(&self.site.parcel_submit, self.wait).await?;
        session.click(&submit).await?;
        self.pacing.pause(Pace::PostClick).await;

        session.wait_for(self.extractor.ready(), self.wait).await?;
        let page_url = session.current_url().await.unwrap_or_default();
        let markup = session.rendered_markup().await?;

        let ctx = ExtractionContext::new(&item.name, None);
        match self.extractor.extract(&markup, &page_url, &ctx) {
            Extraction::Page {
                records, skipped, ..
            } => {
                for reason in &skipped {
                    warn!("Parcel {}: skipped {reason}", item.name);
                }
                Ok(records)
            }
            Extraction::ContainerMissing { provenance, reason } => {
                Err(ScrapeError::ContainerMissing {
                    url: provenance,
                    reason,
                })
            }
        }
    }
}

/// Parcel numbers from the second column of a CSV file.
///
/// Values are trimmed; blanks and repeats are dropped, first occurrence wins.
///
/// # Errors
///
/// Returns an error if the file cannot be read as CSV.
pub fn read_parcel_list(path: &Path) -> ScrapeResult<Vec<String>> {
    info!("Reading parcel numbers from {}", path.display());
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let mut parcels: Vec<String> = Vec::new();
    for row in reader.records() {
        let row = row?;
        let Some(value) = row.get(1).map(str::trim) else {
            continue;
        };
        if value.is_empty() || parcels.iter().any(|p| p == value) {
            continue;
        }
        parcels.push(value.to_string());
    }
    info!("Loaded {} unique parcel numbers", parcels.len());
    Ok(parcels)
}

#[derive(Debug, Default)]
pub struct ParcelRunReport {
    pub records: Vec<Record>,
    /// Rows carried over from earlier runs
    pub carried_over: usize,
    pub searched: usize,
    pub failed: usize,
    pub not_attempted: usize,
}

/// Search every parcel through a worker pool and save the rows.
///
/// Earlier output (fallback files included) is consolidated and carried over
/// first. A parcel searched again replaces its earlier rows. The snapshot is
/// rewritten after every `workers` results and once at the end, so an
/// interrupted run keeps everything found so far.
///
/// # Errors
///
/// Returns an error only if the audit log cannot be opened.
pub async fn run_parcels<F>(
    config: &ScrapeConfig,
    factory: Arc<F>,
    sink: &dyn DurableSink,
    task: Arc<ParcelSearch>,
    parcels: Vec<String>,
    progress: &dyn ProgressReporter,
    cancel: CancellationToken,
) -> ScrapeResult<ParcelRunReport>
where
    F: SessionFactory + 'static,
    F::Session: 'static,
{
    let mut audit = sink.open_audit(PARCEL_PARTITION, AuditMode::Overwrite)?;
    let mut report = ParcelRunReport::default();

    match sink.consolidate(PARCEL_PARTITION) {
        Ok(merged) if merged.sources > 0 => audit.append(AuditLine::info(
            SCRIPT_STATUS_ACTOR,
            format!(
                "Consolidated {} files into {} records",
                merged.sources, merged.records
            ),
        )),
        Ok(_) => {}
        Err(e) => {
            warn!("Consolidation failed for parcel output: {}", e.short_message());
            audit.append(AuditLine::failure(SCRIPT_STATUS_ACTOR, Severity::Warn, &e, ""));
        }
    }
    match sink.load(PARCEL_PARTITION) {
        Ok(records) => {
            if !records.is_empty() {
                info!("Found existing parcel output: {} records", records.len());
            }
            report.carried_over = records.len();
            report.records = records;
        }
        Err(e) => {
            warn!("Could not read existing parcel output: {}", e.short_message());
            audit.append(AuditLine::failure(SCRIPT_STATUS_ACTOR, Severity::Error, &e, ""));
        }
    }

    let items: Vec<WorkItem> = parcels
        .into_iter()
        .enumerate()
        .map(|(i, p)| WorkItem::new(p, i))
        .collect();
    progress.report_partition_started(PARCEL_PARTITION, items.len());
    audit.append(AuditLine::info(
        SCRIPT_STATUS_ACTOR,
        format!("Searching {} parcels", items.len()),
    ));

    let workers = config.workers().max(1);
    let pool = WorkerPool::new(factory, workers, cancel);
    let mut since_flush = 0usize;

    let on_result = |result: &ItemResult| {
        let name = &result.item.name;
        match &result.outcome {
            ItemOutcome::Done(records) => {
                report.searched += 1;
                report
                    .records
                    .retain(|old| records.iter().all(|r| r.provenance != old.provenance));
                report.records.extend(records.iter().cloned());
                audit.append(AuditLine::info(name, format!("Found {} rows", records.len())));
                progress.report_item_finished(PARCEL_PARTITION, name, records.len());
            }
            ItemOutcome::Failed(e) => {
                report.failed += 1;
                audit.append(AuditLine::failure(name, Severity::Error, e, ""));
                progress.report_item_skipped(PARCEL_PARTITION, name, &e.short_message());
            }
            ItemOutcome::NotAttempted => {
                report.not_attempted += 1;
                audit.append(AuditLine::warn(name, "Not attempted"));
                return;
            }
        }

        since_flush += 1;
        if since_flush >= workers {
            since_flush = 0;
            save(sink, &report.records, progress);
        }
    };
    pool.run(items, task, on_result).await;

    save(sink, &report.records, progress);
    info!(
        "Parcel search finished: {} searched, {} failed, {} not attempted, {} rows",
        report.searched,
        report.failed,
        report.not_attempted,
        report.records.len()
    );
    audit.append(AuditLine::info(
        SCRIPT_STATUS_ACTOR,
        format!(
            "Partition finished. Final total records: {}",
            report.records.len()
        ),
    ));
    audit.close();
    let halted = (report.not_attempted > 0).then_some("cancelled");
    progress.report_partition_finished(PARCEL_PARTITION, report.records.len(), halted);
    Ok(report)
}

fn save(sink: &dyn DurableSink, records: &[Record], progress: &dyn ProgressReporter) {
    match sink.flush(PARCEL_PARTITION, records) {
        Ok(_) => progress.report_flushed(PARCEL_PARTITION, records.len()),
        Err(e) => {
            warn!("Could not save parcel results: {}", e.short_message());
            progress.report_error(&e.short_message());
        }
    }
}
