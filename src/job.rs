//! Sequential driver over every configured partition

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{PartitionSpec, ScrapeConfig};
use crate::error::ScrapeResult;
use crate::extractor::RecordExtractor;
use crate::progress::ProgressReporter;
use crate::session::{PageSession, Pacing, SessionFactory, accept_cookies};
use crate::sink::{DurableSink, FlushOutcome};
use crate::walker::{HaltReason, PartitionReport, PartitionWalker, WalkerState};

/// Everything a finished (or interrupted) job produced
#[derive(Debug, Default)]
pub struct JobReport {
    pub partitions: Vec<PartitionReport>,
    pub cancelled: bool,
}

impl JobReport {
    #[must_use]
    pub fn total_records(&self) -> usize {
        self.partitions.iter().map(|p| p.records.len()).sum()
    }

    #[must_use]
    pub fn completed(&self) -> usize {
        self.partitions
            .iter()
            .filter(|p| p.state == WalkerState::Done)
            .count()
    }

    /// Partitions that halted on an error rather than finishing or being cancelled
    pub fn failed(&self) -> impl Iterator<Item = &PartitionReport> {
        self.partitions
            .iter()
            .filter(|p| matches!(p.state, WalkerState::Halted(HaltReason::Failed(_))))
    }
}

pub struct ScrapeJob<'a, F: SessionFactory> {
    config: &'a ScrapeConfig,
    factory: &'a F,
    sink: &'a dyn DurableSink,
    extractor: &'a dyn RecordExtractor,
    progress: &'a dyn ProgressReporter,
    cancel: CancellationToken,
}

impl<'a, F: SessionFactory> ScrapeJob<'a, F> {
    pub fn new(
        config: &'a ScrapeConfig,
        factory: &'a F,
        sink: &'a dyn DurableSink,
        extractor: &'a dyn RecordExtractor,
        progress: &'a dyn ProgressReporter,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            factory,
            sink,
            extractor,
            progress,
            cancel,
        }
    }

    /// Walk `partitions` one after another.
    ///
    /// A partition that fails is logged and the job moves on to the next one.
    /// Only cancellation stops the loop early. Every partition that produced
    /// records is flushed once more before returning.
    pub async fn run(&self, partitions: &[PartitionSpec]) -> JobReport {
        let walker = PartitionWalker::new(
            self.config,
            self.factory,
            self.sink,
            self.extractor,
            self.progress,
            self.cancel.clone(),
        );
        let mut report = JobReport::default();

        for spec in partitions {
            if self.cancel.is_cancelled() {
                warn!("Cancellation requested; not starting {}", spec.name);
                report.cancelled = true;
                break;
            }
            let outcome = walker.run(spec).await;
            info!(
                "Partition {} ended in {:?} with {} records ({} restarts)",
                outcome.name,
                outcome.state,
                outcome.records.len(),
                outcome.restarts
            );
            let halted_by_cancel =
                matches!(outcome.state, WalkerState::Halted(HaltReason::Cancelled));
            if let WalkerState::Halted(HaltReason::Failed(reason)) = &outcome.state {
                error!("Partition {} aborted, moving on: {reason}", outcome.name);
            }
            report.partitions.push(outcome);

            if halted_by_cancel {
                report.cancelled = true;
                break;
            }
        }

        self.final_flush(&report);
        report
    }

    /// Best-effort snapshot of every partition that has records
    fn final_flush(&self, report: &JobReport) {
        for partition in &report.partitions {
            if partition.records.is_empty() {
                continue;
            }
            match self.sink.flush(&partition.name, &partition.records) {
                Ok(FlushOutcome::Written(path)) => {
                    info!(
                        "Saved {} records for {} to {}",
                        partition.records.len(),
                        partition.name,
                        path.display()
                    );
                }
                Ok(FlushOutcome::Fallback(path)) => {
                    warn!(
                        "Primary output for {} locked; saved to {}",
                        partition.name,
                        path.display()
                    );
                }
                Ok(FlushOutcome::Skipped) => {}
                Err(e) => {
                    error!("Final save for {} failed: {}", partition.name, e.short_message());
                    self.progress.report_error(&e.short_message());
                }
            }
        }
    }
}

/// Read the partition list from the directory root page.
///
/// Each link becomes a partition named by its text, with a listing path of the
/// link target plus the configured listing suffix.
///
/// # Errors
///
/// Returns an error if the page cannot be loaded or shows no partition links.
pub async fn discover_partitions<S: PageSession + ?Sized>(
    session: &mut S,
    config: &ScrapeConfig,
) -> ScrapeResult<Vec<PartitionSpec>> {
    let site = config.site();
    let url = config.listing_url(&site.discovery_path);
    info!("Discovering partitions from {url}");

    session.navigate(&url).await?;
    accept_cookies(
        session,
        &site.cookie_button,
        &site.cookie_label,
        config.cookie_wait(),
        &Pacing::new(*config.delays()),
    )
    .await;
    session
        .wait_for(&site.partition_links, config.wait_timeout())
        .await?;

    let mut found: Vec<PartitionSpec> = Vec::new();
    for link in session.find_all(&site.partition_links).await? {
        let name = session.text(&link).await?.trim().to_string();
        let Some(href) = session.attribute(&link, "href").await? else {
            continue;
        };
        if name.is_empty() || found.iter().any(|p| p.name == name) {
            continue;
        }
        let listing_path = listing_path_for(&href, &site.listing_suffix);
        found.push(PartitionSpec::new(name, listing_path));
    }
    info!("Discovered {} partitions", found.len());
    Ok(found)
}

/// `/united-kingdom/london/` + `directory` -> `united-kingdom/london/directory`
fn listing_path_for(href: &str, suffix: &str) -> String {
    let path = url::Url::parse(href)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| href.to_string());
    let path = path.trim_matches('/');
    let suffix = suffix.trim_matches('/');
    if suffix.is_empty() {
        path.to_string()
    } else {
        format!("{path}/{suffix}")
    }
}
