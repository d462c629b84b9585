//! Resumable traversal of one partition
//!
//! Listing -> Processing(i) -> [Restarting] -> Processing(i + 1) ... -> Done | Halted
//!
//! Item handles are re-resolved from the live listing before every item; a
//! shorter listing halts the partition. The browser session is rotated every
//! `restart_cadence` items and whenever navigating back fails. Records are
//! flushed after every item and kept in the returned report, so the job can
//! always write a final snapshot.

pub mod partition;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{PartitionSpec, ScrapeConfig};
use crate::coordinator::BatchCoordinator;
use crate::error::{ScrapeError, ScrapeResult};
use crate::extractor::{ExtractionContext, Record, RecordExtractor};
use crate::progress::ProgressReporter;
use crate::session::{ElementRef, Locator, PageSession, Pacing, SessionFactory, accept_cookies};
use crate::sink::{AuditLine, AuditLog, AuditMode, DurableSink, FlushOutcome, Severity};
use crate::utils::constants::{MISSING_SENTINEL, SCRIPT_STATUS_ACTOR};

pub use partition::{HaltReason, Partition, ResumePoint, WalkerState, WorkItem, resume_point};

/// Outcome of one partition
#[derive(Debug)]
pub struct PartitionReport {
    pub name: String,
    pub records: Vec<Record>,
    pub state: WalkerState,
    pub restarts: usize,
    /// Items that reached the end of processing, including skipped detail pages
    pub processed: usize,
}

/// Audit log that may be closed while the session restarts
#[derive(Default)]
struct AuditSlot(Option<AuditLog>);

impl AuditSlot {
    fn append(&mut self, line: AuditLine) {
        if let Some(log) = self.0.as_mut() {
            log.append(line);
        }
    }

    fn log_mut(&mut self) -> ScrapeResult<&mut AuditLog> {
        self.0
            .as_mut()
            .ok_or_else(|| ScrapeError::Browser("audit log is not open".into()))
    }

    fn close(&mut self) {
        if let Some(log) = self.0.take() {
            log.close();
        }
    }
}

struct Run<S> {
    partition: Partition,
    session: Option<S>,
    audit: AuditSlot,
    state: WalkerState,
    restarts: usize,
    processed: usize,
    processed_in_session: usize,
    force_restart: bool,
}

enum ItemStep {
    /// Item finished (with or without records); counts toward the cadence
    Next,
    /// Item could not be resolved from the listing
    Skip,
    Halt(HaltReason),
}

enum DetailStep {
    Scraped,
    NotTarget,
    OriginLost,
}

fn no_session() -> ScrapeError {
    ScrapeError::Browser("no live browser session".into())
}

pub struct PartitionWalker<'a, F: SessionFactory> {
    config: &'a ScrapeConfig,
    factory: &'a F,
    sink: &'a dyn DurableSink,
    extractor: &'a dyn RecordExtractor,
    progress: &'a dyn ProgressReporter,
    cancel: CancellationToken,
    pacing: Pacing,
}

impl<'a, F: SessionFactory> PartitionWalker<'a, F> {
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
            pacing: Pacing::new(*config.delays()),
        }
    }

    /// Walk one partition to completion, halt or failure.
    ///
    /// Never returns early without shutting the session down and writing the
    /// final total line.
    pub async fn run(&self, spec: &PartitionSpec) -> PartitionReport {
        let listing_url = self.config.listing_url(&spec.listing_path);
        let mut run = Run {
            partition: Partition::new(spec, listing_url),
            session: None,
            audit: AuditSlot::default(),
            state: WalkerState::Listing,
            restarts: 0,
            processed: 0,
            processed_in_session: 0,
            force_restart: false,
        };
        info!("Starting partition: {}", spec.name);

        match self.walk(&mut run).await {
            Ok(()) => {}
            Err(ScrapeError::Cancelled) => {
                warn!("Halting partition {}: cancellation requested", spec.name);
                run.state = WalkerState::Halted(HaltReason::Cancelled);
            }
            Err(e) => {
                let message = e.short_message();
                error!("Critical error in partition {}: {message}", spec.name);
                self.progress.report_error(&message);
                run.audit.append(AuditLine::critical(
                    MISSING_SENTINEL,
                    format!("Unhandled error processing partition: {message}"),
                ));
                run.state = WalkerState::Halted(HaltReason::Failed(message));
            }
        }

        self.finish(&mut run).await;
        PartitionReport {
            name: run.partition.name,
            records: run.partition.records,
            state: run.state,
            restarts: run.restarts,
            processed: run.processed,
        }
    }

    async fn walk(&self, run: &mut Run<F::Session>) -> ScrapeResult<()> {
        let name = run.partition.name.clone();
        if self.cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled);
        }
        run.audit.0 = Some(self.sink.open_audit(&name, AuditMode::Overwrite)?);

        match self.sink.consolidate(&name) {
            Ok(report) if report.sources > 0 => run.audit.append(AuditLine::info(
                SCRIPT_STATUS_ACTOR,
                format!(
                    "Consolidated {} files into {} records",
                    report.sources, report.records
                ),
            )),
            Ok(_) => {}
            Err(e) => {
                warn!("Consolidation failed for {name}: {}", e.short_message());
                run.audit.append(AuditLine::failure(SCRIPT_STATUS_ACTOR, Severity::Warn, &e, ""));
            }
        }
        match self.sink.load(&name) {
            Ok(records) => {
                if !records.is_empty() {
                    info!("Found existing output for {name}: {} records", records.len());
                }
                run.partition.records = records;
            }
            Err(e) => {
                error!(
                    "Could not read existing output for {name}, starting from scratch: {}",
                    e.short_message()
                );
                run.audit.append(AuditLine::failure(SCRIPT_STATUS_ACTOR, Severity::Error, &e, ""));
            }
        }

        run.session = Some(self.factory.open().await?);
        run.state = WalkerState::Listing;
        self.read_listing(run).await?;

        let point = resume_point(
            self.extractor.schema(),
            &run.partition.records,
            &run.partition.items,
        );
        match &point {
            ResumePoint::Fresh => {}
            ResumePoint::After { last, cursor } => {
                info!("Resuming after '{last}', starting with item #{}", cursor + 1);
                run.audit.append(AuditLine::info(
                    SCRIPT_STATUS_ACTOR,
                    format!("Resuming after '{last}' at item #{}", cursor + 1),
                ));
            }
            ResumePoint::NotFound { last } => {
                warn!("Could not find last item '{last}' on the listing. Starting from the beginning.");
                run.audit.append(AuditLine::warn(
                    SCRIPT_STATUS_ACTOR,
                    format!("Last item '{last}' not on listing; starting from the beginning"),
                ));
            }
        }
        run.partition.cursor = point.cursor();

        let total = run.partition.items.len();
        self.progress.report_partition_started(&name, total);

        let cadence = self.config.restart_cadence().max(1);
        let mut i = run.partition.cursor;
        while i < total {
            if self.cancel.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }
            if run.force_restart
                || (run.processed_in_session > 0 && run.processed_in_session % cadence == 0)
            {
                run.state = WalkerState::Restarting;
                self.restart(run).await?;
            }

            run.state = WalkerState::Processing(i);
            run.partition.cursor = i;
            match self.process_item(run, i, total).await? {
                ItemStep::Next => {
                    run.processed += 1;
                    run.processed_in_session += 1;
                }
                ItemStep::Skip => {}
                ItemStep::Halt(reason) => {
                    run.state = WalkerState::Halted(reason);
                    return Ok(());
                }
            }
            i += 1;
        }
        run.partition.cursor = total;
        run.state = WalkerState::Done;
        Ok(())
    }

    async fn read_listing(&self, run: &mut Run<F::Session>) -> ScrapeResult<()> {
        let site = self.config.site();
        let wait = self.config.wait_timeout();
        let session = run.session.as_mut().ok_or_else(no_session)?;

        session.navigate(&run.partition.listing_url).await?;
        self.accept_cookies(session).await;

        let heading = session.wait_for(&site.listing_heading, wait).await?;
        let location = session.text(&heading).await?.trim().to_string();

        session.wait_for(&site.listing_grid, wait).await?;
        let handles = session.find_all(&site.listing_item).await?;
        let mut items = Vec::with_capacity(handles.len());
        for handle in handles {
            let name = session
                .text(&handle)
                .await
                .map(|t| t.trim().to_string())
                .unwrap_or_default();
            items.push(WorkItem {
                name,
                index: handle.index,
                handle: Some(handle),
            });
        }

        info!("Found {} items in {location}", items.len());
        run.audit.append(AuditLine::info(
            SCRIPT_STATUS_ACTOR,
            format!("Found {} items in {location}", items.len()),
        ));
        run.partition.location = Some(location).filter(|l| !l.is_empty());
        run.partition.items = items;
        Ok(())
    }

    async fn accept_cookies(&self, session: &mut F::Session) {
        let site = self.config.site();
        accept_cookies(
            session,
            &site.cookie_button,
            &site.cookie_label,
            self.config.cookie_wait(),
            &self.pacing,
        )
        .await;
    }

    /// Listing handles, re-read from the live page
    async fn resolve_items(&self, session: &mut F::Session) -> ScrapeResult<Vec<ElementRef>> {
        let site = self.config.site();
        session
            .wait_for(&site.listing_grid, self.config.wait_timeout())
            .await?;
        session.find_all(&site.listing_item).await
    }

    async fn process_item(
        &self,
        run: &mut Run<F::Session>,
        i: usize,
        total: usize,
    ) -> ScrapeResult<ItemStep> {
        let partition_name = run.partition.name.clone();
        let session = run.session.as_mut().ok_or_else(no_session)?;

        let handles = match self.resolve_items(session).await {
            Ok(handles) => handles,
            Err(e) => {
                error!("{} while finding item {}. Skipping item.", e.kind(), i + 1);
                run.audit.append(AuditLine::failure(
                    MISSING_SENTINEL,
                    Severity::Error,
                    &e,
                    format!("item #{}", i + 1),
                ));
                self.progress
                    .report_item_skipped(&partition_name, MISSING_SENTINEL, &e.short_message());
                return Ok(ItemStep::Skip);
            }
        };
        if i >= handles.len() {
            let err = ScrapeError::ListingInstability {
                expected: i + 1,
                found: handles.len(),
            };
            warn!("{}. Skipping to next partition.", err.short_message());
            run.audit.append(AuditLine::failure(MISSING_SENTINEL, Severity::Warn, &err, ""));
            return Ok(ItemStep::Halt(HaltReason::ListingInstability {
                expected: i + 1,
                found: handles.len(),
            }));
        }
        let handle = handles[i].clone();

        let name = match session.text(&handle).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                error!("{} while reading item {}. Skipping item.", e.kind(), i + 1);
                run.audit.append(AuditLine::failure(
                    MISSING_SENTINEL,
                    Severity::Error,
                    &e,
                    format!("item #{}", i + 1),
                ));
                self.progress
                    .report_item_skipped(&partition_name, MISSING_SENTINEL, &e.short_message());
                return Ok(ItemStep::Skip);
            }
        };
        if let Some(item) = run.partition.items.get_mut(i) {
            item.name.clone_from(&name);
            item.handle = Some(handle.clone());
        }

        run.audit.append(AuditLine::info(
            &name,
            format!("--- Starting scrape for {name} in {partition_name} ---"),
        ));
        self.progress.report_item_started(&partition_name, i, &name);
        info!("Processing item {}/{total}: {name}", i + 1);

        if let Err(e) = session.click(&handle).await {
            let severity = if matches!(e, ScrapeError::StaleReference(_)) {
                Severity::Error
            } else {
                Severity::Critical
            };
            error!("{} while clicking {name}. Skipping item.", e.kind());
            run.audit.append(AuditLine::failure(&name, severity, &e, ""));
            self.progress
                .report_item_skipped(&partition_name, &name, &e.short_message());
            return Ok(ItemStep::Skip);
        }

        let ctx = ExtractionContext::new(&name, run.partition.location.clone());
        let before = run.partition.records.len();
        let detail = self
            .scrape_detail(session, &mut run.audit, &mut run.partition.records, &ctx)
            .await;

        match detail {
            Ok(step @ (DetailStep::Scraped | DetailStep::OriginLost)) => {
                self.flush(&partition_name, &run.partition.records, &mut run.audit, &name);
                run.audit.append(AuditLine::info(
                    &name,
                    format!("--- Finished scrape for {name} ---"),
                ));
                self.progress.report_item_finished(
                    &partition_name,
                    &name,
                    run.partition.records.len() - before,
                );
                if matches!(step, DetailStep::OriginLost) {
                    // The listing tab is gone; going back is pointless
                    run.force_restart = true;
                    return Ok(ItemStep::Next);
                }
            }
            Ok(DetailStep::NotTarget) => {
                self.progress
                    .report_item_skipped(&partition_name, &name, "not a target page");
            }
            Err(ScrapeError::Cancelled) => return Err(ScrapeError::Cancelled),
            Err(e) if e.is_recoverable() => {
                error!("Error scraping {name}: {}", e.short_message());
                run.audit.append(AuditLine::failure(&name, Severity::Critical, &e, ""));
                self.progress
                    .report_item_skipped(&partition_name, &name, &e.short_message());
            }
            Err(e) => return Err(e),
        }

        if self.cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled);
        }

        let session = run.session.as_mut().ok_or_else(no_session)?;
        match session.go_back().await {
            Ok(()) => self.accept_cookies(session).await,
            Err(e) => {
                error!("Error navigating back, restarting browser: {}", e.short_message());
                run.audit.append(AuditLine::failure(&name, Severity::Critical, &e, ""));
                run.force_restart = true;
            }
        }
        Ok(ItemStep::Next)
    }

    /// Verify the detail page, find its cards and extract them batch by batch.
    async fn scrape_detail(
        &self,
        session: &mut F::Session,
        audit: &mut AuditSlot,
        records: &mut Vec<Record>,
        ctx: &ExtractionContext,
    ) -> ScrapeResult<DetailStep> {
        let wait = self.config.wait_timeout();
        let name = ctx.item.as_str();

        if !self.is_target_page(session, name).await {
            let err = ScrapeError::NotTargetPage(format!("'{name}' detail heading not found"));
            warn!("Clicked '{name}' but landed on a generic page. Skipping.");
            audit.append(AuditLine::failure(name, Severity::Warn, &err, ""));
            return Ok(DetailStep::NotTarget);
        }

        let (locator, count) = self.find_cards(session, audit, name).await;
        if count == 0 {
            info!("Found 0 entries for {name}");
            audit.append(AuditLine::info(name, "No entries found."));
            return Ok(DetailStep::Scraped);
        }

        let policy = self.config.batch_policy();
        let batches: Vec<_> = policy.batches(count).collect();
        info!(
            "Found {count} entries for {name}; {} batch(es) of up to {}",
            batches.len(),
            policy.batch_size(count)
        );
        audit.append(AuditLine::info(
            name,
            format!(
                "Found {count} entries. Batch size: {}.",
                policy.batch_size(count)
            ),
        ));

        let coordinator = BatchCoordinator::new(self.extractor, self.pacing, wait);
        for (k, range) in batches.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }
            audit.append(AuditLine::info(
                name,
                format!("Starting Batch {}/{}", k + 1, batches.len()),
            ));

            // Handles from the previous batch died with the contexts it opened
            let live = session.find_all(locator).await.unwrap_or_default();
            let cards: Vec<ElementRef> = live
                .into_iter()
                .skip(range.start)
                .take(range.len())
                .collect();

            let mut outcome = coordinator
                .process_batch(session, &cards, ctx, audit.log_mut()?, &self.cancel)
                .await;
            records.append(&mut outcome.records);

            if outcome.cancelled {
                return Err(ScrapeError::Cancelled);
            }
            if !outcome.origin_restored() {
                return Ok(DetailStep::OriginLost);
            }
            audit.append(AuditLine::info(
                name,
                format!("Finished Batch {}/{}", k + 1, batches.len()),
            ));
        }
        audit.append(AuditLine::info(name, "Finished processing all batches."));
        Ok(DetailStep::Scraped)
    }

    async fn is_target_page(&self, session: &mut F::Session, name: &str) -> bool {
        let site = self.config.site();
        if session
            .wait_for(&site.detail_heading, self.config.wait_timeout())
            .await
            .is_err()
        {
            return false;
        }
        self.accept_cookies(session).await;
        let Ok(headings) = session.find_all(&site.detail_heading).await else {
            return false;
        };
        for heading in headings {
            if let Ok(text) = session.text(&heading).await
                && text.contains(name)
            {
                return true;
            }
        }
        false
    }

    /// Cards on the detail page, trying the fallback locator if the primary finds none
    async fn find_cards(
        &self,
        session: &mut F::Session,
        audit: &mut AuditSlot,
        name: &str,
    ) -> (&'a Locator, usize) {
        let site = self.config.site();
        let primary = session.find_all(&site.detail_cards).await.unwrap_or_default();
        if !primary.is_empty() {
            return (&site.detail_cards, primary.len());
        }

        audit.append(AuditLine::warn(
            name,
            "Standard card locator failed. Trying alternative.",
        ));
        let fallback = match session
            .wait_for(&site.detail_cards_container, self.config.wait_timeout())
            .await
        {
            Ok(_) => session
                .find_all(&site.detail_cards_fallback)
                .await
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        };
        if fallback.is_empty() {
            audit.append(AuditLine::warn(name, "Alternative card locator also failed."));
        }
        (&site.detail_cards_fallback, fallback.len())
    }

    fn flush(&self, partition: &str, records: &[Record], audit: &mut AuditSlot, actor: &str) {
        match self.sink.flush(partition, records) {
            Ok(FlushOutcome::Written(_)) => self.progress.report_flushed(partition, records.len()),
            Ok(FlushOutcome::Fallback(path)) => {
                audit.append(AuditLine::warn(
                    actor,
                    format!("Primary output locked; saved to {}", path.display()),
                ));
                self.progress.report_flushed(partition, records.len());
            }
            Ok(FlushOutcome::Skipped) => {}
            Err(e) => {
                error!("Could not save {partition}: {}", e.short_message());
                audit.append(AuditLine::failure(actor, Severity::Error, &e, ""));
            }
        }
    }

    async fn restart(&self, run: &mut Run<F::Session>) -> ScrapeResult<()> {
        let name = run.partition.name.clone();
        let total = run.partition.records.len();
        info!(
            "Scheduled restart after {} items. Interim total for {name}: {total}",
            run.processed_in_session
        );
        self.progress.report_restart(&name, run.processed_in_session);
        run.audit.append(AuditLine::info(
            SCRIPT_STATUS_ACTOR,
            format!("Interim save. Total records so far: {total}"),
        ));
        run.audit.close();

        if let Some(mut session) = run.session.take()
            && let Err(e) = session.shutdown().await
        {
            warn!("Session shutdown failed: {}", e.short_message());
        }

        let pause = self.config.restart_pause();
        info!("Browser closed. Pausing for {:?}", pause);
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(ScrapeError::Cancelled),
            () = tokio::time::sleep(pause) => {}
        }

        run.session = Some(self.factory.open().await?);
        run.audit.0 = Some(self.sink.open_audit(&name, AuditMode::Append)?);
        info!("Restarting process for {name}");

        let session = run.session.as_mut().ok_or_else(no_session)?;
        session.navigate(&run.partition.listing_url).await?;
        self.accept_cookies(session).await;

        run.restarts += 1;
        run.processed_in_session = 0;
        run.force_restart = false;
        Ok(())
    }

    /// Release the session and write the final total line.
    async fn finish(&self, run: &mut Run<F::Session>) {
        let name = run.partition.name.clone();
        if let Some(mut session) = run.session.take() {
            if let Err(e) = session.shutdown().await {
                warn!("Session shutdown failed: {}", e.short_message());
            }
            info!("Browser for {name} closed");
        }

        if run.audit.0.is_none() {
            match self.sink.open_audit(&name, AuditMode::Append) {
                Ok(log) => run.audit.0 = Some(log),
                Err(e) => warn!("Could not reopen audit log for {name}: {}", e.short_message()),
            }
        }
        let total = run.partition.records.len();
        info!("Final total for {name}: {total} records");
        run.audit.append(AuditLine::info(
            SCRIPT_STATUS_ACTOR,
            format!("Partition finished. Final total records: {total}"),
        ));
        run.audit.close();

        let halted = match &run.state {
            WalkerState::Halted(reason) => Some(reason.to_string()),
            _ => None,
        };
        self.progress
            .report_partition_finished(&name, total, halted.as_deref());
    }
}
