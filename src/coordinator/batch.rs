use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ScrapeError;
use crate::extractor::{Extraction, ExtractionContext, Record, RecordExtractor};
use crate::session::{ContextId, Deadline, ElementRef, Pace, PageSession, Pacing};
use crate::sink::{AuditLine, AuditLog, Severity};

/// What one batch produced
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub records: Vec<Record>,
    /// Open requests that reported success
    pub opened: usize,
    pub failed_opens: usize,
    /// Contexts that actually appeared
    pub materialized: usize,
    pub extracted_pages: usize,
    pub failed_pages: usize,
    pub cancelled: bool,
    /// Set when the origin context could not be re-activated
    pub origin_error: Option<ScrapeError>,
}

impl BatchOutcome {
    #[must_use]
    pub fn origin_restored(&self) -> bool {
        self.origin_error.is_none()
    }
}

pub struct BatchCoordinator<'a> {
    extractor: &'a dyn RecordExtractor,
    pacing: Pacing,
    wait_timeout: Duration,
}

impl<'a> BatchCoordinator<'a> {
    pub fn new(extractor: &'a dyn RecordExtractor, pacing: Pacing, wait_timeout: Duration) -> Self {
        Self {
            extractor,
            pacing,
            wait_timeout,
        }
    }

    /// Open every card in its own context, extract each context, close it, and
    /// return to the context the batch started from.
    ///
    /// Open failures and page failures are written to `audit` and absorbed.
    pub async fn process_batch<S: PageSession + ?Sized>(
        &self,
        session: &mut S,
        cards: &[ElementRef],
        ctx: &ExtractionContext,
        audit: &mut AuditLog,
        cancel: &CancellationToken,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let origin = session.current_context();
        let before = match session.contexts().await {
            Ok(contexts) => contexts,
            Err(e) => {
                debug!("Could not list contexts: {}", e.short_message());
                vec![origin.clone()]
            }
        };

        for (i, card) in cards.iter().enumerate() {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }
            match session.open_in_new_context(card).await {
                Ok(_) => outcome.opened += 1,
                Err(e) => {
                    outcome.failed_opens += 1;
                    warn!(
                        "Could not open card {} for {}: {}",
                        i + 1,
                        ctx.item,
                        e.short_message()
                    );
                    audit.append(AuditLine::failure(&ctx.item, Severity::Warn, &e, ""));
                }
            }
            self.pacing.pause(Pace::Card).await;
        }

        let fresh = self.await_contexts(session, &before, outcome.opened).await;
        outcome.materialized = fresh.len();
        if fresh.len() < outcome.opened {
            warn!(
                "Only {} of {} contexts opened for {}",
                fresh.len(),
                outcome.opened,
                ctx.item
            );
            audit.append(AuditLine::warn(
                &ctx.item,
                format!(
                    "Only {} of {} detail contexts opened",
                    fresh.len(),
                    outcome.opened
                ),
            ));
        }

        for context in &fresh {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                Self::discard(session, context).await;
                continue;
            }
            if let Err(e) = session.switch_to(context).await {
                outcome.failed_pages += 1;
                audit.append(AuditLine::failure(&ctx.item, Severity::Error, &e, ""));
                Self::discard(session, context).await;
                continue;
            }
            if self.extract_current(session, ctx, audit, &mut outcome).await {
                outcome.extracted_pages += 1;
            } else {
                outcome.failed_pages += 1;
            }
            if let Err(e) = session.close_current_context().await {
                warn!("Could not close context {context}: {}", e.short_message());
            }
        }

        if let Err(e) = session.switch_to(&origin).await {
            error!("Could not return to origin context: {}", e.short_message());
            audit.append(AuditLine::failure(&ctx.item, Severity::Error, &e, ""));
            outcome.origin_error = Some(e);
        }
        outcome
    }

    /// Poll until `opened` new contexts exist or the wait runs out.
    async fn await_contexts<S: PageSession + ?Sized>(
        &self,
        session: &mut S,
        before: &[ContextId],
        opened: usize,
    ) -> Vec<ContextId> {
        let deadline = Deadline::after(self.wait_timeout);
        loop {
            let fresh: Vec<ContextId> = match session.contexts().await {
                Ok(contexts) => contexts
                    .into_iter()
                    .filter(|c| !before.contains(c))
                    .collect(),
                Err(e) => {
                    debug!("Could not list contexts: {}", e.short_message());
                    Vec::new()
                }
            };
            if fresh.len() >= opened || !deadline.tick().await {
                return fresh;
            }
        }
    }

    /// Extract the active context. Returns whether the page produced an extraction.
    async fn extract_current<S: PageSession + ?Sized>(
        &self,
        session: &mut S,
        ctx: &ExtractionContext,
        audit: &mut AuditLog,
        outcome: &mut BatchOutcome,
    ) -> bool {
        let page_url = session.current_url().await.unwrap_or_default();

        if let Err(e) = session.wait_for(self.extractor.ready(), self.wait_timeout).await {
            error!("Error extracting data from tab: {}", e.short_message());
            audit.append(AuditLine::failure(&ctx.item, Severity::Error, &e, &page_url));
            return false;
        }
        let markup = match session.rendered_markup().await {
            Ok(markup) => markup,
            Err(e) => {
                error!("Error extracting data from tab: {}", e.short_message());
                audit.append(AuditLine::failure(&ctx.item, Severity::Error, &e, &page_url));
                return false;
            }
        };

        match self.extractor.extract(&markup, &page_url, ctx) {
            Extraction::Page {
                records,
                fields,
                skipped,
            } => {
                info!("Extracted {} record(s) from {page_url}", records.len());
                audit.append(AuditLine::fields(&ctx.item, &fields));
                for reason in skipped {
                    audit.append(AuditLine::warn(&ctx.item, format!("Skipped {reason}")));
                }
                outcome.records.extend(records);
                true
            }
            Extraction::ContainerMissing { provenance, reason } => {
                let err = ScrapeError::ContainerMissing {
                    url: provenance.clone(),
                    reason,
                };
                error!("{}", err.short_message());
                audit.append(AuditLine::failure(&ctx.item, Severity::Error, &err, provenance));
                false
            }
        }
    }

    async fn discard<S: PageSession + ?Sized>(session: &mut S, context: &ContextId) {
        if session.switch_to(context).await.is_ok()
            && let Err(e) = session.close_current_context().await
        {
            debug!("Could not close context {context}: {}", e.short_message());
        }
    }
}
