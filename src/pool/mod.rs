//! Fixed-size pool of browser workers fed from a shared queue
//!
//! Each worker opens one session for its lifetime and pulls work items until
//! the queue is empty or the job is cancelled. Results are streamed to a
//! callback as they arrive and returned ordered by item index.

pub mod parcel;

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{ScrapeError, ScrapeResult};
use crate::extractor::Record;
use crate::session::{PageSession, SessionFactory};
use crate::walker::WorkItem;

pub use parcel::{PARCEL_PARTITION, ParcelRunReport, ParcelSearch, read_parcel_list, run_parcels};

/// One unit of work performed by a pool worker on its own session
#[async_trait]
pub trait ItemTask<S: PageSession>: Send + Sync {
    async fn run(&self, session: &mut S, item: &WorkItem) -> ScrapeResult<Vec<Record>>;
}

#[derive(Debug)]
pub enum ItemOutcome {
    Done(Vec<Record>),
    Failed(ScrapeError),
    /// Left in the queue by cancellation or by every worker dying
    NotAttempted,
}

#[derive(Debug)]
pub struct ItemResult {
    pub item: WorkItem,
    pub outcome: ItemOutcome,
}

type Queue = Arc<Mutex<VecDeque<WorkItem>>>;

pub struct WorkerPool<F> {
    factory: Arc<F>,
    workers: usize,
    cancel: CancellationToken,
}

impl<F> WorkerPool<F>
where
    F: SessionFactory + 'static,
    F::Session: 'static,
{
    pub fn new(factory: Arc<F>, workers: usize, cancel: CancellationToken) -> Self {
        Self {
            factory,
            workers: workers.max(1),
            cancel,
        }
    }

    /// Run `task` over every item.
    ///
    /// `on_result` sees each result in completion order; the returned vector is
    /// in item index order and has exactly one entry per input item.
    pub async fn run<T>(
        &self,
        items: Vec<WorkItem>,
        task: Arc<T>,
        mut on_result: impl FnMut(&ItemResult),
    ) -> Vec<ItemResult>
    where
        T: ItemTask<F::Session> + 'static,
    {
        let total = items.len();
        let workers = self.workers.min(total.max(1));
        let queue: Queue = Arc::new(Mutex::new(items.into()));
        let (tx, mut rx) = mpsc::channel::<ItemResult>(workers * 2);

        info!("Starting {workers} workers for {total} items");
        let mut set = JoinSet::new();
        for id in 0..workers {
            set.spawn(worker_loop(
                id,
                Arc::clone(&self.factory),
                Arc::clone(&task),
                Arc::clone(&queue),
                tx.clone(),
                self.cancel.clone(),
            ));
        }
        drop(tx);

        let mut results = Vec::with_capacity(total);
        while let Some(result) = rx.recv().await {
            on_result(&result);
            results.push(result);
        }
        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                error!("Worker task failed: {e}");
            }
        }

        for item in queue.lock().await.drain(..) {
            let result = ItemResult {
                item,
                outcome: ItemOutcome::NotAttempted,
            };
            on_result(&result);
            results.push(result);
        }

        results.sort_by_key(|r| r.item.index);
        results
    }
}

async fn worker_loop<F, T>(
    id: usize,
    factory: Arc<F>,
    task: Arc<T>,
    queue: Queue,
    tx: mpsc::Sender<ItemResult>,
    cancel: CancellationToken,
) where
    F: SessionFactory,
    T: ItemTask<F::Session>,
{
    let mut session = match factory.open().await {
        Ok(session) => session,
        Err(e) => {
            error!("Worker {id} could not open a session: {}", e.short_message());
            return;
        }
    };
    debug!("Worker {id} ready");

    loop {
        if cancel.is_cancelled() {
            debug!("Worker {id} stopping: cancelled");
            break;
        }
        let Some(item) = queue.lock().await.pop_front() else {
            break;
        };

        let outcome = match task.run(&mut session, &item).await {
            Ok(records) => ItemOutcome::Done(records),
            Err(e) => {
                warn!("Worker {id} failed on {}: {}", item.name, e.short_message());
                ItemOutcome::Failed(e)
            }
        };
        let session_broken = matches!(&outcome, ItemOutcome::Failed(ScrapeError::Browser(_)));

        if tx.send(ItemResult { item, outcome }).await.is_err() {
            break;
        }

        if session_broken {
            warn!("Worker {id} replacing its session");
            if let Err(e) = session.shutdown().await {
                debug!("Worker {id} shutdown of broken session: {}", e.short_message());
            }
            session = match factory.open().await {
                Ok(session) => session,
                Err(e) => {
                    error!("Worker {id} could not reopen a session: {}", e.short_message());
                    return;
                }
            };
        }
    }

    if let Err(e) = session.shutdown().await {
        debug!("Worker {id} shutdown: {}", e.short_message());
    }
}
