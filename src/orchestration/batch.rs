//! # Batch Execution
//!
//! Runs many items through the pipeline with bounded concurrency. A batch
//! is a fixed worker pool pulling item ids off a shared queue: `concurrency`
//! workers, each settling one item at a time, so at most that many items are
//! in flight.
//!
//! ## Control
//!
//! Every batch carries a watch channel observed at item boundaries only:
//!
//! - pause: workers stop dequeuing; in-flight items run to completion
//! - resume: workers pick the queue back up
//! - cancel: workers stop dequeuing and every still-queued item is marked
//!   skipped, so the batch always accounts for its full total
//!
//! ## Progress
//!
//! A progress snapshot is emitted after every settled item. Snapshots carry
//! absolute counters, so a dropped snapshot (slow consumer) never corrupts
//! the picture; the next one supersedes it. Priority-intent items are
//! dequeued before everything else.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::constants::events;
use crate::constants::system::{DEFAULT_CONCURRENCY, DEFAULT_PROGRESS_CHANNEL_CAPACITY};
use crate::events::EventPublisher;
use crate::models::UserIntent;
use crate::orchestration::errors::{OrchestrationError, OrchestrationResult};
use crate::orchestration::processor::{ItemOutcome, ItemProcessor};
use crate::store::RecordStore;

/// Options for one batch run
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// Maximum items in flight at once; clamped to at least 1
    pub concurrency: usize,
    /// When false, intent-based guard clauses are waived (forced run)
    pub respect_user_intent: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            respect_user_intent: true,
        }
    }
}

/// Progress snapshot emitted after each settled item
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatchProgress {
    pub batch_id: Uuid,
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub total: u64,
    /// Settled share of the batch: `(completed + failed + skipped) / total`
    pub percentage: f64,
}

/// Final accounting for a finished batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchSummary {
    pub batch_id: Uuid,
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub elapsed: Duration,
    /// Whether the batch was cancelled before draining its queue
    pub cancelled: bool,
}

/// Control states a batch moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchControl {
    Running,
    Paused,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    completed: u64,
    failed: u64,
    skipped: u64,
}

impl Counters {
    fn settled(&self) -> u64 {
        self.completed + self.failed + self.skipped
    }

    fn progress(&self, batch_id: Uuid, total: u64) -> BatchProgress {
        let percentage = if total == 0 {
            100.0
        } else {
            (self.settled() as f64 / total as f64) * 100.0
        };
        BatchProgress {
            batch_id,
            completed: self.completed,
            failed: self.failed,
            skipped: self.skipped,
            total,
            percentage,
        }
    }
}

/// Handle to a spawned batch
pub struct RunningBatch {
    pub batch_id: Uuid,
    progress: Option<mpsc::Receiver<BatchProgress>>,
    handle: tokio::task::JoinHandle<BatchSummary>,
}

impl RunningBatch {
    /// Take the progress receiver: one snapshot per settled item. The
    /// receiver can be taken once; `wait` works without it.
    pub fn take_progress(&mut self) -> Option<mpsc::Receiver<BatchProgress>> {
        self.progress.take()
    }

    /// Wait for the batch to finish and return its summary
    pub async fn wait(self) -> OrchestrationResult<BatchSummary> {
        let batch_id = self.batch_id;
        self.handle
            .await
            .map_err(|join_error| OrchestrationError::BatchJoin {
                batch_id,
                reason: join_error.to_string(),
            })
    }
}

impl std::fmt::Debug for RunningBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningBatch")
            .field("batch_id", &self.batch_id)
            .finish()
    }
}

struct BatchShared {
    batch_id: Uuid,
    total: u64,
    respect_user_intent: bool,
    queue: Mutex<VecDeque<Uuid>>,
    counters: Mutex<Counters>,
    progress_tx: mpsc::Sender<BatchProgress>,
    control: watch::Receiver<BatchControl>,
    processor: Arc<ItemProcessor>,
}

/// Spawns and controls batch runs
pub struct BatchExecutor {
    processor: Arc<ItemProcessor>,
    store: Arc<dyn RecordStore>,
    publisher: EventPublisher,
    controls: Arc<DashMap<Uuid, watch::Sender<BatchControl>>>,
    progress_capacity: usize,
}

impl BatchExecutor {
    pub fn new(
        processor: Arc<ItemProcessor>,
        store: Arc<dyn RecordStore>,
        publisher: EventPublisher,
    ) -> Self {
        Self {
            processor,
            store,
            publisher,
            controls: Arc::new(DashMap::new()),
            progress_capacity: DEFAULT_PROGRESS_CHANNEL_CAPACITY,
        }
    }

    #[must_use]
    pub fn with_progress_capacity(mut self, capacity: usize) -> Self {
        self.progress_capacity = capacity.max(1);
        self
    }

    /// Number of batches currently running
    pub fn active_batches(&self) -> usize {
        self.controls.len()
    }

    /// Spawn a batch over `item_ids` and return a handle to it.
    ///
    /// The batch runs detached; dropping the handle does not cancel it.
    #[instrument(skip(self, item_ids), fields(items = item_ids.len()))]
    pub async fn spawn(&self, item_ids: Vec<Uuid>, options: BatchOptions) -> RunningBatch {
        let batch_id = Uuid::new_v4();
        let concurrency = options.concurrency.max(1);
        let queue = self.order_queue(item_ids).await;
        let total = queue.len() as u64;

        let (control_tx, control_rx) = watch::channel(BatchControl::Running);
        self.controls.insert(batch_id, control_tx);
        let (progress_tx, progress_rx) = mpsc::channel(self.progress_capacity);

        if let Err(publish_error) = self
            .publisher
            .publish(
                events::BATCH_STARTED,
                json!({
                    "batch_id": batch_id,
                    "total": total,
                    "concurrency": concurrency,
                }),
            )
            .await
        {
            warn!(%batch_id, %publish_error, "Failed to publish batch start event");
        }
        info!(%batch_id, total, concurrency, "Batch starting");

        let shared = Arc::new(BatchShared {
            batch_id,
            total,
            respect_user_intent: options.respect_user_intent,
            queue: Mutex::new(queue),
            counters: Mutex::new(Counters::default()),
            progress_tx,
            control: control_rx,
            processor: Arc::clone(&self.processor),
        });

        let controls = Arc::clone(&self.controls);
        let publisher = self.publisher.clone();
        let handle = tokio::spawn(run_batch(shared, controls, publisher, concurrency));

        RunningBatch {
            batch_id,
            progress: Some(progress_rx),
            handle,
        }
    }

    /// Stop dequeuing; in-flight items run to completion. No-op if the
    /// batch was already cancelled.
    pub fn pause(&self, batch_id: Uuid) -> OrchestrationResult<()> {
        self.set_control(batch_id, BatchControl::Paused)
    }

    /// Resume a paused batch. No-op if the batch was already cancelled.
    pub fn resume(&self, batch_id: Uuid) -> OrchestrationResult<()> {
        self.set_control(batch_id, BatchControl::Running)
    }

    /// Cancel the batch: nothing further is dequeued and still-queued items
    /// are marked skipped. Cancellation is terminal.
    pub fn cancel(&self, batch_id: Uuid) -> OrchestrationResult<()> {
        let control = self
            .controls
            .get(&batch_id)
            .ok_or(OrchestrationError::BatchNotFound { batch_id })?;
        control.send_replace(BatchControl::Cancelled);
        info!(%batch_id, "Batch cancelled");
        Ok(())
    }

    fn set_control(&self, batch_id: Uuid, state: BatchControl) -> OrchestrationResult<()> {
        let control = self
            .controls
            .get(&batch_id)
            .ok_or(OrchestrationError::BatchNotFound { batch_id })?;
        control.send_if_modified(|current| {
            if *current == BatchControl::Cancelled || *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        debug!(%batch_id, ?state, "Batch control updated");
        Ok(())
    }

    /// Queue order: priority-intent items first, otherwise submission order.
    /// Unknown ids keep their position and fail when dequeued.
    async fn order_queue(&self, item_ids: Vec<Uuid>) -> VecDeque<Uuid> {
        let mut keyed = Vec::with_capacity(item_ids.len());
        for (position, item_id) in item_ids.into_iter().enumerate() {
            let priority = match self.store.get(item_id).await {
                Ok(item) => item.user_intent == UserIntent::Priority,
                Err(_) => false,
            };
            keyed.push((priority, position, item_id));
        }
        keyed.sort_by_key(|(priority, position, _)| (!*priority, *position));
        keyed.into_iter().map(|(_, _, item_id)| item_id).collect()
    }
}

impl std::fmt::Debug for BatchExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchExecutor")
            .field("active_batches", &self.controls.len())
            .finish()
    }
}

async fn run_batch(
    shared: Arc<BatchShared>,
    controls: Arc<DashMap<Uuid, watch::Sender<BatchControl>>>,
    publisher: EventPublisher,
    concurrency: usize,
) -> BatchSummary {
    let started = Instant::now();
    let batch_id = shared.batch_id;

    let mut workers = Vec::with_capacity(concurrency);
    for worker_index in 0..concurrency {
        workers.push(tokio::spawn(worker_loop(Arc::clone(&shared), worker_index)));
    }
    for worker in workers {
        if let Err(join_error) = worker.await {
            error!(%batch_id, %join_error, "Batch worker panicked");
        }
    }

    let cancelled = *shared.control.borrow() == BatchControl::Cancelled;

    // Queued-but-never-dequeued items exist only after a cancel; settle
    // them as skipped so the batch accounts for its full total.
    let leftover: Vec<Uuid> = shared.queue.lock().drain(..).collect();
    for item_id in &leftover {
        debug!(%batch_id, item_id = %item_id, "Item skipped by cancellation");
        let snapshot = {
            let mut counters = shared.counters.lock();
            counters.skipped += 1;
            counters.progress(batch_id, shared.total)
        };
        if shared.progress_tx.try_send(snapshot).is_err() {
            debug!(%batch_id, "Progress consumer not keeping up, snapshot dropped");
        }
    }

    let counters = *shared.counters.lock();
    let summary = BatchSummary {
        batch_id,
        total: shared.total,
        completed: counters.completed,
        failed: counters.failed,
        skipped: counters.skipped,
        elapsed: started.elapsed(),
        cancelled,
    };

    let event_name = if cancelled {
        events::BATCH_CANCELLED
    } else {
        events::BATCH_COMPLETED
    };
    if let Err(publish_error) = publisher
        .publish(
            event_name,
            json!({
                "batch_id": batch_id,
                "total": summary.total,
                "completed": summary.completed,
                "failed": summary.failed,
                "skipped": summary.skipped,
                "elapsed_ms": summary.elapsed.as_millis() as u64,
            }),
        )
        .await
    {
        warn!(%batch_id, %publish_error, "Failed to publish batch summary event");
    }

    controls.remove(&batch_id);
    info!(
        %batch_id,
        total = summary.total,
        completed = summary.completed,
        failed = summary.failed,
        skipped = summary.skipped,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        cancelled,
        "Batch finished"
    );
    summary
}

async fn worker_loop(shared: Arc<BatchShared>, worker_index: usize) {
    let mut control = shared.control.clone();

    loop {
        // Control is observed at item boundaries only; a pause or cancel
        // never interrupts an in-flight item.
        loop {
            let state = *control.borrow();
            match state {
                BatchControl::Running => break,
                BatchControl::Cancelled => return,
                BatchControl::Paused => {
                    if control.changed().await.is_err() {
                        return;
                    }
                }
            }
        }

        let next = shared.queue.lock().pop_front();
        let Some(item_id) = next else {
            return;
        };

        let result = shared
            .processor
            .process_item(item_id, shared.respect_user_intent)
            .await;

        let snapshot = {
            let mut counters = shared.counters.lock();
            match &result {
                Ok(report) => match report.outcome {
                    ItemOutcome::Completed => counters.completed += 1,
                    ItemOutcome::Failed => counters.failed += 1,
                    ItemOutcome::Skipped => counters.skipped += 1,
                },
                Err(_) => counters.failed += 1,
            }
            counters.progress(shared.batch_id, shared.total)
        };

        if let Err(error) = &result {
            warn!(
                batch_id = %shared.batch_id,
                item_id = %item_id,
                worker = worker_index,
                %error,
                "Item failed before settling"
            );
        }

        if shared.progress_tx.try_send(snapshot).is_err() {
            debug!(
                batch_id = %shared.batch_id,
                "Progress consumer not keeping up, snapshot dropped"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = BatchOptions::default();
        assert_eq!(options.concurrency, DEFAULT_CONCURRENCY);
        assert!(options.respect_user_intent);
    }

    #[test]
    fn test_progress_percentage_counts_all_settled_items() {
        let counters = Counters {
            completed: 2,
            failed: 1,
            skipped: 1,
        };
        let progress = counters.progress(Uuid::new_v4(), 8);
        assert_eq!(progress.percentage, 50.0);
    }

    #[test]
    fn test_empty_batch_reports_complete() {
        let counters = Counters::default();
        let progress = counters.progress(Uuid::new_v4(), 0);
        assert_eq!(progress.percentage, 100.0);
    }
}
