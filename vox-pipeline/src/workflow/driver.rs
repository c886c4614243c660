//! Bounded per-clip worker pool
//!
//! Both stages hand a list of independent work items and a synchronous
//! worker function to [`WorkerPool::run`]. Each item runs on the blocking
//! thread pool; at most `workers` items are in flight at once. One item's
//! failure, panic or timeout is recorded and never affects the others.
//!
//! Cancellation is cooperative: items not yet started are skipped, and an
//! item still running when the token fires is abandoned (its result is
//! discarded and it counts as skipped).
//!
//! A blocking thread cannot be interrupted. When an item times out or is
//! abandoned, its slot is released while the thread runs on in the
//! background, so `workers` bounds the items being awaited, not the threads
//! still busy. Hung clips can therefore hold extra blocking threads until
//! they return; tokio caps the blocking pool as a whole.

use crate::error::{PipelineError, PipelineResult};
use crate::extractors::panic_message;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vox_common::events::{EventBus, PipelineEvent, Stage};

/// One item that did not produce a result
#[derive(Debug)]
pub struct ItemFailure {
    /// Item label (clip path)
    pub item: String,
    pub error: PipelineError,
}

/// Results and counts of one [`WorkerPool::run`] call
#[derive(Debug)]
pub struct BatchOutcome<T> {
    /// Successful results, in completion order
    pub results: Vec<T>,
    /// Items submitted
    pub total: usize,
    /// Items that ran to completion (`succeeded + failed`)
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Items not run, or abandoned, because the run was cancelled
    pub skipped: usize,
    pub failures: Vec<ItemFailure>,
}

impl<T> BatchOutcome<T> {
    fn empty(total: usize) -> Self {
        Self {
            results: Vec::new(),
            total,
            attempted: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            failures: Vec::new(),
        }
    }
}

enum ItemOutcome<T> {
    Done(T),
    Failed(ItemFailure),
    Skipped,
}

/// Bounded pool dispatching synchronous work items
#[derive(Clone)]
pub struct WorkerPool {
    workers: usize,
    item_timeout: Option<Duration>,
    cancel: CancellationToken,
    events: Option<EventBus>,
}

impl WorkerPool {
    /// Pool with `workers` concurrent items (at least 1)
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            item_timeout: None,
            cancel: CancellationToken::new(),
            events: None,
        }
    }

    /// Fail items that run longer than `timeout`
    pub fn with_item_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.item_timeout = timeout;
        self
    }

    /// Share an existing cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Publish progress on `events`
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn emit(&self, event: PipelineEvent) {
        if let Some(bus) = &self.events {
            bus.emit_lossy(event);
        }
    }

    /// Run `worker` over every item
    ///
    /// `label` names an item in logs, events and failure records.
    pub async fn run<I, T, L, F>(
        &self,
        stage: Stage,
        language: &str,
        items: Vec<I>,
        label: L,
        worker: F,
    ) -> BatchOutcome<T>
    where
        I: Send + 'static,
        T: Send + 'static,
        L: Fn(&I) -> String,
        F: Fn(I) -> PipelineResult<T> + Send + Sync + 'static,
    {
        let total = items.len();
        let worker = Arc::new(worker);
        let completed = Arc::new(AtomicUsize::new(0));

        self.emit(PipelineEvent::RunStarted {
            stage,
            language: language.to_string(),
            total,
            timestamp: chrono::Utc::now(),
        });
        info!(?stage, language, total, workers = self.workers, "Dispatching work items");

        let outcomes: Vec<ItemOutcome<T>> = stream::iter(items)
            .map(|item| {
                let name = label(&item);
                let worker = Arc::clone(&worker);
                let completed = Arc::clone(&completed);
                let cancel = self.cancel.clone();
                let timeout = self.item_timeout;
                let pool = self.clone();
                let language = language.to_string();

                async move {
                    if cancel.is_cancelled() {
                        return ItemOutcome::Skipped;
                    }

                    let handle = tokio::task::spawn_blocking(move || worker(item));
                    let result = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            debug!(language = %language, item = %name, "Abandoned in-flight item on cancellation");
                            return ItemOutcome::Skipped;
                        }
                        result = join_within(handle, timeout) => result,
                    };

                    let current = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    pool.emit(PipelineEvent::ItemCompleted {
                        stage,
                        language: language.clone(),
                        completed: current,
                        total,
                        item: name.clone(),
                        success: result.is_ok(),
                    });
                    if current % 10 == 0 || current == total {
                        info!(
                            language = %language,
                            progress = format!("{}/{}", current, total),
                            "Pipeline progress update"
                        );
                    }

                    match result {
                        Ok(value) => ItemOutcome::Done(value),
                        Err(error) => {
                            warn!(language = %language, item = %name, error = %error, "Item failed");
                            ItemOutcome::Failed(ItemFailure { item: name, error })
                        }
                    }
                }
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let mut outcome = BatchOutcome::empty(total);
        for item in outcomes {
            match item {
                ItemOutcome::Done(value) => {
                    outcome.succeeded += 1;
                    outcome.results.push(value);
                }
                ItemOutcome::Failed(failure) => {
                    outcome.failed += 1;
                    outcome.failures.push(failure);
                }
                ItemOutcome::Skipped => outcome.skipped += 1,
            }
        }
        outcome.attempted = outcome.succeeded + outcome.failed;

        if outcome.skipped > 0 {
            info!(
                language,
                skipped = outcome.skipped,
                "Run cancelled before all items finished"
            );
        }
        outcome
    }
}

/// Await a blocking task, bounded by an optional timeout
async fn join_within<T>(handle: JoinHandle<PipelineResult<T>>, limit: Option<Duration>) -> PipelineResult<T> {
    let joined = match limit {
        Some(limit) => match tokio::time::timeout(limit, handle).await {
            Ok(joined) => joined,
            Err(_) => return Err(PipelineError::TimedOut(limit)),
        },
        None => handle.await,
    };

    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(PipelineError::Worker(panic_message(e.into_panic().as_ref()))),
        Err(e) => Err(PipelineError::Worker(e.to_string())),
    }
}

/// Cancel `token` once `deadline` elapses
///
/// The returned task ends early if the token is cancelled by someone else.
pub fn arm_deadline(token: CancellationToken, deadline: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(deadline) => {
                warn!(deadline_secs = deadline.as_secs_f64(), "Run deadline reached, cancelling");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}
