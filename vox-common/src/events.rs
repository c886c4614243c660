//! Pipeline progress events
//!
//! Provides the event definitions and EventBus used to observe long runs.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Which stage emitted an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Silence trimming and gender partitioning of clips
    Preprocess,
    /// Acoustic feature extraction
    Extract,
}

/// Pipeline event types
///
/// Events are broadcast via EventBus and serialize as tagged JSON objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// A language run has started dispatching work
    RunStarted {
        stage: Stage,
        language: String,
        /// Number of work items that will be dispatched
        total: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One work item finished (successfully or not)
    ItemCompleted {
        stage: Stage,
        language: String,
        /// Items finished so far, including this one
        completed: usize,
        total: usize,
        /// Clip path relative to the language's clips directory
        item: String,
        success: bool,
    },

    /// A language run has finished and its outputs are written
    LanguageCompleted {
        stage: Stage,
        language: String,
        attempted: usize,
        succeeded: usize,
        failed: usize,
        elapsed_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A language was skipped (e.g. metadata table missing)
    LanguageSkipped {
        stage: Stage,
        language: String,
        reason: String,
    },
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block workers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use vox_common::events::{EventBus, PipelineEvent, Stage};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(PipelineEvent::LanguageSkipped {
///     stage: Stage::Extract,
///     language: "eo".to_string(),
///     reason: "validated.tsv missing".to_string(),
/// });
///
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered before the oldest are
    /// dropped for lagging subscribers.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PipelineEvent,
    ) -> Result<usize, broadcast::error::SendError<PipelineEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
