//! Batch (generation) tracking for multi-step searches
//!
//! One orchestration run issues its search commands as a single batch.
//! The tracker answers the only question the rest of the system needs
//! about a reply: "is this id still relevant?" — without per-site
//! timestamp arithmetic. At most one batch is active at a time;
//! beginning a new batch abandons the previous one. Completing a batch
//! stops future membership checks while leaving already-buffered
//! replies in the CorrelationTable untouched, so the window between
//! "stop waiting" and "finish reading buffered results" loses nothing.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::debug;

use protocol::RequestId;

/// Monotonic batch id, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchId(u64);

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "batch-{}", self.0)
    }
}

/// One logical multi-step search generation.
struct Batch {
    id: BatchId,
    ids: HashSet<RequestId>,
    started_at: Instant,
    completed: bool,
    label: String,
}

/// Tracks the single active batch of in-flight search ids.
///
/// Clone is cheap; clones share the same tracker.
#[derive(Clone, Default)]
pub struct BatchTracker {
    active: Arc<Mutex<Option<Batch>>>,
    next_id: Arc<AtomicU64>,
}

impl BatchTracker {
    /// Create a tracker with no active batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new batch over `ids`, replacing any prior active batch.
    ///
    /// The label is used only for logging.
    pub async fn begin(&self, ids: &[RequestId], label: impl Into<String>) -> BatchId {
        let id = BatchId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let label = label.into();
        let mut active = self.active.lock().await;

        if let Some(old) = active.take() {
            debug!(old = %old.id, new = %id, "superseding active batch");
        }

        *active = Some(Batch {
            id,
            ids: ids.iter().cloned().collect(),
            started_at: Instant::now(),
            completed: false,
            label,
        });
        id
    }

    /// True only if an active, not-yet-completed batch contains `id`.
    ///
    /// Lazily clears a batch that was marked completed, so completion
    /// flips membership to false for every id on the next check.
    pub async fn is_member(&self, id: &RequestId) -> bool {
        let mut active = self.active.lock().await;

        if active.as_ref().is_some_and(|b| b.completed) {
            if let Some(done) = active.take() {
                debug!(
                    batch = %done.id,
                    label = %done.label,
                    elapsed_ms = done.started_at.elapsed().as_millis() as u64,
                    "clearing completed batch"
                );
            }
            return false;
        }

        active.as_ref().is_some_and(|b| b.ids.contains(id))
    }

    /// Mark the active batch completed.
    ///
    /// Must run before results are consumed: membership checks start
    /// failing, but replies already buffered in the CorrelationTable
    /// remain readable by drain.
    pub async fn mark_completed(&self) {
        let mut active = self.active.lock().await;
        if let Some(batch) = active.as_mut() {
            batch.completed = true;
        }
    }

    /// Drop the active batch outright (new unrelated run, or cancel).
    pub async fn invalidate(&self) {
        let mut active = self.active.lock().await;
        if let Some(batch) = active.take() {
            debug!(batch = %batch.id, label = %batch.label, "batch invalidated");
        }
    }

    /// True if some batch is active and not yet completed.
    pub async fn has_active(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|b| !b.completed)
    }
}
