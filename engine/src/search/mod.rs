//! Sequential search execution
//!
//! A search sequence is 1–3 descriptors issued **one at a time**, never
//! in parallel: the appliance handles fan-out poorly, and the decision
//! layer can often stop early once the first step returns enough. Each
//! step runs under its own timeout (the first step gets a longer
//! allowance for device cold start) and the whole sequence runs under
//! one cumulative guard deadline. When the guard elapses, no further
//! steps are dispatched — work already in flight is left to finish and
//! its replies are still collected.
//!
//! The executor returns whatever ordered partial results exist when the
//! sequence ends. An empty list is a valid, non-error result. Only
//! cancellation aborts the run without results.

use std::sync::Arc;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::batch::BatchTracker;
use crate::config::SearchTimingConfig;
use crate::coordinator::CancelFlag;
use crate::correlation::{CorrelationTable, Registration, WaitResult};
use crate::device::DeviceLink;
use crate::errors::RunError;
use protocol::{ReplyPayload, RequestId};

pub mod aggregate;

/// Maximum number of steps in one search sequence.
pub const MAX_STEPS: usize = 3;

/// One step in a search sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchDescriptor {
    /// Free-text keyword sent to the device
    pub keyword: String,

    /// Target-system filter; `None` means "search everywhere"
    pub system: Option<String>,
}

impl SearchDescriptor {
    /// Descriptor scoped to one system
    pub fn scoped(keyword: impl Into<String>, system: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            system: Some(system.into()),
        }
    }

    /// Descriptor searching everywhere
    pub fn global(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            system: None,
        }
    }

    /// True if this descriptor carries a system filter
    pub fn is_scoped(&self) -> bool {
        self.system.is_some()
    }
}

/// Issues search sequences against the device and collects correlated
/// replies through the CorrelationTable.
///
/// Cheap to clone; clones share the table, tracker, and link.
#[derive(Clone)]
pub struct SearchExecutor {
    table: CorrelationTable,
    tracker: BatchTracker,
    link: Arc<dyn DeviceLink>,
    timing: SearchTimingConfig,
}

impl SearchExecutor {
    /// Create an executor over the shared table, tracker, and link
    pub fn new(
        table: CorrelationTable,
        tracker: BatchTracker,
        link: Arc<dyn DeviceLink>,
        timing: SearchTimingConfig,
    ) -> Self {
        Self {
            table,
            tracker,
            link,
            timing,
        }
    }

    /// Run one search sequence.
    ///
    /// Returns the ordered partial-or-complete reply list, one entry
    /// per answered step, in descriptor order regardless of reply
    /// arrival order. On cancellation the batch is invalidated, the
    /// table cleared, and `RunError::Cancelled` returned with no
    /// partial results.
    ///
    /// `sufficient` is the caller's early-termination policy: it sees
    /// the replies collected so far between steps, and returning true
    /// stops further dispatches. The executor itself has no opinion on
    /// when results are enough.
    pub async fn run(
        &self,
        descriptors: &[SearchDescriptor],
        label: &str,
        cancel: &CancelFlag,
        sufficient: impl Fn(&[ReplyPayload]) -> bool,
    ) -> Result<Vec<ReplyPayload>, RunError> {
        if descriptors.len() > MAX_STEPS {
            warn!(
                count = descriptors.len(),
                "search sequence truncated to {} steps", MAX_STEPS
            );
        }
        let descriptors = &descriptors[..descriptors.len().min(MAX_STEPS)];

        let ids: Vec<RequestId> = descriptors.iter().map(|_| RequestId::generate()).collect();
        let batch = self.tracker.begin(&ids, label).await;

        // Global fan-out is slower on the device side, so an unscoped
        // step anywhere in the sequence earns the longer guard.
        let system_scoped = descriptors.iter().all(SearchDescriptor::is_scoped);
        let guard = self.timing.guard_deadline(system_scoped);
        let started = Instant::now();

        debug!(%batch, steps = descriptors.len(), system_scoped, ?guard, "search sequence started");

        for (step, (descriptor, id)) in descriptors.iter().zip(&ids).enumerate() {
            self.run_step(step, descriptor, id).await?;

            if cancel.is_cancelled() {
                info!(%batch, step, "search sequence cancelled");
                self.tracker.invalidate().await;
                self.table.clear(&ids).await;
                return Err(RunError::Cancelled);
            }

            if step + 1 < descriptors.len() {
                let so_far = self.table.drain(&ids[..=step]).await;
                if sufficient(&so_far) {
                    debug!(%batch, step, "results sufficient, skipping remaining steps");
                    break;
                }
                if started.elapsed() >= guard {
                    // Stop issuing new steps; replies already in flight
                    // are still collected below.
                    warn!(%batch, step, "guard deadline elapsed, skipping remaining steps");
                    break;
                }
            }
        }

        self.tracker.mark_completed().await;
        let results = self.table.drain(&ids).await;
        self.table.clear(&ids).await;

        info!(
            %batch,
            answered = results.len(),
            of = descriptors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "search sequence finished"
        );
        Ok(results)
    }

    /// Dispatch one step and wait for its reply or per-step timeout.
    async fn run_step(
        &self,
        step: usize,
        descriptor: &SearchDescriptor,
        id: &RequestId,
    ) -> Result<(), RunError> {
        let rx = match self.table.register(id).await {
            Registration::Fulfilled(_) => return Ok(()),
            Registration::Awaiting(rx) => rx,
        };

        self.link
            .dispatch_search(id, &descriptor.keyword, descriptor.system.as_deref())
            .await?;

        let allowance = self.timing.step_timeout(step == 0);
        match timeout(allowance, rx).await {
            Ok(Ok(WaitResult::Reply(payload))) => {
                debug!(%id, step, candidates = payload.candidates.len(), "step answered");
            }
            Ok(Ok(WaitResult::TimedOut)) | Ok(Err(_)) => {
                debug!(%id, step, "step expired before reply");
            }
            Err(_) => {
                self.table.expire(id).await;
                debug!(%id, step, ?allowance, "step timed out");
            }
        }
        Ok(())
    }

    /// Last-resort unscoped fallback search.
    ///
    /// One wildcard request with the longer fallback timeout, correlated
    /// through the table but deliberately outside batch tracking: it is
    /// not a retry of a batch step, and a new batch must not invalidate
    /// it mid-wait.
    pub async fn run_fallback(
        &self,
        keyword: &str,
        cancel: &CancelFlag,
    ) -> Result<Option<ReplyPayload>, RunError> {
        // A cancel raised during interpretation must not issue a fresh
        // device search.
        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }

        let id = RequestId::generate();
        info!(%id, keyword, "running unscoped fallback search");

        let rx = match self.table.register(&id).await {
            Registration::Fulfilled(payload) => {
                self.table.clear(std::slice::from_ref(&id)).await;
                return Ok(Some(payload));
            }
            Registration::Awaiting(rx) => rx,
        };

        self.link.dispatch_search(&id, keyword, None).await?;

        let result = match timeout(self.timing.fallback_timeout(), rx).await {
            Ok(Ok(WaitResult::Reply(payload))) => Some(payload),
            Ok(Ok(WaitResult::TimedOut)) | Ok(Err(_)) => None,
            Err(_) => {
                self.table.expire(&id).await;
                None
            }
        };
        self.table.clear(std::slice::from_ref(&id)).await;

        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        Ok(result)
    }
}
