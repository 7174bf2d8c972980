//! Orchestration coordinator
//!
//! Top-level driver of one run: classify the utterance (external
//! oracle), resolve the strategy and keyword set, run the sequential
//! search, interpret, dispatch the resulting device command, and hand
//! back the facts the phrasing layer needs. The coordinator owns the
//! single outstanding run and its cancellation flag.
//!
//! Cancellation has two mandatory checkpoints: right after
//! classification returns, and immediately before a device-affecting
//! command is handed to the transport. A command already in flight
//! cannot be un-sent; the guarantee is that nothing *new* is dispatched
//! once the flag is observed, and that a cancelled run reports
//! cancellation — not an error, not a timeout — with every further side
//! effect suppressed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::batch::BatchTracker;
use crate::device::DeviceLink;
use crate::errors::RunError;
use crate::oracle::Oracle;
use crate::search::aggregate::AggregatedResults;
use crate::search::SearchExecutor;
use crate::strategy::{brief_for, Intent, Outcome, ResponseBrief, RunServices, StrategyRegistry};

pub mod context;

use context::ExecutionContext;

/// Cooperative cancellation flag for the outstanding run.
///
/// Cheap to clone; clones share the flag. `cancel` is idempotent and
/// safe from any concurrent context.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the outstanding run.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Re-arm the flag at the start of a new run.
    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Phase of a run, for logging only. `Searching` and
/// `FallbackSearching` are the suspend points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunPhase {
    BuildingQuery,
    Searching,
    Interpreting,
    Dispatching,
    Reporting,
}

/// Everything a finished run hands back: the decision, the facts for
/// the phrasing layer, and what to remember for follow-ups.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: Outcome,
    pub brief: ResponseBrief,
    pub resolved_target: String,
    pub resolved_system: Option<String>,
}

/// Top-level run driver. One outstanding run at a time.
pub struct Coordinator {
    oracle: Arc<dyn Oracle>,
    executor: SearchExecutor,
    link: Arc<dyn DeviceLink>,
    tracker: BatchTracker,
    registry: StrategyRegistry,
    cancel: CancelFlag,
    run_lock: Mutex<()>,
}

impl Coordinator {
    pub fn new(
        oracle: Arc<dyn Oracle>,
        executor: SearchExecutor,
        link: Arc<dyn DeviceLink>,
        tracker: BatchTracker,
    ) -> Self {
        Self {
            oracle,
            executor,
            link,
            tracker,
            registry: StrategyRegistry::builtin(),
            cancel: CancelFlag::new(),
            run_lock: Mutex::new(()),
        }
    }

    /// Handle to the cancellation flag, for the UI/transport side.
    pub fn cancel_handle(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Request cancellation of the outstanding run. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Run one orchestration request to its single outcome.
    ///
    /// `Err(RunError::Cancelled)` means the user stopped the run: no
    /// outcome, no brief, no device command after the flag was seen.
    pub async fn run_request(&self, ctx: &ExecutionContext) -> Result<RunReport, RunError> {
        let _guard = self.run_lock.lock().await;
        self.cancel.reset();

        info!(utterance = ctx.utterance(), "run started");

        let classification = match self.oracle.classify(ctx.utterance(), ctx).await {
            Ok(classification) => classification,
            Err(e) => {
                // Oracle failure degrades to a coherent "not found"
                // response instead of crashing the run.
                warn!("classification oracle failed: {}", e);
                return Ok(self.not_found_report(ctx.utterance().to_string(), None, ctx));
            }
        };

        // Checkpoint 1: after classification, before any search or
        // command is started.
        self.checkpoint(ctx).await?;

        let Some(intent) = Intent::from_label(&classification.intent) else {
            warn!(label = %classification.intent, "oracle returned unknown intent label");
            return Ok(self.not_found_report(ctx.utterance().to_string(), None, ctx));
        };

        debug!(phase = ?RunPhase::BuildingQuery, intent = intent.as_label(), "intent resolved");
        let strategy = self.registry.resolve(intent);

        let resolved_target = classification
            .target
            .clone()
            .or_else(|| ctx.previous_target().map(str::to_string))
            .unwrap_or_else(|| ctx.utterance().to_string());
        let resolved_system = classification
            .system
            .clone()
            .or_else(|| ctx.previous_system().map(str::to_string));

        let descriptors =
            strategy.build_query_descriptors(ctx, &resolved_target, resolved_system.as_deref());
        if descriptors.is_empty() {
            debug!("strategy produced no descriptors");
            return Ok(self.not_found_report(resolved_target, resolved_system, ctx));
        }

        debug!(phase = ?RunPhase::Searching, steps = descriptors.len(), "search starting");
        let replies = self
            .executor
            .run(&descriptors, intent.as_label(), &self.cancel, |so_far| {
                strategy.is_sufficient(
                    ctx,
                    &AggregatedResults::from_replies(so_far),
                    &resolved_target,
                )
            })
            .await?;
        let results = AggregatedResults::from_replies(&replies);

        debug!(phase = ?RunPhase::Interpreting, candidates = results.len(), "interpreting results");
        let services = RunServices {
            oracle: Arc::clone(&self.oracle),
            executor: self.executor.clone(),
            cancel: self.cancel.clone(),
        };
        let outcome = strategy
            .interpret(ctx, &results, &resolved_target, resolved_system.as_deref(), &services)
            .await?;

        // Checkpoint 2: immediately before a device-affecting command
        // is handed to the transport.
        match &outcome {
            Outcome::LaunchExact { name, location, .. }
            | Outcome::LaunchAlternative { name, location, .. } => {
                self.checkpoint(ctx).await?;
                debug!(phase = ?RunPhase::Dispatching, name, "dispatching launch");
                self.link.launch(name, location).await?;
            }
            Outcome::NotFound { .. } | Outcome::NeedsExternalSelection { .. } => {}
        }

        debug!(phase = ?RunPhase::Reporting, "run finished");
        let brief = strategy.describe_outcome(&outcome, ctx);
        Ok(RunReport {
            outcome,
            brief,
            resolved_target,
            resolved_system,
        })
    }

    /// Observe the cancellation flag at a checkpoint. On cancellation:
    /// invalidate any active batch and terminate the run with the
    /// cancellation signal. (Table entries for the batch are cleared by
    /// the executor's own cancellation path; at checkpoint 1 none exist
    /// yet.)
    async fn checkpoint(&self, ctx: &ExecutionContext) -> Result<(), RunError> {
        if self.cancel.is_cancelled() {
            info!(utterance = ctx.utterance(), "run cancelled at checkpoint");
            self.tracker.invalidate().await;
            return Err(RunError::Cancelled);
        }
        Ok(())
    }

    fn not_found_report(
        &self,
        resolved_target: String,
        resolved_system: Option<String>,
        _ctx: &ExecutionContext,
    ) -> RunReport {
        let outcome = Outcome::NotFound {
            searched_for: resolved_target.clone(),
            suggestions: Vec::new(),
        };
        let brief = brief_for(&outcome);
        RunReport {
            outcome,
            brief,
            resolved_target,
            resolved_system,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_flag_is_idempotent() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());
        flag.cancel();
        flag.cancel();
        assert!(flag.is_cancelled());
        flag.reset();
        assert!(!flag.is_cancelled());
    }

    #[test]
    fn test_cancel_flag_clones_share_state() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        clone.cancel();
        assert!(flag.is_cancelled());
    }
}
