//! Decision oracle abstraction
//!
//! The oracle is the external natural-language service this engine
//! leans on for the two judgements it does not make itself: classifying
//! an utterance into an intent, and picking the best candidate from an
//! aggregated result set. Both calls are plain request/response and may
//! fail or time out; failures surface as `OracleError` and are
//! converted at the call site into `NotFound`-shaped outcomes rather
//! than crashing the run.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::coordinator::context::ExecutionContext;
use protocol::Candidate;

pub mod openai;

/// Result type for oracle operations
pub type Result<T> = std::result::Result<T, OracleError>;

/// Errors that can occur during oracle calls
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("Oracle unavailable: {0}")]
    Unavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Structured answer to "what does the user want?"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Intent label (see `strategy::Intent::from_label`)
    pub intent: String,

    /// Explicit target the user named, if any
    #[serde(default)]
    pub target: Option<String>,

    /// System the user named or implied, if any
    #[serde(default)]
    pub system: Option<String>,
}

/// Structured answer to "which candidate fits best?"
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// A candidate was chosen
    Chosen {
        candidate: Candidate,
        reason: String,
    },
    /// Nothing in the set fits
    NoneSuitable { reason: String },
}

/// External classification/selection service.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Classify an utterance into an intent, with any explicit target
    /// and system the user named.
    async fn classify(&self, utterance: &str, ctx: &ExecutionContext) -> Result<Classification>;

    /// Pick the candidate best matching `target` from `candidates`,
    /// honoring the context's rejection list.
    async fn select_best(
        &self,
        candidates: &[Candidate],
        target: &str,
        ctx: &ExecutionContext,
    ) -> Result<Selection>;
}
