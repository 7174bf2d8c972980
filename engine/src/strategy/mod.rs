//! Decision strategies
//!
//! One strategy per user-intent category. A strategy knows how to turn
//! the user's intent into concrete search descriptors, how to read the
//! aggregated results against that intent, and what facts the external
//! phrasing layer needs to describe the outcome. The engine itself
//! never generates prose.
//!
//! Strategies split along a precision/recall line: precision-sensitive
//! intents (launch a named title, substitute the current title) report
//! `NotFound` the moment results run dry; the recall-sensitive
//! recommendation intent first runs the unscoped fallback search as a
//! deliberate last resort.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::coordinator::context::ExecutionContext;
use crate::coordinator::CancelFlag;
use crate::errors::RunError;
use crate::oracle::Oracle;
use crate::search::aggregate::AggregatedResults;
use crate::search::{SearchDescriptor, SearchExecutor};
use protocol::Candidate;

pub mod alternative;
pub mod exact;
pub mod recommend;

pub use alternative::FindAlternativeStrategy;
pub use exact::LaunchTitleStrategy;
pub use recommend::RecommendStrategy;

/// Most candidate names offered to the selection oracle in one call.
pub(crate) const MAX_ORACLE_CANDIDATES: usize = 12;

/// Most candidates handed back for external selection.
pub(crate) const MAX_SELECTION_OPTIONS: usize = 5;

/// Closed set of user-intent categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// "Play <this exact named title>"
    LaunchTitle,
    /// "Find me something like what I'm playing, on <other system>"
    FindAlternative,
    /// "Pick me something <loose criterion>"
    Recommend,
}

impl Intent {
    /// Parse the classification oracle's intent label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "launch_title" | "launch" => Some(Intent::LaunchTitle),
            "find_alternative" | "alternative" => Some(Intent::FindAlternative),
            "recommend" | "recommendation" => Some(Intent::Recommend),
            _ => None,
        }
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            Intent::LaunchTitle => "launch_title",
            Intent::FindAlternative => "find_alternative",
            Intent::Recommend => "recommend",
        }
    }
}

/// Terminal decision of one orchestration run. Exactly one is produced
/// per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Launch the title the user asked for
    LaunchExact {
        name: String,
        location: String,
        reason: Option<String>,
    },
    /// Launch a substitute instead of the asked-for title
    LaunchAlternative {
        name: String,
        location: String,
        reason: String,
    },
    /// Nothing suitable was found
    NotFound {
        searched_for: String,
        suggestions: Vec<String>,
    },
    /// The engine cannot pick alone; hand the shortlist back
    NeedsExternalSelection {
        candidates: Vec<Candidate>,
        searched_for: String,
        utterance: String,
    },
}

/// Plain data record handed to the external response-generation layer.
/// Facts only; the phrasing layer turns this into prose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseBrief {
    Launched {
        name: String,
        alternative: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    NotFound {
        searched_for: String,
        suggestions: Vec<String>,
    },
    ChooseFrom {
        options: Vec<String>,
        searched_for: String,
        utterance: String,
    },
}

/// Shared collaborators a strategy may use while interpreting.
pub struct RunServices {
    pub oracle: Arc<dyn Oracle>,
    pub executor: SearchExecutor,
    pub cancel: CancelFlag,
}

/// Per-intent decision policy.
#[async_trait]
pub trait DecisionStrategy: Send + Sync {
    /// The intent this strategy serves
    fn intent(&self) -> Intent;

    /// Turn the resolved target plus prior context into up to
    /// [`crate::search::MAX_STEPS`] descriptors, without duplicates.
    fn build_query_descriptors(
        &self,
        ctx: &ExecutionContext,
        target: &str,
        system: Option<&str>,
    ) -> Vec<SearchDescriptor>;

    /// Early-termination policy, consulted between search steps with
    /// the results collected so far. Returning true stops further
    /// dispatches; the executor never decides this itself.
    /// Precision strategies stop once the named title is in hand;
    /// recall strategies keep the default and take every pass.
    fn is_sufficient(
        &self,
        _ctx: &ExecutionContext,
        _results: &AggregatedResults,
        _target: &str,
    ) -> bool {
        false
    }

    /// Read the aggregated results against the user's intent and
    /// produce exactly one outcome. May consult the selection oracle
    /// and (recall-sensitive strategies only) run the fallback search.
    async fn interpret(
        &self,
        ctx: &ExecutionContext,
        results: &AggregatedResults,
        target: &str,
        system: Option<&str>,
        services: &RunServices,
    ) -> Result<Outcome, RunError>;

    /// Structured handoff for the external phrasing layer.
    fn describe_outcome(&self, outcome: &Outcome, _ctx: &ExecutionContext) -> ResponseBrief {
        brief_for(outcome)
    }
}

/// Default outcome-to-brief mapping shared by all strategies.
pub fn brief_for(outcome: &Outcome) -> ResponseBrief {
    match outcome {
        Outcome::LaunchExact { name, reason, .. } => ResponseBrief::Launched {
            name: name.clone(),
            alternative: false,
            reason: reason.clone(),
        },
        Outcome::LaunchAlternative { name, reason, .. } => ResponseBrief::Launched {
            name: name.clone(),
            alternative: true,
            reason: Some(reason.clone()),
        },
        Outcome::NotFound {
            searched_for,
            suggestions,
        } => ResponseBrief::NotFound {
            searched_for: searched_for.clone(),
            suggestions: suggestions.clone(),
        },
        Outcome::NeedsExternalSelection {
            candidates,
            searched_for,
            utterance,
        } => ResponseBrief::ChooseFrom {
            options: candidates.iter().map(|c| c.name.clone()).collect(),
            searched_for: searched_for.clone(),
            utterance: utterance.clone(),
        },
    }
}

/// Drop duplicate descriptors (same keyword and system,
/// case-insensitive), keeping first occurrences.
pub(crate) fn dedup_descriptors(descriptors: Vec<SearchDescriptor>) -> Vec<SearchDescriptor> {
    let mut seen: Vec<(String, Option<String>)> = Vec::new();
    descriptors
        .into_iter()
        .filter(|d| {
            let key = (
                d.keyword.trim().to_lowercase(),
                d.system.as_ref().map(|s| s.to_lowercase()),
            );
            if key.0.is_empty() || seen.contains(&key) {
                false
            } else {
                seen.push(key);
                true
            }
        })
        .collect()
}

/// Shortened forms of a title worth searching when the verbatim form
/// misses: subtitle stripped ("Zelda: A Link to the Past" → "Zelda"),
/// then leading article stripped. Verbatim form first.
pub(crate) fn title_variants(target: &str) -> Vec<String> {
    let target = target.trim();
    let mut variants = vec![target.to_string()];

    if let Some((main, _)) = target.split_once(':') {
        variants.push(main.trim().to_string());
    }

    let lowered = target.to_lowercase();
    for article in ["the ", "a ", "an "] {
        if lowered.starts_with(article) {
            variants.push(target[article.len()..].trim().to_string());
            break;
        }
    }

    variants
}

/// Registry resolving an intent to its strategy, once per run.
pub struct StrategyRegistry {
    strategies: HashMap<Intent, Arc<dyn DecisionStrategy>>,
}

impl StrategyRegistry {
    /// Registry with the three built-in strategies
    pub fn builtin() -> Self {
        let mut strategies: HashMap<Intent, Arc<dyn DecisionStrategy>> = HashMap::new();
        strategies.insert(Intent::LaunchTitle, Arc::new(LaunchTitleStrategy));
        strategies.insert(Intent::FindAlternative, Arc::new(FindAlternativeStrategy));
        strategies.insert(Intent::Recommend, Arc::new(RecommendStrategy));
        Self { strategies }
    }

    /// Resolve the strategy for `intent`
    pub fn resolve(&self, intent: Intent) -> Arc<dyn DecisionStrategy> {
        Arc::clone(
            self.strategies
                .get(&intent)
                .unwrap_or_else(|| &self.strategies[&Intent::LaunchTitle]),
        )
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
