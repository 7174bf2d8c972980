//! "Pick me something" strategy
//!
//! Recall-sensitive: the user gave a loose criterion, not a name, so an
//! empty first pass is not the end — this is the one strategy allowed
//! to run the unscoped fallback search before giving up. Items the user
//! already declined are filtered out before the oracle ever sees the
//! shortlist.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{
    dedup_descriptors, DecisionStrategy, Intent, Outcome, RunServices, MAX_ORACLE_CANDIDATES,
    MAX_SELECTION_OPTIONS,
};
use crate::coordinator::context::ExecutionContext;
use crate::errors::RunError;
use crate::oracle::Selection;
use crate::search::aggregate::AggregatedResults;
use crate::search::SearchDescriptor;
use protocol::Candidate;

/// Filler words stripped from loose criteria before searching.
const FILLER_WORDS: &[&str] = &[
    "a", "an", "the", "some", "game", "games", "something", "good", "fun", "nice", "cool",
];

pub struct RecommendStrategy;

impl RecommendStrategy {
    /// Criterion with filler words removed ("a good racing game" →
    /// "racing"). Empty if nothing substantive remains.
    fn trimmed_criterion(target: &str) -> String {
        target
            .split_whitespace()
            .filter(|word| {
                let lowered = word.to_lowercase();
                !FILLER_WORDS.contains(&lowered.as_str())
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn candidates_minus_rejections(
        ctx: &ExecutionContext,
        results: &AggregatedResults,
    ) -> Vec<Candidate> {
        results
            .candidates()
            .iter()
            .filter(|c| !ctx.is_rejected(&c.name))
            .take(MAX_ORACLE_CANDIDATES)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl DecisionStrategy for RecommendStrategy {
    fn intent(&self) -> Intent {
        Intent::Recommend
    }

    fn build_query_descriptors(
        &self,
        ctx: &ExecutionContext,
        target: &str,
        system: Option<&str>,
    ) -> Vec<SearchDescriptor> {
        let trimmed = Self::trimmed_criterion(target);

        let mut descriptors = Vec::new();
        if !trimmed.is_empty() {
            descriptors.push(match system {
                Some(system) => SearchDescriptor::scoped(&trimmed, system),
                None => SearchDescriptor::global(&trimmed),
            });
            // A scoped criterion also gets one global pass: a loose ask
            // should not die on the system filter alone. Unscoped asks
            // spend that slot on the verbatim wording instead.
            if system.is_some() {
                descriptors.push(SearchDescriptor::global(&trimmed));
            } else if trimmed != target.trim() {
                descriptors.push(SearchDescriptor::global(target.trim()));
            }
        }
        // Criterion was entirely filler ("something good"): search the
        // previous system's catalog broadly via the last target.
        if descriptors.is_empty() {
            if let Some(previous) = ctx.previous_target() {
                descriptors.push(SearchDescriptor::global(previous));
            }
        }

        dedup_descriptors(descriptors)
    }

    async fn interpret(
        &self,
        ctx: &ExecutionContext,
        results: &AggregatedResults,
        target: &str,
        _system: Option<&str>,
        services: &RunServices,
    ) -> Result<Outcome, RunError> {
        let mut merged = results.clone();

        // Last resort before "not found": one unscoped wildcard pass
        // with the longer fallback timeout.
        if merged.is_empty() {
            debug!(target, "empty first pass, trying fallback search");
            let keyword = Self::trimmed_criterion(target);
            if let Some(reply) = services.executor.run_fallback(&keyword, &services.cancel).await? {
                merged.merge_reply(&reply);
            }
        }

        let shortlist = Self::candidates_minus_rejections(ctx, &merged);
        if shortlist.is_empty() {
            return Ok(Outcome::NotFound {
                searched_for: target.to_string(),
                suggestions: Vec::new(),
            });
        }

        match services.oracle.select_best(&shortlist, target, ctx).await {
            Ok(Selection::Chosen { candidate, reason }) => Ok(Outcome::LaunchExact {
                name: candidate.name,
                location: candidate.location,
                reason: Some(reason),
            }),
            Ok(Selection::NoneSuitable { reason }) => {
                debug!(reason, "oracle declined to pick, offering shortlist");
                Ok(Outcome::NeedsExternalSelection {
                    candidates: shortlist.into_iter().take(MAX_SELECTION_OPTIONS).collect(),
                    searched_for: target.to_string(),
                    utterance: ctx.utterance().to_string(),
                })
            }
            Err(e) => {
                warn!("selection oracle failed: {}", e);
                Ok(Outcome::NotFound {
                    searched_for: target.to_string(),
                    suggestions: Vec::new(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trimmed_criterion_strips_filler() {
        assert_eq!(RecommendStrategy::trimmed_criterion("a good racing game"), "racing");
        assert_eq!(RecommendStrategy::trimmed_criterion("something fun"), "");
    }

    #[test]
    fn test_scoped_criterion_also_searches_globally() {
        let ctx = ExecutionContext::new("a racing game on snes", 4);
        let descriptors =
            RecommendStrategy.build_query_descriptors(&ctx, "racing game", Some("SNES"));

        assert_eq!(descriptors.len(), 2);
        assert!(descriptors[0].is_scoped());
        assert!(!descriptors[1].is_scoped());
        assert_eq!(descriptors[0].keyword, "racing");
    }

    #[test]
    fn test_pure_filler_criterion_uses_previous_target() {
        let ctx = ExecutionContext::new("something good", 4)
            .with_previous(Some("platformer".to_string()), None);
        let descriptors = RecommendStrategy.build_query_descriptors(&ctx, "something good", None);
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].keyword, "platformer");
    }
}
