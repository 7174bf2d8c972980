//! "Play this exact named title" strategy
//!
//! Precision-sensitive: the user named a specific title, so an empty
//! result set means "not found", never a loose substitute. Query
//! variants only loosen the *spelling* of the search (subtitle and
//! article stripping), not its meaning.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{
    dedup_descriptors, title_variants, DecisionStrategy, Intent, Outcome, RunServices,
    MAX_ORACLE_CANDIDATES, MAX_SELECTION_OPTIONS,
};
use crate::coordinator::context::ExecutionContext;
use crate::errors::RunError;
use crate::oracle::Selection;
use crate::search::aggregate::AggregatedResults;
use crate::search::SearchDescriptor;

/// How many near-miss names a `NotFound` outcome carries.
const MAX_SUGGESTIONS: usize = 3;

pub struct LaunchTitleStrategy;

#[async_trait]
impl DecisionStrategy for LaunchTitleStrategy {
    fn intent(&self) -> Intent {
        Intent::LaunchTitle
    }

    fn build_query_descriptors(
        &self,
        _ctx: &ExecutionContext,
        target: &str,
        system: Option<&str>,
    ) -> Vec<SearchDescriptor> {
        let descriptors = title_variants(target)
            .into_iter()
            .map(|keyword| match system {
                Some(system) => SearchDescriptor::scoped(keyword, system),
                None => SearchDescriptor::global(keyword),
            })
            .collect();
        dedup_descriptors(descriptors)
    }

    /// An exact name match ends the search: the looser spelling
    /// variants cannot improve on it.
    fn is_sufficient(
        &self,
        _ctx: &ExecutionContext,
        results: &AggregatedResults,
        target: &str,
    ) -> bool {
        results.get(target).is_some()
    }

    async fn interpret(
        &self,
        ctx: &ExecutionContext,
        results: &AggregatedResults,
        target: &str,
        _system: Option<&str>,
        services: &RunServices,
    ) -> Result<Outcome, RunError> {
        if results.is_empty() {
            return Ok(Outcome::NotFound {
                searched_for: target.to_string(),
                suggestions: Vec::new(),
            });
        }

        // An exact name match needs no oracle.
        if let Some(candidate) = results.get(target) {
            debug!(name = %candidate.name, "exact name match");
            return Ok(Outcome::LaunchExact {
                name: candidate.name.clone(),
                location: candidate.location.clone(),
                reason: None,
            });
        }

        let shortlist: Vec<_> = results
            .candidates()
            .iter()
            .take(MAX_ORACLE_CANDIDATES)
            .cloned()
            .collect();

        match services.oracle.select_best(&shortlist, target, ctx).await {
            Ok(Selection::Chosen { candidate, reason }) => Ok(Outcome::LaunchExact {
                name: candidate.name,
                location: candidate.location,
                reason: Some(reason),
            }),
            Ok(Selection::NoneSuitable { reason }) => {
                debug!(reason, "oracle found no suitable match");
                Ok(not_found_or_selection(results, target, ctx))
            }
            Err(e) => {
                warn!("selection oracle failed: {}", e);
                Ok(not_found_or_selection(results, target, ctx))
            }
        }
    }
}

/// Without an oracle verdict, a short candidate list is worth handing
/// back for external selection; a long one degrades to near-miss
/// suggestions.
fn not_found_or_selection(
    results: &AggregatedResults,
    target: &str,
    ctx: &ExecutionContext,
) -> Outcome {
    if results.len() <= MAX_SELECTION_OPTIONS {
        Outcome::NeedsExternalSelection {
            candidates: results.candidates().to_vec(),
            searched_for: target.to_string(),
            utterance: ctx.utterance().to_string(),
        }
    } else {
        Outcome::NotFound {
            searched_for: target.to_string(),
            suggestions: results
                .names()
                .into_iter()
                .take(MAX_SUGGESTIONS)
                .map(str::to_string)
                .collect(),
        }
    }
}
