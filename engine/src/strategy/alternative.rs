//! "Find this on a different system" strategy
//!
//! The user wants what they are playing (or last asked for), but on
//! another system — a port, remake, or equivalent. Precision-sensitive:
//! an empty result set on the requested system is a `NotFound`, not an
//! excuse to search the whole device.

use async_trait::async_trait;
use tracing::warn;

use super::{
    dedup_descriptors, title_variants, DecisionStrategy, Intent, Outcome, RunServices,
    MAX_ORACLE_CANDIDATES,
};
use crate::coordinator::context::ExecutionContext;
use crate::errors::RunError;
use crate::oracle::Selection;
use crate::search::aggregate::AggregatedResults;
use crate::search::SearchDescriptor;

pub struct FindAlternativeStrategy;

impl FindAlternativeStrategy {
    /// The title we are substituting for: explicit target, else the
    /// now-playing snapshot, else the previous run's target.
    fn source_title<'a>(ctx: &'a ExecutionContext, target: &'a str) -> &'a str {
        if !target.trim().is_empty() {
            return target;
        }
        if let Some(playing) = ctx.now_playing() {
            return &playing.name;
        }
        ctx.previous_target().unwrap_or(target)
    }
}

#[async_trait]
impl DecisionStrategy for FindAlternativeStrategy {
    fn intent(&self) -> Intent {
        Intent::FindAlternative
    }

    fn build_query_descriptors(
        &self,
        ctx: &ExecutionContext,
        target: &str,
        system: Option<&str>,
    ) -> Vec<SearchDescriptor> {
        let title = Self::source_title(ctx, target);
        let descriptors = title_variants(title)
            .into_iter()
            .map(|keyword| match system {
                Some(system) => SearchDescriptor::scoped(keyword, system),
                None => SearchDescriptor::global(keyword),
            })
            .collect();
        dedup_descriptors(descriptors)
    }

    /// The same title showing up on the requested system ends the
    /// search.
    fn is_sufficient(
        &self,
        ctx: &ExecutionContext,
        results: &AggregatedResults,
        target: &str,
    ) -> bool {
        results.get(Self::source_title(ctx, target)).is_some()
    }

    async fn interpret(
        &self,
        ctx: &ExecutionContext,
        results: &AggregatedResults,
        target: &str,
        system: Option<&str>,
        services: &RunServices,
    ) -> Result<Outcome, RunError> {
        let title = Self::source_title(ctx, target);

        if results.is_empty() {
            return Ok(Outcome::NotFound {
                searched_for: title.to_string(),
                suggestions: Vec::new(),
            });
        }

        // Same title available on the requested system: that *is* the
        // alternative the user asked for.
        if let Some(candidate) = results.get(title) {
            let reason = match system {
                Some(system) => format!("same title on {system}"),
                None => "same title on another system".to_string(),
            };
            return Ok(Outcome::LaunchAlternative {
                name: candidate.name.clone(),
                location: candidate.location.clone(),
                reason,
            });
        }

        let shortlist: Vec<_> = results
            .candidates()
            .iter()
            .filter(|c| !ctx.is_rejected(&c.name))
            .take(MAX_ORACLE_CANDIDATES)
            .cloned()
            .collect();

        match services.oracle.select_best(&shortlist, title, ctx).await {
            Ok(Selection::Chosen { candidate, reason }) => Ok(Outcome::LaunchAlternative {
                name: candidate.name,
                location: candidate.location,
                reason,
            }),
            Ok(Selection::NoneSuitable { .. }) => Ok(Outcome::NotFound {
                searched_for: title.to_string(),
                suggestions: results
                    .names()
                    .into_iter()
                    .take(3)
                    .map(str::to_string)
                    .collect(),
            }),
            Err(e) => {
                warn!("selection oracle failed: {}", e);
                Ok(Outcome::NotFound {
                    searched_for: title.to_string(),
                    suggestions: Vec::new(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::context::NowPlaying;

    #[test]
    fn test_falls_back_to_now_playing_title() {
        let ctx = ExecutionContext::new("got this on genesis?", 4).with_now_playing(Some(
            NowPlaying {
                name: "Street Fighter II".to_string(),
                system: "SNES".to_string(),
            },
        ));

        let descriptors =
            FindAlternativeStrategy.build_query_descriptors(&ctx, "", Some("Genesis"));
        assert_eq!(descriptors[0].keyword, "Street Fighter II");
        assert_eq!(descriptors[0].system.as_deref(), Some("Genesis"));
    }

    #[test]
    fn test_explicit_target_beats_snapshot() {
        let ctx = ExecutionContext::new("is sonic on snes?", 4).with_now_playing(Some(NowPlaying {
            name: "Street Fighter II".to_string(),
            system: "SNES".to_string(),
        }));

        let descriptors = FindAlternativeStrategy.build_query_descriptors(&ctx, "Sonic", Some("SNES"));
        assert_eq!(descriptors[0].keyword, "Sonic");
    }

    #[test]
    fn test_sufficient_when_source_title_found() {
        use protocol::{Candidate, ReplyPayload};

        let ctx = ExecutionContext::new("got this on genesis?", 4).with_now_playing(Some(
            NowPlaying {
                name: "Street Fighter II".to_string(),
                system: "SNES".to_string(),
            },
        ));
        let strategy = FindAlternativeStrategy;

        let other = AggregatedResults::from_replies(&[ReplyPayload::new(vec![
            Candidate::new("Fatal Fury", "Genesis/ff.md"),
        ])]);
        assert!(!strategy.is_sufficient(&ctx, &other, ""));

        let same = AggregatedResults::from_replies(&[ReplyPayload::new(vec![
            Candidate::new("Street Fighter II", "Genesis/sf2.md"),
        ])]);
        assert!(strategy.is_sufficient(&ctx, &same, ""));
    }
}
