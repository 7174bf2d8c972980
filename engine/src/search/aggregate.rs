//! Result aggregation
//!
//! Merges the per-step replies of one batch into a single ordered
//! candidate set. Merge order is step order (not arrival order), name
//! collisions are first-occurrence-wins, and known non-game utility
//! entries are dropped by name-prefix match so the decision layer never
//! sees updaters or BIOS files as launch candidates.

use std::collections::HashSet;

use protocol::{Candidate, ReplyPayload};

/// Name prefixes of utility entries that are never launch candidates.
///
/// Matched case-insensitively against candidate names. `~` covers the
/// device's hidden/alternative-core naming convention.
const UTILITY_NAME_PREFIXES: &[&str] = &[
    "update",
    "downloader",
    "bios",
    "settings",
    "menu",
    "utility",
    "filters",
    "cheats",
    "~",
];

/// True if `name` looks like a non-game utility entry.
pub fn is_utility_entry(name: &str) -> bool {
    let lowered = name.trim_start().to_lowercase();
    UTILITY_NAME_PREFIXES
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
}

/// The merged, ordered, deduplicated candidate set of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatedResults {
    entries: Vec<Candidate>,
}

impl AggregatedResults {
    /// Merge per-step replies in the given (step) order.
    pub fn from_replies(replies: &[ReplyPayload]) -> Self {
        let mut results = Self::default();
        for reply in replies {
            results.merge_reply(reply);
        }
        results
    }

    /// Merge one more reply (used for the fallback search).
    pub fn merge_reply(&mut self, reply: &ReplyPayload) {
        let mut seen: HashSet<String> = self
            .entries
            .iter()
            .map(|c| c.name.to_lowercase())
            .collect();

        for candidate in &reply.candidates {
            if is_utility_entry(&candidate.name) {
                continue;
            }
            if seen.insert(candidate.name.to_lowercase()) {
                self.entries.push(candidate.clone());
            }
        }
    }

    /// Candidates in merge order
    pub fn candidates(&self) -> &[Candidate] {
        &self.entries
    }

    /// Case-insensitive lookup by exact name
    pub fn get(&self, name: &str) -> Option<&Candidate> {
        self.entries
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Candidate names in merge order
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
