//! Per-run execution context
//!
//! Everything a run knows about the user is captured here once, at run
//! start, and stays immutable for the run's lifetime — in particular
//! the now-playing snapshot, so a concurrent state change on the device
//! can never race the decision logic mid-run. Follow-up runs get a
//! carried-forward copy rather than shared mutable state.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// Who said a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
}

/// One turn of recent conversation
#[derive(Debug, Clone)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// Point-in-time snapshot of what the user is currently doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub name: String,
    pub system: String,
}

/// Immutable context for one orchestration run.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    utterance: String,
    history: VecDeque<Turn>,
    history_window: usize,
    now_playing: Option<NowPlaying>,
    previous_target: Option<String>,
    previous_system: Option<String>,
    rejected: Vec<String>,
}

impl ExecutionContext {
    /// Start a fresh context for `utterance` with a bounded history
    /// window.
    pub fn new(utterance: impl Into<String>, history_window: usize) -> Self {
        Self {
            utterance: utterance.into(),
            history: VecDeque::new(),
            history_window: history_window.max(1),
            now_playing: None,
            previous_target: None,
            previous_system: None,
            rejected: Vec::new(),
        }
    }

    /// Attach the now-playing snapshot (taken once, at run start).
    pub fn with_now_playing(mut self, now_playing: Option<NowPlaying>) -> Self {
        self.now_playing = now_playing;
        self
    }

    /// Attach the previous run's resolved target and system.
    pub fn with_previous(mut self, target: Option<String>, system: Option<String>) -> Self {
        self.previous_target = target;
        self.previous_system = system;
        self
    }

    /// Record a conversation turn, evicting the oldest beyond the
    /// window.
    pub fn push_turn(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.history.push_back(Turn {
            speaker,
            text: text.into(),
            at: Utc::now(),
        });
        while self.history.len() > self.history_window {
            self.history.pop_front();
        }
    }

    /// Carry this context into a follow-up run.
    ///
    /// Keeps the history, rejection list, previous target/system, and
    /// the same now-playing snapshot — a continuation is still the same
    /// logical request.
    pub fn carry_forward(&self, new_utterance: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.utterance = new_utterance.into();
        next
    }

    /// Record an item the user declined, for follow-up runs.
    pub fn add_rejection(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.rejected.iter().any(|r| r.eq_ignore_ascii_case(&name)) {
            self.rejected.push(name);
        }
    }

    pub fn utterance(&self) -> &str {
        &self.utterance
    }

    pub fn history(&self) -> impl Iterator<Item = &Turn> {
        self.history.iter()
    }

    pub fn now_playing(&self) -> Option<&NowPlaying> {
        self.now_playing.as_ref()
    }

    pub fn previous_target(&self) -> Option<&str> {
        self.previous_target.as_deref()
    }

    pub fn previous_system(&self) -> Option<&str> {
        self.previous_system.as_deref()
    }

    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    /// True if `name` is on the rejection list.
    pub fn is_rejected(&self, name: &str) -> bool {
        self.rejected.iter().any(|r| r.eq_ignore_ascii_case(name))
    }
}
