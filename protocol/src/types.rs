//! Reply payload and candidate types
//!
//! The device answers a search command with a list of candidates, each
//! a display name plus the on-device location used to launch it. The
//! payload carries no ordering guarantees beyond the device's own
//! listing order within one reply.

use serde::{Deserialize, Serialize};

/// One launchable entry reported by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Display name (e.g. "Super Mario World")
    pub name: String,

    /// On-device location used to launch the entry (e.g. "SNES/smw.sfc")
    pub location: String,
}

impl Candidate {
    /// Create a new candidate
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
        }
    }
}

/// The body of one correlated search reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyPayload {
    /// Candidates reported for the searched keyword
    pub candidates: Vec<Candidate>,
}

impl ReplyPayload {
    /// Create a payload from a candidate list
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }

    /// True if the device reported nothing for the keyword
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_serialization() {
        let payload = ReplyPayload::new(vec![Candidate::new("Super Mario World", "SNES/smw.sfc")]);
        let json = serde_json::to_string(&payload).unwrap();
        let back: ReplyPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(payload, back);
        assert!(!payload.is_empty());
    }

    #[test]
    fn test_empty_payload() {
        let payload = ReplyPayload::default();
        assert!(payload.is_empty());
    }
}
