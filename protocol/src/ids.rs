//! Correlation ids
//!
//! A `RequestId` is the sole key tying an issued device command to its
//! eventual asynchronous reply. The device's transport validates ids
//! syntactically: a bare alphanumeric token, nothing else. No prefixes,
//! no separators, no decorations — a decorated id causes the transport
//! to reject the whole request, so the constructor enforces the rule
//! up front.
//!
//! Ids are generated from random UUIDs (hyphen-less form) and are never
//! reused within a process lifetime.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::ProtocolError;

/// Maximum accepted id length, matching the device's field width.
const MAX_ID_LEN: usize = 64;

/// Opaque correlation id for one device command.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh globally-unique id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Validate and wrap an existing token (e.g. one read off the wire).
    pub fn parse(token: impl Into<String>) -> Result<Self, ProtocolError> {
        let token = token.into();
        if Self::is_valid(&token) {
            Ok(Self(token))
        } else {
            Err(ProtocolError::MalformedId(token))
        }
    }

    /// True if `token` satisfies the transport's id rule: non-empty,
    /// bounded length, ASCII alphanumeric only.
    pub fn is_valid(token: &str) -> bool {
        !token.is_empty()
            && token.len() <= MAX_ID_LEN
            && token.bytes().all(|b| b.is_ascii_alphanumeric())
    }

    /// The bare token as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RequestId {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RequestId> for String {
    fn from(id: RequestId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_valid_and_unique() {
        let a = RequestId::generate();
        let b = RequestId::generate();
        assert!(RequestId::is_valid(a.as_str()));
        assert!(RequestId::is_valid(b.as_str()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_generated_ids_are_bare_tokens() {
        let id = RequestId::generate();
        assert!(!id.as_str().contains('-'));
        assert!(!id.as_str().contains(':'));
    }

    #[test]
    fn test_parse_rejects_decorated_ids() {
        assert!(RequestId::parse("req:1234").is_err());
        assert!(RequestId::parse("search/abc").is_err());
        assert!(RequestId::parse("abc def").is_err());
        assert!(RequestId::parse("").is_err());
        assert!(RequestId::parse("a".repeat(65)).is_err());
    }

    #[test]
    fn test_parse_accepts_bare_tokens() {
        let id = RequestId::parse("Abc123").unwrap();
        assert_eq!(id.as_str(), "Abc123");
    }

    #[test]
    fn test_serde_round_trip_validates() {
        let id = RequestId::generate();
        let json = serde_json::to_string(&id).unwrap();
        let back: RequestId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);

        let bad: Result<RequestId, _> = serde_json::from_str(r#""not a token""#);
        assert!(bad.is_err());
    }
}
