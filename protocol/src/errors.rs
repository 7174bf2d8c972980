//! Error types and handling
//!
//! Errors produced at the protocol boundary. The device transport
//! validates every outbound command id and rejects malformed ones
//! outright, so a malformed id here is a programmer error on our side,
//! not a runtime condition to retry.

use thiserror::Error;

/// Errors that can occur at the device protocol boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The id is empty, too long, or carries characters the transport
    /// refuses (anything outside `[A-Za-z0-9]` — the transport treats
    /// prefixes and separators as structure and rejects the request).
    #[error("Malformed request id: {0:?}")]
    MalformedId(String),

    /// A frame could not be decoded
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),
}
