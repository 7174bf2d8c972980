//! Ludo Protocol
//!
//! Shared wire-level types for the device boundary: correlation ids,
//! search reply payloads, and candidate records. This crate is used by
//! the engine and by anything else that speaks the device protocol.

/// Correlation id type and validation
pub mod ids;

/// Error types and handling
pub mod errors;

/// Reply payload and candidate types
pub mod types;

// Re-export commonly used types
pub use errors::ProtocolError;
pub use ids::RequestId;
pub use types::{Candidate, ReplyPayload};
