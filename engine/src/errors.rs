//! Run-level error types
//!
//! Timeouts and empty results are values, not errors — they surface as
//! partial result lists and `NotFound` outcomes. Only three things end
//! a run abnormally: user cancellation (a signal, not a failure), a
//! transport-side rejection of a malformed command (programmer error),
//! and loss of the device link itself.

use thiserror::Error;

use protocol::ProtocolError;

/// Errors that terminate an orchestration run.
#[derive(Debug, Error)]
pub enum RunError {
    /// The user cancelled the run. Not a failure: all further side
    /// effects are suppressed and the caller acknowledges the stop.
    #[error("Run cancelled")]
    Cancelled,

    /// The transport rejected a command outright (malformed id or
    /// malformed command). Should never occur in correct usage.
    #[error("Transport rejected command: {0}")]
    TransportRejection(#[from] ProtocolError),

    /// The device link failed while sending a command.
    #[error("Device link error: {0}")]
    DeviceLink(String),
}

impl RunError {
    /// True for user cancellation, which callers report as a stop
    /// acknowledgement rather than an error.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunError::Cancelled)
    }
}
