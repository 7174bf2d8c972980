//! Device command boundary
//!
//! The game-launching appliance is reached over an asynchronous,
//! push-style transport: commands are fire-and-forget, and search
//! results arrive later on a separate inbound channel, correlated only
//! by the command id. The `DeviceLink` trait is the seam the executor
//! and coordinator dispatch through; `ws` provides the real WebSocket
//! implementation, and tests substitute scripted fakes.

use async_trait::async_trait;

use crate::errors::RunError;
use protocol::RequestId;

pub mod ws;

/// Commands the engine sends to the appliance.
///
/// Delivery is at-most-once: there is no acknowledgement beyond an
/// eventual correlated reply (searches) or silence.
#[async_trait]
pub trait DeviceLink: Send + Sync {
    /// Issue a search for `keyword`, optionally scoped to one system.
    ///
    /// `None` for `system` means "search everywhere". The reply, if
    /// any, arrives out-of-band keyed by `id`.
    async fn dispatch_search(
        &self,
        id: &RequestId,
        keyword: &str,
        system: Option<&str>,
    ) -> Result<(), RunError>;

    /// Launch the entry at `location`. Fire-and-forget.
    async fn launch(&self, name: &str, location: &str) -> Result<(), RunError>;
}
