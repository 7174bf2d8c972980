//! WebSocket device link
//!
//! Ludo connects outward as a WebSocket **client** to the appliance.
//! Outbound command frames are queued on a bounded channel and written
//! by a background task; inbound frames are demultiplexed into the
//! CorrelationTable from the read half. A reply whose id is no longer a
//! member of the active batch is still buffered (the table bounds its
//! own memory via clear), but logged as stale so reordering and late
//! arrivals stay observable.
//!
//! Features:
//! - Auto-reconnect with configurable delay
//! - JSON message protocol (search/launch out, search_result in)
//! - Optional auth_token sent on connect

use async_trait::async_trait;
use futures::stream::StreamExt;
use futures::SinkExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use crate::batch::BatchTracker;
use crate::config::DeviceConfig;
use crate::correlation::CorrelationTable;
use crate::errors::RunError;
use protocol::{Candidate, ReplyPayload, RequestId};

/// Outbound queue depth before dispatch calls start failing.
const OUTBOUND_BUFFER: usize = 64;

/// Frame sent by Ludo to the appliance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// Sent immediately after connecting to authenticate.
    AuthHello {
        #[serde(skip_serializing_if = "Option::is_none")]
        auth_token: Option<String>,
    },
    /// Search for a keyword, optionally scoped to one system.
    Search {
        command_id: RequestId,
        keyword: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        system: Option<String>,
    },
    /// Launch the entry at the given location.
    Launch { name: String, location: String },
    /// Reply to an appliance ping.
    Pong,
}

/// Frame received from the appliance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    /// Correlated result for an earlier search command.
    SearchResult {
        command_id: RequestId,
        candidates: Vec<Candidate>,
    },
    /// Appliance ping (Ludo replies with pong).
    Ping,
}

/// WebSocket-backed implementation of [`DeviceLink`].
///
/// Cheap to clone; all clones feed the same connection.
#[derive(Clone)]
pub struct WsDeviceLink {
    outbound: mpsc::Sender<OutboundFrame>,
}

impl WsDeviceLink {
    /// Start the link: spawns the auto-reconnect loop in the
    /// background and returns a handle usable immediately (frames
    /// queue until the connection is up).
    pub fn start(config: DeviceConfig, table: CorrelationTable, tracker: BatchTracker) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel::<OutboundFrame>(OUTBOUND_BUFFER);
        tokio::spawn(reconnect_loop(config, table, tracker, outbound_rx));
        Self {
            outbound: outbound_tx,
        }
    }

    async fn send(&self, frame: OutboundFrame) -> Result<(), RunError> {
        self.outbound
            .send(frame)
            .await
            .map_err(|_| RunError::DeviceLink("device link is shut down".to_string()))
    }
}

#[async_trait]
impl super::DeviceLink for WsDeviceLink {
    async fn dispatch_search(
        &self,
        id: &RequestId,
        keyword: &str,
        system: Option<&str>,
    ) -> Result<(), RunError> {
        debug!(%id, keyword, ?system, "dispatching search command");
        self.send(OutboundFrame::Search {
            command_id: id.clone(),
            keyword: keyword.to_string(),
            system: system.map(str::to_string),
        })
        .await
    }

    async fn launch(&self, name: &str, location: &str) -> Result<(), RunError> {
        info!(name, location, "dispatching launch command");
        self.send(OutboundFrame::Launch {
            name: name.to_string(),
            location: location.to_string(),
        })
        .await
    }
}

/// Auto-reconnect loop. Keeps trying to maintain a connection.
async fn reconnect_loop(
    config: DeviceConfig,
    table: CorrelationTable,
    tracker: BatchTracker,
    mut outbound_rx: mpsc::Receiver<OutboundFrame>,
) {
    loop {
        info!("device link connecting to {}", config.url);

        match tokio_tungstenite::connect_async(&config.url).await {
            Ok((ws_stream, _response)) => {
                info!("device link connected to {}", config.url);

                let (mut write, mut read) = ws_stream.split();

                // Send auth hello
                let hello = OutboundFrame::AuthHello {
                    auth_token: config.auth_token.clone(),
                };
                if let Ok(json) = serde_json::to_string(&hello) {
                    if let Err(e) = write.send(WsMessage::Text(json)).await {
                        warn!("failed to send auth hello: {}", e);
                    }
                }

                // Run read/write until disconnect
                loop {
                    tokio::select! {
                        // Inbound from the appliance
                        msg = read.next() => {
                            match msg {
                                Some(Ok(WsMessage::Text(text))) => {
                                    handle_inbound(&text, &table, &tracker, &mut write).await;
                                }
                                Some(Ok(WsMessage::Ping(data))) => {
                                    let _ = write.send(WsMessage::Pong(data)).await;
                                }
                                Some(Ok(WsMessage::Close(_))) | None => {
                                    info!("device closed the connection");
                                    break;
                                }
                                Some(Err(e)) => {
                                    warn!("device link read error: {}", e);
                                    break;
                                }
                                _ => {} // Binary, Pong, Frame — ignore
                            }
                        }
                        // Outbound commands from the engine
                        frame = outbound_rx.recv() => {
                            match frame {
                                Some(outbound) => {
                                    if let Ok(json) = serde_json::to_string(&outbound) {
                                        if let Err(e) = write.send(WsMessage::Text(json)).await {
                                            warn!("failed to send command frame: {}", e);
                                            break;
                                        }
                                    }
                                }
                                None => {
                                    info!("command channel closed, stopping device link");
                                    return;
                                }
                            }
                        }
                    }
                }
            }
            Err(e) => {
                error!("device link failed to connect: {}", e);
            }
        }

        // Reconnect delay
        info!(
            "device link reconnecting in {}s...",
            config.reconnect_delay_secs
        );
        tokio::time::sleep(std::time::Duration::from_secs(config.reconnect_delay_secs)).await;
    }
}

/// Handle a single inbound text frame from the appliance.
///
/// This is the sole path by which [`CorrelationTable::deliver`] runs.
async fn handle_inbound<S>(
    text: &str,
    table: &CorrelationTable,
    tracker: &BatchTracker,
    write: &mut S,
) where
    S: SinkExt<WsMessage> + Unpin,
    S::Error: std::fmt::Display,
{
    let frame: InboundFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            warn!("failed to parse inbound device frame: {} — raw: {}", e, text);
            return;
        }
    };

    match frame {
        InboundFrame::SearchResult {
            command_id,
            candidates,
        } => {
            if !tracker.is_member(&command_id).await {
                debug!(id = %command_id, "stale reply for superseded or completed batch");
            }
            let delivery = table
                .deliver(&command_id, ReplyPayload::new(candidates))
                .await;
            debug!(id = %command_id, ?delivery, "search reply delivered");
        }
        InboundFrame::Ping => {
            if let Ok(json) = serde_json::to_string(&OutboundFrame::Pong) {
                if let Err(e) = write.send(WsMessage::Text(json)).await {
                    warn!("failed to send pong: {}", e);
                }
            }
        }
    }
}
