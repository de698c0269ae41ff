use tokio::sync::mpsc;

use super::messages::{RealtimeInput, ServerMessage, Setup};
use crate::error::Result;

/// Session lifecycle as seen by the bridge.
///
/// `Closed` and `Error` are terminal: the transport emits nothing after them.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The remote acknowledged the setup message
    Open,
    Message(ServerMessage),
    Closed,
    Error(String),
}

/// Requests from the bridge to the transport
#[derive(Debug, Clone)]
pub enum LiveCommand {
    Input(RealtimeInput),
    /// Best-effort remote close
    Close,
}

/// Channel pair for one streaming session.
///
/// Commands are queued until the socket is ready, so frames sent while the
/// handshake is still in flight are delayed, never dropped or reordered.
pub struct LiveConnection {
    pub commands: mpsc::UnboundedSender<LiveCommand>,
    pub events: mpsc::Receiver<SessionEvent>,
}

/// Opens streaming sessions with the remote model
#[async_trait::async_trait]
pub trait LiveTransport: Send + Sync {
    /// Begin negotiating a session.
    ///
    /// Returns as soon as the session is underway; completion is reported
    /// as `SessionEvent::Open` and failures as `SessionEvent::Error`.
    async fn connect(&self, setup: Setup) -> Result<LiveConnection>;
}
