use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle of the streaming session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closed,
    Errored,
}

impl ConnectionState {
    /// Connecting or open. Frames are only forwarded once open.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

/// Snapshot of a speaking session, published on every change
#[derive(Debug, Clone, Serialize)]
pub struct BridgeStatus {
    pub session_id: String,

    pub state: ConnectionState,

    /// Whether model audio is scheduled or playing
    pub is_speaking: bool,

    /// Microphone level of the last frame (0-100)
    pub volume: f32,

    /// Outbound frames handed to the transport
    pub frames_sent: u64,

    /// Inbound audio chunks scheduled for playback
    pub chunks_received: u64,

    pub interruptions: u64,

    /// When the remote acknowledged the session
    pub connected_at: Option<DateTime<Utc>>,

    /// Reason for the last error teardown, if any
    pub last_error: Option<String>,
}

impl BridgeStatus {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            state: ConnectionState::Disconnected,
            is_speaking: false,
            volume: 0.0,
            frames_sent: 0,
            chunks_received: 0,
            interruptions: 0,
            connected_at: None,
            last_error: None,
        }
    }
}
