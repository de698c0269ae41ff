//! Speaking session management
//!
//! This module provides the `AudioBridge` that connects:
//! - Microphone capture, framed and encoded for the Live API
//! - The Gemini Live streaming session
//! - Gapless playback of model audio, with barge-in interruption
//! - Status publishing for the HTTP layer

mod bridge;
mod config;
mod state;

pub use bridge::{AudioBridge, BridgeInput};
pub use config::BridgeConfig;
pub use state::{BridgeStatus, ConnectionState};
