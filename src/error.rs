//! Error types for the realtime audio bridge.

use thiserror::Error;

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Failures the audio bridge can run into.
///
/// None of these escape the bridge's run loop: every variant ends in a
/// teardown back to the disconnected state.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Microphone or audio output could not be acquired.
    #[error("Audio acquisition failed: {0}")]
    Acquisition(String),

    /// The streaming session reported an error.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A server message could not be decoded.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A connect was requested while a session is already active.
    #[error("Session already active")]
    AlreadyActive,

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl BridgeError {
    pub fn acquisition<S: Into<String>>(msg: S) -> Self {
        Self::Acquisition(msg.into())
    }

    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }

    pub fn protocol<S: Into<String>>(msg: S) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }
}
