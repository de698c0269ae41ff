pub mod client;
pub mod messages;
pub mod transport;

pub use client::GeminiLiveTransport;
pub use messages::{ClientMessage, RealtimeInput, ServerMessage, Setup};
pub use transport::{LiveCommand, LiveConnection, LiveTransport, SessionEvent};
