pub mod audio;
pub mod config;
pub mod content;
pub mod error;
pub mod http;
pub mod live;
pub mod session;

pub use audio::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFile, AudioFrame, AudioOutput,
    AudioSource, MixerOutput, OutputSink, PlaybackHandle, PlaybackQueue,
};
pub use config::Config;
pub use content::{AppMode, Flashcard, GeminiClient, LessonService, Story, WritingResult};
pub use error::BridgeError;
pub use http::{create_router, AppState, AudioDevices};
pub use live::{GeminiLiveTransport, LiveTransport, SessionEvent};
pub use session::{AudioBridge, BridgeConfig, BridgeStatus, ConnectionState};
