pub mod backend;
pub mod capture;
pub mod file;
pub mod mixer;
pub mod output;
pub mod pcm;
pub mod playback;

pub use backend::{AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource};
pub use capture::FrameAssembler;
pub use file::{AudioFile, FileBackend};
pub use mixer::PlaybackMixer;
pub use output::{AudioOutput, MixerOutput, OutputSink, SharedMixer};
pub use playback::{PlaybackHandle, PlaybackQueue, ScheduledChunk};
