use std::sync::Arc;

use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::error;

use crate::audio::{AudioBackend, AudioBackendFactory, AudioOutput, AudioSource, MixerOutput, OutputSink};
use crate::config::Config;
use crate::content::LessonService;
use crate::error::Result;
use crate::live::LiveTransport;
use crate::session::{AudioBridge, BridgeConfig, BridgeStatus};

/// The speaking session driven by the HTTP API
pub struct SpeakingSession {
    pub status: watch::Receiver<BridgeStatus>,
    pub shutdown: Option<oneshot::Sender<()>>,
    pub task: Option<JoinHandle<()>>,
}

impl SpeakingSession {
    pub fn snapshot(&self) -> BridgeStatus {
        self.status.borrow().clone()
    }

    pub fn is_active(&self) -> bool {
        self.status.borrow().state.is_active()
    }

    /// Ask the bridge to disconnect and wait for its task to finish
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Speaking session task panicked: {}", e);
            }
        }
    }
}

/// Audio endpoints used for speaking sessions
#[derive(Debug, Clone)]
pub struct AudioDevices {
    pub source: AudioSource,
    pub sink: OutputSink,
}

impl Default for AudioDevices {
    fn default() -> Self {
        Self {
            source: AudioSource::Microphone,
            sink: OutputSink::Speaker,
        }
    }
}

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub lessons: Arc<LessonService>,
    pub transport: Arc<dyn LiveTransport>,
    pub devices: AudioDevices,
    /// Current (or last) speaking session
    pub speaking: Arc<Mutex<Option<SpeakingSession>>>,
}

impl AppState {
    pub fn new(
        config: Config,
        lessons: Arc<LessonService>,
        transport: Arc<dyn LiveTransport>,
        devices: AudioDevices,
    ) -> Self {
        Self {
            config: Arc::new(config),
            lessons,
            transport,
            devices,
            speaking: Arc::new(Mutex::new(None)),
        }
    }

    /// Fresh bridge wired to the configured devices
    pub fn create_bridge(&self) -> Result<AudioBridge> {
        let config = BridgeConfig::from(self.config.as_ref());

        let microphone: Box<dyn AudioBackend> =
            AudioBackendFactory::create(self.devices.source.clone(), config.capture())?;
        let output: Box<dyn AudioOutput> = Box::new(MixerOutput::new(
            self.devices.sink.clone(),
            config.output_sample_rate,
        ));

        Ok(AudioBridge::new(
            config,
            Arc::clone(&self.transport),
            microphone,
            output,
        ))
    }
}
