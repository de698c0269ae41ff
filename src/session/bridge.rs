use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::config::BridgeConfig;
use super::state::{BridgeStatus, ConnectionState};
use crate::audio::pcm::{decode_pcm16, encode_pcm16, floats_to_pcm16, pcm16_to_floats, volume_level};
use crate::audio::{AudioBackend, AudioFrame, AudioOutput, PlaybackHandle, PlaybackQueue};
use crate::error::{BridgeError, Result};
use crate::live::{LiveCommand, LiveConnection, LiveTransport, RealtimeInput, ServerMessage, SessionEvent};

/// Something the bridge has to react to
#[derive(Debug)]
pub enum BridgeInput {
    /// Session event; `None` once the transport has hung up
    Session(Option<SessionEvent>),
    /// Captured microphone frame
    Frame(AudioFrame),
    /// A chunk finished playing on its own
    PlaybackEnded(PlaybackHandle),
    /// The microphone stream ended
    CaptureEnded,
}

enum Next {
    Shutdown,
    Input(Option<BridgeInput>),
}

/// Realtime audio bridge between the microphone, Gemini Live and the speaker.
///
/// All mutation happens on the task that owns the bridge: `run` (or `step`)
/// serializes capture frames, session events and playback completions, so
/// the playback cursor and pending set need no locking.
pub struct AudioBridge {
    config: BridgeConfig,
    transport: Arc<dyn LiveTransport>,
    microphone: Box<dyn AudioBackend>,
    output: Box<dyn AudioOutput>,

    state: ConnectionState,
    queue: PlaybackQueue,

    connection: Option<LiveConnection>,
    frames: Option<mpsc::Receiver<AudioFrame>>,
    ended: Option<mpsc::UnboundedReceiver<PlaybackHandle>>,

    status: watch::Sender<BridgeStatus>,
}

impl AudioBridge {
    pub fn new(
        config: BridgeConfig,
        transport: Arc<dyn LiveTransport>,
        microphone: Box<dyn AudioBackend>,
        output: Box<dyn AudioOutput>,
    ) -> Self {
        let (status, _) = watch::channel(BridgeStatus::new(config.session_id.clone()));
        let queue = PlaybackQueue::new(config.output_sample_rate);

        Self {
            config,
            transport,
            microphone,
            output,
            state: ConnectionState::Disconnected,
            queue,
            connection: None,
            frames: None,
            ended: None,
            status,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_speaking(&self) -> bool {
        self.queue.is_speaking()
    }

    /// Playback cursor in seconds on the output clock
    pub fn cursor(&self) -> f64 {
        self.queue.cursor()
    }

    pub fn pending_playback(&self) -> usize {
        self.queue.pending_len()
    }

    /// Live status updates
    pub fn status(&self) -> watch::Receiver<BridgeStatus> {
        self.status.subscribe()
    }

    pub fn snapshot(&self) -> BridgeStatus {
        self.status.borrow().clone()
    }

    /// Acquire the output and the microphone, then open the streaming session.
    ///
    /// On failure everything acquired so far is released and the bridge is
    /// back to `Disconnected`. There is no retry.
    pub async fn connect(&mut self) -> Result<()> {
        if self.state != ConnectionState::Disconnected {
            return Err(BridgeError::AlreadyActive);
        }

        info!("Connecting speaking session: {}", self.config.session_id);
        self.set_state(ConnectionState::Connecting);
        self.status.send_modify(|s| s.last_error = None);

        match self.acquire().await {
            Ok(()) => {
                info!("Speaking session negotiating with {}", self.config.model);
                Ok(())
            }
            Err(e) => {
                error!("Failed to start speaking session: {}", e);
                self.status.send_modify(|s| s.last_error = Some(e.to_string()));
                self.teardown(ConnectionState::Disconnected).await;
                Err(e)
            }
        }
    }

    async fn acquire(&mut self) -> Result<()> {
        self.ended = Some(self.output.start().await?);
        self.frames = Some(self.microphone.start().await?);
        self.connection = Some(self.transport.connect(self.config.setup()).await?);
        Ok(())
    }

    /// Tear the session down. Safe to call at any time, any number of times.
    pub async fn disconnect(&mut self) {
        if self.state == ConnectionState::Disconnected {
            debug!("Speaking session already disconnected");
            return;
        }

        info!("Disconnecting speaking session: {}", self.config.session_id);
        self.teardown(ConnectionState::Closed).await;
    }

    /// Wait for the next thing to react to. Cancel safe.
    ///
    /// Returns `None` when no session is active.
    pub async fn next_input(&mut self) -> Option<BridgeInput> {
        if !self.state.is_active() {
            return None;
        }

        let input = tokio::select! {
            event = recv_event(&mut self.connection) => BridgeInput::Session(event),
            frame = recv_bounded(&mut self.frames) => match frame {
                Some(frame) => BridgeInput::Frame(frame),
                None => BridgeInput::CaptureEnded,
            },
            Some(handle) = recv_unbounded(&mut self.ended) => BridgeInput::PlaybackEnded(handle),
        };

        Some(input)
    }

    pub async fn handle(&mut self, input: BridgeInput) {
        match input {
            BridgeInput::Session(Some(SessionEvent::Open)) => self.on_open(),
            BridgeInput::Session(Some(SessionEvent::Message(message))) => {
                self.on_server_message(&message)
            }
            BridgeInput::Session(Some(SessionEvent::Error(reason))) => {
                error!("Speaking session error: {}", reason);
                self.status.send_modify(|s| s.last_error = Some(reason));
                self.teardown(ConnectionState::Errored).await;
            }
            BridgeInput::Session(Some(SessionEvent::Closed)) | BridgeInput::Session(None) => {
                info!("Speaking session closed by remote");
                self.teardown(ConnectionState::Closed).await;
            }
            BridgeInput::Frame(frame) => self.on_frame(frame),
            BridgeInput::PlaybackEnded(handle) => self.on_playback_ended(handle),
            BridgeInput::CaptureEnded => {
                warn!("Microphone stream ended");
                self.frames = None;
            }
        }
    }

    /// Process one input. Returns false once the session is no longer active.
    pub async fn step(&mut self) -> bool {
        match self.next_input().await {
            Some(input) => {
                self.handle(input).await;
                true
            }
            None => false,
        }
    }

    /// Drive the session until it ends or `shutdown` resolves.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let next = tokio::select! {
                _ = &mut shutdown => Next::Shutdown,
                input = self.next_input() => Next::Input(input),
            };

            match next {
                Next::Shutdown => {
                    self.disconnect().await;
                    break;
                }
                Next::Input(Some(input)) => self.handle(input).await,
                Next::Input(None) => break,
            }
        }

        debug!("Speaking session loop finished: {}", self.config.session_id);
    }

    fn on_open(&mut self) {
        if self.state != ConnectionState::Connecting {
            debug!("Ignoring duplicate open in state {:?}", self.state);
            return;
        }

        info!("Speaking session open: {}", self.config.session_id);
        self.set_state(ConnectionState::Open);
        self.status.send_modify(|s| s.connected_at = Some(Utc::now()));
    }

    fn on_frame(&mut self, frame: AudioFrame) {
        let volume = volume_level(&frame.samples, self.config.volume_gain);

        // Capture only streams once the remote has acknowledged the session
        let connection = match &self.connection {
            Some(connection) if self.state == ConnectionState::Open => connection,
            _ => {
                debug!("Session not open; dropping frame at {}ms", frame.timestamp_ms);
                self.status.send_modify(|s| s.volume = volume);
                return;
            }
        };

        let data = encode_pcm16(&floats_to_pcm16(&frame.samples));
        let input = RealtimeInput::pcm_audio(data, self.config.input_sample_rate);

        let sent = connection.commands.send(LiveCommand::Input(input)).is_ok();
        if !sent {
            debug!("Transport gone; dropping frame at {}ms", frame.timestamp_ms);
        }

        self.status.send_modify(|s| {
            s.volume = volume;
            if sent {
                s.frames_sent += 1;
            }
        });
    }

    fn on_server_message(&mut self, message: &ServerMessage) {
        if let Some(data) = message.audio_data() {
            match decode_pcm16(data) {
                Ok(pcm) if !pcm.is_empty() => self.schedule_chunk(pcm16_to_floats(&pcm)),
                Ok(_) => debug!("Ignoring empty audio chunk"),
                Err(e) => warn!("Skipping audio chunk: {}", e),
            }
        }

        // Audio in the same message is scheduled first, then discarded
        if message.is_interrupted() {
            self.interrupt();
        }
    }

    fn schedule_chunk(&mut self, samples: Vec<f32>) {
        let now = self.output.current_time();
        let chunk = self.queue.schedule(now, samples.len());

        debug!(
            "Scheduled chunk {} at {:.3}s for {:.3}s",
            chunk.handle, chunk.start, chunk.duration
        );
        self.output.play(chunk.handle, samples, chunk.start);

        self.status.send_modify(|s| {
            s.chunks_received += 1;
            s.is_speaking = true;
        });
    }

    fn interrupt(&mut self) {
        let stopped = self.queue.interrupt();
        for handle in &stopped {
            self.output.cancel(*handle);
        }

        info!("Model interrupted; stopped {} chunks", stopped.len());
        self.status.send_modify(|s| {
            s.interruptions += 1;
            s.is_speaking = false;
        });
    }

    fn on_playback_ended(&mut self, handle: PlaybackHandle) {
        if self.queue.complete(handle) {
            info!("Model finished speaking");
            self.status.send_modify(|s| s.is_speaking = false);
        }
    }

    /// Release everything and land in `Disconnected`, passing through
    /// `reason` when it is `Closed` or `Errored`.
    async fn teardown(&mut self, reason: ConnectionState) {
        if let Some(connection) = self.connection.take() {
            let _ = connection.commands.send(LiveCommand::Close);
        }

        if let Err(e) = self.microphone.stop().await {
            warn!("Failed to stop {}: {}", self.microphone.name(), e);
        }
        self.frames = None;

        for handle in self.queue.interrupt() {
            self.output.cancel(handle);
        }
        if let Err(e) = self.output.stop().await {
            warn!("Failed to stop {}: {}", self.output.name(), e);
        }
        self.ended = None;

        if reason != ConnectionState::Disconnected {
            self.set_state(reason);
        }
        self.set_state(ConnectionState::Disconnected);
        self.status.send_modify(|s| {
            s.is_speaking = false;
            s.volume = 0.0;
        });
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        debug!("Session state: {:?} -> {:?}", self.state, state);
        self.state = state;
        self.status.send_modify(|s| s.state = state);
    }
}

async fn recv_event(connection: &mut Option<LiveConnection>) -> Option<SessionEvent> {
    match connection {
        Some(connection) => connection.events.recv().await,
        None => std::future::pending().await,
    }
}

async fn recv_bounded<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn recv_unbounded<T>(rx: &mut Option<mpsc::UnboundedReceiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
