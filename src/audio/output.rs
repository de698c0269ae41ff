use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::mixer::PlaybackMixer;
use super::playback::PlaybackHandle;
use crate::error::{BridgeError, Result};

/// Mixer handle shared with whatever drives the output clock
pub type SharedMixer = Arc<Mutex<PlaybackMixer>>;

/// Block length rendered by the timer-driven sinks
const TICK: Duration = Duration::from_millis(20);

/// Audio playback device trait
///
/// Mirrors `AudioBackend` for the output direction: `start` acquires the
/// device and returns the stream of naturally completed chunks.
#[async_trait::async_trait]
pub trait AudioOutput: Send + Sync {
    /// Acquire the device and start the output clock
    async fn start(&mut self) -> Result<mpsc::UnboundedReceiver<PlaybackHandle>>;

    /// Release the device, dropping anything still scheduled. Safe to call repeatedly.
    async fn stop(&mut self) -> Result<()>;

    /// Output clock in seconds
    fn current_time(&self) -> f64;

    /// Schedule mono samples at the output sample rate to start at `at` seconds
    fn play(&mut self, handle: PlaybackHandle, samples: Vec<f32>, at: f64);

    /// Force-stop a scheduled or playing chunk
    fn cancel(&mut self, handle: PlaybackHandle);

    fn name(&self) -> &str;
}

/// Where rendered audio goes
#[derive(Debug, Clone)]
pub enum OutputSink {
    /// Default output device (`cpal` feature)
    Speaker,
    /// Record everything played into a 16-bit mono WAV file, in real time
    WavFile(PathBuf),
    /// Run the clock in real time and discard the audio
    Discard,
    /// The caller drives the clock through [`MixerOutput::mixer`]
    External,
}

enum Driver {
    Idle,
    Ticker {
        stop_tx: oneshot::Sender<()>,
        task: JoinHandle<()>,
    },
    #[cfg(feature = "cpal")]
    Speaker(std::sync::mpsc::Sender<()>),
    External,
}

/// `AudioOutput` backed by a [`PlaybackMixer`] and one of the [`OutputSink`] drivers
pub struct MixerOutput {
    sink: OutputSink,
    mixer: SharedMixer,
    driver: Driver,
}

impl MixerOutput {
    pub fn new(sink: OutputSink, sample_rate: u32) -> Self {
        Self {
            sink,
            mixer: Arc::new(Mutex::new(PlaybackMixer::new(sample_rate))),
            driver: Driver::Idle,
        }
    }

    pub fn mixer(&self) -> SharedMixer {
        Arc::clone(&self.mixer)
    }

    pub fn is_running(&self) -> bool {
        !matches!(self.driver, Driver::Idle)
    }

    fn spawn_ticker(&self, writer: Option<hound::WavWriter<BufWriter<File>>>) -> Driver {
        let mixer = Arc::clone(&self.mixer);
        let (stop_tx, mut stop_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let block = {
                let rate = mixer.lock().sample_rate();
                (rate as u128 * TICK.as_millis() / 1000) as usize
            };
            let mut buffer = vec![0.0f32; block];
            let mut writer = writer;
            let mut ticker = tokio::time::interval(TICK);

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        mixer.lock().render(&mut buffer);
                        if let Some(w) = writer.as_mut() {
                            for &sample in &buffer {
                                let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                                if let Err(e) = w.write_sample(value) {
                                    error!("Failed to write playback sample: {}", e);
                                    break;
                                }
                            }
                        }
                    }
                }
            }

            if let Some(w) = writer.take() {
                if let Err(e) = w.finalize() {
                    warn!("Failed to finalize playback recording: {}", e);
                }
            }
        });

        Driver::Ticker { stop_tx, task }
    }

    fn create_wav_writer(&self, path: &PathBuf) -> Result<hound::WavWriter<BufWriter<File>>> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.mixer.lock().sample_rate(),
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        hound::WavWriter::create(path, spec).map_err(|e| {
            BridgeError::acquisition(format!("Failed to create WAV file {:?}: {}", path, e))
        })
    }
}

#[async_trait::async_trait]
impl AudioOutput for MixerOutput {
    async fn start(&mut self) -> Result<mpsc::UnboundedReceiver<PlaybackHandle>> {
        if self.is_running() {
            return Err(BridgeError::acquisition("Audio output already started"));
        }

        let driver = match &self.sink {
            OutputSink::Speaker => {
                #[cfg(feature = "cpal")]
                {
                    Driver::Speaker(speaker::start(Arc::clone(&self.mixer)).await?)
                }

                #[cfg(not(feature = "cpal"))]
                {
                    return Err(BridgeError::acquisition(
                        "Speaker output requires the `cpal` feature",
                    ));
                }
            }
            OutputSink::WavFile(path) => {
                let writer = self.create_wav_writer(path)?;
                info!("Recording playback to {}", path.display());
                self.spawn_ticker(Some(writer))
            }
            OutputSink::Discard => self.spawn_ticker(None),
            OutputSink::External => Driver::External,
        };

        let ended_rx = self.mixer.lock().subscribe();
        self.driver = driver;

        info!("Audio output started: {}", self.name());
        Ok(ended_rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.mixer.lock().stop_all();

        match std::mem::replace(&mut self.driver, Driver::Idle) {
            Driver::Idle => return Ok(()),
            Driver::Ticker { stop_tx, task } => {
                let _ = stop_tx.send(());
                if let Err(e) = task.await {
                    error!("Output task panicked: {}", e);
                }
            }
            #[cfg(feature = "cpal")]
            Driver::Speaker(stop_tx) => drop(stop_tx),
            Driver::External => {}
        }

        info!("Audio output stopped: {}", self.name());
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.mixer.lock().current_time()
    }

    fn play(&mut self, handle: PlaybackHandle, samples: Vec<f32>, at: f64) {
        self.mixer.lock().schedule(handle, samples, at);
    }

    fn cancel(&mut self, handle: PlaybackHandle) {
        self.mixer.lock().stop(handle);
    }

    fn name(&self) -> &str {
        match self.sink {
            OutputSink::Speaker => "speaker",
            OutputSink::WavFile(_) => "WAV recorder",
            OutputSink::Discard => "discard",
            OutputSink::External => "external clock",
        }
    }
}

#[cfg(feature = "cpal")]
mod speaker {
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use tokio::sync::oneshot;
    use tracing::{error, info};

    use super::SharedMixer;
    use crate::audio::pcm::resample_linear;
    use crate::error::{BridgeError, Result};

    fn log_stream_error(err: cpal::StreamError) {
        error!("Speaker stream error: {}", err);
    }

    fn open_stream(mixer: SharedMixer) -> std::result::Result<cpal::Stream, String> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| "No output device available".to_string())?;

        let supported = device
            .default_output_config()
            .map_err(|e| format!("Failed to query output config: {}", e))?;
        let mut config: cpal::StreamConfig = supported.into();
        let mixer_rate = mixer.lock().sample_rate();

        // Prefer running the device at the mixer rate; fall back to the native
        // rate with per-block resampling.
        let native_rate = config.sample_rate.0;
        config.sample_rate = cpal::SampleRate(mixer_rate);
        let channels = config.channels as usize;

        let build = |config: &cpal::StreamConfig, device_rate: u32| {
            let mixer = mixer.clone();
            let mut block: Vec<f32> = Vec::new();
            device.build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels.max(1);
                    let wanted = if device_rate == mixer_rate {
                        frames
                    } else {
                        (frames as u64 * mixer_rate as u64 / device_rate as u64).max(1) as usize
                    };
                    block.resize(wanted, 0.0);
                    mixer.lock().render(&mut block);

                    let mut mono = if device_rate == mixer_rate {
                        block.clone()
                    } else {
                        resample_linear(&block, mixer_rate, device_rate)
                    };
                    mono.resize(frames, 0.0);

                    for (frame, sample) in data.chunks_mut(channels.max(1)).zip(mono) {
                        frame.fill(sample);
                    }
                },
                log_stream_error,
                None,
            )
        };

        let stream = match build(&config, mixer_rate) {
            Ok(stream) => stream,
            Err(_) => {
                config.sample_rate = cpal::SampleRate(native_rate);
                build(&config, native_rate)
                    .map_err(|e| format!("Failed to build output stream: {}", e))?
            }
        };

        stream
            .play()
            .map_err(|e| format!("Failed to start output stream: {}", e))?;

        info!(
            "Speaker: {} ({}Hz, {} channels)",
            device.name().unwrap_or_else(|_| "unknown".to_string()),
            config.sample_rate.0,
            channels
        );
        Ok(stream)
    }

    /// Open the default output device on a dedicated thread (cpal streams are
    /// not `Send`). Dropping the returned sender releases the device.
    pub(super) async fn start(mixer: SharedMixer) -> Result<std::sync::mpsc::Sender<()>> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();

        std::thread::Builder::new()
            .name("panda-speaker".to_string())
            .spawn(move || match open_stream(mixer) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    let _ = stop_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| BridgeError::acquisition(format!("Failed to spawn speaker thread: {}", e)))?;

        match ready_rx.await {
            Ok(Ok(())) => Ok(stop_tx),
            Ok(Err(e)) => Err(BridgeError::acquisition(e)),
            Err(_) => Err(BridgeError::acquisition("Speaker thread exited during startup")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_external_output_reports_completion() {
        let mut output = MixerOutput::new(OutputSink::External, 24000);
        let mut ended = output.start().await.unwrap();
        let mixer = output.mixer();

        output.play(PlaybackHandle(7), vec![0.1; 240], 0.0);
        assert_eq!(output.current_time(), 0.0);

        mixer.lock().advance(240);
        assert_eq!(ended.recv().await, Some(PlaybackHandle(7)));
        assert!((output.current_time() - 0.01).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_cancel_suppresses_completion() {
        let mut output = MixerOutput::new(OutputSink::External, 24000);
        let mut ended = output.start().await.unwrap();

        output.play(PlaybackHandle(1), vec![0.1; 10], 0.0);
        output.cancel(PlaybackHandle(1));
        output.mixer().lock().advance(100);

        assert!(ended.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let mut output = MixerOutput::new(OutputSink::Discard, 24000);
        output.start().await.unwrap();
        assert!(output.is_running());

        output.stop().await.unwrap();
        output.stop().await.unwrap();
        assert!(!output.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wav_sink_records_played_audio() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("played.wav");

        let mut output = MixerOutput::new(OutputSink::WavFile(path.clone()), 24000);
        let mut ended = output.start().await.unwrap();

        output.play(PlaybackHandle(0), vec![0.5; 480], 0.0);
        assert_eq!(ended.recv().await, Some(PlaybackHandle(0)));
        output.stop().await.unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 24000);
        let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert!(samples.len() >= 480);
        assert_eq!(samples[0], (0.5 * i16::MAX as f32) as i16);
    }
}
