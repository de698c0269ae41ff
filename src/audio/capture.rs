//! Microphone capture and fixed-size framing.

use super::backend::AudioFrame;

/// Collects arbitrarily sized callback buffers into frames of exactly
/// `frame_size` samples.
#[derive(Debug)]
pub struct FrameAssembler {
    frame_size: usize,
    sample_rate: u32,
    pending: Vec<f32>,
    emitted_samples: u64,
}

impl FrameAssembler {
    pub fn new(frame_size: usize, sample_rate: u32) -> Self {
        Self {
            frame_size: frame_size.max(1),
            sample_rate,
            pending: Vec::with_capacity(frame_size),
            emitted_samples: 0,
        }
    }

    /// Append samples and return every frame completed by them.
    pub fn push(&mut self, samples: &[f32]) -> Vec<AudioFrame> {
        self.pending.extend_from_slice(samples);

        let mut frames = Vec::new();
        while self.pending.len() >= self.frame_size {
            let rest = self.pending.split_off(self.frame_size);
            let samples = std::mem::replace(&mut self.pending, rest);

            frames.push(AudioFrame {
                samples,
                sample_rate: self.sample_rate,
                timestamp_ms: self.emitted_samples * 1000 / self.sample_rate as u64,
            });
            self.emitted_samples += self.frame_size as u64;
        }
        frames
    }

    /// Samples waiting for the next frame
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(feature = "cpal")]
pub use device::MicrophoneBackend;

#[cfg(feature = "cpal")]
mod device {
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use tokio::sync::{mpsc, oneshot};
    use tracing::{error, info, warn};

    use super::FrameAssembler;
    use crate::audio::backend::{AudioBackend, AudioBackendConfig, AudioFrame};
    use crate::audio::pcm::{downmix_to_mono, resample_linear};
    use crate::error::{BridgeError, Result};

    /// Converts device callbacks into session-rate frames.
    struct CaptureSink {
        assembler: FrameAssembler,
        frame_tx: mpsc::Sender<AudioFrame>,
        channels: usize,
        device_rate: u32,
        target_rate: u32,
    }

    impl CaptureSink {
        fn push(&mut self, data: &[f32]) {
            let mono = downmix_to_mono(data, self.channels);
            let resampled = resample_linear(&mono, self.device_rate, self.target_rate);

            for frame in self.assembler.push(&resampled) {
                if let Err(e) = self.frame_tx.try_send(frame) {
                    warn!("Dropping microphone frame: {}", e);
                }
            }
        }
    }

    fn log_stream_error(err: cpal::StreamError) {
        error!("Microphone stream error: {}", err);
    }

    /// Default input device captured through cpal.
    ///
    /// `cpal::Stream` is not `Send`, so the stream lives on a dedicated thread
    /// that holds it until the stop channel closes.
    pub struct MicrophoneBackend {
        config: AudioBackendConfig,
        stop_tx: Option<std::sync::mpsc::Sender<()>>,
    }

    impl MicrophoneBackend {
        pub fn new(config: AudioBackendConfig) -> Self {
            Self {
                config,
                stop_tx: None,
            }
        }

        fn open_stream(
            config: &AudioBackendConfig,
            frame_tx: mpsc::Sender<AudioFrame>,
        ) -> std::result::Result<cpal::Stream, String> {
            let host = cpal::default_host();
            let device = host
                .default_input_device()
                .ok_or_else(|| "No input device available".to_string())?;

            let supported = device
                .default_input_config()
                .map_err(|e| format!("Failed to query input config: {}", e))?;

            let sample_format = supported.sample_format();
            let stream_config: cpal::StreamConfig = supported.into();

            info!(
                "Microphone: {} ({}Hz, {} channels, {:?})",
                device.name().unwrap_or_else(|_| "unknown".to_string()),
                stream_config.sample_rate.0,
                stream_config.channels,
                sample_format
            );

            let mut sink = CaptureSink {
                assembler: FrameAssembler::new(config.frame_size, config.target_sample_rate),
                frame_tx,
                channels: stream_config.channels as usize,
                device_rate: stream_config.sample_rate.0,
                target_rate: config.target_sample_rate,
            };

            let stream = match sample_format {
                cpal::SampleFormat::F32 => device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| sink.push(data),
                    log_stream_error,
                    None,
                ),
                cpal::SampleFormat::I16 => device.build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let floats: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                        sink.push(&floats);
                    },
                    log_stream_error,
                    None,
                ),
                other => return Err(format!("Unsupported sample format: {:?}", other)),
            }
            .map_err(|e| format!("Failed to build input stream: {}", e))?;

            stream
                .play()
                .map_err(|e| format!("Failed to start input stream: {}", e))?;

            Ok(stream)
        }
    }

    #[async_trait::async_trait]
    impl AudioBackend for MicrophoneBackend {
        async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
            if self.stop_tx.is_some() {
                return Err(BridgeError::acquisition("Microphone already capturing"));
            }

            let (frame_tx, frame_rx) = mpsc::channel(64);
            let (ready_tx, ready_rx) = oneshot::channel();
            let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();
            let config = self.config.clone();

            std::thread::Builder::new()
                .name("panda-microphone".to_string())
                .spawn(move || match Self::open_stream(&config, frame_tx) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        // Blocks until the sender is dropped by stop()
                        let _ = stop_rx.recv();
                        drop(stream);
                        info!("Microphone stream released");
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                })
                .map_err(|e| BridgeError::acquisition(format!("Failed to spawn capture thread: {}", e)))?;

            match ready_rx.await {
                Ok(Ok(())) => {
                    self.stop_tx = Some(stop_tx);
                    info!("Microphone capture started");
                    Ok(frame_rx)
                }
                Ok(Err(e)) => Err(BridgeError::acquisition(e)),
                Err(_) => Err(BridgeError::acquisition("Capture thread exited during startup")),
            }
        }

        async fn stop(&mut self) -> Result<()> {
            if self.stop_tx.take().is_some() {
                info!("Stopping microphone capture");
            }
            Ok(())
        }

        fn is_capturing(&self) -> bool {
            self.stop_tx.is_some()
        }

        fn name(&self) -> &str {
            "cpal microphone"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assembler_emits_exact_frames() {
        let mut assembler = FrameAssembler::new(4096, 16000);

        assert!(assembler.push(&[0.1; 3000]).is_empty());
        assert_eq!(assembler.pending_len(), 3000);

        let frames = assembler.push(&[0.2; 6000]);
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.samples.len() == 4096));
        assert_eq!(assembler.pending_len(), 9000 - 8192);

        // First frame straddles both pushes
        assert_eq!(frames[0].samples[2999], 0.1);
        assert_eq!(frames[0].samples[3000], 0.2);
    }

    #[test]
    fn test_assembler_timestamps_follow_sample_count() {
        let mut assembler = FrameAssembler::new(4000, 16000);
        let frames = assembler.push(&[0.0; 12000]);

        let stamps: Vec<u64> = frames.iter().map(|f| f.timestamp_ms).collect();
        assert_eq!(stamps, vec![0, 250, 500]);
        assert_eq!(frames[0].sample_rate, 16000);
    }
}
