use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};
use super::capture::FrameAssembler;
use super::pcm::{downmix_to_mono, resample_linear};
use crate::error::BridgeError;

/// A WAV file decoded to mono f32
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path).context("Failed to open WAV file")?;
        let spec = reader.spec();

        let interleaved: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read audio samples")?,
            SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<Vec<_>, _>>()
                    .context("Failed to read audio samples")?
            }
        };

        let samples = downmix_to_mono(&interleaved, spec.channels as usize);
        let duration_seconds = samples.len() as f64 / spec.sample_rate as f64;

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Samples resampled to `target_rate`
    pub fn resampled(&self, target_rate: u32) -> Vec<f32> {
        resample_linear(&self.samples, self.sample_rate, target_rate)
    }
}

/// Replays a WAV file as if it were a microphone.
///
/// Frames are paced in real time. Once the file is exhausted the backend
/// keeps delivering silent frames, like a microphone in a quiet room, until
/// stopped.
pub struct FileBackend {
    path: PathBuf,
    config: AudioBackendConfig,
    task: Option<JoinHandle<()>>,
}

impl FileBackend {
    pub fn new(path: PathBuf, config: AudioBackendConfig) -> Self {
        Self {
            path,
            config,
            task: None,
        }
    }
}

#[async_trait::async_trait]
impl AudioBackend for FileBackend {
    async fn start(&mut self) -> crate::error::Result<mpsc::Receiver<AudioFrame>> {
        if self.task.is_some() {
            return Err(BridgeError::acquisition("File input already capturing"));
        }

        let file = AudioFile::open(&self.path)
            .map_err(|e| BridgeError::acquisition(format!("{:#}", e)))?;

        let frame_size = self.config.frame_size;
        let rate = self.config.target_sample_rate;
        let mut assembler = FrameAssembler::new(frame_size, rate);
        let mut frames = assembler.push(&file.resampled(rate));
        let remainder = assembler.pending_len();
        if remainder > 0 {
            frames.extend(assembler.push(&vec![0.0; frame_size - remainder]));
        }

        let (tx, rx) = mpsc::channel(16);
        let frame_period = Duration::from_secs_f64(frame_size as f64 / rate as f64);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(frame_period);
            let mut queued = frames.into_iter();

            loop {
                ticker.tick().await;
                let frame = match queued.next() {
                    Some(frame) => frame,
                    None => assembler
                        .push(&vec![0.0; frame_size])
                        .pop()
                        .unwrap_or_else(|| AudioFrame {
                            samples: vec![0.0; frame_size],
                            sample_rate: rate,
                            timestamp_ms: 0,
                        }),
                };
                if tx.send(frame).await.is_err() {
                    debug!("File input receiver dropped");
                    break;
                }
            }
        });

        self.task = Some(task);
        Ok(rx)
    }

    async fn stop(&mut self) -> crate::error::Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("File input stopped: {}", self.path.display());
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.task.is_some()
    }

    fn name(&self) -> &str {
        "WAV file input"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, rate: u32, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_open_scales_int_samples() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("hello.wav");
        write_wav(&path, 16000, &[16384, -16384, 0]);

        let file = AudioFile::open(&path).unwrap();
        assert_eq!(file.sample_rate, 16000);
        assert_eq!(file.channels, 1);
        assert_eq!(file.samples, vec![0.5, -0.5, 0.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_file_backend_pads_last_frame() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("short.wav");
        write_wav(&path, 16000, &[1000; 5000]);

        let mut backend = FileBackend::new(path, AudioBackendConfig::default());
        let mut rx = backend.start().await.unwrap();
        assert!(backend.is_capturing());

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        let third = rx.recv().await.unwrap();

        assert_eq!(first.samples.len(), 4096);
        assert_eq!(second.samples.len(), 4096);
        assert!(second.samples[5000 - 4096 - 1] > 0.0);
        assert_eq!(second.samples[5000 - 4096], 0.0);
        assert!(third.samples.iter().all(|&s| s == 0.0));

        backend.stop().await.unwrap();
        backend.stop().await.unwrap();
        assert!(!backend.is_capturing());
    }

    #[tokio::test]
    async fn test_missing_file_is_acquisition_failure() {
        let mut backend = FileBackend::new(
            PathBuf::from("/nonexistent/input.wav"),
            AudioBackendConfig::default(),
        );
        assert!(matches!(
            backend.start().await,
            Err(BridgeError::Acquisition(_))
        ));
        assert!(!backend.is_capturing());
    }
}
