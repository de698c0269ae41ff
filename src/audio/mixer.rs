// Playback mixer for scheduled model audio
//
// The mixer owns the output clock. Each scheduled chunk is a "voice" pinned
// to an absolute start sample; rendering sums every voice overlapping the
// requested block, clips to -1.0..1.0, and advances the clock. Voices that
// have played out are reported on the ended channel so the session can
// update its pending set.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::playback::PlaybackHandle;

struct Voice {
    handle: PlaybackHandle,
    start_sample: u64,
    samples: Vec<f32>,
}

impl Voice {
    fn end_sample(&self) -> u64 {
        self.start_sample + self.samples.len() as u64
    }
}

/// Sample-clock mixer shared between the session and the device driver
pub struct PlaybackMixer {
    sample_rate: u32,
    /// Samples rendered since the mixer was created
    clock: u64,
    voices: Vec<Voice>,
    ended_tx: Option<mpsc::UnboundedSender<PlaybackHandle>>,
}

impl PlaybackMixer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            clock: 0,
            voices: Vec::new(),
            ended_tx: None,
        }
    }

    /// Register for natural-completion notifications.
    ///
    /// Replaces any previous subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<PlaybackHandle> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.ended_tx = Some(tx);
        rx
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Output clock in seconds
    pub fn current_time(&self) -> f64 {
        self.clock as f64 / self.sample_rate as f64
    }

    /// Pin `samples` to start at `at` seconds. Start times already in the past
    /// begin at the next rendered sample.
    pub fn schedule(&mut self, handle: PlaybackHandle, samples: Vec<f32>, at: f64) {
        let requested = (at.max(0.0) * self.sample_rate as f64).round() as u64;
        let start_sample = requested.max(self.clock);

        debug!(
            "Scheduled voice {} at sample {} ({} samples)",
            handle,
            start_sample,
            samples.len()
        );

        self.voices.push(Voice {
            handle,
            start_sample,
            samples,
        });
    }

    /// Stop a voice without reporting completion. Returns false if it was not
    /// active (already finished or never scheduled).
    pub fn stop(&mut self, handle: PlaybackHandle) -> bool {
        let before = self.voices.len();
        self.voices.retain(|v| v.handle != handle);
        before != self.voices.len()
    }

    /// Stop every voice without reporting completion.
    pub fn stop_all(&mut self) {
        self.voices.clear();
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Fill `out` with the next block of mono audio and advance the clock.
    pub fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);

        let block_start = self.clock;
        let block_end = block_start + out.len() as u64;

        for voice in &self.voices {
            let from = voice.start_sample.max(block_start);
            let to = voice.end_sample().min(block_end);
            if from >= to {
                continue;
            }
            for t in from..to {
                out[(t - block_start) as usize] += voice.samples[(t - voice.start_sample) as usize];
            }
        }

        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }

        self.clock = block_end;
        self.retire_finished();
    }

    /// Advance the clock without producing audio (virtual sinks).
    pub fn advance(&mut self, samples: usize) {
        self.clock += samples as u64;
        self.retire_finished();
    }

    fn retire_finished(&mut self) {
        let clock = self.clock;
        let mut finished = Vec::new();
        self.voices.retain(|v| {
            if v.end_sample() <= clock {
                finished.push(v.handle);
                false
            } else {
                true
            }
        });

        if let Some(tx) = &self.ended_tx {
            for handle in finished {
                if tx.send(handle).is_err() {
                    warn!("Playback listener dropped; voice {} ended unobserved", handle);
                }
            }
        }
    }
}
