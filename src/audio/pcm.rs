//! PCM sample conversion and transport encoding.
//!
//! Live sessions exchange raw little-endian 16-bit PCM, base64-encoded inside
//! JSON messages. Capture produces f32 samples in -1.0..1.0 and playback
//! consumes the same range.

use anyhow::{Context, Result};
use base64::Engine;
use std::io::Cursor;

use crate::error::BridgeError;

/// Scale between f32 samples and 16-bit integers.
pub const PCM16_SCALE: f32 = 32768.0;

/// Convert one f32 sample to i16.
///
/// Multiplies by 32768 and truncates toward zero. Values outside the i16
/// range wrap rather than clamp, so a full-scale `1.0` lands on `-32768`.
pub fn float_to_pcm16(sample: f32) -> i16 {
    (sample * PCM16_SCALE) as i32 as i16
}

pub fn floats_to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples.iter().map(|&s| float_to_pcm16(s)).collect()
}

pub fn pcm16_to_floats(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / PCM16_SCALE).collect()
}

/// Serialize samples as little-endian bytes and base64-encode them.
pub fn encode_pcm16(samples: &[i16]) -> String {
    let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decode a base64 payload into 16-bit samples. A trailing odd byte is dropped.
pub fn decode_pcm16(data: &str) -> Result<Vec<i16>, BridgeError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| BridgeError::protocol(format!("Invalid base64 audio payload: {}", e)))?;

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Mean absolute amplitude scaled by `gain` and capped at 100.
pub fn volume_level(samples: &[f32], gain: f32) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s.abs()).sum();
    ((sum / samples.len() as f32) * gain).min(100.0)
}

/// Average interleaved channels down to mono.
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear-interpolation resampler for device rates that differ from the
/// session rates.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).floor() as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos.floor() as usize;
            let frac = (pos - idx as f64) as f32;
            let a = samples[idx.min(last)];
            let b = samples[(idx + 1).min(last)];
            a + (b - a) * frac
        })
        .collect()
}

/// Wrap mono 16-bit PCM in a RIFF/WAVE container.
pub fn pcm_to_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).context("Failed to create WAV writer")?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .context("Failed to write sample to WAV")?;
        }
        writer.finalize().context("Failed to finalize WAV data")?;
    }

    Ok(cursor.into_inner())
}
