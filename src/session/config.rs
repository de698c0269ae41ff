use serde::{Deserialize, Serialize};

use crate::audio::AudioBackendConfig;
use crate::config::Config;
use crate::live::Setup;

/// Configuration for one speaking session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Unique session identifier (e.g., "speaking-6f1c...")
    pub session_id: String,

    /// Microphone audio sent to the model (Live API expects 16kHz)
    pub input_sample_rate: u32,

    /// Model audio played back (Live API produces 24kHz)
    pub output_sample_rate: u32,

    /// Samples per outbound frame
    pub frame_size: usize,

    /// Volume meter multiplier
    pub volume_gain: f32,

    pub model: String,
    pub voice: String,
    pub system_instruction: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for BridgeConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            session_id: format!("speaking-{}", uuid::Uuid::new_v4()),
            input_sample_rate: cfg.audio.input_sample_rate,
            output_sample_rate: cfg.audio.output_sample_rate,
            frame_size: cfg.audio.frame_size,
            volume_gain: cfg.audio.volume_gain,
            model: cfg.live.model.clone(),
            voice: cfg.live.voice.clone(),
            system_instruction: cfg.live.system_instruction.clone(),
        }
    }
}

impl BridgeConfig {
    /// Setup message opening the Live session
    pub fn setup(&self) -> Setup {
        Setup::audio(&self.model, &self.voice, &self.system_instruction)
    }

    /// Capture settings for the microphone backend
    pub fn capture(&self) -> AudioBackendConfig {
        AudioBackendConfig {
            target_sample_rate: self.input_sample_rate,
            frame_size: self.frame_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let mut cfg = Config::default();
        cfg.live.voice = "Puck".to_string();
        cfg.audio.frame_size = 1024;

        let bridge = BridgeConfig::from(&cfg);
        assert!(bridge.session_id.starts_with("speaking-"));
        assert_eq!(bridge.voice, "Puck");
        assert_eq!(bridge.capture().frame_size, 1024);
        assert_eq!(bridge.capture().target_sample_rate, 16000);
        assert_eq!(bridge.setup().model, cfg.live.model);
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(BridgeConfig::default().session_id, BridgeConfig::default().session_id);
    }
}
