use anyhow::Result;
use serde::Deserialize;

use crate::error::BridgeError;

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub gemini: GeminiConfig,
    pub live: LiveConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "panda-tutor".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Gemini REST settings used by the listening, reading and writing modes
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            text_model: "gemini-2.5-flash".to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
        }
    }
}

/// Gemini Live (speaking mode) session settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    pub url: String,
    pub model: String,
    pub voice: String,
    pub system_instruction: String,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            url: "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent".to_string(),
            model: "models/gemini-2.5-flash-native-audio-preview-09-2025".to_string(),
            voice: "Kore".to_string(),
            system_instruction: "You are a fun, energetic Chinese language tutor for kids named \"Panda Laoshi\". \
                Speak simple Chinese. Be encouraging. \
                Ask the child simple questions about their day or favorite animals."
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub input_sample_rate: u32,
    pub output_sample_rate: u32,
    pub frame_size: usize,
    /// Multiplier mapping mean absolute amplitude onto the 0-100 meter
    pub volume_gain: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: 16000,
            output_sample_rate: 24000,
            frame_size: 4096,
            volume_gain: 500.0,
        }
    }
}

impl Config {
    /// Load configuration from an optional file plus `PANDA_` environment overrides
    /// (e.g. `PANDA_SERVICE__HTTP__PORT=9000`).
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("PANDA")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let mut cfg: Config = settings.try_deserialize()?;

        if cfg.gemini.api_key.is_empty() {
            if let Ok(key) = std::env::var(API_KEY_ENV) {
                cfg.gemini.api_key = key;
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject audio settings the bridge cannot run with
    pub fn validate(&self) -> std::result::Result<(), BridgeError> {
        let audio = &self.audio;
        if audio.input_sample_rate == 0 || audio.output_sample_rate == 0 {
            return Err(BridgeError::config("sample rates must be non-zero"));
        }
        if audio.frame_size == 0 {
            return Err(BridgeError::config("audio.frame_size must be non-zero"));
        }
        if !audio.volume_gain.is_finite() || audio.volume_gain <= 0.0 {
            return Err(BridgeError::config(format!(
                "audio.volume_gain must be positive, got {}",
                audio.volume_gain
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_live_audio_formats() {
        let cfg = Config::default();
        assert_eq!(cfg.audio.input_sample_rate, 16000);
        assert_eq!(cfg.audio.output_sample_rate, 24000);
        assert_eq!(cfg.audio.frame_size, 4096);
        assert_eq!(cfg.live.voice, "Kore");
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        writeln!(file, "[service.http]\nport = 9001\n\n[audio]\nvolume_gain = 250.0")?;

        let path = file.path().to_string_lossy().to_string();
        let cfg = Config::load(&path)?;

        assert_eq!(cfg.service.http.port, 9001);
        assert_eq!(cfg.service.http.bind, "127.0.0.1");
        assert_eq!(cfg.audio.volume_gain, 250.0);
        assert_eq!(cfg.audio.frame_size, 4096);
        Ok(())
    }

    #[test]
    fn test_invalid_audio_settings_are_rejected() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        writeln!(file, "[audio]\nframe_size = 0")?;

        let path = file.path().to_string_lossy().to_string();
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("frame_size"));

        let mut cfg = Config::default();
        cfg.audio.output_sample_rate = 0;
        assert!(matches!(cfg.validate(), Err(BridgeError::Config(_))));
        assert!(Config::default().validate().is_ok());
        Ok(())
    }

    #[test]
    fn test_missing_file_is_not_an_error() -> Result<()> {
        let cfg = Config::load("/nonexistent/panda-tutor")?;
        assert_eq!(cfg.service.name, "panda-tutor");
        Ok(())
    }
}
