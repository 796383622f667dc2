use crate::defaults;
use crate::error::{MemovoxError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub vad: VadConfig,
    pub batch: BatchConfig,
    pub text: TextConfig,
    pub session: SessionConfig,
    pub diarization: DiarizationConfig,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
    pub chunk_ms: u32,
    /// Directory the session waveform is exported to as WAV, if set.
    pub export_dir: Option<PathBuf>,
}

/// Voice activity detection configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VadConfig {
    pub threshold: f32,
    pub min_speech_ms: u32,
    pub min_silence_ms: u32,
    pub window_ms: u32,
}

/// Speech batching configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchConfig {
    pub min_batch_secs: f32,
}

/// Transcript text normalization configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TextConfig {
    /// Enables the optional language-specific normalization stage.
    pub language_normalization: bool,
    /// Tokens removed verbatim by the language stage.
    pub special_tokens: Vec<String>,
}

/// Session lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub default_name: String,
    /// Wall-clock cap on the anti-idle guard, in seconds.
    pub idle_inhibit_cap_secs: u64,
}

/// Speaker diarization configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiarizationConfig {
    pub enabled: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
            chunk_ms: defaults::CHUNK_MS,
            export_dir: None,
        }
    }
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold: defaults::VAD_THRESHOLD,
            min_speech_ms: defaults::MIN_SPEECH_MS,
            min_silence_ms: defaults::MIN_SILENCE_MS,
            window_ms: defaults::VAD_WINDOW_MS,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            min_batch_secs: defaults::MIN_BATCH_SECS,
        }
    }
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            language_normalization: true,
            special_tokens: defaults::SPECIAL_TOKENS
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_name: defaults::DEFAULT_SESSION_NAME.to_string(),
            idle_inhibit_cap_secs: defaults::IDLE_INHIBIT_CAP_SECS,
        }
    }
}

impl Default for DiarizationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Missing fields use default values; invalid TOML is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MemovoxError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                MemovoxError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, or return defaults if it doesn't exist.
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(MemovoxError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Supported environment variables:
    /// - MEMOVOX_AUDIO_DEVICE → audio.device
    /// - MEMOVOX_MIN_BATCH_SECS → batch.min_batch_secs
    /// - MEMOVOX_DIARIZATION → diarization.enabled ("0"/"false" disables)
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(device) = std::env::var("MEMOVOX_AUDIO_DEVICE") {
            if !device.is_empty() {
                self.audio.device = Some(device);
            }
        }

        if let Ok(secs) = std::env::var("MEMOVOX_MIN_BATCH_SECS") {
            if let Ok(parsed) = secs.parse::<f32>() {
                self.batch.min_batch_secs = parsed;
            }
        }

        if let Ok(flag) = std::env::var("MEMOVOX_DIARIZATION") {
            if !flag.is_empty() {
                self.diarization.enabled = !matches!(flag.as_str(), "0" | "false" | "off");
            }
        }

        self
    }

    /// Check configuration values for internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(MemovoxError::ConfigInvalidValue {
                key: "audio.sample_rate".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.audio.chunk_ms == 0 {
            return Err(MemovoxError::ConfigInvalidValue {
                key: "audio.chunk_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.vad.threshold) {
            return Err(MemovoxError::ConfigInvalidValue {
                key: "vad.threshold".to_string(),
                message: "must be within [0.0, 1.0]".to_string(),
            });
        }
        if self.vad.window_ms == 0 {
            return Err(MemovoxError::ConfigInvalidValue {
                key: "vad.window_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.batch.min_batch_secs <= 0.0 {
            return Err(MemovoxError::ConfigInvalidValue {
                key: "batch.min_batch_secs".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Number of samples in one capture chunk at the configured format.
    pub fn chunk_samples(&self) -> usize {
        (self.audio.sample_rate as usize * self.audio.chunk_ms as usize) / 1000
    }

    /// Minimum batch size in samples at the configured format.
    pub fn min_batch_samples(&self) -> usize {
        (self.batch.min_batch_secs * self.audio.sample_rate as f32) as usize
    }
}
