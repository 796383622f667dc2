//! Error types for memovox.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemovoxError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Engine lifecycle errors
    #[error("Failed to initialize {engine} engine: {message}")]
    EngineInit { engine: String, message: String },

    // Audio capture errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // Recognition errors
    #[error("Recognition decode failed: {message}")]
    Decode { message: String },

    // Diarization errors
    #[error("Speaker diarization failed: {message}")]
    Diarization { message: String },

    // Storage errors
    #[error("Storage operation failed: {message}")]
    Storage { message: String },

    // Session lifecycle errors
    #[error("Session error: {message}")]
    Session { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl MemovoxError {
    /// True for failures that abort the session attempt and require explicit
    /// acknowledgement before a new session can start.
    ///
    /// Per-batch failures (decode, diarization) are never session-fatal.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            MemovoxError::EngineInit { .. }
                | MemovoxError::AudioDeviceNotFound { .. }
                | MemovoxError::AudioCapture { .. }
        )
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, MemovoxError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_engine_init_display() {
        let error = MemovoxError::EngineInit {
            engine: "recognition".to_string(),
            message: "model file missing".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to initialize recognition engine: model file missing"
        );
    }

    #[test]
    fn test_audio_device_not_found_display() {
        let error = MemovoxError::AudioDeviceNotFound {
            device: "default".to_string(),
        };
        assert_eq!(error.to_string(), "Audio device not found: default");
    }

    #[test]
    fn test_audio_capture_display() {
        let error = MemovoxError::AudioCapture {
            message: "read returned no data".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Audio capture failed: read returned no data"
        );
    }

    #[test]
    fn test_decode_display() {
        let error = MemovoxError::Decode {
            message: "malformed result".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Recognition decode failed: malformed result"
        );
    }

    #[test]
    fn test_diarization_display() {
        let error = MemovoxError::Diarization {
            message: "embedding extraction failed".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Speaker diarization failed: embedding extraction failed"
        );
    }

    #[test]
    fn test_session_display() {
        let error = MemovoxError::Session {
            message: "already recording".to_string(),
        };
        assert_eq!(error.to_string(), "Session error: already recording");
    }

    #[test]
    fn test_config_invalid_value_display() {
        let error = MemovoxError::ConfigInvalidValue {
            key: "audio.sample_rate".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for audio.sample_rate: must be positive"
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(MemovoxError::EngineInit {
            engine: "vad".into(),
            message: "x".into()
        }
        .is_session_fatal());
        assert!(MemovoxError::AudioCapture { message: "x".into() }.is_session_fatal());
        assert!(!MemovoxError::Decode { message: "x".into() }.is_session_fatal());
        assert!(!MemovoxError::Diarization { message: "x".into() }.is_session_fatal());
        assert!(!MemovoxError::Storage { message: "x".into() }.is_session_fatal());
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: MemovoxError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_error = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let error: MemovoxError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<MemovoxError>();
        assert_sync::<MemovoxError>();
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);
    }
}
