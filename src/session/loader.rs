//! Engine loading seam for the session orchestrator.
//!
//! Engines are loaded during `Idle → Initializing`, owned by the
//! orchestrator, and torn down with it — never process-global singletons.

use crate::diarize::DiarizationEngine;
use crate::error::{MemovoxError, Result};
use crate::stt::engine::RecognitionEngine;
use crate::vad::VoiceActivityDetector;
use std::sync::Arc;

/// Loads the three acoustic engines.
///
/// A loader failure is an initialization failure: fatal for the session
/// attempt, surfaced, never silently retried.
pub trait EngineLoader: Send {
    /// Load the speech recognition engine.
    fn load_recognizer(&mut self) -> Result<Arc<dyn RecognitionEngine>>;

    /// Load the voice activity detector.
    fn load_detector(&mut self) -> Result<Box<dyn VoiceActivityDetector>>;

    /// Load the diarization engine, or None if unavailable on this device.
    fn load_diarizer(&mut self) -> Result<Option<Arc<dyn DiarizationEngine>>>;
}

/// Loader over engines constructed up front.
///
/// Useful for embeddings that build their engines elsewhere, and for tests
/// with mock engines. Supports scripted per-engine failures.
pub struct StaticLoader {
    recognizer: Arc<dyn RecognitionEngine>,
    detector: Option<Box<dyn VoiceActivityDetector>>,
    diarizer: Option<Arc<dyn DiarizationEngine>>,
    fail_engine: Option<String>,
}

impl StaticLoader {
    /// Create a loader over the given recognizer and detector.
    pub fn new(
        recognizer: Arc<dyn RecognitionEngine>,
        detector: Box<dyn VoiceActivityDetector>,
    ) -> Self {
        Self {
            recognizer,
            detector: Some(detector),
            diarizer: None,
            fail_engine: None,
        }
    }

    /// Add a diarization engine.
    pub fn with_diarizer(mut self, diarizer: Arc<dyn DiarizationEngine>) -> Self {
        self.diarizer = Some(diarizer);
        self
    }

    /// Script a load failure for the named engine
    /// ("recognition", "voice-activity" or "diarization").
    pub fn with_failure(mut self, engine: &str) -> Self {
        self.fail_engine = Some(engine.to_string());
        self
    }

    fn check_failure(&self, engine: &str) -> Result<()> {
        if self.fail_engine.as_deref() == Some(engine) {
            return Err(MemovoxError::EngineInit {
                engine: engine.to_string(),
                message: "scripted load failure".to_string(),
            });
        }
        Ok(())
    }
}

impl EngineLoader for StaticLoader {
    fn load_recognizer(&mut self) -> Result<Arc<dyn RecognitionEngine>> {
        self.check_failure("recognition")?;
        Ok(self.recognizer.clone())
    }

    fn load_detector(&mut self) -> Result<Box<dyn VoiceActivityDetector>> {
        self.check_failure("voice-activity")?;
        self.detector.take().ok_or_else(|| MemovoxError::EngineInit {
            engine: "voice-activity".to_string(),
            message: "detector already taken by a previous initialization".to_string(),
        })
    }

    fn load_diarizer(&mut self) -> Result<Option<Arc<dyn DiarizationEngine>>> {
        self.check_failure("diarization")?;
        Ok(self.diarizer.clone())
    }
}
