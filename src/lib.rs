//! memovox - offline voice-memo transcription with speaker attribution.
//!
//! A streaming audio pipeline for resource-constrained devices: continuous
//! microphone capture, voice-activity-driven segmentation, adaptive
//! batching into an offline recognition engine, and a post-session
//! diarization pass that attributes transcript segments to speakers.
//! All inference is local; the acoustic engines are consumed through
//! narrow black-box contracts.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod config;
pub mod defaults;
pub mod diarize;
pub mod error;
pub mod session;
pub mod storage;
pub mod stt;
pub mod text;
pub mod transcript;
pub mod vad;

// Core seams (capture → detect → batch → recognize → normalize → diarize)
pub use audio::capture::{CaptureSource, MockCaptureSource};
pub use diarize::{DiarizationEngine, DiarizedInterval, MockDiarizer};
pub use stt::engine::{MockRecognizer, RecognitionEngine, RecognitionStream};
pub use vad::{EnergyDetector, MockDetector, SpeechBatcher, VoiceActivityDetector};

// Session orchestration
pub use session::{
    EngineLoader, IdleInhibitor, SessionEvent, SessionOrchestrator, SessionPhase, SessionState,
    StaticLoader,
};

// Transcript and storage
pub use storage::{MemoryStorage, RecordingRecord, StorageRepository};
pub use transcript::{TimeSpan, TranscriptSegment, UNASSIGNED_SPEAKER};

// Error handling
pub use error::{MemovoxError, Result};

// Config
pub use config::Config;
