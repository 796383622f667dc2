//! Audio capture: device sources, fixed-size chunk assembly, the capture
//! thread, and WAV helpers.

pub mod capture;
pub mod chunk;
pub mod engine;
pub mod wav;

pub use capture::{CaptureSource, MockCaptureSource};
#[cfg(feature = "cpal-audio")]
pub use capture::{list_devices, CpalCaptureSource};
pub use chunk::{AudioChunk, ChunkAssembler, WaveformSummary};
pub use engine::{spawn_capture, CaptureHandle, CaptureOptions, CaptureOutcome};
