//! Default configuration constants for memovox.
//!
//! This module provides shared constants used across different configuration
//! types to ensure consistency and eliminate duplication.

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and provides a good balance
/// between quality and computational efficiency for voice applications.
pub const SAMPLE_RATE: u32 = 16000;

/// Nominal capture chunk duration in milliseconds.
///
/// The capture engine emits fixed-duration chunks on this cadence. 100ms is
/// short enough for responsive waveform feedback while keeping per-chunk
/// overhead negligible.
pub const CHUNK_MS: u32 = 100;

/// Number of buckets in the live waveform summary.
pub const WAVEFORM_BUCKETS: usize = 32;

/// Gain factor applied to waveform summary buckets before clamping to [0, 1].
///
/// Typical speech peaks well below full scale; the boost makes the live
/// meter visually useful. Feedback only, no correctness obligation.
pub const WAVEFORM_GAIN: f32 = 2.5;

/// Default RMS energy threshold for speech detection (0.0 to 1.0).
///
/// Tuned for typical microphone input levels: sensitive enough for quiet
/// speakers while rejecting ambient room noise.
pub const VAD_THRESHOLD: f32 = 0.02;

/// Minimum speech run duration in milliseconds before a segment is valid.
///
/// Shorter bursts of energy (keyboard clicks, coughs) are discarded.
pub const MIN_SPEECH_MS: u32 = 250;

/// Silence duration in milliseconds that finalizes an in-flight speech run.
pub const MIN_SILENCE_MS: u32 = 500;

/// Analysis window duration for the energy detector, in milliseconds.
pub const VAD_WINDOW_MS: u32 = 32;

/// Minimum accumulated speech duration in seconds before a batch is
/// dispatched to the recognizer.
///
/// Recognition engines hallucinate on very short inputs; batching trades
/// first-result latency for accuracy. The final flush ignores this floor.
pub const MIN_BATCH_SECS: f32 = 2.0;

/// Hard cap on the anti-idle guard's lifetime, in seconds.
///
/// Last-resort safety net against a runaway session keeping the device
/// awake indefinitely. Four hours comfortably exceeds any realistic memo.
pub const IDLE_INHIBIT_CAP_SECS: u64 = 4 * 60 * 60;

/// Capture thread poll interval in milliseconds.
pub const CAPTURE_POLL_INTERVAL_MS: u64 = 16;

/// Consecutive device read failures tolerated before the capture loop
/// gives up and surfaces a capture error.
pub const MAX_CONSECUTIVE_READ_ERRORS: u32 = 10;

/// Name given to a session before the user renames it.
pub const DEFAULT_SESSION_NAME: &str = "New recording";

/// Model-internal tokens that recognition engines occasionally leak into
/// their text output. Removed verbatim by the language normalization stage.
pub const SPECIAL_TOKENS: &[&str] = &["<unk>", "<s>", "</s>", "<|endoftext|>", "<pad>"];

/// Number of samples in one nominal capture chunk.
pub const fn chunk_samples() -> usize {
    (SAMPLE_RATE as usize * CHUNK_MS as usize) / 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_samples_matches_nominal_duration() {
        // 16kHz * 100ms = 1600 samples
        assert_eq!(chunk_samples(), 1600);
    }

    #[test]
    fn min_batch_covers_multiple_chunks() {
        let chunks_per_batch = (MIN_BATCH_SECS * 1000.0) as u32 / CHUNK_MS;
        assert_eq!(chunks_per_batch, 20);
    }
}
