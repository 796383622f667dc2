//! Voice activity detection: the black-box detector contract, a built-in
//! energy detector, and the speech batcher that feeds the recognizer.

pub mod batcher;
pub mod energy;

pub use batcher::{SpeechBatch, SpeechBatcher};
pub use energy::EnergyDetector;

use crate::defaults;
use std::collections::VecDeque;

/// A contiguous run of samples the detector classified as speech.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechSegment {
    /// Offset of the first sample, counted from the last detector reset.
    pub start: u64,
    /// The speech samples.
    pub samples: Vec<f32>,
}

impl SpeechSegment {
    /// Segment duration in seconds at the given sample rate.
    pub fn duration_secs(&self, sample_rate: u32) -> f32 {
        self.samples.len() as f32 / sample_rate as f32
    }
}

/// Configuration for a voice activity detector.
#[derive(Debug, Clone, Copy)]
pub struct DetectorConfig {
    /// RMS threshold for classifying a window as speech (0.0 to 1.0).
    pub threshold: f32,
    /// Minimum speech run duration before a segment is valid (milliseconds).
    pub min_speech_ms: u32,
    /// Silence duration that finalizes an in-flight run (milliseconds).
    pub min_silence_ms: u32,
    /// Analysis window duration (milliseconds).
    pub window_ms: u32,
    /// Sample rate the durations are interpreted against.
    pub sample_rate: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: defaults::VAD_THRESHOLD,
            min_speech_ms: defaults::MIN_SPEECH_MS,
            min_silence_ms: defaults::MIN_SILENCE_MS,
            window_ms: defaults::VAD_WINDOW_MS,
            sample_rate: defaults::SAMPLE_RATE,
        }
    }
}

impl DetectorConfig {
    pub(crate) fn window_samples(&self) -> usize {
        ((self.sample_rate as u64 * self.window_ms as u64) / 1000).max(1) as usize
    }

    pub(crate) fn min_speech_samples(&self) -> usize {
        ((self.sample_rate as u64 * self.min_speech_ms as u64) / 1000) as usize
    }

    pub(crate) fn min_silence_samples(&self) -> usize {
        ((self.sample_rate as u64 * self.min_silence_ms as u64) / 1000) as usize
    }
}

/// The voice-activity engine contract.
///
/// Implementations accumulate audio via [`accept_waveform`], internally
/// splitting it into speech segments bounded by the configured minimum
/// speech and silence durations. Completed segments queue up and are
/// consumed with [`front`]/[`pop`]. [`flush`] signals that no more audio is
/// coming and finalizes any in-flight segment; [`clear`] discards all state.
///
/// [`accept_waveform`]: VoiceActivityDetector::accept_waveform
/// [`front`]: VoiceActivityDetector::front
/// [`pop`]: VoiceActivityDetector::pop
/// [`flush`]: VoiceActivityDetector::flush
/// [`clear`]: VoiceActivityDetector::clear
pub trait VoiceActivityDetector: Send {
    /// Feed normalized samples to the detector.
    fn accept_waveform(&mut self, samples: &[f32]);

    /// True if no completed segment is waiting.
    fn is_empty(&self) -> bool;

    /// The oldest completed segment, if any.
    fn front(&self) -> Option<&SpeechSegment>;

    /// Remove and return the oldest completed segment.
    fn pop(&mut self) -> Option<SpeechSegment>;

    /// Signal end of audio: finalize any in-flight speech run regardless of
    /// the minimum speech duration.
    fn flush(&mut self);

    /// Discard queued segments and all internal state.
    fn clear(&mut self);
}

/// Scriptable detector for testing the batching pipeline.
///
/// In passthrough mode every accepted waveform immediately completes as one
/// segment (everything is speech); in silence mode nothing ever does.
#[derive(Debug, Default)]
pub struct MockDetector {
    queue: VecDeque<SpeechSegment>,
    offset: u64,
    silent: bool,
}

impl MockDetector {
    /// A detector that classifies every sample as speech, completing one
    /// segment per accepted waveform.
    pub fn passthrough() -> Self {
        Self {
            queue: VecDeque::new(),
            offset: 0,
            silent: false,
        }
    }

    /// A detector that never detects speech.
    pub fn silence() -> Self {
        Self {
            queue: VecDeque::new(),
            offset: 0,
            silent: true,
        }
    }
}

impl VoiceActivityDetector for MockDetector {
    fn accept_waveform(&mut self, samples: &[f32]) {
        let start = self.offset;
        self.offset += samples.len() as u64;
        if !self.silent && !samples.is_empty() {
            self.queue.push_back(SpeechSegment {
                start,
                samples: samples.to_vec(),
            });
        }
    }

    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn front(&self) -> Option<&SpeechSegment> {
        self.queue.front()
    }

    fn pop(&mut self) -> Option<SpeechSegment> {
        self.queue.pop_front()
    }

    fn flush(&mut self) {}

    fn clear(&mut self) {
        self.queue.clear();
        self.offset = 0;
    }
}
