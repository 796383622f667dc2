//! Windowed RMS energy detector.
//!
//! Classifies fixed-size analysis windows as speech or silence by RMS
//! energy and assembles contiguous speech runs into [`SpeechSegment`]s.
//! All durations are derived from sample positions, so segmentation is
//! deterministic for a given input regardless of wall-clock timing.

use crate::vad::{DetectorConfig, SpeechSegment, VoiceActivityDetector};
use std::collections::VecDeque;

/// An in-flight speech run.
struct Run {
    /// Absolute offset of the run's first sample.
    start: u64,
    /// Accumulated samples, including any trailing silence windows that
    /// have not yet finalized the run.
    samples: Vec<f32>,
    /// Length up to the end of the last speech-classified window.
    speech_len: usize,
    /// Trailing silence sample count.
    silence_len: usize,
}

/// RMS-energy voice activity detector implementing the engine contract.
pub struct EnergyDetector {
    config: DetectorConfig,
    window_samples: usize,
    min_speech_samples: usize,
    min_silence_samples: usize,
    /// Partial window carried between accept_waveform calls.
    pending: Vec<f32>,
    /// Absolute offset of the next window's first sample.
    position: u64,
    run: Option<Run>,
    queue: VecDeque<SpeechSegment>,
}

impl EnergyDetector {
    /// Creates a detector with the given configuration.
    pub fn new(config: DetectorConfig) -> Self {
        let window_samples = config.window_samples();
        Self {
            window_samples,
            min_speech_samples: config.min_speech_samples(),
            min_silence_samples: config.min_silence_samples(),
            pending: Vec::with_capacity(window_samples * 2),
            position: 0,
            run: None,
            queue: VecDeque::new(),
            config,
        }
    }

    /// The configuration this detector was built with.
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    fn classify(&self, window: &[f32]) -> bool {
        rms(window) > self.config.threshold
    }

    fn process_window(&mut self, window: &[f32], is_speech: bool) {
        let window_start = self.position;
        self.position += window.len() as u64;

        if is_speech {
            let mut run = self.run.take().unwrap_or_else(|| Run {
                start: window_start,
                samples: Vec::new(),
                speech_len: 0,
                silence_len: 0,
            });
            run.samples.extend_from_slice(window);
            run.speech_len = run.samples.len();
            run.silence_len = 0;
            self.run = Some(run);
            return;
        }

        // Silence window: only meaningful while a run is in flight.
        if let Some(mut run) = self.run.take() {
            run.samples.extend_from_slice(window);
            run.silence_len += window.len();
            if run.silence_len >= self.min_silence_samples {
                self.emit_run(run, false);
            } else {
                self.run = Some(run);
            }
        }
    }

    /// Close the in-flight run, if any.
    fn finalize_run(&mut self, force: bool) {
        if let Some(run) = self.run.take() {
            self.emit_run(run, force);
        }
    }

    /// Queue a run as a segment, trimming trailing silence. Runs shorter
    /// than the minimum speech duration are discarded unless forced.
    fn emit_run(&mut self, mut run: Run, force: bool) {
        run.samples.truncate(run.speech_len);
        if !run.samples.is_empty() && (force || run.samples.len() >= self.min_speech_samples) {
            self.queue.push_back(SpeechSegment {
                start: run.start,
                samples: run.samples,
            });
        }
    }
}

impl VoiceActivityDetector for EnergyDetector {
    fn accept_waveform(&mut self, samples: &[f32]) {
        self.pending.extend_from_slice(samples);

        while self.pending.len() >= self.window_samples {
            let window: Vec<f32> = self.pending.drain(..self.window_samples).collect();
            let is_speech = self.classify(&window);
            self.process_window(&window, is_speech);
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

    fn flush(&mut self) {
        // Treat the carried partial window as a final window of its own.
        if !self.pending.is_empty() {
            let window: Vec<f32> = self.pending.drain(..).collect();
            let is_speech = self.classify(&window);
            self.process_window(&window, is_speech);
        }
        self.finalize_run(true);
    }

    fn clear(&mut self) {
        self.pending.clear();
        self.position = 0;
        self.run = None;
        self.queue.clear();
    }
}

/// Root mean square of normalized samples.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}
