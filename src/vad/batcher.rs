//! The voice-activity buffer: accumulates detected speech into batches
//! large enough for reliable recognition.

use crate::vad::VoiceActivityDetector;

/// A dispatch unit of accumulated speech, ready for recognition.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechBatch {
    /// Concatenated speech samples in temporal order.
    pub samples: Vec<f32>,
    /// Batch sequence number within the session.
    pub sequence: u64,
}

impl SpeechBatch {
    /// Batch duration in seconds at the given sample rate.
    pub fn duration_secs(&self, sample_rate: u32) -> f32 {
        self.samples.len() as f32 / sample_rate as f32
    }
}

/// Converts a chunk stream into discrete recognition batches.
///
/// Each incoming chunk is fed to the detector; completed speech segments
/// are drained into the accumulation buffer, and the entire buffer is
/// detached as one batch once it reaches the minimum batch duration.
/// Recognition engines hallucinate on fragments, so under-threshold audio
/// keeps accumulating until [`flush`] forces it out at session end.
///
/// The batcher is single-owner state: it lives on the batching worker and
/// is never shared between threads, so no lock guards it.
///
/// [`flush`]: SpeechBatcher::flush
pub struct SpeechBatcher {
    detector: Box<dyn VoiceActivityDetector>,
    accumulation: Vec<f32>,
    min_batch_samples: usize,
    /// Samples the detector has classified as speech since the last reset.
    speech_samples: u64,
    /// Samples handed out in dispatched batches since the last reset.
    dispatched_samples: u64,
    sequence: u64,
}

impl SpeechBatcher {
    /// Creates a batcher around the given detector.
    ///
    /// `min_batch_samples` is the dispatch threshold; a value of
    /// `sample_rate * min_batch_secs` gives the configured duration floor.
    pub fn new(detector: Box<dyn VoiceActivityDetector>, min_batch_samples: usize) -> Self {
        Self {
            detector,
            accumulation: Vec::with_capacity(Self::reserve_hint(min_batch_samples)),
            min_batch_samples,
            speech_samples: 0,
            dispatched_samples: 0,
            sequence: 0,
        }
    }

    /// Pre-allocation hint: two batches' worth, capped so pathological
    /// thresholds don't reserve unbounded memory up front.
    fn reserve_hint(min_batch_samples: usize) -> usize {
        min_batch_samples.saturating_mul(2).min(1 << 21)
    }

    /// Feed one chunk of captured audio.
    ///
    /// Returns a batch when the accumulated speech crosses the dispatch
    /// threshold, None while still accumulating.
    pub fn push_chunk(&mut self, samples: &[f32]) -> Option<SpeechBatch> {
        self.detector.accept_waveform(samples);
        self.drain_segments();

        if self.accumulation.len() >= self.min_batch_samples {
            Some(self.detach())
        } else {
            None
        }
    }

    /// Signal end of audio: finalize the detector's in-flight segment and
    /// dispatch whatever remains, even below the threshold.
    ///
    /// A second flush with no intervening audio is a no-op.
    pub fn flush(&mut self) -> Option<SpeechBatch> {
        self.detector.flush();
        self.drain_segments();

        if self.accumulation.is_empty() {
            None
        } else {
            Some(self.detach())
        }
    }

    /// Discard the buffer and the detector's internal state.
    ///
    /// Used when starting a new session.
    pub fn reset(&mut self) {
        self.detector.clear();
        self.accumulation.clear();
        self.speech_samples = 0;
        self.dispatched_samples = 0;
        self.sequence = 0;
    }

    /// Samples currently held in the accumulation buffer.
    pub fn accumulated_samples(&self) -> usize {
        self.accumulation.len()
    }

    /// Total samples the detector classified as speech since the last reset.
    pub fn speech_sample_count(&self) -> u64 {
        self.speech_samples
    }

    /// Total samples dispatched in batches since the last reset.
    pub fn dispatched_sample_count(&self) -> u64 {
        self.dispatched_samples
    }

    fn drain_segments(&mut self) {
        while let Some(segment) = self.detector.pop() {
            self.speech_samples += segment.samples.len() as u64;
            self.accumulation.extend_from_slice(&segment.samples);
        }
    }

    /// Detach the entire buffer as one dispatch unit and reset it to empty.
    fn detach(&mut self) -> SpeechBatch {
        let samples = std::mem::take(&mut self.accumulation);
        self.accumulation.reserve(Self::reserve_hint(self.min_batch_samples));
        self.dispatched_samples += samples.len() as u64;
        let batch = SpeechBatch {
            samples,
            sequence: self.sequence,
        };
        self.sequence += 1;
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vad::{DetectorConfig, EnergyDetector, MockDetector};

    const CHUNK: usize = 1600; // 100ms at 16kHz
    const MIN_BATCH: usize = 32000; // 2.0s at 16kHz

    fn passthrough_batcher() -> SpeechBatcher {
        SpeechBatcher::new(Box::new(MockDetector::passthrough()), MIN_BATCH)
    }

    #[test]
    fn test_twenty_one_chunks_dispatch_after_twenty() {
        // 21 chunks of 100ms, all speech, 2.0s threshold: exactly one
        // automatic dispatch after chunk 20, carrying chunks 1-20;
        // chunk 21 stays buffered.
        let mut batcher = passthrough_batcher();

        let mut dispatches = Vec::new();
        for i in 0..21 {
            let chunk = vec![(i + 1) as f32 / 100.0; CHUNK];
            if let Some(batch) = batcher.push_chunk(&chunk) {
                dispatches.push((i, batch));
            }
        }

        assert_eq!(dispatches.len(), 1);
        let (chunk_index, batch) = &dispatches[0];
        assert_eq!(*chunk_index, 19); // zero-based: the 20th chunk
        assert_eq!(batch.samples.len(), 20 * CHUNK);
        // First and last samples come from chunks 1 and 20 respectively
        assert!((batch.samples[0] - 0.01).abs() < 1e-6);
        assert!((batch.samples[batch.samples.len() - 1] - 0.20).abs() < 1e-6);

        assert_eq!(batcher.accumulated_samples(), CHUNK);
    }

    #[test]
    fn test_flush_dispatches_under_threshold() {
        // 1.5s accumulated, 2.0s threshold: flush dispatches it anyway
        let mut batcher = passthrough_batcher();

        for _ in 0..15 {
            assert!(batcher.push_chunk(&vec![0.1; CHUNK]).is_none());
        }

        let batch = batcher.flush().expect("flush should dispatch remainder");
        assert_eq!(batch.samples.len(), 15 * CHUNK);
    }

    #[test]
    fn test_double_flush_second_is_noop() {
        let mut batcher = passthrough_batcher();
        batcher.push_chunk(&vec![0.1; CHUNK]);

        assert!(batcher.flush().is_some());
        assert!(batcher.flush().is_none());
    }

    #[test]
    fn test_silence_only_never_dispatches() {
        let mut batcher = SpeechBatcher::new(Box::new(MockDetector::silence()), MIN_BATCH);

        for _ in 0..50 {
            assert!(batcher.push_chunk(&vec![0.0; CHUNK]).is_none());
        }
        assert!(batcher.flush().is_none());
        assert_eq!(batcher.speech_sample_count(), 0);
    }

    #[test]
    fn test_sample_conservation_invariant() {
        // speech_samples == dispatched + buffered at every step
        let mut batcher = passthrough_batcher();

        for i in 0..55 {
            let len = if i % 3 == 0 { CHUNK } else { CHUNK / 2 };
            batcher.push_chunk(&vec![0.1; len]);
            assert_eq!(
                batcher.speech_sample_count(),
                batcher.dispatched_sample_count() + batcher.accumulated_samples() as u64,
            );
        }

        batcher.flush();
        assert_eq!(batcher.accumulated_samples(), 0);
        assert_eq!(
            batcher.speech_sample_count(),
            batcher.dispatched_sample_count()
        );
    }

    #[test]
    fn test_batch_sequence_numbers_increment() {
        let mut batcher = passthrough_batcher();

        let mut sequences = Vec::new();
        for _ in 0..45 {
            if let Some(batch) = batcher.push_chunk(&vec![0.1; CHUNK]) {
                sequences.push(batch.sequence);
            }
        }
        if let Some(batch) = batcher.flush() {
            sequences.push(batch.sequence);
        }

        assert_eq!(sequences, vec![0, 1, 2]);
    }

    #[test]
    fn test_reset_clears_buffer_and_counters() {
        let mut batcher = passthrough_batcher();
        batcher.push_chunk(&vec![0.1; CHUNK]);
        assert!(batcher.accumulated_samples() > 0);

        batcher.reset();
        assert_eq!(batcher.accumulated_samples(), 0);
        assert_eq!(batcher.speech_sample_count(), 0);
        assert_eq!(batcher.dispatched_sample_count(), 0);
        assert!(batcher.flush().is_none());

        // Sequence numbering restarts
        for _ in 0..20 {
            if let Some(batch) = batcher.push_chunk(&vec![0.1; CHUNK]) {
                assert_eq!(batch.sequence, 0);
            }
        }
    }

    #[test]
    fn test_with_energy_detector_filters_silence() {
        // Real detector: speech bursts separated by long silence; only the
        // speech reaches the buffer.
        let config = DetectorConfig {
            threshold: 0.02,
            min_speech_ms: 30,
            min_silence_ms: 20,
            window_ms: 10,
            sample_rate: 16000,
        };
        let mut batcher = SpeechBatcher::new(Box::new(EnergyDetector::new(config)), MIN_BATCH);

        batcher.push_chunk(&vec![0.3; CHUNK]); // speech
        batcher.push_chunk(&vec![0.0; CHUNK]); // silence finalizes the run
        batcher.push_chunk(&vec![0.0; CHUNK]);

        let batch = batcher.flush().expect("speech was accumulated");
        assert_eq!(batch.samples.len(), CHUNK);
        assert_eq!(batcher.speech_sample_count(), CHUNK as u64);
    }

    #[test]
    fn test_oversized_segment_dispatches_whole_buffer() {
        // A single segment larger than the threshold goes out in one batch
        let mut batcher = passthrough_batcher();
        let batch = batcher
            .push_chunk(&vec![0.1; MIN_BATCH + CHUNK])
            .expect("should dispatch immediately");
        assert_eq!(batch.samples.len(), MIN_BATCH + CHUNK);
        assert_eq!(batcher.accumulated_samples(), 0);
    }
}
