//! Post-session speaker diarization and transcript alignment.

use crate::error::{MemovoxError, Result};
use crate::transcript::{TimeSpan, TranscriptSegment};

/// One speaker-attributed interval of the session waveform.
///
/// `span` is half-open, in seconds from session start. Speaker ids are
/// non-negative and dense but carry no identity beyond the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiarizedInterval {
    pub speaker: i32,
    pub span: TimeSpan,
}

impl DiarizedInterval {
    /// Creates an interval for the given speaker.
    pub fn new(speaker: i32, start_secs: f32, end_secs: f32) -> Self {
        Self {
            speaker,
            span: TimeSpan::new(start_secs, end_secs),
        }
    }
}

/// The speaker diarization engine contract.
///
/// Processes the full session waveform in one shot, producing an unordered
/// set of speaker intervals with auto-detected speaker count.
pub trait DiarizationEngine: Send + Sync {
    /// Segment the waveform by speaker.
    fn process(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<DiarizedInterval>>;
}

/// Mock diarization engine for testing.
pub struct MockDiarizer {
    intervals: Vec<DiarizedInterval>,
    should_fail: bool,
    processed_lens: std::sync::Mutex<Vec<usize>>,
}

impl MockDiarizer {
    /// Create a mock returning the given intervals.
    pub fn new(intervals: Vec<DiarizedInterval>) -> Self {
        Self {
            intervals,
            should_fail: false,
            processed_lens: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Configure the mock to fail on process.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Sample counts of each waveform processed so far.
    pub fn processed_lens(&self) -> Vec<usize> {
        self.processed_lens.lock().unwrap().clone()
    }
}

impl DiarizationEngine for MockDiarizer {
    fn process(&self, samples: &[f32], _sample_rate: u32) -> Result<Vec<DiarizedInterval>> {
        if self.should_fail {
            return Err(MemovoxError::Diarization {
                message: "mock diarization failure".to_string(),
            });
        }
        self.processed_lens.lock().unwrap().push(samples.len());
        Ok(self.intervals.clone())
    }
}

/// Align transcript segments to diarized intervals.
///
/// Segments carry no recognition timestamps, so each segment's position is
/// estimated as `(index / count) * total_duration`. The interval containing
/// the estimate wins; if none does, the interval with the nearest edge.
/// Returns the fully rewritten sequence — callers replace their transcript
/// wholesale rather than patching in place.
///
/// The linear estimate misattributes speakers when segment durations are
/// uneven; that is a known limitation of the approach, kept as-is.
pub fn align_speakers(
    segments: &[TranscriptSegment],
    intervals: &[DiarizedInterval],
    total_duration_secs: f32,
) -> Vec<TranscriptSegment> {
    if intervals.is_empty() || segments.is_empty() {
        return segments.to_vec();
    }

    segments
        .iter()
        .enumerate()
        .map(|(index, segment)| {
            let estimate = (index as f32 / segments.len() as f32) * total_duration_secs;
            let interval = intervals
                .iter()
                .find(|iv| iv.span.contains(estimate))
                .or_else(|| {
                    intervals.iter().min_by(|a, b| {
                        a.span
                            .edge_distance(estimate)
                            .total_cmp(&b.span.edge_distance(estimate))
                    })
                });

            let mut aligned = segment.clone();
            if let Some(interval) = interval {
                aligned.speaker = interval.speaker;
                aligned.interval = Some(interval.span);
            }
            aligned
        })
        .collect()
}

/// Number of distinct attributed speakers in a transcript.
pub fn speaker_count(segments: &[TranscriptSegment]) -> usize {
    let mut speakers: Vec<i32> = segments
        .iter()
        .filter(|s| s.is_attributed())
        .map(|s| s.speaker)
        .collect();
    speakers.sort_unstable();
    speakers.dedup();
    speakers.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(count: usize) -> Vec<TranscriptSegment> {
        (0..count)
            .map(|i| TranscriptSegment::new(format!("segment {}", i)))
            .collect()
    }

    #[test]
    fn test_alignment_by_containment() {
        // Two speakers over a 6s session, three segments: estimates land at
        // 0s, 2s, 4s — first two inside speaker 0, third inside speaker 1.
        let intervals = vec![
            DiarizedInterval::new(0, 0.0, 3.0),
            DiarizedInterval::new(1, 3.0, 6.0),
        ];
        let aligned = align_speakers(&segments(3), &intervals, 6.0);

        assert_eq!(aligned[0].speaker, 0);
        assert_eq!(aligned[1].speaker, 0);
        assert_eq!(aligned[2].speaker, 1);
        assert_eq!(aligned[2].interval, Some(TimeSpan::new(3.0, 6.0)));
    }

    #[test]
    fn test_alignment_falls_back_to_nearest_edge() {
        // A gap between intervals: the estimate at 2s is outside both, and
        // closer to the second interval's start (2.5) than the first's end (1.0).
        let intervals = vec![
            DiarizedInterval::new(0, 0.0, 1.0),
            DiarizedInterval::new(1, 2.5, 4.0),
        ];
        let aligned = align_speakers(&segments(2), &intervals, 4.0);

        // Segment 0 estimate 0s: inside interval 0
        assert_eq!(aligned[0].speaker, 0);
        // Segment 1 estimate 2s: gap; nearest edge is interval 1's start
        assert_eq!(aligned[1].speaker, 1);
    }

    #[test]
    fn test_alignment_rewrites_all_segments() {
        let intervals = vec![DiarizedInterval::new(0, 0.0, 10.0)];
        let aligned = align_speakers(&segments(5), &intervals, 10.0);

        assert_eq!(aligned.len(), 5);
        assert!(aligned.iter().all(|s| s.speaker == 0));
        assert!(aligned.iter().all(|s| s.interval.is_some()));
        // Text untouched
        assert_eq!(aligned[3].text, "segment 3");
    }

    #[test]
    fn test_empty_intervals_leave_segments_unattributed() {
        let aligned = align_speakers(&segments(3), &[], 5.0);
        assert!(aligned.iter().all(|s| !s.is_attributed()));
    }

    #[test]
    fn test_empty_segments() {
        let intervals = vec![DiarizedInterval::new(0, 0.0, 1.0)];
        assert!(align_speakers(&[], &intervals, 1.0).is_empty());
    }

    #[test]
    fn test_speaker_count_distinct_attributed() {
        let intervals = vec![
            DiarizedInterval::new(2, 0.0, 2.0),
            DiarizedInterval::new(0, 2.0, 4.0),
            DiarizedInterval::new(2, 4.0, 6.0),
        ];
        let aligned = align_speakers(&segments(6), &intervals, 6.0);
        assert_eq!(speaker_count(&aligned), 2);
    }

    #[test]
    fn test_speaker_count_ignores_unassigned() {
        assert_eq!(speaker_count(&segments(4)), 0);
    }

    #[test]
    fn test_mock_diarizer_failure() {
        let diarizer = MockDiarizer::new(vec![]).with_failure();
        let result = diarizer.process(&[0.0; 16000], 16000);
        assert!(matches!(result, Err(MemovoxError::Diarization { .. })));
    }

    #[test]
    fn test_mock_diarizer_records_input() {
        let diarizer = MockDiarizer::new(vec![DiarizedInterval::new(0, 0.0, 1.0)]);
        diarizer.process(&[0.0; 16000], 16000).unwrap();
        assert_eq!(diarizer.processed_lens(), vec![16000]);
    }
}
