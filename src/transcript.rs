//! Transcript segment types.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Speaker id meaning "not yet attributed".
pub const UNASSIGNED_SPEAKER: i32 = -1;

/// A half-open time interval `[start, end)` in seconds from session start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start_secs: f32,
    pub end_secs: f32,
}

impl TimeSpan {
    /// Creates a span; `end_secs` is exclusive.
    pub fn new(start_secs: f32, end_secs: f32) -> Self {
        Self {
            start_secs,
            end_secs,
        }
    }

    /// True if `t` falls inside `[start, end)`.
    pub fn contains(&self, t: f32) -> bool {
        t >= self.start_secs && t < self.end_secs
    }

    /// Distance from `t` to the nearest edge; zero inside the span.
    pub fn edge_distance(&self, t: f32) -> f32 {
        if self.contains(t) {
            0.0
        } else if t < self.start_secs {
            self.start_secs - t
        } else {
            t - self.end_secs
        }
    }
}

/// One recognized utterance in the session transcript.
///
/// Segments form an append-only sequence whose insertion order is the
/// chronological order. Speaker and interval are written once, by the
/// diarization aligner, as part of a full-sequence rewrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Normalized recognized text.
    pub text: String,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_at_ms: u64,
    /// Attributed speaker, or [`UNASSIGNED_SPEAKER`].
    pub speaker: i32,
    /// Session-relative interval assigned during diarization alignment.
    pub interval: Option<TimeSpan>,
}

impl TranscriptSegment {
    /// Creates an unattributed segment stamped with the current time.
    pub fn new(text: impl Into<String>) -> Self {
        let created_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            text: text.into(),
            created_at_ms,
            speaker: UNASSIGNED_SPEAKER,
            interval: None,
        }
    }

    /// True once a diarization pass has attributed this segment.
    pub fn is_attributed(&self) -> bool {
        self.speaker != UNASSIGNED_SPEAKER
    }
}
