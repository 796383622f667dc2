//! Observable session state: immutable snapshots published on every change.

use crate::audio::chunk::WaveformSummary;
use crate::transcript::TranscriptSegment;
use crossbeam_channel::Sender;
use std::sync::{Arc, Mutex};

/// The session lifecycle phase.
///
/// Transitions: `Idle → Initializing → Ready → Recording → Stopping →
/// Diarizing → Ready`, with `Error` reachable from `Initializing` and
/// `Recording`. The published boolean flags are projections of this enum,
/// so readers can never observe an inconsistent combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Initializing,
    Ready,
    Recording,
    /// Draining queued audio and finishing outstanding recognition.
    Stopping,
    Diarizing,
    Error,
}

/// Immutable snapshot of the observable session state.
///
/// Exactly one snapshot is current at a time; every observable change
/// replaces it wholesale rather than mutating in place.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub phase: SessionPhase,
    /// Engines are loading.
    pub initializing: bool,
    /// Audio is being captured.
    pub recording: bool,
    /// Recording has stopped but recognition work is still outstanding.
    pub processing: bool,
    /// The post-session diarization pass is running.
    pub diarizing: bool,
    /// Captured audio so far, in samples.
    pub duration_samples: u64,
    /// Sample rate the duration is measured against.
    pub sample_rate: u32,
    /// The transcript so far; insertion order is chronological order.
    pub segments: Vec<TranscriptSegment>,
    /// Session name.
    pub name: String,
    /// Most recent session-level error, if any.
    pub last_error: Option<String>,
}

impl SessionState {
    fn idle(sample_rate: u32) -> Self {
        Self {
            phase: SessionPhase::Idle,
            initializing: false,
            recording: false,
            processing: false,
            diarizing: false,
            duration_samples: 0,
            sample_rate,
            segments: Vec::new(),
            name: String::new(),
            last_error: None,
        }
    }

    /// Captured duration in seconds.
    pub fn duration_secs(&self) -> f32 {
        self.duration_samples as f32 / self.sample_rate as f32
    }

    fn with_phase(&self, phase: SessionPhase) -> Self {
        let mut next = self.clone();
        next.phase = phase;
        next.initializing = phase == SessionPhase::Initializing;
        next.recording = phase == SessionPhase::Recording;
        next.processing = phase == SessionPhase::Stopping;
        next.diarizing = phase == SessionPhase::Diarizing;
        next
    }
}

/// Events delivered to an optional observer channel.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A new state snapshot was published.
    State(Arc<SessionState>),
    /// Live waveform feedback for the most recent chunk.
    Waveform(WaveformSummary),
}

/// Publishes state snapshots with a functional-update discipline.
///
/// The publisher is the only writer of session state. Every mutation builds
/// a new snapshot from the previous one under the lock, swaps it in, and
/// optionally forwards it to the event channel.
pub struct StatePublisher {
    current: Mutex<Arc<SessionState>>,
    event_tx: Mutex<Option<Sender<SessionEvent>>>,
}

impl StatePublisher {
    /// Creates a publisher starting in `Idle`.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            current: Mutex::new(Arc::new(SessionState::idle(sample_rate))),
            event_tx: Mutex::new(None),
        }
    }

    /// Attach an event channel; snapshots and waveforms flow to it from now
    /// on. Sends are non-blocking: a disconnected receiver is ignored.
    pub fn set_event_sender(&self, tx: Sender<SessionEvent>) {
        if let Ok(mut slot) = self.event_tx.lock() {
            *slot = Some(tx);
        }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<SessionState> {
        match self.current.lock() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn update(&self, f: impl FnOnce(&SessionState) -> SessionState) {
        let snapshot = {
            let mut guard = match self.current.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let next = Arc::new(f(&guard));
            *guard = next.clone();
            next
        };
        self.emit(SessionEvent::State(snapshot));
    }

    fn emit(&self, event: SessionEvent) {
        if let Ok(slot) = self.event_tx.lock() {
            if let Some(tx) = slot.as_ref() {
                let _ = tx.try_send(event);
            }
        }
    }

    /// Transition to a new phase, re-deriving the published flags.
    pub fn set_phase(&self, phase: SessionPhase) {
        self.update(|prev| prev.with_phase(phase));
    }

    /// Record a session-level error and transition to `Error`.
    pub fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|prev| {
            let mut next = prev.with_phase(SessionPhase::Error);
            next.last_error = Some(message);
            next
        });
    }

    /// Clear the error after explicit acknowledgement.
    pub fn clear_error(&self, phase: SessionPhase) {
        self.update(|prev| {
            let mut next = prev.with_phase(phase);
            next.last_error = None;
            next
        });
    }

    /// Reset per-session fields for a new or resumed session.
    pub fn begin_session(&self, name: &str, seed: Vec<TranscriptSegment>) {
        self.update(|prev| {
            let mut next = prev.clone();
            next.name = name.to_string();
            next.segments = seed.clone();
            next.duration_samples = 0;
            next.last_error = None;
            next
        });
    }

    /// Append one recognized segment.
    pub fn push_segment(&self, segment: TranscriptSegment) {
        self.update(|prev| {
            let mut next = prev.clone();
            next.segments.push(segment.clone());
            next
        });
    }

    /// Replace the whole transcript (diarization alignment rewrite).
    pub fn replace_segments(&self, segments: Vec<TranscriptSegment>) {
        self.update(|prev| {
            let mut next = prev.clone();
            next.segments = segments.clone();
            next
        });
    }

    /// Account for newly captured audio.
    pub fn add_duration(&self, samples: u64) {
        self.update(|prev| {
            let mut next = prev.clone();
            next.duration_samples += samples;
            next
        });
    }

    /// Rename the session.
    pub fn set_name(&self, name: &str) {
        self.update(|prev| {
            let mut next = prev.clone();
            next.name = name.to_string();
            next
        });
    }

    /// Forward live waveform feedback; does not change state.
    pub fn publish_waveform(&self, summary: WaveformSummary) {
        self.emit(SessionEvent::Waveform(summary));
    }
}
