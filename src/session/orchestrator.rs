//! The session orchestrator: top-level concurrency coordinator.
//!
//! Owns the engines and the session state machine, wires the channel
//! between capture and batching/recognition, and sequences
//! start/stop/drain/diarize. It performs no signal processing itself.

use crate::audio::capture::CaptureSource;
use crate::audio::engine::{spawn_capture, CaptureHandle, CaptureOptions};
use crate::config::Config;
use crate::diarize::{align_speakers, speaker_count, DiarizationEngine};
use crate::error::{MemovoxError, Result};
use crate::session::inhibit::{CappedGuard, IdleInhibitor, InhibitGuard, NoopInhibitor};
use crate::session::loader::EngineLoader;
use crate::session::state::{SessionEvent, SessionPhase, SessionState, StatePublisher};
use crate::session::worker::{spawn_worker, BatchWorker, WorkerOutcome};
use crate::storage::{RecordId, RecordingRecord, StorageRepository};
use crate::stt::engine::RecognitionEngine;
use crate::stt::invoker::RecognitionInvoker;
use crate::text::normalize::TextNormalizer;
use crate::transcript::TranscriptSegment;
use crate::vad::batcher::SpeechBatcher;
use crossbeam_channel::unbounded;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Threads and resources of the session currently recording.
struct ActiveSession {
    capture: CaptureHandle,
    worker: JoinHandle<WorkerOutcome>,
    /// Released on every exit path, including errors.
    inhibit_guard: Option<Box<dyn InhibitGuard>>,
}

/// Top-level coordinator for recording sessions.
///
/// At most one session is active at a time. All observable state flows
/// through immutable [`SessionState`] snapshots; commands are synchronous
/// and return when the corresponding transition has completed (including
/// the full drain on stop).
pub struct SessionOrchestrator {
    config: Config,
    loader: Box<dyn EngineLoader>,
    storage: Box<dyn StorageRepository>,
    inhibitor: Box<dyn IdleInhibitor>,
    publisher: Arc<StatePublisher>,
    recognizer: Option<Arc<dyn RecognitionEngine>>,
    diarizer: Option<Arc<dyn DiarizationEngine>>,
    /// Loaned to the worker while recording.
    batcher: Option<SpeechBatcher>,
    /// Loaned to the capture thread while recording.
    capture_source: Option<Box<dyn CaptureSource>>,
    active: Option<ActiveSession>,
    record_id: Option<RecordId>,
}

impl SessionOrchestrator {
    /// Creates an orchestrator in `Idle`.
    ///
    /// Engines are not loaded until [`initialize`](Self::initialize).
    pub fn new(
        config: Config,
        loader: Box<dyn EngineLoader>,
        capture_source: Box<dyn CaptureSource>,
        storage: Box<dyn StorageRepository>,
    ) -> Self {
        let sample_rate = config.audio.sample_rate;
        Self {
            config,
            loader,
            storage,
            inhibitor: Box::new(NoopInhibitor),
            publisher: Arc::new(StatePublisher::new(sample_rate)),
            recognizer: None,
            diarizer: None,
            batcher: None,
            capture_source: Some(capture_source),
            active: None,
            record_id: None,
        }
    }

    /// Use a real anti-idle inhibitor instead of the noop default.
    pub fn with_inhibitor(mut self, inhibitor: Box<dyn IdleInhibitor>) -> Self {
        self.inhibitor = inhibitor;
        self
    }

    /// Attach an observer channel for state snapshots and waveforms.
    pub fn with_event_sender(self, tx: crossbeam_channel::Sender<SessionEvent>) -> Self {
        self.publisher.set_event_sender(tx);
        self
    }

    /// The current state snapshot.
    pub fn state(&self) -> Arc<SessionState> {
        self.publisher.snapshot()
    }

    /// Load and prepare all engines: `Idle → Initializing → Ready`.
    ///
    /// Failure surfaces as `Error` with no automatic retry.
    pub fn initialize(&mut self) -> Result<()> {
        if self.state().phase != SessionPhase::Idle {
            return Err(MemovoxError::Session {
                message: "initialize requires an idle orchestrator".to_string(),
            });
        }

        self.publisher.set_phase(SessionPhase::Initializing);
        match self.load_engines() {
            Ok(()) => {
                self.publisher.set_phase(SessionPhase::Ready);
                Ok(())
            }
            Err(e) => {
                self.publisher.set_error(e.to_string());
                Err(e)
            }
        }
    }

    fn load_engines(&mut self) -> Result<()> {
        let recognizer = self.loader.load_recognizer()?;
        if !recognizer.is_ready() {
            return Err(MemovoxError::EngineInit {
                engine: "recognition".to_string(),
                message: "engine loaded but reports not ready".to_string(),
            });
        }
        let detector = self.loader.load_detector()?;
        let diarizer = if self.config.diarization.enabled {
            self.loader.load_diarizer()?
        } else {
            None
        };

        self.batcher = Some(SpeechBatcher::new(detector, self.config.min_batch_samples()));
        self.recognizer = Some(recognizer);
        self.diarizer = diarizer;
        Ok(())
    }

    /// Begin a fresh recording session: `Ready → Recording`.
    pub fn start_new_session(&mut self) -> Result<()> {
        self.start_session(Vec::new())
    }

    /// Begin recording appended to an existing transcript.
    pub fn resume_session(&mut self, existing: Vec<TranscriptSegment>) -> Result<()> {
        self.start_session(existing)
    }

    fn start_session(&mut self, seed: Vec<TranscriptSegment>) -> Result<()> {
        match self.state().phase {
            SessionPhase::Ready => {}
            SessionPhase::Error => {
                return Err(MemovoxError::Session {
                    message: "previous error must be acknowledged before a new session"
                        .to_string(),
                })
            }
            phase => {
                return Err(MemovoxError::Session {
                    message: format!("cannot start a session from {:?}", phase),
                })
            }
        }

        let recognizer = self.recognizer.clone().ok_or_else(|| MemovoxError::Session {
            message: "engines not initialized".to_string(),
        })?;
        let mut batcher = self.batcher.take().ok_or_else(|| MemovoxError::Session {
            message: "speech batcher unavailable".to_string(),
        })?;
        batcher.reset();

        let mut source = self
            .capture_source
            .take()
            .ok_or_else(|| MemovoxError::Session {
                message: "capture source unavailable".to_string(),
            })?;

        let name = self.config.session.default_name.clone();
        self.publisher.begin_session(&name, seed.clone());

        let mut record = RecordingRecord::started(&name);
        record.segments = seed;
        let record_id = match self.storage.insert(&record) {
            Ok(id) => id,
            Err(e) => {
                self.batcher = Some(batcher);
                self.capture_source = Some(source);
                return Err(e);
            }
        };

        if let Err(e) = source.start() {
            self.batcher = Some(batcher);
            self.capture_source = Some(source);
            self.publisher.set_error(e.to_string());
            return Err(e);
        }

        // Anti-idle is a safety net, not a correctness dependency: failing
        // to acquire it is logged, and recording proceeds without it.
        let cap = Duration::from_secs(self.config.session.idle_inhibit_cap_secs);
        let inhibit_guard = match self.inhibitor.inhibit("memovox recording") {
            Ok(inner) => Some(Box::new(CappedGuard::new(inner, cap)) as Box<dyn InhibitGuard>),
            Err(e) => {
                tracing::warn!("failed to acquire anti-idle resource: {}", e);
                None
            }
        };

        let sample_rate = self.config.audio.sample_rate;
        let retain_audio =
            self.diarizer.is_some() || self.config.audio.export_dir.is_some();
        let worker = BatchWorker::new(
            batcher,
            RecognitionInvoker::new(recognizer, sample_rate),
            TextNormalizer::new(
                self.config.text.language_normalization,
                self.config.text.special_tokens.clone(),
            ),
            self.publisher.clone(),
            retain_audio,
        );

        let (tx, rx) = unbounded();
        self.publisher.set_phase(SessionPhase::Recording);

        let worker_handle = spawn_worker(worker, rx);

        let failure_publisher = self.publisher.clone();
        let capture = spawn_capture(
            source,
            tx,
            CaptureOptions {
                chunk_samples: self.config.chunk_samples(),
                ..CaptureOptions::default()
            },
            Some(Box::new(move |e: &MemovoxError| {
                failure_publisher.set_error(e.to_string());
            })),
        );

        self.active = Some(ActiveSession {
            capture,
            worker: worker_handle,
            inhibit_guard,
        });
        self.record_id = Some(record_id);
        Ok(())
    }

    /// Stop the active session: `Recording → Stopping → [Diarizing] → Ready`.
    ///
    /// Capture is cancelled immediately; the batching worker is not — it
    /// drains every already-queued chunk, then flushes the final batch.
    /// Only after the drain barrier does diarization (when available) and
    /// the storage update run.
    pub fn stop_session(&mut self) -> Result<()> {
        let active = self.active.take().ok_or_else(|| MemovoxError::Session {
            message: "no active session to stop".to_string(),
        })?;

        self.publisher.set_phase(SessionPhase::Stopping);

        // Cancel capture; its channel sender drops with the thread, which
        // is what lets the worker's drain terminate.
        let capture_outcome = active.capture.stop();
        if let Some(source) = capture_outcome.source {
            self.capture_source = Some(source);
        }

        // Drain barrier: the worker finishes every queued chunk, then
        // flushes the batcher and processes the final dispatch.
        let worker_outcome = match active.worker.join() {
            Ok(outcome) => outcome,
            Err(_) => {
                drop(active.inhibit_guard);
                let message = "batching worker panicked".to_string();
                self.publisher.set_error(&message);
                return Err(MemovoxError::Session { message });
            }
        };
        self.batcher = Some(worker_outcome.batcher);

        // Release the anti-idle resource on every path from here on.
        drop(active.inhibit_guard);

        let capture_failed = capture_outcome.result.is_err();

        if !capture_failed {
            self.run_diarization(&worker_outcome.session_audio);
        }

        self.export_session_audio(&worker_outcome.session_audio);
        self.update_record(!capture_failed);

        match capture_outcome.result {
            Ok(()) => {
                self.publisher.set_phase(SessionPhase::Ready);
                Ok(())
            }
            Err(e) => {
                self.publisher.set_error(e.to_string());
                Err(e)
            }
        }
    }

    /// `Stopping → Diarizing`, when the engine is present and audio was
    /// retained. Non-fatal: failure logs and leaves speakers unassigned.
    fn run_diarization(&mut self, session_audio: &[f32]) {
        let diarizer = match &self.diarizer {
            Some(d) if !session_audio.is_empty() => d.clone(),
            _ => return,
        };

        self.publisher.set_phase(SessionPhase::Diarizing);

        let sample_rate = self.config.audio.sample_rate;
        match diarizer.process(session_audio, sample_rate) {
            Ok(intervals) => {
                let snapshot = self.publisher.snapshot();
                let aligned =
                    align_speakers(&snapshot.segments, &intervals, snapshot.duration_secs());
                self.publisher.replace_segments(aligned);
            }
            Err(e) => {
                tracing::warn!("diarization failed, leaving segments unattributed: {}", e);
            }
        }
    }

    fn export_session_audio(&self, session_audio: &[f32]) {
        let path = match (&self.config.audio.export_dir, self.record_id) {
            (Some(dir), Some(id)) if !session_audio.is_empty() => dir.join(format!("{}.wav", id)),
            _ => return,
        };
        if let Err(e) =
            crate::audio::wav::write_wav(&path, session_audio, self.config.audio.sample_rate)
        {
            tracing::warn!("failed to export session audio: {}", e);
        }
    }

    fn update_record(&mut self, completed: bool) {
        let id = match self.record_id.take() {
            Some(id) => id,
            None => return,
        };
        let snapshot = self.publisher.snapshot();
        let record = RecordingRecord {
            name: snapshot.name.clone(),
            duration_secs: snapshot.duration_secs(),
            segments: snapshot.segments.clone(),
            speaker_count: speaker_count(&snapshot.segments),
            completed,
        };
        if let Err(e) = self.storage.update(id, &record) {
            tracing::warn!("failed to update recording record: {}", e);
        }
    }

    /// Rename the current session, in state and in its stored record.
    pub fn update_session_name(&mut self, name: &str) -> Result<()> {
        self.publisher.set_name(name);
        if let Some(id) = self.record_id {
            let snapshot = self.publisher.snapshot();
            let record = RecordingRecord {
                name: snapshot.name.clone(),
                duration_secs: snapshot.duration_secs(),
                segments: snapshot.segments.clone(),
                speaker_count: speaker_count(&snapshot.segments),
                completed: false,
            };
            self.storage.update(id, &record)?;
        }
        Ok(())
    }

    /// Acknowledge a surfaced error, making the orchestrator usable again.
    ///
    /// Lands in `Ready` when the engines survived the failure (for example
    /// a capture error), or back in `Idle` when initialization itself
    /// failed and must be repeated.
    pub fn acknowledge_error(&mut self) -> Result<()> {
        if self.state().phase != SessionPhase::Error {
            return Err(MemovoxError::Session {
                message: "no error to acknowledge".to_string(),
            });
        }
        if self.active.is_some() {
            return Err(MemovoxError::Session {
                message: "stop the active session before acknowledging".to_string(),
            });
        }

        let engines_loaded = self.recognizer.is_some() && self.batcher.is_some();
        let next = if engines_loaded {
            SessionPhase::Ready
        } else {
            SessionPhase::Idle
        };
        self.publisher.clear_error(next);
        Ok(())
    }
}

impl Drop for SessionOrchestrator {
    fn drop(&mut self) {
        // Best effort: never leave capture running or the guard held.
        if let Some(active) = self.active.take() {
            let _ = active.capture.stop();
            let _ = active.worker.join();
            drop(active.inhibit_guard);
        }
    }
}
