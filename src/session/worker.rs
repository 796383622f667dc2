//! The batching/recognition worker.
//!
//! One thread owns the speech batcher outright and consumes the capture
//! channel sequentially, so chunks are processed in strict arrival order
//! and no lock is ever held across recognition. When the channel
//! disconnects the worker drains everything already queued, flushes the
//! batcher, and processes the final batch — the drain-don't-cancel policy
//! that keeps the tail of speech.

use crate::audio::chunk::{AudioChunk, WaveformSummary};
use crate::session::state::StatePublisher;
use crate::stt::invoker::RecognitionInvoker;
use crate::text::normalize::TextNormalizer;
use crate::transcript::TranscriptSegment;
use crate::vad::batcher::{SpeechBatch, SpeechBatcher};
use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// What the worker hands back when joined.
pub struct WorkerOutcome {
    /// The batcher, returned for reuse by the next session.
    pub batcher: SpeechBatcher,
    /// The full session waveform, when retention was requested.
    pub session_audio: Vec<f32>,
    /// Chunks consumed from the channel.
    pub chunks_processed: u64,
}

/// The batching/recognition worker body.
pub struct BatchWorker {
    batcher: SpeechBatcher,
    invoker: RecognitionInvoker,
    normalizer: TextNormalizer,
    publisher: Arc<StatePublisher>,
    /// Retain the full waveform for post-session diarization/export.
    retain_audio: bool,
}

impl BatchWorker {
    pub fn new(
        batcher: SpeechBatcher,
        invoker: RecognitionInvoker,
        normalizer: TextNormalizer,
        publisher: Arc<StatePublisher>,
        retain_audio: bool,
    ) -> Self {
        Self {
            batcher,
            invoker,
            normalizer,
            publisher,
            retain_audio,
        }
    }

    /// Consume the channel to disconnection, then flush.
    pub fn run(mut self, rx: Receiver<(AudioChunk, WaveformSummary)>) -> WorkerOutcome {
        let mut session_audio = Vec::new();
        let mut chunks_processed: u64 = 0;

        while let Ok((chunk, summary)) = rx.recv() {
            chunks_processed += 1;
            self.publisher.publish_waveform(summary);
            self.publisher.add_duration(chunk.samples.len() as u64);
            if self.retain_audio {
                session_audio.extend_from_slice(&chunk.samples);
            }

            if let Some(batch) = self.batcher.push_chunk(&chunk.samples) {
                self.process_batch(batch);
            }
        }

        // Channel disconnected: every queued chunk has been consumed.
        // Only now does the final flush run.
        if let Some(batch) = self.batcher.flush() {
            self.process_batch(batch);
        }

        WorkerOutcome {
            batcher: self.batcher,
            session_audio,
            chunks_processed,
        }
    }

    fn process_batch(&mut self, batch: SpeechBatch) {
        let raw = self.invoker.recognize(&batch.samples);
        match self.normalizer.normalize(&raw) {
            Some(text) => self.publisher.push_segment(TranscriptSegment::new(text)),
            None => {
                tracing::debug!("batch {} produced no usable text", batch.sequence);
            }
        }
    }
}

/// Spawn the worker on its own thread.
pub fn spawn_worker(
    worker: BatchWorker,
    rx: Receiver<(AudioChunk, WaveformSummary)>,
) -> JoinHandle<WorkerOutcome> {
    thread::spawn(move || worker.run(rx))
}
