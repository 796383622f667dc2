//! Per-batch invocation of the recognition engine.

use crate::error::Result;
use crate::stt::engine::RecognitionEngine;
use std::sync::Arc;

/// Feeds finalized speech batches into the recognition engine.
///
/// The invoker lives on the batching worker, which owns the accumulation
/// buffer outright, so the expensive decode never holds a lock that live
/// ingestion would contend on: the capture thread keeps filling the channel
/// while a decode runs.
///
/// Engine failures degrade to an empty result for the offending batch only;
/// a bad batch must never abort the session.
pub struct RecognitionInvoker {
    engine: Arc<dyn RecognitionEngine>,
    sample_rate: u32,
}

impl RecognitionInvoker {
    /// Creates an invoker over a shared engine handle.
    pub fn new(engine: Arc<dyn RecognitionEngine>, sample_rate: u32) -> Self {
        Self {
            engine,
            sample_rate,
        }
    }

    /// Recognize one batch, returning raw text.
    ///
    /// Empty input yields empty text without touching the engine. Engine
    /// errors are logged and yield empty text.
    pub fn recognize(&self, samples: &[f32]) -> String {
        if samples.is_empty() {
            return String::new();
        }

        match self.try_recognize(samples) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(
                    "recognition failed for a {:.2}s batch, dropping it: {}",
                    samples.len() as f32 / self.sample_rate as f32,
                    e
                );
                String::new()
            }
        }
    }

    fn try_recognize(&self, samples: &[f32]) -> Result<String> {
        let mut stream = self.engine.create_stream()?;
        stream.accept_waveform(samples, self.sample_rate);
        stream.decode()?;
        stream.result()
    }
}
