//! The offline recognition engine contract.

use crate::error::{MemovoxError, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A single decode pass over one batch of audio.
///
/// Streams are cheap to create and single-use: feed samples, decode, read
/// the result. Dropping the stream releases engine-side resources.
pub trait RecognitionStream: Send {
    /// Feed normalized mono samples at the given sample rate.
    fn accept_waveform(&mut self, samples: &[f32], sample_rate: u32);

    /// Run inference over the accepted audio.
    ///
    /// This is the expensive call; everything else is bookkeeping.
    fn decode(&mut self) -> Result<()>;

    /// The recognized text. May be empty.
    fn result(&self) -> Result<String>;
}

/// An offline speech recognition engine.
///
/// This trait allows swapping implementations (real model vs mock). The
/// engine itself is shared read-only; all per-batch state lives in the
/// stream it creates.
pub trait RecognitionEngine: Send + Sync {
    /// Open a fresh decode stream.
    fn create_stream(&self) -> Result<Box<dyn RecognitionStream>>;

    /// Name of the loaded model.
    fn model_name(&self) -> &str;

    /// Check if the engine is loaded and usable.
    fn is_ready(&self) -> bool {
        true
    }
}

/// Mock recognition engine for testing.
///
/// Replays scripted responses in order (repeating the last one when the
/// script runs out) and records how much audio each stream accepted.
pub struct MockRecognizer {
    model_name: String,
    responses: Mutex<VecDeque<String>>,
    last_response: Mutex<String>,
    accepted_samples: Arc<Mutex<Vec<usize>>>,
    fail_create: bool,
    fail_decode: bool,
}

impl MockRecognizer {
    /// Create a mock recognizer with an empty default response.
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            responses: Mutex::new(VecDeque::new()),
            last_response: Mutex::new(String::new()),
            accepted_samples: Arc::new(Mutex::new(Vec::new())),
            fail_create: false,
            fail_decode: false,
        }
    }

    /// Configure a single response returned for every batch.
    pub fn with_response(self, response: &str) -> Self {
        *self.last_response.lock().unwrap() = response.to_string();
        self
    }

    /// Configure a sequence of responses, one per batch in order.
    pub fn with_responses(self, responses: &[&str]) -> Self {
        {
            let mut queue = self.responses.lock().unwrap();
            queue.extend(responses.iter().map(|r| r.to_string()));
        }
        self
    }

    /// Configure the mock to fail on stream creation.
    pub fn with_create_failure(mut self) -> Self {
        self.fail_create = true;
        self
    }

    /// Configure the mock to fail on decode.
    pub fn with_decode_failure(mut self) -> Self {
        self.fail_decode = true;
        self
    }

    /// Sample counts accepted by each stream created so far.
    pub fn accepted_sample_counts(&self) -> Vec<usize> {
        self.accepted_samples.lock().unwrap().clone()
    }

    /// Number of decode streams created so far.
    pub fn streams_created(&self) -> usize {
        self.accepted_samples.lock().unwrap().len()
    }

    fn next_response(&self) -> String {
        let mut queue = self.responses.lock().unwrap();
        match queue.pop_front() {
            Some(response) => {
                *self.last_response.lock().unwrap() = response.clone();
                response
            }
            None => self.last_response.lock().unwrap().clone(),
        }
    }
}

impl RecognitionEngine for MockRecognizer {
    fn create_stream(&self) -> Result<Box<dyn RecognitionStream>> {
        if self.fail_create {
            return Err(MemovoxError::Decode {
                message: "mock stream creation failure".to_string(),
            });
        }
        let index = {
            let mut counts = self.accepted_samples.lock().unwrap();
            counts.push(0);
            counts.len() - 1
        };
        Ok(Box::new(MockStream {
            response: self.next_response(),
            decoded: false,
            fail_decode: self.fail_decode,
            index,
            counts: Arc::clone(&self.accepted_samples),
        }))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        !self.fail_create
    }
}

struct MockStream {
    response: String,
    decoded: bool,
    fail_decode: bool,
    index: usize,
    counts: Arc<Mutex<Vec<usize>>>,
}

impl RecognitionStream for MockStream {
    fn accept_waveform(&mut self, samples: &[f32], _sample_rate: u32) {
        if let Ok(mut counts) = self.counts.lock() {
            counts[self.index] += samples.len();
        }
    }

    fn decode(&mut self) -> Result<()> {
        if self.fail_decode {
            return Err(MemovoxError::Decode {
                message: "mock decode failure".to_string(),
            });
        }
        self.decoded = true;
        Ok(())
    }

    fn result(&self) -> Result<String> {
        if !self.decoded {
            return Err(MemovoxError::Decode {
                message: "result requested before decode".to_string(),
            });
        }
        Ok(self.response.clone())
    }
}
