//! The capture engine: a dedicated thread that polls a [`CaptureSource`]
//! and feeds fixed-size chunk + summary pairs into the session channel.

use crate::audio::capture::CaptureSource;
use crate::audio::chunk::{AudioChunk, ChunkAssembler, WaveformSummary};
use crate::error::{MemovoxError, Result};
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Tuning for the capture loop.
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// How often the source is polled for new samples.
    pub poll_interval: Duration,
    /// Samples per emitted chunk.
    pub chunk_samples: usize,
    /// Consecutive read failures tolerated before giving up.
    pub max_consecutive_errors: u32,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(crate::defaults::CAPTURE_POLL_INTERVAL_MS),
            chunk_samples: crate::defaults::chunk_samples(),
            max_consecutive_errors: crate::defaults::MAX_CONSECUTIVE_READ_ERRORS,
        }
    }
}

/// What the capture thread hands back when joined.
pub struct CaptureOutcome {
    /// The source, returned for reuse by the next session. None only if the
    /// capture thread panicked and the source was lost with it.
    pub source: Option<Box<dyn CaptureSource>>,
    /// Ok on clean shutdown, the capture error otherwise.
    pub result: Result<()>,
    /// Chunks pushed into the channel over the thread's lifetime.
    pub chunks_sent: u64,
}

/// Handle to a running capture thread.
pub struct CaptureHandle {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<CaptureOutcome>,
}

impl CaptureHandle {
    /// Signal the loop to stop accepting new audio and wait for it to
    /// finish. Already-emitted chunks stay in the channel for the consumer.
    pub fn stop(self) -> CaptureOutcome {
        self.stop.store(true, Ordering::SeqCst);
        self.handle.join().unwrap_or_else(|_| CaptureOutcome {
            source: None,
            result: Err(MemovoxError::AudioCapture {
                message: "capture thread panicked".to_string(),
            }),
            chunks_sent: 0,
        })
    }

    /// True while the capture loop has not been told to stop.
    pub fn is_running(&self) -> bool {
        !self.stop.load(Ordering::SeqCst)
    }
}

/// Spawn the capture thread.
///
/// The source must already be started. The thread polls it, slices reads
/// into fixed-duration normalized chunks, and sends each chunk with its
/// waveform summary. On stop (or a finite source running dry) the assembler
/// remainder goes out as one final short chunk, then the source is stopped
/// and handed back through [`CaptureHandle::stop`].
///
/// `on_failure` fires at most once, when persistent device errors end the
/// loop early; the same error is also in the joined outcome.
pub fn spawn_capture(
    mut source: Box<dyn CaptureSource>,
    tx: Sender<(AudioChunk, WaveformSummary)>,
    options: CaptureOptions,
    on_failure: Option<Box<dyn FnOnce(&MemovoxError) + Send>>,
) -> CaptureHandle {
    let stop = Arc::new(AtomicBool::new(false));
    let thread_stop = stop.clone();

    let handle = thread::spawn(move || {
        let mut assembler = ChunkAssembler::new(options.chunk_samples);
        let mut chunks_sent: u64 = 0;
        let mut consecutive_errors: u32 = 0;
        let mut result: Result<()> = Ok(());
        let source_is_finite = source.is_finite();

        'capture: while !thread_stop.load(Ordering::SeqCst) {
            let samples = match source.read_samples() {
                Ok(s) => {
                    consecutive_errors = 0;
                    s
                }
                Err(e) => {
                    consecutive_errors += 1;
                    if consecutive_errors >= options.max_consecutive_errors {
                        tracing::error!(
                            "audio capture failed {} times in a row: {}",
                            consecutive_errors,
                            e
                        );
                        if let Some(callback) = on_failure {
                            callback(&e);
                        }
                        result = Err(e);
                        let _ = source.stop();
                        return CaptureOutcome {
                            source: Some(source),
                            result,
                            chunks_sent,
                        };
                    }
                    thread::sleep(options.poll_interval);
                    continue;
                }
            };

            if samples.is_empty() {
                if source_is_finite {
                    // Scripted source exhausted; leave the loop and flush.
                    break;
                }
                // Live source: empty reads are normal while the device
                // warms up. Keep polling.
                thread::sleep(options.poll_interval);
                continue;
            }

            for pair in assembler.push(&samples) {
                if tx.send(pair).is_err() {
                    // Consumer gone; nothing left to do.
                    break 'capture;
                }
                chunks_sent += 1;
            }

            thread::sleep(options.poll_interval);
        }

        // Catch the tail the device accumulated after the stop signal,
        // then emit the carried remainder as a final short chunk.
        if let Ok(tail) = source.read_samples() {
            for pair in assembler.push(&tail) {
                if tx.send(pair).is_ok() {
                    chunks_sent += 1;
                }
            }
        }
        if let Some(pair) = assembler.flush() {
            if tx.send(pair).is_ok() {
                chunks_sent += 1;
            }
        }

        if let Err(e) = source.stop() {
            tracing::warn!("failed to stop capture source: {}", e);
        }

        CaptureOutcome {
            source: Some(source),
            result,
            chunks_sent,
        }
    });

    CaptureHandle { stop, handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::capture::MockCaptureSource;
    use crossbeam_channel::unbounded;

    fn fast_options(chunk_samples: usize) -> CaptureOptions {
        CaptureOptions {
            poll_interval: Duration::from_millis(1),
            chunk_samples,
            max_consecutive_errors: 3,
        }
    }

    #[test]
    fn test_finite_source_emits_all_chunks_in_order() {
        // 5 reads of 1600 samples -> 5 full chunks
        let source = Box::new(MockCaptureSource::new().with_constant_reads(5, 1600, 1000));
        let (tx, rx) = unbounded();

        let handle = spawn_capture(source, tx, fast_options(1600), None);
        let outcome = handle.stop();

        assert!(outcome.result.is_ok());
        assert_eq!(outcome.chunks_sent, 5);

        let chunks: Vec<_> = rx.try_iter().collect();
        assert_eq!(chunks.len(), 5);
        for (i, (chunk, _)) in chunks.iter().enumerate() {
            assert_eq!(chunk.sequence, i as u64);
            assert_eq!(chunk.samples.len(), 1600);
        }
    }

    #[test]
    fn test_remainder_flushed_as_short_final_chunk() {
        // 1600 + 700 samples -> one full chunk plus a 700-sample tail
        let source = Box::new(
            MockCaptureSource::new()
                .with_read(vec![500i16; 1600])
                .with_read(vec![500i16; 700]),
        );
        let (tx, rx) = unbounded();

        let handle = spawn_capture(source, tx, fast_options(1600), None);
        let outcome = handle.stop();

        assert_eq!(outcome.chunks_sent, 2);
        let chunks: Vec<_> = rx.try_iter().collect();
        assert_eq!(chunks[0].0.samples.len(), 1600);
        assert_eq!(chunks[1].0.samples.len(), 700);
    }

    #[test]
    fn test_persistent_read_errors_surface_capture_failure() {
        let source = Box::new(
            MockCaptureSource::new()
                .with_read(vec![1i16; 1600])
                .with_read_failure_after(1)
                .with_error_message("device unplugged"),
        );
        let (tx, rx) = unbounded();

        let failed = Arc::new(AtomicBool::new(false));
        let failed_flag = failed.clone();
        let on_failure: Box<dyn FnOnce(&MemovoxError) + Send> = Box::new(move |e| {
            assert!(e.to_string().contains("device unplugged"));
            failed_flag.store(true, Ordering::SeqCst);
        });

        let handle = spawn_capture(source, tx, fast_options(1600), Some(on_failure));
        // Give the loop time to exhaust its error budget
        std::thread::sleep(Duration::from_millis(50));
        let outcome = handle.stop();

        assert!(outcome.result.is_err());
        assert!(failed.load(Ordering::SeqCst));
        // The chunk read before the failure still made it out
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn test_stop_returns_source_for_reuse() {
        let source = Box::new(MockCaptureSource::new().with_constant_reads(1, 1600, 100));
        let (tx, _rx) = unbounded();

        let handle = spawn_capture(source, tx, fast_options(1600), None);
        let outcome = handle.stop();

        // Source comes back stopped and reusable
        assert!(outcome.result.is_ok());
        assert!(outcome.source.expect("source returned").is_finite());
    }

    #[test]
    fn test_dropped_receiver_ends_loop_quietly() {
        let source = Box::new(MockCaptureSource::new().with_constant_reads(50, 1600, 100));
        let (tx, rx) = unbounded();
        drop(rx);

        let handle = spawn_capture(source, tx, fast_options(1600), None);
        let outcome = handle.stop();
        assert!(outcome.result.is_ok());
    }

    #[test]
    fn test_waveform_summary_accompanies_each_chunk() {
        let source = Box::new(MockCaptureSource::new().with_constant_reads(2, 1600, 6554));
        let (tx, rx) = unbounded();

        let handle = spawn_capture(source, tx, fast_options(1600), None);
        handle.stop();

        for (_, summary) in rx.try_iter() {
            // 6554/32768 = 0.2 amplitude, boosted by 2.5 gain to ~0.5
            assert!((summary.mean_amplitude - 0.2).abs() < 0.01);
            assert!(summary.buckets.iter().all(|&b| (b - 0.5).abs() < 0.01));
        }
    }
}
