//! The anti-idle resource seam.
//!
//! Recording must keep the device awake; the OS facility behind that is a
//! collaborator. The engine models it as a scoped guard acquired on entry
//! to `Recording` and released on every exit path, with a hard wall-clock
//! cap as a last-resort safety net against runaway sessions.

use crate::error::Result;
use crossbeam_channel::{bounded, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// A held anti-idle resource. Dropping the guard releases it.
pub trait InhibitGuard: Send {}

/// Acquires the OS anti-idle resource.
pub trait IdleInhibitor: Send {
    /// Acquire the resource, annotated with a human-readable reason.
    fn inhibit(&self, reason: &str) -> Result<Box<dyn InhibitGuard>>;
}

/// Inhibitor for platforms or embeddings with no idle management.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInhibitor;

struct NoopGuard;

impl InhibitGuard for NoopGuard {}

impl IdleInhibitor for NoopInhibitor {
    fn inhibit(&self, _reason: &str) -> Result<Box<dyn InhibitGuard>> {
        Ok(Box::new(NoopGuard))
    }
}

/// Mock inhibitor that counts acquisitions and live guards, for testing
/// release-on-every-exit-path behavior.
#[derive(Debug, Clone, Default)]
pub struct MockInhibitor {
    acquired: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
}

impl MockInhibitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total acquisitions over the inhibitor's lifetime.
    pub fn acquired_count(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Guards currently held.
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

struct MockGuard {
    active: Arc<AtomicUsize>,
}

impl InhibitGuard for MockGuard {}

impl Drop for MockGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl IdleInhibitor for MockInhibitor {
    fn inhibit(&self, _reason: &str) -> Result<Box<dyn InhibitGuard>> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        self.active.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockGuard {
            active: self.active.clone(),
        }))
    }
}

/// Wraps a guard with a maximum lifetime.
///
/// The inner guard is released when the cap elapses even if the session is
/// still running; dropping the `CappedGuard` releases it early. A watcher
/// thread holds the inner guard and exits on whichever comes first.
pub struct CappedGuard {
    release_tx: Option<Sender<()>>,
}

impl CappedGuard {
    /// Cap the given guard at `max_duration`.
    pub fn new(inner: Box<dyn InhibitGuard>, max_duration: Duration) -> Self {
        let (release_tx, release_rx) = bounded::<()>(1);
        thread::spawn(move || {
            // Holds `inner` until released or the cap expires.
            let _ = release_rx.recv_timeout(max_duration);
            drop(inner);
        });
        Self {
            release_tx: Some(release_tx),
        }
    }
}

impl InhibitGuard for CappedGuard {}

impl Drop for CappedGuard {
    fn drop(&mut self) {
        if let Some(tx) = self.release_tx.take() {
            let _ = tx.try_send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_inhibitor_hands_out_guards() {
        let inhibitor = NoopInhibitor;
        let guard = inhibitor.inhibit("test").unwrap();
        drop(guard);
    }

    #[test]
    fn test_mock_counts_acquire_and_release() {
        let inhibitor = MockInhibitor::new();
        assert_eq!(inhibitor.active_count(), 0);

        let guard = inhibitor.inhibit("recording").unwrap();
        assert_eq!(inhibitor.acquired_count(), 1);
        assert_eq!(inhibitor.active_count(), 1);

        drop(guard);
        assert_eq!(inhibitor.acquired_count(), 1);
        assert_eq!(inhibitor.active_count(), 0);
    }

    #[test]
    fn test_capped_guard_releases_on_drop() {
        let inhibitor = MockInhibitor::new();
        let inner = inhibitor.inhibit("recording").unwrap();
        let capped = CappedGuard::new(inner, Duration::from_secs(3600));
        assert_eq!(inhibitor.active_count(), 1);

        drop(capped);
        // The watcher thread needs a moment to observe the release
        for _ in 0..50 {
            if inhibitor.active_count() == 0 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(inhibitor.active_count(), 0);
    }

    #[test]
    fn test_capped_guard_releases_at_cap() {
        let inhibitor = MockInhibitor::new();
        let inner = inhibitor.inhibit("recording").unwrap();
        let _capped = CappedGuard::new(inner, Duration::from_millis(30));
        assert_eq!(inhibitor.active_count(), 1);

        // Without dropping the capped guard, the cap alone releases it
        for _ in 0..50 {
            if inhibitor.active_count() == 0 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(inhibitor.active_count(), 0);
    }
}
