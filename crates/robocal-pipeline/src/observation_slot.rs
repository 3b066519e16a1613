//! Latest-value channel between a sensor callback and the main loop.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Single-slot, mutex-guarded store of the most recent sensor frame.
///
/// Cloning yields another handle to the same slot: hand one to the writer
/// (sensor thread/callback) and keep one in the control loop.
#[derive(Debug)]
pub struct ObservationSlot<F> {
    inner: Arc<Mutex<Option<(F, Instant)>>>,
}

impl<F> Clone for ObservationSlot<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F> Default for ObservationSlot<F> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }
}

impl<F: Clone> ObservationSlot<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored frame.
    pub fn publish(&self, frame: F, stamp: Instant) {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = Some((frame, stamp));
    }

    /// Latest frame unless it is older than `max_age` at `now`.
    pub fn latest(&self, now: Instant, max_age: Duration) -> Option<(F, Instant)> {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .filter(|(_, stamp)| now.saturating_duration_since(*stamp) <= max_age)
            .cloned()
    }

    /// Latest frame stamped strictly after `after` and not older than `max_age`.
    pub fn newer_than(
        &self,
        after: Instant,
        now: Instant,
        max_age: Duration,
    ) -> Option<(F, Instant)> {
        self.latest(now, max_age)
            .filter(|(_, stamp)| *stamp > after)
    }

    pub fn clear(&self) {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = None;
    }
}
