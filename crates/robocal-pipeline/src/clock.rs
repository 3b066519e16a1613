//! Time source and cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Abstract time source. The control loop only ever suspends through
/// [`Clock::sleep`].
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Shared cancellation flag, checked every control tick and blocking wait.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("cancelled")]
    Cancelled,
}

/// Poll `probe` every `poll` until it yields a value, `timeout` elapses or
/// `cancel` is set.
pub fn wait_for<T>(
    clock: &dyn Clock,
    cancel: &CancelToken,
    timeout: Duration,
    poll: Duration,
    mut probe: impl FnMut() -> Option<T>,
) -> Result<T, WaitError> {
    let start = clock.now();
    loop {
        if cancel.is_cancelled() {
            return Err(WaitError::Cancelled);
        }
        if let Some(value) = probe() {
            return Ok(value);
        }
        if clock.now().duration_since(start) >= timeout {
            return Err(WaitError::TimedOut(timeout));
        }
        clock.sleep(poll);
    }
}

/// Sleep for `duration` in `poll`-sized steps, returning early on cancel.
pub fn cancellable_sleep(
    clock: &dyn Clock,
    cancel: &CancelToken,
    duration: Duration,
    poll: Duration,
) -> Result<(), WaitError> {
    let start = clock.now();
    loop {
        if cancel.is_cancelled() {
            return Err(WaitError::Cancelled);
        }
        let elapsed = clock.now().duration_since(start);
        if elapsed >= duration {
            return Ok(());
        }
        clock.sleep(poll.min(duration - elapsed));
    }
}
