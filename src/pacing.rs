//! One-shot wake signal from the Producer to the Publisher.
//!
//! Binary semaphore semantics: at most one raise is pending, extra raises
//! while pending coalesce. A waiter consumes a pending raise immediately or
//! blocks up to its timeout.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Coalescing wake signal.
pub struct PacingSignal {
    pending: Mutex<bool>,
    raised: Condvar,
}

impl PacingSignal {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(false),
            raised: Condvar::new(),
        }
    }

    /// Raise the signal. Never blocks beyond the internal flag update.
    pub fn raise(&self) {
        let mut pending = self.pending.lock();
        *pending = true;
        drop(pending);
        self.raised.notify_one();
    }

    /// Consume a pending raise, waiting at most `timeout`.
    ///
    /// Returns `true` if a raise was consumed, `false` on timeout.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut pending = self.pending.lock();

        while !*pending {
            if self.raised.wait_until(&mut pending, deadline).timed_out() {
                break;
            }
        }

        core::mem::replace(&mut *pending, false)
    }

    /// Check for a pending raise without consuming it.
    pub fn is_pending(&self) -> bool {
        *self.pending.lock()
    }
}

impl Default for PacingSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_pending_raise_consumed_immediately() {
        let signal = PacingSignal::new();
        signal.raise();
        assert!(signal.is_pending());

        let start = Instant::now();
        assert!(signal.wait(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(!signal.is_pending());
    }

    #[test]
    fn test_raises_coalesce() {
        let signal = PacingSignal::new();
        signal.raise();
        signal.raise();
        signal.raise();

        assert!(signal.wait(Duration::from_millis(10)));
        assert!(!signal.wait(Duration::from_millis(10)));
    }

    #[test]
    fn test_wait_times_out() {
        let signal = PacingSignal::new();
        let start = Instant::now();
        assert!(!signal.wait(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_raise_from_other_thread_wakes_waiter() {
        let signal = Arc::new(PacingSignal::new());
        let raiser = Arc::clone(&signal);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            raiser.raise();
        });

        assert!(signal.wait(Duration::from_secs(5)));
        handle.join().unwrap();
    }
}
