//! Bounded in-memory BPM history.
//!
//! The last [`HISTORY_WINDOW`](crate::config::HISTORY_WINDOW) produced values, oldest evicted first. This
//! is the only history the firmware keeps; nothing is persisted.

use std::time::Duration;

use heapless::HistoryBuffer;
use parking_lot::Mutex;

use crate::bpm::BpmValue;
use crate::config::HISTORY_WINDOW;

/// Aggregate over the current window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HistorySummary {
    pub count: usize,
    pub min: BpmValue,
    pub max: BpmValue,
    /// Integer mean, rounded toward zero.
    pub mean: BpmValue,
}

/// Fixed window of recent BPM values.
///
/// Access is bounded like the shared metric: a call that cannot get the
/// lock within `lock_wait` gives up (`false` / `None` / `0`).
pub struct BpmHistory<const N: usize = HISTORY_WINDOW> {
    window: Mutex<HistoryBuffer<BpmValue, N>>,
    lock_wait: Duration,
}

impl<const N: usize> BpmHistory<N> {
    pub fn new(lock_wait: Duration) -> Self {
        Self {
            window: Mutex::new(HistoryBuffer::new()),
            lock_wait,
        }
    }

    /// Append a value, evicting the oldest if the window is full.
    pub fn record(&self, value: BpmValue) -> bool {
        match self.window.try_lock_for(self.lock_wait) {
            Some(mut window) => {
                window.write(value);
                true
            }
            None => false,
        }
    }

    /// Copy the window into `out`, oldest first.
    ///
    /// Returns the number of values copied (bounded by `out.len()`).
    pub fn snapshot(&self, out: &mut [BpmValue]) -> usize {
        let Some(window) = self.window.try_lock_for(self.lock_wait) else {
            return 0;
        };

        let mut count = 0;
        for (slot, value) in out.iter_mut().zip(window.oldest_ordered()) {
            *slot = *value;
            count += 1;
        }
        count
    }

    /// Min / max / mean of the window, `None` if empty or lock expired.
    pub fn summary(&self) -> Option<HistorySummary> {
        let window = self.window.try_lock_for(self.lock_wait)?;
        if window.is_empty() {
            return None;
        }

        let mut min = BpmValue::MAX;
        let mut max = BpmValue::MIN;
        let mut sum: i64 = 0;
        for &value in window.oldest_ordered() {
            min = min.min(value);
            max = max.max(value);
            sum += i64::from(value);
        }

        let count = window.len();
        Some(HistorySummary {
            count,
            min,
            max,
            mean: (sum / count as i64) as BpmValue,
        })
    }

    /// Drop all recorded values.
    pub fn clear(&self) -> bool {
        match self.window.try_lock_for(self.lock_wait) {
            Some(mut window) => {
                window.clear();
                true
            }
            None => false,
        }
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_millis(10);

    #[test]
    fn test_snapshot_oldest_first() {
        let history: BpmHistory<4> = BpmHistory::new(WAIT);
        for v in [61, 62, 63] {
            assert!(history.record(v));
        }

        let mut out = [0; 4];
        assert_eq!(history.snapshot(&mut out), 3);
        assert_eq!(&out[..3], &[61, 62, 63]);
    }

    #[test]
    fn test_window_evicts_oldest() {
        let history: BpmHistory<3> = BpmHistory::new(WAIT);
        for v in [70, 71, 72, 73, 74] {
            history.record(v);
        }

        let mut out = [0; 8];
        assert_eq!(history.snapshot(&mut out), 3);
        assert_eq!(&out[..3], &[72, 73, 74]);
    }

    #[test]
    fn test_summary() {
        let history: BpmHistory = BpmHistory::new(WAIT);
        assert_eq!(history.summary(), None);

        for v in [60, 100, 80] {
            history.record(v);
        }
        assert_eq!(
            history.summary(),
            Some(HistorySummary { count: 3, min: 60, max: 100, mean: 80 })
        );

        assert!(history.clear());
        assert_eq!(history.summary(), None);
    }

    #[test]
    fn test_lock_timeout_gives_up() {
        let history: BpmHistory<4> = BpmHistory::new(WAIT);
        let held = history.window.lock();
        assert!(!history.record(90));
        assert_eq!(history.summary(), None);
        drop(held);
        assert!(history.record(90));
    }
}
