//! The shared BPM metric.
//!
//! One mutex-guarded scalar: the value every consumer ultimately reads.
//!
//! # Rules
//!
//! - The lock is held for a single get or set only, never across a radio
//!   or network call.
//! - Every acquisition is bounded by `lock_wait`. A timed-out read returns
//!   the last value this metric successfully observed; a timed-out write
//!   is skipped. Both are logged and counted, neither is an error.
//! - Writers (Producer, Publisher, InboundOverride, attribute write
//!   handler) race freely: last writer wins.

use core::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::bpm::BpmValue;
use crate::log_globals::PIPELINE_LOG;
use crate::stats::{Counter, PipelineStats};

/// Shared BPM cell with bounded-wait access.
pub struct SharedMetric {
    value: Mutex<BpmValue>,
    /// Last value read or written under the lock; the timeout fallback.
    last_observed: AtomicI32,
    lock_wait: Duration,
    stats: Arc<PipelineStats>,
}

impl SharedMetric {
    /// Create the metric with its boot value.
    pub fn new(initial: BpmValue, lock_wait: Duration, stats: Arc<PipelineStats>) -> Self {
        Self {
            value: Mutex::new(initial),
            last_observed: AtomicI32::new(initial),
            lock_wait,
            stats,
        }
    }

    /// Read the current value.
    ///
    /// Never blocks longer than the configured lock wait. On timeout,
    /// returns the last successfully observed value.
    pub fn read(&self) -> BpmValue {
        match self.try_read() {
            Some(value) => value,
            None => {
                let fallback = self.last_observed.load(Ordering::Acquire);
                crate::task_warn!(
                    PIPELINE_LOG,
                    "metric read: lock wait {}ms expired, using {}",
                    self.lock_wait.as_millis(),
                    fallback
                );
                fallback
            }
        }
    }

    /// Read the current value, `None` if the lock wait expired.
    ///
    /// Counts the timeout but does not log it.
    pub fn try_read(&self) -> Option<BpmValue> {
        match self.value.try_lock_for(self.lock_wait) {
            Some(guard) => {
                let value = *guard;
                // Under the lock, so the fallback never lags the cell
                self.last_observed.store(value, Ordering::Release);
                drop(guard);
                Some(value)
            }
            None => {
                self.stats.bump(Counter::LockTimeout);
                None
            }
        }
    }

    /// Overwrite the current value.
    ///
    /// Returns `false` if the lock wait expired and the update was skipped.
    pub fn write(&self, value: BpmValue) -> bool {
        match self.value.try_lock_for(self.lock_wait) {
            Some(mut guard) => {
                *guard = value;
                self.last_observed.store(value, Ordering::Release);
                drop(guard);
                true
            }
            None => {
                self.stats.bump(Counter::LockTimeout);
                crate::task_warn!(
                    PIPELINE_LOG,
                    "metric write: lock wait {}ms expired, {} skipped",
                    self.lock_wait.as_millis(),
                    value
                );
                false
            }
        }
    }
}
