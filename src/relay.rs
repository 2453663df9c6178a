//! Bounded relay queue between the Producer and the Publisher.
//!
//! # Architecture
//!
//! ```text
//! Producer ──try_send──▶ [v0][v1][v2][v3][v4] ──try_recv / recv_timeout──▶ Publisher
//!                          FIFO, capacity 5
//! ```
//!
//! # Rules
//!
//! - Enqueue never blocks: a full queue rejects the NEWEST value and keeps
//!   its contents unchanged.
//! - Receive waits at most the given timeout.
//! - Insertion order is preserved.

use std::time::{Duration, Instant};

use heapless::Deque;
use parking_lot::{Condvar, Mutex};

use crate::bpm::BpmValue;
use crate::config::RELAY_CAPACITY;
use crate::error::RelayFull;

/// Bounded FIFO of BPM values.
///
/// Internally synchronized; share it as `Arc<RelayQueue>`. The internal
/// lock only guards the deque itself and is never held while waiting.
pub struct RelayQueue<const N: usize = RELAY_CAPACITY> {
    slots: Mutex<Deque<BpmValue, N>>,
    not_empty: Condvar,
}

impl<const N: usize> RelayQueue<N> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Deque::new()),
            not_empty: Condvar::new(),
        }
    }

    /// Enqueue without blocking.
    ///
    /// # Errors
    ///
    /// [`RelayFull`] carrying the rejected value if the queue is at capacity.
    pub fn try_send(&self, value: BpmValue) -> Result<(), RelayFull> {
        let mut slots = self.slots.lock();
        slots.push_back(value).map_err(RelayFull)?;
        drop(slots);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Dequeue the oldest value without blocking.
    pub fn try_recv(&self) -> Option<BpmValue> {
        self.slots.lock().pop_front()
    }

    /// Dequeue the oldest value, waiting at most `timeout` for one.
    ///
    /// Returns `None` on timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<BpmValue> {
        let deadline = Instant::now() + timeout;
        let mut slots = self.slots.lock();

        while slots.is_empty() {
            if self.not_empty.wait_until(&mut slots, deadline).timed_out() {
                break;
            }
        }

        slots.pop_front()
    }

    /// Number of queued values.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of queued values.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for RelayQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let q: RelayQueue = RelayQueue::new();
        q.try_send(70).unwrap();
        q.try_send(80).unwrap();
        q.try_send(90).unwrap();

        assert_eq!(q.len(), 3);
        assert_eq!(q.try_recv(), Some(70));
        assert_eq!(q.try_recv(), Some(80));
        assert_eq!(q.try_recv(), Some(90));
        assert_eq!(q.try_recv(), None);
    }

    #[test]
    fn test_full_rejects_newest() {
        let q: RelayQueue<2> = RelayQueue::new();
        q.try_send(1).unwrap();
        q.try_send(2).unwrap();

        assert_eq!(q.try_send(3), Err(RelayFull(3)));
        assert_eq!(q.len(), 2);
        assert_eq!(q.try_recv(), Some(1));
        assert_eq!(q.try_recv(), Some(2));
    }

    #[test]
    fn test_recv_timeout_expires_empty() {
        let q: RelayQueue = RelayQueue::new();
        let start = Instant::now();
        assert_eq!(q.recv_timeout(Duration::from_millis(20)), None);
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_recv_timeout_wakes_on_send() {
        use std::sync::Arc;
        use std::thread;

        let q: Arc<RelayQueue> = Arc::new(RelayQueue::new());
        let sender = Arc::clone(&q);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            sender.try_send(111).unwrap();
        });

        assert_eq!(q.recv_timeout(Duration::from_secs(5)), Some(111));
        handle.join().unwrap();
    }
}
