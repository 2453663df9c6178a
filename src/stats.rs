//! Pipeline counters.
//!
//! Every recoverable condition in the BPM pipeline is counted here instead
//! of being returned to a caller: a dropped relay value, a lock-wait
//! timeout, a rejected payload. Counters only grow; the health monitor
//! reads them through [`PipelineStats::snapshot`].

use core::sync::atomic::{AtomicU32, Ordering};

/// Thread-safe pipeline counters.
///
/// Shared by all tasks (`Arc<PipelineStats>`).
#[derive(Default)]
pub struct PipelineStats {
    produced: AtomicU32,
    relay_drops: AtomicU32,
    lock_timeouts: AtomicU32,
    relayed_publishes: AtomicU32,
    fallback_publishes: AtomicU32,
    publish_errors: AtomicU32,
    overrides_accepted: AtomicU32,
    overrides_rejected: AtomicU32,
    attribute_reads: AtomicU32,
    attribute_writes: AtomicU32,
    attribute_writes_rejected: AtomicU32,
    broadcast_refreshes: AtomicU32,
}

/// One counter of [`PipelineStats`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Counter {
    /// Value generated by the Producer.
    Produced,
    /// Value dropped because the relay queue was full.
    RelayDrop,
    /// Bounded lock wait expired (metric or history).
    LockTimeout,
    /// Publisher published a value taken from the relay queue.
    RelayedPublish,
    /// Publisher republished the shared metric.
    FallbackPublish,
    /// Network publish failed.
    PublishError,
    /// Inbound override written into the shared metric.
    OverrideAccepted,
    /// Inbound payload rejected by the parser.
    OverrideRejected,
    AttributeRead,
    AttributeWrite,
    /// Attribute write ignored (oversized, unknown handle, read-only).
    AttributeWriteRejected,
    BroadcastRefresh,
}

impl PipelineStats {
    /// All counters at zero.
    pub const fn new() -> Self {
        Self {
            produced: AtomicU32::new(0),
            relay_drops: AtomicU32::new(0),
            lock_timeouts: AtomicU32::new(0),
            relayed_publishes: AtomicU32::new(0),
            fallback_publishes: AtomicU32::new(0),
            publish_errors: AtomicU32::new(0),
            overrides_accepted: AtomicU32::new(0),
            overrides_rejected: AtomicU32::new(0),
            attribute_reads: AtomicU32::new(0),
            attribute_writes: AtomicU32::new(0),
            attribute_writes_rejected: AtomicU32::new(0),
            broadcast_refreshes: AtomicU32::new(0),
        }
    }

    fn cell(&self, counter: Counter) -> &AtomicU32 {
        match counter {
            Counter::Produced => &self.produced,
            Counter::RelayDrop => &self.relay_drops,
            Counter::LockTimeout => &self.lock_timeouts,
            Counter::RelayedPublish => &self.relayed_publishes,
            Counter::FallbackPublish => &self.fallback_publishes,
            Counter::PublishError => &self.publish_errors,
            Counter::OverrideAccepted => &self.overrides_accepted,
            Counter::OverrideRejected => &self.overrides_rejected,
            Counter::AttributeRead => &self.attribute_reads,
            Counter::AttributeWrite => &self.attribute_writes,
            Counter::AttributeWriteRejected => &self.attribute_writes_rejected,
            Counter::BroadcastRefresh => &self.broadcast_refreshes,
        }
    }

    /// Increment a counter.
    #[inline]
    pub fn bump(&self, counter: Counter) {
        self.cell(counter).fetch_add(1, Ordering::Relaxed);
    }

    /// Read a single counter.
    #[inline]
    pub fn get(&self, counter: Counter) -> u32 {
        self.cell(counter).load(Ordering::Relaxed)
    }

    /// Get a snapshot of all counters.
    ///
    /// Counters are read one at a time; the snapshot is not atomic across
    /// counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            produced: self.get(Counter::Produced),
            relay_drops: self.get(Counter::RelayDrop),
            lock_timeouts: self.get(Counter::LockTimeout),
            relayed_publishes: self.get(Counter::RelayedPublish),
            fallback_publishes: self.get(Counter::FallbackPublish),
            publish_errors: self.get(Counter::PublishError),
            overrides_accepted: self.get(Counter::OverrideAccepted),
            overrides_rejected: self.get(Counter::OverrideRejected),
            attribute_reads: self.get(Counter::AttributeRead),
            attribute_writes: self.get(Counter::AttributeWrite),
            attribute_writes_rejected: self.get(Counter::AttributeWriteRejected),
            broadcast_refreshes: self.get(Counter::BroadcastRefresh),
        }
    }
}

/// Snapshot of pipeline counters at a point in time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub produced: u32,
    pub relay_drops: u32,
    pub lock_timeouts: u32,
    pub relayed_publishes: u32,
    pub fallback_publishes: u32,
    pub publish_errors: u32,
    pub overrides_accepted: u32,
    pub overrides_rejected: u32,
    pub attribute_reads: u32,
    pub attribute_writes: u32,
    pub attribute_writes_rejected: u32,
    pub broadcast_refreshes: u32,
}

impl StatsSnapshot {
    /// Total publishes attempted on the network channel.
    pub fn publishes(&self) -> u32 {
        self.relayed_publishes + self.fallback_publishes
    }
}
