//! BPM publisher task.
//!
//! One cycle:
//!
//! ```text
//! relay.try_recv() ──some──────────────────────────────▶ metric.write(v), publish v
//!        │none
//!        ▼
//! pacing.wait(rest of cycle) ──▶ relay.try_recv() ──some──▶ metric.write(v), publish v
//!        │timeout                      │none, signal stale
//!        ▼                             └──▶ keep waiting until the deadline
//! publish metric.read()   (fallback)
//! ```
//!
//! The pacing signal races the cycle deadline: a fresh value is published
//! as soon as the Producer raises the signal, and the timeout only fires
//! when nothing new arrived. The cycle is never longer than the timeout
//! plus one metric lock wait and one publish call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::bpm::{BpmValue, Payload};
use crate::error::PublishError;
use crate::log_globals::PIPELINE_LOG;
use crate::metric::SharedMetric;
use crate::pacing::PacingSignal;
use crate::relay::RelayQueue;
use crate::stats::{Counter, PipelineStats};

/// Outbound side of the network channel.
pub trait Publish {
    /// Publish `payload` on `topic`. Must not block indefinitely.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError>;
}

impl<F> Publish for F
where
    F: FnMut(&str, &[u8]) -> Result<(), PublishError>,
{
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        self(topic, payload)
    }
}

/// Where a published value came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishSource {
    /// Fresh value taken from the relay queue.
    Relay,
    /// Nothing new within the timeout; shared metric republished.
    Fallback,
}

/// Outcome of one publisher cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublishReport {
    pub value: BpmValue,
    pub source: PublishSource,
    pub result: Result<(), PublishError>,
}

/// Publisher task state.
pub struct Publisher<P> {
    sink: P,
    topic: &'static str,
    timeout: Duration,
    relay: Arc<RelayQueue>,
    metric: Arc<SharedMetric>,
    pacing: Arc<PacingSignal>,
    stats: Arc<PipelineStats>,
}

impl<P: Publish> Publisher<P> {
    pub fn new(
        sink: P,
        topic: &'static str,
        timeout: Duration,
        relay: Arc<RelayQueue>,
        metric: Arc<SharedMetric>,
        pacing: Arc<PacingSignal>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self { sink, topic, timeout, relay, metric, pacing, stats }
    }

    /// Run one publish cycle (waits at most the configured timeout).
    pub fn cycle(&mut self) -> PublishReport {
        let (value, source) = match self.next_relayed() {
            Some(value) => {
                // Relayed value is authoritative
                self.metric.write(value);
                (value, PublishSource::Relay)
            }
            None => (self.metric.read(), PublishSource::Fallback),
        };

        let payload = Payload::new(value);
        let result = self.sink.publish(self.topic, payload.as_bytes());

        match result {
            Ok(()) => {
                self.stats.bump(match source {
                    PublishSource::Relay => Counter::RelayedPublish,
                    PublishSource::Fallback => Counter::FallbackPublish,
                });
                crate::task_info!(PIPELINE_LOG, "publisher: {} -> {} ({:?})", payload.as_str(), self.topic, source);
            }
            Err(e) => {
                self.stats.bump(Counter::PublishError);
                crate::task_warn!(PIPELINE_LOG, "publisher: {} not published: {}", payload.as_str(), e);
            }
        }

        PublishReport { value, source, result }
    }

    /// Task body: publish forever.
    pub fn run(mut self) -> ! {
        loop {
            self.cycle();
        }
    }

    /// Next relayed value, racing the pacing signal against the deadline.
    fn next_relayed(&self) -> Option<BpmValue> {
        if let Some(value) = self.relay.try_recv() {
            return Some(value);
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let woken = self.pacing.wait(remaining);

            if let Some(value) = self.relay.try_recv() {
                return Some(value);
            }
            // Stale raise: its value was already taken or was dropped
            if !woken || remaining.is_zero() {
                return None;
            }
        }
    }
}
