//! BPM producer task.
//!
//! Each tick:
//! 1. Generate a value (uniform over [60, 160] in production)
//! 2. Offer it to the relay queue; a full queue drops it (logged, counted)
//! 3. Write it into the shared metric (bounded wait)
//! 4. Record it in the history window
//! 5. Raise the pacing signal
//!
//! Relay overflow never delays steps 3-5: the metric, and through it the
//! attribute path, keeps moving even when the Publisher is stalled.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::bpm::{self, BpmValue, BPM_MAX, BPM_MIN};
use crate::history::BpmHistory;
use crate::log_globals::PIPELINE_LOG;
use crate::metric::SharedMetric;
use crate::pacing::PacingSignal;
use crate::relay::RelayQueue;
use crate::stats::{Counter, PipelineStats};

/// Where new BPM values come from.
pub trait BpmSource {
    fn next_bpm(&mut self) -> BpmValue;
}

impl<F: FnMut() -> BpmValue> BpmSource for F {
    fn next_bpm(&mut self) -> BpmValue {
        self()
    }
}

/// Uniform random BPM over the generated range.
pub struct RandomBpm {
    rng: StdRng,
}

impl RandomBpm {
    /// Seed from the platform entropy source (hardware RNG on ESP32).
    pub fn from_entropy() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    /// Deterministic sequence, for tests and replay.
    pub fn with_seed(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }
}

impl BpmSource for RandomBpm {
    fn next_bpm(&mut self) -> BpmValue {
        self.rng.gen_range(BPM_MIN..=BPM_MAX)
    }
}

/// Outcome of one producer tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProduceReport {
    pub value: BpmValue,
    /// Value entered the relay queue.
    pub relayed: bool,
    /// Value reached the shared metric (lock wait did not expire).
    pub stored: bool,
}

/// Producer task state.
pub struct Producer<S> {
    source: S,
    relay: Arc<RelayQueue>,
    metric: Arc<SharedMetric>,
    pacing: Arc<PacingSignal>,
    history: Arc<BpmHistory>,
    stats: Arc<PipelineStats>,
}

impl<S: BpmSource> Producer<S> {
    pub fn new(
        source: S,
        relay: Arc<RelayQueue>,
        metric: Arc<SharedMetric>,
        pacing: Arc<PacingSignal>,
        history: Arc<BpmHistory>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self { source, relay, metric, pacing, history, stats }
    }

    /// Produce one value and propagate it.
    pub fn tick(&mut self) -> ProduceReport {
        let value = self.source.next_bpm();
        self.stats.bump(Counter::Produced);
        if !bpm::in_generated_range(value) {
            crate::task_warn!(PIPELINE_LOG, "producer: source value {} outside [{}, {}]", value, BPM_MIN, BPM_MAX);
        }

        let relayed = match self.relay.try_send(value) {
            Ok(()) => true,
            Err(full) => {
                self.stats.bump(Counter::RelayDrop);
                crate::task_warn!(PIPELINE_LOG, "producer: {}", full);
                false
            }
        };

        let stored = self.metric.write(value);
        if !self.history.record(value) {
            self.stats.bump(Counter::LockTimeout);
        }
        self.pacing.raise();

        crate::task_info!(PIPELINE_LOG, "producer: new BPM {} (relay depth {})", value, self.relay.len());

        ProduceReport { value, relayed, stored }
    }

    /// Task body: tick every `period`, forever.
    pub fn run(mut self, period: Duration) -> ! {
        loop {
            self.tick();
            std::thread::sleep(period);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use crate::config::CONFIG;

    #[test]
    fn test_random_source_in_range() {
        let mut source = RandomBpm::with_seed(7);
        for _ in 0..1000 {
            let v = source.next_bpm();
            assert!((BPM_MIN..=BPM_MAX).contains(&v), "{} out of range", v);
        }
    }

    #[test]
    fn test_tick_propagates_everywhere() {
        let pipeline = Pipeline::new(&CONFIG.pipeline);
        let mut producer = pipeline.producer(|| 72);

        let report = producer.tick();
        assert_eq!(report, ProduceReport { value: 72, relayed: true, stored: true });

        assert_eq!(pipeline.metric.read(), 72);
        assert_eq!(pipeline.relay.try_recv(), Some(72));
        assert!(pipeline.pacing.is_pending());
        assert_eq!(pipeline.history.summary().map(|s| s.count), Some(1));
    }

    #[test]
    fn test_relay_overflow_does_not_stall_metric() {
        let pipeline = Pipeline::new(&CONFIG.pipeline);
        let mut next = 60;
        let mut producer = pipeline.producer(move || {
            next += 1;
            next
        });

        for _ in 0..pipeline.relay.capacity() {
            assert!(producer.tick().relayed);
        }
        let report = producer.tick();
        assert!(!report.relayed);
        assert!(report.stored);
        assert_eq!(pipeline.metric.read(), report.value);
        assert_eq!(pipeline.stats.snapshot().relay_drops, 1);
    }

    #[test]
    fn test_out_of_range_source_still_propagates() {
        let pipeline = Pipeline::new(&CONFIG.pipeline);
        let mut producer = pipeline.producer(|| 200);

        let report = producer.tick();
        assert!(!bpm::in_generated_range(report.value));
        assert!(report.relayed && report.stored);
        assert_eq!(pipeline.metric.read(), 200);
    }
}
