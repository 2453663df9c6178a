//! Periodic health report.
//!
//! Logs the pipeline counters, the relay depth and the history summary at
//! a fixed cadence. Reads only: never touches the shared metric lock.

use std::sync::Arc;
use std::time::Duration;

use crate::history::{BpmHistory, HistorySummary};
use crate::log_globals::PIPELINE_LOG;
use crate::relay::RelayQueue;
use crate::stats::{PipelineStats, StatsSnapshot};

/// One health report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HealthReport {
    pub stats: StatsSnapshot,
    pub relay_depth: usize,
    /// `None` when no value was recorded yet or the history lock expired.
    pub history: Option<HistorySummary>,
}

/// Health monitor task.
pub struct HealthMonitor {
    stats: Arc<PipelineStats>,
    relay: Arc<RelayQueue>,
    history: Arc<BpmHistory>,
}

impl HealthMonitor {
    pub fn new(stats: Arc<PipelineStats>, relay: Arc<RelayQueue>, history: Arc<BpmHistory>) -> Self {
        Self { stats, relay, history }
    }

    /// Collect and log one report.
    pub fn report(&self) -> HealthReport {
        let report = HealthReport {
            stats: self.stats.snapshot(),
            relay_depth: self.relay.len(),
            history: self.history.summary(),
        };

        let s = &report.stats;
        crate::task_info!(
            PIPELINE_LOG,
            "health: produced={} drops={} timeouts={} published={}/{} errors={}",
            s.produced,
            s.relay_drops,
            s.lock_timeouts,
            s.relayed_publishes,
            s.fallback_publishes,
            s.publish_errors
        );
        crate::task_info!(
            PIPELINE_LOG,
            "health: overrides={}/{} attr r={} w={}/{} refresh={} relay={}/{}",
            s.overrides_accepted,
            s.overrides_rejected,
            s.attribute_reads,
            s.attribute_writes,
            s.attribute_writes_rejected,
            s.broadcast_refreshes,
            report.relay_depth,
            self.relay.capacity()
        );
        if let Some(h) = report.history {
            crate::task_info!(
                PIPELINE_LOG,
                "health: last {} bpm min={} max={} mean={}",
                h.count,
                h.min,
                h.max,
                h.mean
            );
        }

        report
    }

    /// Task body: report every `period`, forever.
    pub fn run(self, period: Duration) -> ! {
        loop {
            std::thread::sleep(period);
            self.report();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CONFIG;
    use crate::pipeline::Pipeline;

    #[test]
    fn test_report_reflects_pipeline() {
        let pipeline = Pipeline::new(&CONFIG.pipeline);
        let mut producer = pipeline.producer(|| 90);
        producer.tick();
        producer.tick();

        let monitor = pipeline.health();
        let report = monitor.report();

        assert_eq!(report.stats.produced, 2);
        assert_eq!(report.relay_depth, 2);
        assert_eq!(
            report.history,
            Some(HistorySummary { count: 2, min: 90, max: 90, mean: 90 })
        );
    }

    #[test]
    fn test_report_without_history() {
        let pipeline = Pipeline::new(&CONFIG.pipeline);
        let report = pipeline.health().report();
        assert_eq!(report.history, None);
        assert_eq!(report.relay_depth, 0);
    }
}
