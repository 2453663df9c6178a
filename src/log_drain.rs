//! Log drain task.
//!
//! Moves entries from the lock-free streams into the `log` facade, which
//! `EspLogger` prints on the serial console. Runs at the lowest priority:
//! blocking on the console here never stalls a pipeline task.
//!
//! ```text
//! PIPELINE_LOG ──drain──▶ log!(target: "pipeline")
//! EVENT_LOG    ──drain──▶ log!(target: "event")     ──▶ EspLogger / UART
//! ```

use std::time::Duration;

use crate::log_globals::{EVENT_LOG, PIPELINE_LOG};
use crate::logging::{self, LogEntry, LogStream};

/// Interval between dropped-message reports.
pub const DROPPED_REPORT_INTERVAL_US: i64 = 10_000_000;

/// Sleep when both streams are empty.
pub const IDLE_DELAY: Duration = Duration::from_millis(10);

/// Emit one entry on the `log` facade.
fn emit(target: &str, entry: &LogEntry) {
    log::log!(
        target: target,
        entry.level.to_log(),
        "[{:10}] {}",
        entry.timestamp_us,
        entry.text()
    );
}

/// Drain every ready entry of `stream` under `target`.
///
/// Returns the number of entries emitted.
pub fn drain_stream<const N: usize>(stream: &LogStream<N>, target: &str) -> usize {
    let mut count = 0;
    while let Some(entry) = stream.drain() {
        emit(target, &entry);
        count += 1;
    }
    count
}

/// Rate limiter for the dropped-message report.
#[derive(Debug, Default)]
pub struct DropReporter {
    last_report_us: i64,
}

impl DropReporter {
    pub fn new(now_us: i64) -> Self {
        Self { last_report_us: now_us }
    }

    /// Once per interval, take the dropped counts of both streams.
    ///
    /// Returns `Some((pipeline, event))` if anything was dropped since the
    /// last report; the counters are reset when reported.
    pub fn check<const N: usize>(
        &mut self,
        now_us: i64,
        pipeline: &LogStream<N>,
        event: &LogStream<N>,
    ) -> Option<(u32, u32)> {
        if now_us - self.last_report_us < DROPPED_REPORT_INTERVAL_US {
            return None;
        }
        self.last_report_us = now_us;

        let dropped = (pipeline.dropped(), event.dropped());
        if dropped == (0, 0) {
            return None;
        }
        pipeline.reset_dropped();
        event.reset_dropped();
        Some(dropped)
    }
}

/// Drain task body.
pub fn log_drain_task() -> ! {
    let mut reporter = DropReporter::new(logging::timestamp_us());

    loop {
        let drained = drain_stream(&PIPELINE_LOG, "pipeline") + drain_stream(&EVENT_LOG, "event");

        if let Some((pipeline, event)) =
            reporter.check(logging::timestamp_us(), &PIPELINE_LOG, &EVENT_LOG)
        {
            log::warn!("log messages dropped: pipeline={}, event={}", pipeline, event);
        }

        if drained == 0 {
            std::thread::sleep(IDLE_DELAY);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogLevel;

    #[test]
    fn test_drain_stream_empties_stream() {
        let stream: LogStream<8> = LogStream::new();
        stream.push(1, LogLevel::Info, b"one");
        stream.push(2, LogLevel::Warn, b"two");

        assert_eq!(drain_stream(&stream, "test"), 2);
        assert_eq!(stream.pending(), 0);
        assert_eq!(drain_stream(&stream, "test"), 0);
    }

    #[test]
    fn test_drop_report_rate_limited() {
        let pipeline: LogStream<2> = LogStream::new();
        let event: LogStream<2> = LogStream::new();
        for _ in 0..4 {
            pipeline.push(0, LogLevel::Info, b"x");
        }

        let mut reporter = DropReporter::new(0);
        assert_eq!(reporter.check(1_000_000, &pipeline, &event), None);
        assert_eq!(reporter.check(DROPPED_REPORT_INTERVAL_US, &pipeline, &event), Some((2, 0)));
        assert_eq!(pipeline.dropped(), 0);
    }

    #[test]
    fn test_no_report_without_drops() {
        let pipeline: LogStream<2> = LogStream::new();
        let event: LogStream<2> = LogStream::new();

        let mut reporter = DropReporter::new(0);
        assert_eq!(reporter.check(DROPPED_REPORT_INTERVAL_US * 2, &pipeline, &event), None);
    }
}
