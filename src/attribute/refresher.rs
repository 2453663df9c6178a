//! Periodic refresh of the broadcast attribute from the shared metric.
//!
//! Runs in its own task regardless of the server state. Before the
//! broadcast handle is assigned only the registry copy is updated.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::attribute::event::RadioStack;
use crate::attribute::registry::{AttributeRegistry, AttributeRole};
use crate::bpm::{self, BpmValue};
use crate::error::RadioError;
use crate::log_globals::PIPELINE_LOG;
use crate::metric::SharedMetric;
use crate::stats::{Counter, PipelineStats};

/// Copies the shared metric into the broadcast attribute.
pub struct BroadcastRefresher<R> {
    radio: Arc<R>,
    registry: Arc<Mutex<AttributeRegistry>>,
    metric: Arc<SharedMetric>,
    stats: Arc<PipelineStats>,
}

impl<R: RadioStack> BroadcastRefresher<R> {
    pub fn new(
        radio: Arc<R>,
        registry: Arc<Mutex<AttributeRegistry>>,
        metric: Arc<SharedMetric>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self { radio, registry, metric, stats }
    }

    /// Refresh once, returning the value now held by the attribute.
    ///
    /// # Errors
    ///
    /// The radio stack refused the attribute update. The registry copy is
    /// updated regardless.
    pub fn refresh(&self) -> Result<BpmValue, RadioError> {
        let value = self.metric.read();

        let handle = {
            let mut registry = self.registry.lock();
            registry.store(AttributeRole::Broadcast, value);
            registry.handle_of(AttributeRole::Broadcast)
        };
        self.stats.bump(Counter::BroadcastRefresh);

        if let Some(handle) = handle {
            self.radio.set_attribute_value(handle, &bpm::to_field(value))?;
        }
        crate::task_debug!(PIPELINE_LOG, "broadcast: refreshed to {}", value);
        Ok(value)
    }

    /// Task body: refresh every `period`, forever.
    pub fn run(self, period: Duration) -> ! {
        loop {
            std::thread::sleep(period);
            if let Err(e) = self.refresh() {
                crate::task_error!(PIPELINE_LOG, "broadcast: {}", e);
            }
        }
    }
}
