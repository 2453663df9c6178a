//! Shared state of the BPM pipeline and the constructors that wire tasks
//! to it.
//!
//! ```text
//!            ┌──────────┐  try_send   ┌───────────┐ recv  ┌───────────┐  publish
//!            │ Producer │────────────▶│RelayQueue │──────▶│ Publisher │──────────▶ broker
//!            └──────────┘             └───────────┘       └───────────┘
//!               │ write   raise ┌──────────────┐ wait        │ write / read
//!               │               │ PacingSignal │─────────────┤
//!               ▼               └──────────────┘             ▼
//!         ┌──────────────────────────────────────────────────────┐
//!         │                     SharedMetric                     │◀── InboundOverride ◀── broker
//!         └──────────────────────────────────────────────────────┘◀── attribute write
//!               │ read
//!               ▼
//!         BroadcastRefresher ──▶ radio attribute
//! ```
//!
//! Every handle is an `Arc` created once at boot and cloned into each task;
//! nothing is reached through a global.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::attribute::{AttributeRegistry, AttributeServer, BroadcastRefresher, RadioStack};
use crate::config::{PipelineConfig, RadioConfig};
use crate::health::HealthMonitor;
use crate::history::BpmHistory;
use crate::inbound::InboundOverride;
use crate::metric::SharedMetric;
use crate::pacing::PacingSignal;
use crate::producer::{BpmSource, Producer};
use crate::publisher::{Publish, Publisher};
use crate::relay::RelayQueue;
use crate::stats::PipelineStats;

/// Handles to all shared pipeline state.
#[derive(Clone)]
pub struct Pipeline {
    pub metric: Arc<SharedMetric>,
    pub relay: Arc<RelayQueue>,
    pub pacing: Arc<PacingSignal>,
    pub history: Arc<BpmHistory>,
    pub stats: Arc<PipelineStats>,
    publish_timeout: Duration,
}

impl Pipeline {
    /// Create the shared state with the boot value in the metric.
    pub fn new(config: &PipelineConfig) -> Self {
        let stats = Arc::new(PipelineStats::new());
        Self {
            metric: Arc::new(SharedMetric::new(config.initial_bpm, config.lock_wait, stats.clone())),
            relay: Arc::new(RelayQueue::new()),
            pacing: Arc::new(PacingSignal::new()),
            history: Arc::new(BpmHistory::new(config.lock_wait)),
            stats,
            publish_timeout: config.publish_timeout,
        }
    }

    /// Producer wired to this pipeline.
    pub fn producer<S: BpmSource>(&self, source: S) -> Producer<S> {
        Producer::new(
            source,
            self.relay.clone(),
            self.metric.clone(),
            self.pacing.clone(),
            self.history.clone(),
            self.stats.clone(),
        )
    }

    /// Publisher wired to this pipeline, publishing on `topic`.
    pub fn publisher<P: Publish>(&self, sink: P, topic: &'static str) -> Publisher<P> {
        Publisher::new(
            sink,
            topic,
            self.publish_timeout,
            self.relay.clone(),
            self.metric.clone(),
            self.pacing.clone(),
            self.stats.clone(),
        )
    }

    /// Inbound override handler accepting messages on `topic`.
    pub fn inbound(&self, topic: &'static str) -> InboundOverride {
        InboundOverride::new(topic, self.metric.clone(), self.stats.clone())
    }

    /// Health monitor over this pipeline's counters, relay and history.
    pub fn health(&self) -> HealthMonitor {
        HealthMonitor::new(self.stats.clone(), self.relay.clone(), self.history.clone())
    }

    /// Attribute server writing control values into this pipeline's metric.
    pub fn attribute_server<R: RadioStack>(
        &self,
        radio: Arc<R>,
        registry: Arc<Mutex<AttributeRegistry>>,
        config: RadioConfig,
    ) -> AttributeServer<R> {
        AttributeServer::new(radio, registry, self.metric.clone(), self.stats.clone(), config)
    }

    /// Broadcast refresher mirroring this pipeline's metric.
    pub fn broadcast_refresher<R: RadioStack>(
        &self,
        radio: Arc<R>,
        registry: Arc<Mutex<AttributeRegistry>>,
    ) -> BroadcastRefresher<R> {
        BroadcastRefresher::new(radio, registry, self.metric.clone(), self.stats.clone())
    }
}
