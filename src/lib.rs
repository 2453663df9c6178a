//! # Hexagon Watch
//!
//! Heart-rate smartwatch firmware: one shared BPM value, exposed over a
//! BLE attribute service and exchanged with an MQTT broker.
//!
//! ## Architecture
//!
//! All pipeline state lives in [`Pipeline`]: the [`SharedMetric`], the
//! bounded [`RelayQueue`], the [`PacingSignal`], the BPM history and the
//! counters. Tasks receive `Arc` handles at boot:
//! - Producer generates a value every period and pushes it everywhere
//! - Publisher forwards relayed values, or republishes the metric on timeout
//! - InboundOverride writes broker values straight into the metric
//! - [`session`] keeps broker client calls out of the broker event context
//! - AttributeServer serves reads/writes; the refresher mirrors the metric
//!   into the broadcast attribute
//!
//! No pipeline task calls the `log` facade directly; they write to the
//! lock-free streams in [`log_globals`], drained by [`log_drain`].
//!
//! Everything except [`platform`] builds and tests on the host.

pub mod attribute;
pub mod bpm;
pub mod config;
pub mod error;
pub mod health;
pub mod history;
pub mod inbound;
pub mod log_drain;
pub mod log_globals;
pub mod logging;
pub mod metric;
pub mod pacing;
pub mod pipeline;
pub mod producer;
pub mod publisher;
pub mod relay;
pub mod session;
pub mod stats;

#[cfg(target_os = "espidf")]
pub mod platform;

pub use bpm::BpmValue;
pub use config::CONFIG;
pub use metric::SharedMetric;
pub use pacing::PacingSignal;
pub use pipeline::Pipeline;
pub use relay::RelayQueue;
pub use stats::{PipelineStats, StatsSnapshot};
