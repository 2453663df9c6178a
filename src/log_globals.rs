//! Global log stream instances.
//!
//! One stream per execution context family, one drain task for both.

use crate::logging::LogStream;

/// Pipeline log stream.
///
/// Producer, Publisher, broadcast refresher and health monitor.
pub static PIPELINE_LOG: LogStream = LogStream::new();

/// Event log stream.
///
/// Radio (GATT/GAP) and network (MQTT) callback contexts.
pub static EVENT_LOG: LogStream = LogStream::new();
