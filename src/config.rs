//! Module: config
//!
//! Purpose: Build-time configuration for Hexagon Watch.
//!
//! Architecture:
//! - Everything is a compile-time constant in [`CONFIG`]
//! - Credentials and broker endpoint can be overridden through the build
//!   environment (`WIFI_SSID`, `WIFI_PASS`, `MQTT_BROKER_URI`, `MQTT_TOPIC`)
//! - No runtime changes, no persistence

use std::time::Duration;

use crate::bpm::{BpmValue, INITIAL_BPM};

/// Relay queue capacity. Sizes the queue type, so it is a constant rather
/// than a field of [`CONFIG`].
pub const RELAY_CAPACITY: usize = 5;

/// BPM history window length (type-level, like [`RELAY_CAPACITY`]).
pub const HISTORY_WINDOW: usize = 50;

/// Pick a build-environment override or fall back to a default.
macro_rules! env_or {
    ($key:literal, $default:expr) => {
        match option_env!($key) {
            Some(value) => value,
            None => $default,
        }
    };
}

/// FreeRTOS task parameters for one pipeline task.
#[derive(Clone, Copy, Debug)]
pub struct TaskConfig {
    pub name: &'static str,
    pub stack_size: usize,
    pub priority: u8,
}

/// Radio (GATT) side.
#[derive(Clone, Copy, Debug)]
pub struct RadioConfig {
    pub device_name: &'static str,
    pub app_id: u16,
    pub service_uuid: u16,
    /// Handles reserved for the service (service + attributes + descriptors).
    pub service_handles: u16,
    /// Read/write scalar mirrored into the shared metric on write.
    pub control_uuid: u16,
    /// Read/write scalar, storage only.
    pub auxiliary_uuid: u16,
    /// Read/broadcast BPM mirror (Heart Rate Measurement).
    pub broadcast_uuid: u16,
    pub control_initial: BpmValue,
    pub auxiliary_initial: BpmValue,
    pub broadcast_initial: BpmValue,
}

/// Network side.
#[derive(Clone, Copy, Debug)]
pub struct NetworkConfig {
    pub wifi_ssid: &'static str,
    pub wifi_password: &'static str,
    pub broker_uri: &'static str,
    pub topic: &'static str,
    /// Bound on waiting for the shared broker client (publish, subscribe).
    pub client_lock_wait: Duration,
    /// Pause before retrying a failed subscription.
    pub resubscribe_delay: Duration,
}

/// Pipeline cadences and sizes.
#[derive(Clone, Copy, Debug)]
pub struct PipelineConfig {
    pub initial_bpm: BpmValue,
    pub produce_period: Duration,
    /// Longest the Publisher waits before republishing the shared metric.
    pub publish_timeout: Duration,
    pub broadcast_refresh: Duration,
    pub health_period: Duration,
    /// Bound on every shared-metric lock acquisition.
    pub lock_wait: Duration,
}

/// Complete firmware configuration.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    pub radio: RadioConfig,
    pub network: NetworkConfig,
    pub pipeline: PipelineConfig,
    pub producer_task: TaskConfig,
    pub publisher_task: TaskConfig,
    pub refresher_task: TaskConfig,
    pub health_task: TaskConfig,
    pub log_task: TaskConfig,
    /// Broker event loop (inbound override context).
    pub mqtt_task: TaskConfig,
    /// Subscribes outside the broker event context.
    pub subscriber_task: TaskConfig,
}

/// The firmware configuration.
pub const CONFIG: Config = Config {
    radio: RadioConfig {
        device_name: "Hexagon Watch",
        app_id: 0,
        service_uuid: 0x1234,
        service_handles: 10,
        control_uuid: 0x5678,
        auxiliary_uuid: 0x9ABC,
        broadcast_uuid: 0x2A37,
        control_initial: 0,
        auxiliary_initial: 42,
        broadcast_initial: INITIAL_BPM,
    },
    network: NetworkConfig {
        wifi_ssid: env_or!("WIFI_SSID", "teamHexagon"),
        wifi_password: env_or!("WIFI_PASS", "hexagon6"),
        broker_uri: env_or!("MQTT_BROKER_URI", "mqtt://broker.hivemq.com:1883"),
        topic: env_or!("MQTT_TOPIC", "hexagon"),
        client_lock_wait: Duration::from_millis(500),
        resubscribe_delay: Duration::from_secs(2),
    },
    pipeline: PipelineConfig {
        initial_bpm: INITIAL_BPM,
        produce_period: Duration::from_secs(5),
        publish_timeout: Duration::from_secs(5),
        broadcast_refresh: Duration::from_secs(10),
        health_period: Duration::from_secs(10),
        lock_wait: Duration::from_millis(100),
    },
    producer_task: TaskConfig { name: "bpm-producer", stack_size: 4096, priority: 10 },
    publisher_task: TaskConfig { name: "bpm-publisher", stack_size: 6144, priority: 5 },
    refresher_task: TaskConfig { name: "bpm-broadcast", stack_size: 4096, priority: 5 },
    health_task: TaskConfig { name: "health", stack_size: 4096, priority: 1 },
    log_task: TaskConfig { name: "log-drain", stack_size: 4096, priority: 1 },
    mqtt_task: TaskConfig { name: "mqtt-events", stack_size: 6144, priority: 5 },
    subscriber_task: TaskConfig { name: "mqtt-subscribe", stack_size: 4096, priority: 4 },
};
