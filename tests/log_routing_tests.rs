//! Log stream routing: pipeline tasks log to PIPELINE_LOG, callback
//! contexts to EVENT_LOG.
//!
//! Single test in its own binary: the streams are process globals.

use std::sync::Arc;

use parking_lot::Mutex;

use hexagon_watch::attribute::{
    AttStatus, AttributeRegistry, AttributeSpec, ConnId, Handle, RadioStack, TransId, Uuid16,
};
use hexagon_watch::config::CONFIG;
use hexagon_watch::error::RadioError;
use hexagon_watch::log_globals::{EVENT_LOG, PIPELINE_LOG};
use hexagon_watch::logging::LogStream;
use hexagon_watch::Pipeline;

struct SilentRadio;

impl RadioStack for SilentRadio {
    fn set_device_name(&self, _: &str) -> Result<(), RadioError> {
        Ok(())
    }
    fn configure_advertisement(&self) -> Result<(), RadioError> {
        Ok(())
    }
    fn create_service(&self, _: Uuid16, _: u16) -> Result<(), RadioError> {
        Ok(())
    }
    fn add_attribute(&self, _: Handle, _: &AttributeSpec, _: &[u8]) -> Result<(), RadioError> {
        Ok(())
    }
    fn start_service(&self, _: Handle) -> Result<(), RadioError> {
        Ok(())
    }
    fn send_response(&self, _: ConnId, _: TransId, _: Handle, _: AttStatus, _: &[u8]) -> Result<(), RadioError> {
        Ok(())
    }
    fn set_attribute_value(&self, _: Handle, _: &[u8]) -> Result<(), RadioError> {
        Ok(())
    }
    fn start_advertising(&self) -> Result<(), RadioError> {
        Ok(())
    }
}

fn drain_texts(stream: &LogStream) -> Vec<String> {
    std::iter::from_fn(|| stream.drain()).map(|e| e.text().to_string()).collect()
}

#[test]
fn test_tasks_log_to_their_streams() {
    let pipeline = Pipeline::new(&CONFIG.pipeline);
    drain_texts(&PIPELINE_LOG);
    drain_texts(&EVENT_LOG);

    // Broadcast refresher is a pipeline task
    let registry = Arc::new(Mutex::new(AttributeRegistry::new(&CONFIG.radio)));
    let refresher = pipeline.broadcast_refresher(Arc::new(SilentRadio), registry);
    pipeline.metric.write(131);
    refresher.refresh().unwrap();

    // Inbound override runs in the network callback context
    pipeline.inbound("hexagon").handle("hexagon", b"85");

    let pipeline_lines = drain_texts(&PIPELINE_LOG);
    let event_lines = drain_texts(&EVENT_LOG);

    assert!(pipeline_lines.iter().any(|l| l.starts_with("broadcast: refreshed to 131")));
    assert!(!event_lines.iter().any(|l| l.starts_with("broadcast:")));
    assert!(event_lines.iter().any(|l| l.starts_with("inbound: BPM overridden to 85")));
}
