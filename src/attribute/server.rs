//! Module: server
//!
//! Purpose: Attribute lifecycle state machine driven by radio-stack events.
//!
//! Architecture:
//! ```text
//! Unregistered ──Registered──▶ Registered ──ServiceCreated──▶ ServiceCreating
//!                                                                  │
//!                                                           AttributeAdded
//!                                                                  ▼
//!                     Ready ◀──(third handle)── AddingAttributes ◀─┘ (repeated)
//! ```
//! In `Ready` the machine serves reads and writes indefinitely. The link
//! sub-state (idle / advertising / connected) changes with GAP events and
//! never resets `Ready`.
//!
//! # Rules
//!
//! - The service is started only after all three attribute handles are
//!   recorded.
//! - A write that asks for a response is always acknowledged with OK, even
//!   when rejected, so the client is never left waiting.
//! - Rejected writes are logged and counted; storage is left unchanged.
//! - The registry lock is never held across a radio call.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::attribute::event::{AttStatus, ConnId, RadioEvent, RadioStack, TransId};
use crate::attribute::registry::{AttributeRegistry, AttributeRole, Handle};
use crate::bpm::BpmValue;
use crate::config::RadioConfig;
use crate::error::{RadioError, WriteRejection};
use crate::log_globals::EVENT_LOG;
use crate::metric::SharedMetric;
use crate::stats::{Counter, PipelineStats};

/// Attribute lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerState {
    Unregistered,
    Registered,
    ServiceCreating,
    AddingAttributes,
    Ready,
}

/// Link-level sub-state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Advertising,
    Connected(ConnId),
}

/// Attribute server.
pub struct AttributeServer<R> {
    radio: Arc<R>,
    registry: Arc<Mutex<AttributeRegistry>>,
    metric: Arc<SharedMetric>,
    stats: Arc<PipelineStats>,
    config: RadioConfig,
    state: ServerState,
    link: LinkState,
}

impl<R: RadioStack> AttributeServer<R> {
    pub fn new(
        radio: Arc<R>,
        registry: Arc<Mutex<AttributeRegistry>>,
        metric: Arc<SharedMetric>,
        stats: Arc<PipelineStats>,
        config: RadioConfig,
    ) -> Self {
        Self {
            radio,
            registry,
            metric,
            stats,
            config,
            state: ServerState::Unregistered,
            link: LinkState::Idle,
        }
    }

    #[inline]
    pub fn state(&self) -> ServerState {
        self.state
    }

    #[inline]
    pub fn link(&self) -> LinkState {
        self.link
    }

    /// Handle one radio event.
    ///
    /// # Errors
    ///
    /// The first radio command that failed. The state reached before the
    /// failure is kept.
    pub fn handle(&mut self, event: RadioEvent<'_>) -> Result<(), RadioError> {
        match event {
            RadioEvent::Registered { app_id } => self.on_registered(app_id),
            RadioEvent::ServiceCreated { service_handle } => self.on_service_created(service_handle),
            RadioEvent::AttributeAdded { uuid, handle } => self.on_attribute_added(uuid, handle),
            RadioEvent::Read { conn_id, trans_id, handle } => self.on_read(conn_id, trans_id, handle),
            RadioEvent::Write { conn_id, trans_id, handle, value, needs_response } => {
                self.on_write(conn_id, trans_id, handle, value, needs_response)
            }
            RadioEvent::Connected { conn_id } => {
                self.link = LinkState::Connected(conn_id);
                crate::task_info!(EVENT_LOG, "ble: client connected, conn_id={}", conn_id);
                Ok(())
            }
            RadioEvent::Disconnected { conn_id } => {
                self.link = LinkState::Idle;
                crate::task_info!(EVENT_LOG, "ble: client {} disconnected, advertising", conn_id);
                self.radio.start_advertising()
            }
            RadioEvent::AdvertisingConfigured => self.radio.start_advertising(),
            RadioEvent::AdvertisingStarted { ok: true } => {
                if self.link == LinkState::Idle {
                    self.link = LinkState::Advertising;
                }
                crate::task_info!(EVENT_LOG, "ble: advertising started");
                Ok(())
            }
            RadioEvent::AdvertisingStarted { ok: false } => {
                crate::task_error!(EVENT_LOG, "ble: advertising start failed");
                Ok(())
            }
            RadioEvent::AdvertisingStopped => {
                if self.link == LinkState::Advertising {
                    self.link = LinkState::Idle;
                }
                crate::task_info!(EVENT_LOG, "ble: advertising stopped, restarting");
                self.radio.start_advertising()
            }
        }
    }

    fn on_registered(&mut self, app_id: u16) -> Result<(), RadioError> {
        if self.state != ServerState::Unregistered {
            crate::task_warn!(EVENT_LOG, "ble: duplicate registration app_id={} ignored", app_id);
            return Ok(());
        }

        self.state = ServerState::Registered;
        crate::task_info!(EVENT_LOG, "ble: app {} registered", app_id);

        let service_uuid = self.registry.lock().service_uuid();
        self.radio.set_device_name(self.config.device_name)?;
        self.radio.configure_advertisement()?;
        self.radio.create_service(service_uuid, self.config.service_handles)
    }

    fn on_service_created(&mut self, service_handle: Handle) -> Result<(), RadioError> {
        if self.state != ServerState::Registered {
            crate::task_warn!(
                EVENT_LOG,
                "ble: service created in state {:?}, ignored",
                self.state
            );
            return Ok(());
        }

        let specs = {
            let mut registry = self.registry.lock();
            registry.set_service_handle(service_handle);
            registry.specs()
        };
        self.state = ServerState::ServiceCreating;
        crate::task_info!(EVENT_LOG, "ble: service created, handle={}", service_handle);

        for spec in &specs {
            let initial = crate::bpm::to_field(spec.initial);
            self.radio.add_attribute(service_handle, spec, &initial)?;
        }
        Ok(())
    }

    fn on_attribute_added(&mut self, uuid: u16, handle: Handle) -> Result<(), RadioError> {
        if !matches!(self.state, ServerState::ServiceCreating | ServerState::AddingAttributes) {
            crate::task_warn!(
                EVENT_LOG,
                "ble: attribute {:#06x} added in state {:?}, ignored",
                uuid,
                self.state
            );
            return Ok(());
        }

        let (role, complete, service_handle) = {
            let mut registry = self.registry.lock();
            let role = registry.assign(uuid, handle);
            (role, registry.is_complete(), registry.service_handle())
        };

        match role {
            Some(role) => {
                crate::task_info!(EVENT_LOG, "ble: {:?} attribute {:#06x} -> handle {}", role, uuid, handle);
            }
            None => {
                crate::task_warn!(EVENT_LOG, "ble: unexpected attribute {:#06x} ignored", uuid);
            }
        }
        self.state = ServerState::AddingAttributes;

        if complete {
            if let Some(service_handle) = service_handle {
                self.radio.start_service(service_handle)?;
                self.state = ServerState::Ready;
                crate::task_info!(EVENT_LOG, "ble: service started, ready");
            }
        }
        Ok(())
    }

    fn on_read(&mut self, conn_id: ConnId, trans_id: TransId, handle: Handle) -> Result<(), RadioError> {
        let value = if self.state == ServerState::Ready {
            let registry = self.registry.lock();
            registry.role_of(handle).map(|role| registry.value(role))
        } else {
            None
        };

        match value {
            Some(field) => {
                self.stats.bump(Counter::AttributeRead);
                crate::task_debug!(EVENT_LOG, "ble: read handle {} -> {:?}", handle, field);
                self.radio.send_response(conn_id, trans_id, handle, AttStatus::Ok, &field)
            }
            None => {
                crate::task_warn!(EVENT_LOG, "ble: read of unknown handle {}", handle);
                self.radio
                    .send_response(conn_id, trans_id, handle, AttStatus::InvalidHandle, &[])
            }
        }
    }

    fn on_write(
        &mut self,
        conn_id: ConnId,
        trans_id: TransId,
        handle: Handle,
        value: &[u8],
        needs_response: bool,
    ) -> Result<(), RadioError> {
        match self.apply_write(handle, value) {
            Ok((role, scalar)) => {
                self.stats.bump(Counter::AttributeWrite);
                crate::task_info!(EVENT_LOG, "ble: {:?} written, value={}", role, scalar);
                if role == AttributeRole::Control {
                    self.metric.write(scalar);
                }
            }
            Err(rejection) => {
                self.stats.bump(Counter::AttributeWriteRejected);
                crate::task_warn!(
                    EVENT_LOG,
                    "ble: write to handle {} rejected [{}]: {}",
                    handle,
                    rejection.code(),
                    rejection
                );
            }
        }

        if needs_response {
            self.radio
                .send_response(conn_id, trans_id, handle, AttStatus::Ok, &[])?;
        }
        Ok(())
    }

    /// Store a client write, returning the role and its decoded value.
    fn apply_write(
        &self,
        handle: Handle,
        value: &[u8],
    ) -> Result<(AttributeRole, BpmValue), WriteRejection> {
        if self.state != ServerState::Ready {
            return Err(WriteRejection::NotReady);
        }

        let mut registry = self.registry.lock();
        let role = registry.role_of(handle).ok_or(WriteRejection::UnknownHandle)?;
        registry.write(role, value)?;
        Ok((role, registry.scalar(role)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::registry::AttributeSpec;
    use crate::config::CONFIG;
    use crate::pipeline::Pipeline;

    #[derive(Default)]
    struct NullRadio {
        started: Mutex<u32>,
    }

    impl RadioStack for NullRadio {
        fn set_device_name(&self, _: &str) -> Result<(), RadioError> {
            Ok(())
        }
        fn configure_advertisement(&self) -> Result<(), RadioError> {
            Ok(())
        }
        fn create_service(&self, _: u16, _: u16) -> Result<(), RadioError> {
            Ok(())
        }
        fn add_attribute(&self, _: Handle, _: &AttributeSpec, _: &[u8]) -> Result<(), RadioError> {
            Ok(())
        }
        fn start_service(&self, _: Handle) -> Result<(), RadioError> {
            *self.started.lock() += 1;
            Ok(())
        }
        fn send_response(&self, _: ConnId, _: TransId, _: Handle, _: AttStatus, _: &[u8]) -> Result<(), RadioError> {
            Ok(())
        }
        fn set_attribute_value(&self, _: Handle, _: &[u8]) -> Result<(), RadioError> {
            Ok(())
        }
        fn start_advertising(&self) -> Result<(), RadioError> {
            Err(RadioError::command("start_advertising", -1))
        }
    }

    fn server() -> (AttributeServer<NullRadio>, Arc<NullRadio>) {
        let pipeline = Pipeline::new(&CONFIG.pipeline);
        let radio = Arc::new(NullRadio::default());
        let registry = Arc::new(Mutex::new(AttributeRegistry::new(&CONFIG.radio)));
        let server = AttributeServer::new(
            Arc::clone(&radio),
            registry,
            pipeline.metric,
            pipeline.stats,
            CONFIG.radio,
        );
        (server, radio)
    }

    #[test]
    fn test_out_of_order_events_ignored() {
        let (mut server, radio) = server();

        server.handle(RadioEvent::ServiceCreated { service_handle: 40 }).unwrap();
        assert_eq!(server.state(), ServerState::Unregistered);

        server.handle(RadioEvent::AttributeAdded { uuid: 0x5678, handle: 42 }).unwrap();
        assert_eq!(server.state(), ServerState::Unregistered);
        assert_eq!(*radio.started.lock(), 0);
    }

    #[test]
    fn test_radio_failure_propagates() {
        let (mut server, _radio) = server();
        let err = server.handle(RadioEvent::AdvertisingConfigured).unwrap_err();
        assert_eq!(err, RadioError::command("start_advertising", -1));
    }

    #[test]
    fn test_link_tracks_connection() {
        let (mut server, _radio) = server();

        server.handle(RadioEvent::AdvertisingStarted { ok: true }).unwrap();
        assert_eq!(server.link(), LinkState::Advertising);

        server.handle(RadioEvent::Connected { conn_id: 3 }).unwrap();
        assert_eq!(server.link(), LinkState::Connected(3));
    }
}
