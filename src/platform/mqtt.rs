//! MQTT adapter: [`BrokerClient`] over `EspMqttClient` and the inbound
//! event loop.
//!
//! ```text
//! Publisher ──SessionSink──▶ BrokerSession ──▶ EspMqttClient ──▶ broker
//! broker ──▶ EspMqttConnection ──event loop──▶ BrokerSession state, InboundOverride
//! ```
//!
//! `EspMqttConnection::next()` keeps the client locked until it is called
//! again, so the loop below never calls the client; subscriptions run on
//! the subscriber task. QoS 0 both ways, no retain.

use std::sync::Arc;

use esp_idf_svc::mqtt::client::{
    EspMqttClient, EspMqttConnection, EventPayload, MqttClientConfiguration, QoS,
};

use crate::config::NetworkConfig;
use crate::error::PublishError;
use crate::inbound::InboundOverride;
use crate::log_globals::EVENT_LOG;
use crate::session::{BrokerClient, BrokerSession};

pub type MqttSession = BrokerSession<EspMqttClient<'static>>;

impl BrokerClient for EspMqttClient<'static> {
    fn subscribe(&mut self, topic: &str) -> Result<(), PublishError> {
        EspMqttClient::subscribe(self, topic, QoS::AtMostOnce)
            .map(|_| ())
            .map_err(|e| PublishError::Transport(e.code()))
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        EspMqttClient::publish(self, topic, QoS::AtMostOnce, false, payload)
            .map(|_| ())
            .map_err(|e| PublishError::Transport(e.code()))
    }
}

/// Inbound side, run on its own thread.
pub struct MqttEvents {
    session: Arc<MqttSession>,
    connection: EspMqttConnection,
    inbound: InboundOverride,
}

impl MqttEvents {
    /// Pump broker events until the connection is closed.
    pub fn run(mut self) {
        let topic = self.session.topic();

        while let Ok(event) = self.connection.next() {
            match event.payload() {
                EventPayload::Connected(_) => self.session.on_connected(),
                EventPayload::Disconnected => self.session.on_disconnected(),
                EventPayload::Subscribed(id) => {
                    crate::task_info!(EVENT_LOG, "mqtt: subscribed to '{}' (msg {})", topic, id);
                }
                EventPayload::Received { topic: Some(received), data, .. } => {
                    self.inbound.handle(received, data);
                }
                EventPayload::Error(e) => {
                    crate::task_error!(EVENT_LOG, "mqtt: {:?}", e);
                }
                _ => {}
            }
        }

        self.session.on_disconnected();
        crate::task_warn!(EVENT_LOG, "mqtt: connection closed");
    }
}

/// Create the client; the session is shared by the Publisher sink, the
/// subscriber task and the event loop.
pub fn connect(
    config: &NetworkConfig,
    inbound: InboundOverride,
) -> anyhow::Result<(Arc<MqttSession>, MqttEvents)> {
    let (client, connection) =
        EspMqttClient::new(config.broker_uri, &MqttClientConfiguration::default())?;
    log::info!("mqtt client created for {}", config.broker_uri);

    let session = Arc::new(BrokerSession::new(client, config.topic, config.client_lock_wait));

    Ok((
        session.clone(),
        MqttEvents { session, connection, inbound },
    ))
}
