//! Radio-stack boundary: the events the attribute server consumes and the
//! commands it issues.
//!
//! The platform adapter translates vendor callbacks into [`RadioEvent`] and
//! implements [`RadioStack`] on top of the vendor API. Failed
//! acknowledgements are logged and dropped by the adapter; only successful
//! ones become events.

use crate::attribute::registry::{AttributeSpec, Handle, Uuid16};
use crate::error::RadioError;

/// Connection identifier assigned by the radio stack.
pub type ConnId = u16;

/// Transaction identifier of a pending read/write request.
pub type TransId = u32;

/// Asynchronous radio-stack event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RadioEvent<'a> {
    /// Application profile registered.
    Registered { app_id: u16 },
    /// Service created, handle assigned.
    ServiceCreated { service_handle: Handle },
    /// Attribute declared, handle assigned.
    AttributeAdded { uuid: Uuid16, handle: Handle },
    /// Client read request.
    Read { conn_id: ConnId, trans_id: TransId, handle: Handle },
    /// Client write request.
    Write {
        conn_id: ConnId,
        trans_id: TransId,
        handle: Handle,
        value: &'a [u8],
        /// False for write-without-response.
        needs_response: bool,
    },
    Connected { conn_id: ConnId },
    Disconnected { conn_id: ConnId },
    /// Advertisement payload accepted by the stack.
    AdvertisingConfigured,
    /// Advertising start completed (`ok` = success).
    AdvertisingStarted { ok: bool },
    AdvertisingStopped,
}

/// Status carried by a read/write response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttStatus {
    Ok,
    /// Handle does not name a readable attribute.
    InvalidHandle,
}

/// Commands the attribute server issues to the radio stack.
///
/// Methods take `&self`: the dispatcher (radio event context) and the
/// broadcast refresher (own task) share one stack handle.
pub trait RadioStack {
    fn set_device_name(&self, name: &str) -> Result<(), RadioError>;

    /// Configure the advertisement payload (name included, general
    /// discoverable, BR/EDR not supported).
    fn configure_advertisement(&self) -> Result<(), RadioError>;

    fn create_service(&self, service_uuid: Uuid16, num_handles: u16) -> Result<(), RadioError>;

    fn add_attribute(
        &self,
        service_handle: Handle,
        spec: &AttributeSpec,
        initial: &[u8],
    ) -> Result<(), RadioError>;

    fn start_service(&self, service_handle: Handle) -> Result<(), RadioError>;

    fn send_response(
        &self,
        conn_id: ConnId,
        trans_id: TransId,
        handle: Handle,
        status: AttStatus,
        value: &[u8],
    ) -> Result<(), RadioError>;

    /// Update the stack's copy of an attribute value.
    fn set_attribute_value(&self, handle: Handle, value: &[u8]) -> Result<(), RadioError>;

    fn start_advertising(&self) -> Result<(), RadioError>;
}
