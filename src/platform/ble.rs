//! Bluedroid adapter for the attribute server.
//!
//! ```text
//! GAP / GATTS callbacks ──translate──▶ RadioEvent ──▶ AttributeServer
//! AttributeServer / BroadcastRefresher ──RadioStack──▶ EspRadio ──▶ Bluedroid
//! ```
//!
//! Acknowledgements with a failure status are logged and dropped here;
//! the state machine only sees successful ones.

use std::sync::Arc;

use enumset::EnumSet;
use esp_idf_svc::bt::ble::gap::{AdvConfiguration, BleGapEvent, EspBleGap};
use esp_idf_svc::bt::ble::gatt::server::{EspGatts, GattsEvent};
use esp_idf_svc::bt::ble::gatt::{
    AutoResponse, GattCharacteristic, GattId, GattInterface, GattResponse, GattServiceId,
    GattStatus, Permission, Property,
};
use esp_idf_svc::bt::{Ble, BtDriver, BtStatus, BtUuid};
use esp_idf_svc::sys::{EspError, ESP_BLE_ADV_FLAG_BREDR_NOT_SPT, ESP_BLE_ADV_FLAG_GEN_DISC};
use parking_lot::Mutex;

use crate::attribute::{
    Access, AttStatus, AttributeServer, AttributeSpec, ConnId, Handle, RadioEvent, RadioStack,
    TransId, Uuid16,
};
use crate::error::RadioError;
use crate::log_globals::EVENT_LOG;

pub type BleDriver = BtDriver<'static, Ble>;
type Gap = EspBleGap<'static, Ble, Arc<BleDriver>>;
type Gatts = EspGatts<'static, Ble, Arc<BleDriver>>;

fn esp(op: &'static str) -> impl Fn(EspError) -> RadioError {
    move |e| RadioError::command(op, e.code())
}

fn permissions(access: Access) -> EnumSet<Permission> {
    let mut set = EnumSet::empty();
    if access.contains(Access::READ) {
        set |= Permission::Read;
    }
    if access.contains(Access::WRITE) {
        set |= Permission::Write;
    }
    set
}

fn properties(access: Access) -> EnumSet<Property> {
    let mut set = EnumSet::empty();
    if access.contains(Access::READ) {
        set |= Property::Read;
    }
    if access.contains(Access::WRITE) {
        set |= Property::Write;
    }
    if access.contains(Access::BROADCAST) {
        set |= Property::Broadcast;
    }
    set
}

/// [`RadioStack`] over Bluedroid GAP + GATTS.
pub struct EspRadio {
    gap: Gap,
    gatts: Gatts,
    gatt_if: Mutex<Option<GattInterface>>,
    /// UUIDs the server declares; used to map `BtUuid` back to 16 bits.
    known_uuids: [Uuid16; 3],
}

impl EspRadio {
    pub fn new(driver: Arc<BleDriver>, known_uuids: [Uuid16; 3]) -> Result<Self, EspError> {
        Ok(Self {
            gap: EspBleGap::new(driver.clone())?,
            gatts: EspGatts::new(driver)?,
            gatt_if: Mutex::new(None),
            known_uuids,
        })
    }

    fn gatt_if(&self, op: &'static str) -> Result<GattInterface, RadioError> {
        (*self.gatt_if.lock()).ok_or(RadioError::command(op, -1))
    }

    fn uuid16(&self, uuid: &BtUuid) -> Option<Uuid16> {
        self.known_uuids
            .iter()
            .copied()
            .find(|&known| BtUuid::uuid16(known) == *uuid)
    }

    /// Translate a GATTS callback, remembering the interface on registration.
    fn translate_gatts<'a>(&self, gatt_if: GattInterface, event: GattsEvent<'a>) -> Option<RadioEvent<'a>> {
        match event {
            GattsEvent::ServiceRegistered { status, app_id } => {
                if status != GattStatus::Ok {
                    crate::task_error!(EVENT_LOG, "ble: app {} registration failed: {:?}", app_id, status);
                    return None;
                }
                *self.gatt_if.lock() = Some(gatt_if);
                Some(RadioEvent::Registered { app_id })
            }
            GattsEvent::ServiceCreated { status, service_handle, .. } => {
                if status != GattStatus::Ok {
                    crate::task_error!(EVENT_LOG, "ble: service creation failed: {:?}", status);
                    return None;
                }
                Some(RadioEvent::ServiceCreated { service_handle })
            }
            GattsEvent::CharacteristicAdded { status, attr_handle, char_uuid, .. } => {
                if status != GattStatus::Ok {
                    crate::task_error!(EVENT_LOG, "ble: attribute add failed: {:?}", status);
                    return None;
                }
                let uuid = self.uuid16(&char_uuid)?;
                Some(RadioEvent::AttributeAdded { uuid, handle: attr_handle })
            }
            GattsEvent::PeerConnected { conn_id, .. } => Some(RadioEvent::Connected { conn_id }),
            GattsEvent::PeerDisconnected { conn_id, .. } => Some(RadioEvent::Disconnected { conn_id }),
            GattsEvent::Read { conn_id, trans_id, handle, .. } => {
                Some(RadioEvent::Read { conn_id, trans_id, handle })
            }
            GattsEvent::Write { conn_id, trans_id, handle, need_rsp, value, .. } => Some(RadioEvent::Write {
                conn_id,
                trans_id,
                handle,
                value,
                needs_response: need_rsp,
            }),
            _ => None,
        }
    }
}

fn translate_gap(event: BleGapEvent<'_>) -> Option<RadioEvent<'static>> {
    match event {
        BleGapEvent::AdvertisingConfigured(status) => {
            if status != BtStatus::Success {
                crate::task_error!(EVENT_LOG, "ble: advertising config failed: {:?}", status);
                return None;
            }
            Some(RadioEvent::AdvertisingConfigured)
        }
        BleGapEvent::AdvertisingStarted(status) => {
            Some(RadioEvent::AdvertisingStarted { ok: status == BtStatus::Success })
        }
        BleGapEvent::AdvertisingStopped(status) => {
            if status != BtStatus::Success {
                crate::task_error!(EVENT_LOG, "ble: advertising stop failed: {:?}", status);
                return None;
            }
            Some(RadioEvent::AdvertisingStopped)
        }
        _ => None,
    }
}

impl RadioStack for EspRadio {
    fn set_device_name(&self, name: &str) -> Result<(), RadioError> {
        self.gap.set_device_name(name).map_err(esp("set_device_name"))
    }

    fn configure_advertisement(&self) -> Result<(), RadioError> {
        self.gap
            .set_adv_conf(&AdvConfiguration {
                include_name: true,
                include_txpower: true,
                flag: (ESP_BLE_ADV_FLAG_GEN_DISC | ESP_BLE_ADV_FLAG_BREDR_NOT_SPT) as _,
                ..Default::default()
            })
            .map_err(esp("set_adv_conf"))
    }

    fn create_service(&self, service_uuid: Uuid16, num_handles: u16) -> Result<(), RadioError> {
        let gatt_if = self.gatt_if("create_service")?;
        self.gatts
            .create_service(
                gatt_if,
                &GattServiceId {
                    id: GattId { uuid: BtUuid::uuid16(service_uuid), inst_id: 0 },
                    is_primary: true,
                },
                num_handles,
            )
            .map_err(esp("create_service"))
    }

    fn add_attribute(
        &self,
        service_handle: Handle,
        spec: &AttributeSpec,
        initial: &[u8],
    ) -> Result<(), RadioError> {
        self.gatts
            .add_characteristic(
                service_handle,
                &GattCharacteristic {
                    uuid: BtUuid::uuid16(spec.uuid),
                    permissions: permissions(spec.permissions),
                    properties: properties(spec.properties),
                    max_len: spec.max_len,
                    auto_rsp: AutoResponse::ByApp,
                },
                initial,
            )
            .map_err(esp("add_characteristic"))
    }

    fn start_service(&self, service_handle: Handle) -> Result<(), RadioError> {
        self.gatts.start_service(service_handle).map_err(esp("start_service"))
    }

    fn send_response(
        &self,
        conn_id: ConnId,
        trans_id: TransId,
        handle: Handle,
        status: AttStatus,
        value: &[u8],
    ) -> Result<(), RadioError> {
        let gatt_if = self.gatt_if("send_response")?;
        let status = match status {
            AttStatus::Ok => GattStatus::Ok,
            AttStatus::InvalidHandle => GattStatus::InvalidHandle,
        };

        if value.is_empty() {
            return self
                .gatts
                .send_response(gatt_if, conn_id, trans_id, status, None)
                .map_err(esp("send_response"));
        }

        let mut response = GattResponse::new();
        response
            .attr_handle(handle)
            .auth_req(0)
            .offset(0)
            .value(value)
            .map_err(esp("send_response"))?;
        self.gatts
            .send_response(gatt_if, conn_id, trans_id, status, Some(&response))
            .map_err(esp("send_response"))
    }

    fn set_attribute_value(&self, handle: Handle, value: &[u8]) -> Result<(), RadioError> {
        self.gatts.set_attr(handle, value).map_err(esp("set_attr"))
    }

    fn start_advertising(&self) -> Result<(), RadioError> {
        self.gap.start_advertising().map_err(esp("start_advertising"))
    }
}

/// Route GAP and GATTS callbacks into `server` and register the app.
pub fn start(
    radio: Arc<EspRadio>,
    server: AttributeServer<EspRadio>,
    app_id: u16,
) -> Result<(), EspError> {
    let server = Arc::new(Mutex::new(server));

    let gap_server = server.clone();
    radio.gap.subscribe(move |event| {
        if let Some(event) = translate_gap(event) {
            if let Err(e) = gap_server.lock().handle(event) {
                crate::task_error!(EVENT_LOG, "ble: {}", e);
            }
        }
    })?;

    let gatts_radio = radio.clone();
    radio.gatts.subscribe(move |(gatt_if, event)| {
        if let Some(event) = gatts_radio.translate_gatts(gatt_if, event) {
            if let Err(e) = server.lock().handle(event) {
                crate::task_error!(EVENT_LOG, "ble: {}", e);
            }
        }
    })?;

    radio.gatts.register_app(app_id)
}
