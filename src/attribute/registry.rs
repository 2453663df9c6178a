//! Module: registry
//!
//! Purpose: The three scalar attributes the watch exposes, their handles
//! and their backing storage.
//!
//! Architecture:
//! - Attribute identity is the 16-bit UUID; the handle is assigned later
//!   by the radio stack (`AttributeAdded`)
//! - An attribute takes part in read/write dispatch only once its handle
//!   is assigned
//! - Storage is the native-endian field of an `i32` (4 bytes)
//!
//! Safety: Safe. Shared as `Arc<Mutex<AttributeRegistry>>`; the lock is
//! held for a copy only, never across a radio call.

use crate::bpm::{self, BpmValue, FIELD_WIDTH};
use crate::config::RadioConfig;
use crate::error::WriteRejection;

/// Radio-stack handle of a service or attribute.
pub type Handle = u16;

/// 16-bit Bluetooth UUID.
pub type Uuid16 = u16;

/// Permission / property bit set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Access(u8);

impl Access {
    pub const NONE: Self = Self(0);
    pub const READ: Self = Self(1 << 0);
    pub const WRITE: Self = Self(1 << 1);
    pub const BROADCAST: Self = Self(1 << 2);

    /// Union of two sets.
    #[inline]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Check all bits of `other` are present.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Logical attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeRole {
    /// Read/write scalar; a write also overrides the shared BPM.
    Control,
    /// Read/write scalar, storage only.
    Auxiliary,
    /// Read/broadcast mirror of the shared BPM.
    Broadcast,
}

impl AttributeRole {
    /// All roles, in the order attributes are declared.
    pub const ALL: [AttributeRole; 3] = [Self::Control, Self::Auxiliary, Self::Broadcast];

    #[inline]
    const fn index(self) -> usize {
        match self {
            Self::Control => 0,
            Self::Auxiliary => 1,
            Self::Broadcast => 2,
        }
    }
}

/// Declaration of one attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttributeSpec {
    pub role: AttributeRole,
    pub uuid: Uuid16,
    pub permissions: Access,
    pub properties: Access,
    /// Declared maximum value length (field width).
    pub max_len: usize,
    pub initial: BpmValue,
}

#[derive(Clone, Copy, Debug)]
struct Entry {
    spec: AttributeSpec,
    handle: Option<Handle>,
    value: [u8; FIELD_WIDTH],
}

/// Attribute table of the watch service.
#[derive(Debug)]
pub struct AttributeRegistry {
    service_uuid: Uuid16,
    service_handle: Option<Handle>,
    entries: [Entry; 3],
}

impl AttributeRegistry {
    /// Declare the three attributes from the radio configuration.
    pub fn new(config: &RadioConfig) -> Self {
        let rw = Access::READ.with(Access::WRITE);
        let specs = [
            AttributeSpec {
                role: AttributeRole::Control,
                uuid: config.control_uuid,
                permissions: rw,
                properties: rw,
                max_len: FIELD_WIDTH,
                initial: config.control_initial,
            },
            AttributeSpec {
                role: AttributeRole::Auxiliary,
                uuid: config.auxiliary_uuid,
                permissions: rw,
                properties: rw,
                max_len: FIELD_WIDTH,
                initial: config.auxiliary_initial,
            },
            AttributeSpec {
                role: AttributeRole::Broadcast,
                uuid: config.broadcast_uuid,
                permissions: Access::READ,
                properties: Access::READ.with(Access::BROADCAST),
                max_len: FIELD_WIDTH,
                initial: config.broadcast_initial,
            },
        ];

        Self {
            service_uuid: config.service_uuid,
            service_handle: None,
            entries: specs.map(|spec| Entry {
                spec,
                handle: None,
                value: bpm::to_field(spec.initial),
            }),
        }
    }

    #[inline]
    pub fn service_uuid(&self) -> Uuid16 {
        self.service_uuid
    }

    #[inline]
    pub fn service_handle(&self) -> Option<Handle> {
        self.service_handle
    }

    pub fn set_service_handle(&mut self, handle: Handle) {
        self.service_handle = Some(handle);
    }

    /// Attribute declarations, in declaration order.
    pub fn specs(&self) -> [AttributeSpec; 3] {
        self.entries.map(|e| e.spec)
    }

    /// Record the handle the radio stack assigned to `uuid`.
    ///
    /// Returns the role, or `None` if the UUID is not one of ours.
    pub fn assign(&mut self, uuid: Uuid16, handle: Handle) -> Option<AttributeRole> {
        let entry = self.entries.iter_mut().find(|e| e.spec.uuid == uuid)?;
        entry.handle = Some(handle);
        Some(entry.spec.role)
    }

    /// All three attributes have a handle.
    pub fn is_complete(&self) -> bool {
        self.entries.iter().all(|e| e.handle.is_some())
    }

    /// Number of attributes with a handle.
    pub fn assigned(&self) -> usize {
        self.entries.iter().filter(|e| e.handle.is_some()).count()
    }

    /// Role owning an assigned handle.
    pub fn role_of(&self, handle: Handle) -> Option<AttributeRole> {
        self.entries
            .iter()
            .find(|e| e.handle == Some(handle))
            .map(|e| e.spec.role)
    }

    pub fn handle_of(&self, role: AttributeRole) -> Option<Handle> {
        self.entries[role.index()].handle
    }

    pub fn spec(&self, role: AttributeRole) -> &AttributeSpec {
        &self.entries[role.index()].spec
    }

    /// Current field bytes.
    pub fn value(&self, role: AttributeRole) -> [u8; FIELD_WIDTH] {
        self.entries[role.index()].value
    }

    /// Current field decoded as a BPM value.
    pub fn scalar(&self, role: AttributeRole) -> BpmValue {
        bpm::from_field(self.value(role))
    }

    /// Apply a client write.
    ///
    /// Copies only the received bytes: a short write leaves the trailing
    /// bytes of the field as they were.
    pub fn write(&mut self, role: AttributeRole, bytes: &[u8]) -> Result<(), WriteRejection> {
        let entry = &mut self.entries[role.index()];
        if !entry.spec.permissions.contains(Access::WRITE) {
            return Err(WriteRejection::NotWritable);
        }
        if bytes.len() > entry.spec.max_len {
            return Err(WriteRejection::Oversized { len: bytes.len(), max: entry.spec.max_len });
        }

        entry.value[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Store a value without permission checks (firmware-side update).
    pub fn store(&mut self, role: AttributeRole, value: BpmValue) {
        self.entries[role.index()].value = bpm::to_field(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CONFIG;

    #[test]
    fn test_initial_values() {
        let reg = AttributeRegistry::new(&CONFIG.radio);
        assert_eq!(reg.scalar(AttributeRole::Control), 0);
        assert_eq!(reg.scalar(AttributeRole::Auxiliary), 42);
        assert_eq!(reg.scalar(AttributeRole::Broadcast), 60);
        assert!(!reg.is_complete());
    }

    #[test]
    fn test_handles_resolve_only_after_assignment() {
        let mut reg = AttributeRegistry::new(&CONFIG.radio);
        assert_eq!(reg.role_of(42), None);

        assert_eq!(reg.assign(0x9ABC, 42), Some(AttributeRole::Auxiliary));
        assert_eq!(reg.role_of(42), Some(AttributeRole::Auxiliary));
        assert_eq!(reg.handle_of(AttributeRole::Auxiliary), Some(42));
        assert_eq!(reg.assign(0xFFFF, 50), None);
        assert_eq!(reg.assigned(), 1);
    }

    #[test]
    fn test_broadcast_permissions() {
        let reg = AttributeRegistry::new(&CONFIG.radio);
        let spec = reg.spec(AttributeRole::Broadcast);
        assert!(spec.permissions.contains(Access::READ));
        assert!(!spec.permissions.contains(Access::WRITE));
        assert!(spec.properties.contains(Access::BROADCAST));
    }

    #[test]
    fn test_short_write_keeps_tail() {
        let mut reg = AttributeRegistry::new(&CONFIG.radio);
        reg.store(AttributeRole::Auxiliary, 0x0A0B_0C0D);
        let before = reg.value(AttributeRole::Auxiliary);

        reg.write(AttributeRole::Auxiliary, &[0xEE, 0xFF]).unwrap();

        let after = reg.value(AttributeRole::Auxiliary);
        assert_eq!(&after[..2], &[0xEE, 0xFF]);
        assert_eq!(&after[2..], &before[2..]);
    }

    #[test]
    fn test_oversized_and_read_only_writes_rejected() {
        let mut reg = AttributeRegistry::new(&CONFIG.radio);

        assert_eq!(
            reg.write(AttributeRole::Control, &[1, 2, 3, 4, 5]),
            Err(WriteRejection::Oversized { len: 5, max: 4 })
        );
        assert_eq!(reg.write(AttributeRole::Broadcast, &[1]), Err(WriteRejection::NotWritable));
        assert_eq!(reg.scalar(AttributeRole::Control), 0);
        assert_eq!(reg.scalar(AttributeRole::Broadcast), 60);
    }
}
