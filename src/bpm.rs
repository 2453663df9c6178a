//! BPM value type and its two wire forms.
//!
//! - Attribute form: native-endian bytes of an `i32` (4 bytes).
//! - Network form: decimal ASCII text, no delimiter, no framing.

/// Heart rate in beats per minute.
///
/// Generated values stay inside [`BPM_MIN`]..=[`BPM_MAX`]. Values written by
/// external parties (attribute write, inbound override) are taken as-is.
pub type BpmValue = i32;

/// Lowest generated BPM.
pub const BPM_MIN: BpmValue = 60;

/// Highest generated BPM.
pub const BPM_MAX: BpmValue = 160;

/// Value the shared metric holds at boot.
pub const INITIAL_BPM: BpmValue = 60;

/// Width of a scalar attribute field in bytes.
pub const FIELD_WIDTH: usize = core::mem::size_of::<BpmValue>();

/// Longest decimal rendering of a `BpmValue` (`-2147483648`).
pub const MAX_PAYLOAD_LEN: usize = 11;

/// Check a value against the generated range.
#[inline]
pub fn in_generated_range(value: BpmValue) -> bool {
    (BPM_MIN..=BPM_MAX).contains(&value)
}

/// Encode a value as an attribute field.
#[inline]
pub fn to_field(value: BpmValue) -> [u8; FIELD_WIDTH] {
    value.to_ne_bytes()
}

/// Decode an attribute field.
#[inline]
pub fn from_field(field: [u8; FIELD_WIDTH]) -> BpmValue {
    BpmValue::from_ne_bytes(field)
}

/// Decimal payload for the network channel.
///
/// Fixed-size, no allocation.
#[derive(Clone, Copy)]
pub struct Payload {
    buf: [u8; MAX_PAYLOAD_LEN],
    len: u8,
}

impl Payload {
    /// Render `value` as decimal ASCII.
    pub fn new(value: BpmValue) -> Self {
        let mut buf = [0u8; MAX_PAYLOAD_LEN];
        let len = crate::logging::format_to_buffer(&mut buf, format_args!("{}", value));
        Self { buf, len: len as u8 }
    }

    /// Payload bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len as usize]
    }

    /// Payload as text (always ASCII).
    #[inline]
    pub fn as_str(&self) -> &str {
        core::str::from_utf8(self.as_bytes()).unwrap_or("")
    }
}

impl core::fmt::Debug for Payload {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Payload({:?})", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_decimal() {
        assert_eq!(Payload::new(60).as_bytes(), b"60");
        assert_eq!(Payload::new(160).as_str(), "160");
        assert_eq!(Payload::new(-7).as_str(), "-7");
        assert_eq!(Payload::new(BpmValue::MIN).as_str(), "-2147483648");
    }

    #[test]
    fn test_field_is_native_endian() {
        assert_eq!(to_field(85), 85i32.to_ne_bytes());
        assert_eq!(from_field(to_field(123)), 123);
    }

    #[test]
    fn test_generated_range() {
        assert!(in_generated_range(60));
        assert!(in_generated_range(160));
        assert!(!in_generated_range(59));
        assert!(!in_generated_range(161));
    }
}
