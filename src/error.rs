//! Error types for the BPM pipeline.
//!
//! Every error here is local: the component that hits it logs it, counts it
//! and carries on. None of them is allowed to stop another task.

use thiserror::Error;

use crate::bpm::BpmValue;

/// Relay queue at capacity; the offered value was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("relay queue full, dropped {0}")]
pub struct RelayFull(pub BpmValue);

/// Inbound network payload could not be read as a BPM value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Payload empty or whitespace only.
    #[error("P01: empty payload")]
    Empty,
    /// No decimal digit after optional whitespace and sign.
    #[error("P02: no decimal digits")]
    NoDigits,
    /// Digits do not fit a BPM value.
    #[error("P03: value out of range")]
    Overflow,
}

impl ParseError {
    /// Short code for log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Empty => "P01",
            Self::NoDigits => "P02",
            Self::Overflow => "P03",
        }
    }
}

/// Network publish failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PublishError {
    /// Broker session not established.
    #[error("N01: not connected")]
    NotConnected,
    /// Transport reported an error code.
    #[error("N02: transport error {0}")]
    Transport(i32),
    /// Broker client held elsewhere past the lock wait.
    #[error("N03: client busy")]
    Busy,
}

/// Radio stack command failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RadioError {
    #[error("R01: {op} failed ({code})")]
    Command { op: &'static str, code: i32 },
}

impl RadioError {
    /// Build a command failure.
    pub fn command(op: &'static str, code: i32) -> Self {
        Self::Command { op, code }
    }
}

/// Why an attribute write left storage unchanged.
///
/// The client still receives an OK acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WriteRejection {
    /// Write longer than the attribute field.
    #[error("W01: {len} bytes exceed field of {max}")]
    Oversized { len: usize, max: usize },
    /// Handle not assigned to any attribute.
    #[error("W02: unknown handle")]
    UnknownHandle,
    /// Attribute lacks write permission.
    #[error("W03: attribute not writable")]
    NotWritable,
    /// Service not started yet.
    #[error("W04: service not ready")]
    NotReady,
}

impl WriteRejection {
    /// Short code for log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Oversized { .. } => "W01",
            Self::UnknownHandle => "W02",
            Self::NotWritable => "W03",
            Self::NotReady => "W04",
        }
    }
}
