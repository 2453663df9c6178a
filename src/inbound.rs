//! Inbound override from the network channel.
//!
//! A message on the subscribed topic carries a decimal BPM that overwrites
//! the shared metric directly, bypassing the relay queue. It competes with
//! the Producer and Publisher on equal terms: last writer wins.
//!
//! Parsing follows `strtol` base 10 (leading whitespace, optional sign,
//! longest digit prefix, trailing bytes ignored) except that a payload with
//! no digits is rejected instead of read as 0.

use std::sync::Arc;

use crate::bpm::BpmValue;
use crate::error::ParseError;
use crate::log_globals::EVENT_LOG;
use crate::metric::SharedMetric;
use crate::stats::{Counter, PipelineStats};

/// Parse a decimal BPM payload.
///
/// ```
/// use hexagon_watch::inbound::parse_bpm_payload;
///
/// assert_eq!(parse_bpm_payload(b"85"), Ok(85));
/// assert_eq!(parse_bpm_payload(b"  72bpm"), Ok(72));
/// assert!(parse_bpm_payload(b"fast").is_err());
/// ```
pub fn parse_bpm_payload(payload: &[u8]) -> Result<BpmValue, ParseError> {
    let start = payload
        .iter()
        .position(|b| !matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c))
        .ok_or(ParseError::Empty)?;
    let rest = &payload[start..];

    let (negative, digits) = match rest.first() {
        Some(b'-') => (true, &rest[1..]),
        Some(b'+') => (false, &rest[1..]),
        _ => (false, rest),
    };

    let len = digits.iter().take_while(|b| b.is_ascii_digit()).count();
    if len == 0 {
        return Err(ParseError::NoDigits);
    }

    // Accumulate negatively so BpmValue::MIN parses without overflow
    let mut value: BpmValue = 0;
    for &d in &digits[..len] {
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_sub(BpmValue::from(d - b'0')))
            .ok_or(ParseError::Overflow)?;
    }

    if negative {
        Ok(value)
    } else {
        value.checked_neg().ok_or(ParseError::Overflow)
    }
}

/// What an inbound message did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InboundOutcome {
    /// Value written into the shared metric.
    Applied(BpmValue),
    /// Value parsed but the metric lock wait expired.
    Skipped(BpmValue),
    /// Payload rejected; metric unchanged.
    Rejected(ParseError),
    /// Message on a topic this handler does not own.
    OtherTopic,
}

/// Inbound message handler, called from the network event context.
pub struct InboundOverride {
    topic: &'static str,
    metric: Arc<SharedMetric>,
    stats: Arc<PipelineStats>,
}

impl InboundOverride {
    pub fn new(topic: &'static str, metric: Arc<SharedMetric>, stats: Arc<PipelineStats>) -> Self {
        Self { topic, metric, stats }
    }

    /// Topic this handler accepts.
    #[inline]
    pub fn topic(&self) -> &'static str {
        self.topic
    }

    /// Handle one received message.
    pub fn handle(&self, topic: &str, payload: &[u8]) -> InboundOutcome {
        if topic != self.topic {
            crate::task_debug!(EVENT_LOG, "inbound: ignoring message on '{}'", topic);
            return InboundOutcome::OtherTopic;
        }

        let value = match parse_bpm_payload(payload) {
            Ok(value) => value,
            Err(e) => {
                self.stats.bump(Counter::OverrideRejected);
                crate::task_warn!(
                    EVENT_LOG,
                    "inbound: rejected {:?} [{}]: {}",
                    core::str::from_utf8(payload).unwrap_or("<binary>"),
                    e.code(),
                    e
                );
                return InboundOutcome::Rejected(e);
            }
        };

        if self.metric.write(value) {
            self.stats.bump(Counter::OverrideAccepted);
            crate::task_info!(EVENT_LOG, "inbound: BPM overridden to {}", value);
            InboundOutcome::Applied(value)
        } else {
            InboundOutcome::Skipped(value)
        }
    }
}
