//! Projection of parsed fields onto the canonical schema.

pub mod timestamp;

use serde_json::Value;

use driftlog_core::{CanonicalEvent, UNKNOWN_HOST, UNKNOWN_PROCESS, UNKNOWN_USER};

use crate::parser::ParsedFields;

pub use timestamp::{normalize_timestamp, parse_timestamp, NormalizedTimestamp};

/// Turns loose parsed fields into a [`CanonicalEvent`].
///
/// Steps, in order: project onto the schema, normalize the timestamp, fill
/// defaults (`unknown_*` sentinels for identity fields, null for network
/// fields, empty message), then derive presence flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, fields: ParsedFields) -> CanonicalEvent {
        let ts = fields.timestamp.as_deref().and_then(normalize_timestamp);

        let mut event = CanonicalEvent {
            timestamp: ts.as_ref().map(|t| t.iso.clone()),
            epoch_timestamp: ts.map(|t| t.epoch),
            user: non_empty(fields.user).unwrap_or_else(|| UNKNOWN_USER.to_string()),
            host: non_empty(fields.host).unwrap_or_else(|| UNKNOWN_HOST.to_string()),
            process: non_empty(fields.process).unwrap_or_else(|| UNKNOWN_PROCESS.to_string()),
            src_ip: non_empty(fields.src_ip),
            dest_ip: non_empty(fields.dest_ip),
            src_port: fields.src_port.as_ref().and_then(coerce_port),
            dst_port: fields.dst_port.as_ref().and_then(coerce_port),
            protocol: non_empty(fields.protocol),
            bytes_in: fields.bytes_in.as_ref().and_then(coerce_count),
            bytes_out: fields.bytes_out.as_ref().and_then(coerce_count),
            source: non_empty(fields.source),
            message: non_empty(fields.message).unwrap_or_default(),
            raw: fields.raw,
            flags: Default::default(),
        };
        event.refresh_flags();
        event
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Port from an integer or numeric string. Zero and out-of-range values are absent.
fn coerce_port(value: &Value) -> Option<u16> {
    let port = match value {
        Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Value::String(s) => s.trim().parse::<u16>().ok(),
        _ => None,
    };
    port.filter(|p| *p != 0)
}

/// Non-negative byte count from an integer, integral float, or numeric string.
fn coerce_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}
