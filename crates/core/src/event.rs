//! Canonical event schema shared by every stage after normalization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::FieldValue;

/// Sentinel for an unobserved user.
pub const UNKNOWN_USER: &str = "unknown_user";
/// Sentinel for an unobserved host.
pub const UNKNOWN_HOST: &str = "unknown_host";
/// Sentinel for an unobserved process.
pub const UNKNOWN_PROCESS: &str = "unknown_process";

/// Declared canonical fields, in schema order.
pub const CANONICAL_FIELDS: &[&str] = &[
    "timestamp",
    "epoch_timestamp",
    "user",
    "host",
    "process",
    "src_ip",
    "dest_ip",
    "src_port",
    "dst_port",
    "protocol",
    "bytes_in",
    "bytes_out",
    "source",
    "message",
    "raw",
];

/// Presence flag names, in schema order.
pub const PRESENCE_FLAGS: &[&str] = &[
    "has_user",
    "has_src_ip",
    "has_process",
    "has_host",
    "has_dest_ip",
    "has_message",
    "has_src_port",
    "has_dst_port",
    "has_protocol",
];

/// Whether each identity/network field was actually observed rather than defaulted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceFlags {
    pub has_user: bool,
    pub has_src_ip: bool,
    pub has_process: bool,
    pub has_host: bool,
    pub has_dest_ip: bool,
    pub has_message: bool,
    pub has_src_port: bool,
    pub has_dst_port: bool,
    pub has_protocol: bool,
}

impl PresenceFlags {
    /// Derive flags from current field values: observed means present and not a sentinel.
    pub fn derive(event: &CanonicalEvent) -> Self {
        Self {
            has_user: observed(&event.user, UNKNOWN_USER),
            has_src_ip: event.src_ip.as_deref().is_some_and(|s| !s.is_empty()),
            has_process: observed(&event.process, UNKNOWN_PROCESS),
            has_host: observed(&event.host, UNKNOWN_HOST),
            has_dest_ip: event.dest_ip.as_deref().is_some_and(|s| !s.is_empty()),
            has_message: !event.message.is_empty(),
            has_src_port: event.src_port.is_some(),
            has_dst_port: event.dst_port.is_some(),
            has_protocol: event.protocol.as_deref().is_some_and(|s| !s.is_empty()),
        }
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        Some(match name {
            "has_user" => self.has_user,
            "has_src_ip" => self.has_src_ip,
            "has_process" => self.has_process,
            "has_host" => self.has_host,
            "has_dest_ip" => self.has_dest_ip,
            "has_message" => self.has_message,
            "has_src_port" => self.has_src_port,
            "has_dst_port" => self.has_dst_port,
            "has_protocol" => self.has_protocol,
            _ => return None,
        })
    }
}

fn observed(value: &str, sentinel: &str) -> bool {
    !value.is_empty() && value != sentinel
}

/// A log record projected onto the fixed canonical schema.
///
/// Every declared field is always present; absent values are `None` or the
/// matching `unknown_*` sentinel. Call [`CanonicalEvent::refresh_flags`] after
/// changing any field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    /// ISO-8601 UTC timestamp.
    pub timestamp: Option<String>,
    pub epoch_timestamp: Option<i64>,
    pub user: String,
    pub host: String,
    pub process: String,
    pub src_ip: Option<String>,
    pub dest_ip: Option<String>,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
    pub protocol: Option<String>,
    pub bytes_in: Option<u64>,
    pub bytes_out: Option<u64>,
    /// Name of the parser that produced this event.
    pub source: Option<String>,
    pub message: String,
    /// Original payload, untouched.
    pub raw: Value,
    #[serde(flatten)]
    pub flags: PresenceFlags,
}

impl Default for CanonicalEvent {
    fn default() -> Self {
        Self {
            timestamp: None,
            epoch_timestamp: None,
            user: UNKNOWN_USER.to_string(),
            host: UNKNOWN_HOST.to_string(),
            process: UNKNOWN_PROCESS.to_string(),
            src_ip: None,
            dest_ip: None,
            src_port: None,
            dst_port: None,
            protocol: None,
            bytes_in: None,
            bytes_out: None,
            source: None,
            message: String::new(),
            raw: Value::Null,
            flags: PresenceFlags::default(),
        }
    }
}

impl CanonicalEvent {
    /// Recompute presence flags from the current field values.
    pub fn refresh_flags(&mut self) {
        self.flags = PresenceFlags::derive(self);
    }

    /// Look up a canonical field or presence flag by column name.
    ///
    /// Returns `None` when `name` is not part of the schema, so callers can
    /// tell an absent column apart from a null value.
    pub fn column(&self, name: &str) -> Option<FieldValue> {
        let value: FieldValue = match name {
            "timestamp" => self.timestamp.clone().into(),
            "epoch_timestamp" => self.epoch_timestamp.into(),
            "user" => self.user.clone().into(),
            "host" => self.host.clone().into(),
            "process" => self.process.clone().into(),
            "src_ip" => self.src_ip.clone().into(),
            "dest_ip" => self.dest_ip.clone().into(),
            "src_port" => self.src_port.map(i64::from).into(),
            "dst_port" => self.dst_port.map(i64::from).into(),
            "protocol" => self.protocol.clone().into(),
            "bytes_in" => self.bytes_in.map(|b| b as i64).into(),
            "bytes_out" => self.bytes_out.map(|b| b as i64).into(),
            "source" => self.source.clone().into(),
            "message" => self.message.clone().into(),
            "raw" => FieldValue::from_json(&self.raw),
            other => return self.flags.get(other).map(FieldValue::Boolean),
        };
        Some(value)
    }
}
