//! Format parsers and the registry that picks one per record.
//!
//! Each parser understands a single input shape and returns a format-specific
//! [`ParsedRecord`]. Nothing is validated against the canonical schema here;
//! [`ParsedRecord::project`] flattens a record into [`ParsedFields`] at the
//! normalizer boundary, dropping format-only extras.

pub mod cloudtrail;
pub mod network;
pub mod registry;
pub mod syslog;
pub mod windows;

use indexmap::IndexMap;
use serde_json::Value;

use driftlog_core::RawRecord;

pub use cloudtrail::{CloudTrailParser, CloudTrailRecord};
pub use network::{NetworkParser, NetworkRecord};
pub use registry::{ParserRegistry, RegistryConfig, TriggerRule};
pub use syslog::{SyslogParser, SyslogRecord};
pub use windows::{WindowsParser, WindowsRecord};

/// A format parser. Implementations never fail: input they cannot read yields
/// [`ParsedRecord::Empty`] or a partially filled record.
pub trait Parser: Send + Sync {
    /// Registry name, e.g. `"syslog"`.
    fn name(&self) -> &str;

    fn parse(&self, record: &RawRecord) -> ParsedRecord;
}

/// Tagged union of per-format parse results.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedRecord {
    Syslog(SyslogRecord),
    Windows(WindowsRecord),
    CloudTrail(CloudTrailRecord),
    Network(NetworkRecord),
    /// Nothing could be read from the record.
    Empty,
}

/// Loose field mapping keyed by canonical names, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFields {
    pub timestamp: Option<String>,
    pub user: Option<String>,
    pub host: Option<String>,
    pub process: Option<String>,
    pub src_ip: Option<String>,
    pub dest_ip: Option<String>,
    pub src_port: Option<Value>,
    pub dst_port: Option<Value>,
    pub protocol: Option<String>,
    pub bytes_in: Option<Value>,
    pub bytes_out: Option<Value>,
    pub source: Option<String>,
    pub message: Option<String>,
    pub raw: Value,
}

impl ParsedRecord {
    /// Project onto the canonical field names. Format-only fields
    /// (event ids, firewall actions...) are dropped.
    pub fn project(self) -> ParsedFields {
        match self {
            ParsedRecord::Syslog(r) => ParsedFields {
                timestamp: r.timestamp,
                host: r.host,
                process: r.process,
                message: r.message,
                ..Default::default()
            },
            ParsedRecord::Windows(r) => ParsedFields {
                timestamp: r.time_created,
                user: r.user,
                src_ip: r.ip_address,
                host: r.computer_name,
                process: r.process_name,
                message: r.message,
                ..Default::default()
            },
            ParsedRecord::CloudTrail(r) => ParsedFields {
                timestamp: r.event_time,
                user: r.user_name,
                src_ip: r.source_ip,
                host: r.region,
                process: r.event_source,
                message: r.request_parameters,
                ..Default::default()
            },
            ParsedRecord::Network(r) => ParsedFields {
                timestamp: r.timestamp,
                host: r.host,
                process: Some(NetworkParser::PROCESS.to_string()),
                src_ip: r.src_ip,
                dest_ip: r.dest_ip,
                src_port: r.src_port,
                dst_port: r.dst_port,
                protocol: r.protocol,
                bytes_in: r.bytes_in,
                bytes_out: r.bytes_out,
                message: r.message,
                ..Default::default()
            },
            ParsedRecord::Empty => ParsedFields::default(),
        }
    }
}

/// Render a JSON value as field text. Null, blank, and "None"/"null"
/// placeholder strings count as absent.
pub(crate) fn value_text(v: &Value) -> Option<String> {
    let s = match v {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    };
    if s.is_empty() || s == "None" || s == "null" {
        None
    } else {
        Some(s)
    }
}

/// Text of `map[key]`, see [`value_text`].
pub(crate) fn get_text(map: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(value_text)
}

/// Format-specific fields that do not survive projection.
pub type Extras = IndexMap<String, Value>;
