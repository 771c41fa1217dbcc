//! Network, firewall and flow logs, either structured (JSON) or free text.

use serde_json::Value;

use driftlog_core::RawRecord;

use crate::patterns::{first_groups, DST_PORT, IPV4, PROTOCOL, SRC_PORT};

use super::{get_text, Extras, ParsedRecord, Parser};

/// Case-insensitive key aliases: source key → target field.
const FIELD_ALIASES: &[(&str, &str)] = &[
    ("src", "src_ip"),
    ("source_ip", "src_ip"),
    ("src_ip", "src_ip"),
    ("sourceipv4address", "src_ip"),
    ("dst", "dest_ip"),
    ("dest_ip", "dest_ip"),
    ("dst_ip", "dest_ip"),
    ("destinationipv4address", "dest_ip"),
    ("sport", "src_port"),
    ("src_port", "src_port"),
    ("sourceport", "src_port"),
    ("dport", "dst_port"),
    ("dest_port", "dst_port"),
    ("destinationport", "dst_port"),
    ("proto", "protocol"),
    ("protocol", "protocol"),
    ("bytes", "bytes"),
    ("bytes_in", "bytes_in"),
    ("bytes_out", "bytes_out"),
    ("action", "action"),
    ("acl", "action"),
    ("eventtype", "action"),
    ("interface", "interface"),
    ("logstatus", "log_status"),
    ("severity", "severity"),
    ("signature", "signature"),
];

const TIMESTAMP_KEYS: &[&str] = &["timestamp", "time", "@timestamp"];
const HOST_KEYS: &[&str] = &["device", "hostname"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkRecord {
    pub timestamp: Option<String>,
    pub host: Option<String>,
    pub src_ip: Option<String>,
    pub dest_ip: Option<String>,
    pub src_port: Option<Value>,
    pub dst_port: Option<Value>,
    pub protocol: Option<String>,
    pub bytes_in: Option<Value>,
    pub bytes_out: Option<Value>,
    pub message: Option<String>,
    /// Action, interface, severity and similar device metadata.
    pub extras: Extras,
}

pub struct NetworkParser;

impl NetworkParser {
    /// Process name assigned to every network event.
    pub const PROCESS: &'static str = "network";

    fn parse_mapping(map: &serde_json::Map<String, Value>) -> NetworkRecord {
        let mut rec = NetworkRecord {
            timestamp: TIMESTAMP_KEYS.iter().find_map(|k| get_text(map, k)),
            host: HOST_KEYS.iter().find_map(|k| get_text(map, k)),
            message: get_text(map, "message"),
            ..Default::default()
        };

        for (key, value) in map {
            let lower = key.to_lowercase();
            let Some((_, target)) = FIELD_ALIASES.iter().find(|(alias, _)| *alias == lower) else {
                continue;
            };
            let text = super::value_text(value);
            match *target {
                "src_ip" => rec.src_ip = text,
                "dest_ip" => rec.dest_ip = text,
                "protocol" => rec.protocol = text,
                "src_port" => rec.src_port = Some(value.clone()),
                "dst_port" => rec.dst_port = Some(value.clone()),
                "bytes_in" => rec.bytes_in = Some(value.clone()),
                "bytes_out" => rec.bytes_out = Some(value.clone()),
                other => {
                    rec.extras.insert(other.to_string(), value.clone());
                }
            }
        }

        rec
    }

    fn parse_text(line: &str) -> NetworkRecord {
        let ip_spans: Vec<(usize, usize)> = IPV4
            .find_iter(line)
            .map(|m| (m.start(), m.end()))
            .collect();
        let mut ips = IPV4.find_iter(line).map(|m| m.as_str().to_string());
        let src_ip = ips.next();
        let dest_ip = ips.next();

        // Labeled ports win; otherwise fall back to bare numbers outside addresses.
        let mut src_port = first_groups(&SRC_PORT, line).next();
        let mut dst_port = first_groups(&DST_PORT, line).next();
        if src_port.is_none() && dst_port.is_none() {
            let mut bare = bare_numbers(line, &ip_spans);
            src_port = bare.next();
            dst_port = bare.next();
        }

        let protocol = PROTOCOL
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_lowercase());

        NetworkRecord {
            src_ip,
            dest_ip,
            src_port: src_port.map(Value::String),
            dst_port: dst_port.map(Value::String),
            protocol,
            message: Some(line.trim().to_string()).filter(|s| !s.is_empty()),
            ..Default::default()
        }
    }
}

/// Standalone 1-5 digit numbers that are not part of an IPv4 address or a clock time.
fn bare_numbers<'a>(line: &'a str, ip_spans: &'a [(usize, usize)]) -> impl Iterator<Item = String> + 'a {
    let bytes = line.as_bytes();
    line.match_indices(|c: char| c.is_ascii_digit())
        .filter(move |(i, _)| *i == 0 || !bytes[*i - 1].is_ascii_digit())
        .filter_map(move |(start, _)| {
            let len = bytes[start..].iter().take_while(|b| b.is_ascii_digit()).count();
            let end = start + len;
            let inside_ip = ip_spans.iter().any(|(s, e)| start >= *s && end <= *e);
            let before = start.checked_sub(1).map(|i| bytes[i]);
            let after = bytes.get(end).copied();
            let word_edge = |b: Option<u8>| b.map_or(true, |b| !(b.is_ascii_alphanumeric() || b == b'_'));
            let in_clock = before == Some(b':') || after == Some(b':');
            (len <= 5 && !inside_ip && !in_clock && word_edge(before) && word_edge(after))
                .then(|| line[start..end].to_string())
        })
}

impl Parser for NetworkParser {
    fn name(&self) -> &str {
        "network"
    }

    fn parse(&self, record: &RawRecord) -> ParsedRecord {
        match record {
            RawRecord::Mapping(map) => ParsedRecord::Network(Self::parse_mapping(map)),
            RawRecord::Text(line) => ParsedRecord::Network(Self::parse_text(line)),
            RawRecord::Unrecognized(_) => ParsedRecord::Empty,
        }
    }
}
