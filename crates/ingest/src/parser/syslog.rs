//! RFC 3164-style syslog lines: `<Mon> <d> <HH:MM:SS> <host> <process>: <message>`.

use once_cell::sync::Lazy;
use regex::Regex;

use driftlog_core::RawRecord;

use super::{ParsedRecord, Parser};

static SYSLOG_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<timestamp>\w{3}\s+\d+\s+\d+:\d+:\d+)\s+(?P<host>\S+)\s+(?P<process>\S+):\s+(?P<message>.*)",
    )
    .expect("syslog line pattern")
});

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyslogRecord {
    pub timestamp: Option<String>,
    pub host: Option<String>,
    /// Process token as written, including any `[pid]` suffix.
    pub process: Option<String>,
    pub message: Option<String>,
}

pub struct SyslogParser;

impl Parser for SyslogParser {
    fn name(&self) -> &str {
        "syslog"
    }

    fn parse(&self, record: &RawRecord) -> ParsedRecord {
        let Some(line) = record.as_text() else {
            return ParsedRecord::Empty;
        };

        match SYSLOG_LINE.captures(line) {
            Some(caps) => {
                let group = |name: &str| caps.name(name).map(|m| m.as_str().to_string());
                ParsedRecord::Syslog(SyslogRecord {
                    timestamp: group("timestamp"),
                    host: group("host"),
                    process: group("process"),
                    message: group("message"),
                })
            }
            // No header: keep the line as the message so enrichment can still run.
            None if !line.trim().is_empty() => ParsedRecord::Syslog(SyslogRecord {
                message: Some(line.trim().to_string()),
                ..Default::default()
            }),
            None => ParsedRecord::Empty,
        }
    }
}
