//! Windows event records decoded to JSON (`TimeCreated`, `EventID`, ...).

use driftlog_core::RawRecord;

use super::{get_text, ParsedRecord, Parser};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowsRecord {
    pub time_created: Option<String>,
    pub user: Option<String>,
    pub ip_address: Option<String>,
    pub computer_name: Option<String>,
    pub process_name: Option<String>,
    pub event_id: Option<String>,
    pub message: Option<String>,
}

pub struct WindowsParser;

impl Parser for WindowsParser {
    fn name(&self) -> &str {
        "windows"
    }

    fn parse(&self, record: &RawRecord) -> ParsedRecord {
        let Some(map) = record.as_mapping() else {
            return ParsedRecord::Empty;
        };

        ParsedRecord::Windows(WindowsRecord {
            time_created: get_text(map, "TimeCreated"),
            user: get_text(map, "User"),
            // Logon events use "-" for "no address".
            ip_address: get_text(map, "IpAddress").filter(|ip| ip != "-"),
            computer_name: get_text(map, "ComputerName"),
            process_name: get_text(map, "ProcessName"),
            event_id: get_text(map, "EventID"),
            message: get_text(map, "Message"),
        })
    }
}
