//! AWS CloudTrail audit events.

use driftlog_core::RawRecord;

use super::{get_text, value_text, ParsedRecord, Parser};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CloudTrailRecord {
    pub event_time: Option<String>,
    /// `userIdentity.userName`.
    pub user_name: Option<String>,
    pub source_ip: Option<String>,
    pub region: Option<String>,
    pub event_source: Option<String>,
    pub event_name: Option<String>,
    /// `requestParameters` rendered as JSON text.
    pub request_parameters: Option<String>,
}

pub struct CloudTrailParser;

impl Parser for CloudTrailParser {
    fn name(&self) -> &str {
        "cloudtrail"
    }

    fn parse(&self, record: &RawRecord) -> ParsedRecord {
        let Some(map) = record.as_mapping() else {
            return ParsedRecord::Empty;
        };

        let user_name = map
            .get("userIdentity")
            .and_then(|id| id.get("userName"))
            .and_then(value_text);

        ParsedRecord::CloudTrail(CloudTrailRecord {
            event_time: get_text(map, "eventTime"),
            user_name,
            source_ip: get_text(map, "sourceIPAddress"),
            region: get_text(map, "awsRegion"),
            event_source: get_text(map, "eventSource"),
            event_name: get_text(map, "eventName"),
            request_parameters: get_text(map, "requestParameters"),
        })
    }
}
