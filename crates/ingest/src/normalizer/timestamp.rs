//! Timestamp normalization to UTC.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};

/// Offset-bearing ISO-8601 shapes beyond strict RFC 3339.
const ISO_OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

/// Naive ISO-8601 shapes, read as UTC.
const ISO_NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Normalized form: ISO-8601 string with an explicit `+00:00` offset, and epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTimestamp {
    pub iso: String,
    pub epoch: i64,
}

impl From<DateTime<Utc>> for NormalizedTimestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self {
            iso: dt.to_rfc3339(),
            epoch: dt.timestamp(),
        }
    }
}

/// Try ISO-8601 first (trailing `Z` = UTC), then syslog `<Mon> <d> <HH:MM:SS>`
/// in the current UTC year. `None` when neither shape parses.
pub fn normalize_timestamp(raw: &str) -> Option<NormalizedTimestamp> {
    parse_timestamp(raw, Utc::now().year()).map(Into::into)
}

/// Same as [`normalize_timestamp`] with an explicit year for syslog stamps.
pub fn parse_timestamp(raw: &str, syslog_year: i32) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    parse_iso(raw).or_else(|| parse_syslog(raw, syslog_year))
}

fn parse_iso(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let owned;
    let raw = match raw.strip_suffix('Z') {
        Some(stripped) => {
            owned = format!("{stripped}+00:00");
            owned.as_str()
        }
        None => raw,
    };

    for fmt in ISO_OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in ISO_NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn parse_syslog(raw: &str, year: i32) -> Option<DateTime<Utc>> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    NaiveDateTime::parse_from_str(&format!("{year} {collapsed}"), "%Y %b %d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
