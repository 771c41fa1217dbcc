//! Output sinks and the storage-record sanitizer every sink goes through.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use driftlog_core::ScoredEvent;

use crate::error::SinkError;

#[async_trait]
pub trait OutputSink: Send + Sync {
    /// Persist a scored batch; returns how many records were stored.
    async fn write(&self, events: &[ScoredEvent]) -> Result<usize, SinkError>;
}

// ── Sanitizer ───────────────────────────────────────────────────────

/// In-memory column → stored column. Anything not listed is dropped.
pub const COLUMN_MAP: &[(&str, &str)] = &[
    ("timestamp", "timestamp"),
    ("epoch_timestamp", "epoch_timestamp"),
    ("user", "user_name"),
    ("host", "host"),
    ("process", "process"),
    ("src_ip", "src_ip"),
    ("dest_ip", "dest_ip"),
    ("src_port", "src_port"),
    ("dst_port", "dst_port"),
    ("protocol", "protocol"),
    ("bytes_in", "bytes_in"),
    ("bytes_out", "bytes_out"),
    ("source", "source"),
    ("message", "message"),
    ("raw", "raw"),
    ("has_user", "has_user"),
    ("has_src_ip", "has_src_ip"),
    ("has_process", "has_process"),
    ("has_host", "has_host"),
    ("has_dest_ip", "has_dest_ip"),
    ("has_message", "has_message"),
    ("has_src_port", "has_src_port"),
    ("has_dst_port", "has_dst_port"),
    ("has_protocol", "has_protocol"),
    ("failed_attempt", "failed_attempt"),
    ("hour", "hour"),
    ("day_of_week", "day_of_week"),
    ("is_weekend", "is_weekend"),
    ("is_working_hour", "is_working_hour"),
    ("user_freq", "user_freq"),
    ("user_is_rare", "user_is_rare"),
    ("src_ip_freq", "src_ip_freq"),
    ("src_ip_is_rare", "src_ip_is_rare"),
    ("src_ip_is_private", "src_ip_is_private"),
    ("process_freq", "process_freq"),
    ("process_family", "process_family"),
    ("host_freq", "host_freq"),
    ("user_event_count", "user_event_count"),
    ("user_failed_ratio", "user_failed_ratio"),
    ("user_unique_src_ip", "user_unique_src_ip"),
    ("host_event_count", "host_event_count"),
    ("host_failed_ratio", "host_failed_ratio"),
    ("host_unique_src_ip", "host_unique_src_ip"),
    ("src_ip_event_count", "src_ip_event_count"),
    ("src_ip_failed_ratio", "src_ip_failed_ratio"),
    ("src_ip_unique_users", "src_ip_unique_users"),
    ("iforest_score", "iforest_score"),
    ("lstm_score", "lstm_score"),
    ("anomaly_score", "anomaly_score"),
    ("concept_drift", "concept_drift"),
];

/// Stored columns that must hold real booleans.
pub const BOOLEAN_COLUMNS: &[&str] = &[
    "has_user",
    "has_src_ip",
    "has_dest_ip",
    "has_process",
    "has_host",
    "has_message",
    "has_src_port",
    "has_dst_port",
    "has_protocol",
    "is_weekend",
    "is_working_hour",
    "user_is_rare",
    "src_ip_is_rare",
    "src_ip_is_private",
    "failed_attempt",
    "concept_drift",
];

/// Never stored, whatever the column map says.
pub const FORBIDDEN_COLUMNS: &[&str] = &["host_id"];

fn coerce_bool(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Bool(b) => Value::Bool(*b),
        Value::Number(n) => Value::Bool(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => Value::Bool(matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes"
        )),
        Value::Array(a) => Value::Bool(!a.is_empty()),
        Value::Object(o) => Value::Bool(!o.is_empty()),
    }
}

/// Non-finite numbers and their text spellings become null.
fn clean(value: Value) -> Value {
    match value {
        Value::Number(ref n) if n.as_f64().is_some_and(|f| !f.is_finite()) => Value::Null,
        Value::String(ref s) if matches!(s.as_str(), "NaN" | "nan" | "inf" | "-inf") => Value::Null,
        other => other,
    }
}

fn wrap_raw(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(map),
        Value::Null => Value::Object(Map::new()),
        other => {
            let mut map = Map::new();
            map.insert("raw".into(), other);
            Value::Object(map)
        }
    }
}

/// Project an in-memory record onto the stored schema.
///
/// Every mapped column is present in the output (null when missing),
/// forbidden columns are removed, booleans coerced and non-finite values
/// nulled.
pub fn sanitize_record(mut record: Map<String, Value>) -> Map<String, Value> {
    for forbidden in FORBIDDEN_COLUMNS {
        record.remove(*forbidden);
    }

    let mut out = Map::new();
    for (from, to) in COLUMN_MAP {
        let value = clean(record.remove(*from).unwrap_or(Value::Null));
        let value = if *to == "raw" {
            wrap_raw(value)
        } else if BOOLEAN_COLUMNS.contains(to) {
            coerce_bool(&value)
        } else {
            value
        };
        out.insert(to.to_string(), value);
    }

    for forbidden in FORBIDDEN_COLUMNS {
        out.remove(*forbidden);
    }
    out
}

pub fn sanitize_batch(events: &[ScoredEvent]) -> Vec<Map<String, Value>> {
    events.iter().map(|e| sanitize_record(e.to_record())).collect()
}

// ── JSONL ───────────────────────────────────────────────────────────

/// Appends one sanitized JSON object per line.
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl OutputSink for JsonlSink {
    async fn write(&self, events: &[ScoredEvent]) -> Result<usize, SinkError> {
        if events.is_empty() {
            return Ok(0);
        }

        let records = sanitize_batch(events);
        let mut buf = Vec::new();
        for record in &records {
            serde_json::to_writer(&mut buf, record)?;
            buf.push(b'\n');
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&buf).await?;
        file.flush().await?;

        debug!(records = records.len(), path = %self.path.display(), "batch written");
        Ok(records.len())
    }
}

// ── Memory ──────────────────────────────────────────────────────────

/// Keeps sanitized records in memory. Clones share the same store.
#[derive(Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<Map<String, Value>>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Map<String, Value>> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl OutputSink for MemorySink {
    async fn write(&self, events: &[ScoredEvent]) -> Result<usize, SinkError> {
        let records = sanitize_batch(events);
        let n = records.len();
        if let Ok(mut store) = self.records.lock() {
            store.extend(records);
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftlog_core::{CanonicalEvent, FeatureRow};
    use serde_json::json;

    fn make_scored(raw: Value) -> ScoredEvent {
        let mut event = CanonicalEvent {
            user: "alice".into(),
            host: "web01".into(),
            raw,
            ..Default::default()
        };
        event.refresh_flags();
        let mut row = FeatureRow::new(event, vec![0.3; 4]);
        row.set("host_id", 0i64);
        row.set("failed_attempt", 1i64);
        row.set("user_failed_ratio", f64::NAN);
        row.set("process_family", "ssh");
        ScoredEvent {
            row,
            iforest_score: 0.61,
            lstm_score: 0.02,
            anomaly_score: 0.9,
            concept_drift: false,
        }
    }

    #[test]
    fn sanitizer_enforces_stored_schema() {
        let rec = sanitize_record(make_scored(json!("Jan 10 sshd: hi")).to_record());

        assert!(!rec.contains_key("host_id"));
        assert!(!rec.contains_key("user"));
        assert_eq!(rec["user_name"], json!("alice"));
        assert_eq!(rec["failed_attempt"], json!(true));
        assert_eq!(rec["has_user"], json!(true));
        assert_eq!(rec["has_src_ip"], json!(false));
        assert_eq!(rec["user_failed_ratio"], Value::Null);
        // Never computed for this row, still present.
        assert_eq!(rec["hour"], Value::Null);
        assert_eq!(rec["raw"], json!({"raw": "Jan 10 sshd: hi"}));
        assert_eq!(rec.len(), COLUMN_MAP.len());
    }

    #[test]
    fn forbidden_column_is_removed_even_if_mapped() {
        let mut rec = Map::new();
        rec.insert("host_id".into(), json!(7));
        rec.insert("user".into(), json!("bob"));
        let out = sanitize_record(rec);
        assert!(!out.contains_key("host_id"));
        assert_eq!(out["user_name"], json!("bob"));
    }

    #[test]
    fn raw_objects_are_kept() {
        let rec = sanitize_record(make_scored(json!({"EventID": 4625})).to_record());
        assert_eq!(rec["raw"], json!({"EventID": 4625}));
        let rec = sanitize_record(make_scored(Value::Null).to_record());
        assert_eq!(rec["raw"], json!({}));
    }

    #[test]
    fn boolean_coercion() {
        assert_eq!(coerce_bool(&json!(0)), json!(false));
        assert_eq!(coerce_bool(&json!(2.5)), json!(true));
        assert_eq!(coerce_bool(&json!("True")), json!(true));
        assert_eq!(coerce_bool(&Value::Null), Value::Null);
    }

    #[tokio::test]
    async fn jsonl_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlSink::new(dir.path().join("out/scored.jsonl"));
        assert_eq!(sink.write(&[make_scored(json!("a")), make_scored(json!("b"))]).await.unwrap(), 2);
        assert_eq!(sink.write(&[make_scored(json!("c"))]).await.unwrap(), 1);
        assert_eq!(sink.write(&[]).await.unwrap(), 0);

        let text = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2]["raw"], json!({"raw": "c"}));
        assert!(lines.iter().all(|l| l.get("host_id").is_none()));
    }

    #[tokio::test]
    async fn memory_sink_shares_store_across_clones() {
        let sink = MemorySink::new();
        let handle = sink.clone();
        sink.write(&[make_scored(json!("x"))]).await.unwrap();
        assert_eq!(handle.len(), 1);
        assert_eq!(handle.records()[0]["anomaly_score"], json!(0.9));
    }
}
