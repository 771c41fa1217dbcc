use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum PipelineStatus {
    Stopped = 0,
    Running = 1,
    Paused = 2,
}

impl PipelineStatus {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Running,
            2 => Self::Paused,
            _ => Self::Stopped,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "STOPPED",
            Self::Running => "RUNNING",
            Self::Paused => "PAUSED",
        }
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run counters, updated once per processed batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunMetrics {
    pub events_processed: u64,
    pub anomalies: u64,
    /// Throughput of the most recent batch.
    pub logs_per_sec: f64,
    pub batches: u64,
    pub failed_batches: u64,
    pub last_batch_at: Option<DateTime<Utc>>,
}

impl RunMetrics {
    /// Record a stored batch. Throughput divides by at least one second.
    pub fn record_batch(&mut self, stored: u64, anomalies: u64, elapsed: Duration) {
        self.events_processed += stored;
        self.anomalies += anomalies;
        self.batches += 1;
        self.last_batch_at = Some(Utc::now());

        let secs = elapsed.as_secs_f64().max(1.0);
        self.logs_per_sec = (stored as f64 / secs * 100.0).round() / 100.0;
    }

    pub fn record_failure(&mut self) {
        self.failed_batches += 1;
    }

    pub fn snapshot(&self, status: PipelineStatus) -> MetricsSnapshot {
        MetricsSnapshot {
            status,
            events_processed: self.events_processed,
            anomalies: self.anomalies,
            logs_per_sec: self.logs_per_sec,
        }
    }
}

/// What the control surface reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub status: PipelineStatus,
    pub events_processed: u64,
    pub anomalies: u64,
    pub logs_per_sec: f64,
}
