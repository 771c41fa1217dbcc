//! In-batch feature engineering.
//!
//! Every transform reads its source columns from the rows themselves and
//! writes derived columns back onto each row. All frequency, rarity and
//! aggregate statistics are computed over the current batch only, so the
//! same event can receive different values depending on what it was
//! batched with.
//!
//! A transform whose source column does not exist on the rows fills its
//! outputs with defaults instead of failing.

pub mod aggregate;
pub mod basic;
pub mod entity;
pub mod time;

use indexmap::IndexMap;
use tracing::debug;

use driftlog_core::{FeatureRow, FieldValue};

pub use aggregate::Aggregator;
pub use basic::FailedAttemptFlag;
pub use entity::{CategoricalEncoder, IpEncoder, ProcessEncoder, UserEncoder};
pub use time::TimeEncoder;

/// Structured columns fed to the scorer, in matrix order.
pub const NUMERIC_FEATURES: &[&str] = &[
    "hour",
    "day_of_week",
    "is_weekend",
    "is_working_hour",
    "user_freq",
    "user_is_rare",
    "user_event_count",
    "user_failed_ratio",
    "src_ip_freq",
    "src_ip_is_rare",
    "src_ip_is_private",
    "src_ip_event_count",
    "src_ip_failed_ratio",
    "host_event_count",
    "host_failed_ratio",
    "process_freq",
    "failed_attempt",
];

/// One feature transform over a whole batch.
pub trait Transform: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, rows: &mut [FeatureRow]);
}

/// Ordered chain of transforms.
pub struct FeaturePipeline {
    transforms: Vec<Box<dyn Transform>>,
}

impl FeaturePipeline {
    pub fn new(transforms: Vec<Box<dyn Transform>>) -> Self {
        Self { transforms }
    }

    pub fn transform_names(&self) -> Vec<&str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }

    /// Run every transform in order over the batch.
    pub fn extract(&self, mut rows: Vec<FeatureRow>) -> Vec<FeatureRow> {
        if rows.is_empty() {
            return rows;
        }
        for transform in &self.transforms {
            transform.apply(&mut rows);
            debug!(transform = transform.name(), rows = rows.len(), "feature transform applied");
        }
        rows
    }
}

impl Default for FeaturePipeline {
    /// Flags, time, entity encoders, then user/host/IP aggregates.
    fn default() -> Self {
        Self::new(vec![
            Box::new(FailedAttemptFlag::new("message")),
            Box::new(TimeEncoder::new("timestamp")),
            Box::new(UserEncoder::new("user", UserEncoder::DEFAULT_RARE_PERCENTILE)),
            Box::new(IpEncoder::new("src_ip", IpEncoder::DEFAULT_RARE_THRESHOLD)),
            Box::new(ProcessEncoder::new("process")),
            Box::new(CategoricalEncoder::new("host", "host")),
            Box::new(Aggregator::new("user", "user", "src_ip", "unique_src_ip")),
            Box::new(Aggregator::new("host", "host", "src_ip", "unique_src_ip")),
            Box::new(Aggregator::new("src_ip", "src_ip", "user", "unique_users")),
        ])
    }
}

// ── Column helpers ──────────────────────────────────────────────────

/// Group key for a cell. Nulls share the `None` group.
pub(crate) fn group_key(value: Option<FieldValue>) -> Option<String> {
    match value? {
        FieldValue::Null => None,
        FieldValue::Text(s) => Some(s),
        FieldValue::Integer(i) => Some(i.to_string()),
        FieldValue::Float(f) => Some(f.to_string()),
        FieldValue::Boolean(b) => Some(b.to_string()),
    }
}

/// Keys of `column` for every row, or `None` when no row has the column.
pub(crate) fn column_keys(rows: &[FeatureRow], column: &str) -> Option<Vec<Option<String>>> {
    let cells: Vec<Option<FieldValue>> = rows.iter().map(|r| r.column(column)).collect();
    if cells.iter().all(Option::is_none) {
        return None;
    }
    Some(cells.into_iter().map(group_key).collect())
}

/// Occurrence count per key, in first-appearance order.
pub(crate) fn value_counts(keys: &[Option<String>]) -> IndexMap<Option<String>, i64> {
    let mut counts = IndexMap::new();
    for key in keys {
        *counts.entry(key.clone()).or_insert(0) += 1;
    }
    counts
}
