use once_cell::sync::Lazy;
use regex::Regex;

use driftlog_core::{FeatureRow, FieldValue};

use super::Transform;

static FAILURE_TERMS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)invalid user|failed|error|closed|denied").expect("failure pattern must compile")
});

/// `failed_attempt`: the message mentions a failure term.
pub struct FailedAttemptFlag {
    column: String,
}

impl FailedAttemptFlag {
    pub fn new(column: &str) -> Self {
        Self {
            column: column.to_string(),
        }
    }
}

impl Transform for FailedAttemptFlag {
    fn name(&self) -> &str {
        "failed_attempt"
    }

    fn apply(&self, rows: &mut [FeatureRow]) {
        for row in rows.iter_mut() {
            let failed = match row.column(&self.column) {
                Some(FieldValue::Text(msg)) => FAILURE_TERMS.is_match(&msg),
                _ => false,
            };
            row.set("failed_attempt", failed);
        }
    }
}
