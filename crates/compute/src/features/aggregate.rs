use std::collections::HashSet;

use indexmap::IndexMap;

use driftlog_core::FeatureRow;

use super::{column_keys, group_key, Transform};

/// Group-level statistics joined back onto every row of the group:
/// `{prefix}_event_count`, `{prefix}_failed_ratio` (mean of
/// `failed_attempt`) and `{prefix}_{distinct_name}` (distinct non-null
/// values of a linked column).
pub struct Aggregator {
    key: String,
    prefix: String,
    linked: String,
    distinct_name: String,
}

#[derive(Default)]
struct GroupStats {
    events: i64,
    failures: f64,
    linked: HashSet<String>,
}

impl Aggregator {
    pub fn new(key: &str, prefix: &str, linked: &str, distinct_name: &str) -> Self {
        Self {
            key: key.to_string(),
            prefix: prefix.to_string(),
            linked: linked.to_string(),
            distinct_name: distinct_name.to_string(),
        }
    }

    fn columns(&self) -> (String, String, String) {
        (
            format!("{}_event_count", self.prefix),
            format!("{}_failed_ratio", self.prefix),
            format!("{}_{}", self.prefix, self.distinct_name),
        )
    }
}

impl Transform for Aggregator {
    fn name(&self) -> &str {
        &self.prefix
    }

    fn apply(&self, rows: &mut [FeatureRow]) {
        let (count_col, ratio_col, distinct_col) = self.columns();

        let Some(keys) = column_keys(rows, &self.key) else {
            for row in rows.iter_mut() {
                row.set(&count_col, 0i64);
                row.set(&ratio_col, 0.0);
                row.set(&distinct_col, 0i64);
            }
            return;
        };

        let mut groups: IndexMap<&Option<String>, GroupStats> = IndexMap::new();
        for (row, key) in rows.iter().zip(&keys) {
            let stats = groups.entry(key).or_default();
            stats.events += 1;
            stats.failures += row
                .column("failed_attempt")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0);
            if let Some(linked) = group_key(row.column(&self.linked)) {
                stats.linked.insert(linked);
            }
        }

        let joined: Vec<(i64, f64, i64)> = keys
            .iter()
            .map(|key| {
                let stats = &groups[key];
                (
                    stats.events,
                    stats.failures / stats.events as f64,
                    stats.linked.len() as i64,
                )
            })
            .collect();

        for (row, (events, ratio, distinct)) in rows.iter_mut().zip(joined) {
            row.set(&count_col, events);
            row.set(&ratio_col, ratio);
            row.set(&distinct_col, distinct);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_rows::make_row;
    use crate::features::FailedAttemptFlag;
    use driftlog_core::FieldValue;

    #[test]
    fn user_groups_join_back() {
        let mut rows = vec![
            make_row("alice", Some("10.0.0.1"), "Failed password"),
            make_row("alice", Some("10.0.0.2"), "Accepted password"),
            make_row("bob", None, "session opened"),
            make_row("alice", Some("10.0.0.1"), "Accepted password"),
        ];
        FailedAttemptFlag::new("message").apply(&mut rows);
        Aggregator::new("user", "user", "src_ip", "unique_src_ip").apply(&mut rows);

        let alice = &rows[0];
        assert_eq!(alice.feature("user_event_count"), Some(&FieldValue::Integer(3)));
        let ratio = alice.feature("user_failed_ratio").and_then(FieldValue::as_f64).unwrap();
        assert!((ratio - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(alice.feature("user_unique_src_ip"), Some(&FieldValue::Integer(2)));

        let bob = &rows[2];
        assert_eq!(bob.feature("user_event_count"), Some(&FieldValue::Integer(1)));
        assert_eq!(bob.feature("user_failed_ratio"), Some(&FieldValue::Float(0.0)));
        // Null source IPs are not counted as a distinct value.
        assert_eq!(bob.feature("user_unique_src_ip"), Some(&FieldValue::Integer(0)));
    }

    #[test]
    fn null_keys_form_one_group() {
        let mut rows = vec![
            make_row("a", None, "error"),
            make_row("b", None, "ok"),
            make_row("c", Some("1.2.3.4"), "ok"),
        ];
        FailedAttemptFlag::new("message").apply(&mut rows);
        Aggregator::new("src_ip", "src_ip", "user", "unique_users").apply(&mut rows);

        assert_eq!(rows[0].feature("src_ip_event_count"), Some(&FieldValue::Integer(2)));
        assert_eq!(rows[0].feature("src_ip_failed_ratio"), Some(&FieldValue::Float(0.5)));
        assert_eq!(rows[0].feature("src_ip_unique_users"), Some(&FieldValue::Integer(2)));
        assert_eq!(rows[2].feature("src_ip_event_count"), Some(&FieldValue::Integer(1)));
    }

    #[test]
    fn missing_failure_flag_counts_as_zero() {
        let mut rows = vec![make_row("a", None, "failed")];
        Aggregator::new("user", "user", "src_ip", "unique_src_ip").apply(&mut rows);
        assert_eq!(rows[0].feature("user_failed_ratio"), Some(&FieldValue::Float(0.0)));
    }
}
