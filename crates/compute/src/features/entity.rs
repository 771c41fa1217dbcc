//! Frequency and rarity encoders for users, source IPs, processes and
//! generic categorical columns.

use std::net::IpAddr;

use indexmap::IndexMap;

use driftlog_core::FeatureRow;

use super::{column_keys, value_counts, Transform};

/// Linear-interpolated percentile of `values` (`pct` in 0..=100).
pub(crate) fn percentile(values: &[i64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f64> = values.iter().map(|v| *v as f64).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

fn frequencies(keys: &[Option<String>]) -> (IndexMap<Option<String>, i64>, Vec<i64>) {
    let counts = value_counts(keys);
    let freqs = keys.iter().map(|k| counts[k]).collect();
    (counts, freqs)
}

// ── User ────────────────────────────────────────────────────────────

/// `user_freq`, and `user_is_rare` when the frequency falls below the
/// configured percentile of per-user counts.
pub struct UserEncoder {
    column: String,
    rare_percentile: f64,
}

impl UserEncoder {
    pub const DEFAULT_RARE_PERCENTILE: f64 = 5.0;

    pub fn new(column: &str, rare_percentile: f64) -> Self {
        Self {
            column: column.to_string(),
            rare_percentile,
        }
    }
}

impl Transform for UserEncoder {
    fn name(&self) -> &str {
        "user"
    }

    fn apply(&self, rows: &mut [FeatureRow]) {
        let Some(keys) = column_keys(rows, &self.column) else {
            for row in rows.iter_mut() {
                row.set("user_freq", 0i64);
                row.set("user_is_rare", false);
            }
            return;
        };

        let (counts, freqs) = frequencies(&keys);
        let per_user: Vec<i64> = counts.values().copied().collect();
        let threshold = percentile(&per_user, self.rare_percentile);

        for (row, freq) in rows.iter_mut().zip(freqs) {
            row.set("user_freq", freq);
            row.set("user_is_rare", (freq as f64) < threshold);
        }
    }
}

// ── Source IP ───────────────────────────────────────────────────────

/// Private, loopback, link-local and other non-routable ranges.
pub fn is_private_ip(ip: &str) -> bool {
    match ip.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => {
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_documentation()
                || v4.is_broadcast()
        }
        Ok(IpAddr::V6(v6)) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00 // unique local
                || (first & 0xffc0) == 0xfe80 // link local
        }
        Err(_) => false,
    }
}

/// `src_ip_freq`, `src_ip_is_rare` (frequency below a fixed count) and
/// `src_ip_is_private`.
pub struct IpEncoder {
    column: String,
    rare_threshold: i64,
}

impl IpEncoder {
    pub const DEFAULT_RARE_THRESHOLD: i64 = 3;

    pub fn new(column: &str, rare_threshold: i64) -> Self {
        Self {
            column: column.to_string(),
            rare_threshold,
        }
    }
}

impl Transform for IpEncoder {
    fn name(&self) -> &str {
        "src_ip"
    }

    fn apply(&self, rows: &mut [FeatureRow]) {
        let Some(keys) = column_keys(rows, &self.column) else {
            for row in rows.iter_mut() {
                row.set("src_ip_freq", 0i64);
                row.set("src_ip_is_rare", false);
                row.set("src_ip_is_private", false);
            }
            return;
        };

        let (_, freqs) = frequencies(&keys);
        for ((row, freq), key) in rows.iter_mut().zip(freqs).zip(&keys) {
            row.set("src_ip_freq", freq);
            row.set("src_ip_is_rare", freq < self.rare_threshold);
            row.set(
                "src_ip_is_private",
                key.as_deref().map(is_private_ip).unwrap_or(false),
            );
        }
    }
}

// ── Process ─────────────────────────────────────────────────────────

/// Coarse process family by substring.
pub fn process_family(process: &str) -> &'static str {
    let p = process.to_lowercase();
    if p.contains("ssh") {
        "ssh"
    } else if p.contains("cron") {
        "cron"
    } else if p.contains("systemd") {
        "systemd"
    } else if p.contains("pam") {
        "pam"
    } else {
        "other"
    }
}

/// `process_freq` and `process_family`.
pub struct ProcessEncoder {
    column: String,
}

impl ProcessEncoder {
    pub fn new(column: &str) -> Self {
        Self {
            column: column.to_string(),
        }
    }
}

impl Transform for ProcessEncoder {
    fn name(&self) -> &str {
        "process"
    }

    fn apply(&self, rows: &mut [FeatureRow]) {
        let Some(keys) = column_keys(rows, &self.column) else {
            for row in rows.iter_mut() {
                row.set("process_freq", 0i64);
                row.set("process_family", "unknown");
            }
            return;
        };

        let (_, freqs) = frequencies(&keys);
        for ((row, freq), key) in rows.iter_mut().zip(freqs).zip(&keys) {
            row.set("process_freq", freq);
            row.set("process_family", process_family(key.as_deref().unwrap_or("")));
        }
    }
}

// ── Generic categorical ─────────────────────────────────────────────

/// `{prefix}_freq` and a dense `{prefix}_id`: ids run 0..N-1 by
/// descending in-batch frequency, ties broken by first appearance.
pub struct CategoricalEncoder {
    column: String,
    prefix: String,
}

impl CategoricalEncoder {
    pub fn new(column: &str, prefix: &str) -> Self {
        Self {
            column: column.to_string(),
            prefix: prefix.to_string(),
        }
    }
}

impl Transform for CategoricalEncoder {
    fn name(&self) -> &str {
        &self.prefix
    }

    fn apply(&self, rows: &mut [FeatureRow]) {
        let freq_col = format!("{}_freq", self.prefix);
        let id_col = format!("{}_id", self.prefix);

        let Some(keys) = column_keys(rows, &self.column) else {
            for row in rows.iter_mut() {
                row.set(&freq_col, 0i64);
                row.set(&id_col, -1i64);
            }
            return;
        };

        let (counts, freqs) = frequencies(&keys);
        let mut ranked: Vec<(&Option<String>, i64)> = counts.iter().map(|(k, c)| (k, *c)).collect();
        // Stable sort keeps first-appearance order among equal counts.
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        let ids: IndexMap<&Option<String>, i64> = ranked
            .into_iter()
            .enumerate()
            .map(|(id, (k, _))| (k, id as i64))
            .collect();

        for ((row, freq), key) in rows.iter_mut().zip(freqs).zip(&keys) {
            let id = ids.get(key).copied().unwrap_or(-1);
            row.set(&freq_col, freq);
            row.set(&id_col, id);
        }
    }
}
