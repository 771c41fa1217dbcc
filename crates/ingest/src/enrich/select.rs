//! Host and process selection from pattern candidates.

use indexmap::IndexSet;

/// Processes preferred over arbitrary tokens.
const COMMON_PROCESSES: &[&str] = &["sshd", "cron", "systemd", "auditd", "svchost", "powershell"];

/// AWS-instance hostnames first, then anything dotted, then the first candidate.
pub fn choose_host(candidates: &IndexSet<String>) -> Option<String> {
    candidates
        .iter()
        .find(|h| h.starts_with("ip-") || h.contains('.'))
        .or_else(|| candidates.first())
        .cloned()
}

/// A well-known OS process if present (case-insensitive), else the first candidate.
pub fn choose_process(candidates: &IndexSet<String>) -> Option<String> {
    candidates
        .iter()
        .find(|p| COMMON_PROCESSES.contains(&p.to_lowercase().as_str()))
        .or_else(|| candidates.first())
        .cloned()
}

/// Identity fields are upgraded only when missing or still a placeholder.
pub fn needs_upgrade(current: &str) -> bool {
    current.is_empty() || current.contains("unknown")
}
