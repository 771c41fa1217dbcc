//! Pattern library: regex sets for pulling entity candidates out of free-text
//! log messages.

use std::net::IpAddr;

use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;

// ── Usernames ───────────────────────────────────────────────────────

pub static USERNAME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_all(&[
        r"(?i)user(?:name)?[=\s:]+(\w[\w.-]*)",
        r"(?i)for user (\w[\w.-]*)",
        r"(?i)Invalid user (\w[\w.-]*)",
        r"(?i)session opened for user (\w[\w.-]*)",
        r"(?i)session closed for user (\w[\w.-]*)",
    ])
});

/// Auth-log specific patterns, tried in order when rule-based selection finds nothing.
pub static AUTH_USERNAME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_all(&[
        r"(?i)Invalid user (\S+)",
        r"(?i)Failed password for (\S+)",
        r"(?i)authentication failure.*user=(\S+)",
        r"(?i)user=(\S+)",
        r"(?i)for user (\S+)",
        r"(?i)for (\S+) from",
    ])
});

// ── Addresses and ports ─────────────────────────────────────────────

pub static IPV4: Lazy<Regex> = Lazy::new(|| compile(r"\b(?:\d{1,3}\.){3}\d{1,3}\b"));

pub static IPV6: Lazy<Regex> =
    Lazy::new(|| compile(r"\b(?:[A-Fa-f0-9]{0,4}:){2,7}[A-Fa-f0-9]{0,4}\b"));

pub static SRC_PORT: Lazy<Regex> =
    Lazy::new(|| compile(r"(?:sport|src_port|srcPort|sourcePort|SPT)[=\s:]+(\d{1,5})"));

pub static DST_PORT: Lazy<Regex> =
    Lazy::new(|| compile(r"(?:dport|dest_port|dstPort|destinationPort|DPT)[=\s:]+(\d{1,5})"));

pub static LABELED_SRC_IP: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_all(&[
        r"src(?:addr)?[=\s:]+(\b\d{1,3}(?:\.\d{1,3}){3}\b)",
        r"source(?:Address)?[=\s:]+(\b\d{1,3}(?:\.\d{1,3}){3}\b)",
        r"orig_h[=\s:]+(\b\d{1,3}(?:\.\d{1,3}){3}\b)",
    ])
});

pub static LABELED_DST_IP: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_all(&[
        r"dst(?:addr)?[=\s:]+(\b\d{1,3}(?:\.\d{1,3}){3}\b)",
        r"dest(?:ination)?Address[=\s:]+(\b\d{1,3}(?:\.\d{1,3}){3}\b)",
        r"resp_h[=\s:]+(\b\d{1,3}(?:\.\d{1,3}){3}\b)",
    ])
});

pub static PROTOCOL: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\b(tcp|udp|icmp)\b"));

// ── Hosts and processes ─────────────────────────────────────────────

pub static HOSTNAME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_all(&[
        r"\bip-\d+(?:-\d+){3}\b",
        r"\b[a-zA-Z0-9.-]+\.(?:local|com|net|org|io)\b",
    ])
});

pub static PROCESS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile_all(&[
        // Token followed by a pid, a colon, or whitespace.
        r"(\w[\w/_.-]+)(?:\[\d+\]|:|\s)",
        r"(?i)\b(sshd|cron|systemd|auditd|python|java|svchost|powershell)\b",
    ])
});

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in pattern must compile")
}

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| compile(p)).collect()
}

// ── Extraction ──────────────────────────────────────────────────────

/// Entity candidates found in one message. Each set keeps first-appearance order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidates {
    pub users: IndexSet<String>,
    pub ips: IndexSet<String>,
    pub ports: Vec<u16>,
    pub hosts: IndexSet<String>,
    pub processes: IndexSet<String>,
}

/// Run every pattern set over `message`. An empty message yields no candidates.
pub fn extract(message: &str) -> Candidates {
    let mut found = Candidates::default();
    if message.is_empty() {
        return found;
    }

    for re in USERNAME_PATTERNS.iter() {
        found.users.extend(first_groups(re, message));
    }

    // IPv6 matches also hit things like "12:00:01"; keep only real addresses.
    for re in [&*IPV4, &*IPV6] {
        found.ips.extend(
            re.find_iter(message)
                .map(|m| m.as_str())
                .filter(|s| s.parse::<IpAddr>().is_ok())
                .map(str::to_string),
        );
    }

    for re in [&*SRC_PORT, &*DST_PORT] {
        found
            .ports
            .extend(first_groups(re, message).filter_map(|p| p.parse::<u16>().ok()));
    }

    for re in HOSTNAME_PATTERNS.iter() {
        found
            .hosts
            .extend(re.find_iter(message).map(|m| m.as_str().to_string()));
    }

    for re in PROCESS_PATTERNS.iter() {
        found.processes.extend(first_groups(re, message));
    }

    found
}

/// Capture group 1 of every match.
pub fn first_groups<'a>(re: &'a Regex, text: &'a str) -> impl Iterator<Item = String> + 'a {
    re.captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Capture group 1 of the first pattern (in order) that matches.
pub fn first_capture(patterns: &[Regex], text: &str) -> Option<String> {
    patterns
        .iter()
        .find_map(|re| re.captures(text).and_then(|c| c.get(1)))
        .map(|m| m.as_str().to_string())
}
