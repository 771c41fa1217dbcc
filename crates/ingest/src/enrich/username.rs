//! Username selection from pattern candidates, with an auth-log fallback.

use indexmap::IndexSet;

use crate::patterns::AUTH_USERNAME_PATTERNS;

/// Tokens the generic username patterns pick up from surrounding prose.
const BLACKLIST: &[&str] = &["session", "closed", "invalid", "user", "login", "from", "to", "for"];

/// Values the auth-log patterns must never return.
const FALLBACK_EXCLUDE: &[&str] = &[
    "invalid", "unknown", "user", "root", "nologin", "system", "admin:", "from", "to", "uid", "gid",
];

const TRIM_CHARS: &[char] = &[',', '.', ':', ';', '[', ']', '(', ')'];

/// First candidate that is not a blacklisted token.
pub fn choose(candidates: &IndexSet<String>) -> Option<String> {
    candidates
        .iter()
        .find(|c| !BLACKLIST.contains(&c.to_lowercase().as_str()))
        .cloned()
}

/// Ordered auth-log patterns; the first accepted match wins. Matches are
/// lowercased and stripped of surrounding punctuation.
pub fn fallback(message: &str) -> Option<String> {
    AUTH_USERNAME_PATTERNS.iter().find_map(|re| {
        let candidate = re.captures(message)?.get(1)?.as_str().trim().to_lowercase();
        if candidate.is_empty() || FALLBACK_EXCLUDE.contains(&candidate.as_str()) {
            return None;
        }
        let cleaned = candidate.trim_matches(TRIM_CHARS);
        (!cleaned.is_empty()).then(|| cleaned.to_string())
    })
}
