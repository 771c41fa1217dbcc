//! Bounded, id-addressable log of pipeline activity for the control surface.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
}

struct Inner {
    entries: VecDeque<LogEntry>,
    next_id: u64,
}

/// Ring buffer of the most recent entries. Ids are monotonic and survive
/// eviction, so pollers can ask for everything after the last id they saw.
pub struct ActivityLog {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl ActivityLog {
    pub const DEFAULT_CAPACITY: usize = 1000;

    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                entries: VecDeque::new(),
                next_id: 1,
            }),
        }
    }

    /// Append an entry and return its id.
    pub fn push(&self, level: LogLevel, message: impl Into<String>) -> u64 {
        let Ok(mut inner) = self.inner.lock() else {
            return 0;
        };
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.push_back(LogEntry {
            id,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level,
            message: message.into(),
        });
        while inner.entries.len() > self.capacity {
            inner.entries.pop_front();
        }
        id
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.push(LogLevel::Info, message)
    }

    pub fn warn(&self, message: impl Into<String>) -> u64 {
        self.push(LogLevel::Warn, message)
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.push(LogLevel::Error, message)
    }

    /// Entries with id greater than `after_id`, oldest first. `None` returns
    /// everything retained.
    pub fn entries_after(&self, after_id: Option<u64>) -> Vec<LogEntry> {
        let Ok(inner) = self.inner.lock() else {
            return Vec::new();
        };
        inner
            .entries
            .iter()
            .filter(|e| after_id.map_or(true, |after| e.id > after))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
