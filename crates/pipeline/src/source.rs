//! Input sources. An empty batch means "nothing available right now", never
//! end of stream.

use std::collections::VecDeque;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tracing::debug;

use driftlog_core::RawRecord;

use crate::error::SourceError;

#[async_trait]
pub trait InputSource: Send + Sync {
    /// Up to `max` records, in arrival order.
    async fn read_batch(&mut self, max: usize) -> Result<Vec<RawRecord>, SourceError>;
}

/// JSON-object lines become mappings, everything else stays text.
pub fn line_to_record(line: &str) -> RawRecord {
    if line.starts_with('{') {
        if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(line) {
            return RawRecord::Mapping(map);
        }
    }
    RawRecord::Text(line.to_string())
}

// ── File ────────────────────────────────────────────────────────────

/// Tails a log file by byte offset.
///
/// Only newline-terminated lines are consumed; a partial trailing line is
/// left for a later read. Blank lines are skipped.
pub struct FileSource {
    path: PathBuf,
    offset: u64,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(SourceError::NotFound(path));
        }
        Ok(Self { path, offset: 0 })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Start reading from the beginning again.
    pub fn reset(&mut self) {
        self.offset = 0;
    }
}

#[async_trait]
impl InputSource for FileSource {
    async fn read_batch(&mut self, max: usize) -> Result<Vec<RawRecord>, SourceError> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        let len = file.metadata().await?.len();
        if len < self.offset {
            // Truncated or rotated underneath us.
            debug!(path = %self.path.display(), "input shrank, rewinding");
            self.offset = 0;
        }

        file.seek(SeekFrom::Start(self.offset)).await?;
        let mut reader = BufReader::new(file);

        let mut records = Vec::new();
        let mut consumed = 0u64;
        let mut line = Vec::new();
        while records.len() < max {
            line.clear();
            let n = reader.read_until(b'\n', &mut line).await?;
            if n == 0 || line.last() != Some(&b'\n') {
                // EOF, possibly mid-line; leave the partial line for later.
                break;
            }
            consumed += n as u64;
            let text = String::from_utf8_lossy(&line);
            let text = text.trim();
            if !text.is_empty() {
                records.push(line_to_record(text));
            }
        }

        self.offset += consumed;
        debug!(records = records.len(), offset = self.offset, "file batch read");
        Ok(records)
    }
}

// ── Memory ──────────────────────────────────────────────────────────

/// Pre-loaded records, drained front to back.
#[derive(Default)]
pub struct MemorySource {
    records: VecDeque<RawRecord>,
}

impl MemorySource {
    pub fn new(records: impl IntoIterator<Item = RawRecord>) -> Self {
        Self {
            records: records.into_iter().collect(),
        }
    }

    pub fn push(&mut self, record: RawRecord) {
        self.records.push_back(record);
    }

    pub fn remaining(&self) -> usize {
        self.records.len()
    }
}

#[async_trait]
impl InputSource for MemorySource {
    async fn read_batch(&mut self, max: usize) -> Result<Vec<RawRecord>, SourceError> {
        let n = max.min(self.records.len());
        Ok(self.records.drain(..n).collect())
    }
}
