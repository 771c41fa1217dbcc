use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use driftlog_compute::scoring::{IsolationForest, IsolationTree, LstmAutoencoder, Node, StandardScaler};
use driftlog_compute::{AnomalyModel, EnsembleScorer, NUMERIC_FEATURES};
use driftlog_core::config::{ModelConfig, RunnerConfig, ScoringConfig};
use driftlog_core::RawRecord;
use driftlog_ingest::{Embedder, EmbeddingError, HashingEmbedder, MessageEmbedder, ParserRegistry};
use driftlog_pipeline::{InputSource, MemorySink, Orchestrator, OutputSink, SourceError};

pub const EMBED_DIMS: usize = 8;

pub fn input_dims() -> usize {
    NUMERIC_FEATURES.len() + EMBED_DIMS
}

/// Write a scaler, a forest isolating failed attempts, and a zero-weight
/// autoencoder into `dir`.
pub fn write_artifacts(dir: &Path) -> ModelConfig {
    let models = ModelConfig {
        dir: dir.to_path_buf(),
    };
    let dims = input_dims();
    let failed_idx = NUMERIC_FEATURES
        .iter()
        .position(|n| *n == "failed_attempt")
        .unwrap();

    let tree = IsolationTree {
        nodes: vec![
            Node::Split {
                feature: failed_idx,
                threshold: 0.5,
                left: 1,
                right: 2,
            },
            Node::Leaf { size: 250 },
            Node::Leaf { size: 2 },
        ],
    };
    StandardScaler::identity(dims).save(&models.scaler_path()).unwrap();
    IsolationForest::new(dims, 256, vec![tree; 3])
        .save(&models.iforest_path())
        .unwrap();
    LstmAutoencoder::zeros(dims, 4, 2).save(&models.lstm_path()).unwrap();
    models
}

pub fn make_orchestrator_with(
    models: &ModelConfig,
    embedder: Arc<dyn Embedder>,
    sink: Arc<dyn OutputSink>,
) -> driftlog_pipeline::Result<Orchestrator> {
    let scorer = EnsembleScorer::load(models, &ScoringConfig::default())?;
    Ok(Orchestrator::new(
        ParserRegistry::embedded()?,
        MessageEmbedder::new(embedder),
        scorer,
        sink,
    ))
}

pub fn make_orchestrator(models: &ModelConfig, sink: &MemorySink) -> Orchestrator {
    make_orchestrator_with(
        models,
        Arc::new(HashingEmbedder::new(EMBED_DIMS)),
        Arc::new(sink.clone()),
    )
    .unwrap()
}

pub fn fast_runner_config() -> RunnerConfig {
    RunnerConfig {
        idle_ms: 20,
        empty_ms: 20,
        backoff_ms: 20,
    }
}

/// One record of every supported format.
pub fn mixed_batch() -> Vec<RawRecord> {
    vec![
        RawRecord::from(
            "Jan 10 12:00:01 web01 sshd[2211]: Failed password for invalid user admin from 203.0.113.9 port 5522 ssh2",
        ),
        RawRecord::from(
            "Nov 30 08:17:01 ip-172-31-27-153 CRON[22172]: pam_unix(cron:session): session closed for user root",
        ),
        RawRecord::from_json(json!({
            "EventID": 4625,
            "TimeCreated": "2025-01-20T10:20:00Z",
            "User": "bob",
            "IpAddress": "10.0.0.5",
            "ComputerName": "DC01",
            "Message": "An account failed to log on"
        })),
        RawRecord::from_json(json!({
            "eventTime": "2025-01-20T11:00:00Z",
            "eventSource": "s3.amazonaws.com",
            "eventName": "GetObject",
            "awsRegion": "us-east-1",
            "sourceIPAddress": "198.51.100.7",
            "userIdentity": {"userName": "carol"}
        })),
        RawRecord::from("DENY TCP src=192.168.1.20 dst=10.0.0.1 sport=44321 dport=22"),
    ]
}

pub fn sshd_lines(n: usize) -> Vec<RawRecord> {
    (0..n)
        .map(|i| {
            RawRecord::from(format!(
                "Jan 10 12:00:{:02} web01 sshd[{}]: Accepted publickey for user{} from 10.0.0.{} port 4000 ssh2",
                i % 60,
                1000 + i,
                i % 3,
                i % 5 + 1
            ))
        })
        .collect()
}

/// Input source that tests can keep feeding after handing it to a runner.
#[derive(Clone, Default)]
pub struct SharedSource {
    records: Arc<Mutex<VecDeque<RawRecord>>>,
}

impl SharedSource {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records.into())),
        }
    }

    pub fn push_all(&self, records: Vec<RawRecord>) {
        self.records.lock().unwrap().extend(records);
    }
}

#[async_trait]
impl InputSource for SharedSource {
    async fn read_batch(&mut self, max: usize) -> Result<Vec<RawRecord>, SourceError> {
        let mut records = self.records.lock().unwrap();
        let n = max.min(records.len());
        Ok(records.drain(..n).collect())
    }
}

/// Hashing embedder that takes its time, to keep a batch in flight.
/// Tracks how many batches it ever embedded at once.
pub struct SlowEmbedder {
    inner: HashingEmbedder,
    delay: Duration,
    pub calls: AtomicUsize,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl SlowEmbedder {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: HashingEmbedder::new(EMBED_DIMS),
            delay,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Embedder for SlowEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.inner.embed_batch(texts).await
    }

    fn dimensions(&self) -> usize {
        EMBED_DIMS
    }
}

/// Panics on its first batch, then behaves like the hashing embedder.
pub struct PanicOnceEmbedder {
    inner: HashingEmbedder,
    pub calls: AtomicUsize,
}

impl PanicOnceEmbedder {
    pub fn new() -> Self {
        Self {
            inner: HashingEmbedder::new(EMBED_DIMS),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Embedder for PanicOnceEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("embedding backend crashed");
        }
        self.inner.embed_batch(texts).await
    }

    fn dimensions(&self) -> usize {
        EMBED_DIMS
    }
}

/// Embedding backend that always fails.
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::Api("backend unavailable".into()))
    }

    fn dimensions(&self) -> usize {
        EMBED_DIMS
    }
}

/// Poll `cond` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
