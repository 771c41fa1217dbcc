//! One batch through every stage: parse, normalize, enrich, embed,
//! featurize, score, store.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use tracing::{debug, info};

use driftlog_compute::{EnsembleScorer, FeaturePipeline};
use driftlog_core::{Config, FeatureRow, RawRecord, ScoredEvent};
use driftlog_ingest::embedding;
use driftlog_ingest::{EntityEnricher, MessageEmbedder, ParserRegistry, Preprocessor, RegistryConfig};

use crate::activity_log::ActivityLog;
use crate::error::Result;
use crate::metrics::RunMetrics;
use crate::sink::OutputSink;

pub struct Orchestrator {
    preprocessor: Preprocessor,
    enricher: EntityEnricher,
    embedder: MessageEmbedder,
    features: FeaturePipeline,
    scorer: EnsembleScorer,
    sink: Arc<dyn OutputSink>,
    anomaly_threshold: f64,
    metrics: Arc<RwLock<RunMetrics>>,
    log: Arc<ActivityLog>,
}

impl Orchestrator {
    pub const DEFAULT_ANOMALY_THRESHOLD: f64 = 0.8;

    pub fn new(
        registry: ParserRegistry,
        embedder: MessageEmbedder,
        scorer: EnsembleScorer,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            preprocessor: Preprocessor::new(registry),
            enricher: EntityEnricher::new(),
            embedder,
            features: FeaturePipeline::default(),
            scorer,
            sink,
            anomaly_threshold: Self::DEFAULT_ANOMALY_THRESHOLD,
            metrics: Arc::new(RwLock::new(RunMetrics::default())),
            log: Arc::new(ActivityLog::default()),
        }
    }

    /// Wire every stage from configuration. Fails if the parser config or
    /// any model artifact cannot be loaded.
    pub fn from_config(config: &Config, sink: Arc<dyn OutputSink>) -> Result<Self> {
        let registry_config = match &config.parsers.path {
            Some(path) => RegistryConfig::from_file(path)?,
            None => RegistryConfig::embedded()?,
        };
        let registry = ParserRegistry::new(registry_config)?;
        let embedder = MessageEmbedder::new(embedding::from_config(&config.embedding)?);
        let scorer = EnsembleScorer::load(&config.models, &config.scoring)?;

        Ok(Self::new(registry, embedder, scorer, sink)
            .with_threshold(config.scoring.anomaly_threshold))
    }

    pub fn with_features(mut self, features: FeaturePipeline) -> Self {
        self.features = features;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.anomaly_threshold = threshold;
        self
    }

    /// Report into externally owned counters and activity log.
    pub fn attach(&mut self, metrics: Arc<RwLock<RunMetrics>>, log: Arc<ActivityLog>) {
        self.metrics = metrics;
        self.log = log;
    }

    pub fn metrics(&self) -> RunMetrics {
        self.metrics.read().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn scorer(&self) -> &EnsembleScorer {
        &self.scorer
    }

    /// Process one raw batch end to end. An empty batch does nothing.
    pub async fn process(&mut self, batch: Vec<RawRecord>) -> Result<Vec<ScoredEvent>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let started = Instant::now();
        self.log.info(format!("Processing batch of {} logs", batch.len()));

        let events = self.preprocessor.run(&batch);
        let events = self.enricher.enrich_batch(events);

        let embeddings = {
            let messages: Vec<&str> = events.iter().map(|e| e.message.as_str()).collect();
            self.embedder.embed_messages(&messages).await?
        };
        debug!(rows = events.len(), dims = self.embedder.dimensions(), "batch embedded");

        let rows: Vec<FeatureRow> = events
            .into_iter()
            .zip(embeddings)
            .map(|(event, embedding)| FeatureRow::new(event, embedding))
            .collect();
        let rows = self.features.extract(rows);
        let scored = self.scorer.score(rows)?;

        let stored = self.sink.write(&scored).await?;
        let anomalies = scored
            .iter()
            .filter(|s| s.anomaly_score > self.anomaly_threshold)
            .count();
        let drifted = scored.iter().filter(|s| s.concept_drift).count();

        let elapsed = started.elapsed();
        if let Ok(mut m) = self.metrics.write() {
            m.record_batch(stored as u64, anomalies as u64, elapsed);
        }

        info!(
            records = batch.len(),
            stored,
            anomalies,
            drifted,
            elapsed_ms = elapsed.as_millis() as u64,
            "batch completed"
        );
        self.log.info(format!("Batch completed: {stored} events written"));
        if drifted > 0 {
            self.log.warn(format!("Concept drift detected on {drifted} events"));
        }

        Ok(scored)
    }
}
