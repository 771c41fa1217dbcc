use std::sync::Arc;

use serde_json::{json, Value};

use driftlog_compute::features::FeaturePipeline;
use driftlog_compute::{ScoringError, Transform};
use driftlog_core::config::{Config, ModelConfig};
use driftlog_core::{FeatureRow, RawRecord};
use driftlog_pipeline::{MemorySink, Orchestrator, PipelineError};

use crate::helpers::*;

fn in_unit_range(v: f64) -> bool {
    v.is_finite() && (0.0..=1.0).contains(&v)
}

#[tokio::test]
async fn mixed_batch_is_scored_and_stored() {
    let dir = tempfile::tempdir().unwrap();
    let models = write_artifacts(dir.path());
    let sink = MemorySink::new();
    let mut orchestrator = make_orchestrator(&models, &sink);

    let batch = mixed_batch();
    let n = batch.len();
    let scored = orchestrator.process(batch).await.unwrap();

    assert_eq!(scored.len(), n);
    for s in &scored {
        assert!(in_unit_range(s.anomaly_score), "anomaly_score {}", s.anomaly_score);
        assert!(in_unit_range(s.iforest_score));
        assert!(s.lstm_score.is_finite() && s.lstm_score >= 0.0);
    }

    let records = sink.records();
    assert_eq!(records.len(), n);
    for rec in &records {
        assert!(!rec.contains_key("host_id"));
        assert!(rec.contains_key("user_name"));
        assert!(rec["raw"].is_object());
        assert!(rec["concept_drift"].is_boolean());
    }
    assert_eq!(records[0]["failed_attempt"], json!(true));
    assert_eq!(records[0]["user_name"], json!("admin"));

    let metrics = orchestrator.metrics();
    assert_eq!(metrics.events_processed, n as u64);
    assert_eq!(metrics.batches, 1);
}

#[tokio::test]
async fn empty_batch_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let models = write_artifacts(dir.path());
    let sink = MemorySink::new();
    let mut orchestrator = make_orchestrator(&models, &sink);

    assert!(orchestrator.process(Vec::new()).await.unwrap().is_empty());
    assert!(sink.is_empty());
    assert_eq!(orchestrator.metrics().batches, 0);
    assert_eq!(orchestrator.scorer().drift().detections(), 0);
}

#[tokio::test]
async fn single_record_batch_scores_in_range() {
    let dir = tempfile::tempdir().unwrap();
    let models = write_artifacts(dir.path());
    let sink = MemorySink::new();
    let mut orchestrator = make_orchestrator(&models, &sink);

    let scored = orchestrator
        .process(vec![RawRecord::from("completely unstructured text")])
        .await
        .unwrap();
    assert_eq!(scored.len(), 1);
    assert!(in_unit_range(scored[0].anomaly_score));
    assert_eq!(sink.len(), 1);
}

#[tokio::test]
async fn records_missing_most_fields_still_score() {
    let dir = tempfile::tempdir().unwrap();
    let models = write_artifacts(dir.path());
    let sink = MemorySink::new();
    let mut orchestrator = make_orchestrator(&models, &sink);

    let batch = vec![
        RawRecord::from_json(json!({"foo": "bar"})),
        RawRecord::from_json(json!({"EventID": 4624})),
        RawRecord::from(""),
    ];
    let scored = orchestrator.process(batch).await.unwrap();
    assert_eq!(scored.len(), 3);
    assert!(scored.iter().all(|s| in_unit_range(s.anomaly_score)));

    for rec in sink.records() {
        assert_eq!(rec["has_src_ip"], json!(false));
        assert_eq!(rec["src_port"], Value::Null);
    }
}

/// Writes a column that must never be persisted.
struct HostIdStamp;

impl Transform for HostIdStamp {
    fn name(&self) -> &str {
        "host_id_stamp"
    }

    fn apply(&self, rows: &mut [FeatureRow]) {
        for (i, row) in rows.iter_mut().enumerate() {
            row.set("host_id", i as i64);
        }
    }
}

#[tokio::test]
async fn host_id_never_reaches_the_sink() {
    let dir = tempfile::tempdir().unwrap();
    let models = write_artifacts(dir.path());
    let sink = MemorySink::new();
    let mut orchestrator = make_orchestrator(&models, &sink).with_features(FeaturePipeline::new(vec![
        Box::new(HostIdStamp),
    ]));

    orchestrator.process(mixed_batch()).await.unwrap();
    assert_eq!(sink.len(), mixed_batch().len());
    assert!(sink.records().iter().all(|r| !r.contains_key("host_id")));
}

#[tokio::test]
async fn anomaly_counter_respects_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let models = write_artifacts(dir.path());
    let sink = MemorySink::new();
    let mut orchestrator = make_orchestrator(&models, &sink).with_threshold(-1.0);

    orchestrator.process(sshd_lines(6)).await.unwrap();
    assert_eq!(orchestrator.metrics().anomalies, 6);
}

#[tokio::test]
async fn drift_state_carries_across_batches() {
    let dir = tempfile::tempdir().unwrap();
    let models = write_artifacts(dir.path());
    let sink = MemorySink::new();
    let mut orchestrator = make_orchestrator(&models, &sink);

    orchestrator.process(sshd_lines(5)).await.unwrap();
    let after_first = orchestrator.scorer().drift().mean();
    orchestrator.process(mixed_batch()).await.unwrap();
    assert_eq!(sink.len(), 10);
    assert!(orchestrator.scorer().drift().mean().is_finite());
    assert!(after_first.is_finite());
}

#[test]
fn from_config_fails_on_missing_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::for_profile("ORCHESTRATOR_TEST");
    config.models = ModelConfig {
        dir: dir.path().join("absent"),
    };
    config.embedding.provider = "hashing".into();

    let err = Orchestrator::from_config(&config, Arc::new(MemorySink::new())).err().unwrap();
    assert!(matches!(
        err,
        PipelineError::Scoring(ScoringError::MissingArtifact(_))
    ));
}
