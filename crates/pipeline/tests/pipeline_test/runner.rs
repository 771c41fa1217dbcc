use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use driftlog_core::config::{ModelConfig, RunnerConfig};
use driftlog_ingest::HashingEmbedder;
use driftlog_pipeline::{LogLevel, MemorySink, MemorySource, PipelineStatus, Runner};

use crate::helpers::*;

fn hashing_runner(
    models: ModelConfig,
    sink: &MemorySink,
    source: SharedSource,
    config: RunnerConfig,
    batch_size: usize,
) -> Runner {
    let sink = sink.clone();
    Runner::new(
        Box::new(source),
        Box::new(move || {
            make_orchestrator_with(
                &models,
                Arc::new(HashingEmbedder::new(EMBED_DIMS)),
                Arc::new(sink.clone()),
            )
        }),
        config,
        batch_size,
    )
}

#[tokio::test]
async fn drains_source_then_stops() {
    let dir = tempfile::tempdir().unwrap();
    let models = write_artifacts(dir.path());
    let sink = MemorySink::new();
    let runner = hashing_runner(models, &sink, SharedSource::new(sshd_lines(10)), fast_runner_config(), 4);

    assert_eq!(runner.status(), PipelineStatus::Stopped);
    runner.start().unwrap();
    assert_eq!(runner.status(), PipelineStatus::Running);

    assert!(wait_until(Duration::from_secs(5), || runner.get_metrics().events_processed == 10).await);
    assert_eq!(sink.len(), 10);

    runner.stop();
    tokio::time::timeout(Duration::from_secs(2), runner.wait_stopped())
        .await
        .expect("loop should exit after stop");

    let snapshot = runner.get_metrics();
    assert_eq!(snapshot.status, PipelineStatus::Stopped);
    assert_eq!(snapshot.events_processed, 10);

    let messages: Vec<String> = runner.logs(None).into_iter().map(|e| e.message).collect();
    assert!(messages.iter().any(|m| m == "Pipeline runner started"));
    assert!(messages.iter().any(|m| m == "Pipeline loop exited"));
}

#[tokio::test]
async fn start_is_idempotent_while_running() {
    let dir = tempfile::tempdir().unwrap();
    let models = write_artifacts(dir.path());
    let sink = MemorySink::new();
    let runner = hashing_runner(models, &sink, SharedSource::default(), fast_runner_config(), 4);

    runner.start().unwrap();
    runner.start().unwrap();
    let started = runner
        .logs(None)
        .iter()
        .filter(|e| e.message == "Pipeline runner started")
        .count();
    assert_eq!(started, 1);

    runner.stop();
    runner.wait_stopped().await;
}

#[tokio::test]
async fn stop_lets_the_in_flight_batch_finish() {
    let dir = tempfile::tempdir().unwrap();
    let models = write_artifacts(dir.path());
    let sink = MemorySink::new();
    let embedder = Arc::new(SlowEmbedder::new(Duration::from_millis(300)));

    let factory_sink = sink.clone();
    let factory_embedder = embedder.clone();
    let runner = Runner::new(
        Box::new(MemorySource::new(sshd_lines(3))),
        Box::new(move || {
            make_orchestrator_with(&models, factory_embedder.clone(), Arc::new(factory_sink.clone()))
        }),
        fast_runner_config(),
        10,
    );

    runner.start().unwrap();
    assert!(wait_until(Duration::from_secs(2), || embedder.calls.load(Ordering::SeqCst) == 1).await);
    runner.stop();
    assert_eq!(runner.status(), PipelineStatus::Stopped);

    tokio::time::timeout(Duration::from_secs(3), runner.wait_stopped())
        .await
        .expect("loop should exit once the batch completes");

    assert_eq!(sink.len(), 3);
    assert_eq!(runner.get_metrics().events_processed, 3);
}

#[tokio::test]
async fn stop_interrupts_a_long_idle_wait() {
    let dir = tempfile::tempdir().unwrap();
    let models = write_artifacts(dir.path());
    let sink = MemorySink::new();
    let slow_idle = RunnerConfig {
        idle_ms: 60_000,
        empty_ms: 60_000,
        backoff_ms: 60_000,
    };
    let runner = hashing_runner(models, &sink, SharedSource::default(), slow_idle, 4);

    runner.start().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    runner.stop();

    tokio::time::timeout(Duration::from_secs(1), runner.wait_stopped())
        .await
        .expect("stop should wake the idle loop");
}

#[tokio::test]
async fn pause_holds_input_until_resumed() {
    let dir = tempfile::tempdir().unwrap();
    let models = write_artifacts(dir.path());
    let sink = MemorySink::new();
    let source = SharedSource::default();
    let runner = hashing_runner(models, &sink, source.clone(), fast_runner_config(), 8);

    // Pausing a stopped runner does nothing.
    runner.pause();
    assert_eq!(runner.status(), PipelineStatus::Stopped);

    runner.start().unwrap();
    runner.pause();
    assert_eq!(runner.status(), PipelineStatus::Paused);

    source.push_all(sshd_lines(5));
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(runner.get_metrics().events_processed, 0);
    assert_eq!(runner.get_metrics().status, PipelineStatus::Paused);

    runner.start().unwrap();
    assert_eq!(runner.status(), PipelineStatus::Running);
    assert!(wait_until(Duration::from_secs(5), || sink.len() == 5).await);

    runner.stop();
    runner.wait_stopped().await;
}

#[tokio::test]
async fn start_fails_without_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let models = ModelConfig {
        dir: dir.path().join("missing"),
    };
    let sink = MemorySink::new();
    let runner = hashing_runner(models, &sink, SharedSource::new(sshd_lines(2)), fast_runner_config(), 4);

    assert!(runner.start().is_err());
    assert_eq!(runner.status(), PipelineStatus::Stopped);
    runner.wait_stopped().await;

    let errors: Vec<_> = runner
        .logs(None)
        .into_iter()
        .filter(|e| e.level == LogLevel::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.starts_with("Pipeline failed to start"));
}

#[tokio::test]
async fn failing_batches_back_off_and_keep_running() {
    let dir = tempfile::tempdir().unwrap();
    let models = write_artifacts(dir.path());
    let sink = MemorySink::new();

    let factory_sink = sink.clone();
    let runner = Runner::new(
        Box::new(MemorySource::new(sshd_lines(6))),
        Box::new(move || {
            make_orchestrator_with(&models, Arc::new(FailingEmbedder), Arc::new(factory_sink.clone()))
        }),
        fast_runner_config(),
        2,
    );

    runner.start().unwrap();
    assert!(
        wait_until(Duration::from_secs(5), || {
            runner
                .logs(None)
                .iter()
                .filter(|e| e.message.starts_with("Pipeline error"))
                .count()
                >= 2
        })
        .await
    );
    assert_eq!(runner.status(), PipelineStatus::Running);
    assert!(sink.is_empty());

    runner.stop();
    runner.wait_stopped().await;
}

#[tokio::test]
async fn logs_after_id_returns_only_newer_entries() {
    let dir = tempfile::tempdir().unwrap();
    let models = write_artifacts(dir.path());
    let sink = MemorySink::new();
    let runner = hashing_runner(models, &sink, SharedSource::default(), fast_runner_config(), 4);

    runner.start().unwrap();
    let seen = runner.logs(None);
    let last = seen.last().map(|e| e.id).unwrap();

    runner.stop();
    runner.wait_stopped().await;

    let newer = runner.logs(Some(last));
    assert!(!newer.is_empty());
    assert!(newer.iter().all(|e| e.id > last));
    assert!(newer.iter().any(|e| e.message == "Pipeline runner stopped"));
}

#[tokio::test]
async fn restart_during_a_batch_never_overlaps_batches() {
    let dir = tempfile::tempdir().unwrap();
    let models = write_artifacts(dir.path());
    let sink = MemorySink::new();
    let embedder = Arc::new(SlowEmbedder::new(Duration::from_millis(200)));

    let factory_sink = sink.clone();
    let factory_embedder = embedder.clone();
    let runner = Runner::new(
        Box::new(SharedSource::new(sshd_lines(6))),
        Box::new(move || {
            make_orchestrator_with(&models, factory_embedder.clone(), Arc::new(factory_sink.clone()))
        }),
        fast_runner_config(),
        2,
    );

    runner.start().unwrap();
    assert!(wait_until(Duration::from_secs(2), || embedder.calls.load(Ordering::SeqCst) == 1).await);
    runner.stop();
    runner.start().unwrap();
    assert_eq!(runner.status(), PipelineStatus::Running);

    assert!(wait_until(Duration::from_secs(5), || sink.len() == 6).await);
    assert_eq!(embedder.max_active.load(Ordering::SeqCst), 1);
    assert_eq!(runner.get_metrics().events_processed, 6);

    runner.stop();
    tokio::time::timeout(Duration::from_secs(2), runner.wait_stopped())
        .await
        .expect("both loops should have exited");
}

#[tokio::test]
async fn panicking_batch_counts_as_failure_and_loop_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let models = write_artifacts(dir.path());
    let sink = MemorySink::new();
    let source = SharedSource::new(sshd_lines(4));
    let embedder = Arc::new(PanicOnceEmbedder::new());

    let factory_sink = sink.clone();
    let factory_embedder = embedder.clone();
    let runner = Runner::new(
        Box::new(source.clone()),
        Box::new(move || {
            make_orchestrator_with(&models, factory_embedder.clone(), Arc::new(factory_sink.clone()))
        }),
        fast_runner_config(),
        2,
    );

    runner.start().unwrap();
    // The first batch is lost with the panic; the second is stored.
    assert!(wait_until(Duration::from_secs(5), || sink.len() == 2).await);
    assert_eq!(runner.status(), PipelineStatus::Running);
    assert!(runner
        .logs(None)
        .iter()
        .any(|e| e.level == LogLevel::Error && e.message.starts_with("Pipeline error: batch task failed")));

    runner.stop();
    tokio::time::timeout(Duration::from_secs(2), runner.wait_stopped())
        .await
        .expect("loop should exit after stop");

    source.push_all(sshd_lines(3));
    runner.start().unwrap();
    assert!(wait_until(Duration::from_secs(5), || sink.len() == 5).await);
    assert_eq!(runner.get_metrics().events_processed, 5);

    runner.stop();
    runner.wait_stopped().await;
}
