//! Background runner: a STOPPED / RUNNING / PAUSED state machine driving
//! one worker loop that pulls batches and hands them to an [`Orchestrator`].
//!
//! The state lives in a single atomic so control calls never wait on the
//! worker. Stop is cooperative: the loop observes it at the top of an
//! iteration, so a batch already in flight always completes. Each batch runs
//! in its own task; a panic there counts as a failed batch and the loop
//! carries on with a freshly built orchestrator. At most one batch is in
//! flight: a loop started right after a stop first waits for the previous
//! loop to exit.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use driftlog_core::config::RunnerConfig;

use crate::activity_log::{ActivityLog, LogEntry};
use crate::error::Result;
use crate::metrics::{MetricsSnapshot, PipelineStatus, RunMetrics};
use crate::orchestrator::Orchestrator;
use crate::source::InputSource;

/// Builds a fresh orchestrator (and drift detector) for each run.
pub type OrchestratorFactory = Box<dyn Fn() -> Result<Orchestrator> + Send + Sync>;

struct Shared {
    status: AtomicU8,
    /// Bumped on every start from STOPPED; a loop from an older run exits.
    generation: AtomicU64,
    wake: Notify,
    metrics: Arc<RwLock<RunMetrics>>,
    log: Arc<ActivityLog>,
    source: tokio::sync::Mutex<Box<dyn InputSource>>,
    factory: OrchestratorFactory,
    config: RunnerConfig,
    batch_size: usize,
}

impl Shared {
    fn status(&self) -> PipelineStatus {
        PipelineStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    fn set_status(&self, status: PipelineStatus) {
        self.status.store(status as u8, Ordering::SeqCst);
    }

    /// A fresh orchestrator reporting into the shared metrics and log.
    fn build_orchestrator(&self) -> Result<Orchestrator> {
        let mut orchestrator = (self.factory)()?;
        orchestrator.attach(self.metrics.clone(), self.log.clone());
        Ok(orchestrator)
    }

    fn record_failure(&self, message: String) {
        self.log.error(message);
        if let Ok(mut m) = self.metrics.write() {
            m.record_failure();
        }
    }

    /// Sleep, waking early on any state change.
    async fn pause_for(&self, ms: u64) {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(ms)) => {}
            _ = self.wake.notified() => {}
        }
    }
}

pub struct Runner {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Runner {
    pub fn new(
        source: Box<dyn InputSource>,
        factory: OrchestratorFactory,
        config: RunnerConfig,
        batch_size: usize,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                status: AtomicU8::new(PipelineStatus::Stopped as u8),
                generation: AtomicU64::new(0),
                wake: Notify::new(),
                metrics: Arc::new(RwLock::new(RunMetrics::default())),
                log: Arc::new(ActivityLog::default()),
                source: tokio::sync::Mutex::new(source),
                factory,
                config,
                batch_size: batch_size.max(1),
            }),
            handle: Mutex::new(None),
        }
    }

    pub fn status(&self) -> PipelineStatus {
        self.shared.status()
    }

    /// STOPPED → RUNNING builds a new orchestrator and spawns the loop;
    /// PAUSED → RUNNING resumes; RUNNING is a no-op. If the orchestrator
    /// cannot be built the runner stays STOPPED and the error is returned.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<()> {
        match self.status() {
            PipelineStatus::Running => return Ok(()),
            PipelineStatus::Paused => {
                self.shared.set_status(PipelineStatus::Running);
                self.shared.wake.notify_waiters();
                self.shared.log.info("Pipeline resumed");
                info!("pipeline resumed");
                return Ok(());
            }
            PipelineStatus::Stopped => {}
        }

        let orchestrator = match self.shared.build_orchestrator() {
            Ok(o) => o,
            Err(e) => {
                error!(error = %e, "pipeline failed to start");
                self.shared.log.error(format!("Pipeline failed to start: {e}"));
                return Err(e);
            }
        };

        let mut slot = self.handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // A loop from a previous run may still be finishing its batch.
        let previous = slot.take().filter(|h| !h.is_finished());

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.set_status(PipelineStatus::Running);

        let run_id = Uuid::new_v4();
        let shared = self.shared.clone();
        *slot = Some(tokio::spawn(run_loop(shared, orchestrator, generation, run_id, previous)));
        drop(slot);

        self.shared.log.info("Pipeline runner started");
        info!(%run_id, batch_size = self.shared.batch_size, "pipeline started");
        Ok(())
    }

    /// RUNNING → PAUSED. The loop stays alive but idles.
    pub fn pause(&self) {
        let paused = self
            .shared
            .status
            .compare_exchange(
                PipelineStatus::Running as u8,
                PipelineStatus::Paused as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if paused {
            self.shared.log.info("Pipeline paused");
            info!("pipeline paused");
        }
    }

    /// Any state → STOPPED. Idle sleeps are interrupted; an in-flight batch
    /// finishes first.
    pub fn stop(&self) {
        let previous = PipelineStatus::from_u8(
            self.shared
                .status
                .swap(PipelineStatus::Stopped as u8, Ordering::SeqCst),
        );
        self.shared.wake.notify_waiters();
        if previous != PipelineStatus::Stopped {
            self.shared.log.info("Pipeline runner stopped");
            info!(from = %previous, "pipeline stopped");
        }
    }

    /// Wait for the current loop, if any, to exit.
    pub async fn wait_stopped(&self) {
        let handle = self.handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "pipeline loop panicked");
            }
        }
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        let status = self.status();
        self.shared
            .metrics
            .read()
            .map(|m| m.snapshot(status))
            .unwrap_or_else(|_| RunMetrics::default().snapshot(status))
    }

    pub fn logs(&self, after_id: Option<u64>) -> Vec<LogEntry> {
        self.shared.log.entries_after(after_id)
    }

    pub fn activity_log(&self) -> Arc<ActivityLog> {
        self.shared.log.clone()
    }
}

async fn run_loop(
    shared: Arc<Shared>,
    mut orchestrator: Orchestrator,
    generation: u64,
    run_id: Uuid,
    previous: Option<JoinHandle<()>>,
) {
    if let Some(previous) = previous {
        debug!(%run_id, "waiting for previous loop to exit");
        if let Err(e) = previous.await {
            error!(error = %e, "previous pipeline loop failed");
        }
    }

    shared.log.info("Pipeline loop entered");
    debug!(%run_id, "pipeline loop entered");

    loop {
        if shared.generation.load(Ordering::SeqCst) != generation {
            break;
        }
        match shared.status() {
            PipelineStatus::Stopped => break,
            PipelineStatus::Paused => {
                shared.pause_for(shared.config.idle_ms).await;
                continue;
            }
            PipelineStatus::Running => {}
        }

        let batch = {
            let mut source = shared.source.lock().await;
            source.read_batch(shared.batch_size).await
        };

        let records = match batch {
            Ok(records) if records.is_empty() => {
                debug!("input empty, waiting");
                shared.pause_for(shared.config.empty_ms).await;
                continue;
            }
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "input read failed");
                shared.log.error(format!("Input error: {e}"));
                shared.pause_for(shared.config.backoff_ms).await;
                continue;
            }
        };

        let task = tokio::spawn(async move {
            let result = orchestrator.process(records).await;
            (orchestrator, result)
        });

        match task.await {
            Ok((returned, result)) => {
                orchestrator = returned;
                if let Err(e) = result {
                    error!(error = %e, "batch failed");
                    shared.record_failure(format!("Pipeline error: {e}"));
                    shared.pause_for(shared.config.backoff_ms).await;
                }
            }
            Err(e) => {
                // The orchestrator went down with the batch task.
                error!(error = %e, panicked = e.is_panic(), "batch task failed");
                shared.record_failure(format!("Pipeline error: batch task failed: {e}"));
                orchestrator = match shared.build_orchestrator() {
                    Ok(o) => o,
                    Err(e) => {
                        error!(error = %e, "pipeline could not recover");
                        shared.log.error(format!("Pipeline stopped: {e}"));
                        if shared.generation.load(Ordering::SeqCst) == generation {
                            shared.set_status(PipelineStatus::Stopped);
                        }
                        break;
                    }
                };
                shared.pause_for(shared.config.backoff_ms).await;
            }
        }
    }

    shared.log.info("Pipeline loop exited");
    info!(%run_id, "pipeline loop exited");
}
