//! pipeline-worker: tails a log file, scores every batch and appends the
//! results to a JSONL file.
//!
//! Configuration comes from the environment (`.env` supported); command-line
//! flags override it. Runs until Ctrl-C, or with `--once` until the input
//! has been drained.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use driftlog_core::config::{load_dotenv, Config};
use driftlog_pipeline::{FileSource, InputSource, JsonlSink, Orchestrator, OutputSink, Runner};

// ── CLI ─────────────────────────────────────────────────────────────

/// Security log anomaly scoring worker.
#[derive(Parser, Debug)]
#[command(name = "pipeline-worker", version, about)]
struct Cli {
    /// Configuration profile ({PROFILE}_{KEY} env vars take precedence).
    #[arg(long, env = "DRIFTLOG_PROFILE")]
    profile: Option<String>,

    /// Log file to read.
    #[arg(long)]
    input: Option<PathBuf>,

    /// JSONL file scored events are appended to.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Directory holding scaler.json, iforest.json and lstm_ae.json.
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Parser registry YAML (defaults to the embedded configuration).
    #[arg(long)]
    parser_config: Option<PathBuf>,

    /// Records per batch.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Process until the input is drained, then exit.
    #[arg(long)]
    once: bool,
}

impl Cli {
    fn into_config(self) -> (Config, bool) {
        let mut config = match &self.profile {
            Some(p) => Config::for_profile(p),
            None => Config::from_env(),
        };
        if let Some(path) = self.input {
            config.input.path = path;
        }
        if let Some(path) = self.output {
            config.output.path = path;
        }
        if let Some(dir) = self.model_dir {
            config.models.dir = dir;
        }
        if let Some(path) = self.parser_config {
            config.parsers.path = Some(path);
        }
        if let Some(n) = self.batch_size {
            config.input.batch_size = n;
        }
        (config, self.once)
    }
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let (config, once) = Cli::parse().into_config();
    config.log_summary();

    let mut source = FileSource::open(&config.input.path)?;
    let sink: Arc<dyn OutputSink> = Arc::new(JsonlSink::new(&config.output.path));

    if once {
        let mut orchestrator = Orchestrator::from_config(&config, sink)?;
        loop {
            let batch = source.read_batch(config.input.batch_size).await?;
            if batch.is_empty() {
                break;
            }
            orchestrator.process(batch).await?;
        }
        let m = orchestrator.metrics();
        info!(
            events = m.events_processed,
            anomalies = m.anomalies,
            drift_detections = orchestrator.scorer().drift().detections(),
            "input drained"
        );
        return Ok(());
    }

    let factory_config = config.clone();
    let runner = Runner::new(
        Box::new(source),
        Box::new(move || Orchestrator::from_config(&factory_config, sink.clone())),
        config.runner.clone(),
        config.input.batch_size,
    );
    runner.start()?;
    info!("pipeline-worker running, press Ctrl-C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
    }

    runner.stop();
    runner.wait_stopped().await;

    let metrics = runner.get_metrics();
    info!(
        events = metrics.events_processed,
        anomalies = metrics.anomalies,
        "pipeline-worker exited cleanly"
    );
    Ok(())
}
