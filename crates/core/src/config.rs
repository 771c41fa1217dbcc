use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str, default: T) -> T {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub input: InputConfig,
    pub output: OutputConfig,
    pub models: ModelConfig,
    pub parsers: ParserConfigSource,
    pub embedding: EmbeddingConfig,
    pub scoring: ScoringConfig,
    pub runner: RunnerConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `DRIFTLOG_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("DRIFTLOG_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            input: InputConfig::from_env_profiled(p),
            output: OutputConfig::from_env_profiled(p),
            models: ModelConfig::from_env_profiled(p),
            parsers: ParserConfigSource::from_env_profiled(p),
            embedding: EmbeddingConfig::from_env_profiled(p),
            scoring: ScoringConfig::from_env_profiled(p),
            runner: RunnerConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  input:      path={}, batch_size={}", self.input.path.display(), self.input.batch_size);
        tracing::info!("  output:     path={}", self.output.path.display());
        tracing::info!("  models:     dir={}", self.models.dir.display());
        tracing::info!(
            "  parsers:    config={}",
            self.parsers.path.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "(embedded)".into())
        );
        tracing::info!("  embedding:  provider={}, dims={}", self.embedding.provider, self.embedding.dimensions);
        tracing::info!(
            "  scoring:    threshold={}, drift(delta={}, lambda={}, alpha={})",
            self.scoring.anomaly_threshold, self.scoring.drift_delta, self.scoring.drift_lambda, self.scoring.drift_alpha
        );
        tracing::info!(
            "  runner:     idle={}ms, empty={}ms, backoff={}ms",
            self.runner.idle_ms, self.runner.empty_ms, self.runner.backoff_ms
        );
    }
}

// ── Input / output ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub path: PathBuf,
    pub batch_size: usize,
}

impl InputConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            path: PathBuf::from(profiled_env_or(p, "INPUT_PATH", "data/input.log")),
            batch_size: profiled_env_parse(p, "INPUT_BATCH_SIZE", 50),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub path: PathBuf,
}

impl OutputConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            path: PathBuf::from(profiled_env_or(p, "OUTPUT_PATH", "data/scored.jsonl")),
        }
    }
}

// ── Models ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub dir: PathBuf,
}

impl ModelConfig {
    pub const SCALER_FILE: &'static str = "scaler.json";
    pub const IFOREST_FILE: &'static str = "iforest.json";
    pub const LSTM_FILE: &'static str = "lstm_ae.json";

    fn from_env_profiled(p: &str) -> Self {
        Self {
            dir: PathBuf::from(profiled_env_or(p, "MODEL_DIR", "models")),
        }
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.dir.join(Self::SCALER_FILE)
    }

    pub fn iforest_path(&self) -> PathBuf {
        self.dir.join(Self::IFOREST_FILE)
    }

    pub fn lstm_path(&self) -> PathBuf {
        self.dir.join(Self::LSTM_FILE)
    }
}

// ── Parsers ───────────────────────────────────────────────────

/// Where the parser registry configuration comes from. `None` = embedded default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParserConfigSource {
    pub path: Option<PathBuf>,
}

impl ParserConfigSource {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            path: profiled_env_opt(p, "PARSER_CONFIG").map(PathBuf::from),
        }
    }
}

// ── Embedding ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "hashing" (local, deterministic) or "ollama".
    pub provider: String,
    pub ollama_url: String,
    pub model: String,
    pub dimensions: usize,
}

impl EmbeddingConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            provider: profiled_env_or(p, "EMBEDDING_PROVIDER", "hashing"),
            ollama_url: profiled_env_or(p, "OLLAMA_URL", "http://localhost:11434"),
            model: profiled_env_or(p, "EMBEDDING_MODEL", "all-minilm"),
            dimensions: profiled_env_parse(p, "EMBEDDING_DIMENSIONS", 384),
        }
    }
}

// ── Scoring ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Events with `anomaly_score` above this count as anomalies in run metrics.
    pub anomaly_threshold: f64,
    pub iforest_weight: f64,
    pub lstm_weight: f64,
    pub drift_delta: f64,
    pub drift_lambda: f64,
    pub drift_alpha: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            anomaly_threshold: 0.8,
            iforest_weight: 0.5,
            lstm_weight: 0.5,
            drift_delta: 0.005,
            drift_lambda: 50.0,
            drift_alpha: 0.999,
        }
    }
}

impl ScoringConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            anomaly_threshold: profiled_env_parse(p, "ANOMALY_THRESHOLD", d.anomaly_threshold),
            iforest_weight: profiled_env_parse(p, "IFOREST_WEIGHT", d.iforest_weight),
            lstm_weight: profiled_env_parse(p, "LSTM_WEIGHT", d.lstm_weight),
            drift_delta: profiled_env_parse(p, "DRIFT_DELTA", d.drift_delta),
            drift_lambda: profiled_env_parse(p, "DRIFT_LAMBDA", d.drift_lambda),
            drift_alpha: profiled_env_parse(p, "DRIFT_ALPHA", d.drift_alpha),
        }
    }
}

// ── Runner ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Re-check interval while paused.
    pub idle_ms: u64,
    /// Wait after the source returned nothing.
    pub empty_ms: u64,
    /// Wait after a failed batch.
    pub backoff_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            idle_ms: 1000,
            empty_ms: 2000,
            backoff_ms: 2000,
        }
    }
}

impl RunnerConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            idle_ms: profiled_env_parse(p, "RUNNER_IDLE_MS", d.idle_ms),
            empty_ms: profiled_env_parse(p, "RUNNER_EMPTY_MS", d.empty_ms),
            backoff_ms: profiled_env_parse(p, "RUNNER_BACKOFF_MS", d.backoff_ms),
        }
    }
}
