//! Batch pipeline wiring: input sources, output sinks, the per-batch
//! orchestrator and the background runner with its control surface.

pub mod activity_log;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod runner;
pub mod sink;
pub mod source;

pub use activity_log::{ActivityLog, LogEntry, LogLevel};
pub use error::{PipelineError, Result, SinkError, SourceError};
pub use metrics::{MetricsSnapshot, PipelineStatus, RunMetrics};
pub use orchestrator::Orchestrator;
pub use runner::{OrchestratorFactory, Runner};
pub use sink::{sanitize_record, JsonlSink, MemorySink, OutputSink};
pub use source::{FileSource, InputSource, MemorySource};
