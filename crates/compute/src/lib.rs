pub mod drift;
pub mod features;
pub mod scoring;

pub use drift::PageHinkley;
pub use features::{FeaturePipeline, Transform, NUMERIC_FEATURES};
pub use scoring::{AnomalyModel, EnsembleScorer, ScoringError};
