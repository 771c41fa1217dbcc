use std::path::Path;

use super::error::{Result, ScoringError};
use super::iforest::IsolationForest;
use super::lstm::LstmAutoencoder;

/// A pretrained anomaly model. Higher scores are more anomalous.
///
/// Training happens offline; implementations only load, score and save.
pub trait AnomalyModel: Send + Sync {
    fn name(&self) -> &str;

    /// Width of the rows the model accepts.
    fn input_dim(&self) -> usize;

    /// One score per row, in row order.
    fn score(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>>;

    fn save(&self, path: &Path) -> Result<()>;
}

type Loader = fn(&Path) -> Result<Box<dyn AnomalyModel>>;

fn load_iforest(path: &Path) -> Result<Box<dyn AnomalyModel>> {
    Ok(Box::new(IsolationForest::load(path)?))
}

fn load_lstm(path: &Path) -> Result<Box<dyn AnomalyModel>> {
    Ok(Box::new(LstmAutoencoder::load(path)?))
}

/// Model name → loader.
const LOADERS: &[(&str, Loader)] = &[
    (IsolationForest::NAME, load_iforest),
    (LstmAutoencoder::NAME, load_lstm),
];

pub fn model_names() -> Vec<&'static str> {
    LOADERS.iter().map(|(name, _)| *name).collect()
}

/// Load a model artifact by model name.
pub fn load_model(name: &str, path: &Path) -> Result<Box<dyn AnomalyModel>> {
    let (_, loader) = LOADERS
        .iter()
        .find(|(n, _)| *n == name)
        .ok_or_else(|| ScoringError::UnknownModel(name.to_string()))?;
    loader(path)
}
