//! Ensemble anomaly scoring.
//!
//! Per batch: assemble the feature matrix, apply the persisted scaler, score
//! with the isolation forest and the LSTM autoencoder, min-max normalize each
//! score array within the batch, blend, then feed the blended scores in row
//! order through the run-long drift detector.

pub mod artifact;
pub mod error;
pub mod iforest;
pub mod lstm;
pub mod model;
pub mod scaler;

use rayon::prelude::*;
use tracing::{debug, info};

use driftlog_core::config::{ModelConfig, ScoringConfig};
use driftlog_core::{FeatureRow, ScoredEvent};

use crate::drift::PageHinkley;
use crate::features::NUMERIC_FEATURES;

pub use error::{Result, ScoringError};
pub use iforest::{IsolationForest, IsolationTree, Node};
pub use lstm::{Linear, LstmAutoencoder, LstmLayer};
pub use model::{load_model, model_names, AnomalyModel};
pub use scaler::StandardScaler;

/// Guards min-max normalization against a zero range.
pub const NORM_EPSILON: f64 = 1e-8;

// ── Matrix assembly ─────────────────────────────────────────────────

/// Structured features (absent or non-finite → 0) followed by the embedding.
pub fn feature_vector(row: &FeatureRow) -> Vec<f64> {
    let mut out = Vec::with_capacity(NUMERIC_FEATURES.len() + row.embedding.len());
    out.extend(NUMERIC_FEATURES.iter().map(|name| {
        row.column(name)
            .and_then(|v| v.as_f64())
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }));
    out.extend(row.embedding.iter().map(|v| *v as f64));
    out
}

pub fn feature_matrix(rows: &[FeatureRow]) -> Vec<Vec<f64>> {
    rows.par_iter().map(feature_vector).collect()
}

/// `(x - min) / (max - min + ε)` over the batch.
pub fn min_max_normalize(scores: &[f64]) -> Vec<f64> {
    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    scores
        .iter()
        .map(|s| (s - min) / (max - min + NORM_EPSILON))
        .collect()
}

/// One score per input row, or an error naming the model.
fn score_checked(model: &dyn AnomalyModel, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
    let scores = model.score(rows)?;
    if scores.len() != rows.len() {
        return Err(ScoringError::ScoreCount {
            model: model.name().to_string(),
            expected: rows.len(),
            actual: scores.len(),
        });
    }
    Ok(scores)
}

// ── Scorer ──────────────────────────────────────────────────────────

pub struct EnsembleScorer {
    scaler: StandardScaler,
    iforest: Box<dyn AnomalyModel>,
    lstm: Box<dyn AnomalyModel>,
    iforest_weight: f64,
    lstm_weight: f64,
    drift: PageHinkley,
}

impl EnsembleScorer {
    /// All three artifacts must agree on the input width. Weights are
    /// rescaled to sum to one.
    pub fn new(
        scaler: StandardScaler,
        iforest: Box<dyn AnomalyModel>,
        lstm: Box<dyn AnomalyModel>,
        config: &ScoringConfig,
    ) -> Result<Self> {
        for model in [&iforest, &lstm] {
            if model.input_dim() != scaler.dims() {
                return Err(ScoringError::Dimension {
                    model: model.name().to_string(),
                    expected: scaler.dims(),
                    actual: model.input_dim(),
                });
            }
        }

        let total = config.iforest_weight + config.lstm_weight;
        let (iforest_weight, lstm_weight) = if total > 0.0 {
            (config.iforest_weight / total, config.lstm_weight / total)
        } else {
            (0.5, 0.5)
        };

        Ok(Self {
            scaler,
            iforest,
            lstm,
            iforest_weight,
            lstm_weight,
            drift: PageHinkley::new(config.drift_delta, config.drift_lambda, config.drift_alpha),
        })
    }

    /// Load the scaler and both models from the model directory. Any
    /// missing artifact fails construction.
    pub fn load(models: &ModelConfig, config: &ScoringConfig) -> Result<Self> {
        let scaler = StandardScaler::load(&models.scaler_path())?;
        let iforest = load_model(IsolationForest::NAME, &models.iforest_path())?;
        let lstm = load_model(LstmAutoencoder::NAME, &models.lstm_path())?;
        info!(
            dir = %models.dir.display(),
            dims = scaler.dims(),
            "scoring artifacts loaded"
        );
        Self::new(scaler, iforest, lstm, config)
    }

    /// Input width the artifacts were trained on.
    pub fn input_dim(&self) -> usize {
        self.scaler.dims()
    }

    pub fn drift(&self) -> &PageHinkley {
        &self.drift
    }

    pub fn score(&mut self, rows: Vec<FeatureRow>) -> Result<Vec<ScoredEvent>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let matrix = feature_matrix(&rows);
        let scaled = matrix
            .par_iter()
            .map(|r| self.scaler.transform_row(r))
            .collect::<Result<Vec<_>>>()?;

        let iforest_scores = score_checked(self.iforest.as_ref(), &scaled)?;
        let lstm_scores = score_checked(self.lstm.as_ref(), &scaled)?;
        let iforest_norm = min_max_normalize(&iforest_scores);
        let lstm_norm = min_max_normalize(&lstm_scores);

        let mut drifted = 0usize;
        let scored: Vec<ScoredEvent> = rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                let anomaly_score =
                    self.iforest_weight * iforest_norm[i] + self.lstm_weight * lstm_norm[i];
                let concept_drift = self.drift.update(anomaly_score);
                drifted += concept_drift as usize;
                ScoredEvent {
                    row,
                    iforest_score: iforest_scores[i],
                    lstm_score: lstm_scores[i],
                    anomaly_score,
                    concept_drift,
                }
            })
            .collect();

        debug!(rows = scored.len(), drifted, "batch scored");
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftlog_core::{CanonicalEvent, FieldValue};

    fn make_row(failed: bool, embedding: Vec<f32>) -> FeatureRow {
        let mut row = FeatureRow::new(CanonicalEvent::default(), embedding);
        row.set("failed_attempt", failed);
        row.set("user_failed_ratio", f64::NAN);
        row
    }

    /// Forest that isolates rows with a failed attempt at depth one.
    fn make_scorer(dims: usize) -> EnsembleScorer {
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
                Node::Leaf { size: 200 },
                Node::Leaf { size: 1 },
            ],
        };
        EnsembleScorer::new(
            StandardScaler::identity(dims),
            Box::new(IsolationForest::new(dims, 256, vec![tree])),
            Box::new(LstmAutoencoder::zeros(dims, 2, 1)),
            &ScoringConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn matrix_fills_missing_and_nan_with_zero() {
        let row = make_row(true, vec![0.5, -1.0]);
        let v = feature_vector(&row);
        assert_eq!(v.len(), NUMERIC_FEATURES.len() + 2);
        let failed_idx = NUMERIC_FEATURES.iter().position(|n| *n == "failed_attempt").unwrap();
        let ratio_idx = NUMERIC_FEATURES.iter().position(|n| *n == "user_failed_ratio").unwrap();
        assert_eq!(v[failed_idx], 1.0);
        assert_eq!(v[ratio_idx], 0.0);
        assert_eq!(v[0], 0.0);
        assert_eq!(&v[NUMERIC_FEATURES.len()..], &[0.5, -1.0]);
    }

    #[test]
    fn normalization_is_epsilon_guarded() {
        assert_eq!(min_max_normalize(&[3.0]), vec![0.0]);
        assert_eq!(min_max_normalize(&[2.0, 2.0]), vec![0.0, 0.0]);
        let n = min_max_normalize(&[0.0, 5.0, 10.0]);
        assert!(n[2] < 1.0 && n[2] > 0.999_999);
        assert!((n[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn empty_batch_short_circuits() {
        let mut scorer = make_scorer(NUMERIC_FEATURES.len());
        assert!(scorer.score(Vec::new()).unwrap().is_empty());
        assert_eq!(scorer.drift().cumulative_sum(), 0.0);
    }

    #[test]
    fn scores_are_bounded_and_ordered() {
        let dims = NUMERIC_FEATURES.len() + 2;
        let mut scorer = make_scorer(dims);
        let rows = vec![
            make_row(false, vec![0.0, 0.0]),
            make_row(true, vec![0.0, 0.0]),
            make_row(false, vec![0.1, 0.0]),
        ];
        let scored = scorer.score(rows).unwrap();
        assert_eq!(scored.len(), 3);
        for s in &scored {
            assert!((0.0..=1.0).contains(&s.anomaly_score), "{}", s.anomaly_score);
            assert!(!s.concept_drift);
        }
        assert!(scored[1].iforest_score > scored[0].iforest_score);
        assert!(scored[1].anomaly_score > scored[0].anomaly_score);
        assert_eq!(
            scored[1].row.feature("failed_attempt"),
            Some(&FieldValue::Boolean(true))
        );
    }

    #[test]
    fn single_row_scores_zero() {
        let mut scorer = make_scorer(NUMERIC_FEATURES.len() + 1);
        let scored = scorer.score(vec![make_row(true, vec![9.0])]).unwrap();
        assert_eq!(scored[0].anomaly_score, 0.0);
    }

    #[test]
    fn mismatched_artifacts_are_rejected() {
        let err = EnsembleScorer::new(
            StandardScaler::identity(4),
            Box::new(LstmAutoencoder::zeros(4, 2, 1)),
            Box::new(LstmAutoencoder::zeros(5, 2, 1)),
            &ScoringConfig::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, ScoringError::Dimension { expected: 4, actual: 5, .. }));
    }

    #[test]
    fn embedding_width_mismatch_fails_the_batch() {
        let mut scorer = make_scorer(NUMERIC_FEATURES.len() + 2);
        let err = scorer.score(vec![make_row(false, vec![1.0])]).unwrap_err();
        assert!(matches!(err, ScoringError::Dimension { .. }));
    }

    /// Scores every row but the last.
    struct ShortModel {
        dims: usize,
    }

    impl AnomalyModel for ShortModel {
        fn name(&self) -> &str {
            "short"
        }

        fn input_dim(&self) -> usize {
            self.dims
        }

        fn score(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
            Ok(vec![0.5; rows.len().saturating_sub(1)])
        }

        fn save(&self, _path: &std::path::Path) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn short_score_vector_fails_the_batch() {
        let dims = NUMERIC_FEATURES.len() + 1;
        let mut scorer = EnsembleScorer::new(
            StandardScaler::identity(dims),
            Box::new(ShortModel { dims }),
            Box::new(LstmAutoencoder::zeros(dims, 2, 1)),
            &ScoringConfig::default(),
        )
        .unwrap();

        let rows = vec![make_row(false, vec![0.0]), make_row(true, vec![1.0])];
        let err = scorer.score(rows).unwrap_err();
        assert!(matches!(
            err,
            ScoringError::ScoreCount { ref model, expected: 2, actual: 1 } if model == "short"
        ));
        assert_eq!(scorer.drift().cumulative_sum(), 0.0);
    }

    #[test]
    fn load_requires_every_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let models = ModelConfig {
            dir: dir.path().to_path_buf(),
        };
        let dims = 3;
        StandardScaler::identity(dims).save(&models.scaler_path()).unwrap();
        LstmAutoencoder::zeros(dims, 2, 1).save(&models.lstm_path()).unwrap();

        let err = EnsembleScorer::load(&models, &ScoringConfig::default()).err().unwrap();
        assert!(matches!(err, ScoringError::MissingArtifact(p) if p == models.iforest_path()));
    }
}
