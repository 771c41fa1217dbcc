use std::path::Path;

use serde::{Deserialize, Serialize};

use super::artifact::{invalid, read_json, write_json};
use super::error::{Result, ScoringError};

/// Persisted standardization: `(x - mean) / scale` per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Self {
        Self { mean, scale }
    }

    /// Identity transform over `dims` columns.
    pub fn identity(dims: usize) -> Self {
        Self::new(vec![0.0; dims], vec![1.0; dims])
    }

    pub fn dims(&self) -> usize {
        self.mean.len()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let scaler: Self = read_json(path)?;
        if scaler.mean.len() != scaler.scale.len() {
            return Err(invalid(path, "mean and scale lengths differ"));
        }
        Ok(scaler)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }

    /// Scale one row. Zero scales are treated as 1.
    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.dims() {
            return Err(ScoringError::Dimension {
                model: "scaler".into(),
                expected: self.dims(),
                actual: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (m, s))| {
                let s = if *s == 0.0 { 1.0 } else { *s };
                (x - m) / s
            })
            .collect())
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }
}
