//! LSTM autoencoder inference.
//!
//! Each scaled row is treated as a sequence of length one:
//! encoder LSTM (D→H), linear H→latent, decoder LSTM (latent→H), linear
//! H→D. The anomaly score is the mean squared reconstruction error.
//! Gate weights are stacked in input, forget, cell, output order.

use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::artifact::{invalid, read_json, write_json};
use super::error::{Result, ScoringError};
use super::model::AnomalyModel;

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn matvec(m: &[Vec<f64>], x: &[f64]) -> Vec<f64> {
    m.iter()
        .map(|row| row.iter().zip(x).map(|(w, v)| w * v).sum())
        .collect()
}

fn check_matrix(m: &[Vec<f64>], rows: usize, cols: usize, what: &str) -> std::result::Result<(), String> {
    if m.len() != rows || m.iter().any(|r| r.len() != cols) {
        return Err(format!("{what}: expected {rows}x{cols}"));
    }
    Ok(())
}

fn check_vector(v: &[f64], len: usize, what: &str) -> std::result::Result<(), String> {
    if v.len() != len {
        return Err(format!("{what}: expected length {len}, got {}", v.len()));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Linear {
    /// `out x in`
    pub weight: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

impl Linear {
    pub fn zeros(input: usize, output: usize) -> Self {
        Self {
            weight: vec![vec![0.0; input]; output],
            bias: vec![0.0; output],
        }
    }

    fn forward(&self, x: &[f64]) -> Vec<f64> {
        matvec(&self.weight, x)
            .into_iter()
            .zip(&self.bias)
            .map(|(v, b)| v + b)
            .collect()
    }

    fn validate(&self, input: usize, output: usize, what: &str) -> std::result::Result<(), String> {
        check_matrix(&self.weight, output, input, what)?;
        check_vector(&self.bias, output, what)
    }
}

/// Single-layer LSTM weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmLayer {
    /// `4H x input`
    pub w_ih: Vec<Vec<f64>>,
    /// `4H x H`
    pub w_hh: Vec<Vec<f64>>,
    pub b_ih: Vec<f64>,
    pub b_hh: Vec<f64>,
}

impl LstmLayer {
    pub fn zeros(input: usize, hidden: usize) -> Self {
        Self {
            w_ih: vec![vec![0.0; input]; 4 * hidden],
            w_hh: vec![vec![0.0; hidden]; 4 * hidden],
            b_ih: vec![0.0; 4 * hidden],
            b_hh: vec![0.0; 4 * hidden],
        }
    }

    fn hidden(&self) -> usize {
        self.b_ih.len() / 4
    }

    /// One step from the zero state; returns the new hidden state.
    fn step(&self, x: &[f64]) -> Vec<f64> {
        let h = self.hidden();
        let h0 = vec![0.0; h];
        let c0 = 0.0;
        let gates: Vec<f64> = matvec(&self.w_ih, x)
            .into_iter()
            .zip(matvec(&self.w_hh, &h0))
            .zip(self.b_ih.iter().zip(&self.b_hh))
            .map(|((a, b), (c, d))| a + b + c + d)
            .collect();

        (0..h)
            .map(|j| {
                let i = sigmoid(gates[j]);
                let f = sigmoid(gates[h + j]);
                let g = gates[2 * h + j].tanh();
                let o = sigmoid(gates[3 * h + j]);
                let c = f * c0 + i * g;
                o * c.tanh()
            })
            .collect()
    }

    fn validate(&self, input: usize, hidden: usize, what: &str) -> std::result::Result<(), String> {
        check_matrix(&self.w_ih, 4 * hidden, input, what)?;
        check_matrix(&self.w_hh, 4 * hidden, hidden, what)?;
        check_vector(&self.b_ih, 4 * hidden, what)?;
        check_vector(&self.b_hh, 4 * hidden, what)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmAutoencoder {
    pub input_dim: usize,
    pub hidden_dim: usize,
    pub latent_dim: usize,
    pub encoder: LstmLayer,
    pub to_latent: Linear,
    pub decoder: LstmLayer,
    pub to_output: Linear,
    /// Training-time 99th percentile of reconstruction error, if recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

impl LstmAutoencoder {
    pub const NAME: &'static str = "lstm_ae";

    /// All-zero weights: every input reconstructs to the zero vector.
    pub fn zeros(input_dim: usize, hidden_dim: usize, latent_dim: usize) -> Self {
        Self {
            input_dim,
            hidden_dim,
            latent_dim,
            encoder: LstmLayer::zeros(input_dim, hidden_dim),
            to_latent: Linear::zeros(hidden_dim, latent_dim),
            decoder: LstmLayer::zeros(latent_dim, hidden_dim),
            to_output: Linear::zeros(hidden_dim, input_dim),
            threshold: None,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let model: Self = read_json(path)?;
        model.validate().map_err(|r| invalid(path, r))?;
        Ok(model)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        let (d, h, l) = (self.input_dim, self.hidden_dim, self.latent_dim);
        self.encoder.validate(d, h, "encoder")?;
        self.to_latent.validate(h, l, "to_latent")?;
        self.decoder.validate(l, h, "decoder")?;
        self.to_output.validate(h, d, "to_output")
    }

    pub fn reconstruct(&self, x: &[f64]) -> Vec<f64> {
        let h = self.encoder.step(x);
        let z = self.to_latent.forward(&h);
        let h2 = self.decoder.step(&z);
        self.to_output.forward(&h2)
    }

    pub fn score_row(&self, x: &[f64]) -> f64 {
        if x.is_empty() {
            return 0.0;
        }
        let recon = self.reconstruct(x);
        recon.iter().zip(x).map(|(r, v)| (r - v).powi(2)).sum::<f64>() / x.len() as f64
    }
}

impl AnomalyModel for LstmAutoencoder {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn score(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        if let Some(bad) = rows.iter().find(|r| r.len() != self.input_dim) {
            return Err(ScoringError::Dimension {
                model: Self::NAME.into(),
                expected: self.input_dim,
                actual: bad.len(),
            });
        }
        Ok(rows.par_iter().map(|r| self.score_row(r)).collect())
    }

    fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }
}
