//! Isolation forest inference over pre-built trees.
//!
//! A point's anomaly score is `2^(-E[h(x)] / c(n))`, where `h(x)` is the
//! path length to the leaf that isolates it (plus the expected remaining
//! depth of that leaf) and `c(n)` the average path length of an unsuccessful
//! BST search over `n` samples. Scores near 1 are anomalous.

use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::artifact::{invalid, read_json, write_json};
use super::error::{Result, ScoringError};
use super::model::AnomalyModel;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Average path length of an unsuccessful search in a BST of `n` nodes.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// `x[feature] <= threshold` goes left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf { size: usize },
}

/// One isolation tree, root at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationTree {
    pub nodes: Vec<Node>,
}

impl IsolationTree {
    fn path_length(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        let mut depth = 0.0;
        // Bounded by node count so a malformed cycle cannot spin forever.
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(idx) {
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let v = x.get(*feature).copied().unwrap_or(0.0);
                    idx = if v <= *threshold { *left } else { *right };
                    depth += 1.0;
                }
                Some(Node::Leaf { size }) => return depth + average_path_length(*size),
                None => break,
            }
        }
        depth
    }

    fn validate(&self, n_features: usize) -> std::result::Result<(), String> {
        if self.nodes.is_empty() {
            return Err("empty tree".into());
        }
        for node in &self.nodes {
            if let Node::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                if *feature >= n_features {
                    return Err(format!("split on feature {feature} of {n_features}"));
                }
                if *left >= self.nodes.len() || *right >= self.nodes.len() {
                    return Err("child index out of range".into());
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    pub n_features: usize,
    /// Subsample size each tree was grown on.
    pub max_samples: usize,
    pub trees: Vec<IsolationTree>,
}

impl IsolationForest {
    pub const NAME: &'static str = "iforest";

    pub fn new(n_features: usize, max_samples: usize, trees: Vec<IsolationTree>) -> Self {
        Self {
            n_features,
            max_samples,
            trees,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let forest: Self = read_json(path)?;
        if forest.trees.is_empty() {
            return Err(invalid(path, "forest has no trees"));
        }
        for tree in &forest.trees {
            tree.validate(forest.n_features).map_err(|r| invalid(path, r))?;
        }
        Ok(forest)
    }

    pub fn score_row(&self, x: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let mean_depth =
            self.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / self.trees.len() as f64;
        let c = average_path_length(self.max_samples);
        if c == 0.0 {
            return 1.0;
        }
        2f64.powf(-mean_depth / c)
    }
}

impl AnomalyModel for IsolationForest {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn input_dim(&self) -> usize {
        self.n_features
    }

    fn score(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        if let Some(bad) = rows.iter().find(|r| r.len() != self.n_features) {
            return Err(ScoringError::Dimension {
                model: Self::NAME.into(),
                expected: self.n_features,
                actual: bad.len(),
            });
        }
        Ok(rows.par_iter().map(|r| self.score_row(r)).collect())
    }

    fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }
}
