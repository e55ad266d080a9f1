//! Gradient boosted trees for binary log-loss
//!
//! Each stage fits a regression tree to the pseudo-residuals `y - p` and
//! sets every leaf to the Newton step `sum(r) / sum(p * (1 - p))` of the
//! rows it holds, then adds `learning_rate * leaf` to the raw log-odds.

use crate::model::tree::{DecisionTree, TreeParams};
use crate::model::{check_training_data, Classifier};
use anyhow::Result;
use ndarray::{Array1, ArrayView2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Gradient boosting hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingParams {
    /// Number of boosting stages
    pub n_estimators: usize,
    /// Shrinkage applied to each stage
    pub learning_rate: f64,
    /// Depth of each regression tree
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for GradientBoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoosting {
    /// Prior log-odds of class 1
    init: f64,
    learning_rate: f64,
    trees: Vec<DecisionTree>,
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl GradientBoosting {
    pub fn fit(x: ArrayView2<f64>, y: &[u8], params: &GradientBoostingParams) -> Result<Self> {
        check_training_data(x, y)?;

        let n_samples = x.nrows();
        let labels: Vec<f64> = y.iter().map(|&l| f64::from(l)).collect();
        let prior = labels.iter().sum::<f64>() / n_samples as f64;
        let init = (prior / (1.0 - prior)).ln();

        let tree_params = TreeParams {
            max_depth: Some(params.max_depth),
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features: None,
        };

        let rows: Vec<usize> = (0..n_samples).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let mut raw = vec![init; n_samples];
        let mut trees = Vec::with_capacity(params.n_estimators);

        for stage in 0..params.n_estimators {
            let probs: Vec<f64> = raw.iter().map(|&r| sigmoid(r)).collect();
            let residuals: Vec<f64> = labels.iter().zip(&probs).map(|(t, p)| t - p).collect();
            let hessians: Vec<f64> = probs.iter().map(|p| p * (1.0 - p)).collect();

            let newton_step = |leaf_rows: &[usize]| {
                let numerator: f64 = leaf_rows.iter().map(|&r| residuals[r]).sum();
                let denominator: f64 = leaf_rows.iter().map(|&r| hessians[r]).sum();
                if denominator.abs() < 1e-150 {
                    0.0
                } else {
                    numerator / denominator
                }
            };

            let tree = DecisionTree::fit(x, &residuals, &rows, &tree_params, &mut rng, newton_step)?;

            for (value, row) in raw.iter_mut().zip(x.rows()) {
                *value += params.learning_rate * tree.predict_row(row);
            }
            trees.push(tree);

            if (stage + 1) % 25 == 0 {
                let loss = log_loss(&labels, &raw);
                debug!("Boosting stage {}: train log-loss {:.4}", stage + 1, loss);
            }
        }

        Ok(Self {
            init,
            learning_rate: params.learning_rate,
            trees,
        })
    }

    pub fn n_stages(&self) -> usize {
        self.trees.len()
    }

    /// Raw log-odds of class 1
    pub fn decision_function(&self, x: ArrayView2<f64>) -> Array1<f64> {
        x.rows()
            .into_iter()
            .map(|row| {
                self.init
                    + self.learning_rate
                        * self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
            })
            .collect()
    }
}

fn log_loss(labels: &[f64], raw: &[f64]) -> f64 {
    let eps = 1e-15;
    labels
        .iter()
        .zip(raw)
        .map(|(&t, &r)| {
            let p = sigmoid(r).clamp(eps, 1.0 - eps);
            -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
        })
        .sum::<f64>()
        / labels.len() as f64
}

impl Classifier for GradientBoosting {
    fn name(&self) -> &'static str {
        "gradient_boosting"
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Option<Array1<f64>> {
        Some(self.decision_function(x).mapv(sigmoid))
    }

    fn predict(&self, x: ArrayView2<f64>) -> Array1<u8> {
        self.decision_function(x).mapv(|r| u8::from(sigmoid(r) > 0.5))
    }
}
