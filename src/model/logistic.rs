use crate::model::{check_training_data, Classifier};
use anyhow::{anyhow, bail, Result};
use linfa::prelude::*;
use linfa_logistic::LogisticRegression;
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// L2-regularized logistic regression settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticParams {
    /// L2 penalty strength
    pub alpha: f64,
    pub max_iterations: u64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            max_iterations: 1000,
        }
    }
}

/// Fitted logistic model: P(y=1|x) = sigmoid(w·x + b)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    weights: Vec<f64>,
    intercept: f64,
}

impl LogisticModel {
    pub fn fit(x: ArrayView2<f64>, y: &[u8], params: &LogisticParams) -> Result<Self> {
        check_training_data(x, y)?;

        let targets: Array1<usize> = y.iter().map(|&l| usize::from(l)).collect();
        let dataset = Dataset::new(x.to_owned(), targets);

        let fitted = LogisticRegression::default()
            .alpha(params.alpha)
            .max_iterations(params.max_iterations)
            .fit(&dataset)
            .map_err(|e| anyhow!("Logistic regression training failed: {}", e))?;

        let mut model = Self {
            weights: fitted.params().to_vec(),
            intercept: fitted.intercept(),
        };

        // linfa chooses its own positive class; align it with label 1
        let labels: Array1<usize> = fitted.predict(dataset.records());
        let logits = model.logits(x);
        let Some((row, logit)) = logits
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
        else {
            bail!("Logistic regression fitted on an empty matrix");
        };
        if (*logit > 0.0) != (labels[row] == 1) {
            debug!("Flipping logistic orientation to make label 1 positive");
            model.weights.iter_mut().for_each(|w| *w = -*w);
            model.intercept = -model.intercept;
        }

        Ok(model)
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    fn logit_row(&self, row: ArrayView1<f64>) -> f64 {
        row.iter().zip(&self.weights).map(|(x, w)| x * w).sum::<f64>() + self.intercept
    }

    pub fn logits(&self, x: ArrayView2<f64>) -> Array1<f64> {
        x.rows().into_iter().map(|row| self.logit_row(row)).collect()
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl Classifier for LogisticModel {
    fn name(&self) -> &'static str {
        "logistic_regression"
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Option<Array1<f64>> {
        Some(self.logits(x).mapv(sigmoid))
    }

    fn predict(&self, x: ArrayView2<f64>) -> Array1<u8> {
        self.logits(x).mapv(|z| u8::from(sigmoid(z) > 0.5))
    }
}
