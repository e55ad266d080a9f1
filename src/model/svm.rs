//! Support vector classifier trained with linfa
//!
//! linfa fits the dual problem; the fitted coefficients are copied into a
//! serializable decision function:
//!
//! - Linear kernel: f(x) = w·x - rho, with w = Σ(αᵢ·xᵢ)
//! - RBF kernel: f(x) = Σ(αᵢ·exp(-γ||x-xᵢ||²)) - rho
//!
//! Probabilities come from Platt scaling of the decision values.

use crate::model::{check_training_data, Classifier};
use anyhow::{anyhow, bail, Result};
use linfa::prelude::*;
use linfa_svm::Svm;
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Kernel type for SVM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KernelType {
    Linear,
    Rbf,
}

/// SVM hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SvmParams {
    pub kernel: KernelType,
    /// RBF width; None picks 1 / (n_features * Var(X))
    pub gamma: Option<f64>,
    /// Fit Platt scaling so the model can report probabilities
    pub probability: bool,
}

impl SvmParams {
    pub fn linear() -> Self {
        Self {
            kernel: KernelType::Linear,
            gamma: None,
            probability: false,
        }
    }

    pub fn rbf() -> Self {
        Self {
            kernel: KernelType::Rbf,
            gamma: None,
            probability: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum DecisionFunction {
    Linear {
        weights: Vec<f64>,
    },
    Rbf {
        gamma: f64,
        alpha: Vec<f64>,
        support_vectors: Vec<Vec<f64>>,
    },
}

/// Sigmoid calibration of decision values: P(y=1|f) = 1 / (1 + exp(A·f + B))
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlattScaling {
    pub a: f64,
    pub b: f64,
}

impl PlattScaling {
    /// Fit A and B by Newton's method with backtracking line search
    pub fn fit(decisions: &[f64], labels: &[u8]) -> Result<Self> {
        if decisions.len() != labels.len() || decisions.is_empty() {
            bail!(
                "Platt scaling needs matching, non-empty inputs ({} decisions, {} labels)",
                decisions.len(),
                labels.len()
            );
        }

        let n_pos = labels.iter().filter(|&&l| l == 1).count() as f64;
        let n_neg = labels.len() as f64 - n_pos;

        // Smoothed targets keep the fit away from 0/1
        let hi = (n_pos + 1.0) / (n_pos + 2.0);
        let lo = 1.0 / (n_neg + 2.0);
        let targets: Vec<f64> = labels.iter().map(|&l| if l == 1 { hi } else { lo }).collect();

        let objective = |a: f64, b: f64| -> f64 {
            decisions
                .iter()
                .zip(&targets)
                .map(|(&f, &t)| {
                    let z = f * a + b;
                    if z >= 0.0 {
                        t * z + (-z).exp().ln_1p()
                    } else {
                        (t - 1.0) * z + z.exp().ln_1p()
                    }
                })
                .sum()
        };

        let mut a = 0.0;
        let mut b = ((n_neg + 1.0) / (n_pos + 1.0)).ln();
        let mut fval = objective(a, b);

        const MAX_ITER: usize = 100;
        const MIN_STEP: f64 = 1e-10;
        const SIGMA: f64 = 1e-12;

        for _ in 0..MAX_ITER {
            let (mut h11, mut h22, mut h21) = (SIGMA, SIGMA, 0.0);
            let (mut g1, mut g2) = (0.0, 0.0);

            for (&f, &t) in decisions.iter().zip(&targets) {
                let z = f * a + b;
                let (p, q) = if z >= 0.0 {
                    let e = (-z).exp();
                    (e / (1.0 + e), 1.0 / (1.0 + e))
                } else {
                    let e = z.exp();
                    (1.0 / (1.0 + e), e / (1.0 + e))
                };
                let d2 = p * q;
                h11 += f * f * d2;
                h22 += d2;
                h21 += f * d2;
                let d1 = t - p;
                g1 += f * d1;
                g2 += d1;
            }

            if g1.abs() < 1e-5 && g2.abs() < 1e-5 {
                break;
            }

            let det = h11 * h22 - h21 * h21;
            let da = -(h22 * g1 - h21 * g2) / det;
            let db = -(-h21 * g1 + h11 * g2) / det;
            let gd = g1 * da + g2 * db;

            let mut step = 1.0;
            while step >= MIN_STEP {
                let (new_a, new_b) = (a + step * da, b + step * db);
                let new_f = objective(new_a, new_b);
                if new_f < fval + 1e-4 * step * gd {
                    a = new_a;
                    b = new_b;
                    fval = new_f;
                    break;
                }
                step /= 2.0;
            }

            if step < MIN_STEP {
                debug!("Platt scaling line search stalled");
                break;
            }
        }

        Ok(Self { a, b })
    }

    /// Probability of class 1 for a decision value
    pub fn transform(&self, decision: f64) -> f64 {
        let z = decision * self.a + self.b;
        if z >= 0.0 {
            let e = (-z).exp();
            e / (1.0 + e)
        } else {
            1.0 / (1.0 + z.exp())
        }
    }
}

/// Fitted binary SVM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvmClassifier {
    decision: DecisionFunction,
    rho: f64,
    platt: Option<PlattScaling>,
}

impl SvmClassifier {
    pub fn fit(x: ArrayView2<f64>, y: &[u8], params: &SvmParams) -> Result<Self> {
        check_training_data(x, y)?;

        let targets: Array1<bool> = y.iter().map(|&l| l == 1).collect();
        let dataset = Dataset::new(x.to_owned(), targets);

        let gamma = params.gamma.unwrap_or_else(|| scale_gamma(x));
        let fitted = match params.kernel {
            KernelType::Linear => Svm::<_, bool>::params().linear_kernel().fit(&dataset),
            KernelType::Rbf => {
                debug!("RBF kernel gamma = {:.6}", gamma);
                // linfa's gaussian kernel is exp(-||x-y||² / eps)
                Svm::<_, bool>::params()
                    .gaussian_kernel(1.0 / gamma)
                    .fit(&dataset)
            }
        }
        .map_err(|e| anyhow!("SVM training failed: {}", e))?;

        let rho = fitted.rho;
        let decision = match params.kernel {
            KernelType::Linear => {
                let mut weights = Array1::<f64>::zeros(x.ncols());
                for (row, &alpha_i) in x.rows().into_iter().zip(&fitted.alpha) {
                    weights.scaled_add(alpha_i, &row);
                }
                DecisionFunction::Linear {
                    weights: weights.to_vec(),
                }
            }
            KernelType::Rbf => {
                let (alpha, support_vectors): (Vec<f64>, Vec<Vec<f64>>) = x
                    .rows()
                    .into_iter()
                    .zip(&fitted.alpha)
                    .filter(|(_, a)| a.abs() > 0.0)
                    .map(|(row, &a)| (a, row.to_vec()))
                    .unzip();
                debug!("SVM kept {} support vectors", support_vectors.len());
                DecisionFunction::Rbf {
                    gamma,
                    alpha,
                    support_vectors,
                }
            }
        };

        let mut svm = Self {
            decision,
            rho,
            platt: None,
        };

        if params.probability {
            let scores = svm.decision_function(x);
            svm.platt = Some(PlattScaling::fit(&scores.to_vec(), y)?);
        }

        Ok(svm)
    }

    /// Signed distance-like score; positive means class 1
    pub fn decision_row(&self, row: ArrayView1<f64>) -> f64 {
        let sum = match &self.decision {
            DecisionFunction::Linear { weights } => {
                row.iter().zip(weights).map(|(x, w)| x * w).sum::<f64>()
            }
            DecisionFunction::Rbf {
                gamma,
                alpha,
                support_vectors,
            } => alpha
                .iter()
                .zip(support_vectors)
                .map(|(a, sv)| {
                    let sq_dist: f64 = row.iter().zip(sv).map(|(x, s)| (x - s) * (x - s)).sum();
                    a * (-gamma * sq_dist).exp()
                })
                .sum::<f64>(),
        };
        sum - self.rho
    }

    pub fn decision_function(&self, x: ArrayView2<f64>) -> Array1<f64> {
        x.rows().into_iter().map(|row| self.decision_row(row)).collect()
    }

    pub fn kernel(&self) -> KernelType {
        match self.decision {
            DecisionFunction::Linear { .. } => KernelType::Linear,
            DecisionFunction::Rbf { .. } => KernelType::Rbf,
        }
    }

    pub fn has_probabilities(&self) -> bool {
        self.platt.is_some()
    }
}

/// 1 / (n_features * Var(X)) over all entries of X
fn scale_gamma(x: ArrayView2<f64>) -> f64 {
    let variance = x.var(0.0);
    if variance > 0.0 {
        1.0 / (x.ncols() as f64 * variance)
    } else {
        1.0
    }
}

impl Classifier for SvmClassifier {
    fn name(&self) -> &'static str {
        match self.kernel() {
            KernelType::Linear => "linear_svm",
            KernelType::Rbf => "rbf_svm",
        }
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Option<Array1<f64>> {
        let platt = self.platt?;
        Some(self.decision_function(x).mapv(|f| platt.transform(f)))
    }

    fn predict(&self, x: ArrayView2<f64>) -> Array1<u8> {
        self.decision_function(x).mapv(|f| u8::from(f > 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::blobs;

    fn accuracy(predictions: &Array1<u8>, y: &[u8]) -> f64 {
        predictions.iter().zip(y).filter(|(p, t)| p == t).count() as f64 / y.len() as f64
    }

    #[test]
    fn test_platt_scaling_is_monotonic() {
        let decisions = [-2.0, -1.5, -1.0, -0.5, 0.5, 1.0, 1.5, 2.0];
        let labels = [0, 0, 0, 1, 0, 1, 1, 1];
        let platt = PlattScaling::fit(&decisions, &labels).unwrap();

        // Larger decision values mean higher class-1 probability
        assert!(platt.a < 0.0);
        assert!(platt.transform(2.0) > 0.5);
        assert!(platt.transform(-2.0) < 0.5);
        assert!(platt.transform(1.0) > platt.transform(-1.0));
    }

    #[test]
    fn test_platt_rejects_mismatched_input() {
        assert!(PlattScaling::fit(&[1.0], &[]).is_err());
    }

    #[test]
    fn test_linear_svm_separates_blobs() {
        let (x, y) = blobs(60, 3, 4.0, 21);
        let svm = SvmClassifier::fit(x.view(), &y, &SvmParams::linear()).unwrap();

        assert_eq!(svm.kernel(), KernelType::Linear);
        assert!(!svm.has_probabilities());
        assert!(svm.predict_proba(x.view()).is_none());
        assert!(accuracy(&svm.predict(x.view()), &y) > 0.95);
    }

    #[test]
    fn test_rbf_svm_probabilities() {
        let (x, y) = blobs(60, 3, 4.0, 22);
        let svm = SvmClassifier::fit(x.view(), &y, &SvmParams::rbf()).unwrap();

        let probs = svm.predict_proba(x.view()).unwrap();
        assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));

        let labels: Array1<u8> = probs.mapv(|p| u8::from(p > 0.5));
        assert!(accuracy(&labels, &y) > 0.9);
    }

    #[test]
    fn test_scale_gamma() {
        let x = ndarray::array![[1.0, -1.0], [-1.0, 1.0]];
        // Var of all entries is 1, two features
        assert!((scale_gamma(x.view()) - 0.5).abs() < 1e-12);
    }
}
