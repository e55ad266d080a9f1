//! Soft-voting ensemble
//!
//! Every member reports P(class 1); the ensemble averages them with equal
//! weight and predicts the class with the larger mean probability.

use crate::model::boosting::{GradientBoosting, GradientBoostingParams};
use crate::model::forest::{RandomForest, RandomForestParams};
use crate::model::logistic::{LogisticModel, LogisticParams};
use crate::model::svm::{SvmClassifier, SvmParams};
use crate::model::{check_training_data, Classifier};
use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// One fitted ensemble member
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
    Svm(SvmClassifier),
    Logistic(LogisticModel),
}

impl Estimator {
    fn as_classifier(&self) -> &dyn Classifier {
        match self {
            Estimator::RandomForest(m) => m,
            Estimator::GradientBoosting(m) => m,
            Estimator::Svm(m) => m,
            Estimator::Logistic(m) => m,
        }
    }
}

impl Classifier for Estimator {
    fn name(&self) -> &'static str {
        self.as_classifier().name()
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Option<Array1<f64>> {
        self.as_classifier().predict_proba(x)
    }

    fn predict(&self, x: ArrayView2<f64>) -> Array1<u8> {
        self.as_classifier().predict(x)
    }
}

/// Hyperparameters of the four members
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnsembleParams {
    pub random_forest: RandomForestParams,
    pub gradient_boosting: GradientBoostingParams,
    pub svm: SvmParams,
    pub logistic: LogisticParams,
}

impl Default for EnsembleParams {
    fn default() -> Self {
        Self {
            random_forest: RandomForestParams::default(),
            gradient_boosting: GradientBoostingParams::default(),
            svm: SvmParams::rbf(),
            logistic: LogisticParams::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftVotingEnsemble {
    members: Vec<Estimator>,
}

impl SoftVotingEnsemble {
    /// Fit every member on the same data
    pub fn fit(
        x: ArrayView2<f64>,
        y: &[u8],
        params: &EnsembleParams,
        show_progress: bool,
    ) -> Result<Self> {
        check_training_data(x, y)?;
        if !params.svm.probability {
            bail!("The ensemble SVM must be fitted with probability estimates");
        }

        let progress = if show_progress {
            let pb = ProgressBar::new(4);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let mut members = Vec::with_capacity(4);
        let steps: [(&str, &dyn Fn() -> Result<Estimator>); 4] = [
            ("random forest", &|| {
                RandomForest::fit(x, y, &params.random_forest).map(Estimator::RandomForest)
            }),
            ("gradient boosting", &|| {
                GradientBoosting::fit(x, y, &params.gradient_boosting)
                    .map(Estimator::GradientBoosting)
            }),
            ("rbf svm", &|| SvmClassifier::fit(x, y, &params.svm).map(Estimator::Svm)),
            ("logistic regression", &|| {
                LogisticModel::fit(x, y, &params.logistic).map(Estimator::Logistic)
            }),
        ];

        for (label, fit) in steps {
            if let Some(pb) = &progress {
                pb.set_message(format!("fitting {}", label));
            }
            let start = Instant::now();
            let member = fit().with_context(|| format!("Failed to fit {}", label))?;
            debug!("Fitted {} in {:.2}s", label, start.elapsed().as_secs_f64());
            members.push(member);
            if let Some(pb) = &progress {
                pb.inc(1);
            }
        }

        if let Some(pb) = progress {
            pb.finish_with_message("ensemble ready");
        }
        info!("Soft-voting ensemble fitted with {} members", members.len());

        Ok(Self { members })
    }

    pub fn members(&self) -> &[Estimator] {
        &self.members
    }

    /// P(class 1) of each member, in member order
    pub fn member_probabilities(&self, x: ArrayView2<f64>) -> Vec<(&'static str, Array1<f64>)> {
        self.members
            .iter()
            .filter_map(|m| m.predict_proba(x).map(|p| (m.name(), p)))
            .collect()
    }

    /// Equal-weight mean of the member probabilities
    pub fn mean_probability(&self, x: ArrayView2<f64>) -> Array1<f64> {
        let per_member = self.member_probabilities(x);
        let mut total = Array1::<f64>::zeros(x.nrows());
        for (_, p) in &per_member {
            total += p;
        }
        if !per_member.is_empty() {
            total /= per_member.len() as f64;
        }
        total
    }
}

impl Classifier for SoftVotingEnsemble {
    fn name(&self) -> &'static str {
        "soft_voting_ensemble"
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Option<Array1<f64>> {
        Some(self.mean_probability(x))
    }

    fn predict(&self, x: ArrayView2<f64>) -> Array1<u8> {
        // Equal probabilities resolve to class 0
        self.mean_probability(x).mapv(|p| u8::from(p > 0.5))
    }
}
