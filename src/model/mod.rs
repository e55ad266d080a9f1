pub mod boosting;
pub mod checkpoint;
pub mod ensemble;
pub mod forest;
pub mod logistic;
pub mod metrics;
pub mod svm;
pub mod tree;

use crate::data::feature_engineering::{build_features, FeatureSet};
use crate::data::preprocessing::StandardScaler;
use crate::data::{LabeledSample, RawSample, NONZERO_AT_INFERENCE};
use anyhow::{bail, Result};
use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use self::boosting::GradientBoostingParams;
use self::ensemble::{EnsembleParams, SoftVotingEnsemble};
use self::forest::RandomForestParams;
use self::logistic::LogisticParams;
use self::metrics::Metrics;
use self::svm::{SvmClassifier, SvmParams};

/// A fitted binary classifier over scaled feature rows
pub trait Classifier {
    fn name(&self) -> &'static str;

    /// P(class 1) per row, or None when the model has no probability output
    fn predict_proba(&self, x: ArrayView2<f64>) -> Option<Array1<f64>>;

    fn predict(&self, x: ArrayView2<f64>) -> Array1<u8>;
}

/// Shared sanity checks before fitting any classifier
pub fn check_training_data(x: ArrayView2<f64>, y: &[u8]) -> Result<()> {
    if x.nrows() != y.len() {
        bail!("x has {} rows but {} labels were given", x.nrows(), y.len());
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        bail!("Cannot fit on an empty matrix ({} x {})", x.nrows(), x.ncols());
    }
    if x.iter().any(|v| !v.is_finite()) {
        bail!("Training matrix contains non-finite values");
    }
    if let Some(bad) = y.iter().find(|&&l| l > 1) {
        bail!("Labels must be 0 or 1, found {}", bad);
    }
    let positives = y.iter().filter(|&&l| l == 1).count();
    if positives == 0 || positives == y.len() {
        bail!("Training labels contain a single class");
    }
    Ok(())
}

/// Which pipeline a model was trained with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    /// Raw features and a single linear SVM
    Basic,
    /// Imputed and engineered features with a soft-voting ensemble
    Enhanced,
}

impl ModelVariant {
    pub fn feature_set(&self) -> FeatureSet {
        match self {
            ModelVariant::Basic => FeatureSet::Raw,
            ModelVariant::Enhanced => FeatureSet::Engineered,
        }
    }

    /// Columns that must be non-zero at prediction time
    pub fn nonzero_columns(&self) -> &'static [usize] {
        match self {
            ModelVariant::Basic => &[],
            ModelVariant::Enhanced => &NONZERO_AT_INFERENCE,
        }
    }

    /// Whether training data gets zero-as-missing imputation
    pub fn imputes_zeros(&self) -> bool {
        matches!(self, ModelVariant::Enhanced)
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelVariant::Basic => write!(f, "basic"),
            ModelVariant::Enhanced => write!(f, "enhanced"),
        }
    }
}

impl FromStr for ModelVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "basic" => Ok(ModelVariant::Basic),
            "enhanced" => Ok(ModelVariant::Enhanced),
            other => Err(format!("unknown model variant '{}' (expected basic or enhanced)", other)),
        }
    }
}

/// Hyperparameters for both variants
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Classifier of the basic variant
    pub linear_svm: SvmParams,
    /// Members of the enhanced variant
    pub ensemble: EnsembleParams,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            linear_svm: SvmParams::linear(),
            ensemble: EnsembleParams::default(),
        }
    }
}

impl ModelConfig {
    /// Fewer trees and stages for faster training
    pub fn small() -> Self {
        Self {
            ensemble: EnsembleParams {
                random_forest: RandomForestParams {
                    n_estimators: 20,
                    ..RandomForestParams::default()
                },
                gradient_boosting: GradientBoostingParams {
                    n_estimators: 30,
                    ..GradientBoostingParams::default()
                },
                logistic: LogisticParams::default(),
                svm: SvmParams::rbf(),
            },
            ..Self::default()
        }
    }
}

/// The classifier a variant trains
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FittedClassifier {
    LinearSvm(SvmClassifier),
    Ensemble(SoftVotingEnsemble),
}

impl FittedClassifier {
    /// Fit the variant's classifier on scaled features
    pub fn fit(
        variant: ModelVariant,
        x: ArrayView2<f64>,
        y: &[u8],
        config: &ModelConfig,
        show_progress: bool,
    ) -> Result<Self> {
        match variant {
            ModelVariant::Basic => {
                let params = SvmParams {
                    probability: false,
                    ..config.linear_svm
                };
                Ok(FittedClassifier::LinearSvm(SvmClassifier::fit(x, y, &params)?))
            }
            ModelVariant::Enhanced => Ok(FittedClassifier::Ensemble(SoftVotingEnsemble::fit(
                x,
                y,
                &config.ensemble,
                show_progress,
            )?)),
        }
    }

    fn as_classifier(&self) -> &dyn Classifier {
        match self {
            FittedClassifier::LinearSvm(m) => m,
            FittedClassifier::Ensemble(m) => m,
        }
    }
}

impl Classifier for FittedClassifier {
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

/// Label and optional `[p0, p1]` for one sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassScores {
    pub label: u8,
    pub probabilities: Option<[f64; 2]>,
}

/// Everything inference needs, frozen after training
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    variant: ModelVariant,
    scaler: StandardScaler,
    classifier: FittedClassifier,
}

impl Model {
    pub fn new(variant: ModelVariant, scaler: StandardScaler, classifier: FittedClassifier) -> Result<Self> {
        let expected = variant.feature_set().len();
        if scaler.n_features() != expected {
            bail!(
                "{} model needs a scaler over {} features, got {}",
                variant,
                expected,
                scaler.n_features()
            );
        }
        Ok(Self {
            variant,
            scaler,
            classifier,
        })
    }

    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    pub fn feature_set(&self) -> FeatureSet {
        self.variant.feature_set()
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    pub fn classifier(&self) -> &FittedClassifier {
        &self.classifier
    }

    /// Scaled feature matrix for a batch of samples
    pub fn prepare(&self, samples: &[RawSample]) -> Result<Array2<f64>> {
        let n_features = self.feature_set().len();
        let flat: Vec<f64> = samples
            .iter()
            .flat_map(|s| build_features(s, self.feature_set()))
            .collect();
        let features = Array2::from_shape_vec((samples.len(), n_features), flat)?;
        self.scaler.transform(&features)
    }

    /// Classify a batch of samples
    pub fn score_batch(&self, samples: &[RawSample]) -> Result<Vec<ClassScores>> {
        let x = self.prepare(samples)?;
        let labels = self.classifier.predict(x.view());
        let probs = self.classifier.predict_proba(x.view());

        Ok(labels
            .iter()
            .enumerate()
            .map(|(i, &label)| ClassScores {
                label,
                probabilities: probs.as_ref().map(|p| [1.0 - p[i], p[i]]),
            })
            .collect())
    }

    /// Score labeled samples as-is (no imputation or validation)
    pub fn evaluate(&self, samples: &[LabeledSample]) -> Result<Metrics> {
        if samples.is_empty() {
            bail!("Cannot evaluate on an empty dataset");
        }
        let raw: Vec<RawSample> = samples.iter().map(|s| s.sample).collect();
        let targets: Vec<u8> = samples.iter().map(|s| s.outcome).collect();
        let x = self.prepare(&raw)?;
        let predictions = self.classifier.predict(x.view()).to_vec();
        Ok(Metrics::compute(&predictions, &targets))
    }

    /// Classify a single sample
    pub fn score(&self, sample: &RawSample) -> Result<ClassScores> {
        match self.score_batch(std::slice::from_ref(sample))?.pop() {
            Some(scores) => Ok(scores),
            None => bail!("Classifier returned no prediction"),
        }
    }
}
