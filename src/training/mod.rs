pub mod trainer;

pub use trainer::Trainer;

use crate::data::preprocessing::ZeroImputer;
use crate::data::SplitConfig;
use crate::model::metrics::Metrics;
use crate::model::{Model, ModelConfig, ModelVariant};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Training configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Pipeline to train
    pub variant: ModelVariant,
    /// Train/test split settings
    pub split: SplitConfig,
    /// Folds for stratified cross-validation (0 or 1 = skip)
    pub cv_folds: usize,
    /// Show progress bars
    pub show_progress: bool,
    /// Classifier hyperparameters
    pub model: ModelConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self::enhanced()
    }
}

impl TrainingConfig {
    /// Raw features and a linear SVM
    pub fn basic() -> Self {
        Self {
            variant: ModelVariant::Basic,
            split: SplitConfig::default(),
            cv_folds: 5,
            show_progress: true,
            model: ModelConfig::default(),
        }
    }

    /// Imputation, engineered features and the soft-voting ensemble
    pub fn enhanced() -> Self {
        Self {
            variant: ModelVariant::Enhanced,
            ..Self::basic()
        }
    }

    /// Create configuration for quick testing
    pub fn quick_test() -> Self {
        Self {
            cv_folds: 3,
            show_progress: false,
            model: ModelConfig::small(),
            ..Self::enhanced()
        }
    }

    /// Read a JSON configuration; missing fields take default values
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        serde_json::from_str(&json).with_context(|| format!("Failed to parse config file {:?}", path))
    }
}

/// Training result
#[derive(Debug, Clone)]
pub struct TrainingResult {
    /// The fitted model, ready for inference
    pub model: Model,
    /// Column medians used to fill zeros (enhanced variant only)
    pub imputer: Option<ZeroImputer>,
    /// Accuracy on the training partition
    pub train_accuracy: f64,
    /// Metrics on the held-out test partition
    pub test_metrics: Metrics,
    /// Per-fold cross-validation accuracy
    pub cv_scores: Vec<f64>,
    /// Training duration in seconds
    pub duration_secs: f64,
}

impl TrainingResult {
    /// Mean and population standard deviation of the fold accuracies
    pub fn cv_summary(&self) -> Option<(f64, f64)> {
        if self.cv_scores.is_empty() {
            return None;
        }
        let n = self.cv_scores.len() as f64;
        let mean = self.cv_scores.iter().sum::<f64>() / n;
        let var = self.cv_scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Some((mean, var.sqrt()))
    }

    /// Log a human-readable summary
    pub fn print_summary(&self) {
        tracing::info!("=== Training Summary ({} model) ===", self.model.variant());
        tracing::info!("Classifier: {}", crate::model::Classifier::name(self.model.classifier()));
        tracing::info!("Training accuracy: {:.2}%", self.train_accuracy * 100.0);
        tracing::info!("Test accuracy: {:.2}%", self.test_metrics.accuracy * 100.0);
        tracing::info!("Test metrics: {}", self.test_metrics);
        if let Some((mean, std)) = self.cv_summary() {
            tracing::info!(
                "Cross-validation accuracy: {:.2}% (+/- {:.2}%) over {} folds",
                mean * 100.0,
                std * 100.0,
                self.cv_scores.len()
            );
        }
        tracing::info!("Training took {}", crate::utils::format_duration(self.duration_secs));
    }
}
