use crate::data::feature_engineering::{to_matrix, to_targets, transform};
use crate::data::preprocessing::{split_indices, stratified_kfold, StandardScaler, ZeroImputer};
use crate::data::{LabeledSample, ZERO_AS_MISSING};
use crate::model::metrics::{accuracy, Metrics};
use crate::model::{Classifier, FittedClassifier, Model};
use crate::training::{TrainingConfig, TrainingResult};
use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array2, Axis};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs the training pipeline once and hands back an immutable [`Model`]
pub struct Trainer {
    /// Training configuration
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Train a model on labeled samples
    pub fn train(&self, samples: &[LabeledSample]) -> Result<TrainingResult> {
        if samples.is_empty() {
            bail!("Cannot train on an empty dataset");
        }

        let variant = self.config.variant;
        info!("Training {} model on {} samples", variant, samples.len());
        debug!("Training configuration: {:?}", self.config);

        let start_time = Instant::now();

        // Zero-as-missing imputation only ever touches training data
        let mut samples = samples.to_vec();
        let imputer = if variant.imputes_zeros() {
            let imputer = ZeroImputer::fit(&samples, &ZERO_AS_MISSING)?;
            let replaced = imputer.transform(&mut samples);
            info!("Imputed {} zero values with column medians", replaced);
            Some(imputer)
        } else {
            None
        };

        let vectors = transform(&samples, variant.feature_set());
        let features = to_matrix(&vectors);
        let targets = to_targets(&vectors);

        let scaler = StandardScaler::fit(&features).context("Failed to fit scaler")?;
        let scaled = scaler.transform(&features)?;

        let (train_idx, test_idx) = split_indices(&targets, &self.config.split)?;
        let (x_train, y_train) = select(&scaled, &targets, &train_idx);
        let (x_test, y_test) = select(&scaled, &targets, &test_idx);
        info!(
            "Split: {} training, {} test samples",
            y_train.len(),
            y_test.len()
        );

        let classifier = FittedClassifier::fit(
            variant,
            x_train.view(),
            &y_train,
            &self.config.model,
            self.config.show_progress,
        )
        .with_context(|| format!("Failed to fit {} classifier", variant))?;

        let train_predictions = classifier.predict(x_train.view()).to_vec();
        let train_accuracy = accuracy(&train_predictions, &y_train);
        let test_predictions = classifier.predict(x_test.view()).to_vec();
        let test_metrics = Metrics::compute(&test_predictions, &y_test);

        let cv_scores = self.cross_validate(&x_train, &y_train);

        let model = Model::new(variant, scaler, classifier)?;
        let duration_secs = start_time.elapsed().as_secs_f64();

        Ok(TrainingResult {
            model,
            imputer,
            train_accuracy,
            test_metrics,
            cv_scores,
            duration_secs,
        })
    }

    /// Stratified k-fold accuracy of the configured classifier
    ///
    /// Scores are informational only, so folds that cannot be fitted are
    /// skipped with a warning instead of failing training.
    fn cross_validate(&self, x: &Array2<f64>, y: &[u8]) -> Vec<f64> {
        let k = self.config.cv_folds;
        if k < 2 {
            debug!("Cross-validation disabled");
            return Vec::new();
        }

        let folds = match stratified_kfold(y, k, self.config.split.seed) {
            Ok(folds) => folds,
            Err(e) => {
                warn!("Skipping cross-validation: {:#}", e);
                return Vec::new();
            }
        };

        let progress = if self.config.show_progress {
            let pb = ProgressBar::new(folds.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] fold {pos}/{len}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let mut scores = Vec::with_capacity(folds.len());
        for (fold, (train_idx, val_idx)) in folds.iter().enumerate() {
            let (x_fold, y_fold) = select(x, y, train_idx);
            let (x_val, y_val) = select(x, y, val_idx);

            let fitted = FittedClassifier::fit(
                self.config.variant,
                x_fold.view(),
                &y_fold,
                &self.config.model,
                false,
            );

            match fitted {
                Ok(classifier) => {
                    let predictions = classifier.predict(x_val.view()).to_vec();
                    let score = accuracy(&predictions, &y_val);
                    debug!("Fold {}: accuracy {:.4}", fold + 1, score);
                    scores.push(score);
                }
                Err(e) => warn!("Skipping cross-validation fold {}: {:#}", fold + 1, e),
            }

            if let Some(pb) = &progress {
                pb.inc(1);
            }
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        if scores.len() < folds.len() {
            warn!(
                "Cross-validation used {} of {} folds",
                scores.len(),
                folds.len()
            );
        }

        scores
    }
}

fn select(x: &Array2<f64>, y: &[u8], rows: &[usize]) -> (Array2<f64>, Vec<u8>) {
    (x.select(Axis(0), rows), rows.iter().map(|&r| y[r]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::feature_engineering::build_features;
    use crate::data::{RawSample, GLUCOSE};
    use crate::model::{ModelConfig, ModelVariant};
    use crate::training::test_support::synthetic_samples;

    fn config(variant: ModelVariant) -> TrainingConfig {
        TrainingConfig {
            variant,
            cv_folds: 3,
            show_progress: false,
            model: ModelConfig::small(),
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_basic_training() {
        let samples = synthetic_samples(120, 1);
        let result = Trainer::new(config(ModelVariant::Basic)).train(&samples).unwrap();

        assert_eq!(result.model.variant(), ModelVariant::Basic);
        assert_eq!(result.model.scaler().n_features(), 8);
        assert!(result.imputer.is_none());
        assert_eq!(result.test_metrics.samples, 24);
        assert!(result.test_metrics.accuracy > 0.8);
        assert_eq!(result.cv_scores.len(), 3);
    }

    #[test]
    fn test_enhanced_training() {
        let mut samples = synthetic_samples(120, 2);
        samples[0].sample.insulin = 0.0;
        samples[1].sample.glucose = 0.0;

        let result = Trainer::new(config(ModelVariant::Enhanced)).train(&samples).unwrap();

        assert_eq!(result.model.scaler().n_features(), 12);
        let imputer = result.imputer.as_ref().unwrap();
        assert!(imputer.median_for(GLUCOSE).unwrap() > 0.0);
        assert!(result.train_accuracy > 0.8);
        assert!(result.cv_summary().is_some());
        assert_eq!(result.model.classifier().name(), "soft_voting_ensemble");
    }

    #[test]
    fn test_scaler_uses_full_matrix() {
        let samples = synthetic_samples(60, 3);
        let mut cfg = config(ModelVariant::Basic);
        cfg.cv_folds = 0;
        let result = Trainer::new(cfg).train(&samples).unwrap();

        let glucose_mean = samples.iter().map(|s| s.sample.glucose).sum::<f64>() / 60.0;
        assert!((result.model.scaler().means[GLUCOSE] - glucose_mean).abs() < 1e-9);
        assert!(result.cv_scores.is_empty());
    }

    #[test]
    fn test_training_is_deterministic() {
        let samples = synthetic_samples(90, 4);
        let a = Trainer::new(config(ModelVariant::Enhanced)).train(&samples).unwrap();
        let b = Trainer::new(config(ModelVariant::Enhanced)).train(&samples).unwrap();

        let probe = RawSample {
            pregnancies: 1.0,
            glucose: 140.0,
            blood_pressure: 72.0,
            skin_thickness: 30.0,
            insulin: 120.0,
            bmi: 31.0,
            diabetes_pedigree: 0.4,
            age: 40.0,
        };
        assert_eq!(a.model.score(&probe).unwrap(), b.model.score(&probe).unwrap());
        assert_eq!(a.cv_scores, b.cv_scores);
        assert_eq!(build_features(&probe, ModelVariant::Enhanced.feature_set()).len(), 12);
    }

    #[test]
    fn test_unfittable_cv_fold_is_skipped() {
        let mut samples = synthetic_samples(30, 5);
        for (i, s) in samples.iter_mut().enumerate() {
            s.outcome = u8::from(i == 0);
        }
        let mut cfg = config(ModelVariant::Basic);
        cfg.cv_folds = 5;

        let result = Trainer::new(cfg).train(&samples).unwrap();

        assert_eq!(result.test_metrics.samples, 6);
        assert!(result.cv_scores.len() < 5);
    }

    #[test]
    fn test_empty_dataset_is_fatal() {
        assert!(Trainer::new(config(ModelVariant::Basic)).train(&[]).is_err());
    }
}
