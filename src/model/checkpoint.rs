use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::model::metrics::Metrics;
use crate::model::{Model, ModelVariant};

/// Descriptive fields stored next to the fitted model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Crate version that wrote the file
    pub version: String,
    pub variant: ModelVariant,
    /// Feature names in model input order
    pub feature_names: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Held-out test metrics from training, if known
    pub test_metrics: Option<Metrics>,
    /// Mean cross-validation accuracy, if computed
    pub cv_accuracy: Option<f64>,
}

impl ModelMetadata {
    pub fn for_model(model: &Model, test_metrics: Option<Metrics>, cv_accuracy: Option<f64>) -> Self {
        Self {
            version: crate::VERSION.to_string(),
            variant: model.variant(),
            feature_names: model
                .feature_set()
                .names()
                .into_iter()
                .map(String::from)
                .collect(),
            created_at: Utc::now(),
            test_metrics,
            cv_accuracy,
        }
    }
}

/// A model and its metadata as written to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    pub metadata: ModelMetadata,
    pub model: Model,
}

/// Save a trained model as JSON
pub fn save_model<P: AsRef<Path>>(path: P, model: &Model, metadata: &ModelMetadata) -> Result<()> {
    let path = path.as_ref();

    crate::utils::ensure_parent_dir(path)?;

    #[derive(Serialize)]
    struct BundleRef<'a> {
        metadata: &'a ModelMetadata,
        model: &'a Model,
    }

    let json = serde_json::to_string_pretty(&BundleRef { metadata, model })
        .context("Failed to serialize model")?;
    fs::write(path, json).with_context(|| format!("Failed to write model file {:?}", path))?;

    info!("Saved {} model to {:?}", model.variant(), path);
    Ok(())
}

/// Load a model saved by [`save_model`]
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<ModelBundle> {
    let path = path.as_ref();
    info!("Loading model from {:?}", path);

    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read model file {:?}", path))?;
    let bundle: ModelBundle = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse model file {:?}", path))?;

    if bundle.metadata.variant != bundle.model.variant() {
        bail!(
            "Model file {:?} is inconsistent: metadata says {}, model is {}",
            path,
            bundle.metadata.variant,
            bundle.model.variant()
        );
    }
    let expected: Vec<&str> = bundle.model.feature_set().names();
    if bundle.metadata.feature_names != expected {
        bail!("Model file {:?} lists unexpected feature names", path);
    }
    if bundle.metadata.version != crate::VERSION {
        warn!(
            "Model was written by version {}, running {}",
            bundle.metadata.version,
            crate::VERSION
        );
    }

    info!(
        "Loaded {} model created {}",
        bundle.metadata.variant,
        bundle.metadata.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::preprocessing::StandardScaler;
    use crate::data::RawSample;
    use crate::model::test_support::blobs;
    use crate::model::{FittedClassifier, ModelConfig};
    use tempfile::TempDir;

    fn basic_model() -> Model {
        let (x, y) = blobs(30, 8, 4.0, 7);
        let scaler = StandardScaler::fit(&x).unwrap();
        let scaled = scaler.transform(&x).unwrap();
        let classifier =
            FittedClassifier::fit(ModelVariant::Basic, scaled.view(), &y, &ModelConfig::default(), false).unwrap();
        Model::new(ModelVariant::Basic, scaler, classifier).unwrap()
    }

    #[test]
    fn test_model_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("models").join("basic.json");

        let model = basic_model();
        let metadata = ModelMetadata::for_model(&model, None, Some(0.9));
        save_model(&path, &model, &metadata).unwrap();
        assert!(path.exists());

        let bundle = load_model(&path).unwrap();
        assert_eq!(bundle.metadata.variant, ModelVariant::Basic);
        assert_eq!(bundle.metadata.feature_names.len(), 8);
        assert_eq!(bundle.metadata.cv_accuracy, Some(0.9));

        let sample = RawSample {
            glucose: 1.0,
            bmi: 2.0,
            ..RawSample::default()
        };
        assert_eq!(
            model.score(&sample).unwrap(),
            bundle.model.score(&sample).unwrap()
        );
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_model(temp_dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn test_load_rejects_mismatched_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model.json");

        let model = basic_model();
        let mut metadata = ModelMetadata::for_model(&model, None, None);
        metadata.variant = ModelVariant::Enhanced;
        save_model(&path, &model, &metadata).unwrap();

        assert!(load_model(&path).is_err());
    }
}
