//! Single-sample inference
//!
//! Validation happens before any feature is built, so a rejected sample
//! never reaches the scaler or the classifier.

use crate::data::{RawSample, RAW_FEATURE_NAMES};
use crate::model::{Model, ModelVariant};
use crate::predict::{ClassProbabilities, Outcome, Prediction};
use thiserror::Error;
use tracing::debug;

/// Why a sample could not be classified
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PredictionError {
    #[error("{field} must be a finite number")]
    NonFinite { field: &'static str },

    #[error("{field} cannot be negative (got {value})")]
    Negative { field: &'static str, value: f64 },

    #[error("{field} cannot be zero for this model; please enter a measured value")]
    ZeroValue { field: &'static str },

    #[error("Model failed to score the sample: {0}")]
    Model(String),
}

/// Check a sample against the rules of the model variant
pub fn validate(sample: &RawSample, variant: ModelVariant) -> Result<(), PredictionError> {
    let values = sample.to_array();

    for (idx, &value) in values.iter().enumerate() {
        let field = RAW_FEATURE_NAMES[idx];
        if !value.is_finite() {
            return Err(PredictionError::NonFinite { field });
        }
        if value < 0.0 {
            return Err(PredictionError::Negative { field, value });
        }
    }

    for &idx in variant.nonzero_columns() {
        if values[idx] == 0.0 {
            return Err(PredictionError::ZeroValue {
                field: RAW_FEATURE_NAMES[idx],
            });
        }
    }

    Ok(())
}

/// Validate, featurize, scale and classify one sample
pub fn predict(model: &Model, sample: &RawSample) -> Result<Prediction, PredictionError> {
    validate(sample, model.variant())?;

    let scores = model
        .score(sample)
        .map_err(|e| PredictionError::Model(format!("{:#}", e)))?;

    let probabilities = scores.probabilities.map(ClassProbabilities::from_pair);
    let prediction = Prediction {
        outcome: Outcome::from_label(scores.label),
        confidence: probabilities.map(|p| p.confidence()),
        probabilities,
    };

    debug!(
        "Predicted {} for {} (confidence {:?})",
        prediction.outcome, sample, prediction.confidence
    );
    Ok(prediction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{BLOOD_PRESSURE, BMI, GLUCOSE, INSULIN, SKIN_THICKNESS};

    fn sample() -> RawSample {
        RawSample::from_slice(&[2.0, 130.0, 80.0, 25.0, 100.0, 28.5, 0.5, 35.0]).unwrap()
    }

    #[test]
    fn test_valid_sample_passes_both_variants() {
        assert!(validate(&sample(), ModelVariant::Basic).is_ok());
        assert!(validate(&sample(), ModelVariant::Enhanced).is_ok());
    }

    #[test]
    fn test_enhanced_rejects_zero_measurements() {
        for (idx, name) in [(GLUCOSE, "Glucose"), (BLOOD_PRESSURE, "BloodPressure"), (BMI, "BMI")] {
            let mut s = sample();
            s.set(idx, 0.0);
            assert_eq!(
                validate(&s, ModelVariant::Enhanced),
                Err(PredictionError::ZeroValue { field: name })
            );
            assert!(validate(&s, ModelVariant::Basic).is_ok());
        }
    }

    #[test]
    fn test_zero_insulin_and_skin_are_allowed() {
        let mut s = sample();
        s.set(INSULIN, 0.0);
        s.set(SKIN_THICKNESS, 0.0);
        assert!(validate(&s, ModelVariant::Enhanced).is_ok());
    }

    #[test]
    fn test_rejects_negative_and_non_finite() {
        let mut s = sample();
        s.age = -1.0;
        assert!(matches!(
            validate(&s, ModelVariant::Basic),
            Err(PredictionError::Negative { field: "Age", .. })
        ));

        let mut s = sample();
        s.bmi = f64::NAN;
        assert_eq!(
            validate(&s, ModelVariant::Basic),
            Err(PredictionError::NonFinite { field: "BMI" })
        );
    }

    #[test]
    fn test_error_messages() {
        let err = PredictionError::ZeroValue { field: "Glucose" };
        assert!(err.to_string().starts_with("Glucose cannot be zero"));
    }
}
