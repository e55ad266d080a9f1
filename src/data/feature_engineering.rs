//! Feature engineering shared by training and inference
//!
//! Both the training pipeline and the predictor build feature vectors
//! through [`build_features`], so the engineered columns are always derived
//! with the same formulas and appended in the same order.

use crate::data::{
    FeatureVector, LabeledSample, RawSample, ENGINEERED_FEATURE_NAMES, NUM_ENGINEERED_FEATURES,
    NUM_RAW_FEATURES, RAW_FEATURE_NAMES, TOTAL_FEATURES,
};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Which columns make up a feature vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureSet {
    /// The 8 raw measurements
    Raw,
    /// Raw measurements followed by the 4 engineered features
    Engineered,
}

impl FeatureSet {
    /// Number of features in a vector
    pub fn len(&self) -> usize {
        match self {
            FeatureSet::Raw => NUM_RAW_FEATURES,
            FeatureSet::Engineered => TOTAL_FEATURES,
        }
    }

    /// Column names in vector order
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = RAW_FEATURE_NAMES.to_vec();
        if *self == FeatureSet::Engineered {
            names.extend_from_slice(&ENGINEERED_FEATURE_NAMES);
        }
        names
    }
}

/// Derived features, in vector order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineeredFeatures {
    pub bmi_age: f64,
    pub glucose_bmi: f64,
    pub insulin_glucose: f64,
    pub bp_age: f64,
}

impl EngineeredFeatures {
    pub fn to_array(&self) -> [f64; NUM_ENGINEERED_FEATURES] {
        [self.bmi_age, self.glucose_bmi, self.insulin_glucose, self.bp_age]
    }
}

/// Derive the engineered features of one sample
pub fn engineer(sample: &RawSample) -> EngineeredFeatures {
    EngineeredFeatures {
        bmi_age: sample.bmi * sample.age,
        glucose_bmi: sample.glucose * sample.bmi,
        // +1 keeps the ratio finite for glucose == 0
        insulin_glucose: sample.insulin / (sample.glucose + 1.0),
        bp_age: sample.blood_pressure * sample.age,
    }
}

/// Build the unscaled feature values of one sample
pub fn build_features(sample: &RawSample, feature_set: FeatureSet) -> Vec<f64> {
    let mut features = Vec::with_capacity(feature_set.len());
    features.extend_from_slice(&sample.to_array());

    if feature_set == FeatureSet::Engineered {
        features.extend_from_slice(&engineer(sample).to_array());
    }

    features
}

/// Build feature vectors for labeled samples
pub fn transform(samples: &[LabeledSample], feature_set: FeatureSet) -> Vec<FeatureVector> {
    samples
        .iter()
        .map(|s| FeatureVector::new(build_features(&s.sample, feature_set), Some(s.outcome)))
        .collect()
}

/// Stack feature vectors into a row-major matrix
pub fn to_matrix(vectors: &[FeatureVector]) -> Array2<f64> {
    let n_features = vectors.first().map_or(0, |v| v.len());
    let mut matrix = Array2::zeros((vectors.len(), n_features));

    for (mut row, vector) in matrix.rows_mut().into_iter().zip(vectors) {
        for (cell, &value) in row.iter_mut().zip(&vector.features) {
            *cell = value;
        }
    }

    matrix
}

/// Collect the labels of feature vectors (missing labels become 0)
pub fn to_targets(vectors: &[FeatureVector]) -> Vec<u8> {
    vectors.iter().map(|v| v.target.unwrap_or(0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_sample() -> RawSample {
        RawSample::from_slice(&[2.0, 130.0, 80.0, 25.0, 100.0, 28.5, 0.5, 35.0]).unwrap()
    }

    #[test]
    fn test_engineered_values() {
        let features = engineer(&example_sample());

        assert!((features.bmi_age - 997.5).abs() < 1e-9);
        assert!((features.glucose_bmi - 3705.0).abs() < 1e-9);
        assert!((features.insulin_glucose - 0.7634).abs() < 1e-4);
        assert!((features.bp_age - 2800.0).abs() < 1e-9);
    }

    #[test]
    fn test_engineered_vector_layout() {
        let sample = example_sample();
        let vector = build_features(&sample, FeatureSet::Engineered);

        assert_eq!(vector.len(), TOTAL_FEATURES);
        assert_eq!(&vector[..NUM_RAW_FEATURES], &sample.to_array());

        // Tail must follow the formulas applied to the head
        let head = &vector[..NUM_RAW_FEATURES];
        let expected = [
            head[5] * head[7],
            head[1] * head[5],
            head[4] / (head[1] + 1.0),
            head[2] * head[7],
        ];
        assert_eq!(&vector[NUM_RAW_FEATURES..], &expected);
    }

    #[test]
    fn test_raw_vector_layout() {
        let sample = example_sample();
        let vector = build_features(&sample, FeatureSet::Raw);
        assert_eq!(vector, sample.to_array().to_vec());
    }

    #[test]
    fn test_zero_glucose_ratio_is_finite() {
        let mut sample = example_sample();
        sample.glucose = 0.0;
        assert_eq!(engineer(&sample).insulin_glucose, 100.0);
    }

    #[test]
    fn test_feature_names() {
        assert_eq!(FeatureSet::Raw.names().len(), NUM_RAW_FEATURES);
        let names = FeatureSet::Engineered.names();
        assert_eq!(names.len(), TOTAL_FEATURES);
        assert_eq!(names[8], "BMI_Age");
        assert_eq!(names[11], "BP_Age");
    }

    #[test]
    fn test_to_matrix() {
        let samples = vec![
            LabeledSample { sample: example_sample(), outcome: 1 },
            LabeledSample { sample: RawSample::default(), outcome: 0 },
        ];
        let vectors = transform(&samples, FeatureSet::Engineered);
        let matrix = to_matrix(&vectors);

        assert_eq!(matrix.dim(), (2, TOTAL_FEATURES));
        assert_eq!(matrix[[0, 1]], 130.0);
        assert_eq!(to_targets(&vectors), vec![1, 0]);
    }
}
