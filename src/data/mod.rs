pub mod loader;
pub mod preprocessing;
pub mod feature_engineering;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Number of raw clinical measurements
pub const NUM_RAW_FEATURES: usize = 8;

/// Number of engineered features (enhanced feature set only)
pub const NUM_ENGINEERED_FEATURES: usize = 4;

/// Total number of features in the enhanced feature set
pub const TOTAL_FEATURES: usize = NUM_RAW_FEATURES + NUM_ENGINEERED_FEATURES;

/// Column names of the raw measurements, in feature order
pub const RAW_FEATURE_NAMES: [&str; NUM_RAW_FEATURES] = [
    "Pregnancies",
    "Glucose",
    "BloodPressure",
    "SkinThickness",
    "Insulin",
    "BMI",
    "DiabetesPedigreeFunction",
    "Age",
];

/// Names of the engineered features, in feature order
pub const ENGINEERED_FEATURE_NAMES: [&str; NUM_ENGINEERED_FEATURES] = [
    "BMI_Age",
    "Glucose_BMI",
    "Insulin_Glucose",
    "BP_Age",
];

/// Name of the label column
pub const TARGET_COLUMN: &str = "Outcome";

pub const PREGNANCIES: usize = 0;
pub const GLUCOSE: usize = 1;
pub const BLOOD_PRESSURE: usize = 2;
pub const SKIN_THICKNESS: usize = 3;
pub const INSULIN: usize = 4;
pub const BMI: usize = 5;
pub const DIABETES_PEDIGREE: usize = 6;
pub const AGE: usize = 7;

/// Columns where a zero means "not measured" in the training data
pub const ZERO_AS_MISSING: [usize; 5] = [GLUCOSE, BLOOD_PRESSURE, SKIN_THICKNESS, INSULIN, BMI];

/// Columns that may never be zero at prediction time (enhanced variant)
pub const NONZERO_AT_INFERENCE: [usize; 3] = [GLUCOSE, BLOOD_PRESSURE, BMI];

/// One patient's eight raw measurements
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct RawSample {
    /// Number of pregnancies
    pub pregnancies: f64,
    /// Plasma glucose concentration (mg/dL)
    pub glucose: f64,
    /// Diastolic blood pressure (mm Hg)
    pub blood_pressure: f64,
    /// Triceps skin fold thickness (mm)
    pub skin_thickness: f64,
    /// 2-hour serum insulin (mu U/ml)
    pub insulin: f64,
    /// Body mass index
    pub bmi: f64,
    /// Diabetes pedigree function
    pub diabetes_pedigree: f64,
    /// Age in years
    pub age: f64,
}

impl RawSample {
    /// Measurements in feature order
    pub fn to_array(&self) -> [f64; NUM_RAW_FEATURES] {
        [
            self.pregnancies,
            self.glucose,
            self.blood_pressure,
            self.skin_thickness,
            self.insulin,
            self.bmi,
            self.diabetes_pedigree,
            self.age,
        ]
    }

    /// Build a sample from values in feature order
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        if values.len() != NUM_RAW_FEATURES {
            bail!(
                "Expected {} measurements, got {}",
                NUM_RAW_FEATURES,
                values.len()
            );
        }

        Ok(Self {
            pregnancies: values[PREGNANCIES],
            glucose: values[GLUCOSE],
            blood_pressure: values[BLOOD_PRESSURE],
            skin_thickness: values[SKIN_THICKNESS],
            insulin: values[INSULIN],
            bmi: values[BMI],
            diabetes_pedigree: values[DIABETES_PEDIGREE],
            age: values[AGE],
        })
    }

    /// Get measurement by feature index
    pub fn get(&self, index: usize) -> Option<f64> {
        self.to_array().get(index).copied()
    }

    /// Replace measurement at feature index
    pub fn set(&mut self, index: usize, value: f64) {
        match index {
            PREGNANCIES => self.pregnancies = value,
            GLUCOSE => self.glucose = value,
            BLOOD_PRESSURE => self.blood_pressure = value,
            SKIN_THICKNESS => self.skin_thickness = value,
            INSULIN => self.insulin = value,
            BMI => self.bmi = value,
            DIABETES_PEDIGREE => self.diabetes_pedigree = value,
            AGE => self.age = value,
            _ => {}
        }
    }
}

impl std::fmt::Display for RawSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = FIELD_SPECS
            .iter()
            .zip(self.to_array())
            .map(|(spec, value)| spec.format(value))
            .collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Raw sample with its known outcome
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabeledSample {
    pub sample: RawSample,
    /// 1 = diabetic, 0 = non-diabetic
    pub outcome: u8,
}

/// Input constraints of a single form field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    /// Column name in the dataset
    pub name: &'static str,
    /// Prompt shown to the user
    pub label: &'static str,
    /// Typical range shown next to the prompt
    pub hint: &'static str,
    pub min: f64,
    pub max: f64,
    /// Decimal places accepted and displayed (0 = integer field)
    pub decimals: usize,
}

impl FieldSpec {
    /// Whether the field only accepts whole numbers
    pub fn is_integer(&self) -> bool {
        self.decimals == 0
    }

    /// Parse and range-check user input
    pub fn parse(&self, input: &str) -> Result<f64> {
        let input = input.trim();
        let value: f64 = match input.parse() {
            Ok(v) => v,
            Err(_) => bail!("{}: '{}' is not a number", self.name, input),
        };

        if !value.is_finite() {
            bail!("{}: value must be finite", self.name);
        }
        if self.is_integer() && value.fract() != 0.0 {
            bail!("{}: expected a whole number, got {}", self.name, input);
        }

        crate::utils::validation::in_range(value, self.min, self.max, self.name)?;

        let scale = 10f64.powi(self.decimals as i32);
        Ok((value * scale).round() / scale)
    }

    /// Format a value with the field's precision
    pub fn format(&self, value: f64) -> String {
        format!("{:.*}", self.decimals, value)
    }
}

/// Form fields in feature order
pub const FIELD_SPECS: [FieldSpec; NUM_RAW_FEATURES] = [
    FieldSpec {
        name: "Pregnancies",
        label: "Pregnancies",
        hint: "e.g., 0 - 17",
        min: 0.0,
        max: 20.0,
        decimals: 0,
    },
    FieldSpec {
        name: "Glucose",
        label: "Glucose Level (mg/dL)",
        hint: "e.g., 70 - 200",
        min: 0.0,
        max: 300.0,
        decimals: 0,
    },
    FieldSpec {
        name: "BloodPressure",
        label: "Blood Pressure (mm Hg)",
        hint: "e.g., 60 - 120",
        min: 0.0,
        max: 200.0,
        decimals: 0,
    },
    FieldSpec {
        name: "SkinThickness",
        label: "Skin Thickness (mm)",
        hint: "e.g., 10 - 50",
        min: 0.0,
        max: 100.0,
        decimals: 0,
    },
    FieldSpec {
        name: "Insulin",
        label: "Insulin Level (mu U/ml)",
        hint: "e.g., 15 - 276",
        min: 0.0,
        max: 900.0,
        decimals: 0,
    },
    FieldSpec {
        name: "BMI",
        label: "BMI (Body Mass Index)",
        hint: "e.g., 18 - 50",
        min: 0.0,
        max: 70.0,
        decimals: 1,
    },
    FieldSpec {
        name: "DiabetesPedigreeFunction",
        label: "Diabetes Pedigree Function",
        hint: "e.g., 0.1 - 2.5",
        min: 0.0,
        max: 3.0,
        decimals: 2,
    },
    FieldSpec {
        name: "Age",
        label: "Age (years)",
        hint: "e.g., 21 - 80",
        min: 0.0,
        max: 120.0,
        decimals: 0,
    },
];

/// Feature vector ready for scaling and classification
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    /// Feature values (8 or 12 dimensions)
    pub features: Vec<f64>,
    /// Target label (if available)
    pub target: Option<u8>,
}

impl FeatureVector {
    pub fn new(features: Vec<f64>, target: Option<u8>) -> Self {
        Self { features, target }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Train/test split configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Test set ratio
    pub test_ratio: f64,
    /// Keep the class balance of both partitions equal to the full set
    pub stratify: bool,
    /// Random seed
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_ratio: 0.2,
            stratify: true,
            seed: 2,
        }
    }
}
