pub mod predictor;

use crate::data::RawSample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use predictor::{predict, validate, PredictionError};

/// Predicted risk class
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Outcome {
    /// Class 0, low risk
    NonDiabetic,
    /// Class 1, high risk
    Diabetic,
}

impl Outcome {
    pub fn from_label(label: u8) -> Self {
        if label == 1 {
            Outcome::Diabetic
        } else {
            Outcome::NonDiabetic
        }
    }

    pub fn label(&self) -> u8 {
        match self {
            Outcome::NonDiabetic => 0,
            Outcome::Diabetic => 1,
        }
    }

    /// Get outcome as display string
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::NonDiabetic => "Non-Diabetic",
            Outcome::Diabetic => "Diabetic",
        }
    }

    pub fn risk_level(&self) -> &'static str {
        match self {
            Outcome::NonDiabetic => "Low Risk",
            Outcome::Diabetic => "High Risk",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Probability of each class
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ClassProbabilities {
    pub non_diabetic: f64,
    pub diabetic: f64,
}

impl ClassProbabilities {
    pub fn from_pair(p: [f64; 2]) -> Self {
        Self {
            non_diabetic: p[0],
            diabetic: p[1],
        }
    }

    /// Larger of the two probabilities as a percentage
    pub fn confidence(&self) -> f64 {
        self.non_diabetic.max(self.diabetic) * 100.0
    }
}

/// Result of one successful inference
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    pub outcome: Outcome,
    /// Percentage in [0, 100]; absent for models without probabilities
    pub confidence: Option<f64>,
    pub probabilities: Option<ClassProbabilities>,
}

/// One history entry; never modified once created
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionRecord {
    pub input: RawSample,
    pub prediction: Prediction,
    pub timestamp: DateTime<Utc>,
}

impl PredictionRecord {
    pub fn new(input: RawSample, prediction: Prediction) -> Self {
        Self {
            input,
            prediction,
            timestamp: Utc::now(),
        }
    }

    pub fn outcome(&self) -> Outcome {
        self.prediction.outcome
    }
}

impl fmt::Display for PredictionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {} ({})",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.input,
            self.prediction.outcome,
            self.prediction.outcome.risk_level()
        )?;
        if let Some(confidence) = self.prediction.confidence {
            write!(f, " | {:.2}%", confidence)?;
        }
        Ok(())
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Prediction: {} ({})", self.outcome, self.outcome.risk_level())?;
        if let Some(confidence) = self.confidence {
            writeln!(f, "Confidence: {:.2}%", confidence)?;
        }
        if let Some(p) = self.probabilities {
            writeln!(f, "  Non-Diabetic: {:.2}%", p.non_diabetic * 100.0)?;
            writeln!(f, "  Diabetic:     {:.2}%", p.diabetic * 100.0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::from_label(0), Outcome::NonDiabetic);
        assert_eq!(Outcome::from_label(1), Outcome::Diabetic);
        assert_eq!(Outcome::Diabetic.label(), 1);
        assert_eq!(Outcome::NonDiabetic.to_string(), "Non-Diabetic");
        assert_eq!(Outcome::Diabetic.risk_level(), "High Risk");
    }

    #[test]
    fn test_confidence() {
        let p = ClassProbabilities::from_pair([0.2, 0.8]);
        assert!((p.confidence() - 80.0).abs() < 1e-9);

        let even = ClassProbabilities::from_pair([0.5, 0.5]);
        assert!((even.confidence() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_record_display() {
        let sample = RawSample::from_slice(&[2.0, 130.0, 80.0, 25.0, 100.0, 28.5, 0.5, 35.0]).unwrap();
        let record = PredictionRecord::new(
            sample,
            Prediction {
                outcome: Outcome::Diabetic,
                confidence: Some(72.5),
                probabilities: Some(ClassProbabilities::from_pair([0.275, 0.725])),
            },
        );

        let line = record.to_string();
        assert!(line.contains("[2, 130, 80, 25, 100, 28.5, 0.50, 35]"));
        assert!(line.contains("Diabetic (High Risk)"));
        assert!(line.contains("72.50%"));
    }

    #[test]
    fn test_record_without_confidence() {
        let record = PredictionRecord::new(
            RawSample::default(),
            Prediction {
                outcome: Outcome::NonDiabetic,
                confidence: None,
                probabilities: None,
            },
        );
        assert!(!record.to_string().contains('%'));
        assert_eq!(record.outcome(), Outcome::NonDiabetic);
    }
}
