//! Classification metrics over binary labels

use serde::{Deserialize, Serialize};
use std::fmt;

/// Counts of the four prediction outcomes (class 1 is positive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl ConfusionMatrix {
    pub fn from_labels(predictions: &[u8], targets: &[u8]) -> Self {
        let mut cm = Self::default();
        for (&p, &t) in predictions.iter().zip(targets) {
            match (p == 1, t == 1) {
                (true, true) => cm.true_positives += 1,
                (true, false) => cm.false_positives += 1,
                (false, false) => cm.true_negatives += 1,
                (false, true) => cm.false_negatives += 1,
            }
        }
        cm
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "              pred 0  pred 1")?;
        writeln!(f, "  actual 0  {:>7} {:>7}", self.true_negatives, self.false_positives)?;
        write!(f, "  actual 1  {:>7} {:>7}", self.false_negatives, self.true_positives)
    }
}

/// Compute accuracy
pub fn accuracy(predictions: &[u8], targets: &[u8]) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }
    let correct = predictions.iter().zip(targets).filter(|(p, t)| p == t).count();
    correct as f64 / targets.len() as f64
}

/// Compute precision
pub fn precision(predictions: &[u8], targets: &[u8]) -> f64 {
    let cm = ConfusionMatrix::from_labels(predictions, targets);
    let predicted_positives = cm.true_positives + cm.false_positives;
    if predicted_positives > 0 {
        cm.true_positives as f64 / predicted_positives as f64
    } else {
        0.0
    }
}

/// Compute recall
pub fn recall(predictions: &[u8], targets: &[u8]) -> f64 {
    let cm = ConfusionMatrix::from_labels(predictions, targets);
    let actual_positives = cm.true_positives + cm.false_negatives;
    if actual_positives > 0 {
        cm.true_positives as f64 / actual_positives as f64
    } else {
        0.0
    }
}

/// Compute F1 score
pub fn f1_score(predictions: &[u8], targets: &[u8]) -> f64 {
    let p = precision(predictions, targets);
    let r = recall(predictions, targets);
    if p + r > 0.0 {
        2.0 * p * r / (p + r)
    } else {
        0.0
    }
}

/// Evaluation metrics for one labeled set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Metrics {
    /// Number of samples scored
    pub samples: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub confusion: ConfusionMatrix,
}

impl Metrics {
    pub fn compute(predictions: &[u8], targets: &[u8]) -> Self {
        Self {
            samples: targets.len(),
            accuracy: accuracy(predictions, targets),
            precision: precision(predictions, targets),
            recall: recall(predictions, targets),
            f1: f1_score(predictions, targets),
            confusion: ConfusionMatrix::from_labels(predictions, targets),
        }
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "accuracy {:.4}, precision {:.4}, recall {:.4}, F1 {:.4} ({} samples)",
            self.accuracy, self.precision, self.recall, self.f1, self.samples
        )
    }
}
