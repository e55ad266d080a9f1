//! # diapred: Diabetes Risk Prediction
//!
//! Predicts a binary diabetes risk label from eight clinical measurements.
//!
//! ## Features
//!
//! - Basic model: raw measurements and a linear SVM
//! - Enhanced model: zero-as-missing median imputation, four engineered
//!   features and a soft-voting ensemble with a confidence score
//! - Per-session prediction history
//! - Support for various input formats (CSV, TSV, gzipped)
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use diapred::data::loader::DataLoader;
//! use diapred::data::RawSample;
//! use diapred::session::Session;
//! use diapred::training::{Trainer, TrainingConfig};
//!
//! // Load data and train once
//! let samples = DataLoader::new().load("diabetes.csv").unwrap();
//! let result = Trainer::new(TrainingConfig::enhanced()).train(&samples).unwrap();
//!
//! // Predict and keep a history
//! let mut session = Session::new(&result.model);
//! let sample = RawSample::from_slice(&[2.0, 130.0, 80.0, 25.0, 100.0, 28.5, 0.5, 35.0]).unwrap();
//! let record = session.submit(sample).unwrap();
//! println!("{}", record.prediction);
//! ```

pub mod cli;
pub mod data;
pub mod model;
pub mod predict;
pub mod session;
pub mod training;
pub mod utils;

/// Re-export commonly used types
pub use data::loader::DataLoader;
pub use data::{LabeledSample, RawSample};
pub use model::{Model, ModelConfig, ModelVariant};
pub use predict::{Prediction, PredictionError, PredictionRecord};
pub use session::{PredictionHistory, Session};
pub use training::{Trainer, TrainingConfig, TrainingResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!(
        "{} v{} - diabetes risk prediction",
        NAME, VERSION
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_info() {
        let info_str = info();
        assert!(info_str.contains("diapred"));
        assert!(info_str.contains(VERSION));
    }

    #[test]
    fn test_model_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Model>();
    }
}
