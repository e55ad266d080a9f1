//! Per-session prediction history
//!
//! A [`Session`] borrows the trained [`Model`] and owns its own history.
//! Only successful predictions are recorded.

use crate::data::RawSample;
use crate::model::Model;
use crate::predict::{predict, PredictionError, PredictionRecord};
use tracing::info;

/// Append-only list of prediction records in insertion order
#[derive(Debug, Clone, Default)]
pub struct PredictionHistory {
    records: Vec<PredictionRecord>,
}

impl PredictionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: PredictionRecord) {
        self.records.push(record);
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &PredictionRecord> {
        self.records.iter()
    }

    /// Most recent first, for display
    pub fn newest_first(&self) -> impl Iterator<Item = &PredictionRecord> {
        self.records.iter().rev()
    }
}

/// One user's interaction with a trained model
pub struct Session<'m> {
    model: &'m Model,
    history: PredictionHistory,
}

impl<'m> Session<'m> {
    pub fn new(model: &'m Model) -> Self {
        Self {
            model,
            history: PredictionHistory::new(),
        }
    }

    pub fn model(&self) -> &Model {
        self.model
    }

    /// Predict and record; a rejected sample leaves the history untouched
    pub fn submit(&mut self, sample: RawSample) -> Result<PredictionRecord, PredictionError> {
        let prediction = predict(self.model, &sample)?;
        let record = PredictionRecord::new(sample, prediction);
        self.history.append(record.clone());
        Ok(record)
    }

    pub fn clear_history(&mut self) {
        info!("Clearing {} history entries", self.history.len());
        self.history.clear();
    }

    pub fn history(&self) -> &PredictionHistory {
        &self.history
    }
}
