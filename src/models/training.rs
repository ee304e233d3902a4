//! Training bookkeeping for one (symbol, model type) pair

use super::workflow::ModelType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One batch of newly available data points returned by the fetch collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Increment {
    pub count: u64,
    pub latest_timestamp: Option<DateTime<Utc>>,
}

/// Snapshot of the persisted training state, re-read from the store on every use
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingState {
    pub symbol: String,
    pub model_type: ModelType,
    pub processed_count: i64,
    pub last_training_time: Option<DateTime<Utc>>,
}

impl TrainingState {
    /// Retrain is due once enough points accumulated and the cooldown, measured
    /// in data-time against `latest_data`, has passed.
    pub fn retrain_due(
        &self,
        latest_data: Option<DateTime<Utc>>,
        threshold: i64,
        cooldown: Duration,
    ) -> bool {
        if self.processed_count < threshold {
            return false;
        }
        let Some(last) = self.last_training_time else {
            return true;
        };
        let Some(latest) = latest_data else {
            return false;
        };
        match (latest - last).to_std() {
            Ok(elapsed) => elapsed >= cooldown,
            Err(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrainOutcome {
    NotDue,
    Retrained,
    /// The training lock stayed busy for the whole bounded wait
    LockUnavailable,
}

/// What a catch-up run accomplished
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatchUpReport {
    pub processed: u64,
    pub batches: u32,
    pub retrains: u32,
    /// Outcome of the last retrain evaluation in this run
    pub last_retrain: RetrainOutcome,
}

impl Default for CatchUpReport {
    fn default() -> Self {
        Self {
            processed: 0,
            batches: 0,
            retrains: 0,
            last_retrain: RetrainOutcome::NotDue,
        }
    }
}
