//! Error taxonomy for the coordination core
//!
//! Lock contention and training-lock wait exhaustion are ordinary outcomes and are
//! returned as values, never as errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeeperError {
    /// Shared key-value store failure
    #[error("Store error: {0}")]
    Store(String),

    /// A fetch / predict / train collaborator call failed
    #[error("Upstream {stage} failed: {reason}")]
    Upstream { stage: &'static str, reason: String },

    /// Post-workflow data synchronization failed
    #[error("Synchronization failed: {0}")]
    Sync(String),

    /// Handing a workflow to the task queue failed
    #[error("Queue error: {0}")]
    Queue(String),

    /// Rejected admin input
    #[error("{0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl KeeperError {
    pub fn upstream(stage: &'static str, reason: impl ToString) -> Self {
        Self::Upstream {
            stage,
            reason: reason.to_string(),
        }
    }
}

impl From<redis::RedisError> for KeeperError {
    fn from(e: redis::RedisError) -> Self {
        Self::Store(e.to_string())
    }
}

pub type KeeperResult<T> = Result<T, KeeperError>;
