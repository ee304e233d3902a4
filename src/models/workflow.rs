//! Workflow request and fan-out result types

use super::training::CatchUpReport;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a model family refreshed per symbol (e.g. `binary`, `percentage`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelType(String);

impl ModelType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Request to refresh one symbol, carried through the task queue only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRequest {
    pub symbol: String,
    pub triggered_by: String,
}

impl WorkflowRequest {
    pub fn new(symbol: impl Into<String>, triggered_by: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            triggered_by: triggered_by.into(),
        }
    }
}

/// Synchronous answer of the entry guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    Started,
    SkippedLocked,
}

impl UpdateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateStatus::Started => "started",
            UpdateStatus::SkippedLocked => "skipped_locked",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubtaskOutcome {
    Success { report: CatchUpReport },
    Failed { reason: String },
}

/// Terminal result of one fan-out subtask, kept at its launch position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskResult {
    pub model_type: ModelType,
    #[serde(flatten)]
    pub outcome: SubtaskOutcome,
}

impl SubtaskResult {
    pub fn success(model_type: ModelType, report: CatchUpReport) -> Self {
        Self {
            model_type,
            outcome: SubtaskOutcome::Success { report },
        }
    }

    pub fn failed(model_type: ModelType, reason: impl Into<String>) -> Self {
        Self {
            model_type,
            outcome: SubtaskOutcome::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, SubtaskOutcome::Success { .. })
    }
}
