//! Job types carried by the task queue

use crate::models::WorkflowRequest;
use serde::{Deserialize, Serialize};

/// Run the fan-out/fan-in workflow for a symbol whose run lock is already held
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrateJob {
    pub symbol: String,
    pub triggered_by: String,
}

impl From<WorkflowRequest> for OrchestrateJob {
    fn from(request: WorkflowRequest) -> Self {
        Self {
            symbol: request.symbol,
            triggered_by: request.triggered_by,
        }
    }
}

impl From<OrchestrateJob> for WorkflowRequest {
    fn from(job: OrchestrateJob) -> Self {
        WorkflowRequest::new(job.symbol, job.triggered_by)
    }
}
