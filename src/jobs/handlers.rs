//! Job handlers for the update workflow

use crate::jobs::context::JobContext;
use crate::jobs::types::OrchestrateJob;
use crate::models::WorkflowRequest;
use apalis::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Handler for the orchestration job
///
/// Always succeeds from the queue's point of view. Subtask and sync failures are
/// handled by finalize, which also releases the run lock; a queue-level retry
/// would run the workflow again without holding that lock.
pub async fn handle_orchestrate(
    job: OrchestrateJob,
    ctx: Data<Arc<JobContext>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let start = Instant::now();
    debug!(symbol = %job.symbol, triggered_by = %job.triggered_by, "OrchestrateJob: received for {}", job.symbol);

    let request = WorkflowRequest::from(job);
    let results = ctx.coordinator.orchestrate(&request).await;

    let succeeded = results.iter().filter(|r| r.is_success()).count();
    info!(
        symbol = %request.symbol,
        succeeded,
        total = results.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "OrchestrateJob: workflow for {} finished ({}/{} subtasks succeeded)",
        request.symbol,
        succeeded,
        results.len()
    );
    Ok(())
}
