//! Job context for dependency injection

use crate::workflow::WorkflowCoordinator;
use std::sync::Arc;

/// Context passed to job handlers via Apalis Data<T> pattern
///
/// Holds no lock or counter state: everything the coordinator needs is re-read
/// from the shared store on every job.
pub struct JobContext {
    pub coordinator: Arc<WorkflowCoordinator>,
}

impl JobContext {
    pub fn new(coordinator: Arc<WorkflowCoordinator>) -> Self {
        Self { coordinator }
    }
}
