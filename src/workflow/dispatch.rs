//! Hand-off from the entry guard to the coordinator
//!
//! Dispatch returns as soon as the workflow is queued; it never waits for the
//! workflow itself.

use super::WorkflowCoordinator;
use crate::error::{KeeperError, KeeperResult};
use crate::jobs::types::OrchestrateJob;
use crate::models::WorkflowRequest;
use apalis::prelude::*;
use apalis_redis::RedisStorage;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait WorkflowDispatcher: Send + Sync {
    async fn dispatch(&self, request: WorkflowRequest) -> KeeperResult<()>;
}

/// Pushes an [`OrchestrateJob`] onto the shared Redis queue for any worker to pick up
#[derive(Clone)]
pub struct QueueDispatcher {
    storage: RedisStorage<OrchestrateJob>,
}

impl QueueDispatcher {
    pub fn new(storage: RedisStorage<OrchestrateJob>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl WorkflowDispatcher for QueueDispatcher {
    async fn dispatch(&self, request: WorkflowRequest) -> KeeperResult<()> {
        let symbol = request.symbol.clone();
        let mut storage = self.storage.clone();
        storage
            .push(OrchestrateJob::from(request))
            .await
            .map_err(|e| KeeperError::Queue(format!("Failed to enqueue OrchestrateJob: {}", e)))?;
        debug!(symbol = %symbol, "QueueDispatcher: enqueued OrchestrateJob for {}", symbol);
        Ok(())
    }
}

/// Runs the coordinator on a background task in this process
#[derive(Clone)]
pub struct LocalDispatcher {
    coordinator: Arc<WorkflowCoordinator>,
}

impl LocalDispatcher {
    pub fn new(coordinator: Arc<WorkflowCoordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl WorkflowDispatcher for LocalDispatcher {
    async fn dispatch(&self, request: WorkflowRequest) -> KeeperResult<()> {
        let coordinator = self.coordinator.clone();
        tokio::spawn(async move {
            coordinator.orchestrate(&request).await;
        });
        Ok(())
    }
}
