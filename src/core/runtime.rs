//! Apalis worker setup for workflow jobs

use crate::jobs::context::JobContext;
use crate::jobs::handlers;
use crate::jobs::types::OrchestrateJob;
use apalis::prelude::*;
use apalis_redis::RedisStorage;
use std::sync::Arc;
use tracing::info;

/// Configuration for the job runtime
#[derive(Clone)]
pub struct RuntimeConfig {
    pub symbols: Vec<String>,
    pub concurrency: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["BTC".to_string()],
            concurrency: 1,
        }
    }
}

/// Workflow runtime that sets up Apalis workers consuming [`OrchestrateJob`]
pub struct WorkflowRuntime {
    config: RuntimeConfig,
    job_context: Arc<JobContext>,
    storage: RedisStorage<OrchestrateJob>,
}

impl WorkflowRuntime {
    pub fn new(
        config: RuntimeConfig,
        job_context: Arc<JobContext>,
        storage: RedisStorage<OrchestrateJob>,
    ) -> Self {
        Self {
            config,
            job_context,
            storage,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.config.concurrency.max(1)
    }

    /// Start one queue consumer per concurrency slot and return handles for shutdown
    pub async fn start_workers(
        &self,
    ) -> Result<Vec<tokio::task::JoinHandle<()>>, Box<dyn std::error::Error + Send + Sync>> {
        let mut handles = Vec::new();

        info!(
            concurrency = self.concurrency(),
            symbols = ?self.config.symbols,
            "WorkflowRuntime: starting Apalis workers with concurrency {}",
            self.concurrency()
        );

        for index in 0..self.concurrency() {
            let storage = self.storage.clone();
            let job_context = self.job_context.clone();
            let handle = tokio::spawn(async move {
                let worker = WorkerBuilder::new(format!("orchestrate-worker-{}", index))
                    .data(job_context)
                    .backend(storage)
                    .build_fn(handlers::handle_orchestrate);

                info!(index, "WorkflowRuntime: OrchestrateJob worker started");
                worker.run().await;
            });
            handles.push(handle);
        }

        info!("WorkflowRuntime: all workers started");
        Ok(handles)
    }
}
