//! Entry guard: the single admission point for starting an update workflow
//!
//! Every trigger (scheduler, manual user, WebSocket client) goes through
//! [`EntryGuard::request_update`], which takes the symbol's run lock before
//! handing the workflow off. Duplicate concurrent runs are refused with
//! [`UpdateStatus::SkippedLocked`].

use crate::config::RunLockConfig;
use crate::error::{KeeperError, KeeperResult};
use crate::lock::{run_lock_key, LockManager};
use crate::metrics::Metrics;
use crate::models::{LifecycleEvent, UpdateStatus, WorkflowRequest};
use crate::notify::{notify, Notifier};
use crate::workflow::WorkflowDispatcher;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct EntryGuard {
    locks: LockManager,
    dispatcher: Arc<dyn WorkflowDispatcher>,
    notifier: Arc<dyn Notifier>,
    run_lock: RunLockConfig,
    metrics: Option<Arc<Metrics>>,
}

impl EntryGuard {
    pub fn new(
        locks: LockManager,
        dispatcher: Arc<dyn WorkflowDispatcher>,
        notifier: Arc<dyn Notifier>,
        run_lock: RunLockConfig,
    ) -> Self {
        Self {
            locks,
            dispatcher,
            notifier,
            run_lock,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Try to start a workflow for `symbol`. Returns as soon as the lock
    /// outcome is known; the workflow itself runs asynchronously.
    pub async fn request_update(
        &self,
        symbol: &str,
        triggered_by: &str,
    ) -> KeeperResult<UpdateStatus> {
        info!(symbol = %symbol, triggered_by = %triggered_by, "Attempting to start workflow for {}", symbol);
        let key = run_lock_key(symbol);

        let acquired = match tokio::time::timeout(
            self.run_lock.acquire_timeout,
            self.locks.acquire(&key, triggered_by, self.run_lock.ttl),
        )
        .await
        {
            Ok(acquired) => acquired?,
            Err(_) => {
                error!(
                    symbol = %symbol,
                    timeout = ?self.run_lock.acquire_timeout,
                    "Timed out waiting for the run lock of {}",
                    symbol
                );
                self.discard_unconfirmed_lock(&key, triggered_by).await;
                return Err(KeeperError::Timeout(self.run_lock.acquire_timeout));
            }
        };

        if !acquired {
            info!(symbol = %symbol, "Lock for {} is already held, skipping", symbol);
            if let Some(ref metrics) = self.metrics {
                metrics.workflows_skipped_total.inc();
            }
            notify(self.notifier.as_ref(), symbol, LifecycleEvent::Pending).await;
            return Ok(UpdateStatus::SkippedLocked);
        }

        info!(symbol = %symbol, "Lock acquired for {}, starting the orchestrator", symbol);
        // announce before dispatch so a fast workflow cannot complete ahead of it
        notify(self.notifier.as_ref(), symbol, LifecycleEvent::Accepted).await;
        if let Err(e) = self
            .dispatcher
            .dispatch(WorkflowRequest::new(symbol, triggered_by))
            .await
        {
            error!(symbol = %symbol, error = %e, "Dispatch failed for {}, releasing run lock", symbol);
            if let Err(release_err) = self.locks.release(&key).await {
                error!(symbol = %symbol, error = %release_err, "Failed to release run lock after dispatch failure");
            }
            notify(
                self.notifier.as_ref(),
                symbol,
                LifecycleEvent::Failed {
                    reason: format!("Error starting task: {}", e),
                },
            )
            .await;
            return Err(e);
        }

        if let Some(ref metrics) = self.metrics {
            metrics.workflows_started_total.inc();
        }
        Ok(UpdateStatus::Started)
    }

    /// The store may have created the lock even though its reply never arrived.
    /// Nobody will run a workflow for it, so drop it if it carries our identity.
    async fn discard_unconfirmed_lock(&self, key: &str, triggered_by: &str) {
        let cleanup = tokio::time::timeout(
            self.run_lock.acquire_timeout,
            self.locks.release_if_held_by(key, triggered_by),
        )
        .await;
        match cleanup {
            Ok(Ok(true)) => warn!(key = %key, "Released run lock created after the acquire timeout"),
            Ok(Ok(false)) => {}
            Ok(Err(e)) => error!(key = %key, error = %e, "Failed to clean up run lock after timeout"),
            Err(_) => error!(key = %key, "Run lock cleanup timed out, it will expire on its TTL"),
        }
    }
}
