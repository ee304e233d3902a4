//! Workflow coordinator
//!
//! Invoked only while the symbol's run lock is held. Fans out one catch-up
//! pipeline per model type, waits for every one to reach a terminal state, then
//! finalizes: downstream sync, lifecycle event, and release of the run lock.
//! Finalize is the only place the run lock is released.

use crate::config::RunLockConfig;
use crate::error::KeeperError;
use crate::lock::{run_lock_key, LockManager, LockWatchdog};
use crate::metrics::Metrics;
use crate::models::{LifecycleEvent, SubtaskResult, WorkflowRequest};
use crate::notify::{notify, Notifier};
use crate::pipeline::CatchUpPipeline;
use crate::services::DataSync;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::join::join_then;

pub struct WorkflowCoordinator {
    pipelines: Vec<Arc<CatchUpPipeline>>,
    locks: LockManager,
    sync: Arc<dyn DataSync>,
    notifier: Arc<dyn Notifier>,
    run_lock: RunLockConfig,
    metrics: Option<Arc<Metrics>>,
}

impl WorkflowCoordinator {
    /// `pipelines` are launched in the given order; results keep that order.
    pub fn new(
        pipelines: Vec<Arc<CatchUpPipeline>>,
        locks: LockManager,
        sync: Arc<dyn DataSync>,
        notifier: Arc<dyn Notifier>,
        run_lock: RunLockConfig,
    ) -> Self {
        Self {
            pipelines,
            locks,
            sync,
            notifier,
            run_lock,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run the whole workflow for `request.symbol` and return the ordered subtask results.
    pub async fn orchestrate(&self, request: &WorkflowRequest) -> Vec<SubtaskResult> {
        let symbol = request.symbol.clone();
        info!(
            symbol = %symbol,
            triggered_by = %request.triggered_by,
            subtasks = self.pipelines.len(),
            "Orchestrator: starting parallel update for {}",
            symbol
        );

        let watchdog = self.run_lock.renew_every.map(|every| {
            LockWatchdog::spawn(
                self.locks.clone(),
                run_lock_key(&symbol),
                request.triggered_by.clone(),
                self.run_lock.ttl,
                every,
                self.run_lock.max_hold,
            )
        });

        let units = self
            .pipelines
            .iter()
            .map(|pipeline| {
                let pipeline = pipeline.clone();
                let symbol = symbol.clone();
                async move {
                    let model_type = pipeline.model_type().clone();
                    match pipeline.run(&symbol).await {
                        Ok(report) => SubtaskResult::success(model_type, report),
                        Err(e) => SubtaskResult::failed(model_type, e.to_string()),
                    }
                }
            })
            .collect::<Vec<_>>();
        let model_types: Vec<_> = self
            .pipelines
            .iter()
            .map(|p| p.model_type().clone())
            .collect();

        join_then(units, |joined| async move {
            let results: Vec<SubtaskResult> = joined
                .into_iter()
                .zip(model_types)
                .map(|(outcome, model_type)| {
                    outcome.unwrap_or_else(|failure| SubtaskResult::failed(model_type, failure.to_string()))
                })
                .collect();

            if let Some(watchdog) = watchdog {
                watchdog.stop().await;
            }
            self.finalize(&symbol, &results).await;
            results
        })
        .await
    }

    /// Sync, notify, and release the run lock on every exit path.
    ///
    /// Returns whether synchronization succeeded.
    pub async fn finalize(&self, symbol: &str, results: &[SubtaskResult]) -> bool {
        let failed = results.iter().filter(|r| !r.is_success()).count();
        info!(
            symbol = %symbol,
            subtasks = results.len(),
            failed,
            results = ?results,
            "Finalize: model updates for {} complete",
            symbol
        );
        if failed > 0 {
            warn!(symbol = %symbol, failed, "Finalize: {} subtask(s) failed for {}", failed, symbol);
            if let Some(ref metrics) = self.metrics {
                metrics.subtasks_failed_total.inc_by(failed as u64);
            }
        }

        let synced = AssertUnwindSafe(self.sync.sync(symbol))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(KeeperError::Sync("sync panicked".to_string())));

        let success = match synced {
            Ok(()) => {
                notify(self.notifier.as_ref(), symbol, LifecycleEvent::Complete).await;
                if let Some(ref metrics) = self.metrics {
                    metrics.workflows_completed_total.inc();
                }
                true
            }
            Err(e) => {
                error!(symbol = %symbol, error = %e, "Finalize: final sync failed for {}", symbol);
                notify(
                    self.notifier.as_ref(),
                    symbol,
                    LifecycleEvent::Failed {
                        reason: format!("Final sync failed: {}", e),
                    },
                )
                .await;
                if let Some(ref metrics) = self.metrics {
                    metrics.workflows_failed_total.inc();
                }
                false
            }
        };

        let key = run_lock_key(symbol);
        match self.locks.release(&key).await {
            Ok(()) => info!(symbol = %symbol, "Finalize: released lock for {}", symbol),
            Err(e) => error!(
                symbol = %symbol,
                error = %e,
                "Finalize: failed to release run lock, it will expire after its TTL"
            ),
        }
        success
    }
}
