//! Catch-up pipeline
//!
//! Fetches increments until the symbol is caught up, predicting on each batch
//! and bumping the persisted processed counter. Once the counter reaches the
//! threshold and the data-time cooldown has passed, the shared training lock for
//! the model type is taken with a bounded wait and the model is retrained.

use crate::config::TrainingConfig;
use crate::error::{KeeperError, KeeperResult};
use crate::lock::{training_lock_key, LockManager};
use crate::metrics::Metrics;
use crate::models::schedule::parse_timestamp;
use crate::models::{CatchUpReport, ModelType, RetrainOutcome, TrainingState};
use crate::services::ModelService;
use crate::store::KeyValueStore;
use chrono::{DateTime, SecondsFormat, Utc};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub fn processed_count_key(model_type: &ModelType, symbol: &str) -> String {
    format!("intervals_processed:{}:{}", model_type, symbol)
}

pub fn last_training_key(model_type: &ModelType, symbol: &str) -> String {
    format!("last_training_time:{}:{}", model_type, symbol)
}

pub struct CatchUpPipeline {
    service: Arc<dyn ModelService>,
    store: Arc<dyn KeyValueStore>,
    locks: LockManager,
    config: TrainingConfig,
    metrics: Option<Arc<Metrics>>,
}

impl CatchUpPipeline {
    pub fn new(
        service: Arc<dyn ModelService>,
        store: Arc<dyn KeyValueStore>,
        config: TrainingConfig,
    ) -> Self {
        Self {
            locks: LockManager::new(store.clone()),
            service,
            store,
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn model_type(&self) -> &ModelType {
        self.service.model_type()
    }

    /// Current persisted state for `symbol`, always re-read from the store
    pub async fn training_state(&self, symbol: &str) -> KeeperResult<TrainingState> {
        let model_type = self.model_type();
        let processed_count = self
            .store
            .get(&processed_count_key(model_type, symbol))
            .await?
            .map(|v| {
                v.parse::<i64>()
                    .map_err(|_| KeeperError::Store(format!("corrupt processed counter: {}", v)))
            })
            .transpose()?
            .unwrap_or(0);
        let last_training_time = self
            .store
            .get(&last_training_key(model_type, symbol))
            .await?
            .and_then(|v| parse_timestamp(&v));

        Ok(TrainingState {
            symbol: symbol.to_string(),
            model_type: model_type.clone(),
            processed_count,
            last_training_time,
        })
    }

    /// Process every available increment for `symbol`.
    ///
    /// An upstream failure aborts the run and is returned; the training lock is
    /// never left held.
    pub async fn run(&self, symbol: &str) -> KeeperResult<CatchUpReport> {
        let model_type = self.model_type().clone();
        let counter_key = processed_count_key(&model_type, symbol);
        let mut report = CatchUpReport::default();
        let mut latest_processed: Option<DateTime<Utc>> = None;

        info!(symbol = %symbol, model = %model_type, "CatchUp: starting for {}", symbol);

        loop {
            let Some(increment) = self.service.fetch_next_increment(symbol).await? else {
                break;
            };
            if increment.count == 0 {
                break;
            }
            if let Some(ts) = increment.latest_timestamp {
                latest_processed = Some(ts);
            }

            self.service.predict(symbol, &increment).await?;
            report.processed += increment.count;
            report.batches += 1;

            let processed_count = self
                .store
                .incr_by(&counter_key, increment.count as i64)
                .await?;

            let mut state = self.training_state(symbol).await?;
            state.processed_count = processed_count;
            if !state.retrain_due(
                latest_processed,
                self.config.retrain_threshold,
                self.config.retrain_interval,
            ) {
                continue;
            }

            debug!(
                symbol = %symbol,
                model = %model_type,
                processed_count,
                "CatchUp: retrain due"
            );
            report.last_retrain = self
                .retrain_exclusive(symbol, latest_processed, report.processed)
                .await?;
            if report.last_retrain == RetrainOutcome::Retrained {
                report.retrains += 1;
            }
        }

        info!(
            symbol = %symbol,
            model = %model_type,
            processed = report.processed,
            retrains = report.retrains,
            "CatchUp: {} is up to date ({} new points)",
            symbol,
            report.processed
        );
        Ok(report)
    }

    /// Take the shared training lock with a bounded wait, retrain, and always release.
    async fn retrain_exclusive(
        &self,
        symbol: &str,
        latest_processed: Option<DateTime<Utc>>,
        points_this_run: u64,
    ) -> KeeperResult<RetrainOutcome> {
        let model_type = self.model_type();
        let key = training_lock_key(model_type);
        let holder = format!("worker_for_{}_{}", model_type, symbol);

        let acquired = self
            .locks
            .acquire_with_deadline(
                &key,
                &holder,
                self.config.lock_ttl,
                self.config.lock_wait_timeout,
                self.config.lock_poll_interval,
            )
            .await?;

        if !acquired {
            warn!(
                symbol = %symbol,
                model = %model_type,
                "CatchUp: training lock busy for {:?}, skipping retrain this run",
                self.config.lock_wait_timeout
            );
            if let Some(ref metrics) = self.metrics {
                metrics.training_lock_timeouts_total.inc();
            }
            return Ok(RetrainOutcome::LockUnavailable);
        }

        let outcome = AssertUnwindSafe(self.retrain_locked(symbol, latest_processed, points_this_run))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(KeeperError::upstream("train", "retrain panicked")));

        if let Err(e) = self.locks.release(&key).await {
            error!(key = %key, error = %e, "CatchUp: failed to release training lock, TTL will expire it");
        }

        outcome?;
        if let Some(ref metrics) = self.metrics {
            metrics.retrains_total.inc();
        }
        Ok(RetrainOutcome::Retrained)
    }

    async fn retrain_locked(
        &self,
        symbol: &str,
        latest_processed: Option<DateTime<Utc>>,
        points_this_run: u64,
    ) -> KeeperResult<()> {
        let model_type = self.model_type();
        info!(symbol = %symbol, model = %model_type, "CatchUp: retraining {} model for {}", model_type, symbol);

        self.service.retrain(symbol, points_this_run).await?;

        if let Some(ts) = latest_processed {
            self.store
                .set(
                    &last_training_key(model_type, symbol),
                    &ts.to_rfc3339_opts(SecondsFormat::Secs, true),
                )
                .await?;
        }
        self.store
            .set(&processed_count_key(model_type, symbol), "0")
            .await
    }
}
