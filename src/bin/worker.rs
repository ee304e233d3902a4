//! Modelkeeper Worker
//!
//! Consumes workflow jobs from the Redis queue and runs the polling scheduler.
//! Can be run as several instances; the per-symbol run lock keeps workflows
//! for one symbol from overlapping.

use apalis_redis::RedisStorage;
use dotenvy::dotenv;
use modelkeeper::config::Settings;
use modelkeeper::core::runtime::{RuntimeConfig, WorkflowRuntime};
use modelkeeper::core::scheduler::{MetaScheduler, SchedulerTick};
use modelkeeper::guard::EntryGuard;
use modelkeeper::jobs::context::JobContext;
use modelkeeper::jobs::types::OrchestrateJob;
use modelkeeper::lock::LockManager;
use modelkeeper::logging;
use modelkeeper::metrics::Metrics;
use modelkeeper::notify::RedisPublisher;
use modelkeeper::pipeline::CatchUpPipeline;
use modelkeeper::schedule::ScheduleRepository;
use modelkeeper::services::{DataSync, HttpDataSync, HttpModelService, NoopDataSync};
use modelkeeper::store::{KeyValueStore, RedisStore};
use modelkeeper::workflow::{QueueDispatcher, WorkflowCoordinator};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    logging::init_logging();

    let settings = Settings::from_env();
    info!("Starting Modelkeeper Worker");
    info!(environment = %settings.environment, "Environment");
    info!(
        symbols = ?settings.symbols,
        model_types = ?settings.model_types,
        concurrency = settings.worker_concurrency,
        "Worker configuration"
    );

    let metrics = Arc::new(Metrics::new()?);

    info!("Initializing Redis connection...");
    let store: Arc<dyn KeyValueStore> = Arc::new(
        RedisStore::connect(&settings.redis_url)
            .await
            .map_err(|e| format!("Redis connection required for worker: {}", e))?,
    );
    let locks = LockManager::new(store.clone());
    let publisher = Arc::new(RedisPublisher::connect(&settings.redis_url).await?);

    let mut pipelines: Vec<Arc<CatchUpPipeline>> = Vec::with_capacity(settings.model_types.len());
    for model_type in &settings.model_types {
        let service = Arc::new(HttpModelService::new(
            settings.model_service_url.clone(),
            model_type.clone(),
            settings.http_timeout,
        )?);
        pipelines.push(Arc::new(
            CatchUpPipeline::new(service, store.clone(), settings.training.clone())
                .with_metrics(metrics.clone()),
        ));
    }

    let sync: Arc<dyn DataSync> = match settings.sync_service_url {
        Some(ref url) => Arc::new(HttpDataSync::new(url.clone(), settings.http_timeout)?),
        None => {
            warn!("SYNC_SERVICE_URL not set, downstream sync is a no-op");
            Arc::new(NoopDataSync)
        }
    };

    let coordinator = Arc::new(
        WorkflowCoordinator::new(
            pipelines,
            locks.clone(),
            sync,
            publisher.clone(),
            settings.run_lock.clone(),
        )
        .with_metrics(metrics.clone()),
    );

    info!("Initializing Apalis Redis storage...");
    let conn = apalis_redis::connect(settings.redis_url.clone()).await?;
    let storage: RedisStorage<OrchestrateJob> = RedisStorage::new(conn);
    info!("Apalis Redis storage initialized");

    let job_context = Arc::new(JobContext::new(coordinator));
    let runtime = WorkflowRuntime::new(
        RuntimeConfig {
            symbols: settings.symbols.clone(),
            concurrency: settings.worker_concurrency,
        },
        job_context,
        storage.clone(),
    );
    let worker_handles = runtime
        .start_workers()
        .await
        .map_err(|e| format!("Failed to start workers: {}", e))?;

    let guard = Arc::new(
        EntryGuard::new(
            locks,
            Arc::new(QueueDispatcher::new(storage)),
            publisher,
            settings.run_lock.clone(),
        )
        .with_metrics(metrics.clone()),
    );

    let tick_seconds = settings.scheduler_tick.as_secs();
    let scheduler = if tick_seconds == 0 {
        warn!("SCHEDULER_TICK_SECONDS is 0, scheduler disabled");
        None
    } else {
        info!("Starting meta scheduler...");
        let tick = SchedulerTick::new(guard, ScheduleRepository::new(store), settings.symbols.clone())
            .with_metrics(metrics.clone());
        let scheduler = MetaScheduler::new(tick, tick_seconds)
            .map_err(|e| format!("Failed to create scheduler: {}", e))?;
        scheduler
            .start()
            .await
            .map_err(|e| format!("Failed to start scheduler: {}", e))?;
        Some(scheduler)
    };

    info!("Worker started, waiting for shutdown signal...");
    signal::ctrl_c().await?;
    info!("Shutting down worker...");
    if let Some(scheduler) = scheduler {
        scheduler.stop().await;
    }
    for handle in worker_handles {
        handle.abort();
    }
    info!("Worker stopped");

    Ok(())
}
