//! Test utilities for API server integration tests

use crate::common_fakes::RecordingDispatcher;
use axum_test::TestServer;
use modelkeeper::config::RunLockConfig;
use modelkeeper::core::http::{create_router, AppState, HealthStatus};
use modelkeeper::guard::EntryGuard;
use modelkeeper::lock::LockManager;
use modelkeeper::metrics::Metrics;
use modelkeeper::notify::RoomHub;
use modelkeeper::schedule::ScheduleRepository;
use modelkeeper::store::MemoryStore;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Test helper for API server integration tests
///
/// Lifecycle events go straight to the in-process room hub instead of Redis
/// pub/sub; workflows are recorded, never run.
#[allow(dead_code)]
pub struct TestApiServer {
    pub server: TestServer,
    pub metrics: Arc<Metrics>,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub locks: LockManager,
    pub hub: Arc<RoomHub>,
}

impl TestApiServer {
    pub async fn new() -> Self {
        Self::build(false).await
    }

    /// Real HTTP transport, needed for WebSocket upgrades
    pub async fn with_http_transport() -> Self {
        Self::build(true).await
    }

    async fn build(http_transport: bool) -> Self {
        let metrics = Arc::new(Metrics::new().expect("metrics initialization"));
        let store = Arc::new(MemoryStore::new());
        let locks = LockManager::new(store.clone());
        let hub = Arc::new(RoomHub::new());
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let guard = Arc::new(EntryGuard::new(
            locks.clone(),
            dispatcher.clone(),
            hub.clone(),
            RunLockConfig::default(),
        ));

        let state = AppState {
            health: Arc::new(RwLock::new(HealthStatus::default())),
            metrics: metrics.clone(),
            start_time: Arc::new(Instant::now()),
            guard,
            schedules: ScheduleRepository::new(store),
            locks: locks.clone(),
            hub: hub.clone(),
        };

        let app = create_router(state);
        let server = if http_transport {
            TestServer::builder()
                .http_transport()
                .build(app)
                .expect("start test server")
        } else {
            TestServer::new(app).expect("start test server")
        };

        Self {
            server,
            metrics,
            dispatcher,
            locks,
            hub,
        }
    }
}
