//! HTTP endpoint server using Axum
//!
//! Health, metrics, schedule administration, manual triggers, lock inspection
//! and the per-symbol WebSocket event channel.

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Request, State,
    },
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{debug, error, info, warn, Level};

use crate::config::Settings;
use crate::error::KeeperError;
use crate::guard::EntryGuard;
use crate::jobs::types::OrchestrateJob;
use crate::lock::{run_lock_key, LockManager};
use crate::metrics::Metrics;
use crate::notify::{room_for, run_relay, RedisPublisher, RoomHub};
use crate::schedule::ScheduleRepository;
use crate::store::{KeyValueStore, RedisStore};
use crate::workflow::QueueDispatcher;

const START_UPDATE_ACTION: &str = "start_update_process";

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone)]
pub struct AppState {
    pub health: Arc<RwLock<HealthStatus>>,
    pub metrics: Arc<Metrics>,
    pub start_time: Arc<Instant>,
    pub guard: Arc<EntryGuard>,
    pub schedules: ScheduleRepository,
    pub locks: LockManager,
    pub hub: Arc<RoomHub>,
}

#[derive(Clone, Debug)]
pub struct HealthStatus {
    pub status: String,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}

type ApiError = (StatusCode, Json<Value>);

fn api_error(e: KeeperError) -> ApiError {
    let status = match e {
        KeeperError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        KeeperError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(error = %e, "Request failed");
    }
    (status, Json(json!({ "error": e.to_string() })))
}

fn manual_identity(user: &str) -> String {
    format!("manual_user_{}", user)
}

pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    let health = state.health.read().await;
    let uptime_seconds = state.start_time.elapsed().as_secs();
    Ok(Json(json!({
        "status": health.status,
        "uptime_seconds": uptime_seconds,
        "service": "modelkeeper-api"
    })))
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .export()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Middleware to track HTTP request metrics
async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    state.metrics.http_requests_in_flight.inc();
    let response = next.run(request).await;
    let status = response.status();
    let duration = start.elapsed();
    state.metrics.http_requests_in_flight.dec();

    state.metrics.http_requests_total.inc();
    state
        .metrics
        .http_request_duration_seconds
        .observe(duration.as_secs_f64());

    if status.is_server_error() {
        error!(
            method = %method,
            path = %path,
            status = %status,
            duration_ms = duration.as_millis(),
            "HTTP request error"
        );
    }

    response
}

/// Report a symbol's schedule in admin units; an absent record reads as inactive.
async fn get_schedule(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let symbol = symbol.to_uppercase();
    let record = state.schedules.get(&symbol).await.map_err(api_error)?;
    Ok(Json(match record {
        Some(record) => json!({
            "is_active": record.is_active,
            "interval": record.interval_units(),
        }),
        None => json!({ "is_active": false, "interval": 0 }),
    }))
}

async fn start_schedule(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let symbol = symbol.to_uppercase();
    let interval = body.get("interval").and_then(Value::as_i64).ok_or_else(|| {
        api_error(KeeperError::InvalidInput(
            "Invalid interval provided. Must be a positive integer.".to_string(),
        ))
    })?;

    let record = state
        .schedules
        .start(&symbol, interval)
        .await
        .map_err(api_error)?;

    Ok(Json(json!({
        "message": format!("Scheduled update started for {}", symbol),
        "interval_minutes": record.interval_minutes,
    })))
}

async fn stop_schedule(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let symbol = symbol.to_uppercase();
    state.schedules.delete(&symbol).await.map_err(api_error)?;
    Ok(Json(json!({
        "message": format!("Scheduled update stopped for {}", symbol),
    })))
}

#[derive(Debug, Default, Deserialize)]
struct TriggerRequest {
    user: Option<String>,
}

/// Manual trigger; the body is optional
async fn trigger_update(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let symbol = symbol.to_uppercase();
    let request: TriggerRequest = if body.is_empty() {
        TriggerRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| api_error(KeeperError::InvalidInput(format!("Invalid request body: {}", e))))?
    };
    let user = request.user.unwrap_or_else(|| "api".to_string());

    let status = state
        .guard
        .request_update(&symbol, &manual_identity(&user))
        .await
        .map_err(api_error)?;

    Ok(Json(json!({
        "symbol": symbol,
        "status": status.as_str(),
    })))
}

async fn inspect_lock(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let symbol = symbol.to_uppercase();
    let key = run_lock_key(&symbol);
    let holder = state.locks.holder(&key).await.map_err(api_error)?;
    Ok(Json(json!({
        "symbol": symbol,
        "key": key,
        "locked": holder.is_some(),
        "holder": holder,
    })))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> impl IntoResponse {
    let symbol = symbol.to_uppercase();
    ws.on_upgrade(move |socket| handle_socket(socket, state, symbol))
}

#[derive(Debug, Deserialize)]
struct ClientFrame {
    action: String,
}

/// Join the symbol's room, forward its events and accept trigger frames.
async fn handle_socket(socket: WebSocket, state: AppState, symbol: String) {
    let connection_id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
    let room = room_for(&symbol);
    let mut events = state.hub.subscribe(&room).await;
    let (mut sender, mut receiver) = socket.split();
    info!(symbol = %symbol, connection_id, room = %room, "WebSocket client joined room");

    let forward_room = room.clone();
    let mut forward = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(envelope) => {
                    let frame = envelope.to_frame().to_string();
                    if sender.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(room = %forward_room, skipped, "WebSocket client lagging, events dropped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let guard = state.guard.clone();
    let inbound_symbol = symbol.clone();
    let mut inbound = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            let text = match message {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };
            match serde_json::from_str::<ClientFrame>(text.as_str()) {
                Ok(frame) if frame.action == START_UPDATE_ACTION => {
                    let identity = manual_identity(&connection_id.to_string());
                    if let Err(e) = guard.request_update(&inbound_symbol, &identity).await {
                        error!(symbol = %inbound_symbol, error = %e, "WebSocket trigger failed");
                    }
                }
                Ok(frame) => debug!(action = %frame.action, "WebSocket: ignoring unknown action"),
                Err(e) => debug!(error = %e, "WebSocket: ignoring malformed frame"),
            }
        }
    });

    tokio::select! {
        _ = &mut forward => inbound.abort(),
        _ = &mut inbound => forward.abort(),
    }
    info!(symbol = %symbol, connection_id, "WebSocket client left room");
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route(
            "/schedule/{symbol}",
            get(get_schedule).post(start_schedule).delete(stop_schedule),
        )
        .route("/api/updates/{symbol}", post(trigger_update))
        .route("/api/locks/{symbol}", get(inspect_lock))
        .route("/ws/{symbol}", get(ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Keep the pub/sub relay alive, reconnecting after a short pause.
async fn relay_forever(redis_url: String, hub: Arc<RoomHub>) {
    loop {
        if let Err(e) = run_relay(&redis_url, hub.clone()).await {
            error!(error = %e, "Event relay failed");
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
}

pub async fn start_server(
    settings: Settings,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let metrics = Arc::new(Metrics::new()?);
    let start_time = Arc::new(Instant::now());

    let store: Arc<dyn KeyValueStore> = Arc::new(RedisStore::connect(&settings.redis_url).await?);
    let locks = LockManager::new(store.clone());
    let schedules = ScheduleRepository::new(store);
    info!("Redis connected for API server");

    let conn = apalis_redis::connect(settings.redis_url.clone()).await?;
    let storage = apalis_redis::RedisStorage::<OrchestrateJob>::new(conn);
    let dispatcher = Arc::new(QueueDispatcher::new(storage));
    let publisher = Arc::new(RedisPublisher::connect(&settings.redis_url).await?);

    let guard = Arc::new(
        EntryGuard::new(locks.clone(), dispatcher, publisher, settings.run_lock.clone())
            .with_metrics(metrics.clone()),
    );

    let hub = Arc::new(RoomHub::new());
    tokio::spawn(relay_forever(settings.redis_url.clone(), hub.clone()));

    let state = AppState {
        health: Arc::new(RwLock::new(HealthStatus::default())),
        metrics,
        start_time,
        guard,
        schedules,
        locks,
        hub,
    };
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", settings.port)).await?;

    info!(port = settings.port, "HTTP server listening on port {}", settings.port);
    info!(
        "Metrics endpoint available at http://0.0.0.0:{}/metrics",
        settings.port
    );
    axum::serve(listener, app).await?;

    Ok(())
}
