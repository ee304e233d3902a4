//! Environment-driven configuration
//!
//! Every setting has a default so a bare `cargo run --bin worker` against a local
//! Redis works. Values are read once at startup into [`Settings`] and passed down.

use crate::models::ModelType;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Deployment environment name (`production`, `sandbox`, ...)
pub fn get_environment() -> String {
    env::var("ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string())
}

/// Redis URL shared by the lock store, the job queue and event pub/sub
pub fn get_redis_url() -> String {
    env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/".to_string())
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(variable = name, value = %raw, "Unparsable value for {}, using default", name);
                default
            }
        },
        Err(_) => default,
    }
}

fn env_list(name: &str, default: &str) -> Vec<String> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Lock and catch-up tuning for one model type's retrain step
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Processed points required before a retrain is considered
    pub retrain_threshold: i64,
    /// Minimum data-time between two retrains of the same model
    pub retrain_interval: Duration,
    pub lock_ttl: Duration,
    pub lock_wait_timeout: Duration,
    pub lock_poll_interval: Duration,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            retrain_threshold: 36,
            retrain_interval: Duration::from_secs(3 * 60 * 60),
            lock_ttl: Duration::from_secs(10 * 60),
            lock_wait_timeout: Duration::from_secs(5 * 60),
            lock_poll_interval: Duration::from_secs(5),
        }
    }
}

/// Run-lock tuning for the whole per-symbol workflow
#[derive(Debug, Clone)]
pub struct RunLockConfig {
    pub ttl: Duration,
    /// Watchdog renewal period; `None` disables renewal
    pub renew_every: Option<Duration>,
    /// Renewal stops once a workflow has held the lock this long
    pub max_hold: Duration,
    /// Bound on waiting for the acquisition result at the entry guard
    pub acquire_timeout: Duration,
}

impl Default for RunLockConfig {
    fn default() -> Self {
        let ttl = Duration::from_secs(2 * 60 * 60);
        Self {
            ttl,
            renew_every: None,
            max_hold: ttl,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: String,
    pub redis_url: String,
    pub port: u16,
    pub symbols: Vec<String>,
    pub model_types: Vec<ModelType>,
    pub model_service_url: String,
    pub sync_service_url: Option<String>,
    /// Per-request timeout for the model and sync collaborators
    pub http_timeout: Duration,
    pub run_lock: RunLockConfig,
    pub training: TrainingConfig,
    /// Scheduler period; zero disables the scheduler
    pub scheduler_tick: Duration,
    pub worker_concurrency: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let symbols: Vec<String> = vec!["BTC".into(), "ETH".into(), "LTC".into()];
        Self {
            environment: "sandbox".to_string(),
            redis_url: "redis://127.0.0.1:6379/".to_string(),
            port: 8080,
            worker_concurrency: symbols.len(),
            symbols,
            model_types: vec![ModelType::new("binary"), ModelType::new("percentage")],
            model_service_url: "http://127.0.0.1:5001".to_string(),
            sync_service_url: None,
            http_timeout: Duration::from_secs(30),
            run_lock: RunLockConfig::default(),
            training: TrainingConfig::default(),
            scheduler_tick: Duration::from_secs(60),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let symbols: Vec<String> = env_list("SYMBOLS", "BTC,ETH,LTC")
            .into_iter()
            .map(|s| s.to_uppercase())
            .collect();
        let model_types = env_list("MODEL_TYPES", "binary,percentage")
            .into_iter()
            .map(ModelType::new)
            .collect();

        let renew_secs: u64 = env_or("RUN_LOCK_RENEW_SECONDS", 0);
        let run_lock_ttl: u64 = env_or("RUN_LOCK_TTL_SECONDS", defaults.run_lock.ttl.as_secs());
        let run_lock = RunLockConfig {
            ttl: Duration::from_secs(run_lock_ttl),
            renew_every: (renew_secs > 0).then(|| Duration::from_secs(renew_secs)),
            max_hold: Duration::from_secs(env_or("RUN_LOCK_MAX_HOLD_SECONDS", run_lock_ttl)),
            acquire_timeout: Duration::from_secs(env_or(
                "ENTRY_GUARD_TIMEOUT_SECONDS",
                defaults.run_lock.acquire_timeout.as_secs(),
            )),
        };

        let training = TrainingConfig {
            retrain_threshold: env_or("RETRAIN_THRESHOLD", defaults.training.retrain_threshold),
            retrain_interval: Duration::from_secs(env_or(
                "RETRAIN_INTERVAL_SECONDS",
                defaults.training.retrain_interval.as_secs(),
            )),
            lock_ttl: Duration::from_secs(env_or(
                "TRAIN_LOCK_TTL_SECONDS",
                defaults.training.lock_ttl.as_secs(),
            )),
            lock_wait_timeout: Duration::from_secs(env_or(
                "TRAIN_LOCK_WAIT_SECONDS",
                defaults.training.lock_wait_timeout.as_secs(),
            )),
            lock_poll_interval: Duration::from_secs(env_or(
                "TRAIN_LOCK_POLL_SECONDS",
                defaults.training.lock_poll_interval.as_secs(),
            )),
        };

        let worker_concurrency = env_or("WORKER_CONCURRENCY", symbols.len().max(1));

        Self {
            environment: get_environment(),
            redis_url: get_redis_url(),
            port: env_or("PORT", defaults.port),
            symbols,
            model_types,
            model_service_url: env::var("MODEL_SERVICE_URL")
                .unwrap_or(defaults.model_service_url),
            sync_service_url: env::var("SYNC_SERVICE_URL").ok().filter(|s| !s.is_empty()),
            http_timeout: Duration::from_secs(env_or(
                "HTTP_TIMEOUT_SECONDS",
                defaults.http_timeout.as_secs(),
            )),
            run_lock,
            training,
            scheduler_tick: Duration::from_secs(env_or(
                "SCHEDULER_TICK_SECONDS",
                defaults.scheduler_tick.as_secs(),
            )),
            worker_concurrency,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment.as_str(), "production" | "prod")
    }
}
