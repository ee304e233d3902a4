//! Unit tests for settings defaults

use modelkeeper::config::{RunLockConfig, Settings, TrainingConfig};
use modelkeeper::models::ModelType;
use std::time::Duration;

#[test]
fn settings_default_matches_documented_values() {
    let settings = Settings::default();
    assert_eq!(settings.environment, "sandbox");
    assert_eq!(settings.port, 8080);
    assert_eq!(settings.symbols, vec!["BTC", "ETH", "LTC"]);
    assert_eq!(
        settings.model_types,
        vec![ModelType::new("binary"), ModelType::new("percentage")]
    );
    assert_eq!(settings.worker_concurrency, 3);
    assert_eq!(settings.scheduler_tick, Duration::from_secs(60));
    assert!(settings.sync_service_url.is_none());
    assert_eq!(settings.http_timeout, Duration::from_secs(30));
    assert!(!settings.is_production());
}

#[test]
fn training_config_default() {
    let config = TrainingConfig::default();
    assert_eq!(config.retrain_threshold, 36);
    assert_eq!(config.retrain_interval, Duration::from_secs(3 * 3600));
    assert_eq!(config.lock_ttl, Duration::from_secs(600));
    assert_eq!(config.lock_wait_timeout, Duration::from_secs(300));
    assert_eq!(config.lock_poll_interval, Duration::from_secs(5));
}

#[test]
fn run_lock_renewal_is_off_by_default() {
    let config = RunLockConfig::default();
    assert_eq!(config.ttl, Duration::from_secs(7200));
    assert!(config.renew_every.is_none());
    assert_eq!(config.max_hold, config.ttl);
    assert_eq!(config.acquire_timeout, Duration::from_secs(10));
}

#[test]
fn production_aliases_are_recognized() {
    let mut settings = Settings::default();
    settings.environment = "prod".to_string();
    assert!(settings.is_production());
    settings.environment = "production".to_string();
    assert!(settings.is_production());
}
