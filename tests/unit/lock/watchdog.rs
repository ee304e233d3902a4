//! Unit tests for run-lock renewal

use modelkeeper::lock::{LockManager, LockWatchdog};
use modelkeeper::store::MemoryStore;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn watchdog_keeps_the_lock_alive_until_stopped() {
    let locks = LockManager::new(Arc::new(MemoryStore::new()));
    let ttl = Duration::from_secs(10);
    locks.acquire("lock:stock:BTC", "scheduler", ttl).await.unwrap();

    let watchdog = LockWatchdog::spawn(
        locks.clone(),
        "lock:stock:BTC".to_string(),
        "scheduler".to_string(),
        ttl,
        Duration::from_secs(4),
        Duration::from_secs(3600),
    );

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(
        locks.holder("lock:stock:BTC").await.unwrap().as_deref(),
        Some("scheduler")
    );

    watchdog.stop().await;
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert!(locks.holder("lock:stock:BTC").await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn watchdog_never_recreates_a_released_lock() {
    let locks = LockManager::new(Arc::new(MemoryStore::new()));
    let ttl = Duration::from_secs(10);
    locks.acquire("lock:stock:ETH", "scheduler", ttl).await.unwrap();

    let watchdog = LockWatchdog::spawn(
        locks.clone(),
        "lock:stock:ETH".to_string(),
        "scheduler".to_string(),
        ttl,
        Duration::from_secs(2),
        Duration::from_secs(3600),
    );
    locks.release("lock:stock:ETH").await.unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(locks.holder("lock:stock:ETH").await.unwrap().is_none());
    watchdog.stop().await;
}

#[tokio::test(start_paused = true)]
async fn watchdog_gives_up_after_the_maximum_hold() {
    let locks = LockManager::new(Arc::new(MemoryStore::new()));
    let ttl = Duration::from_secs(60);
    locks.acquire("lock:stock:LTC", "scheduler", ttl).await.unwrap();

    let watchdog = LockWatchdog::spawn(
        locks.clone(),
        "lock:stock:LTC".to_string(),
        "scheduler".to_string(),
        ttl,
        Duration::from_secs(20),
        Duration::from_secs(120),
    );

    tokio::time::sleep(Duration::from_secs(100)).await;
    assert_eq!(
        locks.holder("lock:stock:LTC").await.unwrap().as_deref(),
        Some("scheduler")
    );

    // at most one more renewal at 120s, so the key is gone by 180s
    tokio::time::sleep(Duration::from_secs(90)).await;
    assert!(locks.holder("lock:stock:LTC").await.unwrap().is_none());
    watchdog.stop().await;
}
