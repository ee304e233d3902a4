//! In-process stand-ins for the external collaborators

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use modelkeeper::error::{KeeperError, KeeperResult};
use modelkeeper::lock::{run_lock_key, LockManager};
use modelkeeper::models::{Increment, ModelType, WorkflowRequest};
use modelkeeper::notify::{EventEnvelope, Notifier};
use modelkeeper::services::{DataSync, ModelService};
use modelkeeper::store::{KeyValueStore, MemoryStore};
use modelkeeper::workflow::WorkflowDispatcher;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn ts(raw: &str) -> DateTime<Utc> {
    raw.parse().expect("valid RFC 3339 timestamp")
}

pub fn batch(count: u64, latest: &str) -> Result<Option<Increment>, String> {
    Ok(Some(Increment {
        count,
        latest_timestamp: Some(ts(latest)),
    }))
}

/// Tracks how many retrains overlap, across every service sharing it
#[derive(Default)]
pub struct RetrainTracker {
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl RetrainTracker {
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

/// Model service replaying a fixed list of fetch results
pub struct ScriptedModelService {
    model_type: ModelType,
    batches: Mutex<VecDeque<Result<Option<Increment>, String>>>,
    fetch_delay: Duration,
    retrain_delay: Duration,
    fail_retrain: bool,
    panic_on_fetch: bool,
    tracker: Arc<RetrainTracker>,
    pub predictions: AtomicUsize,
    pub retrains: Mutex<Vec<(String, u64)>>,
}

impl ScriptedModelService {
    pub fn new(model_type: &str) -> Self {
        Self {
            model_type: ModelType::new(model_type),
            batches: Mutex::new(VecDeque::new()),
            fetch_delay: Duration::ZERO,
            retrain_delay: Duration::ZERO,
            fail_retrain: false,
            panic_on_fetch: false,
            tracker: Arc::new(RetrainTracker::default()),
            predictions: AtomicUsize::new(0),
            retrains: Mutex::new(Vec::new()),
        }
    }

    pub fn with_batches(self, batches: Vec<Result<Option<Increment>, String>>) -> Self {
        *self.batches.lock().unwrap() = batches.into();
        self
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    pub fn with_retrain_delay(mut self, delay: Duration) -> Self {
        self.retrain_delay = delay;
        self
    }

    pub fn failing_retrain(mut self) -> Self {
        self.fail_retrain = true;
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panic_on_fetch = true;
        self
    }

    pub fn with_tracker(mut self, tracker: Arc<RetrainTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn retrain_count(&self) -> usize {
        self.retrains.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelService for ScriptedModelService {
    fn model_type(&self) -> &ModelType {
        &self.model_type
    }

    async fn fetch_next_increment(&self, _symbol: &str) -> KeeperResult<Option<Increment>> {
        if self.panic_on_fetch {
            panic!("fetch exploded");
        }
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        let next = self.batches.lock().unwrap().pop_front();
        match next {
            Some(Ok(increment)) => Ok(increment),
            Some(Err(reason)) => Err(KeeperError::upstream("fetch", reason)),
            None => Ok(None),
        }
    }

    async fn predict(&self, _symbol: &str, _increment: &Increment) -> KeeperResult<()> {
        self.predictions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn retrain(&self, symbol: &str, points_this_run: u64) -> KeeperResult<()> {
        let active = self.tracker.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.tracker.max_active.fetch_max(active, Ordering::SeqCst);
        if !self.retrain_delay.is_zero() {
            tokio::time::sleep(self.retrain_delay).await;
        }
        self.tracker.active.fetch_sub(1, Ordering::SeqCst);

        if self.fail_retrain {
            return Err(KeeperError::upstream("train", "model server returned 500"));
        }
        self.retrains
            .lock()
            .unwrap()
            .push((symbol.to_string(), points_this_run));
        Ok(())
    }
}

/// Captures every emitted envelope in order
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<EventEnvelope>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<EventEnvelope> {
        self.events.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.event).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.names().iter().filter(|n| n.as_str() == name).count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn emit(&self, envelope: EventEnvelope) -> KeeperResult<()> {
        self.events.lock().unwrap().push(envelope);
        Ok(())
    }
}

/// Accepts workflow requests without running them, optionally refusing all
#[derive(Default)]
pub struct RecordingDispatcher {
    requests: Mutex<Vec<WorkflowRequest>>,
    fail: AtomicBool,
}

impl RecordingDispatcher {
    pub fn failing() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail: AtomicBool::new(true),
        }
    }

    pub fn requests(&self) -> Vec<WorkflowRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkflowDispatcher for RecordingDispatcher {
    async fn dispatch(&self, request: WorkflowRequest) -> KeeperResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(KeeperError::Queue("broker unavailable".to_string()));
        }
        self.requests.lock().unwrap().push(request);
        Ok(())
    }
}

/// Sync that records whether the symbol's run lock was still held when it ran
pub struct WatchingSync {
    locks: LockManager,
    fail: bool,
    pub calls: AtomicUsize,
    pub lock_held_during_sync: AtomicBool,
}

impl WatchingSync {
    pub fn new(locks: LockManager) -> Self {
        Self {
            locks,
            fail: false,
            calls: AtomicUsize::new(0),
            lock_held_during_sync: AtomicBool::new(false),
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSync for WatchingSync {
    async fn sync(&self, symbol: &str) -> KeeperResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let held = self.locks.holder(&run_lock_key(symbol)).await?.is_some();
        self.lock_held_during_sync.store(held, Ordering::SeqCst);
        if self.fail {
            return Err(KeeperError::Sync("downstream database unreachable".to_string()));
        }
        Ok(())
    }
}

/// Store whose lock creation answers late; everything else goes straight through
pub struct SlowLockStore {
    inner: Arc<MemoryStore>,
    delay: Duration,
    write_before_stalling: bool,
}

impl SlowLockStore {
    /// The write never happens if the caller gives up during the stall
    pub fn new(inner: Arc<MemoryStore>, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            write_before_stalling: false,
        }
    }

    /// The lock is created, but the reply is late, like a lost Redis response
    pub fn writing_first(mut self) -> Self {
        self.write_before_stalling = true;
        self
    }
}

#[async_trait]
impl KeyValueStore for SlowLockStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> KeeperResult<bool> {
        if self.write_before_stalling {
            let created = self.inner.set_if_absent(key, value, ttl).await?;
            tokio::time::sleep(self.delay).await;
            return Ok(created);
        }
        tokio::time::sleep(self.delay).await;
        self.inner.set_if_absent(key, value, ttl).await
    }

    async fn set_if_present(&self, key: &str, value: &str, ttl: Duration) -> KeeperResult<bool> {
        self.inner.set_if_present(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> KeeperResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> KeeperResult<()> {
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> KeeperResult<bool> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> KeeperResult<bool> {
        self.inner.exists(key).await
    }

    async fn incr_by(&self, key: &str, delta: i64) -> KeeperResult<i64> {
        self.inner.incr_by(key, delta).await
    }

    async fn hash_get_all(&self, key: &str) -> KeeperResult<HashMap<String, String>> {
        self.inner.hash_get_all(key).await
    }

    async fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> KeeperResult<()> {
        self.inner.hash_set(key, fields).await
    }
}
