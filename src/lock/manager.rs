//! Lock manager over the shared store
//!
//! Two lock classes exist:
//! - run lock `lock:stock:<symbol>`, held for a whole workflow
//! - training lock `lock:train:<model>`, shared by every symbol of that model type
//!   and held only around a retrain
//!
//! Acquisition is single-shot `set-if-absent`. Contention is a `false`, never an error.

use crate::error::KeeperResult;
use crate::models::ModelType;
use crate::store::KeyValueStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub fn run_lock_key(symbol: &str) -> String {
    format!("lock:stock:{}", symbol)
}

pub fn training_lock_key(model_type: &ModelType) -> String {
    format!("lock:train:{}", model_type)
}

#[derive(Clone)]
pub struct LockManager {
    store: Arc<dyn KeyValueStore>,
}

impl LockManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Atomically create `key` for `holder` if nobody holds it.
    pub async fn acquire(&self, key: &str, holder: &str, ttl: Duration) -> KeeperResult<bool> {
        let acquired = self.store.set_if_absent(key, holder, ttl).await?;
        debug!(key = %key, holder = %holder, acquired, "LockManager: acquire");
        Ok(acquired)
    }

    /// Extend expiry of a lock that still exists. Returns false if it already expired.
    pub async fn renew(&self, key: &str, holder: &str, ttl: Duration) -> KeeperResult<bool> {
        let renewed = self.store.set_if_present(key, holder, ttl).await?;
        if !renewed {
            warn!(key = %key, holder = %holder, "LockManager: renew found no lock, it may have expired");
        }
        Ok(renewed)
    }

    /// Unconditional, idempotent delete.
    pub async fn release(&self, key: &str) -> KeeperResult<()> {
        let removed = self.store.delete(key).await?;
        debug!(key = %key, removed, "LockManager: release");
        Ok(())
    }

    /// Delete `key` only while `holder` still owns it. Returns whether it was removed.
    ///
    /// Read-then-delete, not atomic: only for cleanup where the caller may or may
    /// not have created the lock.
    pub async fn release_if_held_by(&self, key: &str, holder: &str) -> KeeperResult<bool> {
        if self.store.get(key).await?.as_deref() != Some(holder) {
            return Ok(false);
        }
        let removed = self.store.delete(key).await?;
        debug!(key = %key, holder = %holder, removed, "LockManager: conditional release");
        Ok(removed)
    }

    /// Current holder identity, if the lock is held
    pub async fn holder(&self, key: &str) -> KeeperResult<Option<String>> {
        self.store.get(key).await
    }

    /// Poll `acquire` every `poll` until it succeeds or `timeout` elapses.
    ///
    /// Never blocks indefinitely; returns false once the deadline passes.
    pub async fn acquire_with_deadline(
        &self,
        key: &str,
        holder: &str,
        ttl: Duration,
        timeout: Duration,
        poll: Duration,
    ) -> KeeperResult<bool> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.acquire(key, holder, ttl).await? {
                return Ok(true);
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            debug!(key = %key, holder = %holder, "LockManager: lock busy, waiting {:?}", poll);
            tokio::time::sleep(poll.min(deadline - now)).await;
        }
    }
}
