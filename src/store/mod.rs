//! Shared key-value store used for locks, counters and schedule hashes
//!
//! All cross-component state lives here; nothing is cached in-process between
//! invocations. Expiry is enforced by the store itself.

pub mod memory;
pub mod redis_store;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

use crate::error::KeeperResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Create `key` only if absent, expiring after `ttl`. Returns whether it was created.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> KeeperResult<bool>;

    /// Overwrite `key` and reset its expiry only if it already exists.
    async fn set_if_present(&self, key: &str, value: &str, ttl: Duration) -> KeeperResult<bool>;

    async fn get(&self, key: &str) -> KeeperResult<Option<String>>;

    /// Unconditional set without expiry
    async fn set(&self, key: &str, value: &str) -> KeeperResult<()>;

    /// Delete `key`; returns whether something was removed
    async fn delete(&self, key: &str) -> KeeperResult<bool>;

    async fn exists(&self, key: &str) -> KeeperResult<bool>;

    /// Atomic increment, creating the counter at zero when absent
    async fn incr_by(&self, key: &str, delta: i64) -> KeeperResult<i64>;

    async fn hash_get_all(&self, key: &str) -> KeeperResult<HashMap<String, String>>;

    async fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> KeeperResult<()>;
}
