//! Redis-backed store
//!
//! Locks map onto `SET key holder NX PX ttl` / `SET ... XX PX ttl`, so expiry is
//! enforced server-side and a crashed holder cannot wedge a key.

use super::KeyValueStore;
use crate::error::{KeeperError, KeeperResult};
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect, retrying with exponential backoff while Redis comes up
    pub async fn connect(redis_url: &str) -> KeeperResult<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| KeeperError::Config(format!("Invalid Redis URL '{}': {}", redis_url, e)))?;

        let conn = (|| async { ConnectionManager::new(client.clone()).await })
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(200))
                    .with_max_times(5),
            )
            .notify(|err: &redis::RedisError, dur: Duration| {
                warn!(error = %err, retry_in_ms = dur.as_millis() as u64, "Redis connection failed, retrying");
            })
            .await?;

        info!("RedisStore: connected");
        Ok(Self { conn })
    }

    async fn set_with_condition(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
        condition: &str,
    ) -> KeeperResult<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg(condition)
            .arg("PX")
            .arg(ttl.as_millis().max(1) as u64)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> KeeperResult<bool> {
        self.set_with_condition(key, value, ttl, "NX").await
    }

    async fn set_if_present(&self, key: &str, value: &str, ttl: Duration) -> KeeperResult<bool> {
        self.set_with_condition(key, value, ttl, "XX").await
    }

    async fn get(&self, key: &str) -> KeeperResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> KeeperResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> KeeperResult<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> KeeperResult<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> KeeperResult<i64> {
        let mut conn = self.conn.clone();
        let value: i64 = conn.incr(key, delta).await?;
        Ok(value)
    }

    async fn hash_get_all(&self, key: &str) -> KeeperResult<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(fields)
    }

    async fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> KeeperResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = conn.hset_multiple(key, fields).await?;
        Ok(())
    }
}
