//! Downstream data synchronization run by the workflow's finalize step

use crate::error::{KeeperError, KeeperResult};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait DataSync: Send + Sync {
    async fn sync(&self, symbol: &str) -> KeeperResult<()>;
}

/// Posts to `{base_url}/sync/{symbol}`
pub struct HttpDataSync {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDataSync {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> KeeperResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KeeperError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl DataSync for HttpDataSync {
    async fn sync(&self, symbol: &str) -> KeeperResult<()> {
        let url = format!("{}/sync/{}", self.base_url, symbol);
        self.client
            .post(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| KeeperError::Sync(e.to_string()))?;
        debug!(symbol = %symbol, "Downstream sync finished");
        Ok(())
    }
}

/// Used when no sync endpoint is configured
pub struct NoopDataSync;

#[async_trait]
impl DataSync for NoopDataSync {
    async fn sync(&self, _symbol: &str) -> KeeperResult<()> {
        Ok(())
    }
}
