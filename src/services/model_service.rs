//! Model service interface for the data-fetch, prediction and retraining collaborator.

use crate::error::{KeeperError, KeeperResult};
use crate::models::{Increment, ModelType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// One model family's external operations for a symbol.
#[async_trait]
pub trait ModelService: Send + Sync {
    fn model_type(&self) -> &ModelType;

    /// Next batch of new data points, `None` once the symbol is caught up
    async fn fetch_next_increment(&self, symbol: &str) -> KeeperResult<Option<Increment>>;

    /// Produce predictions for a freshly fetched batch
    async fn predict(&self, symbol: &str, increment: &Increment) -> KeeperResult<()>;

    /// Retrain the model; `points_this_run` is how much new data this run has seen
    async fn retrain(&self, symbol: &str, points_this_run: u64) -> KeeperResult<()>;
}

#[derive(Debug, Deserialize)]
struct FetchResponse {
    count: u64,
    latest_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct TrainRequest {
    points: u64,
}

/// Talks to a model server at `{base_url}/models/{model}/{symbol}/{fetch|predict|train}`
pub struct HttpModelService {
    base_url: String,
    model_type: ModelType,
    client: reqwest::Client,
}

impl HttpModelService {
    /// Every request to the model server is bounded by `timeout`
    pub fn new(
        base_url: impl Into<String>,
        model_type: ModelType,
        timeout: Duration,
    ) -> KeeperResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KeeperError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model_type,
            client,
        })
    }

    fn url(&self, symbol: &str, action: &str) -> String {
        format!(
            "{}/models/{}/{}/{}",
            self.base_url, self.model_type, symbol, action
        )
    }

    async fn post(
        &self,
        stage: &'static str,
        symbol: &str,
        body: serde_json::Value,
    ) -> KeeperResult<reqwest::Response> {
        self.client
            .post(self.url(symbol, stage))
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| KeeperError::upstream(stage, e))
    }
}

#[async_trait]
impl ModelService for HttpModelService {
    fn model_type(&self) -> &ModelType {
        &self.model_type
    }

    async fn fetch_next_increment(&self, symbol: &str) -> KeeperResult<Option<Increment>> {
        let response = self.post("fetch", symbol, json!({})).await?;
        let body: FetchResponse = response
            .json()
            .await
            .map_err(|e| KeeperError::upstream("fetch", e))?;

        debug!(symbol = %symbol, model = %self.model_type, count = body.count, "Fetched increment");
        if body.count == 0 {
            return Ok(None);
        }
        Ok(Some(Increment {
            count: body.count,
            latest_timestamp: body.latest_timestamp,
        }))
    }

    async fn predict(&self, symbol: &str, increment: &Increment) -> KeeperResult<()> {
        self.post("predict", symbol, serde_json::to_value(increment)?)
            .await
            .map(|_| ())
    }

    async fn retrain(&self, symbol: &str, points_this_run: u64) -> KeeperResult<()> {
        let body = serde_json::to_value(TrainRequest {
            points: points_this_run,
        })?;
        self.post("train", symbol, body).await.map(|_| ())
    }
}
