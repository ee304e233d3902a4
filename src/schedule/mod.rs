//! Schedule records: written by the admin interface, read by the scheduler

use crate::error::{KeeperError, KeeperResult};
use crate::models::schedule::{
    FIELD_INTERVAL_MINUTES, FIELD_IS_ACTIVE, FIELD_LAST_RUN_ISO, INTERVAL_UNIT_MINUTES,
};
use crate::models::ScheduleRecord;
use crate::store::KeyValueStore;
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use tracing::info;

pub fn schedule_key(symbol: &str) -> String {
    format!("schedule:{}", symbol)
}

#[derive(Clone)]
pub struct ScheduleRepository {
    store: Arc<dyn KeyValueStore>,
}

impl ScheduleRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, symbol: &str) -> KeeperResult<Option<ScheduleRecord>> {
        let key = schedule_key(symbol);
        if !self.store.exists(&key).await? {
            return Ok(None);
        }
        let fields = self.store.hash_get_all(&key).await?;
        Ok(Some(ScheduleRecord::from_fields(symbol, &fields)))
    }

    /// Activate a schedule of `interval_units` 5-minute units.
    ///
    /// `last_run_iso` is left as is so a new schedule fires on the next tick.
    pub async fn start(&self, symbol: &str, interval_units: i64) -> KeeperResult<ScheduleRecord> {
        let interval_minutes = u32::try_from(interval_units)
            .ok()
            .filter(|units| *units > 0)
            .and_then(|units| units.checked_mul(INTERVAL_UNIT_MINUTES))
            .ok_or_else(|| {
                KeeperError::InvalidInput(
                    "Invalid interval provided. Must be a positive integer.".to_string(),
                )
            })?;

        self.store
            .hash_set(
                &schedule_key(symbol),
                &[
                    (FIELD_IS_ACTIVE, "true".to_string()),
                    (FIELD_INTERVAL_MINUTES, interval_minutes.to_string()),
                ],
            )
            .await?;
        info!(symbol = %symbol, interval_minutes, "Schedule started for {} every {} minutes", symbol, interval_minutes);

        Ok(self
            .get(symbol)
            .await?
            .unwrap_or_else(|| ScheduleRecord::new(symbol, interval_minutes)))
    }

    pub async fn delete(&self, symbol: &str) -> KeeperResult<bool> {
        let removed = self.store.delete(&schedule_key(symbol)).await?;
        info!(symbol = %symbol, removed, "Schedule stopped for {}", symbol);
        Ok(removed)
    }

    pub async fn mark_run(&self, symbol: &str, at: DateTime<Utc>) -> KeeperResult<()> {
        self.store
            .hash_set(
                &schedule_key(symbol),
                &[(
                    FIELD_LAST_RUN_ISO,
                    at.to_rfc3339_opts(SecondsFormat::Micros, false),
                )],
            )
            .await
    }
}
