//! Per-symbol schedule record, stored as a hash under `schedule:<symbol>`

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Admin requests express intervals in units of this many minutes
pub const INTERVAL_UNIT_MINUTES: u32 = 5;

pub const FIELD_IS_ACTIVE: &str = "is_active";
pub const FIELD_INTERVAL_MINUTES: &str = "interval_minutes";
pub const FIELD_LAST_RUN_ISO: &str = "last_run_iso";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    pub symbol: String,
    pub is_active: bool,
    pub interval_minutes: u32,
    pub last_run: Option<DateTime<Utc>>,
}

impl ScheduleRecord {
    pub fn new(symbol: impl Into<String>, interval_minutes: u32) -> Self {
        Self {
            symbol: symbol.into(),
            is_active: true,
            interval_minutes,
            last_run: None,
        }
    }

    /// Build from the raw hash fields. Missing or malformed fields degrade to
    /// "inactive" / "never run" rather than failing the whole scheduler tick.
    pub fn from_fields(symbol: &str, fields: &HashMap<String, String>) -> Self {
        let is_active = fields.get(FIELD_IS_ACTIVE).map(String::as_str) == Some("true");
        let interval_minutes = fields
            .get(FIELD_INTERVAL_MINUTES)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let last_run = fields
            .get(FIELD_LAST_RUN_ISO)
            .filter(|v| !v.is_empty())
            .and_then(|v| parse_timestamp(v));

        Self {
            symbol: symbol.to_string(),
            is_active,
            interval_minutes,
            last_run,
        }
    }

    /// Interval as the admin interface reports it (5-minute units)
    pub fn interval_units(&self) -> u32 {
        self.interval_minutes / INTERVAL_UNIT_MINUTES
    }

    /// True when the schedule is active and either never ran or its interval elapsed.
    pub fn should_run(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active || self.interval_minutes == 0 {
            return false;
        }
        match self.last_run {
            None => true,
            Some(last) => now >= last + Duration::minutes(i64::from(self.interval_minutes)),
        }
    }
}

/// Parse an RFC 3339 timestamp, falling back to a naive ISO timestamp taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
