//! Cron-driven meta scheduler
//!
//! On every tick it reads each known symbol's schedule record and, when due,
//! asks the entry guard to start a workflow. `last_run_iso` is updated right
//! after the guard call without waiting for the workflow, so a run that fails to
//! start after admission is only retried on the next interval.

use crate::error::KeeperResult;
use crate::guard::EntryGuard;
use crate::metrics::Metrics;
use crate::models::UpdateStatus;
use crate::schedule::ScheduleRepository;
use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

pub const SCHEDULER_IDENTITY: &str = "scheduler";

/// Stateless per-tick work; everything is re-read from the store
pub struct SchedulerTick {
    guard: Arc<EntryGuard>,
    schedules: ScheduleRepository,
    symbols: Vec<String>,
    metrics: Option<Arc<Metrics>>,
}

impl SchedulerTick {
    pub fn new(guard: Arc<EntryGuard>, schedules: ScheduleRepository, symbols: Vec<String>) -> Self {
        Self {
            guard,
            schedules,
            symbols,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Evaluate every symbol at `now`, returning the guard's answer for each triggered one.
    ///
    /// A failure on one symbol is logged and does not stop the others.
    pub async fn run(&self, now: DateTime<Utc>) -> Vec<(String, UpdateStatus)> {
        let mut triggered = Vec::new();
        for symbol in &self.symbols {
            match self.run_symbol(symbol, now).await {
                Ok(Some(status)) => triggered.push((symbol.clone(), status)),
                Ok(None) => {}
                Err(e) => error!(symbol = %symbol, error = %e, "Scheduler: tick failed for {}", symbol),
            }
        }
        triggered
    }

    async fn run_symbol(&self, symbol: &str, now: DateTime<Utc>) -> KeeperResult<Option<UpdateStatus>> {
        let Some(record) = self.schedules.get(symbol).await? else {
            return Ok(None);
        };
        if !record.should_run(now) {
            debug!(symbol = %symbol, last_run = ?record.last_run, "Scheduler: {} not due", symbol);
            return Ok(None);
        }

        match record.last_run {
            None => info!(symbol = %symbol, "Scheduler: '{}' has a new schedule, running for the first time", symbol),
            Some(_) => info!(
                symbol = %symbol,
                interval_minutes = record.interval_minutes,
                "Scheduler: interval of {} min for '{}' has passed, triggering job",
                record.interval_minutes,
                symbol
            ),
        }

        let status = self.guard.request_update(symbol, SCHEDULER_IDENTITY).await?;
        self.schedules.mark_run(symbol, now).await?;
        if let Some(ref metrics) = self.metrics {
            metrics.scheduler_triggers_total.inc();
        }
        Ok(Some(status))
    }
}

/// Scheduler that periodically runs a [`SchedulerTick`]
pub struct MetaScheduler {
    tick: Arc<SchedulerTick>,
    schedule: Schedule,
    handle: Arc<RwLock<Option<tokio::task::JoinHandle<()>>>>,
}

/// Cron expression firing every `seconds`, when that period divides its field evenly.
///
/// Cron format: second minute hour day month weekday
fn cron_for_interval(seconds: u64) -> Option<String> {
    match seconds {
        s if s < 60 && 60 % s == 0 => Some(format!("*/{} * * * * *", s)),
        s if s % 60 == 0 && s < 3600 && 60 % (s / 60) == 0 => {
            Some(format!("0 */{} * * * *", s / 60))
        }
        s if s % 3600 == 0 && s < 86_400 && 24 % (s / 3600) == 0 => {
            Some(format!("0 0 */{} * * *", s / 3600))
        }
        86_400 => Some("0 0 0 * * *".to_string()),
        _ => None,
    }
}

impl MetaScheduler {
    /// Create a new scheduler
    ///
    /// # Arguments
    /// * `tick` - Work performed on each tick
    /// * `interval_seconds` - Tick interval in seconds (0 = disabled)
    pub fn new(
        tick: SchedulerTick,
        interval_seconds: u64,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        if interval_seconds == 0 {
            return Err("Scheduler disabled: interval_seconds is 0".into());
        }

        let cron_expr = cron_for_interval(interval_seconds).ok_or_else(|| {
            format!(
                "Scheduler interval {}s cannot be expressed as an even cron step; \
                 use a divisor of 60 seconds, 60 minutes or 24 hours",
                interval_seconds
            )
        })?;

        let schedule = Schedule::from_str(&cron_expr).map_err(|e| {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Invalid cron expression '{}': {}", cron_expr, e),
            )) as Box<dyn std::error::Error + Send + Sync>
        })?;

        info!(
            interval = interval_seconds,
            cron = %cron_expr,
            symbols = ?tick.symbols,
            "MetaScheduler: created with interval {}s (cron: {})",
            interval_seconds,
            cron_expr
        );

        Ok(Self {
            tick: Arc::new(tick),
            schedule,
            handle: Arc::new(RwLock::new(None)),
        })
    }

    /// Run a single tick immediately
    pub async fn tick(&self, now: DateTime<Utc>) -> Vec<(String, UpdateStatus)> {
        self.tick.run(now).await
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let tick = self.tick.clone();
        let schedule = self.schedule.clone();
        let handle_arc = self.handle.clone();

        let handle = tokio::spawn(async move {
            info!("MetaScheduler: started, waiting for cron schedule...");

            loop {
                let mut upcoming = schedule.upcoming(Utc);
                if let Some(next_tick) = upcoming.next() {
                    let now = Utc::now();
                    if next_tick > now {
                        let duration = (next_tick - now).to_std().unwrap_or_default();
                        tokio::time::sleep(duration).await;
                    }
                } else {
                    tokio::time::sleep(tokio::time::Duration::from_secs(60)).await;
                    continue;
                }

                let now = Utc::now();
                debug!(at = %now, "MetaScheduler: checking for jobs");
                let triggered = tick.run(now).await;
                if !triggered.is_empty() {
                    info!(triggered = ?triggered, "MetaScheduler: tick triggered {} symbol(s)", triggered.len());
                }
            }
        });

        {
            let mut h = handle_arc.write().await;
            *h = Some(handle);
        }

        info!("MetaScheduler: started successfully");
        Ok(())
    }

    /// Stop the scheduler
    pub async fn stop(&self) {
        let mut handle = self.handle.write().await;
        if let Some(h) = handle.take() {
            h.abort();
            info!("MetaScheduler: stopped");
        }
    }

    /// Check if the scheduler is running
    pub async fn is_running(&self) -> bool {
        let handle = self.handle.read().await;
        handle.is_some()
    }
}
