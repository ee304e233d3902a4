//! Prometheus metrics for workflow coordination and the HTTP surface

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,

    pub workflows_started_total: IntCounter,
    pub workflows_skipped_total: IntCounter,
    pub workflows_completed_total: IntCounter,
    pub workflows_failed_total: IntCounter,
    pub subtasks_failed_total: IntCounter,
    pub retrains_total: IntCounter,
    pub training_lock_timeouts_total: IntCounter,
    pub scheduler_triggers_total: IntCounter,

    pub http_requests_total: IntCounter,
    pub http_request_duration_seconds: Histogram,
    pub http_requests_in_flight: IntGauge,
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, prometheus::Error> {
    let c = IntCounter::new(name, help)?;
    registry.register(Box::new(c.clone()))?;
    Ok(c)
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        ))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        let http_requests_in_flight =
            IntGauge::new("http_requests_in_flight", "HTTP requests currently being served")?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;

        Ok(Self {
            workflows_started_total: counter(
                &registry,
                "workflows_started_total",
                "Update workflows admitted by the entry guard",
            )?,
            workflows_skipped_total: counter(
                &registry,
                "workflows_skipped_total",
                "Update requests skipped because the run lock was held",
            )?,
            workflows_completed_total: counter(
                &registry,
                "workflows_completed_total",
                "Workflows whose finalize step synchronized successfully",
            )?,
            workflows_failed_total: counter(
                &registry,
                "workflows_failed_total",
                "Workflows whose finalize step failed to synchronize",
            )?,
            subtasks_failed_total: counter(
                &registry,
                "subtasks_failed_total",
                "Catch-up subtasks that ended in failure",
            )?,
            retrains_total: counter(&registry, "retrains_total", "Completed model retrains")?,
            training_lock_timeouts_total: counter(
                &registry,
                "training_lock_timeouts_total",
                "Retrains abandoned because the training lock stayed busy",
            )?,
            scheduler_triggers_total: counter(
                &registry,
                "scheduler_triggers_total",
                "Update requests issued by the scheduler",
            )?,
            http_requests_total: counter(&registry, "http_requests_total", "HTTP requests served")?,
            http_request_duration_seconds,
            http_requests_in_flight,
            registry,
        })
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
