//! Coordination layer that keeps per-symbol forecasting models up to date
//!
//! A scheduler and manual triggers go through the entry guard, which takes a
//! per-symbol run lock and hands a workflow to the queue. Workers fan out one
//! catch-up pipeline per model type, join them, sync downstream and release
//! the lock. Lifecycle events reach clients over WebSocket rooms.

pub mod config;
pub mod core;
pub mod error;
pub mod guard;
pub mod jobs;
pub mod lock;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod schedule;
pub mod services;
pub mod store;
pub mod workflow;
