//! Per-symbol, per-model catch-up and retrain pipeline

pub mod catch_up;

pub use catch_up::{last_training_key, processed_count_key, CatchUpPipeline};
