//! Task-queue jobs for the update workflow

pub mod context;
pub mod handlers;
pub mod types;

pub use context::JobContext;
pub use types::OrchestrateJob;
