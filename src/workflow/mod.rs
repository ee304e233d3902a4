//! Fan-out/fan-in orchestration of the per-model catch-up pipelines

pub mod coordinator;
pub mod dispatch;
pub mod join;

pub use coordinator::WorkflowCoordinator;
pub use dispatch::{LocalDispatcher, QueueDispatcher, WorkflowDispatcher};
pub use join::{join_ordered, join_then, UnitFailure};
