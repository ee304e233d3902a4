//! Shared records and value types for the coordination core.

pub mod event;
pub mod schedule;
pub mod training;
pub mod workflow;

pub use event::LifecycleEvent;
pub use schedule::ScheduleRecord;
pub use training::{CatchUpReport, Increment, RetrainOutcome, TrainingState};
pub use workflow::{ModelType, SubtaskOutcome, SubtaskResult, UpdateStatus, WorkflowRequest};
