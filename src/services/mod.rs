//! External collaborators: model fetch/predict/train and downstream data sync.

pub mod data_sync;
pub mod model_service;

pub use data_sync::{DataSync, HttpDataSync, NoopDataSync};
pub use model_service::{HttpModelService, ModelService};
