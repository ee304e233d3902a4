//! Lifecycle events delivered to symbol rooms

use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A workflow was started for the symbol
    Accepted,
    /// A workflow was already running; no new work began
    Pending,
    Failed { reason: String },
    /// Workflow finished and data was synchronized
    Complete,
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Accepted => "update_request_accepted",
            LifecycleEvent::Pending => "update_request_pending",
            LifecycleEvent::Failed { .. } => "data_update_failed",
            LifecycleEvent::Complete => "data_update_complete",
        }
    }

    pub fn payload(&self, symbol: &str) -> Value {
        match self {
            LifecycleEvent::Accepted => json!({
                "stock": symbol,
                "message": format!("Update process for {} has been started.", symbol),
            }),
            LifecycleEvent::Pending => json!({
                "stock": symbol,
                "message": format!(
                    "An update for {} is already in progress. You will be notified upon completion.",
                    symbol
                ),
            }),
            LifecycleEvent::Failed { reason } => json!({
                "status": "error",
                "stock": symbol,
                "message": reason,
            }),
            LifecycleEvent::Complete => json!({
                "status": "success",
                "stock": symbol,
            }),
        }
    }
}
