//! Key-based mutual exclusion with store-enforced expiry

pub mod manager;
pub mod watchdog;

pub use manager::{run_lock_key, training_lock_key, LockManager};
pub use watchdog::LockWatchdog;
