//! Background renewal of a held lock while a long operation runs

use super::LockManager;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub struct LockWatchdog {
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl LockWatchdog {
    /// Renew `key` every `every` with a fresh `ttl` until stopped, until the
    /// lock is found missing, or until `max_hold` has passed since spawning.
    ///
    /// After `max_hold` the lock is left to expire on its own TTL, so a holder
    /// that never finishes cannot keep the key alive forever.
    pub fn spawn(
        locks: LockManager,
        key: String,
        holder: String,
        ttl: Duration,
        every: Duration,
        max_hold: Duration,
    ) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            let hold_limit = tokio::time::sleep(max_hold);
            tokio::pin!(hold_limit);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = &mut hold_limit => {
                        warn!(
                            key = %key,
                            holder = %holder,
                            max_hold = ?max_hold,
                            "LockWatchdog: maximum hold time reached, no longer renewing"
                        );
                        break;
                    }
                    _ = ticker.tick() => {
                        match locks.renew(&key, &holder, ttl).await {
                            Ok(true) => debug!(key = %key, "LockWatchdog: renewed"),
                            Ok(false) => {
                                info!(key = %key, "LockWatchdog: lock gone, stopping");
                                break;
                            }
                            Err(e) => {
                                error!(key = %key, error = %e, "LockWatchdog: renew failed, stopping");
                                break;
                            }
                        }
                    }
                    _ = &mut stop_rx => break,
                }
            }
        });

        Self {
            stop: Some(stop_tx),
            handle,
        }
    }

    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let _ = self.handle.await;
    }
}
