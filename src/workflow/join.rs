//! Ordered join over independent units of work
//!
//! Each unit runs on its own task. Results are collected over a channel into a
//! slot array indexed by launch position, so the caller sees launch order no
//! matter which unit finished first. A unit that panics still occupies its slot.

use std::future::Future;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitFailure {
    #[error("unit panicked")]
    Panicked,
    #[error("unit was cancelled")]
    Cancelled,
    #[error("unit never reported a result")]
    Lost,
}

/// Run every unit in parallel and return their results in launch order.
pub async fn join_ordered<F, T>(units: Vec<F>) -> Vec<Result<T, UnitFailure>>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let total = units.len();
    let (tx, mut rx) = mpsc::channel::<(usize, Result<T, UnitFailure>)>(total.max(1));

    for (index, unit) in units.into_iter().enumerate() {
        let tx = tx.clone();
        tokio::spawn(async move {
            let outcome = match tokio::spawn(unit).await {
                Ok(value) => Ok(value),
                Err(e) if e.is_panic() => Err(UnitFailure::Panicked),
                Err(_) => Err(UnitFailure::Cancelled),
            };
            let _ = tx.send((index, outcome)).await;
        });
    }
    drop(tx);

    let mut slots: Vec<Option<Result<T, UnitFailure>>> = (0..total).map(|_| None).collect();
    let mut remaining = total;
    while remaining > 0 {
        let Some((index, outcome)) = rx.recv().await else {
            break;
        };
        if slots[index].replace(outcome).is_none() {
            remaining -= 1;
        }
    }

    slots
        .into_iter()
        .map(|slot| slot.unwrap_or(Err(UnitFailure::Lost)))
        .collect()
}

/// Join all units, then hand the ordered results to `finalize` exactly once.
pub async fn join_then<F, T, C, Fut, R>(units: Vec<F>, finalize: C) -> R
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
    C: FnOnce(Vec<Result<T, UnitFailure>>) -> Fut,
    Fut: Future<Output = R>,
{
    let results = join_ordered(units).await;
    finalize(results).await
}
