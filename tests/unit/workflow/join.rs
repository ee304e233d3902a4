//! Unit tests for the ordered join

use modelkeeper::workflow::{join_ordered, join_then, UnitFailure};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Unit = Pin<Box<dyn Future<Output = &'static str> + Send>>;

fn delayed(label: &'static str, millis: u64) -> Unit {
    Box::pin(async move {
        tokio::time::sleep(Duration::from_millis(millis)).await;
        label
    })
}

async fn explode() -> &'static str {
    tokio::time::sleep(Duration::from_millis(5)).await;
    panic!("boom")
}

#[tokio::test(start_paused = true)]
async fn results_keep_launch_order() {
    let results = join_ordered(vec![delayed("a", 300), delayed("b", 10), delayed("c", 100)]).await;
    assert_eq!(results, vec![Ok("a"), Ok("b"), Ok("c")]);
}

#[tokio::test(start_paused = true)]
async fn a_panicking_unit_keeps_its_slot() {
    let panicking: Unit = Box::pin(explode());
    let results = join_ordered(vec![delayed("a", 50), panicking, delayed("c", 1)]).await;
    assert_eq!(results, vec![Ok("a"), Err(UnitFailure::Panicked), Ok("c")]);
}

#[tokio::test]
async fn empty_input_joins_immediately() {
    let results = join_ordered(Vec::<Unit>::new()).await;
    assert!(results.is_empty());
}

#[tokio::test(start_paused = true)]
async fn finalize_runs_once_after_every_unit() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let labels = join_then(vec![delayed("slow", 500), delayed("fast", 1)], |results| async move {
        seen.fetch_add(1, Ordering::SeqCst);
        results
            .into_iter()
            .map(|r| r.unwrap_or("failed"))
            .collect::<Vec<_>>()
    })
    .await;

    assert_eq!(labels, vec!["slow", "fast"]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
