//! Batch probing integration tests.
//!
//! These tests drive the orchestrator with the mock provider and check
//! concurrency, throttling, progress and cancellation.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use strmprobe_core::{
    testing::{fixtures, MockBehavior, MockProbeProvider},
    BatchConfig, BatchError, DiscardProgress, ProbeOrchestrator,
};

fn no_cooldown() -> BatchConfig {
    BatchConfig::default().with_cooldown_ms(0)
}

#[tokio::test]
async fn test_concurrency_never_exceeds_parallelism() {
    for parallelism in [1, 2, 3, 5, 20] {
        let provider = Arc::new(MockProbeProvider::new());
        provider.set_delay(Duration::from_millis(40)).await;
        let orchestrator = ProbeOrchestrator::new(provider.clone());
        let count = parallelism * 2 + 1;

        let result = orchestrator
            .probe_batch(
                fixtures::strm_items(count),
                &no_cooldown().with_parallelism(parallelism),
                &DiscardProgress,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.probed, count, "parallelism {}", parallelism);
        assert_eq!(result.failed, 0, "parallelism {}", parallelism);
        assert_eq!(
            provider.max_concurrent(),
            parallelism,
            "parallelism {}",
            parallelism
        );
    }
}

#[tokio::test]
async fn test_workers_capped_by_item_count() {
    let provider = Arc::new(MockProbeProvider::new());
    provider.set_delay(Duration::from_millis(40)).await;

    ProbeOrchestrator::new(provider.clone())
        .probe_batch(
            fixtures::strm_items(2),
            &no_cooldown().with_parallelism(10),
            &DiscardProgress,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(provider.max_concurrent() <= 2);
    assert_eq!(provider.refresh_calls().await.len(), 2);
}

#[tokio::test]
async fn test_out_of_range_parallelism_is_clamped() {
    let provider = Arc::new(MockProbeProvider::new());
    provider.set_delay(Duration::from_millis(20)).await;

    let result = ProbeOrchestrator::new(provider.clone())
        .probe_batch(
            fixtures::strm_items(30),
            &no_cooldown().with_parallelism(0),
            &DiscardProgress,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.probed, 30);
    assert_eq!(provider.max_concurrent(), 1);
}

#[tokio::test]
async fn test_cooldown_throttles_each_worker() {
    let provider = Arc::new(MockProbeProvider::new());
    let started = Instant::now();

    ProbeOrchestrator::new(provider.clone())
        .probe_batch(
            fixtures::strm_items(3),
            &BatchConfig::default()
                .with_parallelism(1)
                .with_cooldown_ms(100),
            &DiscardProgress,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_millis(250));

    // Consecutive probes on the single worker are at least one cooldown apart.
    let probes = provider.completed_probes().await;
    assert_eq!(probes.len(), 3);
    for pair in probes.windows(2) {
        assert!(pair[1].started_at.duration_since(pair[0].finished_at) >= Duration::from_millis(100));
    }
}

#[tokio::test]
async fn test_failures_are_collected() {
    let provider = Arc::new(MockProbeProvider::new());
    let items = fixtures::strm_items(10);
    for item in items.iter().take(4) {
        provider
            .set_behavior(item.id, MockBehavior::Fail("unreachable".into()))
            .await;
    }

    let result = ProbeOrchestrator::new(provider)
        .probe_batch(
            items.clone(),
            &no_cooldown().with_parallelism(4),
            &DiscardProgress,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.probed, 6);
    assert_eq!(result.failed, 4);
    assert_eq!(result.probed + result.failed, items.len());
    assert!((result.failure_rate_percent() - 40.0).abs() < 1e-9);
    assert!(result
        .failed_items
        .iter()
        .all(|failed| items[..4].iter().any(|item| item.id == failed.id)));
}

#[tokio::test]
async fn test_progress_reaches_100_once() {
    let provider = Arc::new(MockProbeProvider::new());
    provider.set_delay(Duration::from_millis(5)).await;
    let reports = Mutex::new(Vec::new());

    ProbeOrchestrator::new(provider)
        .probe_batch(
            fixtures::strm_items(7),
            &no_cooldown().with_parallelism(3),
            &|p: f64| reports.lock().unwrap().push(p),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let reports = reports.into_inner().unwrap();
    assert_eq!(reports.len(), 7);
    assert!(reports.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(reports.iter().filter(|p| **p == 100.0).count(), 1);
}

#[tokio::test]
async fn test_cancellation_mid_batch() {
    let provider = Arc::new(MockProbeProvider::new());
    provider.set_delay(Duration::from_millis(50)).await;
    let cancel = CancellationToken::new();
    let orchestrator = ProbeOrchestrator::new(provider.clone());
    let config = no_cooldown().with_parallelism(2);

    let batch = orchestrator.probe_batch(fixtures::strm_items(20), &config, &DiscardProgress, &cancel);
    let canceller = async {
        tokio::time::sleep(Duration::from_millis(120)).await;
        cancel.cancel();
    };
    let (result, _) = tokio::join!(batch, canceller);

    assert_eq!(result, Err(BatchError::Cancelled));
    assert!(provider.call_count().await < 20);
}

#[tokio::test]
async fn test_cancellation_interrupts_cooldown() {
    let provider = Arc::new(MockProbeProvider::new());
    let cancel = CancellationToken::new();
    let orchestrator = ProbeOrchestrator::new(provider.clone());
    let config = BatchConfig::default()
        .with_parallelism(1)
        .with_cooldown_ms(5000);
    let started = Instant::now();

    let batch = orchestrator.probe_batch(fixtures::strm_items(3), &config, &DiscardProgress, &cancel);
    let canceller = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    };
    let (result, _) = tokio::join!(batch, canceller);

    assert_eq!(result, Err(BatchError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(provider.call_count().await, 1);
}
