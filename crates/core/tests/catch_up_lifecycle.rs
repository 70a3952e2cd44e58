//! Catch-up queue lifecycle integration tests.
//!
//! These tests verify debouncing, flush-time filtering and shutdown of the
//! catch-up queue against the mock store and against a real directory tree.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tempfile::TempDir;
use tokio::sync::watch;

use strmprobe_core::{
    library::{write_sidecar, LibraryRootConfig, MediaInfo, MediaStream, StreamKind},
    testing::{fixtures, MockBehavior, MockLibraryStore, MockProbeProvider},
    CatchUpQueue, CatchUpState, FsLibraryStore, LibraryId, LibraryStore, ProbeOrchestrator,
    ProbeSettings,
};

const DEBOUNCE: Duration = Duration::from_millis(150);

fn settings() -> watch::Receiver<ProbeSettings> {
    let settings = ProbeSettings {
        probe_cooldown_ms: 0,
        ..ProbeSettings::default()
    };
    // The queue only reads; a dropped sender keeps the last value.
    watch::channel(settings).1
}

fn queue(store: Arc<dyn LibraryStore>, provider: &Arc<MockProbeProvider>) -> CatchUpQueue {
    CatchUpQueue::new(
        store,
        Arc::new(ProbeOrchestrator::new(provider.clone())),
        settings(),
    )
    .with_debounce_delay(DEBOUNCE)
}

/// Poll `check` until it holds or `timeout` elapses.
async fn wait_for<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = Instant::now();
    while start.elapsed() < timeout {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

fn sample_info() -> MediaInfo {
    MediaInfo {
        container: Some("mpegts".to_string()),
        duration_secs: Some(60.0),
        size_bytes: None,
        bit_rate: None,
        streams: vec![MediaStream {
            index: 0,
            kind: StreamKind::Video,
            codec: Some("h264".to_string()),
            width: Some(1280),
            height: Some(720),
            channels: None,
            sample_rate: None,
            language: None,
        }],
        probed_at: Utc::now(),
    }
}

fn write_strm(dir: &Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, "http://example.com/stream.m3u8\n").unwrap();
    path
}

#[tokio::test]
async fn test_burst_of_notifications_collapses_into_one_flush() {
    let store = Arc::new(MockLibraryStore::new());
    let provider = Arc::new(MockProbeProvider::new());
    let queue = queue(store.clone(), &provider);
    queue.start().unwrap();

    for item in fixtures::strm_items(3) {
        store.add_and_notify(item);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // Each notification pushed the deadline back, so nothing ran yet.
    assert!(provider.refresh_calls().await.is_empty());

    assert!(
        wait_for(Duration::from_secs(2), || async {
            provider.refresh_calls().await.len() == 3
        })
        .await
    );

    let status = queue.status();
    assert_eq!(status.flushes, 1);
    assert_eq!(status.items_flushed, 3);
    assert_eq!(status.events_enqueued, 3);
}

#[tokio::test]
async fn test_unresolvable_items_are_dropped_at_flush() {
    let store = Arc::new(MockLibraryStore::new());
    let provider = Arc::new(MockProbeProvider::new());
    let queue = queue(store.clone(), &provider);
    queue.start().unwrap();

    let kept = fixtures::strm_item("Kept");
    let vanished = fixtures::strm_item("Vanished");
    store.add_and_notify(kept.clone());
    store.add_and_notify(vanished.clone());
    // Gone from the store without a removal notification.
    store.remove(&vanished.id);

    assert!(
        wait_for(Duration::from_secs(2), || async {
            queue.status().flushes == 1
        })
        .await
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(provider.refresh_calls().await, vec![kept.id]);
    let status = queue.status();
    assert_eq!(status.items_dropped, 1);
    assert_eq!(status.items_skipped, 0);
}

#[tokio::test]
async fn test_items_probed_meanwhile_are_skipped() {
    let store = Arc::new(MockLibraryStore::new());
    let provider = Arc::new(MockProbeProvider::new());
    let queue = queue(store.clone(), &provider);
    queue.start().unwrap();

    let item = fixtures::strm_item("Probed Elsewhere");
    store.add_and_notify(item.clone());
    store.insert(item.clone().with_media_streams(2));

    tokio::time::sleep(DEBOUNCE * 3).await;

    assert_eq!(provider.call_count().await, 0);
    let status = queue.status();
    assert_eq!(status.flushes, 0);
    assert_eq!(status.items_skipped, 1);
    assert_eq!(status.items_dropped, 0);
}

#[tokio::test]
async fn test_duplicate_notifications_probe_once() {
    let store = Arc::new(MockLibraryStore::new());
    let provider = Arc::new(MockProbeProvider::new());
    let queue = queue(store.clone(), &provider);
    queue.start().unwrap();

    let item = fixtures::strm_item("Twice");
    store.add_and_notify(item.clone());
    store.add_and_notify(item.clone());

    assert!(
        wait_for(Duration::from_secs(2), || async {
            !provider.refresh_calls().await.is_empty()
        })
        .await
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(provider.refresh_calls().await, vec![item.id]);
    let status = queue.status();
    assert_eq!(status.items_flushed, 1);
    assert_eq!(status.items_dropped, 1);
    assert_eq!(status.items_skipped, 0);
}

#[tokio::test]
async fn test_overlapping_flushes_run_one_after_another() {
    let store = Arc::new(MockLibraryStore::new());
    let provider = Arc::new(MockProbeProvider::new());
    provider.set_delay(Duration::from_millis(400)).await;
    let (_settings, rx) = watch::channel(ProbeSettings {
        probe_parallelism: 1,
        probe_cooldown_ms: 0,
        ..ProbeSettings::default()
    });
    let queue = CatchUpQueue::new(
        store.clone(),
        Arc::new(ProbeOrchestrator::new(provider.clone())),
        rx,
    )
    .with_debounce_delay(DEBOUNCE);
    queue.start().unwrap();

    let first = fixtures::strm_item("First");
    store.add_and_notify(first.clone());

    // The second window closes while the first batch is still probing.
    tokio::time::sleep(DEBOUNCE + Duration::from_millis(100)).await;
    let second = fixtures::strm_item("Second");
    store.add_and_notify(second.clone());

    assert!(
        wait_for(Duration::from_secs(3), || async {
            provider.completed_probes().await.len() == 2
        })
        .await
    );

    assert_eq!(provider.max_concurrent(), 1);
    let probes = provider.completed_probes().await;
    assert_eq!(probes[0].item_id, first.id);
    assert_eq!(probes[1].item_id, second.id);
    assert!(probes[1].started_at >= probes[0].finished_at);
    assert_eq!(queue.status().flushes, 2);
}

#[tokio::test]
async fn test_failing_flush_does_not_stop_the_queue() {
    let store = Arc::new(MockLibraryStore::new());
    let provider = Arc::new(MockProbeProvider::new());
    let queue = queue(store.clone(), &provider);
    queue.start().unwrap();

    let exploding = fixtures::strm_item("Exploding");
    provider.set_behavior(exploding.id, MockBehavior::Panic).await;
    store.add_and_notify(exploding);

    assert!(
        wait_for(Duration::from_secs(2), || async {
            queue.status().flush_failures == 1
        })
        .await
    );
    assert_eq!(queue.state(), CatchUpState::Running);

    let next = fixtures::strm_item("Next");
    store.add_and_notify(next.clone());
    assert!(
        wait_for(Duration::from_secs(2), || async {
            provider.refresh_calls().await.contains(&next.id)
        })
        .await
    );
}

#[tokio::test]
async fn test_stop_cancels_in_flight_flush_and_pending_items() {
    let store = Arc::new(MockLibraryStore::new());
    let provider = Arc::new(MockProbeProvider::new());
    provider.set_default_behavior(MockBehavior::Hang).await;
    let queue = queue(store.clone(), &provider);
    queue.start().unwrap();

    store.add_and_notify(fixtures::strm_item("Hanging"));
    assert!(
        wait_for(Duration::from_secs(2), || async {
            provider.call_count().await == 1
        })
        .await
    );

    // Queued but never flushed.
    store.add_and_notify(fixtures::strm_item("Pending"));

    queue.shutdown().await;
    assert_eq!(queue.state(), CatchUpState::Stopped);
    assert_eq!(store.subscriber_count(), 0);

    assert!(
        wait_for(Duration::from_secs(2), || async {
            queue.status().flush_failures == 1
        })
        .await
    );
    tokio::time::sleep(DEBOUNCE * 2).await;
    assert_eq!(provider.call_count().await, 1);
}

#[tokio::test]
async fn test_rescan_feeds_catch_up_queue() {
    let dir = TempDir::new().unwrap();
    write_strm(dir.path(), "Movie A.strm");
    let probed = write_strm(dir.path(), "Movie B.STRM");
    std::fs::write(dir.path().join("Movie C.mkv"), b"not a pointer").unwrap();

    let store = Arc::new(FsLibraryStore::new(vec![LibraryRootConfig {
        id: LibraryId::new(),
        name: "Movies".to_string(),
        path: dir.path().to_path_buf(),
    }]));
    let provider = Arc::new(MockProbeProvider::new());
    let queue = queue(store.clone(), &provider);
    queue.start().unwrap();

    let summary = store.rescan();
    assert_eq!(summary.added, 3);

    // Probed by someone else before the quiet period ends.
    write_sidecar(&probed, &sample_info()).await.unwrap();

    assert!(
        wait_for(Duration::from_secs(2), || async {
            queue.status().flushes == 1
        })
        .await
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    let status = queue.status();
    assert_eq!(status.events_enqueued, 2);
    assert_eq!(status.events_ignored, 1);
    assert_eq!(status.items_flushed, 1);
    assert_eq!(provider.refresh_calls().await.len(), 1);
}
