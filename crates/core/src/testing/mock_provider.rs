//! Mock probe provider for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::library::{Item, ItemId};
use crate::probe::{DirectProbe, ProbeContext, ProbeProvider, ProviderError};

/// How the mock responds to a probe of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBehavior {
    /// Succeed after the configured delay.
    Succeed,
    /// Fail with a provider error after the configured delay.
    Fail(String),
    /// Block until the probe context fires, then report cancellation.
    Hang,
    /// Block forever, ignoring the probe context.
    HangForever,
    /// Report cancellation immediately.
    ReportCancelled,
    /// Panic inside the provider.
    Panic,
}

/// A recorded probe call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedProbe {
    pub item_id: ItemId,
    pub started_at: Instant,
    pub finished_at: Instant,
}

/// Decrements the in-flight counter when a probe ends.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Mock implementation of the ProbeProvider trait.
///
/// Provides controllable behavior for testing:
/// - Per-item success, failure, hang or panic
/// - Simulated probe duration
/// - Optional direct-probe support
/// - Tracking of calls and peak concurrency
///
/// # Example
///
/// ```rust,ignore
/// use strmprobe_core::testing::{MockBehavior, MockProbeProvider};
///
/// let provider = MockProbeProvider::new();
/// provider.set_behavior(item.id, MockBehavior::Fail("offline".into())).await;
///
/// // Run a batch...
///
/// assert_eq!(provider.max_concurrent(), 3);
/// ```
#[derive(Debug)]
pub struct MockProbeProvider {
    behaviors: Arc<RwLock<HashMap<ItemId, MockBehavior>>>,
    default_behavior: Arc<RwLock<MockBehavior>>,
    delay: Arc<RwLock<Duration>>,
    direct_supported: Arc<RwLock<bool>>,
    direct_calls: Arc<RwLock<Vec<ItemId>>>,
    refresh_calls: Arc<RwLock<Vec<ItemId>>>,
    completed: Arc<RwLock<Vec<RecordedProbe>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl Default for MockProbeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProbeProvider {
    /// Create a mock that succeeds immediately for every item.
    pub fn new() -> Self {
        Self {
            behaviors: Arc::new(RwLock::new(HashMap::new())),
            default_behavior: Arc::new(RwLock::new(MockBehavior::Succeed)),
            delay: Arc::new(RwLock::new(Duration::ZERO)),
            direct_supported: Arc::new(RwLock::new(false)),
            direct_calls: Arc::new(RwLock::new(Vec::new())),
            refresh_calls: Arc::new(RwLock::new(Vec::new())),
            completed: Arc::new(RwLock::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Set the behavior for one item.
    pub async fn set_behavior(&self, id: ItemId, behavior: MockBehavior) {
        self.behaviors.write().await.insert(id, behavior);
    }

    /// Set the behavior for items without a specific one.
    pub async fn set_default_behavior(&self, behavior: MockBehavior) {
        *self.default_behavior.write().await = behavior;
    }

    /// Set the simulated probe duration.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    /// Make `direct_probe` handle items instead of returning Unsupported.
    pub async fn set_direct_probe_supported(&self, supported: bool) {
        *self.direct_supported.write().await = supported;
    }

    /// Items passed to `direct_probe`, in call order.
    pub async fn direct_calls(&self) -> Vec<ItemId> {
        self.direct_calls.read().await.clone()
    }

    /// Items passed to `refresh`, in call order.
    pub async fn refresh_calls(&self) -> Vec<ItemId> {
        self.refresh_calls.read().await.clone()
    }

    /// Number of probe attempts (every attempt starts with a direct probe).
    pub async fn call_count(&self) -> usize {
        self.direct_calls.read().await.len()
    }

    /// Probes that ran to completion, in completion order.
    pub async fn completed_probes(&self) -> Vec<RecordedProbe> {
        self.completed.read().await.clone()
    }

    /// Peak number of probes running at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn perform(&self, item: &Item, ctx: &ProbeContext) -> Result<(), ProviderError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);
        let started_at = Instant::now();

        let behavior = match self.behaviors.read().await.get(&item.id) {
            Some(behavior) => behavior.clone(),
            None => self.default_behavior.read().await.clone(),
        };
        let delay = *self.delay.read().await;

        match behavior {
            MockBehavior::Hang => {
                ctx.cancelled().await;
                return Err(ProviderError::Cancelled);
            }
            MockBehavior::HangForever => std::future::pending::<()>().await,
            MockBehavior::ReportCancelled => return Err(ProviderError::Cancelled),
            MockBehavior::Panic => panic!("mock provider panic for {}", item.id),
            MockBehavior::Succeed | MockBehavior::Fail(_) => {}
        }

        if !delay.is_zero() {
            tokio::select! {
                _ = ctx.cancelled() => return Err(ProviderError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.completed.write().await.push(RecordedProbe {
            item_id: item.id,
            started_at,
            finished_at: Instant::now(),
        });

        match behavior {
            MockBehavior::Fail(reason) => Err(ProviderError::probe_failed(reason)),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ProbeProvider for MockProbeProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn direct_probe(
        &self,
        item: &Item,
        ctx: &ProbeContext,
    ) -> Result<DirectProbe, ProviderError> {
        self.direct_calls.write().await.push(item.id);
        if !*self.direct_supported.read().await {
            return Ok(DirectProbe::Unsupported);
        }
        self.perform(item, ctx).await?;
        Ok(DirectProbe::Probed)
    }

    async fn refresh(&self, item: &Item, ctx: &ProbeContext) -> Result<(), ProviderError> {
        self.refresh_calls.write().await.push(item.id);
        self.perform(item, ctx).await
    }
}
