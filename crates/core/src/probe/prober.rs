//! Single-item probing with a hard deadline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::ProviderError;
use super::traits::ProbeProvider;
use super::types::{DirectProbe, FailureReason, ProbeContext, ProbeOutcome};
use crate::library::Item;
use crate::metrics;

/// Probes one item through a [`ProbeProvider`].
///
/// Each call gets its own deadline. A deadline that elapses is a failure of
/// that item; a cancelled caller token is reported as
/// [`ProbeOutcome::Cancelled`] so the batch can stop.
pub struct ItemProber {
    provider: Arc<dyn ProbeProvider>,
}

impl ItemProber {
    pub fn new(provider: Arc<dyn ProbeProvider>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Probe `item`, giving up after `timeout` or when `cancel` fires.
    pub async fn probe_one(
        &self,
        item: &Item,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> ProbeOutcome {
        if cancel.is_cancelled() {
            return ProbeOutcome::Cancelled;
        }

        let started = Instant::now();
        let ctx = ProbeContext::child_of(cancel, timeout);

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.run_stages(item, &ctx) => Some(result),
            _ = tokio::time::sleep_until(ctx.deadline()) => {
                ctx.token().cancel();
                Some(Err(ProviderError::Cancelled))
            }
        };
        // Release the child token whichever branch won.
        ctx.token().cancel();

        let outcome = match result {
            _ if cancel.is_cancelled() => ProbeOutcome::Cancelled,
            None => ProbeOutcome::Cancelled,
            Some(Ok(())) => {
                debug!("Probed item {} ({})", item.name, item.id);
                ProbeOutcome::Succeeded
            }
            Some(Err(ProviderError::Cancelled)) => {
                warn!(
                    "Probe timed out after {}s for item {} ({})",
                    timeout.as_secs(),
                    item.name,
                    item.id
                );
                ProbeOutcome::Failed(FailureReason::Timeout {
                    timeout_secs: timeout.as_secs(),
                })
            }
            Some(Err(e)) => {
                warn!("Probe failed for item {} ({}): {}", item.name, item.id, e);
                ProbeOutcome::Failed(FailureReason::Provider(e.to_string()))
            }
        };

        let label = outcome.label();
        metrics::PROBES_TOTAL.with_label_values(&[label]).inc();
        metrics::PROBE_DURATION
            .with_label_values(&[label])
            .observe(started.elapsed().as_secs_f64());

        outcome
    }

    /// Fast direct probe first, full refresh when the provider can't do it.
    async fn run_stages(&self, item: &Item, ctx: &ProbeContext) -> Result<(), ProviderError> {
        match self.provider.direct_probe(item, ctx).await? {
            DirectProbe::Probed => Ok(()),
            DirectProbe::Unsupported => {
                debug!(
                    "Direct probe unsupported by {} for {}, falling back to refresh",
                    self.provider.name(),
                    item.id
                );
                self.provider.refresh(item, ctx).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockBehavior, MockProbeProvider};

    fn prober(provider: &Arc<MockProbeProvider>) -> ItemProber {
        ItemProber::new(provider.clone())
    }

    #[tokio::test]
    async fn test_success() {
        let provider = Arc::new(MockProbeProvider::new());
        let item = fixtures::strm_item("Movie");

        let outcome = prober(&provider)
            .probe_one(&item, Duration::from_secs(5), &CancellationToken::new())
            .await;

        assert_eq!(outcome, ProbeOutcome::Succeeded);
        assert_eq!(provider.refresh_calls().await, vec![item.id]);
    }

    #[tokio::test]
    async fn test_provider_error_is_failure() {
        let provider = Arc::new(MockProbeProvider::new());
        let item = fixtures::strm_item("Broken");
        provider
            .set_behavior(item.id, MockBehavior::Fail("connection refused".into()))
            .await;

        let outcome = prober(&provider)
            .probe_one(&item, Duration::from_secs(5), &CancellationToken::new())
            .await;

        match outcome {
            ProbeOutcome::Failed(FailureReason::Provider(msg)) => {
                assert!(msg.contains("connection refused"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_deadline_is_timeout_failure() {
        let provider = Arc::new(MockProbeProvider::new());
        let item = fixtures::strm_item("Slow");
        provider.set_behavior(item.id, MockBehavior::Hang).await;

        let outcome = prober(&provider)
            .probe_one(&item, Duration::from_millis(50), &CancellationToken::new())
            .await;

        assert!(matches!(
            outcome,
            ProbeOutcome::Failed(FailureReason::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_provider_ignoring_deadline_still_times_out() {
        let provider = Arc::new(MockProbeProvider::new());
        let item = fixtures::strm_item("Stuck");
        provider.set_behavior(item.id, MockBehavior::HangForever).await;

        let outcome = prober(&provider)
            .probe_one(&item, Duration::from_millis(50), &CancellationToken::new())
            .await;

        assert!(matches!(
            outcome,
            ProbeOutcome::Failed(FailureReason::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_provider_cancelled_with_live_caller_is_timeout() {
        let provider = Arc::new(MockProbeProvider::new());
        let item = fixtures::strm_item("Odd");
        provider
            .set_behavior(item.id, MockBehavior::ReportCancelled)
            .await;

        let outcome = prober(&provider)
            .probe_one(&item, Duration::from_secs(5), &CancellationToken::new())
            .await;

        assert_eq!(
            outcome,
            ProbeOutcome::Failed(FailureReason::Timeout { timeout_secs: 5 })
        );
    }

    #[tokio::test]
    async fn test_caller_cancellation_is_not_swallowed() {
        let provider = Arc::new(MockProbeProvider::new());
        let item = fixtures::strm_item("Movie");
        provider.set_behavior(item.id, MockBehavior::Hang).await;
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                cancel.cancel();
            })
        };

        let outcome = prober(&provider)
            .probe_one(&item, Duration::from_secs(30), &cancel)
            .await;
        canceller.await.unwrap();

        assert_eq!(outcome, ProbeOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_already_cancelled_skips_provider() {
        let provider = Arc::new(MockProbeProvider::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = prober(&provider)
            .probe_one(&fixtures::strm_item("Movie"), Duration::from_secs(5), &cancel)
            .await;

        assert_eq!(outcome, ProbeOutcome::Cancelled);
        assert_eq!(provider.call_count().await, 0);
    }

    #[tokio::test]
    async fn test_direct_probe_skips_refresh() {
        let provider = Arc::new(MockProbeProvider::new());
        provider.set_direct_probe_supported(true).await;
        let item = fixtures::strm_item("Movie");

        let outcome = prober(&provider)
            .probe_one(&item, Duration::from_secs(5), &CancellationToken::new())
            .await;

        assert_eq!(outcome, ProbeOutcome::Succeeded);
        assert_eq!(provider.direct_calls().await, vec![item.id]);
        assert!(provider.refresh_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_direct_probe_falls_back_to_refresh() {
        let provider = Arc::new(MockProbeProvider::new());
        let item = fixtures::strm_item("Movie");

        prober(&provider)
            .probe_one(&item, Duration::from_secs(5), &CancellationToken::new())
            .await;

        assert_eq!(provider.direct_calls().await, vec![item.id]);
        assert_eq!(provider.refresh_calls().await, vec![item.id]);
    }

    /// Hands the context token to a detached task, then never returns.
    struct DetachedWorkProvider {
        fired: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait::async_trait]
    impl ProbeProvider for DetachedWorkProvider {
        fn name(&self) -> &str {
            "detached"
        }

        async fn refresh(&self, _item: &Item, ctx: &ProbeContext) -> Result<(), ProviderError> {
            let token = ctx.token().clone();
            let fired = self.fired.clone();
            tokio::spawn(async move {
                token.cancelled().await;
                fired.store(true, std::sync::atomic::Ordering::SeqCst);
            });
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_deadline_fires_context_token() {
        let fired = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let prober = ItemProber::new(Arc::new(DetachedWorkProvider {
            fired: fired.clone(),
        }));
        let item = fixtures::strm_item("Slow");

        let outcome = prober
            .probe_one(&item, Duration::from_millis(50), &CancellationToken::new())
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(matches!(
            outcome,
            ProbeOutcome::Failed(FailureReason::Timeout { .. })
        ));
        assert!(fired.load(std::sync::atomic::Ordering::SeqCst));
    }
}
