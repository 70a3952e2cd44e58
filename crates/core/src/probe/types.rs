//! Types for probe outcomes and batch results.

use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::library::Item;

/// Why a single probe failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The per-item deadline elapsed.
    Timeout { timeout_secs: u64 },
    /// The provider reported an error.
    Provider(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Timeout { timeout_secs } => {
                write!(f, "timed out after {}s", timeout_secs)
            }
            FailureReason::Provider(msg) => write!(f, "{}", msg),
        }
    }
}

/// Outcome of probing one item.
///
/// Timeouts and caller cancellation are different variants because they
/// propagate differently: a failure is counted and the batch goes on, a
/// cancellation aborts the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Succeeded,
    Failed(FailureReason),
    Cancelled,
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Succeeded)
    }

    /// Label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ProbeOutcome::Succeeded => "success",
            ProbeOutcome::Failed(FailureReason::Timeout { .. }) => "timeout",
            ProbeOutcome::Failed(FailureReason::Provider(_)) => "failure",
            ProbeOutcome::Cancelled => "cancelled",
        }
    }
}

/// Result of the provider's fast path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectProbe {
    /// The item was probed and its metadata persisted.
    Probed,
    /// The fast path cannot handle this item; use the full refresh.
    Unsupported,
}

/// Deadline-bound context handed to a probe provider.
///
/// The token fires when the batch is cancelled, when the per-item deadline
/// elapses, or once the prober is done with the item, whichever comes
/// first. A provider still running at the deadline is dropped right after
/// the token fires, so work it spawned elsewhere should watch the token.
#[derive(Debug, Clone)]
pub struct ProbeContext {
    token: CancellationToken,
    deadline: Instant,
}

impl ProbeContext {
    pub fn new(token: CancellationToken, deadline: Instant) -> Self {
        Self { token, deadline }
    }

    /// Context for `timeout` from now, cancelled together with `parent`.
    pub fn child_of(parent: &CancellationToken, timeout: Duration) -> Self {
        Self::new(parent.child_token(), Instant::now() + timeout)
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once the context is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Time left before the deadline.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// Aggregated result of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProbeResult {
    /// Items probed successfully.
    pub probed: usize,
    /// Items whose probe failed.
    pub failed: usize,
    /// The failed items, in no particular order.
    pub failed_items: Vec<Item>,
}

impl ProbeResult {
    /// Items attempted (`probed + failed`).
    pub fn attempted(&self) -> usize {
        self.probed + self.failed
    }

    /// Failure rate in percent; 0 when nothing was attempted.
    pub fn failure_rate_percent(&self) -> f64 {
        match self.attempted() {
            0 => 0.0,
            total => self.failed as f64 / total as f64 * 100.0,
        }
    }
}
