//! Trait definitions for the probe module.

use async_trait::async_trait;

use super::error::ProviderError;
use super::types::{DirectProbe, ProbeContext};
use crate::library::Item;

/// Extracts media metadata for an item and persists it.
///
/// Implementations must watch `ctx` and return
/// [`ProviderError::Cancelled`] once it fires.
#[async_trait]
pub trait ProbeProvider: Send + Sync {
    /// Returns the name of this provider implementation.
    fn name(&self) -> &str;

    /// Fast path: probe the stream target directly, skipping any other
    /// metadata work. Providers without a fast path keep the default.
    async fn direct_probe(
        &self,
        _item: &Item,
        _ctx: &ProbeContext,
    ) -> Result<DirectProbe, ProviderError> {
        Ok(DirectProbe::Unsupported)
    }

    /// Full metadata refresh of the item, including the stream probe.
    async fn refresh(&self, item: &Item, ctx: &ProbeContext) -> Result<(), ProviderError>;
}

/// Receives batch progress in percent, in `(0, 100]`.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: f64);
}

impl<F> ProgressSink for F
where
    F: Fn(f64) + Send + Sync,
{
    fn report(&self, percent: f64) {
        self(percent)
    }
}

/// Progress sink that drops every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardProgress;

impl ProgressSink for DiscardProgress {
    fn report(&self, _percent: f64) {}
}
