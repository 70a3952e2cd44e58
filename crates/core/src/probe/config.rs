//! Probe settings and the per-batch configuration derived from them.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::library::LibraryId;

/// Allowed range for [`ProbeSettings::probe_parallelism`].
pub const PARALLELISM_RANGE: (i32, i32) = (1, 20);
/// Allowed range for [`ProbeSettings::probe_timeout_seconds`].
pub const TIMEOUT_SECONDS_RANGE: (i32, i32) = (10, 300);
/// Allowed range for [`ProbeSettings::probe_cooldown_ms`].
pub const COOLDOWN_MS_RANGE: (i32, i32) = (0, 5000);

/// Persisted probe settings (the `[probe]` table).
///
/// Values may be out of range as loaded; call [`validate`](Self::validate)
/// before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeSettings {
    /// Probe new `.strm` items shortly after they are added.
    #[serde(default = "default_true")]
    pub enable_catch_up_mode: bool,

    /// Number of parallel probes. Higher is faster but loads upstream servers.
    #[serde(default = "default_parallelism")]
    pub probe_parallelism: i32,

    /// Per-item probe timeout.
    #[serde(default = "default_timeout_seconds")]
    pub probe_timeout_seconds: i32,

    /// Pause after each probe, per worker.
    #[serde(default = "default_cooldown_ms")]
    pub probe_cooldown_ms: i32,

    /// Delete `.strm` files whose probe failed. They are recreated by the
    /// next library sync.
    #[serde(default)]
    pub delete_failed_strms: bool,

    /// Skip deletion when the batch failure rate (percent) exceeds this.
    #[serde(default = "default_failure_threshold")]
    pub delete_failure_threshold: f64,

    /// Libraries to probe. Empty means all.
    #[serde(default)]
    pub selected_library_ids: Vec<LibraryId>,
}

fn default_true() -> bool {
    true
}

fn default_parallelism() -> i32 {
    5
}

fn default_timeout_seconds() -> i32 {
    60
}

fn default_cooldown_ms() -> i32 {
    200
}

fn default_failure_threshold() -> f64 {
    50.0
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            enable_catch_up_mode: true,
            probe_parallelism: default_parallelism(),
            probe_timeout_seconds: default_timeout_seconds(),
            probe_cooldown_ms: default_cooldown_ms(),
            delete_failed_strms: false,
            delete_failure_threshold: default_failure_threshold(),
            selected_library_ids: Vec::new(),
        }
    }
}

impl ProbeSettings {
    /// Clamps all numeric knobs to their safe ranges. Idempotent.
    pub fn validate(&mut self) {
        self.probe_parallelism = self
            .probe_parallelism
            .clamp(PARALLELISM_RANGE.0, PARALLELISM_RANGE.1);
        self.probe_timeout_seconds = self
            .probe_timeout_seconds
            .clamp(TIMEOUT_SECONDS_RANGE.0, TIMEOUT_SECONDS_RANGE.1);
        self.probe_cooldown_ms = self
            .probe_cooldown_ms
            .clamp(COOLDOWN_MS_RANGE.0, COOLDOWN_MS_RANGE.1);
    }

    /// Returns a validated copy.
    pub fn validated(mut self) -> Self {
        self.validate();
        self
    }

    /// Builds the validated batch configuration for one run.
    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            parallelism: self.probe_parallelism.max(0) as usize,
            timeout_secs: self.probe_timeout_seconds.max(0) as u64,
            cooldown_ms: self.probe_cooldown_ms.max(0) as u64,
            delete_failed: self.delete_failed_strms,
            delete_failure_threshold_percent: self.delete_failure_threshold,
            selected_library_ids: self.selected_library_ids.clone(),
        }
        .validated()
    }
}

/// Configuration of one batch call, passed by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    pub parallelism: usize,
    pub timeout_secs: u64,
    pub cooldown_ms: u64,
    pub delete_failed: bool,
    pub delete_failure_threshold_percent: f64,
    pub selected_library_ids: Vec<LibraryId>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        ProbeSettings::default().batch_config()
    }
}

impl BatchConfig {
    /// Clamps parallelism, timeout and cooldown. Idempotent.
    pub fn validate(&mut self) {
        self.parallelism = self
            .parallelism
            .clamp(PARALLELISM_RANGE.0 as usize, PARALLELISM_RANGE.1 as usize);
        self.timeout_secs = self
            .timeout_secs
            .clamp(TIMEOUT_SECONDS_RANGE.0 as u64, TIMEOUT_SECONDS_RANGE.1 as u64);
        self.cooldown_ms = self
            .cooldown_ms
            .clamp(COOLDOWN_MS_RANGE.0 as u64, COOLDOWN_MS_RANGE.1 as u64);
    }

    /// Returns a validated copy.
    pub fn validated(mut self) -> Self {
        self.validate();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Sets the parallelism (clamped on validation).
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Sets the per-item timeout in seconds (clamped on validation).
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Sets the cooldown in milliseconds (clamped on validation).
    pub fn with_cooldown_ms(mut self, ms: u64) -> Self {
        self.cooldown_ms = ms;
        self
    }

    /// Enables deletion of failed items under the given failure threshold.
    pub fn with_deletion(mut self, threshold_percent: f64) -> Self {
        self.delete_failed = true;
        self.delete_failure_threshold_percent = threshold_percent;
        self
    }
}
