//! Probing: per-item prober, batch orchestrator and the ffprobe provider.

mod config;
mod error;
mod ffprobe;
mod orchestrator;
mod prober;
mod traits;
mod types;

pub use config::{
    BatchConfig, ProbeSettings, COOLDOWN_MS_RANGE, PARALLELISM_RANGE, TIMEOUT_SECONDS_RANGE,
};
pub use error::{BatchError, ProviderError};
pub use ffprobe::{parse_probe_output, read_stream_url, FfprobeConfig, FfprobeProvider};
pub use orchestrator::ProbeOrchestrator;
pub use prober::ItemProber;
pub use traits::{DiscardProgress, ProbeProvider, ProgressSink};
pub use types::{DirectProbe, FailureReason, ProbeContext, ProbeOutcome, ProbeResult};
