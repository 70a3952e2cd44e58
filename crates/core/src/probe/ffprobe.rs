//! ffprobe-based probe provider.
//!
//! Reads the stream address out of a `.strm` pointer, runs ffprobe against
//! it and stores the result as the item's media info sidecar.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::error::ProviderError;
use super::traits::ProbeProvider;
use super::types::{DirectProbe, ProbeContext};
use crate::library::{write_sidecar, Item, MediaInfo, MediaStream, StreamKind};

/// Configuration for the ffprobe provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FfprobeConfig {
    /// Path to ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub path: PathBuf,

    /// Additional arguments placed before the input (e.g. `-rw_timeout`).
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

impl Default for FfprobeConfig {
    fn default() -> Self {
        Self {
            path: default_ffprobe_path(),
            extra_args: Vec::new(),
        }
    }
}

/// Probe provider backed by the ffprobe binary.
pub struct FfprobeProvider {
    config: FfprobeConfig,
}

impl FfprobeProvider {
    pub fn new(config: FfprobeConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(FfprobeConfig::default())
    }

    /// Checks that the ffprobe binary can be executed.
    pub async fn validate(&self) -> Result<(), ProviderError> {
        Command::new(&self.config.path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| self.spawn_error(e))?;
        Ok(())
    }

    fn build_args(&self, input: &str) -> Vec<String> {
        let mut args: Vec<String> = [
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.extend(self.config.extra_args.iter().cloned());
        args.push(input.to_string());
        args
    }

    fn spawn_error(&self, e: std::io::Error) -> ProviderError {
        if e.kind() == std::io::ErrorKind::NotFound {
            ProviderError::FfprobeNotFound {
                path: self.config.path.clone(),
            }
        } else {
            ProviderError::Io(e)
        }
    }

    /// Runs ffprobe on `input`. The child is killed if the context fires.
    async fn run_ffprobe(&self, input: &str, ctx: &ProbeContext) -> Result<MediaInfo, ProviderError> {
        let run = Command::new(&self.config.path)
            .args(self.build_args(input))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::select! {
            _ = ctx.cancelled() => return Err(ProviderError::Cancelled),
            result = run => result.map_err(|e| self.spawn_error(e))?,
        };

        if !output.status.success() {
            return Err(ProviderError::probe_failed(format!(
                "ffprobe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_probe_output(&String::from_utf8_lossy(&output.stdout))
    }

    /// Probes `input` and writes the sidecar for `item_path`.
    async fn probe_and_store(
        &self,
        item_path: &Path,
        input: &str,
        ctx: &ProbeContext,
    ) -> Result<(), ProviderError> {
        let info = self.run_ffprobe(input, ctx).await?;
        debug!(
            "ffprobe found {} streams for {}",
            info.streams.len(),
            item_path.display()
        );
        write_sidecar(item_path, &info).await?;
        Ok(())
    }
}

#[async_trait]
impl ProbeProvider for FfprobeProvider {
    fn name(&self) -> &str {
        "ffprobe"
    }

    async fn direct_probe(
        &self,
        item: &Item,
        ctx: &ProbeContext,
    ) -> Result<DirectProbe, ProviderError> {
        if !item.is_strm() {
            return Ok(DirectProbe::Unsupported);
        }
        let path = item.path.as_deref().ok_or(ProviderError::MissingPath)?;
        let url = read_stream_url(path).await?;
        self.probe_and_store(path, &url, ctx).await?;
        Ok(DirectProbe::Probed)
    }

    async fn refresh(&self, item: &Item, ctx: &ProbeContext) -> Result<(), ProviderError> {
        let path = item.path.as_deref().ok_or(ProviderError::MissingPath)?;
        let input = if item.is_strm() {
            read_stream_url(path).await?
        } else {
            path.to_string_lossy().into_owned()
        };
        self.probe_and_store(path, &input, ctx).await
    }
}

/// Reads the stream address from a pointer file: the first non-empty line
/// that is not a `#` comment.
pub async fn read_stream_url(path: &Path) -> Result<String, ProviderError> {
    let contents = tokio::fs::read_to_string(path).await?;
    contents
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .ok_or_else(|| ProviderError::EmptyPointer {
            path: path.to_path_buf(),
        })
}

/// Parses ffprobe JSON output into MediaInfo.
pub fn parse_probe_output(output: &str) -> Result<MediaInfo, ProviderError> {
    #[derive(Deserialize)]
    struct ProbeOutput {
        #[serde(default)]
        format: Option<ProbeFormat>,
        #[serde(default)]
        streams: Vec<ProbeStream>,
    }

    #[derive(Deserialize)]
    struct ProbeFormat {
        format_name: Option<String>,
        duration: Option<String>,
        size: Option<String>,
        bit_rate: Option<String>,
    }

    #[derive(Deserialize)]
    struct ProbeStream {
        index: u32,
        codec_type: Option<String>,
        codec_name: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        channels: Option<u8>,
        sample_rate: Option<String>,
        #[serde(default)]
        tags: Option<ProbeTags>,
    }

    #[derive(Deserialize)]
    struct ProbeTags {
        language: Option<String>,
    }

    let probe: ProbeOutput =
        serde_json::from_str(output).map_err(|e| ProviderError::ParseError {
            reason: format!("Failed to parse ffprobe output: {}", e),
        })?;

    if probe.streams.is_empty() {
        return Err(ProviderError::NoStreams);
    }

    let streams = probe
        .streams
        .into_iter()
        .map(|s| MediaStream {
            index: s.index,
            kind: StreamKind::from_codec_type(s.codec_type.as_deref().unwrap_or_default()),
            codec: s.codec_name,
            width: s.width,
            height: s.height,
            channels: s.channels,
            sample_rate: s.sample_rate.and_then(|r| r.parse().ok()),
            language: s.tags.and_then(|t| t.language),
        })
        .collect();

    let format = probe.format;
    Ok(MediaInfo {
        container: format
            .as_ref()
            .and_then(|f| f.format_name.as_deref())
            .and_then(|name| name.split(',').next())
            .map(str::to_string),
        duration_secs: format
            .as_ref()
            .and_then(|f| f.duration.as_ref())
            .and_then(|d| d.parse().ok()),
        size_bytes: format
            .as_ref()
            .and_then(|f| f.size.as_ref())
            .and_then(|s| s.parse().ok()),
        bit_rate: format
            .as_ref()
            .and_then(|f| f.bit_rate.as_ref())
            .and_then(|b| b.parse().ok()),
        streams,
        probed_at: Utc::now(),
    })
}
