//! Extracted media metadata and its sidecar persistence.
//!
//! The filesystem store keeps probe results next to the pointer file as
//! `<file>.mediainfo.json`. An item counts as probed once its sidecar lists
//! at least one stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

/// Suffix appended to the full file name of a probed item.
pub const SIDECAR_SUFFIX: &str = ".mediainfo.json";

/// Kind of an elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Other,
}

impl StreamKind {
    /// Maps an ffprobe `codec_type`.
    pub fn from_codec_type(codec_type: &str) -> Self {
        match codec_type {
            "video" => StreamKind::Video,
            "audio" => StreamKind::Audio,
            "subtitle" => StreamKind::Subtitle,
            _ => StreamKind::Other,
        }
    }
}

/// One elementary stream of a probed target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaStream {
    pub index: u32,
    pub kind: StreamKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Technical metadata of a probed stream target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Primary container name (first entry of ffprobe's `format_name`).
    pub container: Option<String>,
    pub duration_secs: Option<f64>,
    pub size_bytes: Option<u64>,
    pub bit_rate: Option<u64>,
    pub streams: Vec<MediaStream>,
    pub probed_at: DateTime<Utc>,
}

impl MediaInfo {
    pub fn video_streams(&self) -> impl Iterator<Item = &MediaStream> {
        self.streams.iter().filter(|s| s.kind == StreamKind::Video)
    }

    pub fn audio_streams(&self) -> impl Iterator<Item = &MediaStream> {
        self.streams.iter().filter(|s| s.kind == StreamKind::Audio)
    }
}

/// Returns the sidecar location for an item file.
pub fn sidecar_path(item_path: &Path) -> PathBuf {
    let mut name = item_path.as_os_str().to_owned();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

/// Whether `path` is itself a sidecar file.
pub fn is_sidecar_path(path: &Path) -> bool {
    path.to_string_lossy().ends_with(SIDECAR_SUFFIX)
}

/// Reads the sidecar of an item. `Ok(None)` when it does not exist.
pub fn read_sidecar(item_path: &Path) -> io::Result<Option<MediaInfo>> {
    let contents = match std::fs::read_to_string(sidecar_path(item_path)) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Writes the sidecar of an item, replacing any previous one atomically.
pub async fn write_sidecar(item_path: &Path, info: &MediaInfo) -> io::Result<()> {
    let target = sidecar_path(item_path);
    let mut tmp = target.clone().into_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let json = serde_json::to_vec_pretty(info)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, &target).await
}
