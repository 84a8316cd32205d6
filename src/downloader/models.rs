// Common data models for the resolver

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use super::utils::format_duration;

/// Default thumbnail when the provider doesn't return one
pub fn default_thumbnail(video_id: &str) -> String {
    format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", video_id)
}

/// Audio or video variant of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MediaKind {
    #[default]
    Audio,
    Video,
}

impl MediaKind {
    pub fn from_video_flag(video: bool) -> Self {
        if video {
            Self::Video
        } else {
            Self::Audio
        }
    }

    /// API endpoint serving this kind
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Audio => "download/audio",
            Self::Video => "download/video",
        }
    }

    /// File extension of downloaded files
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Audio => "mp3",
            Self::Video => "mp4",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Result of matching a query against known link shapes
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Validation {
    pub is_valid: bool,
    pub video_id: Option<String>,
    pub playlist_id: Option<String>,
}

impl Validation {
    pub fn invalid() -> Self {
        Self::default()
    }
}

/// Duration as the API sends it: either "3:32" or a number of seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationField {
    Text(String),
    Seconds(f64),
}

impl DurationField {
    /// Normalize to "M:SS" / "H:MM:SS" text
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Text(s) if s.trim().is_empty() || s.eq_ignore_ascii_case("none") => None,
            Self::Text(s) => Some(s.trim().to_string()),
            Self::Seconds(secs) if *secs <= 0.0 => None,
            Self::Seconds(secs) => Some(format_duration(*secs as u64)),
        }
    }
}

/// Top search match from `/search`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub url: String,
    pub duration: Option<String>,
}

/// Raw `/search` body
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct SearchResponse {
    pub id: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub duration: Option<DurationField>,
}

impl SearchResponse {
    /// `None` when the body carries no usable id
    pub fn into_hit(self) -> Option<SearchHit> {
        let id = self.id.filter(|id| !id.trim().is_empty())?;
        Some(SearchHit {
            title: self
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| id.clone()),
            url: self
                .url
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", id)),
            duration: self.duration.and_then(|d| d.as_text()),
            id,
        })
    }
}

/// Canonical metadata from `/info`; every field may be missing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub duration: Option<DurationField>,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

impl MediaInfo {
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref().filter(|t| !t.trim().is_empty())
    }

    pub fn duration_text(&self) -> Option<String> {
        self.duration.as_ref().and_then(|d| d.as_text())
    }

    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Raw `/playlist` body
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct PlaylistResponse {
    #[serde(default)]
    pub video_ids: Vec<String>,
}

/// Everything the play command needs to queue a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackDetails {
    pub title: String,
    /// Duration as displayed, `None` when unknown (live streams, bad metadata)
    pub duration_text: Option<String>,
    /// 0 when unknown
    pub duration_seconds: u64,
    pub thumbnail_url: String,
    pub identifier: String,
    pub link: String,
}

/// What `fetch_or_stream` hands back to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadResult {
    /// File under the download directory, owned by the caller.
    /// `reused` is true when the file was already on disk and nothing was fetched.
    Local { path: PathBuf, reused: bool },
    /// Direct streaming URL, nothing stored locally
    Stream { url: String },
}

impl DownloadResult {
    pub fn is_stream(&self) -> bool {
        matches!(self, Self::Stream { .. })
    }

    pub fn local_path(&self) -> Option<&Path> {
        match self {
            Self::Local { path, .. } => Some(path),
            Self::Stream { .. } => None,
        }
    }

    pub fn stream_url(&self) -> Option<&str> {
        match self {
            Self::Stream { url } => Some(url),
            Self::Local { .. } => None,
        }
    }
}

/// Request stages, recorded on log events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Identifying,
    CacheHit,
    Searching,
    Informing,
    DecidingMode,
    Streaming,
    Downloading,
    Verifying,
    Fallback,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Identifying => "identifying",
            Self::CacheHit => "cache_hit",
            Self::Searching => "searching",
            Self::Informing => "informing",
            Self::DecidingMode => "deciding_mode",
            Self::Streaming => "streaming",
            Self::Downloading => "downloading",
            Self::Verifying => "verifying",
            Self::Fallback => "fallback",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}
