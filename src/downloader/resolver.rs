// Media resolver - turns a query or link into a local file or a stream URL
//
// Flow per request:
//   identify -> (cache hit | search -> info) -> decide mode -> (stream | download -> verify)
// Download failures fall back to streaming when it's enabled.

use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::backends::http::{build_client, HttpBackend};
use super::cache::{DownloadIndex, RequestKey, TtlCache};
use super::errors::{ResolveError, Result};
use super::links;
use super::models::{
    default_thumbnail, DownloadResult, MediaInfo, MediaKind, PlaylistResponse, SearchHit,
    SearchResponse, Stage, TrackDetails, Validation,
};
use super::orchestrator::HostFailover;
use super::traits::{ApiBackend, DownloadLimits};
use super::utils::{remove_files_older_than, sanitize_filename, time_to_seconds};
use crate::config::ResolverConfig;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Clone)]
pub struct MediaResolver {
    backend: Arc<dyn ApiBackend>,
    cache: TtlCache<RequestKey, Value>,
    downloads: DownloadIndex,
    config: Arc<ResolverConfig>,
}

impl MediaResolver {
    /// Resolver talking to `backend`; used directly by tests with a fake backend
    pub fn new(backend: Arc<dyn ApiBackend>, config: ResolverConfig) -> Self {
        let cache = TtlCache::new(config.cache_ttl(), config.cache_capacity);
        let downloads = DownloadIndex::new(config.cache_capacity);
        Self {
            backend,
            cache,
            downloads,
            config: Arc::new(config),
        }
    }

    /// Resolver over HTTP: primary host plus fallbacks, in order
    pub fn from_config(config: ResolverConfig) -> Result<Self> {
        let client = build_client(&config)?;
        let mut failover = HostFailover::new();
        for host in config.hosts() {
            failover.add_backend(Box::new(HttpBackend::new(
                client.clone(),
                &host,
                &config.api_key,
                config.download_timeout(),
            )));
        }
        if failover.is_empty() {
            return Err(ResolveError::InvalidQuery("no API host configured".to_string()));
        }
        info!(hosts = failover.len(), "Media resolver ready");
        Ok(Self::new(Arc::new(failover), config))
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Classify a query without network I/O
    pub fn validate(&self, query: &str) -> Validation {
        links::validate(query)
    }

    // ---------------------------------------------------------------------
    // API calls (cached)
    // ---------------------------------------------------------------------

    async fn cached_get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value> {
        let key = RequestKey::new(endpoint, params);
        if let Some(value) = self.cache.get(&key).await {
            debug!(stage = %Stage::CacheHit, endpoint, "Serving from cache");
            return Ok(value);
        }

        let value = self.backend.get_json(endpoint, params).await?;
        self.cache.insert(key, value.clone()).await;
        Ok(value)
    }

    async fn cached_parse<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let value = self.cached_get(endpoint, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Top search match, `NotFound` when there is none
    pub async fn search(&self, query: &str) -> Result<SearchHit> {
        debug!(stage = %Stage::Searching, query, "Searching");
        let response: SearchResponse = self.cached_parse("search", &[("q", query.to_string())]).await?;
        response
            .into_hit()
            .ok_or_else(|| ResolveError::NotFound(format!("no search results for '{}'", query)))
    }

    /// Canonical metadata for `video_id`
    pub async fn info(&self, video_id: &str) -> Result<MediaInfo> {
        debug!(stage = %Stage::Informing, video_id, "Fetching info");
        self.cached_parse("info", &[("video_id", video_id.to_string())]).await
    }

    /// Info, or empty metadata when the lookup fails for a reason other than `NotFound`
    async fn info_or_default(&self, video_id: &str) -> Result<MediaInfo> {
        match self.info(video_id).await {
            Ok(info) => Ok(info),
            Err(e @ ResolveError::NotFound(_)) => Err(e),
            Err(e) => {
                warn!(video_id, error = %e, "Info lookup failed, using fallback metadata");
                Ok(MediaInfo::default())
            }
        }
    }

    /// Duration in seconds from the (cached) info call; 0 when unknown
    pub async fn duration_seconds(&self, video_id: &str) -> u64 {
        match self.info(video_id).await {
            Ok(info) => info.duration_text().map(|d| time_to_seconds(&d)).unwrap_or(0),
            Err(e) => {
                debug!(video_id, error = %e, "Duration unknown");
                0
            }
        }
    }

    // ---------------------------------------------------------------------
    // Details
    // ---------------------------------------------------------------------

    /// Title, duration, thumbnail and identifier for a query or link.
    ///
    /// Links skip the search call. Fields missing from the info call fall back
    /// to the search hit, then to the identifier / default thumbnail.
    pub async fn resolve_details(&self, query: &str) -> Result<TrackDetails> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResolveError::InvalidQuery("empty query".to_string()));
        }

        debug!(stage = %Stage::Identifying, query, "Resolving details");
        let (video_id, hit, info) = match links::extract_video_id(query) {
            Some(id) => match self.info_or_default(&id).await {
                Ok(info) => (id, None, info),
                // An 11-character word may just be a one-word title
                Err(ResolveError::NotFound(_)) if !links::is_provider_url(query) => {
                    debug!(query, "Not a known identifier, searching instead");
                    self.search_with_info(query).await?
                }
                Err(e) => {
                    debug!(stage = %Stage::Failed, video_id = %id, error = %e, "Unknown identifier");
                    return Err(e);
                }
            },
            None => self.search_with_info(links::strip_extra_params(query)).await?,
        };

        let title = info
            .title()
            .map(str::to_string)
            .or_else(|| hit.as_ref().map(|h| h.title.clone()))
            .unwrap_or_else(|| video_id.clone());
        let duration_text = info
            .duration_text()
            .or_else(|| hit.as_ref().and_then(|h| h.duration.clone()));
        let duration_seconds = duration_text.as_deref().map(time_to_seconds).unwrap_or(0);
        let thumbnail_url = info
            .thumbnail()
            .map(str::to_string)
            .unwrap_or_else(|| default_thumbnail(&video_id));
        let link = hit
            .map(|h| h.url)
            .unwrap_or_else(|| links::watch_url(&video_id));

        Ok(TrackDetails {
            title,
            duration_text,
            duration_seconds,
            thumbnail_url,
            identifier: video_id,
            link,
        })
    }

    /// Top search match plus its info; info failures leave the hit's metadata in charge
    async fn search_with_info(&self, query: &str) -> Result<(String, Option<SearchHit>, MediaInfo)> {
        let hit = self.search(query).await.inspect_err(|e| {
            debug!(stage = %Stage::Failed, query, error = %e, "Search failed");
        })?;

        let info = match self.info(&hit.id).await {
            Ok(info) => info,
            Err(e) => {
                warn!(video_id = %hit.id, error = %e, "Info lookup failed, using search metadata");
                MediaInfo::default()
            }
        };
        Ok((hit.id.clone(), Some(hit), info))
    }

    /// Same as `resolve_details`; name used by the play command
    pub async fn track(&self, query: &str) -> Result<TrackDetails> {
        self.resolve_details(query).await
    }

    /// Video identifiers of a playlist link (at most `limit`)
    pub async fn playlist(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let playlist_id = links::extract_playlist_id(query)
            .or_else(|| {
                let bare = query.trim();
                (!bare.is_empty() && !bare.contains(['/', ' ', '?'])).then(|| bare.to_string())
            })
            .ok_or_else(|| ResolveError::InvalidQuery(format!("no playlist in '{}'", query)))?;

        let response: PlaylistResponse = self
            .cached_parse(
                "playlist",
                &[("playlist_id", playlist_id.clone()), ("limit", limit.to_string())],
            )
            .await?;

        let mut ids = response.video_ids;
        ids.retain(|id| !id.trim().is_empty());
        ids.truncate(limit);
        debug!(playlist_id = %playlist_id, count = ids.len(), "Playlist resolved");
        Ok(ids)
    }

    // ---------------------------------------------------------------------
    // Stream / download
    // ---------------------------------------------------------------------

    /// Direct streaming URL for `video_id` on the primary host
    pub fn stream_url(&self, video_id: &str, kind: MediaKind) -> Result<String> {
        let base = self.config.api_base.trim_end_matches('/');
        let endpoint = format!("{}/{}", base, kind.endpoint());

        let mut params: Vec<(&str, String)> = vec![("video_id", video_id.to_string())];
        if kind == MediaKind::Video {
            params.push(("max_res", self.config.max_video_resolution.to_string()));
        }
        params.push(("api_key", self.config.api_key.clone()));

        Url::parse_with_params(&endpoint, &params)
            .map(String::from)
            .map_err(|e| ResolveError::InvalidQuery(format!("bad API base '{}': {}", base, e)))
    }

    fn stream_result(&self, video_id: &str, kind: MediaKind) -> Result<DownloadResult> {
        let url = self.stream_url(video_id, kind)?;
        debug!(stage = %Stage::Streaming, video_id, "Returning stream URL");
        Ok(DownloadResult::Stream { url })
    }

    /// Fetch `video_id` to the download directory, or hand back a stream URL.
    pub async fn fetch_or_stream(&self, video_id: &str, kind: MediaKind) -> Result<DownloadResult> {
        self.fetch_or_stream_with_cancel(video_id, kind, &CancellationToken::new())
            .await
    }

    /// Like `fetch_or_stream`; cancelling `cancel` aborts an in-flight transfer
    pub async fn fetch_or_stream_with_cancel(
        &self,
        video_id: &str,
        kind: MediaKind,
        cancel: &CancellationToken,
    ) -> Result<DownloadResult> {
        let video_id = links::extract_video_id(video_id)
            .ok_or_else(|| ResolveError::InvalidQuery(format!("no video id in '{}'", video_id)))?;

        debug!(stage = %Stage::DecidingMode, video_id = %video_id, %kind, "Choosing stream or download");
        if self.config.enable_streaming {
            let duration = self.duration_seconds(&video_id).await;
            if duration > self.config.stream_threshold_secs {
                info!(
                    video_id = %video_id,
                    duration,
                    threshold = self.config.stream_threshold_secs,
                    "Long track, streaming instead of downloading"
                );
                return self.stream_result(&video_id, kind);
            }
        }

        match self.download(&video_id, kind, cancel).await {
            Ok(result) => {
                debug!(stage = %Stage::Done, video_id = %video_id, "Track ready");
                Ok(result)
            }
            Err(ResolveError::Cancelled) => Err(ResolveError::Cancelled),
            Err(e) if self.config.enable_streaming => {
                warn!(stage = %Stage::Fallback, video_id = %video_id, error = %e, "Download failed, falling back to streaming");
                self.stream_result(&video_id, kind)
            }
            Err(e) => {
                warn!(stage = %Stage::Failed, video_id = %video_id, error = %e, "Download failed");
                Err(e)
            }
        }
    }

    /// Local path a track would be saved to
    pub async fn target_path(&self, video_id: &str, kind: MediaKind) -> PathBuf {
        let title = match self.info(video_id).await {
            Ok(info) => info.title().map(str::to_string),
            Err(_) => None,
        };
        let stem = sanitize_filename(title.as_deref().unwrap_or(""), video_id);
        self.config
            .download_dir
            .join(format!("{}.{}", stem, kind.extension()))
    }

    async fn download(
        &self,
        video_id: &str,
        kind: MediaKind,
        cancel: &CancellationToken,
    ) -> Result<DownloadResult> {
        if let Some(path) = self.downloads.lookup(video_id, kind).await {
            if self.verify_size(&path).await.is_ok() {
                debug!(video_id, path = %path.display(), "Already downloaded");
                return Ok(DownloadResult::Local { path, reused: true });
            }
        }

        let path = self.target_path(video_id, kind).await;

        tokio::fs::create_dir_all(&self.config.download_dir).await?;
        let partial = partial_path(&path);

        let mut params: Vec<(&str, String)> = vec![
            ("video_id", video_id.to_string()),
            ("mode", "download".to_string()),
            ("no_redirect", "1".to_string()),
        ];
        if kind == MediaKind::Video {
            params.push(("max_res", self.config.max_video_resolution.to_string()));
        }

        let limits = DownloadLimits {
            max_bytes: self.config.max_download_bytes(),
            chunk_size: self.config.chunk_size.max(1),
        };

        info!(stage = %Stage::Downloading, video_id, %kind, path = %path.display(), "Downloading");
        let transfer = self
            .backend
            .download(kind.endpoint(), &params, &partial, limits, cancel);
        let outcome = match tokio::time::timeout(self.config.download_timeout(), transfer).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ResolveError::Timeout(format!(
                "download of {} after {}s",
                video_id, self.config.download_timeout_secs
            ))),
        };
        if let Err(e) = outcome {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }

        debug!(stage = %Stage::Verifying, path = %partial.display(), "Verifying download");
        if let Err(e) = self.verify_size(&partial).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }

        tokio::fs::rename(&partial, &path).await?;
        self.downloads.record(video_id, kind, &path).await;
        Ok(DownloadResult::Local {
            path,
            reused: false,
        })
    }

    /// File exists, is non-empty and within the size cap
    async fn verify_size(&self, path: &Path) -> Result<u64> {
        let size = tokio::fs::metadata(path).await?.len();
        if size == 0 {
            return Err(ResolveError::InvalidResponse(format!(
                "{} is empty",
                path.display()
            )));
        }
        if size > self.config.max_download_bytes() {
            return Err(ResolveError::TooLarge {
                size_mb: size as f64 / BYTES_PER_MB,
                limit_mb: self.config.max_download_mb,
            });
        }
        Ok(size)
    }

    /// Delete downloads older than `max_age_hours`; returns how many were removed
    pub async fn cleanup_stale(&self, max_age_hours: u64) -> usize {
        let max_age = Duration::from_secs(max_age_hours.saturating_mul(3600));
        let removed = remove_files_older_than(&self.config.download_dir, max_age).await;
        if removed > 0 {
            info!(removed, max_age_hours, "Cleaned up stale downloads");
        }
        removed
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("downloads/Song.mp3")),
            PathBuf::from("downloads/Song.mp3.part")
        );
    }
}
