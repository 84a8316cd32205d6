//! Resolver configuration
//!
//! Loaded from `config/resolver.*`, the user config directory and
//! `RESOLVER_*` environment variables, later sources overriding earlier ones.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Settings for the media resolver and its HTTP backends
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Primary API host; stream URLs are built against it
    pub api_base: String,
    /// Hosts tried in order after the primary fails
    pub fallback_hosts: Vec<String>,
    /// Shared static API key appended to every request
    pub api_key: String,
    /// Return stream URLs for long tracks and when downloads fail
    pub enable_streaming: bool,
    /// Tracks longer than this are streamed instead of downloaded
    pub stream_threshold_secs: u64,
    /// Downloads larger than this are discarded
    pub max_download_mb: u64,
    pub download_dir: PathBuf,
    /// Write buffer size for downloads, in bytes
    pub chunk_size: usize,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Overall limit for one download
    pub download_timeout_secs: u64,
    pub cache_ttl_secs: u64,
    pub cache_capacity: u64,
    /// `max_res` sent for video downloads and streams
    pub max_video_resolution: u32,
    /// Optional HTTP or SOCKS5 proxy (e.g., "socks5://127.0.0.1:1080")
    pub proxy: Option<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            api_base: "https://youtubify.me".to_string(),
            fallback_hosts: Vec::new(),
            api_key: String::new(),
            enable_streaming: true,
            stream_threshold_secs: 1200,
            max_download_mb: 48,
            download_dir: PathBuf::from("downloads"),
            chunk_size: 128 * 1024,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            download_timeout_secs: 600,
            cache_ttl_secs: 300,
            cache_capacity: 10_000,
            max_video_resolution: 720,
            proxy: None,
        }
    }
}

impl ResolverConfig {
    /// Load from config files and the environment.
    ///
    /// Environment variables use the `RESOLVER_` prefix, e.g. `RESOLVER_API_KEY`,
    /// `RESOLVER_FALLBACK_HOSTS=https://a.example,https://b.example`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a source is malformed.
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(File::with_name("config/resolver").required(false));

        if let Some(user_config) = Self::user_config_path() {
            builder = builder.add_source(File::from(user_config).required(false));
        }

        builder
            .add_source(
                Environment::with_prefix("RESOLVER")
                    .prefix_separator("_")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("fallback_hosts")
                    .ignore_empty(true),
            )
            .build()?
            .try_deserialize()
    }

    /// `<config dir>/media-resolver/config` (extension picked by the loader)
    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("media-resolver").join("config"))
    }

    /// Primary host followed by the fallbacks, deduplicated, order kept
    pub fn hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = Vec::new();
        for host in std::iter::once(&self.api_base).chain(self.fallback_hosts.iter()) {
            let host = host.trim().trim_end_matches('/').to_string();
            if !host.is_empty() && !hosts.contains(&host) {
                hosts.push(host);
            }
        }
        hosts
    }

    pub fn max_download_bytes(&self) -> u64 {
        self.max_download_mb.saturating_mul(1024 * 1024)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();
        assert!(config.enable_streaming);
        assert_eq!(config.stream_threshold_secs, 1200);
        assert_eq!(config.max_download_bytes(), 48 * 1024 * 1024);
        assert_eq!(config.chunk_size, 131_072);
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_huge_size_cap_saturates() {
        let config = ResolverConfig {
            max_download_mb: u64::MAX,
            ..ResolverConfig::default()
        };
        assert_eq!(config.max_download_bytes(), u64::MAX);
    }

    #[test]
    fn test_hosts_order_and_dedup() {
        let config = ResolverConfig {
            api_base: "https://primary.example/".to_string(),
            fallback_hosts: vec![
                "https://backup.example".to_string(),
                "https://primary.example".to_string(),
                " ".to_string(),
            ],
            ..ResolverConfig::default()
        };
        assert_eq!(
            config.hosts(),
            vec!["https://primary.example", "https://backup.example"]
        );
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: ResolverConfig = Config::builder()
            .add_source(config::File::from_str(
                "api_key = \"abc\"\nmax_download_mb = 10",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.api_key, "abc");
        assert_eq!(config.max_download_mb, 10);
        assert_eq!(config.stream_threshold_secs, 1200);
    }
}
