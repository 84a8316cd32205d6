// Time-expiring map shared by all API endpoints, plus the index of finished downloads
//
// Entries expire a fixed time after insertion; expiry is checked on read.
// Concurrent misses on the same key may both fetch - the later insert wins.

use moka::future::Cache;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::models::MediaKind;

#[derive(Clone)]
pub struct TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<K, V>,
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// `max_capacity` bounds the entry count; least recently used entries go first
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();
        Self { inner }
    }

    /// Value for `key` unless it has expired
    pub async fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key).await
    }

    pub async fn insert(&self, key: K, value: V) {
        self.inner.insert(key, value).await;
    }
}

/// Which identifier each downloaded file belongs to.
///
/// Titles are not unique, so a file on disk is only reused for the
/// identifier that produced it.
#[derive(Clone)]
pub struct DownloadIndex {
    inner: Cache<(String, MediaKind), PathBuf>,
}

impl DownloadIndex {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder().max_capacity(max_capacity).build(),
        }
    }

    /// Path previously downloaded for `video_id`, if any
    pub async fn lookup(&self, video_id: &str, kind: MediaKind) -> Option<PathBuf> {
        self.inner.get(&(video_id.to_string(), kind)).await
    }

    /// Record `path` for `video_id`, dropping any other identifier whose file it replaced
    pub async fn record(&self, video_id: &str, kind: MediaKind, path: &Path) {
        let replaced: Vec<(String, MediaKind)> = self
            .inner
            .iter()
            .filter(|(key, owned)| owned.as_path() == path && key.0 != video_id)
            .map(|(key, _)| (*key).clone())
            .collect();
        for key in replaced {
            self.inner.invalidate(&key).await;
        }
        self.inner
            .insert((video_id.to_string(), kind), path.to_path_buf())
            .await;
    }
}

/// Cache key: endpoint plus its parameters sorted by name, values as sent.
/// Credentials never end up in here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub endpoint: String,
    pub params: Vec<(String, String)>,
}

impl RequestKey {
    pub fn new(endpoint: &str, params: &[(&str, String)]) -> Self {
        let mut params: Vec<(String, String)> = params
            .iter()
            .filter(|(name, _)| *name != "api_key")
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        params.sort();
        Self {
            endpoint: endpoint.trim_matches('/').to_string(),
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_before_expiry() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::from_secs(60), 100);
        cache.insert("a".to_string(), 1).await;
        assert_eq!(cache.get(&"a".to_string()).await, Some(1));
        assert_eq!(cache.get(&"b".to_string()).await, None);
    }

    #[tokio::test]
    async fn test_entry_expires() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::from_millis(50), 100);
        cache.insert("a".to_string(), 1).await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(cache.get(&"a".to_string()).await, None);
    }

    #[test]
    fn test_request_key_normalizes() {
        let a = RequestKey::new(
            "/info",
            &[("video_id", "abc".to_string()), ("api_key", "secret".to_string())],
        );
        let b = RequestKey::new("info", &[("video_id", "abc".to_string())]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_request_key_keeps_values_as_sent() {
        let padded = RequestKey::new("search", &[("q", " lofi ".to_string())]);
        let plain = RequestKey::new("search", &[("q", "lofi".to_string())]);
        assert_ne!(padded, plain);
    }

    #[tokio::test]
    async fn test_download_index_per_identifier() {
        let index = DownloadIndex::new(100);
        let path = PathBuf::from("downloads/Intro.mp3");

        index.record("aaaaaaaaaaa", MediaKind::Audio, &path).await;
        assert_eq!(index.lookup("aaaaaaaaaaa", MediaKind::Audio).await, Some(path.clone()));
        assert_eq!(index.lookup("bbbbbbbbbbb", MediaKind::Audio).await, None);
        assert_eq!(index.lookup("aaaaaaaaaaa", MediaKind::Video).await, None);

        // Same title, different track: the old owner loses the file
        index.record("bbbbbbbbbbb", MediaKind::Audio, &path).await;
        assert_eq!(index.lookup("aaaaaaaaaaa", MediaKind::Audio).await, None);
        assert_eq!(index.lookup("bbbbbbbbbbb", MediaKind::Audio).await, Some(path));
    }

    #[test]
    fn test_request_key_param_order() {
        let a = RequestKey::new(
            "playlist",
            &[("playlist_id", "PL".to_string()), ("limit", "10".to_string())],
        );
        let b = RequestKey::new(
            "playlist",
            &[("limit", "10".to_string()), ("playlist_id", "PL".to_string())],
        );
        assert_eq!(a, b);
    }
}
