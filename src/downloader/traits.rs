// API backend trait definition

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use super::errors::ResolveError;

/// Limits applied while streaming a download to disk
#[derive(Debug, Clone, Copy)]
pub struct DownloadLimits {
    /// Abort once this many bytes have been written
    pub max_bytes: u64,
    /// Write buffer size
    pub chunk_size: usize,
}

/// One way of reaching the media API (a single host, or a failover group of hosts)
#[async_trait]
pub trait ApiBackend: Send + Sync {
    /// Name of the backend (for logging)
    fn name(&self) -> &str;

    /// GET `endpoint` with `params` and decode the JSON body.
    /// The backend adds credentials itself.
    async fn get_json(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value, ResolveError>;

    /// GET `endpoint` and stream the body into `dest`, returning bytes written.
    /// On error or cancellation `dest` must not be left behind.
    async fn download(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        dest: &Path,
        limits: DownloadLimits,
        cancel: &CancellationToken,
    ) -> Result<u64, ResolveError>;
}
