// Host failover - primary API host first, then each fallback in order

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::errors::ResolveError;
use super::traits::{ApiBackend, DownloadLimits};

pub struct HostFailover {
    backends: Vec<Box<dyn ApiBackend>>,
}

impl HostFailover {
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    pub fn add_backend(&mut self, backend: Box<dyn ApiBackend>) {
        self.backends.push(backend);
    }

    pub fn with_backend(mut self, backend: Box<dyn ApiBackend>) -> Self {
        self.add_backend(backend);
        self
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Wrap the last error once more than one host was tried
    fn exhausted(&self, last: Option<ResolveError>) -> ResolveError {
        match last {
            Some(err) if self.backends.len() > 1 => ResolveError::AllHostsFailed(Box::new(err)),
            Some(err) => err,
            None => ResolveError::Network("no API hosts configured".to_string()),
        }
    }
}

impl Default for HostFailover {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApiBackend for HostFailover {
    fn name(&self) -> &str {
        "failover"
    }

    async fn get_json(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value, ResolveError> {
        let mut last_error = None;

        for backend in &self.backends {
            debug!(backend = backend.name(), endpoint, "Trying API host");

            match backend.get_json(endpoint, params).await {
                Ok(value) => return Ok(value),
                Err(e) if e.should_try_next_host() => {
                    warn!(backend = backend.name(), endpoint, error = %e, "API host failed, trying next");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(self.exhausted(last_error))
    }

    async fn download(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        dest: &Path,
        limits: DownloadLimits,
        cancel: &CancellationToken,
    ) -> Result<u64, ResolveError> {
        let mut last_error = None;

        for backend in &self.backends {
            if cancel.is_cancelled() {
                return Err(ResolveError::Cancelled);
            }
            debug!(backend = backend.name(), endpoint, "Trying download host");

            match backend.download(endpoint, params, dest, limits, cancel).await {
                Ok(written) => return Ok(written),
                Err(e) if e.should_try_next_host() => {
                    warn!(backend = backend.name(), endpoint, error = %e, "Download host failed, trying next");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(self.exhausted(last_error))
    }
}
