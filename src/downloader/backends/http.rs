use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ResolverConfig;
use crate::downloader::errors::ResolveError;
use crate::downloader::traits::{ApiBackend, DownloadLimits};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Build the shared HTTP client (connect / read / pool timeouts, optional proxy)
pub fn build_client(config: &ResolverConfig) -> Result<reqwest::Client, ResolveError> {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .pool_idle_timeout(Duration::from_secs(config.connect_timeout_secs));

    if let Some(proxy_url) = config.proxy.as_deref() {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| ResolveError::Network(format!("Invalid proxy URL {}: {}", proxy_url, e)))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| ResolveError::Network(format!("Failed to build HTTP client: {}", e)))
}

/// Media API reached over HTTP at a single host
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    download_timeout: Duration,
}

impl HttpBackend {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        api_key: &str,
        download_timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            download_timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    fn with_key<'a>(&'a self, params: &'a [(&'a str, String)]) -> Vec<(&'a str, &'a str)> {
        params
            .iter()
            .map(|(name, value)| (*name, value.as_str()))
            .chain(std::iter::once(("api_key", self.api_key.as_str())))
            .collect()
    }

    async fn stream_to_file(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        dest: &Path,
        limits: DownloadLimits,
        cancel: &CancellationToken,
    ) -> Result<u64, ResolveError> {
        let request = self
            .client
            .get(self.endpoint_url(endpoint))
            .query(&self.with_key(params))
            .timeout(self.download_timeout);

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
            sent = request.send() => sent.map_err(|e| ResolveError::from_reqwest(&self.base_url, &e))?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::from_status(&self.base_url, status));
        }

        let limit_mb = limits.max_bytes / (1024 * 1024);
        if let Some(len) = response.content_length() {
            if len > limits.max_bytes {
                return Err(ResolveError::TooLarge {
                    size_mb: len as f64 / BYTES_PER_MB,
                    limit_mb,
                });
            }
        }

        let file = tokio::fs::File::create(dest).await?;
        let mut writer = BufWriter::with_capacity(limits.chunk_size, file);
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ResolveError::Cancelled),
                next = stream.next() => next,
            };
            let Some(chunk) = next else { break };
            let chunk = chunk.map_err(|e| ResolveError::from_reqwest(&self.base_url, &e))?;

            written += chunk.len() as u64;
            if written > limits.max_bytes {
                return Err(ResolveError::TooLarge {
                    size_mb: written as f64 / BYTES_PER_MB,
                    limit_mb,
                });
            }
            writer.write_all(&chunk).await?;
        }

        writer.flush().await?;
        debug!(host = %self.base_url, endpoint, bytes = written, "Download finished");
        Ok(written)
    }
}

#[async_trait]
impl ApiBackend for HttpBackend {
    fn name(&self) -> &str {
        &self.base_url
    }

    async fn get_json(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value, ResolveError> {
        let url = self.endpoint_url(endpoint);
        debug!(url = %url, "API request");

        let response = self
            .client
            .get(&url)
            .query(&self.with_key(params))
            .send()
            .await
            .map_err(|e| ResolveError::from_reqwest(&self.base_url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::from_status(&self.base_url, status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ResolveError::from_reqwest(&self.base_url, &e))?;

        serde_json::from_str(&body)
            .map_err(|e| ResolveError::InvalidResponse(format!("{} from {}: {}", endpoint, self.base_url, e)))
    }

    async fn download(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        dest: &Path,
        limits: DownloadLimits,
        cancel: &CancellationToken,
    ) -> Result<u64, ResolveError> {
        let result = self.stream_to_file(endpoint, params, dest, limits, cancel).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(dest).await;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> HttpBackend {
        HttpBackend::new(
            reqwest::Client::new(),
            "https://api.example.com/",
            "key123",
            Duration::from_secs(600),
        )
    }

    #[test]
    fn test_endpoint_url_joins_cleanly() {
        let b = backend();
        assert_eq!(b.base_url(), "https://api.example.com");
        assert_eq!(b.endpoint_url("/info"), "https://api.example.com/info");
        assert_eq!(
            b.endpoint_url("download/audio"),
            "https://api.example.com/download/audio"
        );
    }

    #[test]
    fn test_api_key_appended() {
        let b = backend();
        let params = [("video_id", "abc".to_string())];
        let query = b.with_key(&params);
        assert_eq!(query, vec![("video_id", "abc"), ("api_key", "key123")]);
    }

    #[test]
    fn test_build_client_rejects_bad_proxy() {
        let config = ResolverConfig {
            proxy: Some("not a proxy url".to_string()),
            ..ResolverConfig::default()
        };
        assert!(build_client(&config).is_err());
    }

    /// Serve one canned HTTP response on a local port, returning the base URL
    async fn serve_once(head: String, body: Vec<u8>) -> String {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(&body).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{}", addr)
    }

    /// Chunked body of `total` bytes, sent in 256-byte chunks
    fn chunked_body(total: usize) -> Vec<u8> {
        let mut body = Vec::new();
        let mut left = total;
        while left > 0 {
            let n = left.min(256);
            body.extend_from_slice(format!("{:x}\r\n", n).as_bytes());
            body.extend(std::iter::repeat(b'x').take(n));
            body.extend_from_slice(b"\r\n");
            left -= n;
        }
        body.extend_from_slice(b"0\r\n\r\n");
        body
    }

    fn local_backend(base_url: &str) -> HttpBackend {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        HttpBackend::new(client, base_url, "key123", Duration::from_secs(10))
    }

    fn temp_dest(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("media-resolver-http-{}", name));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("track.mp3.part")
    }

    const SMALL_LIMITS: DownloadLimits = DownloadLimits {
        max_bytes: 1024,
        chunk_size: 128,
    };

    #[tokio::test]
    async fn test_download_within_cap() {
        let head = "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n";
        let base = serve_once(head.to_string(), chunked_body(1000)).await;
        let dest = temp_dest("within-cap");

        let written = local_backend(&base)
            .download("download/audio", &[], &dest, SMALL_LIMITS, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(written, 1000);
        assert_eq!(std::fs::metadata(&dest).unwrap().len(), 1000);
        let _ = std::fs::remove_file(&dest);
    }

    #[tokio::test]
    async fn test_streamed_body_over_cap_is_aborted() {
        let head = "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n";
        let base = serve_once(head.to_string(), chunked_body(4096)).await;
        let dest = temp_dest("running-cap");

        let result = local_backend(&base)
            .download("download/audio", &[], &dest, SMALL_LIMITS, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(ResolveError::TooLarge { .. })), "{:?}", result);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_oversized_content_length_rejected() {
        let head = "HTTP/1.1 200 OK\r\nContent-Length: 10485760\r\nConnection: close\r\n\r\n";
        let base = serve_once(head.to_string(), vec![b'x'; 64]).await;
        let dest = temp_dest("content-length");

        let result = local_backend(&base)
            .download("download/audio", &[], &dest, SMALL_LIMITS, &CancellationToken::new())
            .await;

        match result {
            Err(ResolveError::TooLarge { size_mb, limit_mb }) => {
                assert_eq!(limit_mb, 0);
                assert!((size_mb - 10.0).abs() < f64::EPSILON);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_cancelled_download_leaves_no_file() {
        let dir = std::env::temp_dir().join("media-resolver-http-cancel");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let dest = dir.join("never.mp3");

        let token = CancellationToken::new();
        token.cancel();

        let limits = DownloadLimits {
            max_bytes: 1024,
            chunk_size: 128,
        };
        let result = backend()
            .download("download/audio", &[], &dest, limits, &token)
            .await;

        assert!(matches!(result, Err(ResolveError::Cancelled)));
        assert!(!dest.exists());
    }
}
