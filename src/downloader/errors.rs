// Error types for the media resolver and its API backends

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// Search returned no match, or the provider does not know the identifier
    #[error("Not found: {0}")]
    NotFound(String),

    /// Query is neither a usable link nor a search phrase
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// HTTP 429 from the API host
    #[error("Rate limited by {host}")]
    RateLimited { host: String },

    /// HTTP 5xx from the API host
    #[error("Server error {status} from {host}")]
    Server { host: String, status: u16 },

    /// Any other non-success HTTP status
    #[error("HTTP error {status} from {host}")]
    Http { host: String, status: u16 },

    /// Connect, read or overall download timeout
    #[error("Request to {0} timed out")]
    Timeout(String),

    /// Connection-level failure (DNS, TLS, reset)
    #[error("Network error: {0}")]
    Network(String),

    /// Download exceeded the configured size cap
    #[error("File too large ({size_mb:.1}MB > {limit_mb}MB)")]
    TooLarge { size_mb: f64, limit_mb: u64 },

    /// Body was not the JSON shape we expected, or a download came back empty
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Caller cancelled the request
    #[error("Request cancelled")]
    Cancelled,

    /// Every configured host failed; carries the last failure
    #[error("All API hosts failed, last error: {0}")]
    AllHostsFailed(Box<ResolveError>),

    #[error("IO error: {0}")]
    Io(String),
}

impl ResolveError {
    /// Map a non-success HTTP status to an error kind
    pub fn from_status(host: &str, status: StatusCode) -> Self {
        let host = host.to_string();
        match status {
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited { host },
            StatusCode::NOT_FOUND => Self::NotFound(format!("{} returned 404", host)),
            s if s.is_server_error() => Self::Server {
                host,
                status: s.as_u16(),
            },
            s => Self::Http {
                host,
                status: s.as_u16(),
            },
        }
    }

    /// Map a reqwest failure to an error kind
    pub fn from_reqwest(host: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout(host.to_string());
        }
        if let Some(status) = err.status() {
            return Self::from_status(host, status);
        }
        if err.is_decode() {
            return Self::InvalidResponse(err.to_string());
        }
        Self::Network(err.to_string())
    }

    /// Transient failures: worth trying the same call on another host
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Server { .. } | Self::RateLimited { .. } | Self::Network(_)
        )
    }

    /// Whether the host failover should move on to the next host
    pub fn should_try_next_host(&self) -> bool {
        self.is_transient() || matches!(self, Self::InvalidResponse(_))
    }

    /// Message suitable for sending back to the chat
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound(_) => "No results found for this query.".to_string(),
            Self::InvalidQuery(_) => "That doesn't look like a valid link or search.".to_string(),
            Self::RateLimited { .. } => "The music service is rate-limiting requests.\n\
                 Please wait a few minutes and try again."
                .to_string(),
            Self::Timeout(_) | Self::Network(_) | Self::Server { .. } | Self::Http { .. } => {
                "The music service is not responding. Try again later.".to_string()
            }
            Self::AllHostsFailed(inner) => inner.user_message(),
            Self::TooLarge { limit_mb, .. } => {
                format!("This track is too large to download (limit {}MB).", limit_mb)
            }
            Self::InvalidResponse(_) => "The music service sent an unexpected reply.".to_string(),
            Self::Cancelled => "Request cancelled.".to_string(),
            Self::Io(_) => "Failed to save the downloaded file.".to_string(),
        }
    }
}

impl From<std::io::Error> for ResolveError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ResolveError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ResolveError>;
