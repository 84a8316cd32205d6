// Downloader module - media resolution, caching and download layer

pub mod backends;
pub mod cache;
pub mod errors;
pub mod links;
pub mod models;
pub mod orchestrator;
pub mod resolver;
pub mod traits;
pub mod utils;

pub use cache::{DownloadIndex, RequestKey, TtlCache};
pub use errors::ResolveError;
pub use models::{DownloadResult, MediaInfo, MediaKind, SearchHit, TrackDetails, Validation};
pub use orchestrator::HostFailover;
pub use resolver::MediaResolver;
pub use traits::{ApiBackend, DownloadLimits};
