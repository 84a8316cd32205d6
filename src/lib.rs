//! Resolves song/video queries for a voice-chat music bot into either a
//! downloaded file or a direct streaming URL.

pub mod config;
pub mod downloader;

pub use config::ResolverConfig;
pub use downloader::links::validate;
pub use downloader::utils::{format_duration, sanitize_filename, time_to_seconds};
pub use downloader::{
    ApiBackend, DownloadLimits, DownloadResult, HostFailover, MediaInfo, MediaKind, MediaResolver,
    ResolveError, SearchHit, TrackDetails, Validation,
};
