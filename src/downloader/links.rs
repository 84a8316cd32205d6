// Link parsing - pulls provider identifiers out of user queries
//
// Shapes are tried in order, first match wins:
// 1. watch / short / embed / shorts / live links
// 2. a `v=` query parameter on a provider URL
// 3. an 11-character path segment on a provider URL
// 4. a bare 11-character identifier
//
// Nothing here touches the network.

use lazy_static::lazy_static;
use regex::Regex;

use super::models::Validation;

pub const WATCH_BASE: &str = "https://www.youtube.com/watch?v=";

lazy_static! {
    static ref PROVIDER_RE: Regex = Regex::new(r"(?i)\b(?:youtube\.com|youtu\.be)\b").unwrap();
    static ref VIDEO_ID_PATTERNS: Vec<(Regex, bool)> = vec![
        // (pattern, needs provider host)
        (
            Regex::new(
                r"(?:youtube\.com/(?:watch\?(?:[^#]*&)?v=|embed/|shorts/|live/|v/)|youtu\.be/)([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)"
            )
            .unwrap(),
            false,
        ),
        (Regex::new(r"[?&]v=([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)").unwrap(), true),
        (Regex::new(r"/([A-Za-z0-9_-]{11})(?:[?/#]|$)").unwrap(), true),
    ];
    static ref BARE_ID_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap();
    static ref PLAYLIST_RE: Regex = Regex::new(r"[?&]list=([A-Za-z0-9_-]+)").unwrap();
}

/// Whether the string mentions a provider host at all
pub fn is_provider_url(query: &str) -> bool {
    PROVIDER_RE.is_match(query)
}

/// Extract the video identifier from a link or bare identifier
pub fn extract_video_id(query: &str) -> Option<String> {
    let query = query.trim();
    let provider = is_provider_url(query);

    for (pattern, needs_provider) in VIDEO_ID_PATTERNS.iter() {
        if *needs_provider && !provider {
            continue;
        }
        if let Some(caps) = pattern.captures(query) {
            return caps.get(1).map(|m| m.as_str().to_string());
        }
    }

    if BARE_ID_RE.is_match(query) {
        return Some(query.to_string());
    }

    None
}

/// Extract the `list=` token from a provider link
pub fn extract_playlist_id(query: &str) -> Option<String> {
    let query = query.trim();
    if !is_provider_url(query) {
        return None;
    }
    PLAYLIST_RE
        .captures(query)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Classify a query without any network I/O
pub fn validate(query: &str) -> Validation {
    let video_id = extract_video_id(query);
    let playlist_id = extract_playlist_id(query);
    let is_valid = video_id.is_some() || playlist_id.is_some() || is_provider_url(query);

    if !is_valid {
        return Validation::invalid();
    }

    Validation {
        is_valid,
        video_id,
        playlist_id,
    }
}

/// Drop everything from the first `&` (tracking params, timestamps, mixes)
pub fn strip_extra_params(link: &str) -> &str {
    link.split('&').next().unwrap_or(link).trim()
}

pub fn watch_url(video_id: &str) -> String {
    format!("{}{}", WATCH_BASE, video_id)
}
