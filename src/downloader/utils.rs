// Helper functions shared by the resolver and backends

use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Longest sanitized filename stem, in characters
pub const MAX_FILENAME_CHARS: usize = 100;

lazy_static! {
    static ref UNSAFE_CHARS_RE: Regex = Regex::new(r#"[<>:"/\\|?*\x00-\x08\x0e-\x1f\x7f]"#).unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
}

/// Convert "HH:MM:SS", "MM:SS" or "SS" to seconds.
/// Empty, "None" and malformed input give 0.
pub fn time_to_seconds(time_str: &str) -> u64 {
    let trimmed = time_str.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return 0;
    }

    let parts: Option<Vec<u64>> = trimmed
        .split(':')
        .map(|p| p.trim().parse::<u64>().ok())
        .collect();

    let total = match parts.as_deref() {
        Some([h, m, s]) => h
            .checked_mul(3600)
            .and_then(|h| m.checked_mul(60).and_then(|m| h.checked_add(m)))
            .and_then(|hm| hm.checked_add(*s)),
        Some([m, s]) => m.checked_mul(60).and_then(|m| m.checked_add(*s)),
        Some([s]) => Some(*s),
        _ => None,
    };
    total.unwrap_or(0)
}

/// Format seconds as "M:SS", or "H:MM:SS" past an hour
pub fn format_duration(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Strip filesystem-unsafe characters, collapse whitespace, cap the length.
/// Falls back to `fallback` when nothing usable is left.
pub fn sanitize_filename(title: &str, fallback: &str) -> String {
    let stripped = UNSAFE_CHARS_RE.replace_all(title, "");
    let collapsed = WHITESPACE_RE.replace_all(&stripped, " ");
    let truncated: String = collapsed.trim().chars().take(MAX_FILENAME_CHARS).collect();
    // Truncation can leave a trailing space; leading dots would hide the file
    let cleaned = truncated.trim().trim_start_matches('.').to_string();

    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned
    }
}

/// Remove regular files in `dir` older than `max_age`. Best-effort: errors on
/// individual files are logged and skipped. Returns how many were removed.
pub async fn remove_files_older_than(dir: &Path, max_age: Duration) -> usize {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "Download directory not readable, nothing to clean");
            return 0;
        }
    };

    let now = SystemTime::now();
    let mut removed = 0;

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Failed to read directory entry");
                break;
            }
        };

        let path = entry.path();
        let metadata = match entry.metadata().await {
            Ok(m) if m.is_file() => m,
            Ok(_) => continue,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Skipping unreadable file");
                continue;
            }
        };

        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());

        if matches!(age, Some(age) if age > max_age) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(path = %path.display(), "Removed stale download");
                    removed += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove stale download"),
            }
        }
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_to_seconds_formats() {
        assert_eq!(time_to_seconds("3:32"), 212);
        assert_eq!(time_to_seconds("1:02:03"), 3723);
        assert_eq!(time_to_seconds("45"), 45);
        assert_eq!(time_to_seconds("25:00"), 1500);
    }

    #[test]
    fn test_time_to_seconds_garbage() {
        assert_eq!(time_to_seconds(""), 0);
        assert_eq!(time_to_seconds("None"), 0);
        assert_eq!(time_to_seconds("live"), 0);
        assert_eq!(time_to_seconds("1:2:3:4"), 0);
        assert_eq!(time_to_seconds("3:xx"), 0);
    }

    #[test]
    fn test_time_to_seconds_overflow_is_malformed() {
        assert_eq!(time_to_seconds("9999999999999999999:00:00"), 0);
        assert_eq!(time_to_seconds("18446744073709551615:00"), 0);
        assert_eq!(time_to_seconds("0:00:18446744073709551615"), 18_446_744_073_709_551_615);
        assert_eq!(time_to_seconds("1:00:18446744073709551615"), 0);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(212), "3:32");
        assert_eq!(format_duration(3723), "1:02:03");
        assert_eq!(format_duration(5), "0:05");
    }

    #[test]
    fn test_sanitize_strips_unsafe() {
        assert_eq!(
            sanitize_filename(r#"AC/DC: "Back in Black" <Live>?"#, "id"),
            "ACDC Back in Black Live"
        );
        assert_eq!(sanitize_filename("  many    spaces\there ", "id"), "many spaces here");
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "a".repeat(250);
        assert_eq!(sanitize_filename(&long, "id").chars().count(), MAX_FILENAME_CHARS);
    }

    #[test]
    fn test_sanitize_falls_back() {
        assert_eq!(sanitize_filename("", "dQw4w9WgXcQ"), "dQw4w9WgXcQ");
        assert_eq!(sanitize_filename("???", "dQw4w9WgXcQ"), "dQw4w9WgXcQ");
    }
}
