use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::{AppError, Result};

const VIDEO_HOSTS: [&str; 2] = ["youtube.com", "youtu.be"];

// Tried in order; the first capture wins.
static ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // youtube.com/watch?v=ID
        r"[?&]v=([A-Za-z0-9_-]+)",
        // youtu.be/ID
        r"youtu\.be/([A-Za-z0-9_-]+)",
        // attribution links: /attribution_link?u=/watch%3Fv%3DID%26feature...
        r"(?i)v%3D([A-Za-z0-9_-]+)",
        // youtube.com/shorts/ID, /embed/ID, /live/ID
        r"youtube\.com/(?:shorts|embed|live|v)/([A-Za-z0-9_-]+)",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Whether a post link points at a single YouTube video.
///
/// Anything mentioning "playlist" is rejected outright, whatever the host.
pub fn is_video_link(link: &str) -> bool {
    if link.contains("playlist") {
        return false;
    }

    match Url::parse(link) {
        Ok(url) => url.host_str().is_some_and(is_video_host),
        Err(_) => VIDEO_HOSTS.iter().any(|host| link.contains(host)),
    }
}

fn is_video_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    VIDEO_HOSTS
        .iter()
        .any(|known| host == *known || host.ends_with(&format!(".{known}")))
}

pub fn extract_video_id(link: &str) -> Result<String> {
    ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(link))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| AppError::IdExtraction(link.to_string()))
}
