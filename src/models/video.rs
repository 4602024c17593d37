use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A Reddit post that links to a YouTube video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateVideo {
    pub video_id: String,
    /// The link the post points at.
    pub source_url: String,
    pub title: Option<String>,
    pub permalink: Option<String>,
}

impl CandidateVideo {
    /// Post title for log lines, falling back to the permalink, then the link.
    pub fn label(&self) -> &str {
        self.title
            .as_deref()
            .or(self.permalink.as_deref())
            .unwrap_or(&self.source_url)
    }

    #[cfg(test)]
    pub fn new(video_id: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            source_url: source_url.into(),
            title: None,
            permalink: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistVideo {
    pub video_id: String,
    pub playlist_id: String,
    pub date_added: NaiveDateTime,
    pub source_url: String,
}
