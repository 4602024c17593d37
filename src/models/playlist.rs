use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A YouTube playlist built for one subreddit on one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub playlist_id: String,
    pub subreddit_name: String,
    pub date_created: NaiveDateTime,
}

impl Playlist {
    pub fn url(&self) -> String {
        playlist_url(&self.playlist_id)
    }
}

pub fn playlist_url(playlist_id: &str) -> String {
    format!(
        "https://www.youtube.com/playlist?list={}",
        urlencoding::encode(playlist_id)
    )
}
