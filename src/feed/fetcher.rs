use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::CandidateVideo;

use super::video_id::{extract_video_id, is_video_link};

/// Reddit marks link/self posts with this kind.
const POST_KIND: &str = "t3";

/// Stickies and ads eat into the page, so ask for slightly fewer.
const PAGE_SIZE_OFFSET: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    #[default]
    Hot,
    New,
    Top,
    Rising,
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SortMode::Hot => "hot",
            SortMode::New => "new",
            SortMode::Top => "top",
            SortMode::Rising => "rising",
        };
        f.write_str(s)
    }
}

impl FromStr for SortMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hot" => Ok(SortMode::Hot),
            "new" => Ok(SortMode::New),
            "top" => Ok(SortMode::Top),
            "rising" => Ok(SortMode::Rising),
            other => Err(AppError::Config(format!("unknown sort mode: {other}"))),
        }
    }
}

/// Where the orchestrator gets its candidate videos from.
#[async_trait]
pub trait PostSource: Send + Sync {
    async fn fetch_candidate_videos(&self, subreddit_name: &str) -> Result<Vec<CandidateVideo>>;
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Thing>,
}

#[derive(Debug, Deserialize)]
struct Thing {
    kind: String,
    #[serde(default)]
    data: PostData,
}

#[derive(Debug, Default, Deserialize)]
struct PostData {
    url: Option<String>,
    title: Option<String>,
    permalink: Option<String>,
}

pub struct FeedFetcher {
    client: Client,
    base_url: String,
    sort_mode: SortMode,
    page_size: u32,
}

impl FeedFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(config.reddit_user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            base_url: config.reddit_base_url.trim_end_matches('/').to_string(),
            sort_mode: config.sort_mode,
            page_size: config.feed_page_size,
        })
    }

    pub async fn fetch_candidate_videos_with(
        &self,
        subreddit_name: &str,
        sort_mode: SortMode,
        page_size: u32,
    ) -> Result<Vec<CandidateVideo>> {
        let posts = self.fetch_posts(subreddit_name, sort_mode, page_size).await?;
        Ok(filter_video_posts(posts))
    }

    async fn fetch_posts(
        &self,
        subreddit_name: &str,
        sort_mode: SortMode,
        page_size: u32,
    ) -> Result<Vec<PostData>> {
        let url = format!(
            "{}/r/{}/{}/.json",
            self.base_url,
            urlencoding::encode(subreddit_name),
            sort_mode
        );
        let limit = page_size.saturating_sub(PAGE_SIZE_OFFSET).max(1);

        tracing::info!("Getting top {} posts from /r/{}", page_size, subreddit_name);
        let response = self
            .client
            .get(&url)
            .query(&[("limit", limit)])
            .send()
            .await?;
        let status = response.status();
        tracing::info!("Response {} from {}", status, url);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Expected a success status from {}, got {}", url, status);
            return Err(AppError::Upstream { status, body });
        }

        let listing: Listing = response.json().await?;
        match listing.data.children.first() {
            Some(first) if first.kind == POST_KIND => {}
            _ => {
                tracing::warn!("{} is not a valid subreddit name", subreddit_name);
                return Err(AppError::InvalidSubreddit(subreddit_name.to_string()));
            }
        }

        Ok(listing
            .data
            .children
            .into_iter()
            .filter(|thing| thing.kind == POST_KIND)
            .map(|thing| thing.data)
            .collect())
    }
}

#[async_trait]
impl PostSource for FeedFetcher {
    async fn fetch_candidate_videos(&self, subreddit_name: &str) -> Result<Vec<CandidateVideo>> {
        self.fetch_candidate_videos_with(subreddit_name, self.sort_mode, self.page_size)
            .await
    }
}

/// Keeps posts linking to a single YouTube video, one candidate per video id.
fn filter_video_posts(posts: Vec<PostData>) -> Vec<CandidateVideo> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for post in posts {
        let Some(raw_url) = post.url else {
            continue;
        };
        // Reddit's JSON keeps HTML-escaped ampersands in links.
        let link = raw_url.replace("&amp;", "&");

        if !is_video_link(&link) {
            tracing::debug!("Not a YouTube post: {}", link);
            continue;
        }

        let video_id = match extract_video_id(&link) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("Dropping post: {}", e);
                continue;
            }
        };

        if !seen.insert(video_id.clone()) {
            tracing::debug!("Video {} already linked by an earlier post", video_id);
            continue;
        }

        let candidate = CandidateVideo {
            video_id,
            source_url: link,
            title: post.title,
            permalink: post.permalink,
        };
        tracing::debug!("YouTube post {:?}: {}", candidate.label(), candidate.source_url);
        candidates.push(candidate);
    }

    candidates
}
