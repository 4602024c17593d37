//! Fakes shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use axum::Router;
use reqwest::StatusCode;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::feed::PostSource;
use crate::models::CandidateVideo;
use crate::youtube::{PlaylistApi, PlaylistItemsPage};

pub fn test_config() -> Config {
    Config {
        database_url: ":memory:".to_string(),
        ..Config::default()
    }
}

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn spawn_upstream(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

#[derive(Default)]
struct FakeState {
    playlists: HashMap<String, Vec<String>>,
    next_id: usize,
    rejected: HashSet<String>,
    inserted: Vec<(String, String)>,
    created_titles: Vec<String>,
    deleted: Vec<String>,
}

/// In-memory stand-in for the YouTube playlist endpoints.
pub struct FakePlaylistApi {
    page_size: usize,
    state: Mutex<FakeState>,
}

impl Default for FakePlaylistApi {
    fn default() -> Self {
        Self::with_page_size(50)
    }
}

impl FakePlaylistApi {
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size,
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn seed_playlist(&self, playlist_id: &str, video_ids: &[&str]) {
        self.state.lock().unwrap().playlists.insert(
            playlist_id.to_string(),
            video_ids.iter().map(|id| id.to_string()).collect(),
        );
    }

    pub fn reject_video(&self, video_id: &str) {
        self.state.lock().unwrap().rejected.insert(video_id.to_string());
    }

    pub fn inserted(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().inserted.clone()
    }

    pub fn created_titles(&self) -> Vec<String> {
        self.state.lock().unwrap().created_titles.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }
}

fn not_found(what: &str) -> AppError {
    AppError::Upstream {
        status: StatusCode::NOT_FOUND,
        body: format!("{what} not found"),
    }
}

#[async_trait]
impl PlaylistApi for FakePlaylistApi {
    async fn create_playlist(&self, title: &str, _description: &str, _privacy: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("PL{}", state.next_id);
        state.playlists.insert(id.clone(), Vec::new());
        state.created_titles.push(title.to_string());
        Ok(id)
    }

    async fn list_playlist_items(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
    ) -> Result<PlaylistItemsPage> {
        let state = self.state.lock().unwrap();
        let items = state
            .playlists
            .get(playlist_id)
            .ok_or_else(|| not_found(playlist_id))?;
        let start: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let end = (start + self.page_size).min(items.len());

        Ok(PlaylistItemsPage {
            video_ids: items[start.min(end)..end].to_vec(),
            next_page_token: (end < items.len()).then(|| end.to_string()),
        })
    }

    async fn insert_playlist_item(&self, playlist_id: &str, video_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.rejected.contains(video_id) {
            return Err(AppError::Upstream {
                status: StatusCode::FORBIDDEN,
                body: "videoNotAvailable".to_string(),
            });
        }
        let items = state
            .playlists
            .get_mut(playlist_id)
            .ok_or_else(|| not_found(playlist_id))?;
        items.insert(0, video_id.to_string());
        state
            .inserted
            .push((playlist_id.to_string(), video_id.to_string()));
        Ok(())
    }

    async fn delete_playlist(&self, playlist_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .playlists
            .remove(playlist_id)
            .ok_or_else(|| not_found(playlist_id))?;
        state.deleted.push(playlist_id.to_string());
        Ok(())
    }
}

pub enum FakeFeed {
    Videos(Vec<CandidateVideo>),
    Invalid,
    Unavailable,
}

/// Scripted subreddit feeds; unknown names behave like missing subreddits.
#[derive(Default)]
pub struct FakePostSource {
    feeds: Mutex<HashMap<String, FakeFeed>>,
    requests: Mutex<Vec<String>>,
}

impl FakePostSource {
    pub fn with_feed(self, subreddit_name: &str, feed: FakeFeed) -> Self {
        self.feeds
            .lock()
            .unwrap()
            .insert(subreddit_name.to_string(), feed);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

pub fn videos(ids: &[&str]) -> FakeFeed {
    FakeFeed::Videos(
        ids.iter()
            .map(|id| CandidateVideo::new(*id, format!("https://youtu.be/{id}")))
            .collect(),
    )
}

#[async_trait]
impl PostSource for FakePostSource {
    async fn fetch_candidate_videos(&self, subreddit_name: &str) -> Result<Vec<CandidateVideo>> {
        self.requests
            .lock()
            .unwrap()
            .push(subreddit_name.to_string());

        match self.feeds.lock().unwrap().get(subreddit_name) {
            Some(FakeFeed::Videos(videos)) => Ok(videos.clone()),
            Some(FakeFeed::Unavailable) => Err(AppError::Upstream {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: "try again later".to_string(),
            }),
            Some(FakeFeed::Invalid) | None => {
                Err(AppError::InvalidSubreddit(subreddit_name.to_string()))
            }
        }
    }
}
