use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::CandidateVideo;

/// One page of a playlist's members.
#[derive(Debug, Clone, Default)]
pub struct PlaylistItemsPage {
    pub video_ids: Vec<String>,
    pub next_page_token: Option<String>,
}

/// The remote calls the playlist service needs from the video host.
#[async_trait]
pub trait PlaylistApi: Send + Sync {
    async fn create_playlist(&self, title: &str, description: &str, privacy: &str) -> Result<String>;

    async fn list_playlist_items(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
    ) -> Result<PlaylistItemsPage>;

    async fn insert_playlist_item(&self, playlist_id: &str, video_id: &str) -> Result<()>;

    async fn delete_playlist(&self, playlist_id: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Creates playlists and appends videos, recording each success in the store.
pub struct PlaylistService {
    api: Arc<dyn PlaylistApi>,
    repository: Repository,
    privacy: String,
}

impl PlaylistService {
    pub fn new(api: Arc<dyn PlaylistApi>, repository: Repository, privacy: String) -> Self {
        Self {
            api,
            repository,
            privacy,
        }
    }

    /// Creates the remote playlist and records it for `date`.
    ///
    /// If another refresh recorded a playlist for the same day first, the one
    /// just created is deleted again and the recorded id is returned.
    pub async fn create_playlist(&self, subreddit_name: &str, date: NaiveDate) -> Result<String> {
        let title = format!("{subreddit_name} playlist for {date}");
        let playlist_id = self
            .api
            .create_playlist(&title, &title, &self.privacy)
            .await?;
        tracing::info!("Created new playlist with id: {}", playlist_id);

        let now = Local::now().naive_local();
        let canonical = if date == now.date() {
            self.repository
                .record_playlist(&playlist_id, subreddit_name)
                .await?
        } else {
            self.repository
                .record_playlist_at(&playlist_id, subreddit_name, date.and_time(now.time()))
                .await?
        };

        if canonical != playlist_id {
            tracing::warn!(
                "Playlist {} already recorded for /r/{} on {}, discarding {}",
                canonical,
                subreddit_name,
                date,
                playlist_id
            );
            if let Err(e) = self.api.delete_playlist(&playlist_id).await {
                tracing::warn!("Failed to delete duplicate playlist {}: {}", playlist_id, e);
            }
        }

        Ok(canonical)
    }

    /// Every video id currently in the playlist, following page tokens until
    /// they run out or repeat.
    pub async fn list_current_video_ids(&self, playlist_id: &str) -> Result<HashSet<String>> {
        let mut video_ids = HashSet::new();
        let mut seen_tokens = HashSet::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .api
                .list_playlist_items(playlist_id, page_token.as_deref())
                .await?;
            video_ids.extend(page.video_ids);

            match page.next_page_token {
                Some(next) if seen_tokens.insert(next.clone()) => page_token = Some(next),
                Some(next) => {
                    tracing::warn!("Page token {} repeated for playlist {}", next, playlist_id);
                    break;
                }
                None => break,
            }
        }

        Ok(video_ids)
    }

    /// Returns whether the video was added. A rejected insert is logged and
    /// skipped; the next refresh will try it again.
    pub async fn append_video(&self, video: &CandidateVideo, playlist_id: &str) -> Result<bool> {
        if let Err(e) = self
            .api
            .insert_playlist_item(playlist_id, &video.video_id)
            .await
        {
            tracing::warn!("Skipping video {} ({}): {}", video.video_id, video.label(), e);
            return Ok(false);
        }
        tracing::info!(
            "Added video {} ({}) to playlist {}",
            video.video_id,
            video.label(),
            playlist_id
        );

        self.repository
            .record_video(&video.video_id, playlist_id, &video.source_url)
            .await?;
        Ok(true)
    }

    /// The playlist must already be recorded; an unknown id fails before any
    /// remote call.
    pub async fn reconcile(&self, videos: &[CandidateVideo], playlist_id: &str) -> Result<ReconcileReport> {
        if !self.repository.has_playlist(playlist_id).await? {
            return Err(AppError::UnknownPlaylist(playlist_id.to_string()));
        }

        let mut present = self.list_current_video_ids(playlist_id).await?;
        let mut report = ReconcileReport::default();

        for video in videos {
            if present.contains(&video.video_id) {
                tracing::info!("Skipping video {} in playlist {}", video.video_id, playlist_id);
                report.skipped += 1;
                continue;
            }

            if self.append_video(video, playlist_id).await? {
                present.insert(video.video_id.clone());
                report.added += 1;
            } else {
                report.failed += 1;
            }
        }

        Ok(report)
    }

    pub async fn delete_playlist(&self, playlist_id: &str) -> Result<()> {
        self.api.delete_playlist(playlist_id).await?;
        self.repository.forget_playlist(playlist_id).await?;
        tracing::info!("Deleted playlist {}", playlist_id);
        Ok(())
    }

    /// Deletes every recorded playlist; returns how many went away.
    pub async fn delete_all_tracked_playlists(&self) -> Result<usize> {
        let mut deleted = 0;
        for playlist_id in self.repository.list_all_playlist_ids().await? {
            match self.delete_playlist(&playlist_id).await {
                Ok(()) => deleted += 1,
                Err(e) => tracing::warn!("Could not delete playlist {}: {}", playlist_id, e),
            }
        }
        Ok(deleted)
    }
}
