use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Local, NaiveDate};

use crate::config::Config;
use crate::db::Repository;
use crate::error::Result;
use crate::feed::{FeedFetcher, PostSource};
use crate::youtube::{Credentials, PlaylistApi, PlaylistService, ReconcileReport, YouTubeClient};

/// How a single subreddit refresh ended. Failures are already logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed {
        playlist_id: String,
        report: ReconcileReport,
    },
    Failed(String),
}

impl RefreshOutcome {
    pub fn is_refreshed(&self) -> bool {
        matches!(self, RefreshOutcome::Refreshed { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkRefreshReport {
    pub refreshed: Vec<String>,
    pub failed: Vec<String>,
}

/// Outcome of registering a subreddit from the front end or CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    InvalidName,
    Added { newly_tracked: bool, refresh: RefreshOutcome },
}

/// Names that would collide with the front end's fixed routes.
const RESERVED_NAMES: &[&str] = &["add"];

pub fn is_valid_subreddit_name(name: &str) -> bool {
    (2..=21).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !RESERVED_NAMES
            .iter()
            .any(|reserved| name.eq_ignore_ascii_case(reserved))
}

/// Drives the get-or-create-then-reconcile workflow per subreddit.
pub struct App {
    pub repository: Repository,
    posts: Arc<dyn PostSource>,
    playlists: PlaylistService,
}

impl App {
    pub async fn new(config: &Config) -> Result<Self> {
        let repository = Repository::new(config.database_path()).await?;
        let posts = Arc::new(FeedFetcher::new(config)?);
        let api = Arc::new(YouTubeClient::new(config, Credentials::load(config)?)?);
        Ok(Self::with_parts(repository, posts, api, config))
    }

    pub fn with_parts(
        repository: Repository,
        posts: Arc<dyn PostSource>,
        api: Arc<dyn PlaylistApi>,
        config: &Config,
    ) -> Self {
        let playlists = PlaylistService::new(api, repository.clone(), config.playlist_privacy.clone());
        Self {
            repository,
            posts,
            playlists,
        }
    }

    pub fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    pub async fn refresh_subreddit(&self, subreddit_name: &str) -> RefreshOutcome {
        self.refresh_subreddit_on(subreddit_name, Self::today()).await
    }

    pub async fn refresh_subreddit_on(&self, subreddit_name: &str, date: NaiveDate) -> RefreshOutcome {
        match self.try_refresh(subreddit_name, date).await {
            Ok((playlist_id, report)) => {
                tracing::info!(
                    "Refreshed /r/{}: {} added, {} already present, {} skipped",
                    subreddit_name,
                    report.added,
                    report.skipped,
                    report.failed
                );
                RefreshOutcome::Refreshed {
                    playlist_id,
                    report,
                }
            }
            Err(e) => {
                if e.is_store() {
                    tracing::error!("Refresh of /r/{} failed: {}", subreddit_name, e);
                } else {
                    tracing::warn!("Refresh of /r/{} failed: {}", subreddit_name, e);
                }
                RefreshOutcome::Failed(e.to_string())
            }
        }
    }

    async fn try_refresh(&self, subreddit_name: &str, date: NaiveDate) -> Result<(String, ReconcileReport)> {
        let videos = self.posts.fetch_candidate_videos(subreddit_name).await?;

        let playlist_id = match self.repository.find_playlist(subreddit_name, date).await? {
            Some(id) => id,
            None => self.playlists.create_playlist(subreddit_name, date).await?,
        };

        let report = self.playlists.reconcile(&videos, &playlist_id).await?;
        Ok((playlist_id, report))
    }

    pub async fn refresh_all(&self) -> Result<BulkRefreshReport> {
        self.refresh_all_on(Self::today()).await
    }

    /// Refreshes every tracked subreddit in name order, one at a time.
    pub async fn refresh_all_on(&self, date: NaiveDate) -> Result<BulkRefreshReport> {
        let names: BTreeSet<String> = self
            .repository
            .list_tracked_subreddit_names()
            .await?
            .into_iter()
            .collect();

        let mut report = BulkRefreshReport::default();
        for name in names {
            tracing::debug!("Updating videos for {}", name);
            if self.refresh_subreddit_on(&name, date).await.is_refreshed() {
                report.refreshed.push(name);
            } else {
                report.failed.push(name);
            }
        }

        Ok(report)
    }

    /// Tracks the subreddit, then refreshes it right away.
    pub async fn add_subreddit(&self, subreddit_name: &str) -> Result<AddOutcome> {
        let subreddit_name = subreddit_name.trim();
        if !is_valid_subreddit_name(subreddit_name) {
            tracing::warn!("Rejected subreddit name {:?}", subreddit_name);
            return Ok(AddOutcome::InvalidName);
        }

        let newly_tracked = self.repository.register_subreddit(subreddit_name).await?;
        if newly_tracked {
            tracing::info!("{} was added to the list of subreddit playlists", subreddit_name);
        }

        let refresh = self.refresh_subreddit(subreddit_name).await;
        Ok(AddOutcome::Added {
            newly_tracked,
            refresh,
        })
    }

    pub async fn delete_all_playlists(&self) -> Result<usize> {
        self.playlists.delete_all_tracked_playlists().await
    }

    pub async fn close(self) -> Result<()> {
        self.repository.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_config, videos, FakeFeed, FakePlaylistApi, FakePostSource};

    fn day(date: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap()
    }

    async fn app_with(posts: FakePostSource, api: Arc<FakePlaylistApi>) -> (App, Arc<FakePostSource>) {
        let repository = Repository::new(":memory:").await.unwrap();
        let posts = Arc::new(posts);
        let app = App::with_parts(repository, posts.clone(), api, &test_config());
        (app, posts)
    }

    #[tokio::test]
    async fn first_refresh_creates_playlist_and_adds_videos() {
        let api = Arc::new(FakePlaylistApi::default());
        let (app, _) = app_with(
            FakePostSource::default().with_feed("music", videos(&["a", "b"])),
            api.clone(),
        )
        .await;

        let outcome = app.refresh_subreddit_on("music", day("2024-03-01")).await;

        let (playlist_id, report) = match outcome {
            RefreshOutcome::Refreshed { playlist_id, report } => (playlist_id, report),
            RefreshOutcome::Failed(e) => panic!("refresh failed: {e}"),
        };
        assert_eq!(report.added, 2);
        assert_eq!(
            app.repository.find_playlist("music", day("2024-03-01")).await.unwrap(),
            Some(playlist_id)
        );
    }

    #[tokio::test]
    async fn second_refresh_same_day_reuses_playlist() {
        let api = Arc::new(FakePlaylistApi::default());
        let (app, _) = app_with(
            FakePostSource::default().with_feed("music", videos(&["a", "b"])),
            api.clone(),
        )
        .await;

        app.refresh_subreddit_on("music", day("2024-03-01")).await;
        let outcome = app.refresh_subreddit_on("music", day("2024-03-01")).await;

        assert_eq!(api.created_titles().len(), 1);
        assert_eq!(api.inserted().len(), 2);
        assert!(matches!(
            outcome,
            RefreshOutcome::Refreshed { report, .. } if report.skipped == 2 && report.added == 0
        ));
    }

    #[tokio::test]
    async fn new_day_gets_new_playlist() {
        let api = Arc::new(FakePlaylistApi::default());
        let (app, _) = app_with(
            FakePostSource::default().with_feed("music", videos(&["a"])),
            api.clone(),
        )
        .await;

        app.refresh_subreddit_on("music", day("2024-03-01")).await;
        app.refresh_subreddit_on("music", day("2024-03-02")).await;

        assert_eq!(
            api.created_titles(),
            vec!["music playlist for 2024-03-01", "music playlist for 2024-03-02"]
        );
    }

    #[tokio::test]
    async fn zero_videos_still_yields_single_playlist_per_day() {
        let api = Arc::new(FakePlaylistApi::default());
        let (app, _) = app_with(
            FakePostSource::default().with_feed("quiet", FakeFeed::Videos(Vec::new())),
            api.clone(),
        )
        .await;

        app.refresh_subreddit_on("quiet", day("2024-03-01")).await;
        app.refresh_subreddit_on("quiet", day("2024-03-01")).await;

        assert_eq!(app.repository.list_all_playlist_ids().await.unwrap().len(), 1);
        assert!(api.inserted().is_empty());
    }

    #[tokio::test]
    async fn invalid_subreddit_has_no_side_effects() {
        let api = Arc::new(FakePlaylistApi::default());
        let (app, _) = app_with(
            FakePostSource::default().with_feed("nosuchsub", FakeFeed::Invalid),
            api.clone(),
        )
        .await;

        let outcome = app.refresh_subreddit_on("nosuchsub", day("2024-03-01")).await;

        assert!(matches!(outcome, RefreshOutcome::Failed(_)));
        assert!(api.created_titles().is_empty());
        assert!(app.repository.list_all_playlist_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bulk_refresh_continues_past_a_failing_subreddit() {
        let api = Arc::new(FakePlaylistApi::default());
        let (app, posts) = app_with(
            FakePostSource::default()
                .with_feed("a", videos(&["a1"]))
                .with_feed("b", FakeFeed::Unavailable)
                .with_feed("c", videos(&["c1"])),
            api.clone(),
        )
        .await;
        for name in ["c", "a", "b"] {
            app.repository.register_subreddit(name).await.unwrap();
        }

        let report = app.refresh_all_on(day("2024-03-01")).await.unwrap();

        assert_eq!(posts.requests(), vec!["a", "b", "c"]);
        assert_eq!(report.refreshed, vec!["a", "c"]);
        assert_eq!(report.failed, vec!["b"]);
        assert!(app.repository.find_playlist("c", day("2024-03-01")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn add_subreddit_registers_before_refreshing() {
        let api = Arc::new(FakePlaylistApi::default());
        let (app, _) = app_with(
            FakePostSource::default().with_feed("music", videos(&["a"])),
            api.clone(),
        )
        .await;

        let outcome = app.add_subreddit(" music ").await.unwrap();

        assert!(matches!(
            outcome,
            AddOutcome::Added { newly_tracked: true, ref refresh } if refresh.is_refreshed()
        ));
        assert_eq!(app.repository.list_tracked_subreddit_names().await.unwrap(), vec!["music"]);
    }

    #[tokio::test]
    async fn re_adding_in_other_case_keeps_one_playlist() {
        let api = Arc::new(FakePlaylistApi::default());
        let (app, _) = app_with(
            FakePostSource::default()
                .with_feed("music", videos(&["a"]))
                .with_feed("Music", videos(&["a"])),
            api.clone(),
        )
        .await;

        app.add_subreddit("music").await.unwrap();
        let outcome = app.add_subreddit("Music").await.unwrap();

        assert!(matches!(outcome, AddOutcome::Added { newly_tracked: false, .. }));
        assert_eq!(app.repository.list_tracked_subreddit_names().await.unwrap(), vec!["music"]);
        assert_eq!(api.created_titles().len(), 1);
        assert_eq!(api.inserted().len(), 1);
    }

    #[tokio::test]
    async fn add_subreddit_rejects_malformed_names() {
        let api = Arc::new(FakePlaylistApi::default());
        let (app, posts) = app_with(FakePostSource::default(), api).await;

        assert_eq!(app.add_subreddit("../etc").await.unwrap(), AddOutcome::InvalidName);
        assert_eq!(app.add_subreddit("x").await.unwrap(), AddOutcome::InvalidName);
        assert!(posts.requests().is_empty());
        assert!(app.repository.list_tracked_subreddit_names().await.unwrap().is_empty());
    }

    #[test]
    fn subreddit_name_rules() {
        assert!(is_valid_subreddit_name("listentothis"));
        assert!(is_valid_subreddit_name("Music_2"));
        assert!(!is_valid_subreddit_name("a"));
        assert!(!is_valid_subreddit_name("has space"));
        assert!(!is_valid_subreddit_name("waytoolongsubredditname"));
        assert!(!is_valid_subreddit_name("add"));
        assert!(!is_valid_subreddit_name("ADD"));
        assert!(is_valid_subreddit_name("addicted"));
    }
}
