use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{Playlist, PlaylistVideo};

use super::schema::SCHEMA;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Every call is a single auto-committed statement unless noted.
#[derive(Clone)]
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = if db_path == ":memory:" {
            Connection::open_in_memory().await?
        } else {
            Connection::open(db_path).await?
        };

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }

    // Tracked subreddits

    /// Returns false when the name was already tracked, ignoring case.
    pub async fn register_subreddit(&self, name: &str) -> Result<bool> {
        let name = name.to_string();
        let now = format_timestamp(Local::now().naive_local());
        let inserted = self
            .conn
            .call(move |conn| {
                let rows = conn.execute(
                    "INSERT OR IGNORE INTO tracked_subreddits (name, date_added) VALUES (?1, ?2)",
                    params![name, now],
                )?;
                Ok(rows > 0)
            })
            .await?;
        Ok(inserted)
    }

    pub async fn list_tracked_subreddit_names(&self) -> Result<Vec<String>> {
        let names = self
            .conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare("SELECT name FROM tracked_subreddits ORDER BY name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await?;
        Ok(names)
    }

    // Playlist operations

    pub async fn record_playlist(&self, playlist_id: &str, subreddit_name: &str) -> Result<String> {
        self.record_playlist_at(playlist_id, subreddit_name, Local::now().naive_local())
            .await
    }

    /// Inserts the playlist unless one already exists for the same subreddit
    /// and day, then returns whichever id owns that day.
    pub async fn record_playlist_at(
        &self,
        playlist_id: &str,
        subreddit_name: &str,
        created_at: NaiveDateTime,
    ) -> Result<String> {
        let playlist_id = playlist_id.to_string();
        let subreddit_name = subreddit_name.to_string();
        let canonical = self
            .conn
            .call(move |conn| {
                let created_on = created_at.date().format(DATE_FORMAT).to_string();
                conn.execute(
                    r#"INSERT INTO playlists (playlist_id, subreddit_name, date_created, created_on)
                       VALUES (?1, ?2, ?3, ?4)
                       ON CONFLICT DO NOTHING"#,
                    params![
                        playlist_id,
                        subreddit_name,
                        format_timestamp(created_at),
                        created_on
                    ],
                )?;
                let canonical: String = conn.query_row(
                    "SELECT playlist_id FROM playlists WHERE subreddit_name = ?1 AND created_on = ?2",
                    params![subreddit_name, created_on],
                    |row| row.get(0),
                )?;
                Ok(canonical)
            })
            .await?;
        Ok(canonical)
    }

    pub async fn find_playlist(&self, subreddit_name: &str, date: NaiveDate) -> Result<Option<String>> {
        Ok(self
            .get_playlist(subreddit_name, date)
            .await?
            .map(|playlist| playlist.playlist_id))
    }

    pub async fn get_playlist(&self, subreddit_name: &str, date: NaiveDate) -> Result<Option<Playlist>> {
        let subreddit_name = subreddit_name.to_string();
        let created_on = date.format(DATE_FORMAT).to_string();
        let playlist = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT playlist_id, subreddit_name, date_created
                       FROM playlists
                       WHERE subreddit_name = ?1 AND created_on = ?2
                       ORDER BY date_created ASC
                       LIMIT 1"#,
                )?;
                let playlist = stmt
                    .query_row(params![subreddit_name, created_on], playlist_from_row)
                    .optional()?;
                Ok(playlist)
            })
            .await?;
        Ok(playlist)
    }

    pub async fn has_playlist(&self, playlist_id: &str) -> Result<bool> {
        let playlist_id = playlist_id.to_string();
        let exists = self
            .conn
            .call(move |conn| {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM playlists WHERE playlist_id = ?1)",
                    params![playlist_id],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await?;
        Ok(exists)
    }

    pub async fn list_all_playlist_ids(&self) -> Result<Vec<String>> {
        let ids = self
            .conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare("SELECT playlist_id FROM playlists ORDER BY date_created ASC")?;
                let ids = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<String>, _>>()?;
                Ok(ids)
            })
            .await?;
        Ok(ids)
    }

    /// Drops the playlist row and its video rows in one transaction.
    pub async fn forget_playlist(&self, playlist_id: &str) -> Result<()> {
        let playlist_id = playlist_id.to_string();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM playlist_videos WHERE playlist_id = ?1",
                    params![playlist_id],
                )?;
                tx.execute(
                    "DELETE FROM playlists WHERE playlist_id = ?1",
                    params![playlist_id],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Playlist video operations

    /// Returns false when the video was already recorded for this playlist.
    /// The playlist itself must have been recorded first.
    pub async fn record_video(&self, video_id: &str, playlist_id: &str, source_url: &str) -> Result<bool> {
        let video_id = video_id.to_string();
        let playlist_id = playlist_id.to_string();
        let source_url = source_url.to_string();
        let now = format_timestamp(Local::now().naive_local());
        let inserted = self
            .conn
            .call(move |conn| {
                let rows = conn.execute(
                    r#"INSERT INTO playlist_videos (video_id, playlist_id, date_added, source_url)
                       VALUES (?1, ?2, ?3, ?4)
                       ON CONFLICT(playlist_id, video_id) DO NOTHING"#,
                    params![video_id, playlist_id, now, source_url],
                )?;
                Ok(rows > 0)
            })
            .await?;
        Ok(inserted)
    }

    pub async fn list_playlist_videos(&self, playlist_id: &str) -> Result<Vec<PlaylistVideo>> {
        let playlist_id = playlist_id.to_string();
        let videos = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT video_id, playlist_id, date_added, source_url
                       FROM playlist_videos
                       WHERE playlist_id = ?1
                       ORDER BY date_added DESC, video_id ASC"#,
                )?;
                let videos = stmt
                    .query_map(params![playlist_id], video_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(videos)
            })
            .await?;
        Ok(videos)
    }
}

fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT) {
        return Some(naive);
    }
    // Rows written by other tools may carry an offset.
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.naive_local())
}

fn timestamp_column(row: &Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unrecognised timestamp {raw:?}").into(),
        )
    })
}

fn playlist_from_row(row: &Row) -> rusqlite::Result<Playlist> {
    Ok(Playlist {
        playlist_id: row.get(0)?,
        subreddit_name: row.get(1)?,
        date_created: timestamp_column(row, 2)?,
    })
}

fn video_from_row(row: &Row) -> rusqlite::Result<PlaylistVideo> {
    Ok(PlaylistVideo {
        video_id: row.get(0)?,
        playlist_id: row.get(1)?,
        date_added: timestamp_column(row, 2)?,
        source_url: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn repo() -> Repository {
        Repository::new(":memory:").await.unwrap()
    }

    fn at(date: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{date} 09:30:00"), "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn day(date: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date, DATE_FORMAT).unwrap()
    }

    #[tokio::test]
    async fn find_playlist_matches_calendar_day_not_timestamp() {
        let repo = repo().await;
        repo.record_playlist_at("PL1", "music", at("2024-03-01"))
            .await
            .unwrap();

        assert_eq!(
            repo.find_playlist("music", day("2024-03-01")).await.unwrap(),
            Some("PL1".to_string())
        );
        assert_eq!(repo.find_playlist("music", day("2024-03-02")).await.unwrap(), None);
        assert_eq!(repo.find_playlist("videos", day("2024-03-01")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn second_playlist_for_same_day_resolves_to_first() {
        let repo = repo().await;

        let first = repo
            .record_playlist_at("PL1", "music", at("2024-03-01"))
            .await
            .unwrap();
        let second = repo
            .record_playlist_at("PL2", "music", at("2024-03-01"))
            .await
            .unwrap();
        let next_day = repo
            .record_playlist_at("PL3", "music", at("2024-03-02"))
            .await
            .unwrap();

        assert_eq!(first, "PL1");
        assert_eq!(second, "PL1");
        assert_eq!(next_day, "PL3");
        assert_eq!(repo.list_all_playlist_ids().await.unwrap(), vec!["PL1", "PL3"]);
    }

    #[tokio::test]
    async fn record_playlist_uses_today() {
        let repo = repo().await;
        repo.record_playlist("PL1", "music").await.unwrap();

        let today = Local::now().date_naive();
        let playlist = repo.get_playlist("music", today).await.unwrap().unwrap();
        assert_eq!(playlist.playlist_id, "PL1");
        assert_eq!(playlist.date_created.date(), today);
    }

    #[tokio::test]
    async fn tracked_names_are_sorted_and_unique() {
        let repo = repo().await;

        assert!(repo.register_subreddit("videos").await.unwrap());
        assert!(repo.register_subreddit("Music").await.unwrap());
        assert!(repo.register_subreddit("listentothis").await.unwrap());
        assert!(!repo.register_subreddit("videos").await.unwrap());

        assert_eq!(
            repo.list_tracked_subreddit_names().await.unwrap(),
            vec!["listentothis", "Music", "videos"]
        );
    }

    #[tokio::test]
    async fn tracked_names_ignore_case() {
        let repo = repo().await;

        assert!(repo.register_subreddit("Music").await.unwrap());
        assert!(!repo.register_subreddit("music").await.unwrap());

        assert_eq!(repo.list_tracked_subreddit_names().await.unwrap(), vec!["Music"]);
    }

    #[tokio::test]
    async fn playlist_day_lookup_ignores_case() {
        let repo = repo().await;
        repo.record_playlist_at("PL1", "Music", at("2024-03-01"))
            .await
            .unwrap();

        let second = repo
            .record_playlist_at("PL2", "music", at("2024-03-01"))
            .await
            .unwrap();

        assert_eq!(second, "PL1");
        assert_eq!(
            repo.find_playlist("MUSIC", day("2024-03-01")).await.unwrap(),
            Some("PL1".to_string())
        );
    }

    #[tokio::test]
    async fn duplicate_video_is_a_no_op() {
        let repo = repo().await;
        repo.record_playlist_at("PL1", "music", at("2024-03-01"))
            .await
            .unwrap();

        assert!(repo.record_video("abc", "PL1", "https://youtu.be/abc").await.unwrap());
        assert!(!repo.record_video("abc", "PL1", "https://youtu.be/abc").await.unwrap());
        // Same video on another day's playlist is a separate row.
        repo.record_playlist_at("PL2", "music", at("2024-03-02"))
            .await
            .unwrap();
        assert!(repo.record_video("abc", "PL2", "https://youtu.be/abc").await.unwrap());

        let videos = repo.list_playlist_videos("PL1").await.unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].source_url, "https://youtu.be/abc");
    }

    #[tokio::test]
    async fn video_for_unrecorded_playlist_is_a_store_error() {
        let repo = repo().await;

        let err = repo
            .record_video("abc", "PL9", "https://youtu.be/abc")
            .await
            .unwrap_err();

        assert!(err.is_store());
        assert!(!repo.has_playlist("PL9").await.unwrap());
    }

    #[tokio::test]
    async fn forget_playlist_removes_videos_too() {
        let repo = repo().await;
        repo.record_playlist_at("PL1", "music", at("2024-03-01"))
            .await
            .unwrap();
        repo.record_video("abc", "PL1", "https://youtu.be/abc").await.unwrap();

        repo.forget_playlist("PL1").await.unwrap();

        assert!(repo.list_all_playlist_ids().await.unwrap().is_empty());
        assert!(repo.list_playlist_videos("PL1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_backed_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let path = path.to_str().unwrap();

        let repo = Repository::new(path).await.unwrap();
        repo.register_subreddit("music").await.unwrap();
        repo.close().await.unwrap();

        let reopened = Repository::new(path).await.unwrap();
        assert_eq!(reopened.list_tracked_subreddit_names().await.unwrap(), vec!["music"]);
    }
}
