pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- subreddits the bulk refresh walks over
CREATE TABLE IF NOT EXISTS tracked_subreddits (
    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
    date_added TEXT NOT NULL
);

-- one playlist per subreddit and calendar day
CREATE TABLE IF NOT EXISTS playlists (
    playlist_id TEXT PRIMARY KEY,
    subreddit_name TEXT NOT NULL COLLATE NOCASE,
    date_created TEXT NOT NULL,
    created_on TEXT NOT NULL,
    UNIQUE(subreddit_name, created_on)
);

-- videos confirmed present in a recorded playlist
CREATE TABLE IF NOT EXISTS playlist_videos (
    video_id TEXT NOT NULL,
    playlist_id TEXT NOT NULL REFERENCES playlists(playlist_id) ON DELETE CASCADE,
    date_added TEXT NOT NULL,
    source_url TEXT NOT NULL,
    PRIMARY KEY (playlist_id, video_id)
);
"#;
