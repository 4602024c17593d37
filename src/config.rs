use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::feed::SortMode;

const APP_DIR: &str = "reddit-playlist";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite path, `sqlite://path`, `sqlite:path` or `:memory:`.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_reddit_base_url")]
    pub reddit_base_url: String,

    #[serde(default = "default_reddit_user_agent")]
    pub reddit_user_agent: String,

    #[serde(default)]
    pub sort_mode: SortMode,

    #[serde(default = "default_feed_page_size")]
    pub feed_page_size: u32,

    #[serde(default = "default_youtube_api_base_url")]
    pub youtube_api_base_url: String,

    #[serde(default = "default_oauth_auth_url")]
    pub oauth_auth_url: String,

    #[serde(default = "default_oauth_token_url")]
    pub oauth_token_url: String,

    /// Google `client_secret.json` downloaded from the API console.
    pub client_secrets_path: Option<PathBuf>,

    /// Offline credential written by `--authorize`.
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,

    #[serde(default = "default_playlist_privacy")]
    pub playlist_privacy: String,

    // Env-only overrides, never written back to disk.
    #[serde(skip)]
    pub client_id: Option<String>,
    #[serde(skip)]
    pub client_secret: Option<String>,
    #[serde(skip)]
    pub refresh_token: Option<String>,
}

fn data_dir() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR);
    std::fs::create_dir_all(&data_dir).ok();
    data_dir
}

fn default_database_url() -> String {
    data_dir()
        .join("reddit-playlist.db")
        .to_string_lossy()
        .to_string()
}

fn default_bind_address() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_reddit_base_url() -> String {
    "https://www.reddit.com".to_string()
}

fn default_reddit_user_agent() -> String {
    format!("{}/{} (playlist builder)", APP_DIR, env!("CARGO_PKG_VERSION"))
}

fn default_feed_page_size() -> u32 {
    50
}

fn default_youtube_api_base_url() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}

fn default_oauth_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_oauth_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_credentials_path() -> PathBuf {
    data_dir().join("oauth2.json")
}

fn default_playlist_privacy() -> String {
    "public".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            bind_address: default_bind_address(),
            reddit_base_url: default_reddit_base_url(),
            reddit_user_agent: default_reddit_user_agent(),
            sort_mode: SortMode::default(),
            feed_page_size: default_feed_page_size(),
            youtube_api_base_url: default_youtube_api_base_url(),
            oauth_auth_url: default_oauth_auth_url(),
            oauth_token_url: default_oauth_token_url(),
            client_secrets_path: None,
            credentials_path: default_credentials_path(),
            playlist_privacy: default_playlist_privacy(),
            client_id: None,
            client_secret: None,
            refresh_token: None,
        }
    }
}

impl Config {
    /// Loads the config file (writing defaults on first run), then applies
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Config>(&content)?
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            config
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(bind) = non_empty("REDDIT_PLAYLIST_BIND") {
            self.bind_address = bind;
        }
        self.client_id = non_empty("YOUTUBE_CLIENT_ID").or(self.client_id.take());
        self.client_secret = non_empty("YOUTUBE_CLIENT_SECRET").or(self.client_secret.take());
        self.refresh_token = non_empty("YOUTUBE_REFRESH_TOKEN").or(self.refresh_token.take());
    }

    fn validate(&self) -> Result<()> {
        // The feed request asks for two fewer entries than the page size.
        if self.feed_page_size < 3 || self.feed_page_size > 100 {
            return Err(AppError::Config(format!(
                "feed_page_size must be between 3 and 100, got {}",
                self.feed_page_size
            )));
        }
        Ok(())
    }

    /// Filesystem path (or `:memory:`) behind `database_url`.
    pub fn database_path(&self) -> &str {
        let url = self.database_url.trim();
        url.strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url)
    }
}
