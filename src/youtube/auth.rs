//! OAuth plumbing for the YouTube Data API.
//!
//! The first run goes through the interactive consent flow (`--authorize`),
//! which stores an offline refresh token. Every later run exchanges that
//! refresh token for a short-lived access token without user interaction.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use url::Url;

use crate::config::Config;
use crate::error::{AppError, Result};

const YOUTUBE_SCOPE: &str = "https://www.googleapis.com/auth/youtube";
const REDIRECT_URI: &str = "http://localhost";

/// Refresh this long before the token actually expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

/// Shape of the `client_secret.json` file the Google API console hands out.
#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientApp>,
    web: Option<ClientApp>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClientApp {
    client_id: String,
    client_secret: String,
}

#[derive(Debug, Default, Deserialize)]
struct StoredCredentials {
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
    refresh_token: Option<String>,
}

impl Credentials {
    /// Environment first, then the stored credential file, then the
    /// client secrets file for the application half.
    pub fn load(config: &Config) -> Result<Self> {
        let stored = read_stored(&config.credentials_path)?;
        let (client_id, client_secret) = resolve_client_app(config, &stored)?;

        let refresh_token = config
            .refresh_token
            .clone()
            .or(stored.refresh_token)
            .ok_or_else(|| {
                AppError::Auth(format!(
                    "no refresh token in {} or YOUTUBE_REFRESH_TOKEN; run with --authorize first",
                    config.credentials_path.display()
                ))
            })?;

        Ok(Self {
            client_id,
            client_secret,
            refresh_token,
        })
    }

    /// Writes the credential file readable by the owner only.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
            options.mode(0o600);
            // A file left by an older run keeps its mode on open.
            if path.exists() {
                std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
            }
        }

        let mut file = options.open(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

fn read_stored(path: &Path) -> Result<StoredCredentials> {
    if !path.exists() {
        return Ok(StoredCredentials::default());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn read_client_secrets(path: &Path) -> Result<ClientApp> {
    let content = std::fs::read_to_string(path)?;
    let file: ClientSecretsFile = serde_json::from_str(&content)?;
    file.installed.or(file.web).ok_or_else(|| {
        AppError::Auth(format!(
            "{} has neither an \"installed\" nor a \"web\" section",
            path.display()
        ))
    })
}

fn resolve_client_app(config: &Config, stored: &StoredCredentials) -> Result<(String, String)> {
    let from_secrets = match &config.client_secrets_path {
        Some(path) => Some(read_client_secrets(path)?),
        None => None,
    };

    let client_id = config
        .client_id
        .clone()
        .or_else(|| stored.client_id.clone())
        .or_else(|| from_secrets.as_ref().map(|app| app.client_id.clone()));
    let client_secret = config
        .client_secret
        .clone()
        .or_else(|| stored.client_secret.clone())
        .or_else(|| from_secrets.as_ref().map(|app| app.client_secret.clone()));

    match (client_id, client_secret) {
        (Some(id), Some(secret)) => Ok((id, secret)),
        _ => Err(AppError::Auth(
            "no OAuth client configured; set client_secrets_path or YOUTUBE_CLIENT_ID/YOUTUBE_CLIENT_SECRET"
                .to_string(),
        )),
    }
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Hands out access tokens, refreshing them when they are about to expire.
pub struct TokenManager {
    client: Client,
    token_url: String,
    credentials: Credentials,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenManager {
    pub fn new(client: Client, token_url: String, credentials: Credentials) -> Self {
        Self {
            client,
            token_url,
            credentials,
            cached: Mutex::new(None),
        }
    }

    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if Instant::now() + EXPIRY_MARGIN < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        tracing::debug!("Refreshing YouTube access token");
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", self.credentials.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let token = request_token(&self.client, &self.token_url, &params).await?;

        let value = token.access_token.clone();
        *cached = Some(AccessToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in.unwrap_or(3600)),
        });
        Ok(value)
    }
}

async fn request_token(client: &Client, token_url: &str, params: &[(&str, &str)]) -> Result<TokenResponse> {
    let response = client.post(token_url).form(params).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Auth(format!(
            "token endpoint returned HTTP {status}: {body}"
        )));
    }
    Ok(response.json().await?)
}

pub fn consent_url(config: &Config, client_id: &str) -> Result<String> {
    let url = Url::parse_with_params(
        &config.oauth_auth_url,
        &[
            ("client_id", client_id),
            ("redirect_uri", REDIRECT_URI),
            ("response_type", "code"),
            ("scope", YOUTUBE_SCOPE),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| AppError::Config(format!("invalid oauth_auth_url: {e}")))?;
    Ok(url.to_string())
}

/// Accepts either the bare code or the whole redirect URL pasted from the
/// browser's address bar.
fn parse_pasted_code(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Ok(url) = Url::parse(input) {
        return url
            .query_pairs()
            .find(|(key, _)| key == "code")
            .map(|(_, value)| value.into_owned());
    }
    Some(input.to_string())
}

pub async fn exchange_code(client: &Client, config: &Config, code: &str) -> Result<Credentials> {
    let stored = read_stored(&config.credentials_path)?;
    let (client_id, client_secret) = resolve_client_app(config, &stored)?;

    let params = [
        ("client_id", client_id.as_str()),
        ("client_secret", client_secret.as_str()),
        ("code", code),
        ("redirect_uri", REDIRECT_URI),
        ("grant_type", "authorization_code"),
    ];
    let token = request_token(client, &config.oauth_token_url, &params).await?;

    let refresh_token = token.refresh_token.ok_or_else(|| {
        AppError::Auth("consent response carried no refresh token".to_string())
    })?;

    Ok(Credentials {
        client_id,
        client_secret,
        refresh_token,
    })
}

/// Walks the user through consent on the terminal and stores the result.
pub async fn authorize_interactive(config: &Config) -> Result<PathBuf> {
    let stored = read_stored(&config.credentials_path)?;
    let (client_id, _) = resolve_client_app(config, &stored)?;

    println!("Open this URL in a browser and grant access:\n\n{}\n", consent_url(config, &client_id)?);
    println!("Then paste the code (or the full URL you were redirected to):");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let line = lines.next_line().await?.unwrap_or_default();
    let code = parse_pasted_code(&line)
        .ok_or_else(|| AppError::Auth("no authorization code entered".to_string()))?;

    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    let credentials = exchange_code(&client, config, &code).await?;
    credentials.save(&config.credentials_path)?;

    tracing::info!("Stored YouTube credentials in {}", config.credentials_path.display());
    Ok(config.credentials_path.clone())
}
