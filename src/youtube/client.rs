use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{AppError, Result};

use super::auth::{Credentials, TokenManager};
use super::service::{PlaylistApi, PlaylistItemsPage};

/// The Data API never returns more than this per page.
const MAX_PAGE_SIZE: u32 = 50;

#[derive(Debug, Serialize)]
struct PlaylistResource<'a> {
    snippet: PlaylistSnippet<'a>,
    status: PlaylistStatus<'a>,
}

#[derive(Debug, Serialize)]
struct PlaylistSnippet<'a> {
    title: &'a str,
    description: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistStatus<'a> {
    privacy_status: &'a str,
}

#[derive(Debug, Serialize)]
struct PlaylistItemResource<'a> {
    snippet: PlaylistItemSnippet<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemSnippet<'a> {
    playlist_id: &'a str,
    position: u32,
    resource_id: ResourceId<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId<'a> {
    kind: &'a str,
    video_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreatedResource {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemListResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    snippet: ItemSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemSnippet {
    resource_id: ItemResourceId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemResourceId {
    video_id: Option<String>,
}

/// Authenticated client for the YouTube Data API v3 playlist endpoints.
pub struct YouTubeClient {
    client: Client,
    base_url: String,
    tokens: TokenManager,
}

impl YouTubeClient {
    pub fn new(config: &Config, credentials: Credentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let tokens = TokenManager::new(client.clone(), config.oauth_token_url.clone(), credentials);

        Ok(Self {
            client,
            base_url: config.youtube_api_base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    fn endpoint(&self, resource: &str) -> String {
        format!("{}/{}", self.base_url, resource)
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AppError::Upstream { status, body })
}

#[async_trait]
impl PlaylistApi for YouTubeClient {
    async fn create_playlist(&self, title: &str, description: &str, privacy: &str) -> Result<String> {
        let resource = PlaylistResource {
            snippet: PlaylistSnippet { title, description },
            status: PlaylistStatus {
                privacy_status: privacy,
            },
        };

        let response = self
            .client
            .post(self.endpoint("playlists"))
            .bearer_auth(self.tokens.access_token().await?)
            .query(&[("part", "snippet,status")])
            .json(&resource)
            .send()
            .await?;

        let created: CreatedResource = ensure_success(response).await?.json().await?;
        Ok(created.id)
    }

    async fn list_playlist_items(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
    ) -> Result<PlaylistItemsPage> {
        let max_results = MAX_PAGE_SIZE.to_string();
        let mut query = vec![
            ("part", "snippet"),
            ("playlistId", playlist_id),
            ("maxResults", max_results.as_str()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let response = self
            .client
            .get(self.endpoint("playlistItems"))
            .bearer_auth(self.tokens.access_token().await?)
            .query(&query)
            .send()
            .await?;

        let list: PlaylistItemListResponse = ensure_success(response).await?.json().await?;
        Ok(PlaylistItemsPage {
            video_ids: list
                .items
                .into_iter()
                .filter_map(|item| item.snippet.resource_id.video_id)
                .collect(),
            next_page_token: list.next_page_token,
        })
    }

    async fn insert_playlist_item(&self, playlist_id: &str, video_id: &str) -> Result<()> {
        let resource = PlaylistItemResource {
            snippet: PlaylistItemSnippet {
                playlist_id,
                position: 0,
                resource_id: ResourceId {
                    kind: "youtube#video",
                    video_id,
                },
            },
        };

        let response = self
            .client
            .post(self.endpoint("playlistItems"))
            .bearer_auth(self.tokens.access_token().await?)
            .query(&[("part", "snippet")])
            .json(&resource)
            .send()
            .await?;

        ensure_success(response).await?;
        Ok(())
    }

    async fn delete_playlist(&self, playlist_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.endpoint("playlists"))
            .bearer_auth(self.tokens.access_token().await?)
            .query(&[("id", playlist_id)])
            .send()
            .await?;

        ensure_success(response).await?;
        Ok(())
    }
}
