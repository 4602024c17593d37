use std::collections::BTreeSet;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;

use crate::app::{AddOutcome, App};
use crate::error::AppError;

use super::render::{render_page, Notice, PageView};
use super::AppState;

/// Only read failures get here; refresh failures are logged and swallowed.
pub struct WebError(AppError);

impl From<AppError> for WebError {
    fn from(e: AppError) -> Self {
        Self(e)
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        tracing::error!("Request failed: {}", self.0);
        (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong").into_response()
    }
}

type WebResult<T> = Result<T, WebError>;

#[derive(Debug, Default, Deserialize)]
pub struct ViewParams {
    added: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddForm {
    subreddit_name: String,
}

pub async fn refresh_all(State(state): State<AppState>) -> WebResult<String> {
    let report = state.app.refresh_all().await?;
    Ok(format!(
        "Refreshed {} subreddit playlists ({} failed)",
        report.refreshed.len(),
        report.failed.len()
    ))
}

async fn tracked_names(app: &App) -> Result<Vec<String>, AppError> {
    let names: BTreeSet<String> = app
        .repository
        .list_tracked_subreddit_names()
        .await?
        .into_iter()
        .collect();
    Ok(names.into_iter().collect())
}

pub async fn subreddit_playlist(
    State(state): State<AppState>,
    Path(subreddit_name): Path<String>,
    Query(params): Query<ViewParams>,
) -> WebResult<Html<String>> {
    let repository = &state.app.repository;
    let playlist = repository
        .get_playlist(&subreddit_name, App::today())
        .await?;
    let videos = match &playlist {
        Some(playlist) => repository.list_playlist_videos(&playlist.playlist_id).await?,
        None => Vec::new(),
    };
    let tracked = tracked_names(&state.app).await?;

    let notice = params
        .added
        .is_some()
        .then(|| Notice::Added(subreddit_name.clone()));

    Ok(Html(render_page(&PageView {
        subreddit_name: Some(&subreddit_name),
        playlist: playlist.as_ref(),
        videos: &videos,
        tracked: &tracked,
        notice,
    })))
}

pub async fn add_subreddit(
    State(state): State<AppState>,
    Form(form): Form<AddForm>,
) -> WebResult<Response> {
    let name = form.subreddit_name.trim().to_string();

    match state.app.add_subreddit(&name).await? {
        AddOutcome::Added { .. } => {
            let location = format!("/{}?added=1", urlencoding::encode(&name));
            Ok(Redirect::to(&location).into_response())
        }
        AddOutcome::InvalidName => {
            let tracked = tracked_names(&state.app).await?;
            let page = render_page(&PageView {
                subreddit_name: None,
                playlist: None,
                videos: &[],
                tracked: &tracked,
                notice: Some(Notice::InvalidName(name)),
            });
            Ok((StatusCode::BAD_REQUEST, Html(page)).into_response())
        }
    }
}
