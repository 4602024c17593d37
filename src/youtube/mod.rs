mod auth;
mod client;
mod service;

pub use auth::{authorize_interactive, Credentials};
pub use client::YouTubeClient;
pub use service::{PlaylistApi, PlaylistService, ReconcileReport};

#[cfg(test)]
pub use service::PlaylistItemsPage;
