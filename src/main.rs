use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

mod app;
mod config;
mod db;
mod error;
mod feed;
mod models;
mod web;
mod youtube;

#[cfg(test)]
mod test_support;

use app::{AddOutcome, App, RefreshOutcome};
use config::Config;
use error::Result;

/// Keeps a daily YouTube playlist for each tracked subreddit.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Refresh every tracked subreddit once and exit instead of serving.
    #[arg(long, conflicts_with_all = ["add", "authorize", "delete_all_playlists"])]
    refresh: bool,

    /// Track a subreddit, refresh its playlist, and exit.
    #[arg(long, value_name = "SUBREDDIT")]
    add: Option<String>,

    /// Run the YouTube consent flow and store the offline credential.
    #[arg(long)]
    authorize: bool,

    /// Delete every recorded playlist on YouTube and forget it locally.
    #[arg(long)]
    delete_all_playlists: bool,

    /// Use this config file instead of the default location.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    if cli.authorize {
        let path = youtube::authorize_interactive(&config).await?;
        println!("Stored credentials in {}", path.display());
        return Ok(());
    }

    let app = App::new(&config).await?;

    if cli.refresh {
        let report = app.refresh_all().await?;
        println!(
            "Refreshed {} subreddit playlists ({} failed)",
            report.refreshed.len(),
            report.failed.len()
        );
        return app.close().await;
    }

    if let Some(name) = cli.add.as_deref() {
        match app.add_subreddit(name).await? {
            AddOutcome::InvalidName => eprintln!("{} is not a valid subreddit name", name),
            AddOutcome::Added { refresh, .. } => match refresh {
                RefreshOutcome::Refreshed { playlist_id, report } => println!(
                    "/r/{}: playlist {} ({} videos added)",
                    name.trim(),
                    models::playlist_url(&playlist_id),
                    report.added
                ),
                RefreshOutcome::Failed(reason) => {
                    eprintln!("/r/{} is tracked but could not be refreshed: {}", name.trim(), reason)
                }
            },
        }
        return app.close().await;
    }

    if cli.delete_all_playlists {
        let deleted = app.delete_all_playlists().await?;
        println!("Deleted {} playlists", deleted);
        return app.close().await;
    }

    let app = Arc::new(app);
    web::serve(app.clone(), &config.bind_address).await?;

    match Arc::try_unwrap(app) {
        Ok(app) => app.close().await,
        Err(_) => {
            tracing::warn!("Store still in use at shutdown; leaving it to drop");
            Ok(())
        }
    }
}
