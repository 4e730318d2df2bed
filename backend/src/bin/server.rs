//! Bike-share analytics HTTP server.
//!
//! Loads configuration, creates the repository, sets up the HTTP router and
//! starts serving requests.
//!
//! # Usage
//!
//! ```bash
//! # Empty in-memory store (default)
//! cargo run --bin bikeshare-server
//!
//! # Store loaded from a snapshot directory
//! SNAPSHOT_DIR=./data cargo run --bin bikeshare-server
//! ```
//!
//! # Environment Variables
//!
//! - `HOST`: Server host (default: 0.0.0.0)
//! - `PORT`: Server port (default: 8080)
//! - `REPOSITORY_TYPE`: `local` or `snapshot`
//! - `SNAPSHOT_DIR`: Snapshot directory for the snapshot repository
//! - `FEED_DISCOVERY_URL`: GBFS discovery document
//! - `RUST_LOG`: Log level (default: info)

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use bikeshare::config::AppConfig;
use bikeshare::db::{services, RepositoryFactory};
use bikeshare::feed::FeedSource;
use bikeshare::http::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting bike-share analytics server");

    let config = AppConfig::load()?;
    let repository = RepositoryFactory::from_app_config(&config).await?;
    info!(
        "Repository initialized ({})",
        config.repository.repo_type
    );

    match services::station_table_info(repository.as_ref()).await? {
        Some(table) => info!(
            "Station table: {} stations, refreshed {}",
            table.station_count, table.refreshed_at
        ),
        None => info!("Station table is empty; POST /v1/stations/refresh to load it"),
    }

    let feed_source = feed_source(&config)?;
    let addr: SocketAddr =
        format!("{}:{}", config.server.host, config.server.port).parse()?;

    let state = AppState::new(repository, feed_source, config);
    let app = create_router(state);

    info!("Server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(feature = "live-feed")]
fn feed_source(config: &AppConfig) -> anyhow::Result<Arc<dyn FeedSource>> {
    let source = bikeshare::feed::HttpFeedSource::new(config.feed.clone())?;
    info!("Live feed: {}", config.feed.discovery_url);
    Ok(Arc::new(source))
}

#[cfg(not(feature = "live-feed"))]
fn feed_source(_config: &AppConfig) -> anyhow::Result<Arc<dyn FeedSource>> {
    tracing::warn!("Built without the live-feed feature; station refreshes return an empty table");
    Ok(Arc::new(bikeshare::feed::StaticFeedSource::default()))
}
