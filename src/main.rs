//! nograd server
//!
//! Serves accounts, uploads, profiles and the leaderboard over HTTP

use std::sync::Arc;

use nograd::server::AppState;
use nograd::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting nograd server");

    let config = Config::load()?;
    let database_url = std::env::var("DATABASE_URL").ok();

    let state = Arc::new(AppState::from_config(&config, database_url.as_deref()).await?);

    nograd::server::run_server(&config.server.host, config.server.port, state).await?;

    Ok(())
}
