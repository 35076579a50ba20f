//! Server command - run the nograd API in the foreground

use std::sync::Arc;

use anyhow::Result;
use nograd::server::{run_server, AppState};
use nograd::Config;

pub async fn run(host: Option<String>, port: Option<u16>, database_url: Option<String>) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let state = Arc::new(AppState::from_config(&config, database_url.as_deref()).await?);
    run_server(&config.server.host, config.server.port, state).await
}
