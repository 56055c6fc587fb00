//! Oiotung Agent - game server status relay
//!
//! Keeps a TCP session open against the status server:
//! - Pings with the fixed magic/version preamble and decodes the reply frame
//! - Renders the online template and PATCHes it to the webhook
//! - Falls back to the offline template whenever a session fails
//! - Exits cleanly after the scheduled uptime so a supervisor can relaunch it

mod codec;
mod config;
mod notify;
mod session;
mod supervisor;
mod template;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::notify::Notifier;
use crate::supervisor::{Shutdown, Supervisor};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("oiotung_agent=info")),
        )
        .init();

    match start().await {
        Ok(Shutdown::ScheduledRestart) => std::process::exit(0),
        Err(e) => {
            error!("Error on application start: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn start() -> Result<Shutdown> {
    info!("Starting Oiotung Agent v{}", env!("CARGO_PKG_VERSION"));

    let path = Config::default_path();
    info!("Loading config from {}", path.display());
    let config = Config::load(&path)
        .await
        .with_context(|| format!("Failed to load {}", path.display()))?;
    info!(
        "Config loaded - status server {}:{}",
        config.server.host, config.server.port
    );

    let notifier = Notifier::from_config(&config).context("Failed to build webhook client")?;

    Ok(Supervisor::new(config, notifier).run().await)
}
