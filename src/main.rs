//! a3s-pubsub - WebSocket front end for the topic broadcast engine

use a3s_pubsub::ServerConfig;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "a3s-pubsub")]
#[command(author = "A3S Lab")]
#[command(version)]
#[command(about = "Topic-based publish/subscribe broadcast server")]
struct Cli {
    /// Configuration file path (.toml)
    #[arg(short, long, env = "A3S_PUBSUB_CONFIG")]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long, env = "A3S_PUBSUB_HOST")]
    host: Option<String>,

    /// HTTP port
    #[arg(short, long, env = "A3S_PUBSUB_PORT")]
    port: Option<u16>,

    /// Per-subscriber buffer size, in events
    #[arg(long)]
    capacity: Option<usize>,

    /// Honor only the newest publisher on auto-created topics
    #[arg(long)]
    single_publisher: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => ServerConfig::default(),
        };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(capacity) = self.capacity {
            config.subscriber_capacity = capacity;
        }
        if self.single_publisher {
            config.multi_publisher = false;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("a3s_pubsub={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = cli.into_config()?;
    a3s_pubsub::server::serve(config)
        .await
        .context("Pub/sub server error")?;

    Ok(())
}
