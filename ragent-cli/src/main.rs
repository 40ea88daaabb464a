//! `ragent`: ingest documents into a vector store and ask a retrieval agent
//! about them.

mod app;
mod cli;
mod config;

use anyhow::{Context as _, Result};
use clap::Parser as _;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _};

use cli::Cli;
use config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("invalid configuration")?;
    if let Some(collection) = &cli.collection {
        config = config.with_collection(collection).context("invalid --collection")?;
    }
    tracing::debug!(?config, "configuration loaded");

    app::run(cli.command, &config).await
}
