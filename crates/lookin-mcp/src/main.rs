mod config;
mod format;
mod jsonrpc;
mod stdio;
mod tools;

use anyhow::{Context, Result};
use clap::Parser;
use config::ProcessConfig;
use lookin_proto::Session;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ProcessConfig::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_log_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("lookin-mcp starting");

    let session = Session::new();
    stdio::run(&session, config.connect_timeout())
        .await
        .context("stdio loop failed")?;

    tracing::info!("lookin-mcp exiting");
    Ok(())
}
