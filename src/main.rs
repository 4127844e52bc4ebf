use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use parley::config::{Config, Overrides};
use parley::logging;
use parley::session::Session;
use parley::settings::Settings;
use parley::transport::HttpTransport;
use parley::ui;

#[derive(Parser)]
#[command(name = "parley")]
#[command(version)]
#[command(about = "Terminal chat client for a streaming chat backend", long_about = None)]
struct Cli {
    /// Base URL of the chat backend
    #[arg(long)]
    endpoint: Option<String>,

    /// Model selected at startup
    #[arg(long)]
    model: Option<String>,

    /// Config file to read instead of ~/.parley/config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter, e.g. info or parley=debug
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?.with_overrides(Overrides {
        endpoint: cli.endpoint,
        model: cli.model,
        log_level: cli.log_level,
    })?;

    match logging::init(&config) {
        Ok(path) => info!(log_file = %path.display(), endpoint = %config.endpoint, "parley starting"),
        Err(err) => eprintln!("Warning: logging disabled: {:#}", err),
    }

    let transport = HttpTransport::new(&config).context("Failed to build HTTP client")?;
    let session = Session::new(transport, Settings::from_config(&config));

    ui::run(session).await
}
