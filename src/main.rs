use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use std::{fmt::Debug, path::PathBuf};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sekai_asset_updater::config::{AppConfig, CliConfig, FileConfig};
use sekai_asset_updater::extraction::MediaTools;
use sekai_asset_updater::server::{run_server, RequestsLoggingLevel, ServerConfig};
use sekai_asset_updater::updater::{AssetUpdater, ProxyFailoverTransport, RunCoordinator};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the TOML config file with the server region settings.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The address to listen on.
    #[clap(long, default_value = "0.0.0.0")]
    pub host: String,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 12345)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}...", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let cli_config = CliConfig {
        host: cli_args.host,
        port: cli_args.port,
        logging_level: cli_args.logging_level,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    if config.regions.is_empty() {
        warn!("No server region is enabled, every update request will be rejected");
    }
    for region in config.regions.keys() {
        info!("{} server asset updater enabled", region);
    }

    let transport = ProxyFailoverTransport::new(
        &config.proxies,
        Duration::from_secs(config.request_timeout_sec),
    )
    .context("Failed to build HTTP client")?;
    info!(
        "Outgoing requests use {} route(s) with a {}s timeout",
        transport.route_count(),
        config.request_timeout_sec
    );

    let mut updater = AssetUpdater::new(
        Arc::new(transport),
        config.regions,
        config.disabled_regions,
    )
    .with_media_tools(MediaTools::from_settings(&config.tools));
    if let Some(uploads) = config.uploads {
        info!(
            "Uploads go to {} remote storage(s)",
            uploads.storages().len()
        );
        updater = updater.with_uploads(uploads);
    }
    let updater = Arc::new(updater);

    let server_config = ServerConfig {
        requests_logging_level: config.logging_level,
        host: config.host,
        port: config.port,
        auth: config.auth,
    };
    run_server(server_config, updater, RunCoordinator::new()).await
}
