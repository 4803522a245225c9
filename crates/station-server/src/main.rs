mod catalog;
mod http;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use station_proto::config::Config;

use crate::catalog::Catalog;

/// Development backend for station-map: bounds-filtered GeoJSON feed plus
/// per-station detail lookups, served from a TOML catalog.
#[derive(Parser, Debug)]
#[command(name = "station-server")]
struct Args {
    /// Config file (default: <config dir>/station-map/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Station catalog TOML; overrides `server.catalog`
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Listen port; overrides `server.port`
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,station_server=debug")),
        )
        .init();

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    info!("Config loaded from: {:?}", args.config.clone().unwrap_or_else(Config::config_path));

    let catalog_path = args.catalog.unwrap_or(config.server.catalog);
    let catalog = Catalog::load(&catalog_path)?;
    if catalog.is_empty() {
        tracing::warn!("catalog {} has no stations", catalog_path.display());
    }

    let addr = format!("{}:{}", config.server.bind_address, args.port.unwrap_or(config.server.port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    http::serve(listener, Arc::new(catalog)).await
}
