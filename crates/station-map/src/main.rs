mod app;
mod theme;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use station_map::detail::{HttpDetailSource, StationDetailLoader};
use station_map::log_layer::TuiLogLayer;
use station_map::terminal_engine::TerminalEngine;
use station_map::{MapBroadcast, MapCore, MapEvent};
use station_proto::config::Config;

#[derive(Parser, Debug)]
#[command(name = "station-map", about = "Live charging-station map in the terminal")]
struct Args {
    /// Config file (default: <config dir>/station-map/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backend serving /geojson/stations and /station/<beacon>.json
    #[arg(long)]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let data_dir = station_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating {}", data_dir.display()))?;
    let log_path = data_dir.join("station-map.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // ── Logging: file + status-line layer ────────────────────────────────────
    let (log_tx, log_rx) = broadcast::channel::<String>(64);

    // Allow RUST_LOG override; keep HTTP client internals quiet by default.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(log_file)
                .with_ansi(false),
        )
        .with(TuiLogLayer::new(log_tx))
        .with(tracing_subscriber::EnvFilter::new(log_filter))
        .init();

    // Print log path to stderr so the operator can tail it immediately.
    eprintln!("station-map log: {}", log_path.display());
    tracing::info!("station-map starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            tracing::warn!("config: {:#}, using defaults", e);
            Config::default()
        }),
    };
    if let Some(base_url) = args.base_url {
        config.feed.base_url = base_url.clone();
        config.detail.base_url = base_url;
    }
    tracing::info!(
        "feed {} (debounce {}ms), details {}",
        config.feed.base_url,
        config.feed.debounce_ms,
        config.detail.base_url
    );

    // ── Channels: UI/engine → MapCore, MapCore → UI ──────────────────────────
    let (event_tx, event_rx) = mpsc::channel::<MapEvent>(1024);
    let (broadcast_tx, broadcast_rx) = broadcast::channel::<MapBroadcast>(256);

    let client = reqwest::Client::builder()
        .user_agent(concat!("station-map/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("building HTTP client")?;

    let engine = Arc::new(TerminalEngine::new(
        &config.map,
        config.feed.source_id.clone(),
        client.clone(),
        event_tx.clone(),
    ));
    let loader = StationDetailLoader::new(
        Arc::new(HttpDetailSource::new(client, config.detail.base_url.clone())),
        &config.detail,
    );

    // ── Spawn MapCore event loop ─────────────────────────────────────────────
    let core = MapCore::new(
        &config,
        engine.clone(),
        loader,
        event_tx.clone(),
        broadcast_tx,
    );
    let core_handle = tokio::spawn(async move {
        if let Err(e) = core.run(event_rx).await {
            tracing::error!("MapCore exited with error: {}", e);
        }
    });

    // ── Run TUI ──────────────────────────────────────────────────────────────
    let app = app::App::new(engine, event_tx);
    app.run(broadcast_rx, log_rx).await?;

    let _ = core_handle.await;
    tracing::info!("station-map stopped");
    Ok(())
}
