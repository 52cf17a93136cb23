//! Radar overlay API service.
//!
//! Renders the newest MRMS lowest-altitude reflectivity mosaic as a
//! transparent PNG on request, falling back to the last good render when
//! upstream or decoding fails.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use grib2_parser::GridDecoder;
use metrics_exporter_prometheus::PrometheusBuilder;
use storage::CacheStore;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use radar_api::config::Args;
use radar_api::server::run_server;
use radar_api::{AppState, HttpSourceClient, RadarService};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    radar_api::metrics::describe();

    info!(
        index_url = %args.index_url,
        cache_dir = %args.cache_dir.display(),
        downsample_factor = args.downsample_factor,
        "Starting radar API"
    );

    let cache = Arc::new(CacheStore::open(&args.cache_dir).await?);
    let source = Arc::new(HttpSourceClient::new(args.source_config())?);
    let service = RadarService::new(source, cache, GridDecoder::default(), args.downsample_factor);
    let state = Arc::new(AppState::new(
        service,
        prometheus,
        args.public_base_url.clone(),
    ));

    run_server(state, args.listen).await
}
