use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use greenpath::config::{parse_coordinate, AppConfig};
use greenpath::registry::spawn_idle_sweeper;
use greenpath::{create_router, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Route and charging orchestration service for e-bike trips"
)]
struct Args {
    /// Address to listen on, overrides GREENPATH_BIND
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Device position as `lat,lng`; unset behaves like a denied permission
    #[arg(long)]
    device_location: Option<String>,

    /// Position used when the device cannot report one, as `lat,lng`
    #[arg(long)]
    fallback_location: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "greenpath=debug,tower_http=info,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = AppConfig::from_env()?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(raw) = args.device_location.as_deref() {
        config.device_location = Some(parse_coordinate("--device-location", raw)?);
    }
    if let Some(raw) = args.fallback_location.as_deref() {
        config.fallback_location = parse_coordinate("--fallback-location", raw)?;
    }

    tracing::info!(
        "station mirrors in priority order: {}",
        config.station_mirrors.join(", ")
    );
    let state = AppState::from_config(&config)?;
    spawn_idle_sweeper(Arc::clone(&state.sessions), SESSION_SWEEP_INTERVAL);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!("starting greenpath on http://{}", config.bind);
    axum::serve(listener, app).await?;
    Ok(())
}
