//! Headless prediction client
//!
//! Connects to the sea server, runs a prediction session for one entity and
//! logs its corrected state. Useful for soak-testing prediction against a
//! live server without a renderer.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ship_game_client::app::Session;
use ship_game_client::config::Config;
use ship_game_client::game::DensityField;
use ship_game_client::util::time::SessionClock;
use ship_game_client::ws::{self, OutboundSink};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    init_tracing(&config.log_level);

    info!("Starting ship game prediction client");
    info!("Server: {}", config.server_url);

    let density = match &config.density_map {
        Some(path) => DensityField::open(path)?,
        None => {
            info!("No density map configured, assuming open water");
            DensityField::open_water()
        }
    };

    let ws::Connection {
        inbound,
        outbound,
        tasks,
    } = ws::connect(&config.server_url).await?;

    let session = Session::new(
        config.session.clone(),
        OutboundSink::new(outbound),
        Arc::new(density),
    );

    // Nothing drives controls headlessly; keep the sender so the
    // command branch stays idle rather than closed
    let (_commands_tx, commands_rx) = mpsc::channel(16);

    let session = session
        .run(SessionClock::new(), inbound, commands_rx, shutdown_signal())
        .await;
    info!(latency_ms = ?session.latency(), "Session ended");

    // Release the last outbound sender so the writer can close the socket
    drop(session);
    tasks.finish().await;

    info!("Client shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
