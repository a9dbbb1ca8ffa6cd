mod config;
mod error;
mod logger;
mod models;
mod router;
mod upstream;

use std::net::SocketAddr;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use config::AppConfig;
use router::{run_router, AppState};
use upstream::HttpUpstream;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();
  logger::init();

  let config = AppConfig::from_env().context("invalid configuration")?;
  let upstream = HttpUpstream::new(&config).context("failed to build upstream client")?;

  let port = config.port;
  let address = SocketAddr::from(([0, 0, 0, 0], port));
  let listener = TcpListener::bind(address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  info!("Chat proxy running on port {port}");
  info!("Health check: http://localhost:{port}/health");
  info!("Chat endpoint: http://localhost:{port}/api/chat");
  if config.api_key.is_none() {
    warn!("UPSTREAM_API_KEY not found in environment; chat requests will fail until it is set");
  }

  run_router(listener, AppState { config, upstream }, shutdown_signal()).await
}

async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(err) = signal::ctrl_c().await {
      warn!("failed to listen for Ctrl+C: {err}");
      std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C");
  };

  #[cfg(unix)]
  let terminate = async {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
      Ok(mut stream) => {
        stream.recv().await;
        info!("Received terminate signal");
      }
      Err(err) => {
        warn!("failed to install SIGTERM handler: {err}");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {},
    _ = terminate => {},
  }
}
