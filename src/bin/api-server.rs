//! Modelkeeper API Server
//!
//! Schedule administration, manual triggers, health, metrics and the
//! WebSocket event channel. Events published by workers are relayed in from
//! Redis pub/sub, so this service is stateless and can be horizontally scaled.

use dotenvy::dotenv;
use modelkeeper::config::Settings;
use modelkeeper::core::http::start_server;
use modelkeeper::logging;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    logging::init_logging();

    let settings = Settings::from_env();
    let port = settings.port;
    info!("Starting Modelkeeper API Server");
    info!(environment = %settings.environment, "Environment");
    info!(port = port, "HTTP Server: http://0.0.0.0:{}", port);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(settings).await {
            error!(error = %e, "HTTP server error");
        }
    });

    info!("API server started, waiting for shutdown signal...");
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutting down API server...");
            info!("API server stopped");
        }
        _ = server_handle => {
            error!("HTTP server stopped");
        }
    }

    Ok(())
}
