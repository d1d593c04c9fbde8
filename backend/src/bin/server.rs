//! Dispatch HTTP Server Binary
//!
//! Main entry point for the dispatch REST API server. Loads the optimizer
//! configuration, sets up the HTTP router, and starts serving requests.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin dispatch-server
//!
//! # With real drive times
//! MAPBOX_TOKEN=pk.... cargo run --bin dispatch-server --features mapbox
//! ```
//!
//! # Environment Variables
//!
//! - `HOST`: Server host (default: 0.0.0.0)
//! - `PORT`: Server port (default: 8080)
//! - `DISPATCH_CONFIG`: Path to an `optimizer.toml` (default: searched)
//! - `MAPBOX_TOKEN`: Drive-time service token
//! - `RUST_LOG`: Log level (default: info)

use std::env;
use std::net::SocketAddr;

use anyhow::Context;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crew_dispatch::config::OptimizerConfig;
use crew_dispatch::http::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting dispatch HTTP server");

    let config = OptimizerConfig::load().context("Failed to load optimizer configuration")?;
    info!(
        "Configuration loaded (drive times: {:?}, 2-opt budget: {})",
        config.drive_time.provider, config.routing.two_opt_max_iterations
    );
    if config.drive_time.token().is_some() && cfg!(not(feature = "mapbox")) {
        warn!(
            "A drive-time token is set but the mapbox feature is off; \
             runs will use the zone heuristic"
        );
    }

    let state = AppState::new(config);
    let app = create_router(state);

    // Determine bind address
    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", host, port))?;

    info!("Server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
