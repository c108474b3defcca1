//! Social forum API server.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────────────┐
//!                  │                       SOCIAL API                         │
//!                  │                                                          │
//!  Client Request  │  ┌─────────┐   ┌────────────┐   ┌─────────────────────┐  │
//!  ────────────────┼─▶│  http   │──▶│ rate limit │──▶│ auth (protected     │  │
//!                  │  │ layers  │   │ (security) │   │ routes, gate)       │  │
//!                  │  └─────────┘   └────────────┘   └──────────┬──────────┘  │
//!                  │                                            │             │
//!                  │                      ┌─────────────────────┤             │
//!                  │                      ▼                     ▼             │
//!                  │              ┌──────────────┐      ┌──────────────┐      │
//!                  │              │   identity   │      │   handlers   │      │
//!                  │              │ cache/store  │      │ + authz gate │      │
//!                  │              └──────┬───────┘      └──────┬───────┘      │
//!                  │                     ▼                     ▼             │
//!                  │              ┌──────────────────────────────────┐        │
//!                  │              │              store               │        │
//!                  │              └──────────────────────────────────┘        │
//!                  │                                                          │
//!                  │  config · observability · lifecycle · resilience         │
//!                  └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use tokio::net::TcpListener;

use social_api::config;
use social_api::http::HttpServer;
use social_api::lifecycle::{signals, Components};
use social_api::observability::logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = config::load(config_path.as_deref())?;

    logging::init(&config.observability.log_level);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "social-api starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        env = %config.env.as_str(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let components = Components::build(config)?;

    let listener = TcpListener::bind(&components.config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(components.app_state(), &components.config);
    let server_task = tokio::spawn(server.run(listener, components.subscribe()));

    signals::wait_for_signal().await;
    components.close().await;

    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "HTTP server failed"),
        Err(e) => tracing::error!(error = %e, "HTTP server task panicked"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
