//! Network device MCP Server - Entry point
//!
//! Parses CLI arguments, validates configuration (the testbed file must
//! exist), starts the MCP server on stdio transport, and handles graceful
//! shutdown.

use std::sync::Arc;

use clap::Parser;
use rmcp::service::ServiceExt;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use netdev_mcp::compact::{TiktokenCounter, TokenCounter};
use netdev_mcp::config::{Args, Config};
use netdev_mcp::error::Result;
use netdev_mcp::server::NetdevMcpServer;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    // Logging goes to stderr; stdout is for MCP JSON-RPC
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match Config::from_args(args) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("{}", e);
            return Err(e);
        }
    };

    info!(
        "Network device MCP Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );
    info!("Testbed: {}", config.testbed.display());
    info!(
        "Connect timeout: {}s, command timeout: {}ms, max chars: {}",
        config.connect_timeout.as_secs(),
        config.command_timeout.as_millis(),
        config
            .max_chars
            .map_or("unlimited".to_string(), |n| n.to_string())
    );

    if config.disable_configure {
        info!("configure_device tool is disabled");
    }

    let tokens = TiktokenCounter::load().map(|counter| Arc::new(counter) as Arc<dyn TokenCounter>);
    let server = NetdevMcpServer::from_config(Arc::clone(&config), tokens);

    info!("Network device MCP Server running on stdio");

    let shutdown = tokio::spawn(async {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT (Ctrl+C), shutting down...");
            }
            _ = terminate() => {
                info!("Received SIGTERM, shutting down...");
            }
        }
    });

    match server.serve(rmcp::transport::io::stdio()).await {
        Ok(running_server) => {
            info!("MCP server is serving...");
            tokio::select! {
                result = running_server.waiting() => {
                    if let Err(e) = result {
                        error!("Server error: {}", e);
                    }
                }
                _ = shutdown => {}
            }
        }
        Err(e) => {
            error!("Failed to start MCP server: {}", e);
            return Err(netdev_mcp::NetdevMcpError::connection(e.to_string()));
        }
    }

    info!("Network device MCP Server stopped");

    Ok(())
}

#[cfg(unix)]
async fn terminate() {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!("Failed to register SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
