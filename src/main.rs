//! Feedback context server entry point.
//!
//! Starts the context registry and serves it over stdio (default) or HTTP,
//! depending on `CONTEXT_TRANSPORT`.
//!
//! Features:
//! - Graceful shutdown that stops refresh schedules and drains running loads
//! - Signal handling (SIGTERM, SIGINT, SIGHUP)

use anyhow::Result;
use feedback_context_server::shutdown::{
    install_signal_handlers, new_shutdown_controller_with_config, ShutdownConfig,
};
use feedback_context_server::transport::{TransportConfig, TransportType};
use feedback_context_server::{Config, FeedbackContextServer};
use mcpkit::prelude::*;
use mcpkit::transport::stdio::StdioTransport;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries JSON-RPC in stdio mode
    init_logging();

    let transport = TransportConfig::from_env()?;

    let version = env!("CARGO_PKG_VERSION");
    eprintln!("Feedback Context Server v{version} starting...");
    eprintln!("Transport: {}", transport.transport_type);

    std::panic::set_hook(Box::new(|info| {
        eprintln!("[PANIC] {}", info);
    }));

    let config = Config::from_env()?;
    eprintln!("Configuration loaded successfully");

    let shutdown_controller = new_shutdown_controller_with_config(&ShutdownConfig::from_env());
    install_signal_handlers(shutdown_controller.clone()).await;

    let server = FeedbackContextServer::new(config).await?;
    let registry = server.registry().clone();
    eprintln!(
        "Context registry initialized with {} tables. Ready to accept requests...",
        registry.len()
    );

    let mut shutdown_signal = shutdown_controller.signal();

    match transport.transport_type {
        TransportType::Stdio => {
            let service = ServerBuilder::new(server.clone())
                .with_tools(server)
                .build()
                .serve(StdioTransport::new());

            tokio::select! {
                result = service => {
                    match result {
                        Ok(()) => eprintln!("Service stopped"),
                        Err(e) => eprintln!("Service error: {e}"),
                    }
                }
                _ = shutdown_signal.recv() => {
                    eprintln!("Shutdown signal received");
                }
            }
        }
        #[cfg(feature = "http")]
        TransportType::Http => {
            use feedback_context_server::transport::http_server::start_http_server_with_shutdown;

            // The HTTP server stops on its own when the controller fires.
            if let Err(e) = start_http_server_with_shutdown(
                server,
                transport.http,
                Some(shutdown_controller.clone()),
            )
            .await
            {
                eprintln!("HTTP server error: {e}");
            }
        }
    }

    eprintln!("Initiating graceful shutdown...");
    shutdown_controller.graceful_shutdown(&registry).await;
    eprintln!("Server shutdown complete");

    Ok(())
}

/// Initialize tracing subscriber with stderr output.
fn init_logging() {
    let filter = std::env::var("RUST_LOG")
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new("warn,feedback_context_server=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
