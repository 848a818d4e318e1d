//! tcp-duplicator binary
//!
//! Configured entirely through environment variables:
//!
//! ```text
//! LISTEN_PORT=7000 TCP_ADDRESSES=10.0.0.1:9000,10.0.0.2:9000 tcp-duplicator
//! ```
//!
//! Optional: LISTEN_HOST, FLUSH_INTERVAL (10s), BUFFER_LIMIT_SIZE (64MB),
//! RETRY_COUNT (3), MAX_CONNECTIONS (1024), MAX_FRAME_SIZE (65536, plain
//! bytes or MB/GB), CONNECT_TIMEOUT (10s), DRAIN_TIMEOUT (10s). Log verbosity
//! follows RUST_LOG.

use std::process::ExitCode;

use tcp_duplicator::{Relay, RelayConfig};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tcp_duplicator=info")),
        )
        .init();

    // Destination names may need a DNS lookup
    let config = match tokio::task::spawn_blocking(RelayConfig::from_env).await {
        Ok(Ok(config)) => config,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            tracing::error!(error = %e, "Configuration task failed");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        listen = %config.listen_addr,
        destinations = ?config.destinations,
        flush_interval_ms = config.flush_interval.as_millis() as u64,
        buffer_limit = config.buffer_limit,
        retry_count = config.retry_count,
        "Starting relay"
    );

    let relay = Relay::new(config);
    match relay.run_until(shutdown_signal()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Listen error");
            ExitCode::FAILURE
        }
    }
}

/// Resolves on Ctrl+C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
