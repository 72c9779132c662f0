// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;
use std::time::Duration;

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tracing::{error, info, warn};

use community_vector_server::{
    api::router,
    config::AppConfig,
    logging::{self, LogFormat},
    state::AppState,
};

/// Time allowed for in-flight requests after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    logging::init(LogFormat::from_env());

    if let Err(message) = run().await {
        error!("{message}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let config = AppConfig::from_env().map_err(|e| format!("Configuration error: {e}"))?;
    info!(config = ?config, "Configuration loaded");

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .map_err(|e| format!("Invalid bind address {}: {e}", config.bind_address()))?;

    let state = AppState::from_config(&config).map_err(|e| format!("Startup failed: {e}"))?;
    if !state.embeddings.check_connection().await {
        warn!(
            url = %config.ollama_base_url,
            "Embedding service is not reachable; inserts and searches will fail until it is"
        );
    }
    let app = router(state);

    let handle: Handle<SocketAddr> = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    match &config.tls {
        Some(tls) => {
            // Install the ring crypto provider for rustls (must be done before any TLS operations)
            rustls::crypto::ring::default_provider()
                .install_default()
                .map_err(|_| "Failed to install rustls crypto provider".to_string())?;

            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                .await
                .map_err(|e| format!("Failed to load TLS certificate: {e}"))?;

            info!(%addr, "Community vector server listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .map_err(|e| format!("HTTPS server failed: {e}"))?;
        }
        None => {
            info!(%addr, "Community vector server listening on http (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .map_err(|e| format!("HTTP server failed: {e}"))?;
        }
    }

    info!("Server stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM, then drain connections.
async fn shutdown_signal(handle: Handle<SocketAddr>) {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM signal, initiating shutdown");
        }
    }

    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}
