//! Fido Broker Server - HTTP transport for the FIDO2 request broker
//!
//! Exposes the broker's inbound contract and the UI collaborator protocol:
//! - POST /v1/fido2/register, /v1/fido2/sign - Dispatch a ceremony
//! - GET  /v1/fido2/results/{handle} - Collect its outcome
//! - GET  /v1/ui/handoffs/next, POST /v1/ui/results/{handle} - UI side

use std::net::SocketAddr;
use std::time::Duration;

use fido_broker_server::{create_router_with_config, AppState, Config};
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("fido_broker_core=info,fido_broker_server=info")),
        )
        .with_target(true)
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "Server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();
    tracing::info!(?config, "Loaded configuration");

    let state = AppState::from_config(&config)?;
    let sweeper = state.service.start()?;

    let mailbox = state.mailbox.clone();
    let retention = config.result_retention();
    let janitor = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(retention.max(Duration::from_secs(1)));
        loop {
            ticker.tick().await;
            mailbox.cleanup_expired(retention);
        }
    });

    let app = create_router_with_config(state.clone(), &config);
    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    let cancelled = state.service.shutdown();
    janitor.abort();
    let _ = sweeper.await;
    tracing::info!(cancelled, "Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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

    tracing::info!("Shutdown signal received");
}
