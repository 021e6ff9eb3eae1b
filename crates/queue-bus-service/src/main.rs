//! # Queue-Bus Service
//!
//! Binary entry point for the queue-bus HTTP service.
//!
//! This executable:
//! - Loads configuration from files and the environment
//! - Initializes logging
//! - Wires the event log, connection context, broker connector, and engine
//! - Starts the HTTP server with graceful shutdown
//! - Reloads the default connection configuration on SIGHUP

mod config;
mod routes;

use broker_runtime::AmqpConnector;
use crate::config::ServiceConfig;
use queue_bus_core::{ConnectionContext, FileEventLog, QueueOperationService};
use routes::{create_router, AppState};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "queue_bus_service=info,queue_bus_core=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting queue-bus service");

    let service_config: ServiceConfig = match config::load() {
        Ok(loaded) => loaded,
        Err(error) => {
            error!(
                error = %error,
                "Could not load the service configuration; aborting. \
                 Fix the configuration and restart."
            );
            std::process::exit(3);
        }
    };

    let errors = service_config.validate();
    if !errors.is_empty() {
        error!(errors = ?errors, "Service configuration is invalid; aborting");
        std::process::exit(3);
    }

    // Wire the engine and its collaborators
    let event_log = Arc::new(FileEventLog::new(service_config.event_log.clone()));
    let context = Arc::new(ConnectionContext::new(
        Some(service_config.broker.clone()),
        event_log.clone(),
    ));
    let service = Arc::new(QueueOperationService::new(
        context.clone(),
        Arc::new(AmqpConnector::new()),
        event_log,
    ));

    let shutdown = CancellationToken::new();
    spawn_reload_task(context.clone(), shutdown.clone());

    let state = AppState {
        context,
        service,
        shutdown: shutdown.clone(),
    };
    let app = create_router(state);

    let address = format!(
        "{}:{}",
        service_config.server.host, service_config.server.port
    );
    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(error) => {
            error!(address = %address, error = %error, "Failed to bind the HTTP server");
            std::process::exit(1);
        }
    };

    info!(address = %address, "HTTP server listening");

    let shutdown_signal = {
        let shutdown = shutdown.clone();
        async move {
            let ctrl_c = async {
                tokio::signal::ctrl_c()
                    .await
                    .expect("Failed to install Ctrl+C signal handler");
            };

            #[cfg(unix)]
            let terminate = async {
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("Failed to install SIGTERM signal handler")
                    .recv()
                    .await;
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => {
                    info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
                },
                _ = terminate => {
                    info!("Received SIGTERM, initiating graceful shutdown");
                },
            }

            // In-flight requests observe the cancellation through their
            // child tokens while axum drains the connections.
            shutdown.cancel();
        }
    };

    if let Err(error) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
    {
        error!(error = %error, "HTTP server failed");
        std::process::exit(2);
    }

    info!("HTTP server shutdown complete");
    Ok(())
}

/// React to SIGHUP by re-reading the configuration sources
///
/// A successful reload replaces only the context's default snapshot; an
/// administratively-set active configuration stays in effect until an
/// explicit reset. Invalid or unreadable configuration keeps the previous
/// default in place.
#[cfg(unix)]
fn spawn_reload_task(context: Arc<ConnectionContext>, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut hangup =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup()) {
                Ok(signal) => signal,
                Err(error) => {
                    warn!(error = %error, "Could not install the SIGHUP handler; configuration reloads are disabled");
                    return;
                }
            };

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = hangup.recv() => {
                    if received.is_none() {
                        break;
                    }

                    match config::load() {
                        Ok(reloaded) => {
                            let errors = reloaded.broker.validate();
                            if errors.is_empty() {
                                context.replace_default(Some(reloaded.broker));
                                info!("Default connection configuration reloaded");
                            } else {
                                warn!(
                                    errors = ?errors,
                                    "Reloaded broker configuration is invalid; keeping the previous default"
                                );
                            }
                        }
                        Err(error) => {
                            warn!(
                                error = %error,
                                "Configuration reload failed; keeping the previous default"
                            );
                        }
                    }
                }
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_task(_context: Arc<ConnectionContext>, _shutdown: CancellationToken) {}
