//! HTTP boundary for the queue operations.
//!
//! Handlers are a thin translation layer: they deserialize the request,
//! derive a per-request cancellation token from the server's shutdown token,
//! call the engine or the connection context, and serialize the returned
//! outcome verbatim. Success maps to 200, any failure outcome to 400.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use queue_bus_core::{
    ConnectionConfig, ConnectionContext, OperationOutcome, OperationRequest,
    QueueOperationService, StatusRequest,
};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub context: Arc<ConnectionContext>,
    pub service: Arc<QueueOperationService>,
    /// Cancelled when the server begins shutting down; handlers derive
    /// per-request child tokens from it
    pub shutdown: CancellationToken,
}

/// Create the HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let connection_routes = Router::new()
        .route(
            "/api/queues/connection",
            get(get_connection).post(update_connection),
        )
        .route("/api/queues/connection/default", post(reset_connection));

    let operation_routes = Router::new()
        .route("/api/queues/send", post(send_message))
        .route("/api/queues/publish", post(publish_message))
        .route("/api/queues/subscribe", post(queue_status));

    Router::new()
        .merge(connection_routes)
        .merge(operation_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Connection Handlers
// ============================================================================

/// Return the currently effective connection configuration
async fn get_connection(State(state): State<AppState>) -> Json<ConnectionConfig> {
    Json(state.context.current())
}

/// Replace the active connection configuration
async fn update_connection(
    State(state): State<AppState>,
    Json(config): Json<ConnectionConfig>,
) -> Response {
    let token = state.shutdown.child_token();
    outcome_response(state.context.update(config, &token).await)
}

/// Restore the default connection configuration
async fn reset_connection(State(state): State<AppState>) -> Response {
    let token = state.shutdown.child_token();
    outcome_response(state.context.reset_to_default(&token).await)
}

// ============================================================================
// Operation Handlers
// ============================================================================

async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<OperationRequest>,
) -> Response {
    let token = state.shutdown.child_token();
    outcome_response(state.service.send(&request, &token).await)
}

async fn publish_message(
    State(state): State<AppState>,
    Json(request): Json<OperationRequest>,
) -> Response {
    let token = state.shutdown.child_token();
    outcome_response(state.service.publish(&request, &token).await)
}

async fn queue_status(
    State(state): State<AppState>,
    Json(request): Json<StatusRequest>,
) -> Response {
    let token = state.shutdown.child_token();
    outcome_response(state.service.subscribe(&request, &token).await)
}

/// Serialize an outcome verbatim, mapping its success flag to the status code
fn outcome_response<T: Serialize>(outcome: OperationOutcome<T>) -> Response {
    let status = if outcome.is_success() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(outcome)).into_response()
}
