//! Connection management API endpoints.
//!
//! Programmatic surface the dashboard polls after (and between) OAuth
//! flows: list connections, verify liveness, disconnect, and read the
//! cached profile captured at connect time.

use crate::credentials::{ConnectionSummary, CredentialStore};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared application state for the connections API
#[derive(Clone)]
pub struct ConnectionsAppState {
    pub credential_store: Arc<CredentialStore>,
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Response for GET /auth/verify/:platform/:user_id
#[derive(Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
}

/// Response for POST /auth/disconnect/:platform/:user_id
#[derive(Serialize)]
pub struct DisconnectResponse {
    pub success: bool,
}

/// Create the connections API router
pub fn create_connections_router(state: ConnectionsAppState) -> Router {
    Router::new()
        .route("/auth/connected", get(list_connected))
        .route("/auth/verify/:platform/:user_id", get(verify_connection))
        .route(
            "/auth/disconnect/:platform/:user_id",
            post(disconnect),
        )
        .route("/auth/profile/:platform", get(cached_profile))
        .with_state(Arc::new(state))
}

/// GET /auth/connected - List all connections grouped by platform
///
/// Structural listing: expired connections still appear here. Liveness is
/// the verify endpoint's job.
async fn list_connected(
    State(state): State<Arc<ConnectionsAppState>>,
) -> Json<BTreeMap<String, Vec<ConnectionSummary>>> {
    let connected = state.credential_store.connected_platforms();
    debug!(platforms = connected.len(), "Listing connections");
    Json(connected)
}

/// GET /auth/verify/:platform/:user_id - Check for a live connection
///
/// Re-checks expiry on every call; a stored-but-expired credential reports
/// `valid: false`.
async fn verify_connection(
    State(state): State<Arc<ConnectionsAppState>>,
    Path((platform, user_id)): Path<(String, String)>,
) -> Json<VerifyResponse> {
    let valid = state.credential_store.verify_token(&platform, &user_id);
    debug!(platform = %platform, user_id = %user_id, valid, "Connection verified");
    Json(VerifyResponse { valid })
}

/// POST /auth/disconnect/:platform/:user_id - Remove a connection
///
/// `success: false` means there was nothing to remove.
async fn disconnect(
    State(state): State<Arc<ConnectionsAppState>>,
    Path((platform, user_id)): Path<(String, String)>,
) -> Result<Json<DisconnectResponse>, AppError> {
    let success = state
        .credential_store
        .remove_token(&platform, &user_id)
        .map_err(|e| {
            warn!(platform = %platform, user_id = %user_id, error = %e, "Disconnect failed");
            AppError::InternalServerError("Failed to remove connection".to_string())
        })?;

    if success {
        info!(platform = %platform, user_id = %user_id, "Disconnected");
    }

    Ok(Json(DisconnectResponse { success }))
}

/// GET /auth/profile/:platform - Cached profile of the first connected user
///
/// "First" is the earliest connection for the platform. 404 when the
/// platform has no live connection (absent, expired, or undecryptable).
async fn cached_profile(
    State(state): State<Arc<ConnectionsAppState>>,
    Path(platform): Path<String>,
) -> Result<Response, AppError> {
    let connected = state.credential_store.connected_platforms();
    let payload = connected
        .get(&platform)
        .and_then(|summaries| summaries.first())
        .and_then(|first| state.credential_store.get_token(&platform, &first.user_id));

    match payload {
        Some(payload) => Ok(Json(payload.profile).into_response()),
        None => Err(AppError::NotFound(format!(
            "No connected profile for '{}'",
            platform
        ))),
    }
}

/// Application error types
enum AppError {
    NotFound(String),
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}
