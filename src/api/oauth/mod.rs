//! OAuth connect flows for the supported social platforms.
//!
//! 1. Dashboard sends the user to GET /auth/:platform
//! 2. User authorizes on the provider's site
//! 3. Provider redirects to /auth/:platform/callback
//! 4. Code (or OAuth1 verifier) is exchanged for an access token
//! 5. Profile is fetched, normalized, and stored encrypted
//! 6. User lands back on the dashboard with ?status=connected
//!
//! Facebook, LinkedIn, Google and Instagram share the authorization-code
//! flow; Twitter runs the OAuth1 request-token dance with a server-held
//! pending secret between start and callback. Every provider-side failure
//! resolves to a `?status=error` redirect -- the callback path never
//! surfaces an unhandled error page to the user.

mod exchange;
mod pending;
mod provider;
mod twitter;

pub use pending::{run_pending_cleanup, PendingSecrets};
pub use provider::{provider_config, Platform, ProviderConfig, ALL_PLATFORMS};
pub use twitter::TwitterClient;

use crate::credentials::{CredentialStore, TokenPayload};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Redirect, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Error response body for non-redirect failures
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Why a provider callback failed to complete.
///
/// Every variant resolves locally to the error-terminal redirect; the
/// detail is server-logged only.
#[derive(Debug)]
enum CallbackError {
    /// Callback arrived without the expected code/oauth_token parameters
    MissingCode,
    /// User declined authorization on the provider's site
    ProviderDenied(String),
    /// OAuth1 pending secret absent: expired, already consumed, or the
    /// process restarted between start and callback
    InvalidCallback,
    /// Provider returned no usable access token
    TokenExchange(anyhow::Error),
    /// Profile endpoint failed or returned an unexpected shape
    ProfileFetch(anyhow::Error),
    /// Credential store write failed
    Persistence(anyhow::Error),
}

impl std::fmt::Display for CallbackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallbackError::MissingCode => write!(f, "Callback missing authorization parameters"),
            CallbackError::ProviderDenied(detail) => {
                write!(f, "Provider denied authorization: {}", detail)
            }
            CallbackError::InvalidCallback => {
                write!(f, "No pending authorization for this callback")
            }
            CallbackError::TokenExchange(e) => write!(f, "Token exchange failed: {}", e),
            CallbackError::ProfileFetch(e) => write!(f, "Profile fetch failed: {}", e),
            CallbackError::Persistence(e) => write!(f, "Failed to store credentials: {}", e),
        }
    }
}

/// Shared application state for the OAuth flow endpoints
#[derive(Clone)]
pub struct OAuthAppState {
    pub credential_store: Arc<CredentialStore>,
    pub pending: PendingSecrets,
    /// Public base URL callbacks are registered under
    pub callback_base_url: String,
    /// Twitter API base URL (overridable for tests)
    pub twitter_base_url: Option<String>,
}

/// Query parameters a provider callback may carry.
///
/// OAuth2 providers send `code` (or `error`); Twitter sends
/// `oauth_token` + `oauth_verifier` (or `denied`).
#[derive(Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    oauth_token: Option<String>,
    oauth_verifier: Option<String>,
    denied: Option<String>,
}

/// Create the OAuth flow router
pub fn create_oauth_router(state: OAuthAppState) -> Router {
    Router::new()
        .route("/auth/:platform", get(connect_start))
        .route("/auth/:platform/callback", get(connect_callback))
        .with_state(Arc::new(state))
}

/// Callback URL for a platform: `{PLATFORM}_CALLBACK_URL` if set, else
/// derived from the configured base URL.
fn callback_url(state: &OAuthAppState, platform: Platform) -> String {
    std::env::var(format!("{}_CALLBACK_URL", platform.env_prefix())).unwrap_or_else(|_| {
        format!("{}/auth/{}/callback", state.callback_base_url, platform)
    })
}

fn connected_redirect(platform: Platform) -> Redirect {
    Redirect::temporary(&format!("/?platform={}&status=connected", platform))
}

fn error_redirect(platform: Platform) -> Redirect {
    Redirect::temporary(&format!("/?platform={}&status=error", platform))
}

/// GET /auth/:platform
///
/// Initiates the connect flow by redirecting to the provider's
/// authorization page. For Twitter this first performs the signed
/// request-token call and parks the returned secret until the callback.
async fn connect_start(
    State(state): State<Arc<OAuthAppState>>,
    Path(platform): Path<String>,
) -> Response {
    let platform = match platform.parse::<Platform>() {
        Ok(platform) => platform,
        Err(_) => {
            warn!(platform = %platform, "Unknown platform requested");
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("Platform '{}' not supported", platform),
                }),
            )
                .into_response();
        }
    };

    debug!(platform = %platform, "Connect flow started");

    if platform == Platform::Twitter {
        return twitter_start(&state).await;
    }

    // The four OAuth2 platforms share one authorization-code flow; the
    // redirect is unconditional, with no server-side state created.
    let Some(config) = provider_config(platform) else {
        return error_redirect(platform).into_response();
    };
    let redirect_uri = callback_url(&state, platform);
    let auth_url = config.build_auth_url(&redirect_uri);

    info!(platform = %platform, "Redirecting to OAuth provider");
    Redirect::temporary(&auth_url).into_response()
}

/// Twitter start: signed request-token call, park the secret, redirect.
///
/// The one start path that can fail locally -- a request-token failure
/// returns 500 JSON rather than a redirect.
async fn twitter_start(state: &OAuthAppState) -> Response {
    let client = twitter_client(state);

    match client.request_token().await {
        Ok((oauth_token, oauth_token_secret)) => {
            state.pending.insert(&oauth_token, &oauth_token_secret);
            info!(platform = "twitter", "Redirecting to Twitter authorization");
            Redirect::temporary(&client.authorize_url(&oauth_token)).into_response()
        }
        Err(e) => {
            error!(platform = "twitter", error = %e, "Request token call failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Failed to start Twitter authorization".to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// GET /auth/:platform/callback
///
/// Finishes the connect flow. All provider-interaction failures degrade to
/// the `?status=error` redirect with the response already sent; no retries
/// are attempted (the user must re-initiate the flow).
async fn connect_callback(
    State(state): State<Arc<OAuthAppState>>,
    Path(platform): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let platform = match platform.parse::<Platform>() {
        Ok(platform) => platform,
        Err(_) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("Platform '{}' not supported", platform),
                }),
            )
                .into_response();
        }
    };

    debug!(platform = %platform, "OAuth callback received");

    let result = if platform == Platform::Twitter {
        twitter_callback(&state, query).await
    } else {
        oauth2_callback(&state, platform, query).await
    };

    match result {
        Ok(()) => {
            info!(platform = %platform, "Connection completed");
            connected_redirect(platform).into_response()
        }
        Err(e) => {
            warn!(platform = %platform, error = %e, "Connection failed");
            error_redirect(platform).into_response()
        }
    }
}

/// Authorization-code exchange shared by the four OAuth2 platforms.
async fn oauth2_callback(
    state: &OAuthAppState,
    platform: Platform,
    query: CallbackQuery,
) -> Result<(), CallbackError> {
    if let Some(error) = query.error {
        let description = query
            .error_description
            .unwrap_or_else(|| "no description".to_string());
        return Err(CallbackError::ProviderDenied(format!(
            "{} ({})",
            error, description
        )));
    }

    let code = query.code.ok_or(CallbackError::MissingCode)?;

    let Some(config) = provider_config(platform) else {
        return Err(CallbackError::MissingCode);
    };

    // Must match the redirect_uri sent at start
    let redirect_uri = callback_url(state, platform);

    let grant = exchange::exchange_code_for_token(
        &config.token_url,
        &code,
        &redirect_uri,
        &config.client_id,
        &config.client_secret,
    )
    .await
    .map_err(CallbackError::TokenExchange)?;

    let profile = exchange::fetch_profile(
        platform,
        &config.profile_url,
        &grant.access_token,
        config.token_in_query,
    )
    .await
    .map_err(CallbackError::ProfileFetch)?;

    let payload = TokenPayload {
        access_token: grant.access_token,
        access_secret: None,
        refresh_token: grant.refresh_token,
        expires_at: grant.expires_at,
        profile,
    };

    state
        .credential_store
        .store_token(platform.as_str(), &payload.profile.id, &payload)
        .map_err(CallbackError::Persistence)
}

/// OAuth1 verifier exchange for Twitter.
///
/// The pending request-token secret is consumed exactly once; if it is
/// gone the callback is unrecoverable and the user must start over.
async fn twitter_callback(
    state: &OAuthAppState,
    query: CallbackQuery,
) -> Result<(), CallbackError> {
    if let Some(denied) = query.denied {
        return Err(CallbackError::ProviderDenied(format!(
            "user denied request token {}",
            denied
        )));
    }

    let (oauth_token, oauth_verifier) = match (query.oauth_token, query.oauth_verifier) {
        (Some(token), Some(verifier)) => (token, verifier),
        _ => return Err(CallbackError::MissingCode),
    };

    let request_secret = state
        .pending
        .consume(&oauth_token)
        .ok_or(CallbackError::InvalidCallback)?;

    let client = twitter_client(state);

    let access = client
        .access_token(&oauth_token, &request_secret, &oauth_verifier)
        .await
        .map_err(CallbackError::TokenExchange)?;

    let raw_profile = client
        .verify_credentials(&access.oauth_token, &access.oauth_token_secret)
        .await
        .map_err(CallbackError::ProfileFetch)?;
    let profile = Platform::Twitter
        .normalize_profile(&raw_profile)
        .map_err(CallbackError::ProfileFetch)?;

    let payload = TokenPayload {
        access_token: access.oauth_token,
        access_secret: Some(access.oauth_token_secret),
        refresh_token: None,
        expires_at: None,
        profile,
    };

    state
        .credential_store
        .store_token(Platform::Twitter.as_str(), &payload.profile.id, &payload)
        .map_err(CallbackError::Persistence)
}

fn twitter_client(state: &OAuthAppState) -> TwitterClient {
    let callback = callback_url(state, Platform::Twitter);
    match &state.twitter_base_url {
        Some(base_url) => TwitterClient::new(
            std::env::var("TWITTER_CLIENT_ID").unwrap_or_default(),
            std::env::var("TWITTER_CLIENT_SECRET").unwrap_or_default(),
            callback,
            base_url.clone(),
        ),
        None => TwitterClient::from_env(callback),
    }
}
