use anyhow::{Context, Result};
use crosspost::api::{
    create_connections_router, create_oauth_router, run_pending_cleanup, ConnectionsAppState,
    OAuthAppState, PendingSecrets,
};
use crosspost::config::AppConfig;
use crosspost::credentials::CredentialStore;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// How long a Twitter request-token secret stays redeemable
const PENDING_SECRET_TTL_SECONDS: i64 = 600;

/// How often expired pending secrets are swept
const PENDING_CLEANUP_INTERVAL_SECONDS: u64 = 60;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crosspost=info".into()),
        )
        .init();

    info!("Crosspost starting...");

    let config = AppConfig::from_env()?;
    info!(
        port = config.port,
        token_store = %config.token_store_path,
        callback_base_url = %config.callback_base_url,
        "Configuration loaded"
    );
    config.report_unconfigured_platforms();

    // Initialize credential store (shared by both routers)
    let credential_store = Arc::new(
        CredentialStore::new(&config.token_store_path, &config.encryption_key)
            .context("Failed to initialize credential store")?,
    );
    info!("Credential store initialized");

    // Pending request-token secrets for the Twitter OAuth1 flow
    let pending = PendingSecrets::new(PENDING_SECRET_TTL_SECONDS);
    tokio::spawn(run_pending_cleanup(
        pending.clone(),
        PENDING_CLEANUP_INTERVAL_SECONDS,
    ));

    let oauth_router = create_oauth_router(OAuthAppState {
        credential_store: Arc::clone(&credential_store),
        pending,
        callback_base_url: config.callback_base_url.clone(),
        twitter_base_url: None,
    });
    let connections_router = create_connections_router(ConnectionsAppState {
        credential_store: Arc::clone(&credential_store),
    });

    // The dashboard runs on a separate origin in development
    let app = oauth_router
        .merge(connections_router)
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .context("Failed to bind HTTP port")?;
    info!(port = config.port, "Crosspost listening");

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "HTTP server error");
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    server_handle.abort();
    info!("Crosspost stopped");

    Ok(())
}
