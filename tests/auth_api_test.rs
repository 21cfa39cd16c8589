// Integration tests for the OAuth flow and connection management API

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use crosspost::api::{
    create_connections_router, create_oauth_router, ConnectionsAppState, OAuthAppState,
    PendingSecrets,
};
use crosspost::credentials::{CredentialStore, Profile, TokenPayload};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    store: Arc<CredentialStore>,
    pending: PendingSecrets,
    _dir: TempDir,
}

fn create_test_app(twitter_base_url: Option<String>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(
        CredentialStore::new(dir.path().join("tokens.json"), "test-secret").unwrap(),
    );
    let pending = PendingSecrets::new(600);

    let oauth_router = create_oauth_router(OAuthAppState {
        credential_store: Arc::clone(&store),
        pending: pending.clone(),
        callback_base_url: "http://localhost:3000".to_string(),
        twitter_base_url,
    });
    let connections_router = create_connections_router(ConnectionsAppState {
        credential_store: Arc::clone(&store),
    });

    TestApp {
        router: oauth_router.merge(connections_router),
        store,
        pending,
        _dir: dir,
    }
}

fn test_payload(access_token: &str, user_id: &str) -> TokenPayload {
    TokenPayload {
        access_token: access_token.to_string(),
        access_secret: None,
        refresh_token: None,
        expires_at: Some(Utc::now() + Duration::hours(1)),
        profile: Profile {
            id: user_id.to_string(),
            name: Some("Jane's Bakery".to_string()),
            username: None,
            email: Some("hello@janesbakery.com".to_string()),
            avatar: None,
        },
    }
}

async fn get(router: Router, uri: &str) -> axum::response::Response {
    router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn post(router: Router, uri: &str) -> axum::response::Response {
    router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn json_of(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn location_of(response: &axum::response::Response) -> &str {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_connected_empty() {
    let app = create_test_app(None);

    let response = get(app.router, "/auth/connected").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_of(response).await;
    assert_eq!(json, serde_json::json!({}));
}

#[tokio::test]
async fn test_connected_lists_connections() {
    let app = create_test_app(None);
    app.store
        .store_token("facebook", "fb-1", &test_payload("fb-token", "fb-1"))
        .unwrap();
    app.store
        .store_token("google", "g-1", &test_payload("g-token", "g-1"))
        .unwrap();

    let response = get(app.router, "/auth/connected").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_of(response).await;
    assert_eq!(json["facebook"][0]["userId"], "fb-1");
    assert_eq!(json["google"][0]["userId"], "g-1");
    assert!(json["facebook"][0]["connectedAt"].is_string());
    // The listing never exposes token material
    assert!(!json.to_string().contains("fb-token"));
}

#[tokio::test]
async fn test_verify_live_connection() {
    let app = create_test_app(None);
    app.store
        .store_token("facebook", "fb-1", &test_payload("fb-token", "fb-1"))
        .unwrap();

    let response = get(app.router, "/auth/verify/facebook/fb-1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_of(response).await, serde_json::json!({"valid": true}));
}

#[tokio::test]
async fn test_verify_expired_connection_is_invalid_but_listed() {
    let app = create_test_app(None);
    let mut payload = test_payload("stale-token", "fb-1");
    payload.expires_at = Some(Utc::now() - Duration::hours(1));
    app.store.store_token("facebook", "fb-1", &payload).unwrap();

    // Expired: verify says no
    let response = get(app.router.clone(), "/auth/verify/facebook/fb-1").await;
    assert_eq!(json_of(response).await, serde_json::json!({"valid": false}));

    // ...but the structural listing still shows the connection
    let response = get(app.router, "/auth/connected").await;
    let json = json_of(response).await;
    assert_eq!(json["facebook"][0]["userId"], "fb-1");
}

#[tokio::test]
async fn test_verify_unknown_connection() {
    let app = create_test_app(None);

    let response = get(app.router, "/auth/verify/facebook/nobody").await;
    assert_eq!(json_of(response).await, serde_json::json!({"valid": false}));
}

#[tokio::test]
async fn test_disconnect_then_idempotent() {
    let app = create_test_app(None);
    app.store
        .store_token("linkedin", "li-1", &test_payload("li-token", "li-1"))
        .unwrap();

    let response = post(app.router.clone(), "/auth/disconnect/linkedin/li-1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_of(response).await, serde_json::json!({"success": true}));

    // Second disconnect is a no-op
    let response = post(app.router, "/auth/disconnect/linkedin/li-1").await;
    assert_eq!(json_of(response).await, serde_json::json!({"success": false}));

    assert!(app.store.get_token("linkedin", "li-1").is_none());
}

#[tokio::test]
async fn test_profile_absent_is_404() {
    let app = create_test_app(None);

    let response = get(app.router, "/auth/profile/facebook").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = json_of(response).await;
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_profile_returns_first_connected_user() {
    let app = create_test_app(None);
    app.store
        .store_token("facebook", "first-user", &test_payload("t1", "first-user"))
        .unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    app.store
        .store_token("facebook", "later-user", &test_payload("t2", "later-user"))
        .unwrap();

    let response = get(app.router, "/auth/profile/facebook").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_of(response).await;
    assert_eq!(json["id"], "first-user");
    assert_eq!(json["name"], "Jane's Bakery");
}

#[tokio::test]
async fn test_oauth2_start_redirects_to_provider() {
    let app = create_test_app(None);

    let response = get(app.router, "/auth/facebook").await;
    assert!(response.status().is_redirection());

    let location = location_of(&response);
    assert!(location.starts_with("https://www.facebook.com/"));
    assert!(location.contains("response_type=code"));
    assert!(location.contains("redirect_uri="));
}

#[tokio::test]
async fn test_oauth2_callback_missing_code_redirects_to_error() {
    let app = create_test_app(None);

    let response = get(app.router, "/auth/facebook/callback").await;
    assert!(response.status().is_redirection());
    assert_eq!(location_of(&response), "/?platform=facebook&status=error");

    // No credential was stored
    assert!(app.store.connected_platforms().is_empty());
}

#[tokio::test]
async fn test_oauth2_callback_provider_denial_redirects_to_error() {
    let app = create_test_app(None);

    let response = get(
        app.router,
        "/auth/google/callback?error=access_denied&error_description=User+cancelled",
    )
    .await;
    assert!(response.status().is_redirection());
    assert_eq!(location_of(&response), "/?platform=google&status=error");
    assert!(app.store.connected_platforms().is_empty());
}

#[tokio::test]
async fn test_unknown_platform_is_404() {
    let app = create_test_app(None);

    let response = get(app.router.clone(), "/auth/myspace").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(app.router, "/auth/myspace/callback?code=x").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_twitter_callback_with_lost_pending_secret() {
    // Start never ran (or the pending entry expired / the process
    // restarted): the callback must fail cleanly, not crash or store.
    let app = create_test_app(None);

    let response = get(
        app.router,
        "/auth/twitter/callback?oauth_token=req-abc&oauth_verifier=ver-123",
    )
    .await;
    assert!(response.status().is_redirection());
    assert_eq!(location_of(&response), "/?platform=twitter&status=error");
    assert!(app.store.connected_platforms().is_empty());
}

#[tokio::test]
async fn test_twitter_callback_missing_params_redirects_to_error() {
    let app = create_test_app(None);
    app.pending.insert("req-abc", "req-xyz");

    // Verifier missing entirely
    let response = get(app.router, "/auth/twitter/callback?oauth_token=req-abc").await;
    assert!(response.status().is_redirection());
    assert_eq!(location_of(&response), "/?platform=twitter&status=error");

    // Param check happens before the secret is consumed
    assert_eq!(app.pending.count(), 1);
}

#[tokio::test]
async fn test_twitter_callback_completes_and_consumes_secret() {
    let mut server = mockito::Server::new_async().await;
    let _access_mock = server
        .mock("POST", "/oauth/access_token")
        .with_status(200)
        .with_body(
            "oauth_token=access-123&oauth_token_secret=secret-456&user_id=2244994945&screen_name=janesbakery",
        )
        .create_async()
        .await;
    let _profile_mock = server
        .mock("GET", "/1.1/account/verify_credentials.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "id_str": "2244994945",
                "name": "Jane's Bakery",
                "screen_name": "janesbakery",
                "profile_image_url_https": "https://pbs.twimg.com/profile.jpg"
            }"#,
        )
        .create_async()
        .await;

    let app = create_test_app(Some(server.url()));
    app.pending.insert("req-abc", "req-xyz");

    let response = get(
        app.router.clone(),
        "/auth/twitter/callback?oauth_token=req-abc&oauth_verifier=ver-123",
    )
    .await;
    assert!(response.status().is_redirection());
    assert_eq!(location_of(&response), "/?platform=twitter&status=connected");

    // Credential stored under the Twitter user id, secret included
    let payload = app.store.get_token("twitter", "2244994945").unwrap();
    assert_eq!(payload.access_token, "access-123");
    assert_eq!(payload.access_secret.as_deref(), Some("secret-456"));
    assert_eq!(payload.profile.username.as_deref(), Some("janesbakery"));

    // The request-token secret was consumed: replaying the callback fails
    let response = get(
        app.router,
        "/auth/twitter/callback?oauth_token=req-abc&oauth_verifier=ver-123",
    )
    .await;
    assert_eq!(location_of(&response), "/?platform=twitter&status=error");
}

#[tokio::test]
async fn test_twitter_callback_denied_redirects_to_error() {
    let app = create_test_app(None);
    app.pending.insert("req-abc", "req-xyz");

    let response = get(app.router, "/auth/twitter/callback?denied=req-abc").await;
    assert!(response.status().is_redirection());
    assert_eq!(location_of(&response), "/?platform=twitter&status=error");
    assert!(app.store.connected_platforms().is_empty());
}
