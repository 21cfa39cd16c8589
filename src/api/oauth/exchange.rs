//! OAuth2 token exchange and profile fetch.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use super::provider::Platform;
use crate::credentials::Profile;

/// Result of a successful authorization-code exchange.
#[derive(Debug)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// OAuth2 token response (standard fields; providers omit most of them)
#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Exchange an authorization code for an access token.
///
/// A response without an `access_token` field is a token-exchange failure,
/// as is any non-2xx status.
pub async fn exchange_code_for_token(
    token_url: &str,
    code: &str,
    redirect_uri: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<TokenGrant> {
    let client = reqwest::Client::new();

    let mut form_data = HashMap::new();
    form_data.insert("grant_type", "authorization_code");
    form_data.insert("code", code);
    form_data.insert("redirect_uri", redirect_uri);
    form_data.insert("client_id", client_id);
    form_data.insert("client_secret", client_secret);

    tracing::debug!("Exchanging authorization code for token at {}", token_url);

    let response = client
        .post(token_url)
        .header("Accept", "application/json")
        .form(&form_data)
        .send()
        .await
        .context("Failed to send token exchange request")?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(anyhow!(
            "Token exchange failed with status {}: {}",
            status,
            body
        ));
    }

    let token_response: TokenResponse = response
        .json()
        .await
        .context("Token response lacked an access token")?;

    tracing::debug!(
        "Token exchange successful, has_refresh_token={}, expires_in={:?}",
        token_response.refresh_token.is_some(),
        token_response.expires_in
    );

    let expires_at = token_response
        .expires_in
        .map(|seconds| Utc::now() + Duration::seconds(seconds));

    Ok(TokenGrant {
        access_token: token_response.access_token,
        refresh_token: token_response.refresh_token,
        expires_at,
    })
}

/// Fetch and normalize the provider profile for a fresh access token.
///
/// Sends the token as a Bearer header; Graph-style providers (Facebook,
/// Instagram) additionally expect it as an `access_token` query parameter.
pub async fn fetch_profile(
    platform: Platform,
    profile_url: &str,
    access_token: &str,
    token_in_query: bool,
) -> Result<Profile> {
    let client = reqwest::Client::new();

    let mut request = client.get(profile_url).bearer_auth(access_token);
    if token_in_query {
        request = request.query(&[("access_token", access_token)]);
    }

    let response = request
        .send()
        .await
        .context("Failed to send profile request")?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Profile fetch failed with status {}",
            response.status()
        ));
    }

    let raw: Value = response
        .json()
        .await
        .context("Failed to parse profile response")?;

    platform.normalize_profile(&raw)
}
