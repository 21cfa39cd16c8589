//! Twitter OAuth1 client.
//!
//! Twitter is the one platform on the OAuth1 request-token dance rather
//! than the authorization-code flow: a signed request-token call before the
//! authorize redirect, and a verifier-signed access-token call after it.
//! Every request carries an HMAC-SHA1 `Authorization: OAuth ...` header.

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha1::Sha1;
use std::collections::BTreeMap;
use uuid::Uuid;

type HmacSha1 = Hmac<Sha1>;

const DEFAULT_BASE_URL: &str = "https://api.twitter.com";

/// A granted OAuth1 access token pair plus the user identity Twitter
/// returns alongside it.
#[derive(Debug, Deserialize)]
pub struct TwitterAccess {
    pub oauth_token: String,
    pub oauth_token_secret: String,
    pub user_id: String,
    pub screen_name: String,
}

#[derive(Debug, Deserialize)]
struct RequestTokenResponse {
    oauth_token: String,
    oauth_token_secret: String,
    #[serde(default)]
    oauth_callback_confirmed: Option<String>,
}

/// Signing OAuth1 client for the Twitter API.
pub struct TwitterClient {
    consumer_key: String,
    consumer_secret: String,
    callback_url: String,
    http_client: reqwest::Client,
    base_url: String,
}

impl TwitterClient {
    /// Create a client against the real Twitter API.
    ///
    /// Consumer credentials come from `TWITTER_CLIENT_ID` /
    /// `TWITTER_CLIENT_SECRET`.
    pub fn from_env(callback_url: String) -> Self {
        let consumer_key = std::env::var("TWITTER_CLIENT_ID").unwrap_or_default();
        let consumer_secret = std::env::var("TWITTER_CLIENT_SECRET").unwrap_or_default();
        Self::new(
            consumer_key,
            consumer_secret,
            callback_url,
            DEFAULT_BASE_URL.to_string(),
        )
    }

    /// Create a client with a custom base URL (for testing with a mock server).
    pub fn new(
        consumer_key: String,
        consumer_secret: String,
        callback_url: String,
        base_url: String,
    ) -> Self {
        Self {
            consumer_key,
            consumer_secret,
            callback_url,
            http_client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Step one: obtain a request token.
    ///
    /// # Returns
    /// * `Ok((oauth_token, oauth_token_secret))` - The secret must be held
    ///   until the callback to sign the access-token exchange
    /// * `Err` - If the call fails or the callback is not confirmed
    pub async fn request_token(&self) -> Result<(String, String)> {
        let url = format!("{}/oauth/request_token", self.base_url);

        let mut oauth_params = self.base_oauth_params();
        oauth_params.insert("oauth_callback".to_string(), self.callback_url.clone());

        let header = self.authorization_header("POST", &url, oauth_params, "")?;

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", header)
            .send()
            .await
            .context("Failed to send request token request")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Request token call failed with status {}",
                response.status()
            ));
        }

        let body = response
            .text()
            .await
            .context("Failed to read request token response")?;
        let parsed: RequestTokenResponse = serde_urlencoded::from_str(&body)
            .context("Failed to parse request token response")?;

        if parsed.oauth_callback_confirmed.as_deref() != Some("true") {
            return Err(anyhow!("Twitter did not confirm the OAuth callback URL"));
        }

        Ok((parsed.oauth_token, parsed.oauth_token_secret))
    }

    /// The authorize URL the user is redirected to after step one.
    pub fn authorize_url(&self, oauth_token: &str) -> String {
        format!(
            "{}/oauth/authenticate?oauth_token={}",
            self.base_url,
            urlencoding::encode(oauth_token)
        )
    }

    /// Step three: redeem the verifier for an access token.
    ///
    /// `request_secret` is the secret issued with the request token; it
    /// signs this one call and is useless afterwards.
    pub async fn access_token(
        &self,
        oauth_token: &str,
        request_secret: &str,
        oauth_verifier: &str,
    ) -> Result<TwitterAccess> {
        let url = format!("{}/oauth/access_token", self.base_url);

        let mut oauth_params = self.base_oauth_params();
        oauth_params.insert("oauth_token".to_string(), oauth_token.to_string());
        oauth_params.insert("oauth_verifier".to_string(), oauth_verifier.to_string());

        let header = self.authorization_header("POST", &url, oauth_params, request_secret)?;

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", header)
            .send()
            .await
            .context("Failed to send access token request")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Access token call failed with status {}",
                response.status()
            ));
        }

        let body = response
            .text()
            .await
            .context("Failed to read access token response")?;
        serde_urlencoded::from_str(&body).context("Failed to parse access token response")
    }

    /// Fetch the authenticated user's profile via `verify_credentials`.
    pub async fn verify_credentials(
        &self,
        access_token: &str,
        access_secret: &str,
    ) -> Result<serde_json::Value> {
        let url = format!("{}/1.1/account/verify_credentials.json", self.base_url);

        let mut oauth_params = self.base_oauth_params();
        oauth_params.insert("oauth_token".to_string(), access_token.to_string());

        let header = self.authorization_header("GET", &url, oauth_params, access_secret)?;

        let response = self
            .http_client
            .get(&url)
            .header("Authorization", header)
            .send()
            .await
            .context("Failed to send verify_credentials request")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "verify_credentials failed with status {}",
                response.status()
            ));
        }

        response
            .json()
            .await
            .context("Failed to parse verify_credentials response")
    }

    /// The oauth_* parameters common to every signed request.
    fn base_oauth_params(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert(
            "oauth_consumer_key".to_string(),
            self.consumer_key.clone(),
        );
        params.insert(
            "oauth_nonce".to_string(),
            Uuid::new_v4().simple().to_string(),
        );
        params.insert(
            "oauth_signature_method".to_string(),
            "HMAC-SHA1".to_string(),
        );
        params.insert(
            "oauth_timestamp".to_string(),
            Utc::now().timestamp().to_string(),
        );
        params.insert("oauth_version".to_string(), "1.0".to_string());
        params
    }

    /// Sign the request and render the `OAuth ...` authorization header.
    fn authorization_header(
        &self,
        method: &str,
        url: &str,
        oauth_params: BTreeMap<String, String>,
        token_secret: &str,
    ) -> Result<String> {
        let signature = sign(
            method,
            url,
            &oauth_params,
            &self.consumer_secret,
            token_secret,
        )?;

        let mut rendered: Vec<String> = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, urlencoding::encode(v)))
            .collect();
        rendered.push(format!(
            "oauth_signature=\"{}\"",
            urlencoding::encode(&signature)
        ));
        rendered.sort();

        Ok(format!("OAuth {}", rendered.join(", ")))
    }
}

/// Build the OAuth1 signature base string.
///
/// `METHOD&percent(url)&percent(k1=v1&k2=v2...)` with parameters sorted by
/// key and both keys and values percent-encoded (RFC 3986).
fn signature_base(method: &str, url: &str, params: &BTreeMap<String, String>) -> String {
    let param_string = params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        urlencoding::encode(url),
        urlencoding::encode(&param_string)
    )
}

/// HMAC-SHA1 sign a request, base64-encoded.
///
/// The signing key is `percent(consumer_secret)&percent(token_secret)`,
/// where the token secret is empty for the request-token call.
fn sign(
    method: &str,
    url: &str,
    params: &BTreeMap<String, String>,
    consumer_secret: &str,
    token_secret: &str,
) -> Result<String> {
    let base = signature_base(method, url, params);
    let signing_key = format!(
        "{}&{}",
        urlencoding::encode(consumer_secret),
        urlencoding::encode(token_secret)
    );

    let mut mac = HmacSha1::new_from_slice(signing_key.as_bytes())
        .map_err(|e| anyhow!("Failed to initialize HMAC: {}", e))?;
    mac.update(base.as_bytes());

    Ok(BASE64.encode(mac.finalize().into_bytes()))
}
