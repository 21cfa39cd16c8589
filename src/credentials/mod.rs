//! Encrypted credential storage for social platform connections.
//!
//! Each connected (platform, user) pair maps to one credential record: an
//! AES-256-CBC encrypted [`TokenPayload`] plus unencrypted connection
//! metadata, persisted together in a single JSON file.
//!
//! # Usage
//!
//! ```no_run
//! use crosspost::credentials::{CredentialStore, Profile, TokenPayload};
//!
//! # fn main() -> anyhow::Result<()> {
//! let secret = std::env::var("ENCRYPTION_KEY")?;
//! let store = CredentialStore::new("data/tokens.json", &secret)?;
//!
//! // Store credentials after a completed OAuth exchange
//! let payload = TokenPayload {
//!     access_token: "provider_access_token".to_string(),
//!     access_secret: None,
//!     refresh_token: None,
//!     expires_at: None,
//!     profile: Profile {
//!         id: "12345".to_string(),
//!         name: Some("Jane's Bakery".to_string()),
//!         username: None,
//!         email: None,
//!         avatar: None,
//!     },
//! };
//! store.store_token("facebook", "12345", &payload)?;
//!
//! // Retrieve (decrypts in memory, enforces expiry)
//! if let Some(payload) = store.get_token("facebook", "12345") {
//!     println!("Connected as {}", payload.profile.id);
//! }
//!
//! // Disconnect
//! store.remove_token("facebook", "12345")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Security
//!
//! - Payloads are encrypted at rest; plaintext exists only in memory
//! - Each encryption uses a fresh random IV
//! - Expired entries are invisible to reads but stay on disk until
//!   overwritten or removed (soft delete on read)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod encryption;
mod storage;

pub use storage::CredentialStore;

// Re-export encryption helpers for utilities and tests
pub use encryption::{decrypt, derive_key, encrypt};

/// Decrypted credential payload for one platform connection.
///
/// Only ever exists in plaintext in memory; the store persists it
/// encrypted. Field names serialize in camelCase so the ciphertext JSON is
/// compatible with stores written by earlier versions of the dashboard.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPayload {
    /// OAuth access token (OAuth1 token or OAuth2 bearer token)
    pub access_token: String,

    /// OAuth1 token secret (Twitter only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_secret: Option<String>,

    /// OAuth2 refresh token (Google issues one with offline access)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Provider-supplied expiry; `None` means the token does not expire
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Normalized profile snapshot captured at connect time
    pub profile: Profile,
}

/// Provider profile normalized to a common shape.
///
/// Providers disagree on field names (Google's id is `sub`, Twitter's is
/// `id_str`); the per-platform normalizers map them into this struct.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Provider-assigned subject identifier
    pub id: String,

    /// Display name, where the provider exposes one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Handle or screen name (Twitter, Instagram)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Avatar image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Connection metadata listed by [`CredentialStore::connected_platforms`].
///
/// Structural only -- expiry is reported, not enforced, here.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSummary {
    pub user_id: String,
    pub connected_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}
