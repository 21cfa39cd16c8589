//! Encrypted credential storage backed by a single JSON file.
//!
//! Stores OAuth credentials for each connected (platform, user) pair.
//! Payloads are encrypted at rest with AES-256-CBC; the whole store is
//! rewritten to disk on every mutation.

use super::{encryption, ConnectionSummary, TokenPayload};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// One encrypted credential record as persisted on disk.
///
/// `encrypted_data` holds the `"<ivHex>:<cipherHex>"` ciphertext of a
/// JSON-serialized [`TokenPayload`]. `expires_at` is duplicated outside the
/// ciphertext so reads can enforce expiry without decrypting.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCredential {
    user_id: String,
    platform: String,
    encrypted_data: String,
    connected_at: chrono::DateTime<Utc>,
    expires_at: Option<chrono::DateTime<Utc>>,
}

/// Map of platform -> user id -> credential record, the on-disk JSON shape.
type StoreMap = BTreeMap<String, BTreeMap<String, StoredCredential>>;

/// Encrypted, expiry-aware credential store.
///
/// # Persistence
/// The entire in-memory map is serialized to one JSON file on every
/// mutation; on startup the file is read in full (an absent file yields an
/// empty store, persisted immediately). There is no cross-process locking:
/// two processes writing the same file race last-writer-wins. Within a
/// process the `Mutex` serializes every read-modify-write.
///
/// # Security
/// - Payloads are encrypted before they reach the map or the file
/// - Decryption happens only inside [`CredentialStore::get_token`]
/// - The derived key lives in memory only
pub struct CredentialStore {
    path: PathBuf,
    key: [u8; encryption::KEY_SIZE],
    entries: Mutex<StoreMap>,
}

impl CredentialStore {
    /// Opens or creates a credential store at `path`.
    ///
    /// # Arguments
    /// * `path` - Location of the JSON token file (e.g. `data/tokens.json`)
    /// * `secret` - Secret string the AES key is derived from
    ///
    /// # Returns
    /// * `Ok(CredentialStore)` - Initialized store with any existing
    ///   entries loaded
    /// * `Err` - If the file exists but cannot be read or parsed
    pub fn new<P: AsRef<Path>>(path: P, secret: &str) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let key = encryption::derive_key(secret);

        let entries = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read token store at {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse token store at {}", path.display()))?
        } else {
            StoreMap::new()
        };

        let store = Self {
            path,
            key,
            entries: Mutex::new(entries),
        };

        // First run: persist the empty store so the file exists
        if !store.path.exists() {
            let entries = store.entries.lock().unwrap();
            store.persist(&entries)?;
        }

        Ok(store)
    }

    /// Stores a credential payload for a platform and user.
    ///
    /// The payload is serialized to JSON and encrypted before it enters the
    /// map. An existing entry for the same pair is replaced unconditionally
    /// (last-write-wins, no merge). The whole store is rewritten to disk;
    /// a write failure propagates to the caller.
    pub fn store_token(&self, platform: &str, user_id: &str, payload: &TokenPayload) -> Result<()> {
        let plaintext =
            serde_json::to_string(payload).context("Failed to serialize token payload")?;
        let encrypted_data =
            encryption::encrypt(&plaintext, &self.key).context("Failed to encrypt token payload")?;

        let entry = StoredCredential {
            user_id: user_id.to_string(),
            platform: platform.to_string(),
            encrypted_data,
            connected_at: Utc::now(),
            expires_at: payload.expires_at,
        };

        let mut entries = self.entries.lock().unwrap();
        entries
            .entry(platform.to_string())
            .or_default()
            .insert(user_id.to_string(), entry);
        self.persist(&entries)?;

        debug!(platform = %platform, user_id = %user_id, "Credential stored");
        Ok(())
    }

    /// Retrieves and decrypts the credential payload for a platform and user.
    ///
    /// Returns `None` if no entry exists, if the entry has expired (the
    /// record stays on disk -- soft delete on read), or if the stored
    /// ciphertext cannot be decrypted or parsed. Failures are logged, never
    /// surfaced as errors.
    pub fn get_token(&self, platform: &str, user_id: &str) -> Option<TokenPayload> {
        let entries = self.entries.lock().unwrap();
        let entry = entries.get(platform)?.get(user_id)?;

        if let Some(expires_at) = entry.expires_at {
            if expires_at < Utc::now() {
                debug!(platform = %platform, user_id = %user_id, "Credential expired");
                return None;
            }
        }

        let plaintext = match encryption::decrypt(&entry.encrypted_data, &self.key) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                warn!(
                    platform = %platform,
                    user_id = %user_id,
                    error = %e,
                    "Failed to decrypt stored credential"
                );
                return None;
            }
        };

        match serde_json::from_str(&plaintext) {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!(
                    platform = %platform,
                    user_id = %user_id,
                    error = %e,
                    "Failed to parse decrypted credential"
                );
                None
            }
        }
    }

    /// Removes the credential for a platform and user.
    ///
    /// # Returns
    /// * `Ok(true)` - Entry existed, was deleted, and the store persisted
    /// * `Ok(false)` - No entry existed; the file is not rewritten
    /// * `Err` - If the file write fails
    pub fn remove_token(&self, platform: &str, user_id: &str) -> Result<bool> {
        let mut entries = self.entries.lock().unwrap();

        let removed = match entries.get_mut(platform) {
            Some(users) => users.remove(user_id).is_some(),
            None => false,
        };
        if !removed {
            return Ok(false);
        }

        // Drop the platform key entirely once its last user disconnects
        if entries.get(platform).is_some_and(|users| users.is_empty()) {
            entries.remove(platform);
        }

        self.persist(&entries)?;
        debug!(platform = %platform, user_id = %user_id, "Credential removed");
        Ok(true)
    }

    /// Checks whether a live (stored and unexpired) credential exists.
    ///
    /// Re-evaluates expiry on every call; the result is never cached.
    pub fn verify_token(&self, platform: &str, user_id: &str) -> bool {
        self.get_token(platform, user_id).is_some()
    }

    /// Lists every platform with at least one stored connection.
    ///
    /// Summaries are ordered by connection time. Expired entries are NOT
    /// filtered here -- this is a structural listing, distinct from the
    /// expiry gate in [`CredentialStore::get_token`].
    pub fn connected_platforms(&self) -> BTreeMap<String, Vec<ConnectionSummary>> {
        let entries = self.entries.lock().unwrap();

        entries
            .iter()
            .filter(|(_, users)| !users.is_empty())
            .map(|(platform, users)| {
                let mut summaries: Vec<ConnectionSummary> = users
                    .values()
                    .map(|entry| ConnectionSummary {
                        user_id: entry.user_id.clone(),
                        connected_at: entry.connected_at,
                        expires_at: entry.expires_at,
                    })
                    .collect();
                summaries.sort_by(|a, b| {
                    a.connected_at
                        .cmp(&b.connected_at)
                        .then_with(|| a.user_id.cmp(&b.user_id))
                });
                (platform.clone(), summaries)
            })
            .collect()
    }

    /// Writes the full store to disk as pretty-printed JSON.
    ///
    /// Callers hold the entries lock, so in-process writes are serialized.
    fn persist(&self, entries: &StoreMap) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create token store directory {}", parent.display())
                })?;
            }
        }

        let contents =
            serde_json::to_string_pretty(entries).context("Failed to serialize token store")?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write token store at {}", self.path.display()))?;
        Ok(())
    }
}
