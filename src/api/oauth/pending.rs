//! Pending OAuth1 request-token secrets.
//!
//! Twitter's flow needs the request-token secret generated at start to sign
//! the access-token exchange at callback. The secret is held server-side,
//! keyed by the request token, and consumed exactly once. Losing the entry
//! (expiry, restart, replay) makes the callback unrecoverable by design --
//! the user must re-initiate the flow.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug)]
struct PendingEntry {
    secret: String,
    created_at: DateTime<Utc>,
}

/// In-memory store of pending request-token secrets with expiry.
#[derive(Clone)]
pub struct PendingSecrets {
    entries: Arc<Mutex<HashMap<String, PendingEntry>>>,
    expiry_duration: Duration,
}

impl PendingSecrets {
    /// Create a pending-secret store.
    ///
    /// # Arguments
    /// * `expiry_seconds` - How long a pending secret stays valid
    ///   (default: 600 = 10 minutes, Twitter's own request-token lifetime)
    pub fn new(expiry_seconds: i64) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            expiry_duration: Duration::seconds(expiry_seconds),
        }
    }

    /// Record the secret for a freshly issued request token.
    pub fn insert(&self, oauth_token: &str, secret: &str) {
        let entry = PendingEntry {
            secret: secret.to_string(),
            created_at: Utc::now(),
        };

        let mut entries = self.entries.lock().unwrap();
        entries.insert(oauth_token.to_string(), entry);
    }

    /// Take the secret for a request token, consuming it.
    ///
    /// Returns `None` if the token was never issued, already consumed, or
    /// has expired. The entry is removed either way (single-use).
    pub fn consume(&self, oauth_token: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap();

        let entry = entries.remove(oauth_token)?;

        if Utc::now() - entry.created_at > self.expiry_duration {
            return None;
        }

        Some(entry.secret)
    }

    /// Drop expired entries (called periodically).
    pub fn cleanup_expired(&self) {
        let mut entries = self.entries.lock().unwrap();
        let now = Utc::now();

        entries.retain(|_, entry| now - entry.created_at <= self.expiry_duration);
    }

    /// Number of pending secrets (for monitoring).
    pub fn count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

/// Background task to periodically sweep expired pending secrets.
pub async fn run_pending_cleanup(pending: PendingSecrets, interval_seconds: u64) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(interval_seconds));

    loop {
        interval.tick().await;
        pending.cleanup_expired();
        tracing::debug!(
            "Pending secret cleanup complete, {} entries remaining",
            pending.count()
        );
    }
}
