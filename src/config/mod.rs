//! Environment-driven runtime configuration.

use crate::api::oauth::{provider_config, Platform, ALL_PLATFORMS};
use anyhow::{Context, Result};
use tracing::warn;

/// Development-only fallback for `ENCRYPTION_KEY`. Anything encrypted with
/// it is readable by anyone with this source; startup logs a warning when
/// it is in use.
const DEV_ENCRYPTION_KEY: &str = "dev-only-insecure-encryption-key";

/// Runtime configuration for the crosspost service
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// HTTP listen port
    pub port: u16,

    /// Location of the encrypted token store
    pub token_store_path: String,

    /// Secret the AES key is derived from
    pub encryption_key: String,

    /// Public base URL OAuth callbacks are registered under
    pub callback_base_url: String,
}

impl AppConfig {
    /// Read configuration from the environment.
    ///
    /// `ENCRYPTION_KEY` falls back to an insecure development default with
    /// a prominent warning; everything else has quiet defaults.
    pub fn from_env() -> Result<Self> {
        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid port number")?;

        let token_store_path =
            std::env::var("TOKEN_STORE_PATH").unwrap_or_else(|_| "data/tokens.json".to_string());

        let encryption_key = match std::env::var("ENCRYPTION_KEY") {
            Ok(key) if !key.is_empty() => key,
            _ => {
                warn!(
                    "ENCRYPTION_KEY not set; falling back to the insecure development \
                     default. Stored credentials are NOT protected. Set ENCRYPTION_KEY \
                     before any real deployment."
                );
                DEV_ENCRYPTION_KEY.to_string()
            }
        };

        let callback_base_url = std::env::var("CALLBACK_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", port));

        Ok(Self {
            port,
            token_store_path,
            encryption_key,
            callback_base_url,
        })
    }

    /// Warn about platforms with no client credentials configured.
    ///
    /// The start redirect stays unconditional for OAuth2 platforms, so a
    /// missing client id surfaces as a provider-side error; this makes the
    /// misconfiguration visible in our own logs instead.
    pub fn report_unconfigured_platforms(&self) {
        let unconfigured: Vec<&str> = ALL_PLATFORMS
            .iter()
            .filter(|platform| {
                let prefix = platform.env_prefix();
                match platform {
                    Platform::Twitter => {
                        std::env::var(format!("{}_CLIENT_ID", prefix)).is_err()
                            || std::env::var(format!("{}_CLIENT_SECRET", prefix)).is_err()
                    }
                    _ => provider_config(**platform)
                        .map(|c| c.client_id.is_empty() || c.client_secret.is_empty())
                        .unwrap_or(true),
                }
            })
            .map(|platform| platform.as_str())
            .collect();

        if !unconfigured.is_empty() {
            warn!(
                platforms = ?unconfigured,
                "Platforms missing client credentials; connect attempts will fail at the provider"
            );
        }
    }
}
