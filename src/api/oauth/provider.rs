//! Platform definitions and OAuth provider configurations.
//!
//! Each supported social platform carries its OAuth endpoints, scopes, and
//! the mapping from its profile response shape to the normalized
//! [`Profile`].

use crate::credentials::Profile;
use anyhow::{anyhow, Result};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A supported social platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    Twitter,
    Facebook,
    Linkedin,
    Google,
    Instagram,
}

/// All supported platforms, in dashboard display order.
pub const ALL_PLATFORMS: &[Platform] = &[
    Platform::Twitter,
    Platform::Facebook,
    Platform::Linkedin,
    Platform::Google,
    Platform::Instagram,
];

impl Platform {
    /// Lowercase name used in routes, the token store, and redirects.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
            Platform::Facebook => "facebook",
            Platform::Linkedin => "linkedin",
            Platform::Google => "google",
            Platform::Instagram => "instagram",
        }
    }

    /// Uppercase prefix for this platform's environment variables.
    pub fn env_prefix(&self) -> String {
        self.as_str().to_uppercase()
    }

    /// Maps a provider profile response into the normalized [`Profile`].
    ///
    /// Field names differ per provider and are mapped explicitly here:
    /// Google uses `sub` as the subject id, Twitter uses `id_str`, the rest
    /// use `id`. A response without the id field is a profile failure.
    pub fn normalize_profile(&self, raw: &Value) -> Result<Profile> {
        let id = match self {
            Platform::Google => raw.get("sub"),
            Platform::Twitter => raw.get("id_str"),
            _ => raw.get("id"),
        }
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("{} profile response missing id field", self))?
        .to_string();

        let profile = match self {
            Platform::Twitter => Profile {
                id,
                name: string_field(raw, "name"),
                username: string_field(raw, "screen_name"),
                email: None,
                avatar: string_field(raw, "profile_image_url_https"),
            },
            Platform::Facebook => Profile {
                id,
                name: string_field(raw, "name"),
                username: None,
                email: string_field(raw, "email"),
                avatar: raw
                    .pointer("/picture/data/url")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            Platform::Linkedin => Profile {
                id,
                name: match (
                    string_field(raw, "localizedFirstName"),
                    string_field(raw, "localizedLastName"),
                ) {
                    (Some(first), Some(last)) => Some(format!("{} {}", first, last)),
                    (first, last) => first.or(last),
                },
                username: None,
                email: None,
                avatar: None,
            },
            Platform::Google => Profile {
                id,
                name: string_field(raw, "name"),
                username: None,
                email: string_field(raw, "email"),
                avatar: string_field(raw, "picture"),
            },
            Platform::Instagram => Profile {
                id,
                name: string_field(raw, "username"),
                username: string_field(raw, "username"),
                email: None,
                avatar: None,
            },
        };

        Ok(profile)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "twitter" => Ok(Platform::Twitter),
            "facebook" => Ok(Platform::Facebook),
            "linkedin" => Ok(Platform::Linkedin),
            "google" => Ok(Platform::Google),
            "instagram" => Ok(Platform::Instagram),
            other => Err(anyhow!("Unknown platform '{}'", other)),
        }
    }
}

fn string_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key).and_then(Value::as_str).map(str::to_string)
}

/// OAuth2 provider configuration for one platform.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    /// OAuth authorization endpoint URL
    pub auth_url: String,

    /// OAuth token exchange endpoint URL
    pub token_url: String,

    /// Profile endpoint URL (field selection baked in where needed)
    pub profile_url: String,

    /// Requested OAuth scopes
    pub scopes: Vec<String>,

    /// Extra query parameters for the authorization URL
    pub extra_auth_params: Vec<(&'static str, &'static str)>,

    /// Whether the profile endpoint wants the token as a query parameter
    /// (Graph API style) rather than only a Bearer header
    pub token_in_query: bool,

    /// Client ID (from environment)
    pub client_id: String,

    /// Client secret (from environment)
    pub client_secret: String,
}

impl ProviderConfig {
    /// Build the provider authorization URL for the start redirect.
    pub fn build_auth_url(&self, redirect_uri: &str) -> String {
        let scopes = self.scopes.join(" ");
        let mut url = format!(
            "{}?client_id={}&redirect_uri={}&scope={}&response_type=code",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scopes),
        );
        for (key, value) in &self.extra_auth_params {
            url.push_str(&format!("&{}={}", key, urlencoding::encode(value)));
        }
        url
    }
}

/// OAuth2 provider configuration for a platform.
///
/// Client credentials come from `{PLATFORM}_CLIENT_ID` /
/// `{PLATFORM}_CLIENT_SECRET`. Missing variables yield empty strings so the
/// start redirect stays unconditional; unconfigured platforms are reported
/// at startup instead. Twitter is OAuth1 and has no config here.
pub fn provider_config(platform: Platform) -> Option<ProviderConfig> {
    let (auth_url, token_url, profile_url, scopes, extra_auth_params, token_in_query) =
        match platform {
            Platform::Twitter => return None,
            Platform::Facebook => (
                "https://www.facebook.com/v18.0/dialog/oauth",
                "https://graph.facebook.com/v18.0/oauth/access_token",
                "https://graph.facebook.com/me?fields=id,name,email,picture",
                vec!["public_profile", "email", "pages_show_list", "pages_manage_posts"],
                vec![],
                true,
            ),
            Platform::Linkedin => (
                "https://www.linkedin.com/oauth/v2/authorization",
                "https://www.linkedin.com/oauth/v2/accessToken",
                "https://api.linkedin.com/v2/me",
                vec!["r_liteprofile", "w_member_social"],
                vec![],
                false,
            ),
            Platform::Google => (
                "https://accounts.google.com/o/oauth2/v2/auth",
                "https://oauth2.googleapis.com/token",
                "https://www.googleapis.com/oauth2/v3/userinfo",
                vec![
                    "openid",
                    "email",
                    "profile",
                    "https://www.googleapis.com/auth/business.manage",
                ],
                vec![("access_type", "offline"), ("prompt", "consent")],
                false,
            ),
            Platform::Instagram => (
                "https://api.instagram.com/oauth/authorize",
                "https://api.instagram.com/oauth/access_token",
                "https://graph.instagram.com/me?fields=id,username",
                vec!["user_profile", "user_media"],
                vec![],
                true,
            ),
        };

    let prefix = platform.env_prefix();
    let client_id = std::env::var(format!("{}_CLIENT_ID", prefix)).unwrap_or_default();
    let client_secret = std::env::var(format!("{}_CLIENT_SECRET", prefix)).unwrap_or_default();

    Some(ProviderConfig {
        auth_url: auth_url.to_string(),
        token_url: token_url.to_string(),
        profile_url: profile_url.to_string(),
        scopes: scopes.into_iter().map(str::to_string).collect(),
        extra_auth_params,
        token_in_query,
        client_id,
        client_secret,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_platform_parse() {
        assert_eq!("twitter".parse::<Platform>().unwrap(), Platform::Twitter);
        assert_eq!("facebook".parse::<Platform>().unwrap(), Platform::Facebook);
        assert_eq!("linkedin".parse::<Platform>().unwrap(), Platform::Linkedin);
        assert_eq!("google".parse::<Platform>().unwrap(), Platform::Google);
        assert_eq!("instagram".parse::<Platform>().unwrap(), Platform::Instagram);
        assert!("myspace".parse::<Platform>().is_err());
        assert!("".parse::<Platform>().is_err());
    }

    #[test]
    fn test_build_auth_url() {
        let config = ProviderConfig {
            auth_url: "https://example.com/oauth/authorize".to_string(),
            token_url: "https://example.com/oauth/token".to_string(),
            profile_url: "https://example.com/me".to_string(),
            scopes: vec!["read".to_string(), "write".to_string()],
            extra_auth_params: vec![("access_type", "offline")],
            token_in_query: false,
            client_id: "test_client_id".to_string(),
            client_secret: "test_secret".to_string(),
        };

        let url = config.build_auth_url("http://localhost:3000/auth/google/callback");

        assert!(url.contains("client_id=test_client_id"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fauth%2Fgoogle%2Fcallback"));
        // URL encoding converts spaces to %20
        assert!(url.contains("scope=read%20write"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("access_type=offline"));
    }

    #[test]
    fn test_normalize_google_profile_uses_sub() {
        let raw = json!({
            "sub": "109876543210",
            "name": "Jane Baker",
            "email": "jane@example.com",
            "picture": "https://lh3.googleusercontent.com/photo.jpg"
        });

        let profile = Platform::Google.normalize_profile(&raw).unwrap();
        assert_eq!(profile.id, "109876543210");
        assert_eq!(profile.name.as_deref(), Some("Jane Baker"));
        assert_eq!(profile.email.as_deref(), Some("jane@example.com"));
        assert!(profile.avatar.is_some());
    }

    #[test]
    fn test_normalize_facebook_profile_nested_picture() {
        let raw = json!({
            "id": "1122334455",
            "name": "Jane's Bakery",
            "email": "hello@janesbakery.com",
            "picture": { "data": { "url": "https://graph.facebook.com/pic.jpg" } }
        });

        let profile = Platform::Facebook.normalize_profile(&raw).unwrap();
        assert_eq!(profile.id, "1122334455");
        assert_eq!(
            profile.avatar.as_deref(),
            Some("https://graph.facebook.com/pic.jpg")
        );
    }

    #[test]
    fn test_normalize_linkedin_profile_joins_names() {
        let raw = json!({
            "id": "aBcDeF123",
            "localizedFirstName": "Jane",
            "localizedLastName": "Baker"
        });

        let profile = Platform::Linkedin.normalize_profile(&raw).unwrap();
        assert_eq!(profile.id, "aBcDeF123");
        assert_eq!(profile.name.as_deref(), Some("Jane Baker"));
        assert!(profile.email.is_none());
    }

    #[test]
    fn test_normalize_instagram_profile_username_only() {
        let raw = json!({ "id": "17841400000000", "username": "janesbakery" });

        let profile = Platform::Instagram.normalize_profile(&raw).unwrap();
        assert_eq!(profile.id, "17841400000000");
        assert_eq!(profile.username.as_deref(), Some("janesbakery"));
        assert!(profile.avatar.is_none());
    }

    #[test]
    fn test_normalize_twitter_profile() {
        let raw = json!({
            "id_str": "2244994945",
            "id": 2244994945u64,
            "name": "Jane's Bakery",
            "screen_name": "janesbakery",
            "profile_image_url_https": "https://pbs.twimg.com/profile.jpg"
        });

        let profile = Platform::Twitter.normalize_profile(&raw).unwrap();
        assert_eq!(profile.id, "2244994945");
        assert_eq!(profile.username.as_deref(), Some("janesbakery"));
    }

    #[test]
    fn test_normalize_profile_missing_id_fails() {
        let raw = json!({ "name": "No Id Here" });
        assert!(Platform::Facebook.normalize_profile(&raw).is_err());

        // Google ignores a plain "id" field -- the subject must be "sub"
        let raw = json!({ "id": "123", "name": "Wrong Field" });
        assert!(Platform::Google.normalize_profile(&raw).is_err());
    }
}
