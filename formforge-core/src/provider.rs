//! Identity provider endpoint configuration.
//!
//! [`ProviderConfig`] names the endpoints and scopes used for sign-in. The
//! Google configuration requests everything form creation needs: form-content
//! write, file-scoped drive write, email read and basic identity.

use serde::{Deserialize, Serialize};

/// Scopes required to create forms on the user's behalf.
pub const GOOGLE_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/forms.body",
    "https://www.googleapis.com/auth/drive.file",
    "https://www.googleapis.com/auth/userinfo.email",
    "openid",
];

/// Configuration for an OAuth identity provider.
///
/// # Example
///
/// ```
/// use formforge_core::provider::ProviderConfig;
///
/// let google = ProviderConfig::google();
/// assert_eq!(google.token_url, "https://oauth2.googleapis.com/token");
/// assert!(google.scopes.iter().any(|s| s.ends_with("forms.body")));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    /// Unique identifier for the provider (e.g., "google").
    pub id: String,

    /// OAuth authorization endpoint URL.
    pub auth_url: String,

    /// OAuth token endpoint URL.
    pub token_url: String,

    /// Endpoint returning the signed-in user's profile.
    pub userinfo_url: String,

    /// Scopes requested at sign-in.
    pub scopes: Vec<String>,
}

impl ProviderConfig {
    /// Google endpoints and the scopes required for form creation.
    pub fn google() -> Self {
        Self {
            id: "google".to_string(),
            auth_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
            scopes: GOOGLE_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Set the authorization URL.
    pub fn with_auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = url.into();
        self
    }

    /// Set the token URL.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Set the userinfo URL.
    pub fn with_userinfo_url(mut self, url: impl Into<String>) -> Self {
        self.userinfo_url = url.into();
        self
    }

    /// Replace the requested scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::google()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_google_scopes() {
        let config = ProviderConfig::google();
        assert_eq!(config.id, "google");
        assert_eq!(config.scopes.len(), 4);
        assert!(config.scopes.contains(&"openid".to_string()));
        assert!(
            config
                .scopes
                .iter()
                .any(|s| s == "https://www.googleapis.com/auth/drive.file")
        );
    }

    #[test]
    fn test_provider_config_builder() {
        let config = ProviderConfig::google()
            .with_auth_url("https://example.com/auth")
            .with_token_url("https://example.com/token")
            .with_userinfo_url("https://example.com/userinfo")
            .with_scopes(vec!["read".to_string()]);

        assert_eq!(config.auth_url, "https://example.com/auth");
        assert_eq!(config.token_url, "https://example.com/token");
        assert_eq!(config.userinfo_url, "https://example.com/userinfo");
        assert_eq!(config.scopes, vec!["read"]);
    }
}
