//! Domain model types for Formforge.
//!
//! This module defines the persisted records shared by every component:
//! - [`UserEmail`] - Identity key for a signed-in user
//! - [`SessionId`] - Opaque, unguessable session identifier
//! - [`Session`] - Server-side session binding an id to a user
//! - [`OAuthTokenRecord`] - Encrypted-at-rest access/refresh token pair
//! - [`UserSettings`] - Per-user key/value settings
//! - [`FormHistoryRecord`] - Append-only log of generated forms

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Settings key holding a user's encrypted generation-service API key.
pub const GEMINI_API_KEY_SETTING: &str = "gemini_api_key";

/// Identity key for a user, as reported by the identity provider.
///
/// # Examples
///
/// ```
/// use formforge_core::UserEmail;
///
/// let user = UserEmail::new(" ada@example.com ");
/// assert_eq!(user.as_str(), "ada@example.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserEmail(String);

impl UserEmail {
    /// Create a new user identity. Surrounding whitespace is removed.
    pub fn new(email: impl Into<String>) -> Self {
        Self(email.into().trim().to_string())
    }

    /// Get the email as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserEmail {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Opaque session identifier.
///
/// The identifier is a bearer credential, so `Debug` never prints it.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an identifier received from a client.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId([REDACTED])")
    }
}

/// A server-side session.
///
/// A session has no status field: it is active while `expires_at` is strictly
/// in the future, expired afterwards, and absent once deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub user_email: UserEmail,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session is still usable at `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Encrypted OAuth tokens for one user.
///
/// There is exactly one record per `user_email`; writes replace the whole record.
/// Both token fields hold ciphertext produced by [`crate::crypto::TokenCipher`].
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthTokenRecord {
    pub user_email: UserEmail,
    pub access_token: String,
    pub refresh_token: String,
    pub token_expiry: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for OAuthTokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokenRecord")
            .field("user_email", &self.user_email)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("token_expiry", &self.token_expiry)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Per-user settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    pub user_email: UserEmail,
    #[serde(default)]
    pub values: BTreeMap<String, serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

impl UserSettings {
    /// Create empty settings for a user.
    pub fn new(user_email: UserEmail) -> Self {
        Self {
            user_email,
            values: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    /// Get a string-valued setting.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_str())
    }

    /// The user's encrypted generation-service key, if one was saved.
    pub fn gemini_api_key(&self) -> Option<&str> {
        self.get_str(GEMINI_API_KEY_SETTING)
    }
}

/// One generated form. Never updated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormHistoryRecord {
    pub id: Uuid,
    pub user_email: UserEmail,
    pub form_id: String,
    pub form_url: String,
    pub form_title: String,
    pub prompt: String,
    pub created_at: DateTime<Utc>,
}

impl FormHistoryRecord {
    pub fn new(
        user_email: UserEmail,
        form_id: impl Into<String>,
        form_url: impl Into<String>,
        form_title: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_email,
            form_id: form_id.into(),
            form_url: form_url.into(),
            form_title: form_title.into(),
            prompt: prompt.into(),
            created_at: Utc::now(),
        }
    }
}

/// Usage counters for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub total_forms: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_user_email_trims() {
        let user = UserEmail::new("  someone@example.com\n");
        assert_eq!(user.as_str(), "someone@example.com");
        assert_eq!(user.to_string(), "someone@example.com");
    }

    #[test]
    fn test_session_id_debug_redacted() {
        let id = SessionId::new("very-secret-session");
        let debug = format!("{:?}", id);
        assert!(!debug.contains("very-secret-session"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_session_activity_is_strict() {
        let now = Utc::now();
        let session = Session {
            session_id: SessionId::new("s"),
            user_email: UserEmail::new("a@example.com"),
            created_at: now - Duration::hours(1),
            expires_at: now,
        };

        assert!(!session.is_active_at(now));
        assert!(session.is_active_at(now - Duration::seconds(1)));
    }

    #[test]
    fn test_token_record_debug_redacted() {
        let record = OAuthTokenRecord {
            user_email: UserEmail::new("a@example.com"),
            access_token: "cipher-access".to_string(),
            refresh_token: "cipher-refresh".to_string(),
            token_expiry: Utc::now(),
            created_at: Utc::now(),
        };

        let debug = format!("{:?}", record);
        assert!(!debug.contains("cipher-access"));
        assert!(!debug.contains("cipher-refresh"));
        assert!(debug.contains("a@example.com"));
    }

    #[test]
    fn test_settings_gemini_key() {
        let mut settings = UserSettings::new(UserEmail::new("a@example.com"));
        assert!(settings.gemini_api_key().is_none());

        settings.values.insert(
            GEMINI_API_KEY_SETTING.to_string(),
            serde_json::Value::String("ciphertext".to_string()),
        );
        assert_eq!(settings.gemini_api_key(), Some("ciphertext"));
    }
}
