//! Credential store abstraction.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for sensitive values that prevents accidental logging
//! - [`CredentialStore`] - Trait over the persisted collections
//! - [`MemoryStore`] - In-memory implementation for testing
//! - [`FileStore`] - JSON-document implementation for a single host
//!
//! # Collections
//!
//! | collection      | key          | write semantics          |
//! |-----------------|--------------|--------------------------|
//! | `sessions`      | `session_id` | insert, delete           |
//! | `oauth_tokens`  | `user_email` | upsert (last write wins) |
//! | `form_history`  | none         | append only              |
//! | `user_settings` | `user_email` | per-key upsert           |
//!
//! # Example
//!
//! ```rust,ignore
//! use formforge_core::store::{CredentialStore, MemoryStore};
//!
//! let store = MemoryStore::new();
//! store.upsert_token(&record).await?;
//! let found = store.find_token(&record.user_email).await?;
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroize;

use crate::model::{
    FormHistoryRecord, OAuthTokenRecord, Session, SessionId, UserEmail, UserSettings,
};

mod data;
mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value,
/// and the buffer is zeroed when the secret is dropped.
#[derive(Clone, Serialize, Deserialize)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Consume the secret and return the inner value.
    pub fn into_inner(mut self) -> String {
        std::mem::take(&mut self.0)
    }

    /// Whether the secret is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// Error type for credential store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record with the same unique key already exists.
    #[error("duplicate key in collection {collection}")]
    DuplicateKey { collection: &'static str },

    /// The storage backend encountered an error.
    #[error("backend error: {message}")]
    BackendError { message: String },

    /// I/O error reading or writing the backing file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The stored document has a format version this build cannot read.
    #[error("unsupported store format version {found}")]
    UnsupportedVersion { found: u32 },
}

/// Persistence contract for sessions, tokens, history and settings.
///
/// Implementations must serialize writes per record so that
/// [`upsert_token`](CredentialStore::upsert_token) never leaves two records
/// for one user.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new session. Fails if the id is already taken.
    async fn insert_session(&self, session: &Session) -> Result<(), StoreError>;

    /// Find a session by id, regardless of expiry.
    async fn find_session(&self, session_id: &SessionId) -> Result<Option<Session>, StoreError>;

    /// Delete a session. Returns whether a record was removed.
    async fn delete_session(&self, session_id: &SessionId) -> Result<bool, StoreError>;

    /// Delete every session whose expiry is at or before `now`.
    ///
    /// Returns the number of sessions removed.
    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;

    /// Insert or fully replace the token record for `record.user_email`.
    async fn upsert_token(&self, record: &OAuthTokenRecord) -> Result<(), StoreError>;

    /// Find the token record for a user.
    async fn find_token(&self, user: &UserEmail) -> Result<Option<OAuthTokenRecord>, StoreError>;

    /// Delete the token record for a user. Returns whether a record was removed.
    async fn delete_token(&self, user: &UserEmail) -> Result<bool, StoreError>;

    /// Append a history record.
    async fn append_history(&self, record: &FormHistoryRecord) -> Result<(), StoreError>;

    /// List a user's history, newest first.
    async fn list_history(
        &self,
        user: &UserEmail,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<FormHistoryRecord>, StoreError>;

    /// Count a user's history records.
    async fn count_history(&self, user: &UserEmail) -> Result<usize, StoreError>;

    /// Find the settings for a user.
    async fn find_settings(&self, user: &UserEmail) -> Result<Option<UserSettings>, StoreError>;

    /// Set one settings key for a user, creating the settings record if needed.
    async fn set_setting(
        &self,
        user: &UserEmail,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), StoreError>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_redacted() {
        let secret = Secret::new("super-secret");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_secret_display_redacted() {
        let secret = Secret::new("super-secret");
        let display = format!("{}", secret);
        assert!(!display.contains("super-secret"));
        assert!(display.contains("REDACTED"));
    }

    #[test]
    fn test_secret_into_inner() {
        let secret = Secret::new("value");
        assert_eq!(secret.into_inner(), "value");
    }

    #[test]
    fn test_secret_blank() {
        assert!(Secret::new("  ").is_blank());
        assert!(!Secret::new("k").is_blank());
    }
}
