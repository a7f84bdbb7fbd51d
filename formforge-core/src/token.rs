//! Token types and the token lifecycle trait.
//!
//! This module provides:
//! - [`AccessToken`] - A usable plaintext access token with its expiry
//! - [`TokenGrant`] - Tokens returned by an authorization-code exchange
//! - [`RefreshedToken`] - Tokens returned by a refresh exchange
//! - [`TokenManager`] - Trait for token lifecycle management

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::crypto::CryptoError;
use crate::model::UserEmail;
use crate::store::{Secret, StoreError};

/// Lifetime assumed when the provider omits `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Error type for token operations.
#[derive(Debug, Error)]
pub enum TokenError {
    /// No token record is stored for the user.
    #[error("no token available for {user}")]
    NotFound { user: String },

    /// The provider rejected the refresh token (revoked or expired).
    ///
    /// Not transient: the user must sign in again.
    #[error("token refresh rejected by provider: {message}")]
    RefreshRejected { message: String },

    /// A stored token could not be decrypted.
    #[error("stored token unreadable: {0}")]
    Crypto(#[from] CryptoError),

    /// Storage error during token operations.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Network error talking to the provider.
    #[error("network error: {message}")]
    Network { message: String },

    /// The provider returned an error outside the refresh path.
    #[error("OAuth flow failed: {message}")]
    OAuth { message: String },

    /// The provider did not report the user's email.
    #[error("provider did not return a user email")]
    MissingUserInfo,
}

/// A plaintext access token that is usable right now.
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// The bearer token.
    pub secret: Secret,

    /// When the provider will stop accepting the token.
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Expose the bearer value for an outgoing request.
    pub fn expose(&self) -> &str {
        self.secret.expose()
    }
}

/// Tokens obtained by exchanging an authorization code.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: Secret,

    /// Only present when the provider granted offline access.
    pub refresh_token: Option<Secret>,

    pub expires_in: Duration,
}

/// Tokens obtained by a refresh exchange.
///
/// The provider does not rotate the refresh token, so only the access token
/// and its lifetime are returned.
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub access_token: Secret,
    pub expires_in: Duration,
}

/// Convert a provider-reported lifetime to a chrono duration.
pub(crate) fn lifetime_from_std(expires_in: Option<std::time::Duration>) -> Duration {
    expires_in
        .and_then(|d| Duration::from_std(d).ok())
        .unwrap_or_else(|| Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS))
}

/// Trait for managing token lifecycle.
///
/// Implementations handle:
/// - Returning a currently usable access token
/// - Refreshing stale tokens transparently
/// - Persisting newly granted tokens
/// - Removing tokens on logout
#[async_trait]
pub trait TokenManager: Send + Sync {
    /// Get a usable access token, refreshing if necessary.
    ///
    /// This is the primary method consumers should use. It:
    /// 1. Loads the stored record (`NotFound` if absent)
    /// 2. Returns the stored token when it has not expired
    /// 3. Otherwise refreshes, persists and returns the new token
    async fn get_usable_token(&self, user: &UserEmail) -> Result<AccessToken, TokenError>;

    /// Encrypt and store a freshly granted token pair, replacing any existing record.
    async fn store_tokens(
        &self,
        user: &UserEmail,
        access_token: &Secret,
        refresh_token: &Secret,
        expires_in: Duration,
    ) -> Result<(), TokenError>;

    /// Remove the stored tokens for a user. Returns whether a record existed.
    async fn revoke_tokens(&self, user: &UserEmail) -> Result<bool, TokenError>;
}
