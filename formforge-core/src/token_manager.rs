//! Default implementation of the TokenManager trait.
//!
//! This module provides [`DefaultTokenManager`], a complete implementation
//! of the [`TokenManager`] trait that handles encrypted token storage, refresh,
//! and revocation.
//!
//! # Features
//!
//! - Automatic token refresh when expired
//! - Encryption at rest via [`TokenCipher`]
//! - Persistent storage via [`CredentialStore`]
//! - Optional expiry buffer to refresh tokens before they expire
//!
//! # Example
//!
//! ```rust,ignore
//! use formforge_core::{DefaultTokenManager, TokenManager, UserEmail};
//!
//! let manager = DefaultTokenManager::new(store, cipher, provider);
//! let token = manager.get_usable_token(&UserEmail::new("ada@example.com")).await?;
//! forms.create_form(token.expose(), "Survey").await?;
//! ```
//!
//! # Concurrency
//!
//! No lock is taken around the refresh path. Two concurrent callers that both
//! see a stale token will both refresh and the later write wins. Because a
//! refresh only replaces the access token and its expiry, the stored refresh
//! token is never lost in that race.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::{
    crypto::TokenCipher,
    model::{OAuthTokenRecord, UserEmail},
    oauth::IdentityProvider,
    store::{CredentialStore, Secret},
    token::{AccessToken, TokenError, TokenManager},
};

/// Default implementation of TokenManager.
///
/// This implementation:
/// - Stores one encrypted [`OAuthTokenRecord`] per user
/// - Returns the stored access token while it has not expired
/// - Refreshes through the [`IdentityProvider`] once it has
pub struct DefaultTokenManager {
    store: Arc<dyn CredentialStore>,
    cipher: Arc<TokenCipher>,
    provider: Arc<dyn IdentityProvider>,
    expiry_buffer: Duration,
}

impl DefaultTokenManager {
    /// Create a new token manager.
    ///
    /// A token is used until its recorded expiry passes.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        cipher: Arc<TokenCipher>,
        provider: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            store,
            cipher,
            provider,
            expiry_buffer: Duration::zero(),
        }
    }

    /// Treat tokens as stale this long before their recorded expiry.
    pub fn with_expiry_buffer(mut self, buffer: Duration) -> Self {
        self.expiry_buffer = buffer;
        self
    }

    fn is_stale(&self, record: &OAuthTokenRecord) -> bool {
        record.token_expiry < Utc::now() + self.expiry_buffer
    }

    /// Refresh the access token and persist the replacement record.
    async fn refresh_access_token(
        &self,
        record: OAuthTokenRecord,
    ) -> Result<AccessToken, TokenError> {
        let refresh_token = self.cipher.decrypt(&record.refresh_token)?;

        let refreshed = match self.provider.refresh(&refresh_token).await {
            Ok(refreshed) => refreshed,
            Err(e) => {
                tracing::error!("Failed to refresh token for {}: {}", record.user_email, e);
                return Err(e);
            }
        };

        let expires_at = Utc::now() + refreshed.expires_in;
        let updated = OAuthTokenRecord {
            access_token: self.cipher.encrypt(refreshed.access_token.expose())?,
            token_expiry: expires_at,
            ..record
        };
        self.store.upsert_token(&updated).await?;

        tracing::info!("Refreshed access token for {}", updated.user_email);

        Ok(AccessToken {
            secret: refreshed.access_token,
            expires_at,
        })
    }
}

#[async_trait]
impl TokenManager for DefaultTokenManager {
    async fn get_usable_token(&self, user: &UserEmail) -> Result<AccessToken, TokenError> {
        let record = self
            .store
            .find_token(user)
            .await?
            .ok_or_else(|| TokenError::NotFound {
                user: user.to_string(),
            })?;

        let access_token = self.cipher.decrypt(&record.access_token)?;

        if !self.is_stale(&record) {
            tracing::debug!("Using stored access token for {}", user);
            return Ok(AccessToken {
                secret: access_token,
                expires_at: record.token_expiry,
            });
        }

        tracing::info!("Access token expired for {}, attempting refresh", user);
        self.refresh_access_token(record).await
    }

    async fn store_tokens(
        &self,
        user: &UserEmail,
        access_token: &Secret,
        refresh_token: &Secret,
        expires_in: Duration,
    ) -> Result<(), TokenError> {
        let now = Utc::now();
        let record = OAuthTokenRecord {
            user_email: user.clone(),
            access_token: self.cipher.encrypt(access_token.expose())?,
            refresh_token: self.cipher.encrypt(refresh_token.expose())?,
            token_expiry: now + expires_in,
            created_at: now,
        };

        self.store.upsert_token(&record).await?;
        tracing::debug!("Stored tokens for {}", user);

        Ok(())
    }

    async fn revoke_tokens(&self, user: &UserEmail) -> Result<bool, TokenError> {
        let removed = self.store.delete_token(user).await?;
        if removed {
            tracing::info!("Revoked tokens for {}", user);
        }
        Ok(removed)
    }
}
