//! Sign-in flow: login, callback, status and logout.
//!
//! The callback only proceeds when it presents a state that this process
//! issued at login and has not seen before. The authorization code is never
//! exchanged for a forged or replayed state.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::model::{Session, SessionId, UserEmail};
use crate::oauth::IdentityProvider;
use crate::oauth::state::PendingStates;
use crate::session::{SessionCookie, SessionManager};
use crate::store::StoreError;
use crate::token::{TokenError, TokenManager};

/// Errors from the sign-in flow.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The callback state was not issued here, has expired, or was already used.
    #[error("invalid or expired sign-in state")]
    InvalidState,

    /// The provider granted no refresh token, so the session could not be kept alive.
    #[error("identity provider did not return a refresh token")]
    MissingRefreshToken,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Where to send the user to sign in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRedirect {
    pub auth_url: String,
    pub state: String,
}

/// Result of a completed sign-in.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub session: Session,
    /// `Set-Cookie` value carrying the session id.
    pub set_cookie: String,
}

/// Whether a session is signed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<UserEmail>,
}

/// Drives the authorization-code flow and owns the issued states.
pub struct AuthService {
    provider: Arc<dyn IdentityProvider>,
    tokens: Arc<dyn TokenManager>,
    sessions: Arc<SessionManager>,
    states: PendingStates,
    cookie: SessionCookie,
}

impl AuthService {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        tokens: Arc<dyn TokenManager>,
        sessions: Arc<SessionManager>,
        cookie: SessionCookie,
    ) -> Self {
        Self {
            provider,
            tokens,
            sessions,
            states: PendingStates::new(),
            cookie,
        }
    }

    /// Replace the state registry (e.g. to shorten its lifetime).
    pub fn with_states(mut self, states: PendingStates) -> Self {
        self.states = states;
        self
    }

    pub fn cookie(&self) -> &SessionCookie {
        &self.cookie
    }

    /// Start a sign-in.
    pub fn login(&self) -> Result<LoginRedirect, AuthError> {
        let state = self.states.issue();
        let auth_url = self.provider.authorization_url(&state)?;
        tracing::debug!("Issued sign-in state ({} pending)", self.states.len());
        Ok(LoginRedirect { auth_url, state })
    }

    /// Complete a sign-in with the code and state the provider redirected back with.
    pub async fn callback(&self, code: &str, state: &str) -> Result<LoginOutcome, AuthError> {
        if !self.states.consume(state) {
            tracing::warn!("Rejected sign-in callback with unknown or reused state");
            return Err(AuthError::InvalidState);
        }

        let grant = self.provider.exchange_code(code).await?;
        let refresh_token = grant.refresh_token.ok_or(AuthError::MissingRefreshToken)?;
        let user = self.provider.fetch_user_email(&grant.access_token).await?;

        self.tokens
            .store_tokens(&user, &grant.access_token, &refresh_token, grant.expires_in)
            .await?;
        let session = self.sessions.create_default(&user).await?;

        tracing::info!("User {} signed in", user);

        Ok(LoginOutcome {
            set_cookie: self.cookie.set_header(&session.session_id),
            session,
        })
    }

    /// Report whether a session id belongs to a live session.
    pub async fn status(&self, session_id: Option<&SessionId>) -> Result<AuthStatus, AuthError> {
        let session = match session_id {
            Some(id) => self.sessions.get(id).await?,
            None => None,
        };

        Ok(AuthStatus {
            authenticated: session.is_some(),
            user_email: session.map(|s| s.user_email),
        })
    }

    /// Sign out. Always succeeds for unknown or expired sessions.
    ///
    /// Returns the `Set-Cookie` value that clears the browser cookie.
    pub async fn logout(&self, session_id: Option<&SessionId>) -> Result<String, AuthError> {
        if let Some(id) = session_id {
            if let Some(session) = self.sessions.get(id).await? {
                self.tokens.revoke_tokens(&session.user_email).await?;
                tracing::info!("User {} signed out", session.user_email);
            }
            self.sessions.delete(id).await?;
        }

        Ok(self.cookie.clear_header())
    }
}
