//! Session management.
//!
//! [`SessionManager`] maps an opaque session identifier to a user identity.
//! Expiry is evaluated lazily at read time: an expired row stays in the store
//! (until a reaper purges it) but is never returned by [`SessionManager::get`].
//!
//! [`SessionCookie`] renders the cookie that carries the identifier to the
//! browser.

use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::crypto::random_url_token;
use crate::model::{Session, SessionId, UserEmail};
use crate::store::{CredentialStore, StoreError};

/// Default session lifetime in hours.
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// Random bytes in a session identifier (256 bits).
const SESSION_ID_BYTES: usize = 32;

/// Creates, resolves and deletes sessions.
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    default_ttl: Duration,
}

impl SessionManager {
    /// Create a session manager with the default 24 hour lifetime.
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self::with_ttl(store, Duration::hours(DEFAULT_SESSION_TTL_HOURS))
    }

    /// Create a session manager with a custom default lifetime.
    pub fn with_ttl(store: Arc<dyn CredentialStore>, default_ttl: Duration) -> Self {
        Self { store, default_ttl }
    }

    /// The lifetime applied by [`create_default`](Self::create_default).
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Create a session for `user_email` that expires after `ttl`.
    pub async fn create(&self, user_email: &UserEmail, ttl: Duration) -> Result<Session, StoreError> {
        let now = Utc::now();
        let session = Session {
            session_id: SessionId::new(random_url_token(SESSION_ID_BYTES)),
            user_email: user_email.clone(),
            created_at: now,
            expires_at: now + ttl,
        };

        self.store.insert_session(&session).await?;
        tracing::info!("Created session for {} (expires {})", user_email, session.expires_at);

        Ok(session)
    }

    /// Create a session with the default lifetime.
    pub async fn create_default(&self, user_email: &UserEmail) -> Result<Session, StoreError> {
        self.create(user_email, self.default_ttl).await
    }

    /// Resolve a session id.
    ///
    /// Returns `None` for unknown ids and for sessions whose expiry is not
    /// strictly in the future. Never extends or deletes the session.
    pub async fn get(&self, session_id: &SessionId) -> Result<Option<Session>, StoreError> {
        let Some(session) = self.store.find_session(session_id).await? else {
            return Ok(None);
        };

        if !session.is_active_at(Utc::now()) {
            tracing::debug!("Session for {} has expired", session.user_email);
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// Delete a session. Returns whether a row was removed.
    pub async fn delete(&self, session_id: &SessionId) -> Result<bool, StoreError> {
        let removed = self.store.delete_session(session_id).await?;
        if removed {
            tracing::info!("Deleted session");
        }
        Ok(removed)
    }
}

/// Renders the session cookie contract.
///
/// The cookie is HTTP-only and `SameSite=Lax`; it is marked `Secure` when the
/// frontend is served over https.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    secure: bool,
    max_age: Duration,
}

impl SessionCookie {
    /// Cookie name carrying the session identifier.
    pub const NAME: &'static str = "session_id";

    /// Build the cookie policy for a frontend origin.
    pub fn for_frontend(frontend_url: &str, max_age: Duration) -> Self {
        let secure = url::Url::parse(frontend_url)
            .map(|u| u.scheme() == "https")
            .unwrap_or(false);
        Self { secure, max_age }
    }

    /// Whether the `Secure` attribute is emitted.
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// `Set-Cookie` value establishing the session.
    pub fn set_header(&self, session_id: &SessionId) -> String {
        self.render(session_id.as_str(), self.max_age.num_seconds())
    }

    /// `Set-Cookie` value clearing the session.
    pub fn clear_header(&self) -> String {
        self.render("", 0)
    }

    fn render(&self, value: &str, max_age: i64) -> String {
        let mut cookie = format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
            Self::NAME,
            value,
            max_age
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Extract the session id from a `Cookie` request header.
    pub fn parse(cookie_header: &str) -> Option<SessionId> {
        cookie_header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == Self::NAME)
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
            .map(SessionId::new)
    }
}
