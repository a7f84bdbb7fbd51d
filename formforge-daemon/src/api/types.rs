//! API request/response types for the daemon JSON-RPC interface.
//!
//! Most results are core types serialized as-is ([`LoginRedirect`],
//! [`AuthStatus`], [`GeneratedForm`], ...). The types here cover responses the
//! core has no serializable counterpart for.

use chrono::{DateTime, Utc};
use formforge_core::{LoginOutcome, SaveOutcome};
use serde::{Deserialize, Serialize};

pub use formforge_core::{
    AuthStatus, FormHistoryRecord, GeneratedForm, HealthReport, KeyStatus, LoginRedirect,
    UsageStats,
};

/// Result of a completed sign-in callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub session_id: String,
    pub user_email: String,
    pub expires_at: DateTime<Utc>,
    /// `Set-Cookie` value for the frontend to forward.
    pub set_cookie: String,
}

impl From<LoginOutcome> for CallbackResponse {
    fn from(outcome: LoginOutcome) -> Self {
        Self {
            session_id: outcome.session.session_id.as_str().to_string(),
            user_email: outcome.session.user_email.to_string(),
            expires_at: outcome.session.expires_at,
            set_cookie: outcome.set_cookie,
        }
    }
}

/// Result of a logout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub message: String,
    /// `Set-Cookie` value clearing the session cookie.
    pub set_cookie: String,
}

/// One page of generated forms, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub forms: Vec<FormHistoryRecord>,
}

/// Result of saving a generation key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveKeyResponse {
    pub status: SaveOutcome,
}
