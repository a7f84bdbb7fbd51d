//! Collection state shared by the in-memory and file-backed stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::StoreError;
use crate::model::{
    FormHistoryRecord, OAuthTokenRecord, Session, SessionId, UserEmail, UserSettings,
};

/// The four persisted collections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Collections {
    #[serde(default)]
    sessions: HashMap<String, Session>,

    #[serde(default)]
    oauth_tokens: HashMap<String, OAuthTokenRecord>,

    /// Kept in insertion order.
    #[serde(default)]
    form_history: Vec<FormHistoryRecord>,

    #[serde(default)]
    user_settings: HashMap<String, UserSettings>,
}

impl Collections {
    pub(crate) fn insert_session(&mut self, session: &Session) -> Result<(), StoreError> {
        let key = session.session_id.as_str();
        if self.sessions.contains_key(key) {
            return Err(StoreError::DuplicateKey {
                collection: "sessions",
            });
        }
        self.sessions.insert(key.to_string(), session.clone());
        Ok(())
    }

    pub(crate) fn find_session(&self, session_id: &SessionId) -> Option<Session> {
        self.sessions.get(session_id.as_str()).cloned()
    }

    pub(crate) fn delete_session(&mut self, session_id: &SessionId) -> bool {
        self.sessions.remove(session_id.as_str()).is_some()
    }

    pub(crate) fn purge_expired_sessions(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.is_active_at(now));
        before - self.sessions.len()
    }

    pub(crate) fn upsert_token(&mut self, record: &OAuthTokenRecord) {
        self.oauth_tokens
            .insert(record.user_email.as_str().to_string(), record.clone());
    }

    pub(crate) fn find_token(&self, user: &UserEmail) -> Option<OAuthTokenRecord> {
        self.oauth_tokens.get(user.as_str()).cloned()
    }

    pub(crate) fn delete_token(&mut self, user: &UserEmail) -> bool {
        self.oauth_tokens.remove(user.as_str()).is_some()
    }

    pub(crate) fn append_history(&mut self, record: &FormHistoryRecord) {
        self.form_history.push(record.clone());
    }

    pub(crate) fn list_history(
        &self,
        user: &UserEmail,
        skip: usize,
        limit: usize,
    ) -> Vec<FormHistoryRecord> {
        let mut records: Vec<&FormHistoryRecord> = self
            .form_history
            .iter()
            .filter(|r| &r.user_email == user)
            .collect();
        // Stable sort keeps insertion order for equal timestamps; reverse for newest first.
        records.sort_by_key(|r| r.created_at);
        records
            .into_iter()
            .rev()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect()
    }

    pub(crate) fn count_history(&self, user: &UserEmail) -> usize {
        self.form_history
            .iter()
            .filter(|r| &r.user_email == user)
            .count()
    }

    pub(crate) fn find_settings(&self, user: &UserEmail) -> Option<UserSettings> {
        self.user_settings.get(user.as_str()).cloned()
    }

    pub(crate) fn set_setting(&mut self, user: &UserEmail, key: &str, value: serde_json::Value) {
        let settings = self
            .user_settings
            .entry(user.as_str().to_string())
            .or_insert_with(|| UserSettings::new(user.clone()));
        settings.values.insert(key.to_string(), value);
        settings.updated_at = Utc::now();
    }
}
