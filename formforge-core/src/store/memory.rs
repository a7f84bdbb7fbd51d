//! In-memory credential store implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::data::Collections;
use super::{CredentialStore, StoreError};
use crate::model::{
    FormHistoryRecord, OAuthTokenRecord, Session, SessionId, UserEmail, UserSettings,
};

/// In-memory credential store for testing and development.
///
/// This store is not persistent; data is lost when the process exits.
///
/// # Thread Safety
///
/// This implementation uses interior mutability via `RwLock` and is
/// safe to share across threads.
pub struct MemoryStore {
    data: RwLock<Collections>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(Collections::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Collections>, StoreError> {
        self.data.read().map_err(|e| StoreError::BackendError {
            message: format!("lock poisoned: {}", e),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Collections>, StoreError> {
        self.data.write().map_err(|e| StoreError::BackendError {
            message: format!("lock poisoned: {}", e),
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
        self.write()?.insert_session(session)
    }

    async fn find_session(&self, session_id: &SessionId) -> Result<Option<Session>, StoreError> {
        Ok(self.read()?.find_session(session_id))
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<bool, StoreError> {
        Ok(self.write()?.delete_session(session_id))
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        Ok(self.write()?.purge_expired_sessions(now))
    }

    async fn upsert_token(&self, record: &OAuthTokenRecord) -> Result<(), StoreError> {
        self.write()?.upsert_token(record);
        Ok(())
    }

    async fn find_token(&self, user: &UserEmail) -> Result<Option<OAuthTokenRecord>, StoreError> {
        Ok(self.read()?.find_token(user))
    }

    async fn delete_token(&self, user: &UserEmail) -> Result<bool, StoreError> {
        Ok(self.write()?.delete_token(user))
    }

    async fn append_history(&self, record: &FormHistoryRecord) -> Result<(), StoreError> {
        self.write()?.append_history(record);
        Ok(())
    }

    async fn list_history(
        &self,
        user: &UserEmail,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<FormHistoryRecord>, StoreError> {
        Ok(self.read()?.list_history(user, skip, limit))
    }

    async fn count_history(&self, user: &UserEmail) -> Result<usize, StoreError> {
        Ok(self.read()?.count_history(user))
    }

    async fn find_settings(&self, user: &UserEmail) -> Result<Option<UserSettings>, StoreError> {
        Ok(self.read()?.find_settings(user))
    }

    async fn set_setting(
        &self,
        user: &UserEmail,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), StoreError> {
        self.write()?.set_setting(user, key, value);
        Ok(())
    }
}
