//! JSON-document credential store.
//!
//! All four collections live in one JSON file that is loaded at open and
//! rewritten after every mutation.
//!
//! # Storage Location
//!
//! The default file is `store.json` in the platform data directory
//! (`~/.local/share/formforge` on Linux).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::data::Collections;
use super::{CredentialStore, StoreError};
use crate::model::{
    FormHistoryRecord, OAuthTokenRecord, Session, SessionId, UserEmail, UserSettings,
};

const STORE_FORMAT_VERSION: u32 = 1;

/// On-disk format.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreDocument {
    /// Version of the store format (for future migrations).
    version: u32,

    #[serde(flatten)]
    collections: Collections,
}

/// Disk-backed credential store.
///
/// # Thread Safety
///
/// Mutations hold the write lock until the file has been rewritten, so
/// concurrent writers are serialized. Memory only changes once the file
/// write has succeeded.
pub struct FileStore {
    path: PathBuf,
    data: RwLock<Collections>,
}

impl FileStore {
    /// Get the default storage path.
    pub fn default_path() -> Result<PathBuf, StoreError> {
        let dirs = directories::ProjectDirs::from("com", "raibid-labs", "formforge").ok_or_else(
            || StoreError::BackendError {
                message: "data directory not available".to_string(),
            },
        )?;

        Ok(dirs.data_dir().join("store.json"))
    }

    /// Open the store at the default location.
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(Self::default_path()?)
    }

    /// Open the store at a specific path.
    ///
    /// Creates parent directories if they don't exist. A missing file starts
    /// an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let collections = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            if contents.trim().is_empty() {
                Collections::default()
            } else {
                let doc: StoreDocument = serde_json::from_str(&contents)?;
                if doc.version != STORE_FORMAT_VERSION {
                    return Err(StoreError::UnsupportedVersion { found: doc.version });
                }
                doc.collections
            }
        } else {
            Collections::default()
        };

        tracing::debug!("Opened credential store at {:?}", path);

        Ok(Self {
            path,
            data: RwLock::new(collections),
        })
    }

    /// Get the storage path for this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Collections>, StoreError> {
        self.data.read().map_err(|e| StoreError::BackendError {
            message: format!("read lock poisoned: {}", e),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Collections>, StoreError> {
        self.data.write().map_err(|e| StoreError::BackendError {
            message: format!("write lock poisoned: {}", e),
        })
    }

    /// Apply a mutation to a copy, persist it, then publish it while still
    /// holding the lock. A failed write leaves the in-memory state untouched.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Collections) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut data = self.write()?;
        let mut next = data.clone();
        let out = f(&mut next)?;
        self.save(&next)?;
        *data = next;
        Ok(out)
    }

    fn save(&self, collections: &Collections) -> Result<(), StoreError> {
        let doc = StoreDocument {
            version: STORE_FORMAT_VERSION,
            collections: collections.clone(),
        };
        let contents = serde_json::to_string_pretty(&doc)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore").field("path", &self.path).finish()
    }
}

#[async_trait]
impl CredentialStore for FileStore {
    async fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
        self.mutate(|c| c.insert_session(session))
    }

    async fn find_session(&self, session_id: &SessionId) -> Result<Option<Session>, StoreError> {
        Ok(self.read()?.find_session(session_id))
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<bool, StoreError> {
        self.mutate(|c| Ok(c.delete_session(session_id)))
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        self.mutate(|c| Ok(c.purge_expired_sessions(now)))
    }

    async fn upsert_token(&self, record: &OAuthTokenRecord) -> Result<(), StoreError> {
        self.mutate(|c| {
            c.upsert_token(record);
            Ok(())
        })
    }

    async fn find_token(&self, user: &UserEmail) -> Result<Option<OAuthTokenRecord>, StoreError> {
        Ok(self.read()?.find_token(user))
    }

    async fn delete_token(&self, user: &UserEmail) -> Result<bool, StoreError> {
        self.mutate(|c| Ok(c.delete_token(user)))
    }

    async fn append_history(&self, record: &FormHistoryRecord) -> Result<(), StoreError> {
        self.mutate(|c| {
            c.append_history(record);
            Ok(())
        })
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
        self.mutate(|c| {
            c.set_setting(user, key, value);
            Ok(())
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let _guard = self.read()?;
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
                Err(StoreError::BackendError {
                    message: format!("store directory {:?} is missing", parent),
                })
            }
            _ => Ok(()),
        }
    }
}
