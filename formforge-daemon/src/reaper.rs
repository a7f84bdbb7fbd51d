//! Periodic removal of expired sessions.
//!
//! Session reads never delete; expired sessions stay in the store until this
//! task sweeps them.

use chrono::Utc;
use formforge_core::{CredentialStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Delete every session whose expiry has passed. Returns how many were removed.
pub async fn reap_expired_sessions(store: &dyn CredentialStore) -> Result<usize, StoreError> {
    let purged = store.purge_expired_sessions(Utc::now()).await?;
    if purged > 0 {
        info!("Purged {} expired session(s)", purged);
    } else {
        debug!("No expired sessions to purge");
    }
    Ok(purged)
}

/// Sweep expired sessions every `interval` until the handle is aborted.
pub fn spawn_session_reaper(store: Arc<dyn CredentialStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = reap_expired_sessions(store.as_ref()).await {
                warn!("Session sweep failed: {}", e);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use formforge_core::{MemoryStore, Session, SessionId, UserEmail};

    fn session(id: &str, expires_in: ChronoDuration) -> Session {
        let now = Utc::now();
        Session {
            session_id: SessionId::new(id),
            user_email: UserEmail::new("ada@example.com"),
            created_at: now,
            expires_at: now + expires_in,
        }
    }

    async fn seeded() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_session(&session("expired", ChronoDuration::minutes(-1)))
            .await
            .unwrap();
        store
            .insert_session(&session("live", ChronoDuration::hours(1)))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_reap_removes_only_expired() {
        let store = seeded().await;

        assert_eq!(reap_expired_sessions(store.as_ref()).await.unwrap(), 1);
        assert!(store.find_session(&SessionId::new("expired")).await.unwrap().is_none());
        assert!(store.find_session(&SessionId::new("live")).await.unwrap().is_some());

        assert_eq!(reap_expired_sessions(store.as_ref()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_spawned_reaper_sweeps() {
        let store = seeded().await;

        let handle = spawn_session_reaper(store.clone(), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert!(store.find_session(&SessionId::new("expired")).await.unwrap().is_none());
        assert!(store.find_session(&SessionId::new("live")).await.unwrap().is_some());
    }
}
