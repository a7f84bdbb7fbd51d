//! Server-side CSRF state for the sign-in redirect.
//!
//! Every login issues a fresh state nonce and remembers it here. The callback
//! must present a state that was issued, has not expired and has not been
//! used; anything else is rejected before the authorization code is touched.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::crypto::random_url_token;

/// How long an issued state stays redeemable, in minutes.
pub const DEFAULT_STATE_TTL_MINUTES: i64 = 10;

const STATE_BYTES: usize = 32;

/// Issued, not-yet-redeemed login states.
#[derive(Debug)]
pub struct PendingStates {
    states: Mutex<HashMap<String, DateTime<Utc>>>,
    ttl: Duration,
}

impl PendingStates {
    pub fn new() -> Self {
        Self::with_ttl(Duration::minutes(DEFAULT_STATE_TTL_MINUTES))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Issue a new state and remember it.
    pub fn issue(&self) -> String {
        let now = Utc::now();
        let state = random_url_token(STATE_BYTES);

        let mut states = self.states.lock();
        states.retain(|_, expires_at| *expires_at > now);
        states.insert(state.clone(), now + self.ttl);

        state
    }

    /// Redeem a state. Each issued state can be redeemed at most once.
    pub fn consume(&self, state: &str) -> bool {
        match self.states.lock().remove(state) {
            Some(expires_at) => expires_at > Utc::now(),
            None => false,
        }
    }

    /// Number of states currently outstanding.
    pub fn len(&self) -> usize {
        self.states.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PendingStates {
    fn default() -> Self {
        Self::new()
    }
}
