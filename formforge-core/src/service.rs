//! Request-level operations behind a session.
//!
//! - [`FormService`] - generate a form from a prompt, list history, usage stats
//! - [`SettingsService`] - per-user generation key
//!
//! Every operation resolves the caller's session first; a missing or expired
//! session is [`FormforgeError::NotAuthenticated`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::crypto::TokenCipher;
use crate::error::FormforgeError;
use crate::forms::FormBuilder;
use crate::generation::SchemaGenerator;
use crate::model::{
    FormHistoryRecord, GEMINI_API_KEY_SETTING, Session, SessionId, UsageStats,
};
use crate::session::SessionManager;
use crate::store::{CredentialStore, Secret};
use crate::token::TokenManager;

/// Default page size for history listings.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Largest page size for history listings.
pub const MAX_HISTORY_LIMIT: usize = 100;

/// Resolve a session id to a live session.
pub async fn require_session(
    sessions: &SessionManager,
    session_id: Option<&SessionId>,
) -> Result<Session, FormforgeError> {
    let Some(id) = session_id else {
        return Err(FormforgeError::not_authenticated("no session"));
    };

    sessions
        .get(id)
        .await?
        .ok_or_else(|| FormforgeError::not_authenticated("session missing or expired"))
}

/// A form produced from a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedForm {
    pub form_url: String,
    pub form_id: String,
    pub title: String,
    pub question_count: usize,
    /// False when the form exists but could not be added to history, so it
    /// will be missing from history and stats.
    pub history_recorded: bool,
}

/// Prompt-to-form orchestration and history.
pub struct FormService {
    sessions: Arc<SessionManager>,
    tokens: Arc<dyn TokenManager>,
    generator: Arc<SchemaGenerator>,
    builder: Arc<FormBuilder>,
    store: Arc<dyn CredentialStore>,
}

impl FormService {
    pub fn new(
        sessions: Arc<SessionManager>,
        tokens: Arc<dyn TokenManager>,
        generator: Arc<SchemaGenerator>,
        builder: Arc<FormBuilder>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            sessions,
            tokens,
            generator,
            builder,
            store,
        }
    }

    /// Generate a form from `prompt` and record it in the user's history.
    pub async fn generate_form(
        &self,
        session_id: Option<&SessionId>,
        prompt: &str,
    ) -> Result<GeneratedForm, FormforgeError> {
        let session = require_session(&self.sessions, session_id).await?;
        let user = &session.user_email;

        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(FormforgeError::validation("prompt is empty"));
        }

        let token = self.tokens.get_usable_token(user).await?;

        let settings = self.store.find_settings(user).await?;
        let override_key = settings.as_ref().and_then(|s| s.gemini_api_key());

        let schema = self.generator.generate(prompt, override_key).await?;
        let created = self.builder.build(&token.secret, &schema).await?;

        let record = FormHistoryRecord::new(
            user.clone(),
            created.form_id.clone(),
            created.form_url.clone(),
            schema.title.clone(),
            prompt,
        );
        let history_recorded = match self.store.append_history(&record).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    "Form {} created but not recorded in history: {}",
                    created.form_id,
                    e
                );
                false
            }
        };

        tracing::info!("Generated form {} for {}", created.form_id, user);

        Ok(GeneratedForm {
            form_url: created.form_url,
            form_id: created.form_id,
            title: schema.title,
            question_count: schema.questions.len(),
            history_recorded,
        })
    }

    /// List the user's forms, newest first.
    ///
    /// `limit` defaults to 20 and is clamped to `1..=100`.
    pub async fn history(
        &self,
        session_id: Option<&SessionId>,
        skip: usize,
        limit: Option<usize>,
    ) -> Result<Vec<FormHistoryRecord>, FormforgeError> {
        let session = require_session(&self.sessions, session_id).await?;
        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);

        Ok(self
            .store
            .list_history(&session.user_email, skip, limit)
            .await?)
    }

    /// Usage counters for the user.
    pub async fn stats(&self, session_id: Option<&SessionId>) -> Result<UsageStats, FormforgeError> {
        let session = require_session(&self.sessions, session_id).await?;
        let total_forms = self.store.count_history(&session.user_email).await?;
        Ok(UsageStats { total_forms })
    }
}

/// Result of saving a generation key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveOutcome {
    /// A blank key was submitted; nothing changed.
    Skipped,
    Saved,
}

/// Whether a generation key is available to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStatus {
    /// The user saved a personal key.
    pub is_set: bool,
    /// A process-wide default key is configured.
    pub default_available: bool,
}

/// Per-user settings.
pub struct SettingsService {
    sessions: Arc<SessionManager>,
    store: Arc<dyn CredentialStore>,
    cipher: Arc<TokenCipher>,
    default_available: bool,
}

impl SettingsService {
    pub fn new(
        sessions: Arc<SessionManager>,
        store: Arc<dyn CredentialStore>,
        cipher: Arc<TokenCipher>,
        default_available: bool,
    ) -> Self {
        Self {
            sessions,
            store,
            cipher,
            default_available,
        }
    }

    /// Encrypt and save the user's generation key. A blank key is skipped.
    pub async fn set_gemini_key(
        &self,
        session_id: Option<&SessionId>,
        api_key: &Secret,
    ) -> Result<SaveOutcome, FormforgeError> {
        let session = require_session(&self.sessions, session_id).await?;

        if api_key.is_blank() {
            return Ok(SaveOutcome::Skipped);
        }

        let ciphertext = self.cipher.encrypt(api_key.expose().trim())?;
        self.store
            .set_setting(
                &session.user_email,
                GEMINI_API_KEY_SETTING,
                serde_json::Value::String(ciphertext),
            )
            .await?;

        tracing::info!("Saved generation key for {}", session.user_email);
        Ok(SaveOutcome::Saved)
    }

    /// Report key availability. Callers without a live session see `is_set: false`.
    pub async fn gemini_key_status(
        &self,
        session_id: Option<&SessionId>,
    ) -> Result<KeyStatus, FormforgeError> {
        let session = match session_id {
            Some(id) => self.sessions.get(id).await?,
            None => None,
        };

        let is_set = match session {
            Some(session) => self
                .store
                .find_settings(&session.user_email)
                .await?
                .is_some_and(|s| s.gemini_api_key().is_some()),
            None => false,
        };

        Ok(KeyStatus {
            is_set,
            default_available: self.default_available,
        })
    }
}
