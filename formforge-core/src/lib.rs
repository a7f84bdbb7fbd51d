//! # Formforge Core
//!
//! Core library for Formforge: turns a natural-language prompt into a Google
//! Form on behalf of a signed-in user.
//!
//! This crate provides:
//! - Encryption of credentials at rest ([`TokenCipher`])
//! - Persistence traits and backends ([`CredentialStore`], [`MemoryStore`], [`FileStore`])
//! - Sessions ([`SessionManager`]) and OAuth token lifecycle ([`DefaultTokenManager`])
//! - Prompt to schema generation with bounded retry ([`SchemaGenerator`])
//! - Schema to form construction ([`FormBuilder`])
//! - Request-level services wired into an [`AppContext`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use formforge_core::{AppContext, CoreConfig, FileStore, SessionId};
//! use std::sync::Arc;
//!
//! let store = Arc::new(FileStore::open_default()?);
//! let context = AppContext::google(&config, store)?;
//!
//! let form = context
//!     .forms()
//!     .generate_form(Some(&SessionId::new(cookie_value)), "A short RSVP form")
//!     .await?;
//! println!("{}", form.form_url);
//! ```

pub mod auth;
pub mod context;
pub mod crypto;
pub mod error;
pub mod forms;
pub mod generation;
pub mod model;
pub mod oauth;
pub mod provider;
pub mod schema;
pub mod service;
pub mod session;
pub mod store;
pub mod token;
pub mod token_manager;

// Re-export commonly used types at crate root
pub use model::{
    FormHistoryRecord,
    OAuthTokenRecord,
    Session,
    SessionId,
    UsageStats,
    UserEmail,
    UserSettings,
};

pub use store::{
    CredentialStore,
    FileStore,
    MemoryStore,
    Secret,
    StoreError,
};

pub use crypto::{CryptoError, TokenCipher};

pub use session::{SessionCookie, SessionManager};

pub use token::{
    AccessToken,
    TokenError,
    TokenManager,
};

pub use token_manager::DefaultTokenManager;

pub use oauth::{GoogleIdentityProvider, IdentityProvider, OAuthClientCredentials};

pub use provider::ProviderConfig;

pub use schema::{FormQuestion, FormSchema, QuestionType, SchemaError};

pub use generation::{GeminiClient, GenerationError, SchemaGenerator, TextGenerator};

pub use forms::{CreatedForm, FormBuilder, FormError, FormsApi, GoogleFormsClient};

pub use auth::{AuthError, AuthService, AuthStatus, LoginOutcome, LoginRedirect};

pub use service::{FormService, GeneratedForm, KeyStatus, SaveOutcome, SettingsService};

pub use context::{AppContext, Collaborators, CoreConfig, HealthReport, StoreHealth};

pub use error::FormforgeError;
