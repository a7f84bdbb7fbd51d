//! Application context.
//!
//! [`AppContext`] is built once at startup and owns every component. There is
//! no global state: the store and the three external services are injected,
//! so tests can substitute fakes or point the HTTP clients at a mock server.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::AuthService;
use crate::crypto::TokenCipher;
use crate::error::FormforgeError;
use crate::forms::{DEFAULT_FORMS_BASE_URL, FormBuilder, FormsApi, GoogleFormsClient};
use crate::generation::{
    DEFAULT_GEMINI_BASE_URL, DEFAULT_MAX_ATTEMPTS, DEFAULT_MODEL, GeminiClient, SchemaGenerator,
    TextGenerator,
};
use crate::oauth::{GoogleIdentityProvider, IdentityProvider, OAuthClientCredentials};
use crate::provider::ProviderConfig;
use crate::session::{DEFAULT_SESSION_TTL_HOURS, SessionCookie, SessionManager};
use crate::service::{FormService, SettingsService};
use crate::store::{CredentialStore, Secret};
use crate::token::TokenManager;
use crate::token_manager::DefaultTokenManager;

/// Settings the core needs, independent of where they were read from.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub oauth: OAuthClientCredentials,
    pub provider: ProviderConfig,
    /// Shared secret the at-rest encryption key is derived from.
    pub secret_key: Secret,
    /// Process-wide generation key.
    pub gemini_api_key: Secret,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub forms_base_url: String,
    pub max_attempts: u32,
    pub session_ttl: Duration,
    pub frontend_url: String,
}

impl CoreConfig {
    /// Configuration with Google endpoints and default tuning.
    pub fn new(
        oauth: OAuthClientCredentials,
        secret_key: Secret,
        gemini_api_key: Secret,
    ) -> Self {
        Self {
            oauth,
            provider: ProviderConfig::google(),
            secret_key,
            gemini_api_key,
            gemini_model: DEFAULT_MODEL.to_string(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            forms_base_url: DEFAULT_FORMS_BASE_URL.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            session_ttl: Duration::hours(DEFAULT_SESSION_TTL_HOURS),
            frontend_url: "http://localhost:3000".to_string(),
        }
    }
}

/// The external collaborators of the core.
pub struct Collaborators {
    pub store: Arc<dyn CredentialStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub generator: Arc<dyn TextGenerator>,
    pub forms: Arc<dyn FormsApi>,
}

/// Store reachability as reported by [`AppContext::health`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreHealth {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub api: String,
    pub store: StoreHealth,
}

fn config_error(err: impl std::fmt::Display) -> FormforgeError {
    FormforgeError::Config {
        message: err.to_string(),
    }
}

/// Every component, wired together.
pub struct AppContext {
    store: Arc<dyn CredentialStore>,
    sessions: Arc<SessionManager>,
    tokens: Arc<dyn TokenManager>,
    auth: AuthService,
    forms: FormService,
    settings: SettingsService,
}

impl AppContext {
    /// Wire the components around injected collaborators.
    pub fn new(config: &CoreConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            store,
            identity,
            generator,
            forms,
        } = collaborators;

        let cipher = Arc::new(TokenCipher::from_secret(&config.secret_key));
        let sessions = Arc::new(SessionManager::with_ttl(store.clone(), config.session_ttl));
        let tokens: Arc<dyn TokenManager> = Arc::new(DefaultTokenManager::new(
            store.clone(),
            cipher.clone(),
            identity.clone(),
        ));

        let schema_generator = SchemaGenerator::new(
            generator,
            cipher.clone(),
            config.gemini_api_key.clone(),
        )
        .with_max_attempts(config.max_attempts);
        let default_available = schema_generator.has_default_key();

        let cookie = SessionCookie::for_frontend(&config.frontend_url, config.session_ttl);

        Self {
            auth: AuthService::new(identity, tokens.clone(), sessions.clone(), cookie),
            forms: FormService::new(
                sessions.clone(),
                tokens.clone(),
                Arc::new(schema_generator),
                Arc::new(FormBuilder::new(forms)),
                store.clone(),
            ),
            settings: SettingsService::new(sessions.clone(), store.clone(), cipher, default_available),
            store,
            sessions,
            tokens,
        }
    }

    /// Wire the components against Google's services.
    pub fn google(
        config: &CoreConfig,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, FormforgeError> {
        let identity = GoogleIdentityProvider::new(&config.provider, &config.oauth)
            .map_err(config_error)?;
        let generator = GeminiClient::with_base_url(&config.gemini_base_url, &config.gemini_model)
            .map_err(config_error)?;
        let forms = GoogleFormsClient::with_base_url(&config.forms_base_url).map_err(config_error)?;

        Ok(Self::new(
            config,
            Collaborators {
                store,
                identity: Arc::new(identity),
                generator: Arc::new(generator),
                forms: Arc::new(forms),
            },
        ))
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn forms(&self) -> &FormService {
        &self.forms
    }

    pub fn settings(&self) -> &SettingsService {
        &self.settings
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn tokens(&self) -> &Arc<dyn TokenManager> {
        &self.tokens
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Report service and store health.
    pub async fn health(&self) -> HealthReport {
        let store = match self.store.ping().await {
            Ok(()) => StoreHealth::Connected,
            Err(e) => {
                tracing::warn!("Store health check failed: {}", e);
                StoreHealth::Disconnected
            }
        };

        HealthReport {
            api: "healthy".to_string(),
            store,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn config() -> CoreConfig {
        CoreConfig::new(
            OAuthClientCredentials {
                client_id: "client".to_string(),
                client_secret: Secret::new("client-secret"),
                redirect_uri: "http://localhost:8000/api/auth/callback".to_string(),
            },
            Secret::new("secret-key"),
            Secret::new("gemini-key"),
        )
    }

    #[tokio::test]
    async fn test_google_context_health() {
        let context = AppContext::google(&config(), Arc::new(MemoryStore::new())).unwrap();
        let report = context.health().await;

        assert_eq!(report.api, "healthy");
        assert_eq!(report.store, StoreHealth::Connected);
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            serde_json::json!({"api": "healthy", "store": "connected"})
        );
    }

    #[tokio::test]
    async fn test_login_url_uses_configured_client() {
        let context = AppContext::google(&config(), Arc::new(MemoryStore::new())).unwrap();
        let redirect = context.auth().login().unwrap();

        assert!(redirect.auth_url.contains("client_id=client"));
        assert!(redirect.auth_url.contains("access_type=offline"));
    }

    #[tokio::test]
    async fn test_invalid_provider_url_is_error() {
        let mut config = config();
        config.provider = config.provider.with_token_url("not a url");

        let result = AppContext::google(&config, Arc::new(MemoryStore::new()));
        assert!(matches!(result, Err(FormforgeError::Config { .. })));
    }
}
