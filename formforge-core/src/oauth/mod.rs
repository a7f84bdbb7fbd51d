//! OAuth 2.0 identity provider integration.
//!
//! This module provides:
//! - [`IdentityProvider`] - The boundary the auth flow and token manager talk to
//! - [`GoogleIdentityProvider`] - Authorization-code flow against Google
//! - [`state::PendingStates`] - Server-side CSRF state bookkeeping

pub mod state;

use async_trait::async_trait;
use oauth2::basic::{BasicClient, BasicErrorResponse};
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, RefreshToken,
    RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

use crate::model::UserEmail;
use crate::provider::ProviderConfig;
use crate::store::Secret;
use crate::token::{RefreshedToken, TokenError, TokenGrant, lifetime_from_std};

/// Per-call deadline for token and userinfo requests.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// OAuth client registration.
#[derive(Debug, Clone)]
pub struct OAuthClientCredentials {
    pub client_id: String,
    pub client_secret: Secret,
    pub redirect_uri: String,
}

/// The identity provider boundary.
///
/// Covers authorization-URL construction and the two token exchanges
/// (code for tokens, refresh token for a new access token), plus the profile
/// lookup that yields the user's identity key.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Build the URL the user visits to grant access.
    ///
    /// Requests offline access with forced consent so a refresh token is issued.
    fn authorization_url(&self, state: &str) -> Result<String, TokenError>;

    /// Exchange an authorization code for tokens.
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, TokenError>;

    /// Obtain a new access token with a refresh token.
    ///
    /// A provider rejection must surface as [`TokenError::RefreshRejected`].
    async fn refresh(&self, refresh_token: &Secret) -> Result<RefreshedToken, TokenError>;

    /// Look up the email of the user an access token belongs to.
    async fn fetch_user_email(&self, access_token: &Secret) -> Result<UserEmail, TokenError>;
}

/// Create an OAuth2 client from a provider configuration.
///
/// # Arguments
///
/// * `config` - Provider configuration
/// * `credentials` - Client id, secret and redirect URI
///
/// # Returns
///
/// A configured OAuth2 basic client ready for use in flows.
pub fn create_oauth_client(
    config: &ProviderConfig,
    credentials: &OAuthClientCredentials,
) -> Result<BasicClient, TokenError> {
    let auth_url = AuthUrl::new(config.auth_url.clone()).map_err(|e| TokenError::OAuth {
        message: format!("invalid auth URL: {}", e),
    })?;

    let token_url = TokenUrl::new(config.token_url.clone()).map_err(|e| TokenError::OAuth {
        message: format!("invalid token URL: {}", e),
    })?;

    let redirect_url =
        RedirectUrl::new(credentials.redirect_uri.clone()).map_err(|e| TokenError::OAuth {
            message: format!("invalid redirect URL: {}", e),
        })?;

    let client = BasicClient::new(
        ClientId::new(credentials.client_id.clone()),
        Some(ClientSecret::new(
            credentials.client_secret.expose().to_string(),
        )),
        auth_url,
        Some(token_url),
    )
    .set_redirect_uri(redirect_url);

    Ok(client)
}

/// Google sign-in via the authorization-code flow.
pub struct GoogleIdentityProvider {
    client: BasicClient,
    scopes: Vec<String>,
    userinfo_url: String,
    http: reqwest::Client,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
}

impl GoogleIdentityProvider {
    /// Create a provider from endpoint configuration and client credentials.
    pub fn new(
        config: &ProviderConfig,
        credentials: &OAuthClientCredentials,
    ) -> Result<Self, TokenError> {
        let timeout = Duration::from_secs(REQUEST_TIMEOUT_SECS);
        Ok(Self {
            client: create_oauth_client(config, credentials)?,
            scopes: config.scopes.clone(),
            userinfo_url: config.userinfo_url.clone(),
            http: http_client(timeout)?,
            timeout,
        })
    }

    /// Replace the per-call deadline for provider requests.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, TokenError> {
        self.http = http_client(timeout)?;
        self.timeout = timeout;
        Ok(self)
    }

    /// Bound a token endpoint call by the configured deadline.
    async fn deadline<T>(&self, call: impl Future<Output = T>) -> Result<T, TokenError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| TokenError::Network {
                message: format!("token request timed out after {:?}", self.timeout),
            })
    }
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, TokenError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| TokenError::Network {
            message: format!("failed to build HTTP client: {}", e),
        })
}

#[async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    fn authorization_url(&self, state: &str) -> Result<String, TokenError> {
        let mut request = self
            .client
            .authorize_url(|| CsrfToken::new(state.to_string()));

        for scope in &self.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }

        let (url, _) = request
            .add_extra_param("access_type", "offline")
            .add_extra_param("include_granted_scopes", "true")
            .add_extra_param("prompt", "consent")
            .url();

        Ok(url.to_string())
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant, TokenError> {
        let request = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(async_http_client);
        let response = self
            .deadline(request)
            .await?
            .map_err(|e| match e {
                RequestTokenError::ServerResponse(resp) => TokenError::OAuth {
                    message: format!("code exchange rejected: {}", describe_error_response(&resp)),
                },
                other => transport_error(other),
            })?;

        Ok(TokenGrant {
            access_token: Secret::new(response.access_token().secret().as_str()),
            refresh_token: response
                .refresh_token()
                .map(|t| Secret::new(t.secret().as_str())),
            expires_in: lifetime_from_std(response.expires_in()),
        })
    }

    async fn refresh(&self, refresh_token: &Secret) -> Result<RefreshedToken, TokenError> {
        let refresh_token = RefreshToken::new(refresh_token.expose().to_string());
        let request = self
            .client
            .exchange_refresh_token(&refresh_token)
            .request_async(async_http_client);
        let response = self
            .deadline(request)
            .await?
            .map_err(|e| match e {
                RequestTokenError::ServerResponse(resp) => TokenError::RefreshRejected {
                    message: describe_error_response(&resp),
                },
                other => transport_error(other),
            })?;

        Ok(RefreshedToken {
            access_token: Secret::new(response.access_token().secret().as_str()),
            expires_in: lifetime_from_std(response.expires_in()),
        })
    }

    async fn fetch_user_email(&self, access_token: &Secret) -> Result<UserEmail, TokenError> {
        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(access_token.expose())
            .send()
            .await
            .map_err(|e| TokenError::Network {
                message: format!("userinfo request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TokenError::OAuth {
                message: format!("userinfo request returned {}", status),
            });
        }

        let info: UserInfo = response.json().await.map_err(|e| TokenError::OAuth {
            message: format!("unparsable userinfo response: {}", e),
        })?;

        info.email
            .filter(|email| !email.trim().is_empty())
            .map(UserEmail::new)
            .ok_or(TokenError::MissingUserInfo)
    }
}

fn describe_error_response(resp: &BasicErrorResponse) -> String {
    match resp.error_description() {
        Some(description) => format!("{}: {}", resp.error().as_ref(), description),
        None => resp.error().as_ref().to_string(),
    }
}

fn transport_error<RE: std::error::Error + 'static>(
    err: RequestTokenError<RE, BasicErrorResponse>,
) -> TokenError {
    match err {
        RequestTokenError::Request(e) => TokenError::Network {
            message: format!("token request failed: {}", e),
        },
        RequestTokenError::Parse(e, _) => TokenError::OAuth {
            message: format!("unparsable token response: {}", e),
        },
        RequestTokenError::Other(message) => TokenError::OAuth { message },
        RequestTokenError::ServerResponse(resp) => TokenError::OAuth {
            message: describe_error_response(&resp),
        },
    }
}
