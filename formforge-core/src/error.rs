//! Top-level error types for Formforge.
//!
//! Component errors are translated into [`FormforgeError`] at the service
//! boundary. Callers only need to distinguish the kinds below; in particular
//! [`FormforgeError::is_unauthorized`] covers every case that should send the
//! user back through sign-in.

use thiserror::Error;

use crate::auth::AuthError;
use crate::crypto::CryptoError;
use crate::forms::FormError;
use crate::generation::GenerationError;
use crate::store::StoreError;
use crate::token::TokenError;

/// Top-level error type encompassing all Formforge errors.
#[derive(Debug, Error)]
pub enum FormforgeError {
    /// No session, or no stored tokens for the session's user.
    #[error("not authenticated: {message}")]
    NotAuthenticated { message: String },

    /// The provider rejected the refresh token.
    #[error("re-authentication required: {message}")]
    ReauthenticationRequired { message: String },

    /// Stored ciphertext could not be decrypted.
    #[error("stored credentials unreadable: {0}")]
    Crypto(#[from] CryptoError),

    /// No valid schema could be generated for the prompt.
    #[error("form generation failed: {message}")]
    GenerationFailure { message: String },

    /// Input or schema failed a structural check.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A downstream provider failed.
    #[error("external service error: {message}")]
    ExternalService { message: String },

    /// The sign-in callback carried an unknown, expired or reused state.
    #[error("invalid sign-in state")]
    InvalidAuthState,

    /// Error from the credential store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl FormforgeError {
    pub fn not_authenticated(message: impl Into<String>) -> Self {
        Self::NotAuthenticated {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Whether the user should be sent back through sign-in.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::NotAuthenticated { .. }
                | Self::ReauthenticationRequired { .. }
                | Self::Crypto(_)
                | Self::InvalidAuthState
        )
    }
}

impl From<TokenError> for FormforgeError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::NotFound { .. } => Self::not_authenticated("no stored credentials"),
            TokenError::RefreshRejected { message } => Self::ReauthenticationRequired { message },
            TokenError::Crypto(e) => Self::Crypto(e),
            TokenError::Storage(e) => Self::Store(e),
            TokenError::Network { message } | TokenError::OAuth { message } => {
                Self::ExternalService { message }
            }
            TokenError::MissingUserInfo => Self::ExternalService {
                message: "identity provider did not return a user email".to_string(),
            },
        }
    }
}

impl From<AuthError> for FormforgeError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidState => Self::InvalidAuthState,
            AuthError::MissingRefreshToken => Self::ExternalService {
                message: "identity provider did not return a refresh token".to_string(),
            },
            AuthError::Token(e) => e.into(),
            AuthError::Store(e) => Self::Store(e),
        }
    }
}

impl From<GenerationError> for FormforgeError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::MissingApiKey => Self::Config {
                message: "no generation API key configured".to_string(),
            },
            other => Self::GenerationFailure {
                message: format!("{}; try rephrasing the prompt", other),
            },
        }
    }
}

impl From<FormError> for FormforgeError {
    fn from(err: FormError) -> Self {
        match err {
            FormError::Validation { message } => Self::Validation { message },
            FormError::ExternalService { message } => Self::ExternalService { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_errors_map_to_taxonomy() {
        let err: FormforgeError = TokenError::NotFound {
            user: "a@example.com".to_string(),
        }
        .into();
        assert!(matches!(err, FormforgeError::NotAuthenticated { .. }));
        assert!(err.is_unauthorized());

        let err: FormforgeError = TokenError::RefreshRejected {
            message: "invalid_grant".to_string(),
        }
        .into();
        assert!(matches!(err, FormforgeError::ReauthenticationRequired { .. }));
        assert!(err.is_unauthorized());

        let err: FormforgeError = TokenError::Crypto(CryptoError::DecryptFailed).into();
        assert!(err.is_unauthorized());

        let err: FormforgeError = TokenError::Network {
            message: "timeout".to_string(),
        }
        .into();
        assert!(matches!(err, FormforgeError::ExternalService { .. }));
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn test_auth_errors_map_to_taxonomy() {
        let err: FormforgeError = AuthError::InvalidState.into();
        assert!(matches!(err, FormforgeError::InvalidAuthState));
        assert!(err.is_unauthorized());

        let err: FormforgeError = AuthError::Token(TokenError::MissingUserInfo).into();
        assert!(matches!(err, FormforgeError::ExternalService { .. }));
    }

    #[test]
    fn test_generation_and_form_errors() {
        let err: FormforgeError = GenerationError::Exhausted {
            attempts: 3,
            last_failure: "not JSON".to_string(),
        }
        .into();
        assert!(matches!(err, FormforgeError::GenerationFailure { .. }));
        assert!(err.to_string().contains("rephras"));

        let err: FormforgeError = FormError::Validation {
            message: "no options".to_string(),
        }
        .into();
        assert!(matches!(err, FormforgeError::Validation { .. }));
    }
}
