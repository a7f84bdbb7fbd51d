//! JSON-RPC API handlers for the daemon.

use formforge_core::{AppContext, FormforgeError, Secret, SessionId};
use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::{ErrorCode, ErrorObject};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::types::{
    AuthStatus, CallbackResponse, GeneratedForm, HealthReport, HistoryResponse, KeyStatus,
    LoginRedirect, LogoutResponse, SaveKeyResponse, UsageStats,
};

/// The caller must sign in (again).
pub const UNAUTHORIZED_CODE: i32 = -32001;

/// No valid form schema could be generated.
pub const GENERATION_FAILED_CODE: i32 = -32002;

/// A downstream provider failed.
pub const EXTERNAL_SERVICE_CODE: i32 = -32003;

/// State shared across RPC handlers.
#[derive(Clone)]
pub struct ApiState {
    pub context: Arc<AppContext>,
}

impl ApiState {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }
}

/// JSON-RPC API trait definition.
#[rpc(server)]
pub trait FormforgeApi {
    /// Start sign-in: returns the provider URL and the issued state.
    #[method(name = "auth_login")]
    async fn auth_login(&self) -> RpcResult<LoginRedirect>;

    /// Complete sign-in with the code and state the provider redirected with.
    #[method(name = "auth_callback")]
    async fn auth_callback(&self, code: String, state: String) -> RpcResult<CallbackResponse>;

    #[method(name = "auth_status")]
    async fn auth_status(&self, session_id: Option<String>) -> RpcResult<AuthStatus>;

    /// End the session and forget the user's tokens. Always succeeds.
    #[method(name = "auth_logout")]
    async fn auth_logout(&self, session_id: Option<String>) -> RpcResult<LogoutResponse>;

    /// Generate a form from a natural-language prompt.
    #[method(name = "generate_form")]
    async fn generate_form(
        &self,
        session_id: Option<String>,
        prompt: String,
    ) -> RpcResult<GeneratedForm>;

    /// List generated forms, newest first.
    #[method(name = "history")]
    async fn history(
        &self,
        session_id: Option<String>,
        skip: Option<usize>,
        limit: Option<usize>,
    ) -> RpcResult<HistoryResponse>;

    #[method(name = "stats")]
    async fn stats(&self, session_id: Option<String>) -> RpcResult<UsageStats>;

    /// Save the caller's own generation key.
    #[method(name = "set_gemini_key")]
    async fn set_gemini_key(
        &self,
        session_id: Option<String>,
        api_key: String,
    ) -> RpcResult<SaveKeyResponse>;

    #[method(name = "gemini_key_status")]
    async fn gemini_key_status(&self, session_id: Option<String>) -> RpcResult<KeyStatus>;

    #[method(name = "health")]
    async fn health(&self) -> RpcResult<HealthReport>;
}

/// Implementation of the Formforge API.
pub struct FormforgeApiImpl {
    state: ApiState,
}

impl FormforgeApiImpl {
    /// Create a new API implementation with the given state.
    pub fn new(state: ApiState) -> Self {
        Self { state }
    }

    fn context(&self) -> &AppContext {
        &self.state.context
    }
}

fn session(session_id: Option<String>) -> Option<SessionId> {
    session_id
        .filter(|id| !id.trim().is_empty())
        .map(SessionId::new)
}

#[async_trait::async_trait]
impl FormforgeApiServer for FormforgeApiImpl {
    async fn auth_login(&self) -> RpcResult<LoginRedirect> {
        debug!("RPC: auth_login");
        self.context()
            .auth()
            .login()
            .map_err(|e| rpc_error(e.into()))
    }

    async fn auth_callback(&self, code: String, state: String) -> RpcResult<CallbackResponse> {
        info!("RPC: auth_callback");
        let outcome = self
            .context()
            .auth()
            .callback(&code, &state)
            .await
            .map_err(|e| rpc_error(e.into()))?;
        Ok(outcome.into())
    }

    async fn auth_status(&self, session_id: Option<String>) -> RpcResult<AuthStatus> {
        debug!("RPC: auth_status");
        self.context()
            .auth()
            .status(session(session_id).as_ref())
            .await
            .map_err(|e| rpc_error(e.into()))
    }

    async fn auth_logout(&self, session_id: Option<String>) -> RpcResult<LogoutResponse> {
        info!("RPC: auth_logout");
        let set_cookie = self
            .context()
            .auth()
            .logout(session(session_id).as_ref())
            .await
            .map_err(|e| rpc_error(e.into()))?;
        Ok(LogoutResponse {
            message: "Logged out successfully".to_string(),
            set_cookie,
        })
    }

    async fn generate_form(
        &self,
        session_id: Option<String>,
        prompt: String,
    ) -> RpcResult<GeneratedForm> {
        info!("RPC: generate_form ({} chars)", prompt.len());
        self.context()
            .forms()
            .generate_form(session(session_id).as_ref(), &prompt)
            .await
            .map_err(rpc_error)
    }

    async fn history(
        &self,
        session_id: Option<String>,
        skip: Option<usize>,
        limit: Option<usize>,
    ) -> RpcResult<HistoryResponse> {
        debug!("RPC: history(skip: {:?}, limit: {:?})", skip, limit);
        let forms = self
            .context()
            .forms()
            .history(session(session_id).as_ref(), skip.unwrap_or(0), limit)
            .await
            .map_err(rpc_error)?;
        Ok(HistoryResponse { forms })
    }

    async fn stats(&self, session_id: Option<String>) -> RpcResult<UsageStats> {
        debug!("RPC: stats");
        self.context()
            .forms()
            .stats(session(session_id).as_ref())
            .await
            .map_err(rpc_error)
    }

    async fn set_gemini_key(
        &self,
        session_id: Option<String>,
        api_key: String,
    ) -> RpcResult<SaveKeyResponse> {
        info!("RPC: set_gemini_key");
        let status = self
            .context()
            .settings()
            .set_gemini_key(session(session_id).as_ref(), &Secret::new(api_key))
            .await
            .map_err(rpc_error)?;
        Ok(SaveKeyResponse { status })
    }

    async fn gemini_key_status(&self, session_id: Option<String>) -> RpcResult<KeyStatus> {
        debug!("RPC: gemini_key_status");
        self.context()
            .settings()
            .gemini_key_status(session(session_id).as_ref())
            .await
            .map_err(rpc_error)
    }

    async fn health(&self) -> RpcResult<HealthReport> {
        debug!("RPC: health");
        Ok(self.context().health().await)
    }
}

/// Translate an error into a JSON-RPC error object.
///
/// Messages come from the error's `Display`, which never includes secrets.
pub fn rpc_error(err: FormforgeError) -> ErrorObject<'static> {
    let code = match &err {
        e if e.is_unauthorized() => UNAUTHORIZED_CODE,
        FormforgeError::Validation { .. } => ErrorCode::InvalidParams.code(),
        FormforgeError::GenerationFailure { .. } => GENERATION_FAILED_CODE,
        FormforgeError::ExternalService { .. } => EXTERNAL_SERVICE_CODE,
        _ => {
            warn!("RPC internal error: {}", err);
            ErrorCode::InternalError.code()
        }
    };

    ErrorObject::owned(code, err.to_string(), None::<()>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use formforge_core::StoreError;

    #[test]
    fn test_error_codes() {
        let cases = [
            (FormforgeError::not_authenticated("no session"), -32001),
            (
                FormforgeError::ReauthenticationRequired {
                    message: "revoked".to_string(),
                },
                -32001,
            ),
            (FormforgeError::InvalidAuthState, -32001),
            (FormforgeError::validation("prompt is empty"), -32602),
            (
                FormforgeError::GenerationFailure {
                    message: "exhausted".to_string(),
                },
                -32002,
            ),
            (
                FormforgeError::ExternalService {
                    message: "forms api returned 500".to_string(),
                },
                -32003,
            ),
            (
                FormforgeError::Config {
                    message: "no generation API key configured".to_string(),
                },
                -32603,
            ),
            (
                FormforgeError::Store(StoreError::BackendError {
                    message: "down".to_string(),
                }),
                -32603,
            ),
        ];

        for (err, code) in cases {
            let message = err.to_string();
            let object = rpc_error(err);
            assert_eq!(object.code(), code, "{}", message);
            assert_eq!(object.message(), message);
        }
    }

    #[test]
    fn test_blank_session_is_no_session() {
        assert!(session(None).is_none());
        assert!(session(Some("  ".to_string())).is_none());
        assert_eq!(
            session(Some("abc".to_string())).map(|s| s.as_str().to_string()),
            Some("abc".to_string())
        );
    }
}
