//! JSON-RPC server implementation with Unix socket support.
//!
//! Requests and responses are newline-delimited JSON-RPC 2.0 objects. Params
//! may be positional (an array) or named (an object).

use super::handlers::{ApiState, FormforgeApiImpl, FormforgeApiServer};
use anyhow::{Context, Result};
use jsonrpsee::types::{ErrorCode, ErrorObject};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handle to a running RPC server
pub struct ServerHandle {
    shutdown: Arc<Mutex<Option<tokio::sync::mpsc::Sender<()>>>>,
    join_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

/// Start the JSON-RPC server on a Unix socket.
///
/// A stale socket file at `socket_path` is removed first. The caller removes
/// the socket after [`ServerHandle::stop`].
pub async fn start_server(socket_path: &Path, state: ApiState) -> Result<ServerHandle> {
    if socket_path.exists() {
        warn!("Removing existing socket at {:?}", socket_path);
        std::fs::remove_file(socket_path)
            .with_context(|| format!("Failed to remove existing socket at {:?}", socket_path))?;
    }

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create socket directory {:?}", parent))?;
    }

    info!("Starting JSON-RPC server on {:?}", socket_path);

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("Failed to bind Unix socket at {:?}", socket_path))?;

    let api = Arc::new(FormforgeApiImpl::new(state));

    let (tx, mut rx) = tokio::sync::mpsc::channel::<()>(1);

    let server_task: JoinHandle<()> = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = rx.recv() => {
                    debug!("Server shutdown signal received");
                    break;
                }
                result = listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let api = api.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, api).await {
                                    warn!("Connection handler error: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            warn!("Failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }
    });

    info!("JSON-RPC server started and listening");

    Ok(ServerHandle {
        shutdown: Arc::new(Mutex::new(Some(tx))),
        join_handle: Arc::new(Mutex::new(Some(server_task))),
    })
}

/// Handle a single connection
async fn handle_connection(mut stream: UnixStream, api: Arc<FormforgeApiImpl>) -> Result<()> {
    let (reader, mut writer) = stream.split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;

        if n == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        // Request lines may carry codes and keys; log the method only.
        let response = match serde_json::from_str::<Value>(&line) {
            Ok(request) => process_request(request, &api).await,
            Err(e) => json!({
                "jsonrpc": "2.0",
                "error": {
                    "code": ErrorCode::ParseError.code(),
                    "message": format!("Parse error: {}", e)
                },
                "id": null
            }),
        };

        writer.write_all(response.to_string().as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Process a JSON-RPC request
async fn process_request(request: Value, api: &FormforgeApiImpl) -> Value {
    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let Some(method) = request.get("method").and_then(|m| m.as_str()) else {
        return json!({
            "jsonrpc": "2.0",
            "error": {
                "code": ErrorCode::InvalidRequest.code(),
                "message": "Invalid Request: missing method"
            },
            "id": id
        });
    };

    debug!("RPC request: {}", method);
    let params = Params(request.get("params").cloned().unwrap_or(Value::Null));

    match dispatch(method, &params, api).await {
        Ok(value) => json!({
            "jsonrpc": "2.0",
            "result": value,
            "id": id
        }),
        Err(error) => json!({
            "jsonrpc": "2.0",
            "error": {
                "code": error.code(),
                "message": error.message()
            },
            "id": id
        }),
    }
}

async fn dispatch(
    method: &str,
    params: &Params,
    api: &FormforgeApiImpl,
) -> Result<Value, ErrorObject<'static>> {
    match method {
        "auth_login" => respond(api.auth_login().await),
        "auth_callback" => respond(
            api.auth_callback(params.required(0, "code")?, params.required(1, "state")?)
                .await,
        ),
        "auth_status" => respond(api.auth_status(params.optional(0, "session_id")?).await),
        "auth_logout" => respond(api.auth_logout(params.optional(0, "session_id")?).await),
        "generate_form" => respond(
            api.generate_form(
                params.optional(0, "session_id")?,
                params.required(1, "prompt")?,
            )
            .await,
        ),
        "history" => respond(
            api.history(
                params.optional(0, "session_id")?,
                params.optional(1, "skip")?,
                params.optional(2, "limit")?,
            )
            .await,
        ),
        "stats" => respond(api.stats(params.optional(0, "session_id")?).await),
        "set_gemini_key" => respond(
            api.set_gemini_key(
                params.optional(0, "session_id")?,
                params.required(1, "api_key")?,
            )
            .await,
        ),
        "gemini_key_status" => {
            respond(api.gemini_key_status(params.optional(0, "session_id")?).await)
        }
        "health" => respond(api.health().await),
        _ => Err(ErrorObject::owned(
            ErrorCode::MethodNotFound.code(),
            "Method not found",
            None::<()>,
        )),
    }
}

fn respond<T: Serialize>(
    result: Result<T, ErrorObject<'static>>,
) -> Result<Value, ErrorObject<'static>> {
    let value = result?;
    serde_json::to_value(value).map_err(|e| {
        ErrorObject::owned(
            ErrorCode::InternalError.code(),
            format!("Failed to serialize result: {}", e),
            None::<()>,
        )
    })
}

/// Request params, positional or named.
struct Params(Value);

impl Params {
    fn get(&self, index: usize, name: &str) -> Option<&Value> {
        match &self.0 {
            Value::Array(items) => items.get(index),
            Value::Object(fields) => fields.get(name),
            _ => None,
        }
        .filter(|v| !v.is_null())
    }

    fn optional<T: DeserializeOwned>(
        &self,
        index: usize,
        name: &str,
    ) -> Result<Option<T>, ErrorObject<'static>> {
        self.get(index, name)
            .map(|v| serde_json::from_value(v.clone()).map_err(|_| invalid_params(name)))
            .transpose()
    }

    fn required<T: DeserializeOwned>(
        &self,
        index: usize,
        name: &str,
    ) -> Result<T, ErrorObject<'static>> {
        self.optional(index, name)?
            .ok_or_else(|| invalid_params(name))
    }
}

fn invalid_params(name: &str) -> ErrorObject<'static> {
    ErrorObject::owned(
        ErrorCode::InvalidParams.code(),
        format!("Invalid params: {}", name),
        None::<()>,
    )
}

impl ServerHandle {
    /// Stop accepting connections and wait for the accept loop to exit.
    pub async fn stop(&self) -> Result<()> {
        if let Some(tx) = self.shutdown.lock().await.take() {
            let _ = tx.send(()).await;
        }

        if let Some(handle) = self.join_handle.lock().await.take() {
            handle.await?;
        }

        Ok(())
    }
}
