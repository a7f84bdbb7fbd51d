//! Test to verify JSON-RPC 2.0 error response format compliance.
//!
//! This test checks that error responses follow the JSON-RPC 2.0 specification:
//! - Must have `"jsonrpc": "2.0"`
//! - Must have `error` object with `code` (integer) and `message` (string)
//! - Must echo the `id` from the request
//! - Application errors carry the daemon's own codes and no secret material

use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::time::{Duration, sleep};

use formforge_core::{AppContext, CoreConfig, MemoryStore, OAuthClientCredentials, Secret};
use formforge_daemon::api::{ApiState, start_server};

/// Detect whether the sandbox allows binding Unix sockets. Skip tests if not.
fn can_bind_unix_socket() -> bool {
    let path = std::env::temp_dir().join("formforge-socket-permission-check.sock");
    let _ = fs::remove_file(&path);
    let result = std::os::unix::net::UnixListener::bind(&path);
    let ok = result.is_ok();
    let _ = fs::remove_file(&path);
    ok
}

/// Helper to send raw JSON-RPC request and get raw response.
/// Creates a fresh connection for each request to avoid stream state issues.
async fn send_raw_request(socket_path: &Path, request: &str) -> Value {
    let mut stream = UnixStream::connect(socket_path).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    stream.write_all(b"\n").await.unwrap();
    stream.flush().await.unwrap();

    let (reader, _writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut response_str = String::new();
    reader.read_line(&mut response_str).await.unwrap();

    serde_json::from_str(&response_str).unwrap()
}

fn assert_error(response: &Value, id: Value, code: i64) {
    assert_eq!(response["jsonrpc"], json!("2.0"), "Must have 'jsonrpc': '2.0' field");
    assert_eq!(response["id"], id, "Must echo the request id");
    assert!(response.get("result").is_none());

    let error = response.get("error").expect("Must have 'error' field");
    assert_eq!(error["code"].as_i64(), Some(code), "unexpected code in {}", response);
    assert!(error["message"].is_string(), "Error must have 'message' field");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_jsonrpc_error_format_compliance() {
    if !can_bind_unix_socket() {
        eprintln!("Skipping test_jsonrpc_error_format_compliance: Unix sockets not permitted");
        return;
    }

    let temp_dir = tempfile::tempdir().unwrap();
    let socket_path = temp_dir.path().join("error-format.sock");

    let config = CoreConfig::new(
        OAuthClientCredentials {
            client_id: "test-client-id".to_string(),
            client_secret: Secret::new("test-client-secret"),
            redirect_uri: "http://localhost:8000/api/auth/callback".to_string(),
        },
        Secret::new("test-secret-key"),
        Secret::new("default-gemini-key"),
    );
    let context = AppContext::google(&config, Arc::new(MemoryStore::new())).unwrap();
    let handle = start_server(&socket_path, ApiState::new(Arc::new(context)))
        .await
        .unwrap();
    sleep(Duration::from_millis(100)).await;

    // Parse error (invalid JSON)
    let response = send_raw_request(&socket_path, "{invalid json}").await;
    assert_error(&response, Value::Null, -32700);

    // Invalid request (missing method)
    let request = json!({"jsonrpc": "2.0", "params": [], "id": 42});
    let response = send_raw_request(&socket_path, &request.to_string()).await;
    assert_error(&response, json!(42), -32600);

    // Method not found
    let request = json!({"jsonrpc": "2.0", "method": "get_token", "params": [], "id": 100});
    let response = send_raw_request(&socket_path, &request.to_string()).await;
    assert_error(&response, json!(100), -32601);

    // Invalid params: callback without a state
    let request = json!({
        "jsonrpc": "2.0",
        "method": "auth_callback",
        "params": ["only-a-code"],
        "id": 200
    });
    let response = send_raw_request(&socket_path, &request.to_string()).await;
    assert_error(&response, json!(200), -32602);

    // Invalid params: wrong type
    let request = json!({
        "jsonrpc": "2.0",
        "method": "history",
        "params": [null, "ten"],
        "id": 201
    });
    let response = send_raw_request(&socket_path, &request.to_string()).await;
    assert_error(&response, json!(201), -32602);

    // Application error: not signed in
    let request = json!({
        "jsonrpc": "2.0",
        "method": "set_gemini_key",
        "params": {"session_id": "missing", "api_key": "user-secret-key"},
        "id": "string-id"
    });
    let response = send_raw_request(&socket_path, &request.to_string()).await;
    assert_error(&response, json!("string-id"), -32001);
    assert!(!response.to_string().contains("user-secret-key"));

    handle.stop().await.unwrap();
}
