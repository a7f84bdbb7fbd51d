//! Integration tests for prompt-to-schema generation against a mocked
//! generation endpoint.

use formforge_core::{
    GeminiClient, GenerationError, QuestionType, SchemaGenerator, Secret, TokenCipher,
};
use serde_json::json;
use std::sync::Arc;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path},
};

const ENDPOINT: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

const CONTACT_FORM: &str = r#"{"title":"Contact Form","description":"","questions":[{"title":"Name","question_type":"TEXT","required":true},{"title":"Email","question_type":"TEXT","required":true}]}"#;

fn candidate(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    }))
}

fn cipher() -> Arc<TokenCipher> {
    Arc::new(TokenCipher::from_secret(&Secret::new("test-secret-key")))
}

fn pipeline(server: &MockServer) -> SchemaGenerator {
    let client = GeminiClient::with_base_url(server.uri(), "gemini-2.5-flash").unwrap();
    SchemaGenerator::new(Arc::new(client), cipher(), Secret::new("default-key"))
}

#[tokio::test]
async fn test_request_carries_instruction_and_decoding_params() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(header("x-goog-api-key", "default-key"))
        .and(body_partial_json(json!({
            "contents": [{"role": "user", "parts": [{"text": "Create a simple contact form with name and email"}]}],
            "generationConfig": {"topK": 40, "maxOutputTokens": 8192}
        })))
        .respond_with(candidate(CONTACT_FORM))
        .expect(1)
        .mount(&mock_server)
        .await;

    let schema = pipeline(&mock_server)
        .generate("Create a simple contact form with name and email", None)
        .await
        .unwrap();

    assert_eq!(schema.title, "Contact Form");
    assert_eq!(schema.questions.len(), 2);
    assert!(
        schema
            .questions
            .iter()
            .all(|q| q.question_type == QuestionType::Text && q.required)
    );

    let requests = mock_server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let instruction = body["systemInstruction"]["parts"][0]["text"].as_str().unwrap();
    assert!(instruction.contains("MULTIPLE_CHOICE"));
    assert!(instruction.contains("Output ONLY valid JSON"));
}

#[tokio::test]
async fn test_fenced_response_accepted_without_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(candidate(&format!("```json\n{}\n```", CONTACT_FORM)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let schema = pipeline(&mock_server).generate("contact form", None).await.unwrap();
    assert_eq!(schema.title, "Contact Form");
}

#[tokio::test]
async fn test_two_malformed_then_valid() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(candidate("{\"title\": \"Contact Form\", \"questions\": ["))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(candidate(CONTACT_FORM))
        .expect(1)
        .mount(&mock_server)
        .await;

    let schema = pipeline(&mock_server)
        .with_max_attempts(3)
        .generate("contact form", None)
        .await
        .unwrap();

    assert_eq!(schema.questions.len(), 2);
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_exhausted_attempts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(candidate("I'd be happy to help you build a form!"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let err = pipeline(&mock_server)
        .generate("contact form", None)
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::Exhausted { attempts: 3, .. }));
}

#[tokio::test]
async fn test_service_error_retried_and_key_not_leaked() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"code": 429, "status": "RESOURCE_EXHAUSTED"}
        })))
        .expect(3)
        .mount(&mock_server)
        .await;

    let err = pipeline(&mock_server)
        .generate("contact form", None)
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(message.contains("429"));
    assert!(!message.contains("default-key"));
}

#[tokio::test]
async fn test_user_override_key_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(header("x-goog-api-key", "user-key"))
        .respond_with(candidate(CONTACT_FORM))
        .expect(1)
        .mount(&mock_server)
        .await;

    let override_key = cipher().encrypt("user-key").unwrap();
    pipeline(&mock_server)
        .generate("contact form", Some(&override_key))
        .await
        .unwrap();
}
