//! Prompt to form schema generation.
//!
//! This module provides:
//! - [`TextGenerator`] - The text-generation service boundary
//! - [`GeminiClient`] - `generateContent` over HTTP
//! - [`SchemaGenerator`] - Key selection, bounded retry and schema validation
//!
//! Each attempt is an independent generation call with the same prompt. Text
//! that is not JSON and JSON that fails validation both consume an attempt.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::crypto::TokenCipher;
use crate::schema::{FormSchema, SchemaError};
use crate::store::Secret;

/// Default model used for schema generation.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default number of generation attempts per prompt.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default generation API base URL.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Instruction constraining the model to emit a single form-schema JSON object.
pub const SYSTEM_INSTRUCTION: &str = r#"You are a precise form schema generator. Output ONLY valid JSON matching the FormSchema structure.
No conversational text, no explanations, no markdown code blocks.
Use exact Google Form item types: TEXT, MULTIPLE_CHOICE, CHECKBOX.

The JSON structure must be:
{
  "title": "Form Title",
  "description": "Form Description",
  "questions": [
    {
      "title": "Question text",
      "question_type": "TEXT|MULTIPLE_CHOICE|CHECKBOX",
      "options": ["option1", "option2"],
      "required": true
    }
  ]
}

Only include "options" for MULTIPLE_CHOICE or CHECKBOX questions, and always give them at least one option."#;

/// Errors from the generation pipeline.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The generation service could not be reached or returned an error.
    #[error("generation service error: {message}")]
    Service { message: String },

    /// The service answered without any text.
    #[error("generation service returned no text")]
    EmptyResponse,

    /// Neither an override nor a default API key is available.
    #[error("no generation API key configured")]
    MissingApiKey,

    /// Every attempt failed to produce a valid schema.
    #[error("failed to generate a valid form after {attempts} attempts: {last_failure}")]
    Exhausted { attempts: u32, last_failure: String },
}

/// Decoding parameters for schema generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 8192,
        }
    }
}

/// One request to the text-generation service.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_instruction: String,
    pub prompt: String,
    pub params: GenerationParams,
}

/// The text-generation service boundary.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Run one generation and return the concatenated response text.
    async fn generate_text(
        &self,
        api_key: &Secret,
        request: &GenerationRequest,
    ) -> Result<String, GenerationError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody<'a> {
    system_instruction: WireContent<'a>,
    contents: Vec<WireContent<'a>>,
    generation_config: &'a GenerationParams,
}

#[derive(Serialize)]
struct WireContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<WirePart<'a>>,
}

#[derive(Serialize)]
struct WirePart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl GeminiClient {
    /// Create a client for `model` against the public endpoint.
    pub fn new(model: impl Into<String>) -> Result<Self, GenerationError> {
        Self::with_base_url(DEFAULT_GEMINI_BASE_URL, model)
    }

    /// Create a client against a custom base URL.
    pub fn with_base_url(
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| GenerationError::Service {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate_text(
        &self,
        api_key: &Secret,
        request: &GenerationRequest,
    ) -> Result<String, GenerationError> {
        let body = GenerateContentBody {
            system_instruction: WireContent {
                role: None,
                parts: vec![WirePart {
                    text: &request.system_instruction,
                }],
            },
            contents: vec![WireContent {
                role: Some("user"),
                parts: vec![WirePart {
                    text: &request.prompt,
                }],
            }],
            generation_config: &request.params,
        };

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Service {
                message: format!("request failed: {}", e.without_url()),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GenerationError::Service {
                message: format!("{} {}", status, truncate(&detail, 200)),
            });
        }

        let parsed: GenerateContentResponse =
            response.json().await.map_err(|e| GenerationError::Service {
                message: format!("unreadable response: {}", e.without_url()),
            })?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        Ok(text)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Turns prompts into validated form schemas.
pub struct SchemaGenerator {
    generator: Arc<dyn TextGenerator>,
    cipher: Arc<TokenCipher>,
    default_api_key: Secret,
    params: GenerationParams,
    max_attempts: u32,
}

impl SchemaGenerator {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        cipher: Arc<TokenCipher>,
        default_api_key: Secret,
    ) -> Self {
        Self {
            generator,
            cipher,
            default_api_key,
            params: GenerationParams::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Set the number of attempts. Values below 1 are treated as 1.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether a process-wide default key is configured.
    pub fn has_default_key(&self) -> bool {
        !self.default_api_key.is_blank()
    }

    /// Pick the override key when it decrypts, otherwise the default.
    fn select_api_key(&self, api_key_override: Option<&str>) -> Result<Secret, GenerationError> {
        if let Some(ciphertext) = api_key_override {
            match self.cipher.decrypt(ciphertext) {
                Ok(key) if !key.is_blank() => return Ok(key),
                Ok(_) => tracing::warn!("Stored generation key is empty, using default key"),
                Err(e) => {
                    tracing::warn!("Failed to decrypt stored generation key ({}), using default key", e)
                }
            }
        }

        if !self.has_default_key() {
            return Err(GenerationError::MissingApiKey);
        }
        Ok(self.default_api_key.clone())
    }

    /// Generate a schema for `prompt`.
    ///
    /// `api_key_override` is a ciphertext produced by the same cipher, usually
    /// a user's saved key.
    pub async fn generate(
        &self,
        prompt: &str,
        api_key_override: Option<&str>,
    ) -> Result<FormSchema, GenerationError> {
        let api_key = self.select_api_key(api_key_override)?;
        let request = GenerationRequest {
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            prompt: prompt.to_string(),
            params: self.params.clone(),
        };

        let mut last_failure = String::new();
        let mut last_response: Option<String> = None;

        for attempt in 1..=self.max_attempts {
            let text = match self.generator.generate_text(&api_key, &request).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(
                        "Attempt {}/{}: generation call failed: {}",
                        attempt,
                        self.max_attempts,
                        e
                    );
                    last_failure = e.to_string();
                    continue;
                }
            };

            match FormSchema::parse(&text) {
                Ok(schema) => {
                    tracing::debug!(
                        "Generated schema '{}' with {} questions on attempt {}",
                        schema.title,
                        schema.questions.len(),
                        attempt
                    );
                    return Ok(schema);
                }
                Err(e) => {
                    log_rejected(attempt, self.max_attempts, &e);
                    last_failure = e.to_string();
                    last_response = Some(text);
                }
            }
        }

        if let Some(raw) = last_response {
            tracing::error!("Raw response from final rejected attempt: {}", raw);
        }
        tracing::error!(
            "Schema generation failed after {} attempts",
            self.max_attempts
        );

        Err(GenerationError::Exhausted {
            attempts: self.max_attempts,
            last_failure,
        })
    }
}

fn log_rejected(attempt: u32, max_attempts: u32, err: &SchemaError) {
    if err.is_unparsable() {
        tracing::warn!("Attempt {}/{}: JSON parsing failed: {}", attempt, max_attempts, err);
    } else {
        tracing::warn!("Attempt {}/{}: schema rejected: {}", attempt, max_attempts, err);
    }
}
