//! Form construction.
//!
//! [`FormBuilder`] turns a validated [`FormSchema`] into remote calls against
//! the forms API: one create call carrying only the title, then a single
//! batch of mutations. The batch holds an optional description update followed
//! by one create-item request per question, each pinned to its position in
//! the schema so the remote ordering matches the input ordering.
//!
//! Every structural check runs before the first remote call, so an invalid
//! schema never produces a partially built form.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::schema::{FormQuestion, FormSchema, QuestionType};
use crate::store::Secret;

/// Default forms API collection URL.
pub const DEFAULT_FORMS_BASE_URL: &str = "https://forms.googleapis.com/v1/forms";

const FORM_URL_TEMPLATE_PREFIX: &str = "https://docs.google.com/forms/d/";

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Errors from form construction.
#[derive(Debug, Error)]
pub enum FormError {
    /// The schema cannot be mapped to remote requests.
    #[error("invalid form: {message}")]
    Validation { message: String },

    /// The forms API failed or rejected a call.
    #[error("forms API error: {message}")]
    ExternalService { message: String },
}

/// Human-facing edit URL for a form.
pub fn form_url(form_id: &str) -> String {
    format!("{}{}/edit", FORM_URL_TEMPLATE_PREFIX, form_id)
}

/// A form created on the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedForm {
    pub form_id: String,
    pub form_url: String,
}

/// One mutation in a batch update.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FormRequest {
    UpdateFormInfo(UpdateFormInfo),
    CreateItem(CreateItem),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFormInfo {
    pub info: FormInfo,
    pub update_mask: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormInfo {
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateItem {
    pub item: Item,
    pub location: Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub title: String,
    pub question_item: QuestionItem,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionItem {
    pub question: Question,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Question {
    pub required: bool,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

/// The answer widget of a question.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum QuestionKind {
    TextQuestion(TextQuestion),
    ChoiceQuestion(ChoiceQuestion),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextQuestion {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChoiceQuestion {
    #[serde(rename = "type")]
    pub choice_type: ChoiceType,
    pub options: Vec<ChoiceOption>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChoiceType {
    Radio,
    Checkbox,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChoiceOption {
    pub value: String,
}

/// Map one question to its answer widget.
fn question_kind(index: usize, question: &FormQuestion) -> Result<QuestionKind, FormError> {
    let choice_type = match question.question_type {
        QuestionType::Text => return Ok(QuestionKind::TextQuestion(TextQuestion {})),
        QuestionType::MultipleChoice => ChoiceType::Radio,
        QuestionType::Checkbox => ChoiceType::Checkbox,
    };

    if question.options.is_empty() {
        return Err(FormError::Validation {
            message: format!(
                "question {} ({}) requires at least one option",
                index, question.question_type
            ),
        });
    }
    if question.options.iter().any(|o| o.trim().is_empty()) {
        return Err(FormError::Validation {
            message: format!("question {} has a blank option", index),
        });
    }

    Ok(QuestionKind::ChoiceQuestion(ChoiceQuestion {
        choice_type,
        options: question
            .options
            .iter()
            .map(|value| ChoiceOption {
                value: value.clone(),
            })
            .collect(),
    }))
}

/// Build the ordered batch for a schema without touching the network.
pub fn plan_requests(schema: &FormSchema) -> Result<Vec<FormRequest>, FormError> {
    if schema.title.trim().is_empty() {
        return Err(FormError::Validation {
            message: "form title is empty".to_string(),
        });
    }

    let mut requests = Vec::with_capacity(schema.questions.len() + 1);

    if let Some(description) = schema.description_text() {
        requests.push(FormRequest::UpdateFormInfo(UpdateFormInfo {
            info: FormInfo {
                description: description.to_string(),
            },
            update_mask: "description".to_string(),
        }));
    }

    for (index, question) in schema.questions.iter().enumerate() {
        if question.title.trim().is_empty() {
            return Err(FormError::Validation {
                message: format!("question {} has an empty title", index),
            });
        }

        requests.push(FormRequest::CreateItem(CreateItem {
            item: Item {
                title: question.title.clone(),
                question_item: QuestionItem {
                    question: Question {
                        required: question.required,
                        kind: question_kind(index, question)?,
                    },
                },
            },
            location: Location { index },
        }));
    }

    Ok(requests)
}

/// The forms API boundary.
#[async_trait]
pub trait FormsApi: Send + Sync {
    /// Create an empty form with a title and return its id.
    async fn create_form(&self, access_token: &Secret, title: &str) -> Result<String, FormError>;

    /// Apply a batch of mutations atomically.
    async fn batch_update(
        &self,
        access_token: &Secret,
        form_id: &str,
        requests: &[FormRequest],
    ) -> Result<(), FormError>;
}

/// Google Forms REST client.
pub struct GoogleFormsClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateFormInfo<'a> {
    title: &'a str,
    document_title: &'a str,
}

#[derive(Serialize)]
struct CreateFormBody<'a> {
    info: CreateFormInfo<'a>,
}

#[derive(Serialize)]
struct BatchUpdateBody<'a> {
    requests: &'a [FormRequest],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateFormResponse {
    form_id: String,
}

impl GoogleFormsClient {
    pub fn new() -> Result<Self, FormError> {
        Self::with_base_url(DEFAULT_FORMS_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, FormError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| FormError::ExternalService {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

async fn check_status(
    operation: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, FormError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let detail: String = response
        .text()
        .await
        .unwrap_or_default()
        .chars()
        .take(200)
        .collect();
    Err(FormError::ExternalService {
        message: format!("{} returned {}: {}", operation, status, detail),
    })
}

fn transport(operation: &str, err: reqwest::Error) -> FormError {
    FormError::ExternalService {
        message: format!("{} failed: {}", operation, err.without_url()),
    }
}

#[async_trait]
impl FormsApi for GoogleFormsClient {
    async fn create_form(&self, access_token: &Secret, title: &str) -> Result<String, FormError> {
        let body = CreateFormBody {
            info: CreateFormInfo {
                title,
                document_title: title,
            },
        };

        let response = self
            .http
            .post(&self.base_url)
            .bearer_auth(access_token.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| transport("create form", e))?;

        let created: CreateFormResponse = check_status("create form", response)
            .await?
            .json()
            .await
            .map_err(|e| transport("create form", e))?;

        Ok(created.form_id)
    }

    async fn batch_update(
        &self,
        access_token: &Secret,
        form_id: &str,
        requests: &[FormRequest],
    ) -> Result<(), FormError> {
        let response = self
            .http
            .post(format!("{}/{}:batchUpdate", self.base_url, form_id))
            .bearer_auth(access_token.expose())
            .json(&BatchUpdateBody { requests })
            .send()
            .await
            .map_err(|e| transport("batch update", e))?;

        check_status("batch update", response).await?;
        Ok(())
    }
}

/// Builds remote forms from schemas.
pub struct FormBuilder {
    api: Arc<dyn FormsApi>,
}

impl FormBuilder {
    pub fn new(api: Arc<dyn FormsApi>) -> Self {
        Self { api }
    }

    /// Create the form described by `schema`.
    pub async fn build(
        &self,
        access_token: &Secret,
        schema: &FormSchema,
    ) -> Result<CreatedForm, FormError> {
        let requests = plan_requests(schema)?;

        let form_id = self.api.create_form(access_token, &schema.title).await?;
        tracing::info!("Created form {}", form_id);

        if !requests.is_empty() {
            self.api
                .batch_update(access_token, &form_id, &requests)
                .await?;
            tracing::debug!("Applied {} requests to form {}", requests.len(), form_id);
        }

        Ok(CreatedForm {
            form_url: form_url(&form_id),
            form_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(description: Option<&str>, questions: Vec<FormQuestion>) -> FormSchema {
        FormSchema {
            title: "Survey".to_string(),
            description: description.map(str::to_string),
            questions,
        }
    }

    #[test]
    fn test_form_url() {
        assert_eq!(
            form_url("abc123"),
            "https://docs.google.com/forms/d/abc123/edit"
        );
    }

    #[test]
    fn test_plan_indices_skip_description() {
        let requests = plan_requests(&schema(
            Some("About you"),
            vec![
                FormQuestion::text("Name", true),
                FormQuestion::text("Email", false),
            ],
        ))
        .unwrap();

        assert_eq!(requests.len(), 3);
        assert!(matches!(requests[0], FormRequest::UpdateFormInfo(_)));
        for (position, request) in requests[1..].iter().enumerate() {
            match request {
                FormRequest::CreateItem(item) => assert_eq!(item.location.index, position),
                other => panic!("unexpected request {:?}", other),
            }
        }
    }

    #[test]
    fn test_blank_description_omitted() {
        let requests =
            plan_requests(&schema(Some("  "), vec![FormQuestion::text("Name", true)])).unwrap();
        assert_eq!(requests.len(), 1);
        assert!(matches!(requests[0], FormRequest::CreateItem(_)));
    }

    #[test]
    fn test_wire_format() {
        let requests = plan_requests(&schema(
            Some("Tell us"),
            vec![
                FormQuestion::text("Name", true),
                FormQuestion::choice(
                    "Colour",
                    QuestionType::MultipleChoice,
                    vec!["Red".to_string(), "Blue".to_string()],
                    false,
                ),
                FormQuestion::choice(
                    "Pets",
                    QuestionType::Checkbox,
                    vec!["Cat".to_string()],
                    false,
                ),
            ],
        ))
        .unwrap();

        let value = serde_json::to_value(&requests).unwrap();
        assert_eq!(
            value,
            json!([
                {"updateFormInfo": {"info": {"description": "Tell us"}, "updateMask": "description"}},
                {"createItem": {
                    "item": {"title": "Name", "questionItem": {"question": {"required": true, "textQuestion": {}}}},
                    "location": {"index": 0}
                }},
                {"createItem": {
                    "item": {"title": "Colour", "questionItem": {"question": {
                        "required": false,
                        "choiceQuestion": {"type": "RADIO", "options": [{"value": "Red"}, {"value": "Blue"}]}
                    }}},
                    "location": {"index": 1}
                }},
                {"createItem": {
                    "item": {"title": "Pets", "questionItem": {"question": {
                        "required": false,
                        "choiceQuestion": {"type": "CHECKBOX", "options": [{"value": "Cat"}]}
                    }}},
                    "location": {"index": 2}
                }}
            ])
        );
    }

    #[test]
    fn test_choice_without_options_rejected() {
        for kind in [QuestionType::MultipleChoice, QuestionType::Checkbox] {
            let result = plan_requests(&schema(
                None,
                vec![
                    FormQuestion::text("Name", true),
                    FormQuestion::choice("Pick", kind, vec![], true),
                ],
            ));
            assert!(matches!(result, Err(FormError::Validation { .. })));
        }
    }

    #[test]
    fn test_text_question_ignores_options() {
        let mut question = FormQuestion::text("Name", true);
        question.options = vec!["ignored".to_string()];

        let value = serde_json::to_value(plan_requests(&schema(None, vec![question])).unwrap())
            .unwrap();
        assert_eq!(
            value[0]["createItem"]["item"]["questionItem"]["question"]["textQuestion"],
            json!({})
        );
    }
}
