//! Form schema types and parsing.
//!
//! A [`FormSchema`] is the provider-agnostic description of a form that sits
//! between the prompt text and the remote form-creation calls. Model output is
//! turned into a schema by [`FormSchema::parse`], which distinguishes text that
//! is not JSON at all from JSON with the wrong shape.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The closed set of question kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    /// Free-text answer.
    Text,
    /// Single-select choice.
    MultipleChoice,
    /// Multi-select choice.
    Checkbox,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Text => "TEXT",
            QuestionType::MultipleChoice => "MULTIPLE_CHOICE",
            QuestionType::Checkbox => "CHECKBOX",
        }
    }

    /// Whether the question needs at least one option.
    pub fn requires_options(&self) -> bool {
        matches!(self, QuestionType::MultipleChoice | QuestionType::Checkbox)
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "TEXT" => Ok(QuestionType::Text),
            "MULTIPLE_CHOICE" => Ok(QuestionType::MultipleChoice),
            "CHECKBOX" => Ok(QuestionType::Checkbox),
            other => Err(SchemaError::UnsupportedQuestionType {
                found: other.to_string(),
            }),
        }
    }
}

/// One question of a form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormQuestion {
    pub title: String,
    pub question_type: QuestionType,
    /// Choices, in display order. Ignored for [`QuestionType::Text`].
    pub options: Vec<String>,
    pub required: bool,
}

impl FormQuestion {
    pub fn text(title: impl Into<String>, required: bool) -> Self {
        Self {
            title: title.into(),
            question_type: QuestionType::Text,
            options: Vec::new(),
            required,
        }
    }

    pub fn choice(
        title: impl Into<String>,
        question_type: QuestionType,
        options: Vec<String>,
        required: bool,
    ) -> Self {
        Self {
            title: title.into(),
            question_type,
            options,
            required,
        }
    }
}

/// A complete form description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormSchema {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub questions: Vec<FormQuestion>,
}

/// Errors produced while turning model output into a [`FormSchema`].
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The text is not JSON.
    #[error("response is not valid JSON: {0}")]
    Unparsable(serde_json::Error),

    /// The JSON does not have the schema's fields or field types.
    #[error("response does not match the form schema: {message}")]
    InvalidShape { message: String },

    /// A question names a kind outside the supported set.
    #[error("unsupported question type: {found}")]
    UnsupportedQuestionType { found: String },

    #[error("form title is empty")]
    EmptyTitle,

    #[error("form has no questions")]
    NoQuestions,

    #[error("question {index} has an empty title")]
    EmptyQuestionTitle { index: usize },

    #[error("question {index} ({question_type}) has no options")]
    MissingOptions {
        index: usize,
        question_type: QuestionType,
    },

    #[error("question {index} has a blank option")]
    BlankOption { index: usize },
}

impl SchemaError {
    /// Whether the text failed to parse as JSON, as opposed to parsing into
    /// the wrong shape.
    pub fn is_unparsable(&self) -> bool {
        matches!(self, SchemaError::Unparsable(_))
    }
}

#[derive(Deserialize)]
struct RawSchema {
    title: String,
    #[serde(default)]
    description: Option<String>,
    questions: Vec<RawQuestion>,
}

#[derive(Deserialize)]
struct RawQuestion {
    title: String,
    question_type: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    options: Vec<String>,
    #[serde(default)]
    required: bool,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl FormSchema {
    /// Parse and validate model output.
    ///
    /// A surrounding markdown code fence is removed first.
    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        let value: serde_json::Value =
            serde_json::from_str(strip_code_fence(text)).map_err(SchemaError::Unparsable)?;
        Self::from_json(value)
    }

    /// Build and validate a schema from an already-parsed JSON value.
    pub fn from_json(value: serde_json::Value) -> Result<Self, SchemaError> {
        let raw: RawSchema =
            serde_json::from_value(value).map_err(|e| SchemaError::InvalidShape {
                message: e.to_string(),
            })?;

        let questions = raw
            .questions
            .into_iter()
            .map(|q| {
                Ok(FormQuestion {
                    title: q.title,
                    question_type: q.question_type.parse()?,
                    options: q.options,
                    required: q.required,
                })
            })
            .collect::<Result<Vec<_>, SchemaError>>()?;

        let schema = FormSchema {
            title: raw.title,
            description: raw.description,
            questions,
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Check the structural rules every schema must satisfy.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.title.trim().is_empty() {
            return Err(SchemaError::EmptyTitle);
        }
        if self.questions.is_empty() {
            return Err(SchemaError::NoQuestions);
        }

        for (index, question) in self.questions.iter().enumerate() {
            if question.title.trim().is_empty() {
                return Err(SchemaError::EmptyQuestionTitle { index });
            }
            if question.question_type.requires_options() && question.options.is_empty() {
                return Err(SchemaError::MissingOptions {
                    index,
                    question_type: question.question_type,
                });
            }
            if question.question_type.requires_options()
                && question.options.iter().any(|o| o.trim().is_empty())
            {
                return Err(SchemaError::BlankOption { index });
            }
        }

        Ok(())
    }

    /// The description, if present and not blank.
    pub fn description_text(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}

/// Remove a markdown code fence wrapped around model output.
///
/// Handles both ```` ```json\n{...}\n``` ```` and the single-line
/// ```` ```{...}``` ```` form. Text without a leading fence is only trimmed.
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };

    let body = match rest.split_once('\n') {
        Some((info, body)) if !info.contains('{') => body,
        _ => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };

    body.trim_end().trim_end_matches('`').trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTACT: &str = r#"{"title":"Contact Form","description":"","questions":[{"title":"Name","question_type":"TEXT","required":true},{"title":"Email","question_type":"TEXT","required":true}]}"#;

    #[test]
    fn test_parse_contact_form() {
        let schema = FormSchema::parse(CONTACT).unwrap();
        assert_eq!(schema.title, "Contact Form");
        assert_eq!(schema.description_text(), None);
        assert_eq!(schema.questions.len(), 2);
        assert_eq!(schema.questions[0].question_type, QuestionType::Text);
        assert!(schema.questions[1].required);
    }

    #[test]
    fn test_strip_code_fence_variants() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```\n"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json {\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```{\n\"a\":1}\n```"), "{\n\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_parse_fenced() {
        let fenced = format!("```json\n{}\n```", CONTACT);
        assert_eq!(
            FormSchema::parse(&fenced).unwrap(),
            FormSchema::parse(CONTACT).unwrap()
        );
    }

    #[test]
    fn test_unparsable_vs_invalid_shape() {
        let err = FormSchema::parse("Sure! Here is your form.").unwrap_err();
        assert!(err.is_unparsable());

        let err = FormSchema::parse(r#"{"questions": []}"#).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidShape { .. }));
        assert!(!err.is_unparsable());
    }

    #[test]
    fn test_unknown_question_type() {
        let err = FormSchema::parse(
            r#"{"title":"T","questions":[{"title":"Q","question_type":"DROPDOWN","options":["a"]}]}"#,
        )
        .unwrap_err();
        assert!(
            matches!(err, SchemaError::UnsupportedQuestionType { ref found } if found == "DROPDOWN")
        );
    }

    #[test]
    fn test_choice_without_options_rejected() {
        let err = FormSchema::parse(
            r#"{"title":"T","questions":[{"title":"Q","question_type":"CHECKBOX","options":null}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::MissingOptions { index: 0, .. }));
    }

    #[test]
    fn test_blank_option_rejected() {
        let err = FormSchema::parse(
            r#"{"title":"T","questions":[
                {"title":"Name","question_type":"TEXT"},
                {"title":"Attending?","question_type":"MULTIPLE_CHOICE","options":["Yes","  "]}
            ]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::BlankOption { index: 1 }));
        assert!(!err.is_unparsable());
    }

    #[test]
    fn test_empty_title_and_no_questions() {
        assert!(matches!(
            FormSchema::parse(r#"{"title":" ","questions":[{"title":"Q","question_type":"TEXT"}]}"#),
            Err(SchemaError::EmptyTitle)
        ));
        assert!(matches!(
            FormSchema::parse(r#"{"title":"T","questions":[]}"#),
            Err(SchemaError::NoQuestions)
        ));
    }

    #[test]
    fn test_defaults_for_optional_fields() {
        let schema = FormSchema::parse(
            r#"{"title":"T","description":"About","questions":[{"title":"Q","question_type":"TEXT"}]}"#,
        )
        .unwrap();
        assert_eq!(schema.description_text(), Some("About"));
        assert!(!schema.questions[0].required);
        assert!(schema.questions[0].options.is_empty());
    }

    #[test]
    fn test_question_type_round_trip_names() {
        for kind in [
            QuestionType::Text,
            QuestionType::MultipleChoice,
            QuestionType::Checkbox,
        ] {
            assert_eq!(kind.as_str().parse::<QuestionType>().unwrap(), kind);
            assert_eq!(
                serde_json::to_value(kind).unwrap(),
                serde_json::Value::String(kind.to_string())
            );
        }
    }
}
