//! Request and response bodies for the text-generation endpoint.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1000;

const JSON_FALLBACK: &str = r#"{"error": "AI Service Unavailable. Please check API Key."}"#;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    /// Non-2xx reply; holds the backend's `error` field or a status line
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("No text content returned from API.")]
    EmptyReply,
    #[error("invalid response body: {0}")]
    Json(#[from] serde_json::Error),
}

/// Whether the reply should come back as plain text or as a JSON document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    #[default]
    Text,
    Json,
}

impl ResponseMode {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ResponseMode::Text => "text/plain",
            ResponseMode::Json => "application/json",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    fn from_text(text: &str) -> Self {
        Self {
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub response_mime_type: &'static str,
}

/// Body POSTed to the generate endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    pub system_instruction: Content,
    pub generation_config: GenerationConfig,
}

impl GenerateRequest {
    pub fn new(user_prompt: &str, system_prompt: &str, mode: ResponseMode) -> Self {
        Self {
            contents: vec![Content::from_text(user_prompt)],
            system_instruction: Content::from_text(system_prompt),
            generation_config: GenerationConfig {
                temperature: DEFAULT_TEMPERATURE,
                max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
                response_mime_type: mode.mime_type(),
            },
        }
    }

    pub fn with_limits(mut self, temperature: f32, max_output_tokens: u32) -> Self {
        self.generation_config.temperature = temperature;
        self.generation_config.max_output_tokens = max_output_tokens;
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

/// Successful reply from the generate endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateResponse {
    /// Text of the first part of the first candidate.
    pub fn first_text(&self) -> Result<&str, CompletionError> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .and_then(|p| p.text.as_deref())
            .filter(|t| !t.is_empty())
            .ok_or(CompletionError::EmptyReply)
    }
}

/// Body returned with a non-2xx status.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

/// Text shown in place of a reply when the request failed.
///
/// JSON callers get a parseable error document so downstream parsing
/// does not break.
pub fn fallback_reply(error: &CompletionError, mode: ResponseMode) -> String {
    match mode {
        ResponseMode::Json => JSON_FALLBACK.to_string(),
        ResponseMode::Text => format!("Error: {}. Please check your server console.", error),
    }
}
