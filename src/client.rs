//! Blocking client for the text-generation endpoint.

use crate::completion::{
    fallback_reply, CompletionError, ErrorBody, GenerateRequest, GenerateResponse, ResponseMode,
};
use crate::settings::Settings;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, error, instrument};

#[derive(Debug, Clone)]
pub struct CompletionClient {
    http: Client,
    url: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl CompletionClient {
    pub fn new(settings: &Settings) -> Result<Self, CompletionError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            url: settings.generate_url(),
            temperature: settings.temperature,
            max_output_tokens: settings.max_output_tokens,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Build a request carrying this client's generation limits.
    pub fn request(
        &self,
        user_prompt: &str,
        system_prompt: &str,
        mode: ResponseMode,
    ) -> GenerateRequest {
        GenerateRequest::new(user_prompt, system_prompt, mode)
            .with_limits(self.temperature, self.max_output_tokens)
    }

    /// POST the request and return the reply text.
    #[instrument(skip(self, request), fields(url = %self.url))]
    pub fn generate(&self, request: &GenerateRequest) -> Result<String, CompletionError> {
        let response = self.http.post(&self.url).json(request).send()?;
        let status = response.status();
        let body = response.text()?;
        debug!(status = status.as_u16(), bytes = body.len(), "Completion response received");

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)?;
        parsed.first_text().map(str::to_string)
    }

    /// Like [`generate`](Self::generate), but failures become a displayable
    /// fallback reply instead of an error.
    pub fn ask(&self, user_prompt: &str, system_prompt: &str, mode: ResponseMode) -> String {
        let request = self.request(user_prompt, system_prompt, mode);
        match self.generate(&request) {
            Ok(text) => text,
            Err(e) => {
                match &e {
                    CompletionError::Status { status, message } => {
                        error!(status, %message, "Completion endpoint returned an error");
                    }
                    _ => error!(error = %e, "Completion request failed"),
                }
                fallback_reply(&e, mode)
            }
        }
    }
}

fn status_error(status: StatusCode, body: &str) -> CompletionError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
    CompletionError::Status {
        status: status.as_u16(),
        message,
    }
}
