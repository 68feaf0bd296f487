//! User settings stored as a JSON file.

use crate::completion::{DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_TEMPERATURE};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const BASE_URL_ENV: &str = "MARKDOWN_REPLY_BASE_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Completion endpoint
    pub base_url: String,
    pub endpoint: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub default_system_prompt: String,

    // Watch mode
    pub poll_interval_secs: f64,

    // Output
    pub document_title: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            endpoint: "/api/generate".to_string(),
            timeout_secs: 30,
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            default_system_prompt:
                "You are a helpful AI assistant. Use markdown for formatting (e.g., **Heading** and lists with -)."
                    .to_string(),
            poll_interval_secs: 1.0,
            document_title: "Reply".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or defaults when no path is given.
    ///
    /// The base URL environment variable wins over both.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read settings: {}", path.display()))?;
                let settings: Settings = serde_json::from_str(&raw)
                    .with_context(|| format!("Invalid settings file: {}", path.display()))?;
                debug!(path = %path.display(), "Settings loaded");
                settings
            }
            None => {
                debug!("No settings file given, using defaults");
                Self::default()
            }
        };

        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            if !base_url.trim().is_empty() {
                debug!(%base_url, "Base URL overridden from environment");
                settings.base_url = base_url;
            }
        }

        Ok(settings)
    }

    pub fn generate_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.endpoint.trim_start_matches('/')
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_secs.max(0.1))
    }
}
