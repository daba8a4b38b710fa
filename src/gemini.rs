//! Gemini `generateContent` client.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::{AiError, truncate_for_log};
use crate::traits::TextGenerator;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Pause before the single retry after HTTP 429.
    pub retry_delay_ms: u64,
    pub temperature: f64,
    pub max_output_tokens: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
            model: "gemini-2.5-flash".to_string(),
            timeout_secs: 90,
            retry_delay_ms: 2000,
            temperature: 0.1,
            max_output_tokens: 8000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl GeminiClient {
    /// Fails with [`AiError::NotConfigured`] when no API key is set.
    pub fn new(config: GeminiConfig) -> Result<Self, AiError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(AiError::NotConfigured)?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", self.config.base_url, self.config.model)
    }

    fn payload(&self, prompt: &str) -> serde_json::Value {
        json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "response_mime_type": "application/json",
                "temperature": self.config.temperature,
                "maxOutputTokens": self.config.max_output_tokens,
                "candidateCount": 1
            }
        })
    }

    fn post(&self, payload: &serde_json::Value) -> Result<reqwest::blocking::Response, AiError> {
        Ok(self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(payload)
            .send()?)
    }
}

impl TextGenerator for GeminiClient {
    fn generate(&self, prompt: &str) -> Result<String, AiError> {
        let payload = self.payload(prompt);
        debug!(prompt_chars = prompt.len(), model = %self.config.model, "sending Gemini request");

        let mut response = self.post(&payload)?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!(delay_ms = self.config.retry_delay_ms, "Gemini rate limited, retrying once");
            std::thread::sleep(Duration::from_millis(self.config.retry_delay_ms));
            response = self.post(&payload)?;
            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                warn!("Gemini still rate limited after retry");
                return Err(AiError::RateLimited);
            }
        }

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            warn!(status = status.as_u16(), body = truncate_for_log(&body), "Gemini request failed");
            return Err(AiError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&body).to_string(),
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&body).map_err(|err| {
            warn!(error = %err, body = truncate_for_log(&body), "Gemini envelope malformed");
            AiError::InvalidJson(err.to_string())
        })?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|content| content.parts.into_iter().find_map(|part| part.text))
            .filter(|text| !text.trim().is_empty())
            .ok_or(AiError::MissingCandidate)?;

        info!(response_chars = text.len(), "Gemini response received");
        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}
