//! Gemini client for script generation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use shorts_models::EnvReader;

use crate::error::{check_status, ServiceError, ServiceResult};
use crate::retry::{retry_async, RetryConfig};
use crate::traits::TextGenerator;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODELS: &[&str] = &["gemini-2.5-flash", "gemini-2.5-flash-lite", "gemini-2.0-flash"];

/// Gemini client configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    /// Models tried in order until one answers
    pub models: Vec<String>,
    pub temperature: f32,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            temperature: 0.8,
            timeout: Duration::from_secs(60),
            max_retries: 2,
        }
    }
}

impl GeminiConfig {
    /// Read `GEMINI_*` settings. `GEMINI_API_KEY` is required.
    pub fn from_reader(env: &mut EnvReader) -> Self {
        let defaults = Self::default();
        Self {
            api_key: env.required("GEMINI_API_KEY"),
            base_url: env.string("GEMINI_BASE_URL", DEFAULT_BASE_URL),
            models: env.list("GEMINI_MODELS", DEFAULT_MODELS),
            temperature: env.parse("GEMINI_TEMPERATURE", defaults.temperature),
            timeout: Duration::from_secs(env.parse("GEMINI_TIMEOUT_SECS", 60)),
            max_retries: env.parse("GEMINI_MAX_RETRIES", defaults.max_retries),
        }
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// Gemini API client.
pub struct GeminiClient {
    http: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> ServiceResult<Self> {
        if config.api_key.is_empty() {
            return Err(ServiceError::Config("GEMINI_API_KEY is empty".into()));
        }
        if config.models.is_empty() {
            return Err(ServiceError::Config("no Gemini models configured".into()));
        }
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ServiceError::Network)?;
        Ok(Self { http, config })
    }

    async fn call_model(&self, model: &str, prompt: &str) -> ServiceResult<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        );

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                temperature: self.config.temperature,
            },
        };

        let retry = RetryConfig::new(format!("gemini {}", model))
            .with_max_retries(self.config.max_retries);

        let response = retry_async(&retry, || async {
            let response = self
                .http
                .post(&url)
                .query(&[("key", self.config.api_key.as_str())])
                .json(&request)
                .send()
                .await
                .map_err(|e| ServiceError::from_transport("Gemini", e))?;
            check_status("Gemini", response).await
        })
        .await?;

        let body: GeminiResponse = response.json().await?;
        body.candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .find(|t| !t.trim().is_empty())
            .ok_or_else(|| ServiceError::invalid_response("Gemini returned no text"))
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    /// Try each configured model in order; the last error wins.
    async fn generate(&self, prompt: &str) -> ServiceResult<String> {
        let mut last_error = None;

        for model in &self.config.models {
            debug!("Attempting Gemini API with model: {}", model);
            match self.call_model(model, prompt).await {
                Ok(text) => {
                    info!(model = %model, chars = text.len(), "Gemini generated text");
                    return Ok(text);
                }
                Err(e) => {
                    warn!("Failed with model {}: {}", model, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ServiceError::invalid_response("all Gemini models failed")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_reader() {
        let mut env = EnvReader::from_pairs([
            ("GEMINI_API_KEY", "k"),
            ("GEMINI_MODELS", "a, b"),
        ]);
        let config = GeminiConfig::from_reader(&mut env);
        assert_eq!(config.api_key, "k");
        assert_eq!(config.models, vec!["a", "b"]);
        assert!(env.finish().is_ok());
    }

    #[test]
    fn test_missing_key_is_reported() {
        let mut env = EnvReader::from_fn(|_| None);
        let _ = GeminiConfig::from_reader(&mut env);
        let errors = env.finish().unwrap_err();
        assert!(errors[0].contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_new_rejects_empty_key() {
        assert!(GeminiClient::new(GeminiConfig::default()).is_err());
    }
}
