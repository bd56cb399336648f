//! VOICEVOX engine client.
//!
//! Synthesis is two calls: `POST /audio_query` builds an editable query for
//! the text, `POST /synthesis` renders it to WAV. The query is kept as raw
//! JSON so fields this client does not touch pass through unchanged.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

use shorts_models::EnvReader;

use crate::error::{check_status, ServiceError, ServiceResult};
use crate::retry::{retry_async, RetryConfig};
use crate::traits::{SpeechSynthesizer, VoiceParams};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:50021";
/// Rough spoken length of one mora at speed 1.0.
pub const SECONDS_PER_MORA: f64 = 0.15;
/// Upper bound on automatic speed-up.
pub const MAX_SPEED_FACTOR: f64 = 2.0;

/// VOICEVOX client configuration.
#[derive(Debug, Clone)]
pub struct VoicevoxConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for VoicevoxConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 1,
        }
    }
}

impl VoicevoxConfig {
    pub fn from_reader(env: &mut EnvReader) -> Self {
        Self {
            base_url: env.string("VOICEVOX_SERVER_URL", DEFAULT_BASE_URL),
            timeout: Duration::from_secs(env.parse("VOICEVOX_TIMEOUT_SECS", 60)),
            max_retries: env.parse("VOICEVOX_MAX_RETRIES", 1),
        }
    }
}

/// VOICEVOX HTTP client.
pub struct VoicevoxClient {
    http: Client,
    config: VoicevoxConfig,
}

impl VoicevoxClient {
    pub fn new(config: VoicevoxConfig) -> ServiceResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ServiceError::Network)?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn retry_config(&self, operation: &str) -> RetryConfig {
        RetryConfig::new(operation).with_max_retries(self.config.max_retries)
    }

    async fn audio_query(&self, text: &str, speaker: u32) -> ServiceResult<Value> {
        let url = self.url("/audio_query");
        let speaker = speaker.to_string();

        let response = retry_async(&self.retry_config("voicevox audio_query"), || async {
            let response = self
                .http
                .post(&url)
                .query(&[("text", text), ("speaker", speaker.as_str())])
                .send()
                .await
                .map_err(|e| ServiceError::from_transport("VOICEVOX", e))?;
            check_status("VOICEVOX", response).await
        })
        .await?;

        let query: Value = response.json().await?;
        if !query.is_object() {
            return Err(ServiceError::invalid_response("audio_query did not return an object"));
        }
        Ok(query)
    }

    async fn synthesis(&self, query: &Value, speaker: u32) -> ServiceResult<Vec<u8>> {
        let url = self.url("/synthesis");
        let speaker = speaker.to_string();

        let response = retry_async(&self.retry_config("voicevox synthesis"), || async {
            let response = self
                .http
                .post(&url)
                .query(&[("speaker", speaker.as_str())])
                .json(query)
                .send()
                .await
                .map_err(|e| ServiceError::from_transport("VOICEVOX", e))?;
            check_status("VOICEVOX", response).await
        })
        .await?;

        let bytes = response.bytes().await?.to_vec();
        if bytes.is_empty() {
            return Err(ServiceError::invalid_response("synthesis returned no audio"));
        }
        Ok(bytes)
    }
}

/// Count morae (including pause morae) in an audio query.
pub fn count_morae(query: &Value) -> usize {
    query
        .get("accent_phrases")
        .and_then(Value::as_array)
        .map(|phrases| {
            phrases
                .iter()
                .map(|p| {
                    let moras = p.get("moras").and_then(Value::as_array).map_or(0, Vec::len);
                    let pause = usize::from(p.get("pause_mora").is_some_and(|m| !m.is_null()));
                    moras + pause
                })
                .sum()
        })
        .unwrap_or(0)
}

/// Estimated spoken seconds at the given speed.
pub fn estimate_seconds(morae: usize, speed_scale: f64) -> f64 {
    morae as f64 * SECONDS_PER_MORA / speed_scale.max(f64::EPSILON)
}

/// Speed to use so the estimate fits `max_secs`, capped at 2x the base speed.
pub fn fitted_speed(morae: usize, base_speed: f64, max_secs: Option<f64>) -> f64 {
    let estimate = estimate_seconds(morae, base_speed);
    match max_secs {
        Some(max) if max > 0.0 && estimate > max => {
            base_speed * (estimate / max).min(MAX_SPEED_FACTOR)
        }
        _ => base_speed,
    }
}

#[async_trait]
impl SpeechSynthesizer for VoicevoxClient {
    async fn synthesize(&self, text: &str, params: &VoiceParams) -> ServiceResult<Vec<u8>> {
        let mut query = self.audio_query(text, params.speaker_id).await?;

        let morae = count_morae(&query);
        let speed = fitted_speed(morae, params.speed_scale, params.max_secs);
        if let Some(obj) = query.as_object_mut() {
            obj.insert("speedScale".to_string(), Value::from(speed));
        }
        debug!(
            morae,
            speed,
            estimate_secs = estimate_seconds(morae, speed),
            "Prepared VOICEVOX query"
        );

        self.synthesis(&query, params.speaker_id).await
    }

    async fn health_check(&self) -> ServiceResult<String> {
        let response = self
            .http
            .get(self.url("/version"))
            .send()
            .await
            .map_err(|e| ServiceError::from_transport("VOICEVOX", e))?;
        let response = check_status("VOICEVOX", response).await?;

        // The engine answers with a JSON string such as "0.14.5"
        let body = response.text().await?;
        let version = serde_json::from_str::<String>(&body).unwrap_or_else(|_| body.trim().to_string());
        info!(version = %version, "VOICEVOX engine reachable");
        Ok(version)
    }
}
