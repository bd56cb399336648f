//! Unsplash client for image search and download.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use shorts_models::EnvReader;

use crate::error::{check_status, ServiceError, ServiceResult};
use crate::retry::{retry_async, RetryConfig};
use crate::traits::{DownloadedImage, ImageCandidate, ImageSearch, Orientation};

pub const DEFAULT_BASE_URL: &str = "https://api.unsplash.com";
/// Largest page the API serves.
pub const MAX_PER_PAGE: u32 = 30;

/// Unsplash client configuration.
#[derive(Debug, Clone)]
pub struct UnsplashConfig {
    pub access_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for UnsplashConfig {
    fn default() -> Self {
        Self {
            access_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
        }
    }
}

impl UnsplashConfig {
    /// Read `UNSPLASH_*` settings. `UNSPLASH_ACCESS_KEY` is required.
    pub fn from_reader(env: &mut EnvReader) -> Self {
        Self {
            access_key: env.required("UNSPLASH_ACCESS_KEY"),
            base_url: env.string("UNSPLASH_BASE_URL", DEFAULT_BASE_URL),
            timeout: Duration::from_secs(env.parse("UNSPLASH_TIMEOUT_SECS", 30)),
            max_retries: env.parse("UNSPLASH_MAX_RETRIES", 2),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    id: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    description: Option<String>,
    alt_description: Option<String>,
    urls: Option<PhotoUrls>,
}

#[derive(Debug, Deserialize)]
struct PhotoUrls {
    regular: Option<String>,
}

impl Photo {
    fn into_candidate(self) -> Option<ImageCandidate> {
        let url = self.urls.and_then(|u| u.regular)?;
        Some(ImageCandidate {
            id: self.id,
            url,
            width: self.width,
            height: self.height,
            description: self.description.or(self.alt_description),
        })
    }
}

/// Unsplash API client.
pub struct UnsplashClient {
    http: Client,
    config: UnsplashConfig,
}

impl UnsplashClient {
    pub fn new(config: UnsplashConfig) -> ServiceResult<Self> {
        if config.access_key.is_empty() {
            return Err(ServiceError::Config("UNSPLASH_ACCESS_KEY is empty".into()));
        }
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ServiceError::Network)?;
        Ok(Self { http, config })
    }

    fn retry_config(&self, operation: &str) -> RetryConfig {
        RetryConfig::new(operation).with_max_retries(self.config.max_retries)
    }
}

#[async_trait]
impl ImageSearch for UnsplashClient {
    async fn search(
        &self,
        query: &str,
        per_page: u32,
        orientation: Orientation,
    ) -> ServiceResult<Vec<ImageCandidate>> {
        let url = format!("{}/search/photos", self.config.base_url.trim_end_matches('/'));
        let per_page = per_page.clamp(1, MAX_PER_PAGE).to_string();
        let auth = format!("Client-ID {}", self.config.access_key);

        let response = retry_async(&self.retry_config("unsplash search"), || async {
            let response = self
                .http
                .get(&url)
                .header(AUTHORIZATION, &auth)
                .header("Accept-Version", "v1")
                .query(&[
                    ("query", query),
                    ("per_page", per_page.as_str()),
                    ("orientation", orientation.as_str()),
                    ("content_filter", "high"),
                ])
                .send()
                .await
                .map_err(|e| ServiceError::from_transport("Unsplash", e))?;
            check_status("Unsplash", response).await
        })
        .await?;

        let body: SearchResponse = response.json().await?;
        let candidates: Vec<ImageCandidate> = body
            .results
            .into_iter()
            .filter_map(Photo::into_candidate)
            .collect();

        debug!(query, count = candidates.len(), "Unsplash search");
        Ok(candidates)
    }

    async fn download(&self, candidate: &ImageCandidate) -> ServiceResult<DownloadedImage> {
        let response = retry_async(&self.retry_config("unsplash download"), || async {
            let response = self
                .http
                .get(&candidate.url)
                .send()
                .await
                .map_err(|e| ServiceError::from_transport("image host", e))?;
            check_status("image host", response).await
        })
        .await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let bytes = response.bytes().await?.to_vec();

        Ok(DownloadedImage {
            bytes,
            content_type,
        })
    }
}
