//! Resumable video upload to the YouTube Data API.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{Body, Client};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use shorts_models::{EnvReader, UploadResult, VideoMetadata};

use super::error::{UploadError, YoutubeResult};
use super::oauth::{
    revoke_cached_token, ClientSecrets, OAuthClient, OAuthConfig, DEFAULT_REVOKE_URI,
    SCOPE_UPLOAD,
};
use crate::retry::{retry_async, RetryConfig};
use crate::traits::VideoHost;

pub const DEFAULT_UPLOAD_BASE_URL: &str = "https://www.googleapis.com/upload";
/// Largest file accepted for upload.
pub const MAX_VIDEO_BYTES: u64 = 2 * 1024 * 1024 * 1024;
/// Container extensions accepted for upload.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "wmv", "flv", "webm"];

/// YouTube uploader configuration.
#[derive(Debug, Clone)]
pub struct YoutubeConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Google `client_secret.json`, used when id and secret are not set directly
    pub credentials_file: PathBuf,
    pub token_file: PathBuf,
    pub upload_base_url: String,
    pub token_uri: Option<String>,
    pub revoke_uri: String,
    pub oauth_port: u16,
    pub consent_timeout: Duration,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            credentials_file: PathBuf::from("client_secret.json"),
            token_file: PathBuf::from("youtube_token.json"),
            upload_base_url: DEFAULT_UPLOAD_BASE_URL.to_string(),
            token_uri: None,
            revoke_uri: DEFAULT_REVOKE_URI.to_string(),
            oauth_port: 0,
            consent_timeout: Duration::from_secs(300),
            timeout: Duration::from_secs(600),
            max_retries: 3,
        }
    }
}

impl YoutubeConfig {
    /// Read `YOUTUBE_*` settings. Nothing is required here; missing
    /// credentials surface when an upload is attempted.
    pub fn from_reader(env: &mut EnvReader) -> Self {
        let defaults = Self::default();
        Self {
            client_id: env.optional("YOUTUBE_CLIENT_ID"),
            client_secret: env.optional("YOUTUBE_CLIENT_SECRET"),
            credentials_file: env
                .optional("YOUTUBE_CREDENTIALS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.credentials_file),
            token_file: env
                .optional("YOUTUBE_TOKEN_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.token_file),
            upload_base_url: env.string("YOUTUBE_UPLOAD_BASE_URL", DEFAULT_UPLOAD_BASE_URL),
            token_uri: env.optional("YOUTUBE_TOKEN_URI"),
            revoke_uri: env.string("YOUTUBE_REVOKE_URI", DEFAULT_REVOKE_URI),
            oauth_port: env.parse("YOUTUBE_OAUTH_PORT", defaults.oauth_port),
            consent_timeout: Duration::from_secs(env.parse("YOUTUBE_CONSENT_TIMEOUT_SECS", 300)),
            timeout: Duration::from_secs(env.parse("YOUTUBE_TIMEOUT_SECS", 600)),
            max_retries: env.parse("YOUTUBE_MAX_RETRIES", defaults.max_retries),
        }
    }

    fn oauth_config(&self) -> OAuthConfig {
        OAuthConfig {
            token_file: self.token_file.clone(),
            scopes: vec![SCOPE_UPLOAD.to_string()],
            redirect_port: self.oauth_port,
            consent_timeout: self.consent_timeout,
            revoke_uri: self.revoke_uri.clone(),
        }
    }

    /// Resolve client secrets from env values or the credentials file.
    pub async fn client_secrets(&self) -> YoutubeResult<ClientSecrets> {
        let mut secrets = match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => ClientSecrets::new(id.clone(), secret.clone()),
            _ => {
                let exists = tokio::fs::try_exists(&self.credentials_file)
                    .await
                    .unwrap_or(false);
                if !exists {
                    return Err(UploadError::MissingCredentials(format!(
                        "set YOUTUBE_CLIENT_ID and YOUTUBE_CLIENT_SECRET or provide {}",
                        self.credentials_file.display()
                    )));
                }
                ClientSecrets::load(&self.credentials_file).await?
            }
        };
        if let Some(uri) = &self.token_uri {
            secrets.token_uri = uri.clone();
        }
        Ok(secrets)
    }
}

/// MIME type sent with the upload, by extension.
fn video_content_type(path: &Path) -> &'static str {
    match extension_of(path).as_deref() {
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("wmv") => "video/x-ms-wmv",
        Some("flv") => "video/x-flv",
        Some("webm") => "video/webm",
        _ => "video/mp4",
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Check that a file can be uploaded. Returns its size.
pub async fn validate_video_file(path: &Path) -> YoutubeResult<u64> {
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(UploadError::InvalidVideo(format!(
                "{} does not exist",
                path.display()
            )))
        }
        Err(e) => return Err(UploadError::Io(e)),
    };

    if !meta.is_file() {
        return Err(UploadError::InvalidVideo(format!(
            "{} is not a file",
            path.display()
        )));
    }
    if meta.len() == 0 {
        return Err(UploadError::InvalidVideo(format!("{} is empty", path.display())));
    }
    if meta.len() > MAX_VIDEO_BYTES {
        return Err(UploadError::InvalidVideo(format!(
            "{} is {} bytes, above the 2 GiB limit",
            path.display(),
            meta.len()
        )));
    }
    match extension_of(path) {
        Some(ext) if ACCEPTED_EXTENSIONS.contains(&ext.as_str()) => Ok(meta.len()),
        other => Err(UploadError::InvalidVideo(format!(
            "unsupported extension {:?}; expected one of {}",
            other.unwrap_or_default(),
            ACCEPTED_EXTENSIONS.join(", ")
        ))),
    }
}

#[derive(Debug, Serialize)]
struct VideoResource<'a> {
    snippet: Snippet<'a>,
    status: Status<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Snippet<'a> {
    title: &'a str,
    description: &'a str,
    tags: &'a [String],
    category_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Status<'a> {
    privacy_status: &'a str,
    self_declared_made_for_kids: bool,
}

impl<'a> VideoResource<'a> {
    fn from_metadata(metadata: &'a VideoMetadata) -> Self {
        Self {
            snippet: Snippet {
                title: &metadata.title,
                description: &metadata.description,
                tags: &metadata.tags,
                category_id: &metadata.category_id,
            },
            status: Status {
                privacy_status: metadata.privacy.as_str(),
                self_declared_made_for_kids: false,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadedVideo {
    id: String,
}

/// YouTube uploader.
pub struct YoutubeClient {
    http: Client,
    config: YoutubeConfig,
}

impl YoutubeClient {
    pub fn new(config: YoutubeConfig) -> YoutubeResult<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    async fn access_token(&self) -> YoutubeResult<String> {
        let secrets = self.config.client_secrets().await?;
        OAuthClient::new(self.http.clone(), secrets, self.config.oauth_config())
            .access_token()
            .await
    }

    fn retry_config(&self, operation: &str) -> RetryConfig {
        RetryConfig::new(operation).with_max_retries(self.config.max_retries)
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/youtube/v3/{}",
            self.config.upload_base_url.trim_end_matches('/'),
            path
        )
    }

    /// Open a resumable session. Returns the session URI.
    async fn start_session(
        &self,
        token: &str,
        metadata: &VideoMetadata,
        content_type: &str,
        size: u64,
    ) -> YoutubeResult<String> {
        let url = self.api_url("videos");
        let resource = VideoResource::from_metadata(metadata);
        let bearer = format!("Bearer {}", token);

        retry_async(&self.retry_config("youtube upload session"), || async {
            let response = self
                .http
                .post(&url)
                .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
                .header(AUTHORIZATION, &bearer)
                .header("X-Upload-Content-Type", content_type)
                .header("X-Upload-Content-Length", size.to_string())
                .json(&resource)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(UploadError::from_response(status, &body));
            }
            response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
                .ok_or_else(|| UploadError::Rejected {
                    status: status.as_u16(),
                    message: "upload session response had no Location header".into(),
                })
        })
        .await
    }

    /// Send the file to an open session. Returns the new video id.
    async fn send_file(
        &self,
        session_uri: &str,
        token: &str,
        path: &Path,
        content_type: &str,
        size: u64,
    ) -> YoutubeResult<String> {
        let bearer = format!("Bearer {}", token);

        retry_async(&self.retry_config("youtube upload"), || async {
            let file = tokio::fs::File::open(path).await?;
            let response = self
                .http
                .put(session_uri)
                .header(AUTHORIZATION, &bearer)
                .header(CONTENT_TYPE, content_type)
                .header(CONTENT_LENGTH, size)
                .body(Body::from(file))
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(UploadError::from_response(status, &body));
            }
            let video: UploadedVideo = response.json().await?;
            Ok(video.id)
        })
        .await
    }
}

#[async_trait]
impl VideoHost for YoutubeClient {
    async fn upload(&self, video: &Path, metadata: &VideoMetadata) -> YoutubeResult<UploadResult> {
        let size = validate_video_file(video).await?;
        let content_type = video_content_type(video);
        let token = self.access_token().await?;

        info!(
            path = %video.display(),
            bytes = size,
            privacy = %metadata.privacy,
            "Starting YouTube upload"
        );

        let session = self.start_session(&token, metadata, content_type, size).await?;
        debug!("Resumable session opened");

        let id = self
            .send_file(&session, &token, video, content_type, size)
            .await?;
        let result = UploadResult::youtube(id);
        info!(video_id = %result.video_id, url = %result.url, "Upload complete");
        Ok(result)
    }

    async fn set_thumbnail(&self, video_id: &str, thumbnail: &Path) -> YoutubeResult<()> {
        let bytes = tokio::fs::read(thumbnail).await?;
        let token = self.access_token().await?;

        let response = self
            .http
            .post(self.api_url("thumbnails/set"))
            .query(&[("videoId", video_id)])
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(CONTENT_TYPE, "image/jpeg")
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = UploadError::from_response(status, &body);
            warn!(video_id, code = err.code(), "Thumbnail upload failed");
            return Err(err);
        }
        debug!(video_id, "Thumbnail set");
        Ok(())
    }

    async fn revoke(&self) -> YoutubeResult<bool> {
        revoke_cached_token(&self.http, &self.config.oauth_config()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shorts_models::PrivacyStatus;

    #[tokio::test]
    async fn test_validate_video_file() {
        let dir = tempfile::TempDir::new().unwrap();

        let missing = dir.path().join("missing.mp4");
        assert_eq!(
            validate_video_file(&missing).await.unwrap_err().code(),
            "invalid_video"
        );

        let empty = dir.path().join("empty.mp4");
        tokio::fs::write(&empty, b"").await.unwrap();
        assert!(validate_video_file(&empty).await.is_err());

        let text = dir.path().join("clip.txt");
        tokio::fs::write(&text, b"data").await.unwrap();
        assert!(validate_video_file(&text).await.is_err());

        let ok = dir.path().join("clip.MP4");
        tokio::fs::write(&ok, b"data").await.unwrap();
        assert_eq!(validate_video_file(&ok).await.unwrap(), 4);
    }

    #[test]
    fn test_video_resource_json() {
        let metadata = VideoMetadata {
            title: "Title".into(),
            description: "Desc".into(),
            tags: vec!["a".into()],
            category_id: "27".into(),
            privacy: PrivacyStatus::Unlisted,
        };
        let json = serde_json::to_value(VideoResource::from_metadata(&metadata)).unwrap();
        assert_eq!(json["snippet"]["categoryId"], "27");
        assert_eq!(json["status"]["privacyStatus"], "unlisted");
        assert_eq!(json["status"]["selfDeclaredMadeForKids"], false);
    }

    #[tokio::test]
    async fn test_client_secrets_resolution() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = YoutubeConfig {
            credentials_file: dir.path().join("absent.json"),
            ..Default::default()
        };
        assert_eq!(
            config.client_secrets().await.unwrap_err().code(),
            "missing_credentials"
        );

        let config = YoutubeConfig {
            client_id: Some("id".into()),
            client_secret: Some("secret".into()),
            token_uri: Some("http://localhost/token".into()),
            ..config
        };
        let secrets = config.client_secrets().await.unwrap();
        assert_eq!(secrets.client_id, "id");
        assert_eq!(secrets.token_uri, "http://localhost/token");
    }

    #[test]
    fn test_content_type() {
        assert_eq!(video_content_type(Path::new("a.mp4")), "video/mp4");
        assert_eq!(video_content_type(Path::new("a.MOV")), "video/quicktime");
    }
}
