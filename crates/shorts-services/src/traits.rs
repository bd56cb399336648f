//! Service seams used by the pipeline stages.
//!
//! Each external service is reached through exactly one trait so stages can
//! run against deterministic fakes.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use shorts_models::{UploadResult, VideoMetadata};

use crate::error::ServiceResult;
use crate::youtube::YoutubeResult;

/// Generates text from a prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> ServiceResult<String>;
}

/// Requested image orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
    Squarish,
}

impl Orientation {
    /// Orientation matching a frame size.
    pub fn for_frame(width: u32, height: u32) -> Self {
        match height.cmp(&width) {
            std::cmp::Ordering::Greater => Orientation::Portrait,
            std::cmp::Ordering::Less => Orientation::Landscape,
            std::cmp::Ordering::Equal => Orientation::Squarish,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Landscape => "landscape",
            Orientation::Portrait => "portrait",
            Orientation::Squarish => "squarish",
        }
    }
}

/// A search hit that has not been downloaded yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCandidate {
    /// Service-assigned identifier
    pub id: String,
    /// Download URL
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub description: Option<String>,
}

/// Raw downloaded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedImage {
    pub bytes: Vec<u8>,
    /// `Content-Type` reported by the server
    pub content_type: Option<String>,
}

/// Searches for and downloads stock images.
#[async_trait]
pub trait ImageSearch: Send + Sync {
    async fn search(
        &self,
        query: &str,
        per_page: u32,
        orientation: Orientation,
    ) -> ServiceResult<Vec<ImageCandidate>>;

    async fn download(&self, candidate: &ImageCandidate) -> ServiceResult<DownloadedImage>;
}

/// Voice parameters for one synthesis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceParams {
    pub speaker_id: u32,
    /// Base speaking rate (1.0 = normal)
    pub speed_scale: f64,
    /// Upper bound on spoken seconds for this text; the synthesizer speeds up to fit
    pub max_secs: Option<f64>,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            speaker_id: 3,
            speed_scale: 1.0,
            max_secs: None,
        }
    }
}

/// Turns text into WAV audio.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize one chunk of text. Returns WAV bytes.
    async fn synthesize(&self, text: &str, params: &VoiceParams) -> ServiceResult<Vec<u8>>;

    /// Check the engine is reachable. Returns its version string.
    async fn health_check(&self) -> ServiceResult<String>;
}

/// Receives finished videos.
#[async_trait]
pub trait VideoHost: Send + Sync {
    async fn upload(&self, video: &Path, metadata: &VideoMetadata) -> YoutubeResult<UploadResult>;

    async fn set_thumbnail(&self, video_id: &str, thumbnail: &Path) -> YoutubeResult<()>;

    /// Forget cached credentials. Returns whether anything was removed.
    async fn revoke(&self) -> YoutubeResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_for_frame() {
        assert_eq!(Orientation::for_frame(1080, 1920), Orientation::Portrait);
        assert_eq!(Orientation::for_frame(1920, 1080), Orientation::Landscape);
        assert_eq!(Orientation::for_frame(1080, 1080), Orientation::Squarish);
    }
}
