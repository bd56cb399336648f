//! Artifacts handed between pipeline stages.
//!
//! Every artifact points at a file on local disk. A stage exclusively owns
//! its output until it is passed to the next stage.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A downloaded, integrity-checked image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageArtifact {
    /// Local file path
    pub path: PathBuf,
    /// Identifier assigned by the image service
    pub source_id: String,
    /// Decoded width in pixels
    pub width: u32,
    /// Decoded height in pixels
    pub height: u32,
    /// File size in bytes
    pub bytes: u64,
}

/// Ordered images for the slideshow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageSet(pub Vec<ImageArtifact>);

impl ImageSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ImageArtifact> {
        self.0.iter()
    }

    /// Local paths in slideshow order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.0.iter().map(|i| i.path.clone()).collect()
    }
}

/// Synthesized narration track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationAudio {
    /// WAV file path
    pub path: PathBuf,
    /// Duration in seconds (always > 0)
    pub duration_secs: f64,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

/// Slideshow with narration soundtrack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedVideo {
    pub path: PathBuf,
    /// Probed duration in seconds
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
}

/// Rendered video with captions burned in, delivered to the output directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitledVideo {
    pub path: PathBuf,
    /// Sidecar SRT file
    pub srt_path: PathBuf,
    /// Number of caption cues
    pub cue_count: usize,
    /// Thumbnail extracted from the final video, if it could be produced
    pub thumbnail_path: Option<PathBuf>,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub video_id: String,
    pub url: String,
}

impl UploadResult {
    /// Build the canonical watch URL for a YouTube video id.
    pub fn youtube(video_id: impl Into<String>) -> Self {
        let video_id = video_id.into();
        let url = format!("https://www.youtube.com/watch?v={}", video_id);
        Self { video_id, url }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_result_url() {
        let result = UploadResult::youtube("abc123");
        assert_eq!(result.url, "https://www.youtube.com/watch?v=abc123");
    }

    #[test]
    fn test_image_set_order() {
        let set = ImageSet(vec![
            ImageArtifact {
                path: PathBuf::from("b.jpg"),
                source_id: "b".into(),
                width: 1,
                height: 1,
                bytes: 1,
            },
            ImageArtifact {
                path: PathBuf::from("a.jpg"),
                source_id: "a".into(),
                width: 1,
                height: 1,
                bytes: 1,
            },
        ]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.paths()[0], PathBuf::from("b.jpg"));
    }
}
