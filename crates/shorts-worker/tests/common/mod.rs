//! Deterministic fakes for orchestrator tests.

#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{ImageOutputFormat, Rgb, RgbImage};
use tempfile::TempDir;

use shorts_media::{
    MediaError, MediaInfo, MediaResult, SlideshowSpec, SubtitleStyle, ThumbnailCaption,
};
use shorts_models::{EncodingConfig, UploadResult, VideoMetadata};
use shorts_services::{
    DownloadedImage, ImageCandidate, ImageSearch, Orientation, ServiceError, ServiceResult,
    SpeechSynthesizer, TextGenerator, UploadError, VideoHost, VoiceParams, YoutubeResult,
};
use shorts_worker::{MediaToolkit, Pipeline, PipelineConfig, Services};

pub const SCRIPT_JSON: &str = r#"{"title": "深海のふしぎ", "narration": "深海には不思議な生き物がたくさんいます。光る魚もいます。", "keywords": ["deep sea", "jellyfish", "ocean"]}"#;

/// Returns a fixed response.
pub struct FakeText {
    pub response: Mutex<String>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl TextGenerator for FakeText {
    async fn generate(&self, _prompt: &str) -> ServiceResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self.response.lock().map(|r| r.clone()).unwrap_or_default();
        Ok(response)
    }
}

/// PNG with the id written into its first row, so every id has distinct bytes.
pub fn png_for(id: &str) -> Vec<u8> {
    let id = id.as_bytes().to_vec();
    let img = RgbImage::from_fn(32, 48, |x, y| {
        if y == 0 && (x as usize) < id.len() {
            Rgb([id[x as usize], 0, 0])
        } else {
            Rgb([x as u8, y as u8, 128])
        }
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageOutputFormat::Png).unwrap();
    out.into_inner()
}

/// Three candidates per query; `bad` serves HTML instead of images.
pub struct FakeImages {
    pub bad: AtomicBool,
    pub queries: Mutex<Vec<String>>,
}

#[async_trait]
impl ImageSearch for FakeImages {
    async fn search(
        &self,
        query: &str,
        _per_page: u32,
        _orientation: Orientation,
    ) -> ServiceResult<Vec<ImageCandidate>> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok((0..3)
            .map(|i| {
                let id = format!("{}-{}", query.replace(' ', "_"), i);
                ImageCandidate {
                    url: format!("https://images.test/{}", id),
                    id,
                    width: 32,
                    height: 48,
                    description: None,
                }
            })
            .collect())
    }

    async fn download(&self, candidate: &ImageCandidate) -> ServiceResult<DownloadedImage> {
        if self.bad.load(Ordering::SeqCst) {
            return Ok(DownloadedImage {
                bytes: b"<html>rate limited</html>".to_vec(),
                content_type: Some("image/png".to_string()),
            });
        }
        Ok(DownloadedImage {
            bytes: png_for(&candidate.id),
            content_type: Some("image/png".to_string()),
        })
    }
}

/// 0.1 s of tone per character; `unreachable` fails like a stopped engine.
pub struct FakeSpeech {
    pub unreachable: AtomicBool,
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(&self, text: &str, _params: &VoiceParams) -> ServiceResult<Vec<u8>> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ServiceError::Unavailable(
                "VOICEVOX is not reachable at http://127.0.0.1:50021".to_string(),
            ));
        }
        let samples: Vec<i16> = (0..text.chars().count() * 2400)
            .map(|i| ((i % 100) as i16 - 50) * 100)
            .collect();
        Ok(shorts_media::wav::encode_pcm16(&samples, 24000).unwrap())
    }

    async fn health_check(&self) -> ServiceResult<String> {
        Ok("0.0.0-test".to_string())
    }
}

/// Writes placeholder files instead of running ffmpeg.
pub struct FakeMedia {
    pub thumbnail_fails: AtomicBool,
    pub rendered_images: Mutex<Vec<PathBuf>>,
    pub captions: Mutex<Vec<ThumbnailCaption>>,
}

#[async_trait]
impl MediaToolkit for FakeMedia {
    async fn render_slideshow(
        &self,
        images: &[PathBuf],
        audio: &Path,
        output: &Path,
        spec: &SlideshowSpec,
    ) -> MediaResult<MediaInfo> {
        assert!(audio.exists(), "narration must exist before rendering");
        for image in images {
            assert!(image.exists(), "image {} missing", image.display());
        }
        *self.rendered_images.lock().unwrap() = images.to_vec();
        tokio::fs::write(output, b"rendered video").await?;
        Ok(MediaInfo {
            duration: spec.duration_secs,
            width: spec.width,
            height: spec.height,
            fps: spec.fps as f64,
            video_codec: Some("h264".to_string()),
            audio_codec: Some("aac".to_string()),
            sample_rate: Some(24000),
            size: 14,
        })
    }

    async fn burn_subtitles(
        &self,
        video: &Path,
        srt: &Path,
        output: &Path,
        _style: &SubtitleStyle,
        _encoding: &EncodingConfig,
    ) -> MediaResult<()> {
        let srt = tokio::fs::read_to_string(srt).await?;
        assert!(srt.starts_with("1\n00:00:00,000 --> "), "unexpected SRT: {srt}");
        tokio::fs::copy(video, output).await?;
        Ok(())
    }

    async fn thumbnail(
        &self,
        _video: &Path,
        output: &Path,
        _duration_secs: f64,
        caption: Option<&ThumbnailCaption>,
    ) -> MediaResult<()> {
        self.captions.lock().unwrap().extend(caption.cloned());
        if self.thumbnail_fails.load(Ordering::SeqCst) {
            return Err(MediaError::invalid_media("no frame at 1s"));
        }
        tokio::fs::write(output, b"jpeg").await?;
        Ok(())
    }

    fn check_tools(&self) -> MediaResult<Vec<PathBuf>> {
        Ok(Vec::new())
    }
}

/// Records uploads; `quota` fails like an exhausted daily quota.
pub struct FakeHost {
    pub quota: AtomicBool,
    pub uploads: Mutex<Vec<(PathBuf, VideoMetadata)>>,
    pub thumbnails: Mutex<Vec<String>>,
}

#[async_trait]
impl VideoHost for FakeHost {
    async fn upload(&self, video: &Path, metadata: &VideoMetadata) -> YoutubeResult<UploadResult> {
        if self.quota.load(Ordering::SeqCst) {
            return Err(UploadError::QuotaExceeded(
                "The request cannot be completed because you have exceeded your quota."
                    .to_string(),
            ));
        }
        self.uploads
            .lock()
            .unwrap()
            .push((video.to_path_buf(), metadata.clone()));
        Ok(UploadResult::youtube("vid123"))
    }

    async fn set_thumbnail(&self, video_id: &str, _thumbnail: &Path) -> YoutubeResult<()> {
        self.thumbnails.lock().unwrap().push(video_id.to_string());
        Ok(())
    }

    async fn revoke(&self) -> YoutubeResult<bool> {
        Ok(false)
    }
}

/// Fakes plus a configuration rooted in a temp directory.
pub struct Harness {
    pub dir: TempDir,
    pub config: PipelineConfig,
    pub text: Arc<FakeText>,
    pub images: Arc<FakeImages>,
    pub speech: Arc<FakeSpeech>,
    pub media: Arc<FakeMedia>,
    pub host: Arc<FakeHost>,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();

        let mut config = PipelineConfig::default();
        config.video.duration_secs = 10;
        config.output_dir = dir.path().join("output");
        config.temp_dir = dir.path().join("temp");
        config.images.min_bytes = 10;
        config.images.min_width = 20;
        config.images.min_height = 20;

        Self {
            dir,
            config,
            text: Arc::new(FakeText {
                response: Mutex::new(SCRIPT_JSON.to_string()),
                calls: AtomicUsize::new(0),
            }),
            images: Arc::new(FakeImages {
                bad: AtomicBool::new(false),
                queries: Mutex::new(Vec::new()),
            }),
            speech: Arc::new(FakeSpeech {
                unreachable: AtomicBool::new(false),
            }),
            media: Arc::new(FakeMedia {
                thumbnail_fails: AtomicBool::new(false),
                rendered_images: Mutex::new(Vec::new()),
                captions: Mutex::new(Vec::new()),
            }),
            host: Arc::new(FakeHost {
                quota: AtomicBool::new(false),
                uploads: Mutex::new(Vec::new()),
                thumbnails: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn services(&self) -> Services {
        Services {
            text: self.text.clone(),
            images: self.images.clone(),
            speech: self.speech.clone(),
            host: Some(self.host.clone()),
            media: self.media.clone(),
        }
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.config.clone(), self.services())
    }

    /// Run workspaces left under the temp directory.
    pub fn run_dirs(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(&self.config.temp_dir) else {
            return Vec::new();
        };
        let mut dirs: Vec<PathBuf> = entries.map(|e| e.unwrap().path()).collect();
        dirs.sort();
        dirs
    }

    /// Files in the output directory.
    pub fn outputs(&self) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(&self.config.output_dir) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = entries.map(|e| e.unwrap().path()).collect();
        files.sort();
        files
    }
}
