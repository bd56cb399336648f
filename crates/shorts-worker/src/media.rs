//! Media toolkit seam over ffmpeg.
//!
//! Stages call ffmpeg only through [`MediaToolkit`], so the orchestrator can
//! be tested without the binaries installed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use shorts_media::{
    check_ffmpeg, check_ffprobe, FfmpegRunner, MediaInfo, MediaResult, SlideshowSpec,
    SubtitleStyle, ThumbnailCaption,
};
use shorts_models::EncodingConfig;

#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Render and verify the slideshow. Returns the probed output.
    async fn render_slideshow(
        &self,
        images: &[PathBuf],
        audio: &Path,
        output: &Path,
        spec: &SlideshowSpec,
    ) -> MediaResult<MediaInfo>;

    /// Burn an SRT file into `video`, writing `output`.
    async fn burn_subtitles(
        &self,
        video: &Path,
        srt: &Path,
        output: &Path,
        style: &SubtitleStyle,
        encoding: &EncodingConfig,
    ) -> MediaResult<()>;

    /// Extract a JPEG thumbnail, with the caption drawn over it when given.
    async fn thumbnail(
        &self,
        video: &Path,
        output: &Path,
        duration_secs: f64,
        caption: Option<&ThumbnailCaption>,
    ) -> MediaResult<()>;

    /// Locate the external tools. Returns their paths.
    fn check_tools(&self) -> MediaResult<Vec<PathBuf>>;
}

/// [`MediaToolkit`] backed by the ffmpeg and ffprobe binaries.
#[derive(Clone, Default)]
pub struct FfmpegToolkit {
    runner: FfmpegRunner,
}

impl FfmpegToolkit {
    pub fn new(timeout: Duration) -> Self {
        Self {
            runner: FfmpegRunner::new().with_timeout(timeout.as_secs().max(1)),
        }
    }

    /// Kill running ffmpeg processes when `cancel_rx` turns true.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.runner = self.runner.with_cancel(cancel_rx);
        self
    }
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    async fn render_slideshow(
        &self,
        images: &[PathBuf],
        audio: &Path,
        output: &Path,
        spec: &SlideshowSpec,
    ) -> MediaResult<MediaInfo> {
        shorts_media::render_slideshow(images, audio, output, spec, &self.runner).await
    }

    async fn burn_subtitles(
        &self,
        video: &Path,
        srt: &Path,
        output: &Path,
        style: &SubtitleStyle,
        encoding: &EncodingConfig,
    ) -> MediaResult<()> {
        shorts_media::burn_subtitles(video, srt, output, style, encoding, &self.runner).await
    }

    async fn thumbnail(
        &self,
        video: &Path,
        output: &Path,
        duration_secs: f64,
        caption: Option<&ThumbnailCaption>,
    ) -> MediaResult<()> {
        shorts_media::generate_thumbnail(video, output, duration_secs, caption, &self.runner).await
    }

    fn check_tools(&self) -> MediaResult<Vec<PathBuf>> {
        Ok(vec![check_ffmpeg()?, check_ffprobe()?])
    }
}
