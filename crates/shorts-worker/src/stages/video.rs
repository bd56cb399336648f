//! Video stage: images plus narration to a fixed-length slideshow.

use std::path::Path;

use tracing::info;

use shorts_media::SlideshowSpec;
use shorts_models::{EncodingConfig, ImageSet, NarrationAudio, RenderedVideo};

use crate::config::VideoSettings;
use crate::error::{StageError, StageResult};
use crate::media::MediaToolkit;

/// Slideshow parameters for the configured output.
pub fn slideshow_spec(video: &VideoSettings, encoding: &EncodingConfig) -> SlideshowSpec {
    SlideshowSpec {
        width: video.width,
        height: video.height,
        fps: video.fps,
        duration_secs: video.duration_secs as f64,
        encoding: encoding.clone(),
    }
}

/// Render the slideshow into `output`.
///
/// The duration is always the configured one: the narration is cut or
/// padded with silence to fit, and the renderer verifies the result.
pub async fn compose_video(
    media: &dyn MediaToolkit,
    images: &ImageSet,
    audio: &NarrationAudio,
    spec: &SlideshowSpec,
    output: &Path,
) -> StageResult<RenderedVideo> {
    if images.is_empty() {
        return Err(StageError::integrity("no images to compose"));
    }
    if audio.duration_secs > spec.duration_secs {
        info!(
            audio = audio.duration_secs,
            target = spec.duration_secs,
            "Narration longer than target; it will be cut"
        );
    }

    let info = media
        .render_slideshow(&images.paths(), &audio.path, output, spec)
        .await?;

    Ok(RenderedVideo {
        path: output.to_path_buf(),
        duration_secs: info.duration,
        width: info.width,
        height: info.height,
    })
}
