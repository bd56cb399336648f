//! Subtitle stage: timed captions burned into the rendered video, then
//! delivered to the output directory with an SRT and a thumbnail.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use shorts_media::subtitles::validate_cues;
use shorts_media::{ensure_dir, move_file, plan_cues, write_srt, Cue, ThumbnailCaption};
use shorts_models::timestamp::seconds_to_ms;
use shorts_models::{EncodingConfig, NarrationAudio, RenderedVideo, SubtitledVideo};

use crate::config::SubtitleSettings;
use crate::error::{StageError, StageResult};
use crate::media::MediaToolkit;
use crate::workspace::RunWorkspace;

/// Plan cues for the narration over `min(audio, video)`.
pub fn plan_for(
    narration: &str,
    audio: &NarrationAudio,
    rendered: &RenderedVideo,
    min_cue_ms: u64,
) -> StageResult<Vec<Cue>> {
    let video_ms = seconds_to_ms(rendered.duration_secs);
    let span_ms = seconds_to_ms(audio.duration_secs).min(video_ms);

    let cues = plan_cues(narration, span_ms, min_cue_ms);
    if cues.is_empty() {
        return Err(StageError::integrity(format!(
            "no subtitle cues for a {}ms span",
            span_ms
        )));
    }
    validate_cues(&cues, video_ms).map_err(|e| StageError::integrity(e.to_string()))?;
    Ok(cues)
}

/// Burn captions and deliver the final video to `output`.
///
/// The thumbnail carries `title` in the subtitle font.
#[allow(clippy::too_many_arguments)]
pub async fn add_subtitles(
    media: &dyn MediaToolkit,
    rendered: &RenderedVideo,
    audio: &NarrationAudio,
    narration: &str,
    title: &str,
    settings: &SubtitleSettings,
    encoding: &EncodingConfig,
    workspace: &RunWorkspace,
    output: &Path,
) -> StageResult<SubtitledVideo> {
    let cues = plan_for(narration, audio, rendered, settings.min_cue_ms)?;

    let srt = workspace.path("narration.srt");
    write_srt(&cues, &srt).await?;

    let burned = workspace.path("subtitled.mp4");
    media
        .burn_subtitles(&rendered.path, &srt, &burned, &settings.style, encoding)
        .await?;

    if let Some(dir) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(dir).await?;
    }
    move_file(&burned, output).await?;
    let srt_path = output.with_extension("srt");
    move_file(&srt, &srt_path).await?;

    let caption = ThumbnailCaption {
        text: title.to_string(),
        font_name: settings.style.font_name.clone(),
    };
    let thumbnail_path = thumbnail(media, output, rendered.duration_secs, &caption).await;

    info!(
        path = %output.display(),
        cues = cues.len(),
        "Subtitled video delivered"
    );
    Ok(SubtitledVideo {
        path: output.to_path_buf(),
        srt_path,
        cue_count: cues.len(),
        thumbnail_path,
    })
}

/// Best-effort thumbnail next to the video.
async fn thumbnail(
    media: &dyn MediaToolkit,
    video: &Path,
    duration_secs: f64,
    caption: &ThumbnailCaption,
) -> Option<PathBuf> {
    let path = video.with_extension("jpg");
    match media.thumbnail(video, &path, duration_secs, Some(caption)).await {
        Ok(()) => Some(path),
        Err(e) => {
            warn!(video = %video.display(), "Thumbnail generation failed: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio(secs: f64) -> NarrationAudio {
        NarrationAudio {
            path: PathBuf::from("narration.wav"),
            duration_secs: secs,
            sample_rate: 24000,
        }
    }

    fn rendered(secs: f64) -> RenderedVideo {
        RenderedVideo {
            path: PathBuf::from("rendered.mp4"),
            duration_secs: secs,
            width: 1080,
            height: 1920,
        }
    }

    #[test]
    fn test_cues_stay_inside_shorter_track() {
        let cues = plan_for("一文目です。二文目です。三文目です。", &audio(12.0), &rendered(30.0), 1000)
            .unwrap();
        assert_eq!(cues.len(), 3);
        assert_eq!(cues.last().unwrap().end_ms, 12_000);

        let cut = plan_for("一文目です。二文目です。", &audio(40.0), &rendered(30.0), 1000).unwrap();
        assert_eq!(cut.last().unwrap().end_ms, 30_000);
    }

    #[test]
    fn test_cues_are_contiguous() {
        let cues = plan_for("A. Bb. Ccc. Dddd.", &audio(20.0), &rendered(20.0), 500).unwrap();
        for pair in cues.windows(2) {
            assert_eq!(pair[0].end_ms, pair[1].start_ms);
        }
    }

    #[test]
    fn test_empty_narration_is_integrity_error() {
        let err = plan_for("   ", &audio(10.0), &rendered(10.0), 1000).unwrap_err();
        assert!(matches!(err, StageError::Integrity(_)));
    }
}
