//! Timed slideshow rendering.
//!
//! Every slideshow is exactly `round(duration * fps)` frames long. The frame
//! budget is split evenly across the images; the first `F mod N` images hold
//! one extra frame. The narration is padded with silence or cut so the audio
//! track matches the video.
//!
//! Neighbouring slides cross through black: each slide fades out over its
//! last half second and the next fades in over its first. The fades are
//! frame-indexed inside each slide, so they never change the frame counts.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use shorts_models::EncodingConfig;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters;
use crate::fs_utils::require_non_empty;
use crate::probe::{probe_media, MediaInfo};
use crate::progress::ProgressLogger;

/// Extra tolerance on top of one frame when checking rendered duration.
pub const DURATION_SLACK_SECS: f64 = 0.05;
/// Length of each fade between slides.
pub const FADE_SECS: f64 = 0.5;

/// Output geometry and timing.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideshowSpec {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Target duration in seconds
    pub duration_secs: f64,
    pub encoding: EncodingConfig,
}

impl SlideshowSpec {
    /// Total frame budget.
    pub fn total_frames(&self) -> u64 {
        ((self.duration_secs * self.fps as f64).round() as u64).max(1)
    }

    /// Duration after rounding to whole frames.
    pub fn frame_exact_duration(&self) -> f64 {
        self.total_frames() as f64 / self.fps as f64
    }

    /// Frames per fade at this frame rate.
    pub fn fade_frames(&self) -> u64 {
        (FADE_SECS * self.fps as f64).round() as u64
    }

    /// Allowed deviation of the probed output.
    pub fn tolerance(&self) -> f64 {
        1.0 / self.fps as f64 + DURATION_SLACK_SECS
    }

    fn check(&self) -> MediaResult<()> {
        if self.fps == 0 || self.width == 0 || self.height == 0 {
            return Err(MediaError::invalid_input(
                "slideshow needs non-zero width, height and fps",
            ));
        }
        if !(self.duration_secs > 0.0) {
            return Err(MediaError::invalid_input("slideshow duration must be positive"));
        }
        Ok(())
    }
}

/// One image held on screen for a number of frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slide {
    pub path: PathBuf,
    pub frames: u64,
}

impl Slide {
    pub fn seconds(&self, fps: u32) -> f64 {
        self.frames as f64 / fps as f64
    }
}

/// Split the frame budget across the images.
///
/// When there are more images than frames, only the first `F` images are shown.
pub fn plan_slides(images: &[PathBuf], spec: &SlideshowSpec) -> MediaResult<Vec<Slide>> {
    spec.check()?;
    if images.is_empty() {
        return Err(MediaError::invalid_input("slideshow needs at least one image"));
    }

    let total = spec.total_frames();
    let count = (images.len() as u64).min(total);
    let base = total / count;
    let extra = total % count;

    Ok(images
        .iter()
        .take(count as usize)
        .enumerate()
        .map(|(i, path)| Slide {
            path: path.clone(),
            frames: base + u64::from((i as u64) < extra),
        })
        .collect())
}

/// Build the ffmpeg invocation for a planned slideshow.
pub fn build_slideshow_command(
    slides: &[Slide],
    audio: &Path,
    output: &Path,
    spec: &SlideshowSpec,
) -> FfmpegCommand {
    let fps = spec.fps.to_string();
    let mut cmd = FfmpegCommand::new(output);
    let mut graph = String::new();

    for (i, slide) in slides.iter().enumerate() {
        // Bound the looped input slightly past what trim keeps
        let input_secs = format!("{:.6}", (slide.frames + 2) as f64 / spec.fps as f64);
        cmd = cmd.input_with_args(
            ["-loop", "1", "-framerate", fps.as_str(), "-t", input_secs.as_str()],
            &slide.path,
        );
        let mut chain = vec![
            filters::fit_and_pad(spec.width, spec.height, spec.fps),
            filters::hold_frames(slide.frames),
        ];
        chain.extend(filters::slide_fades(
            slide.frames,
            spec.fade_frames(),
            i > 0,
            i + 1 < slides.len(),
        ));
        graph.push_str(&format!("[{i}:v]{}[v{i}];", chain.join(","), i = i));
    }

    for i in 0..slides.len() {
        graph.push_str(&format!("[v{}]", i));
    }
    let audio_index = slides.len();
    let duration = spec.frame_exact_duration();
    graph.push_str(&format!(
        "concat=n={}:v=1:a=0[vout];[{}:a]{}[aout]",
        slides.len(),
        audio_index,
        filters::pad_and_trim_audio(duration)
    ));

    cmd.input(audio)
        .filter_complex(graph)
        .map("[vout]")
        .map("[aout]")
        .video_codec(&spec.encoding.codec)
        .preset(&spec.encoding.preset)
        .crf(spec.encoding.crf)
        .pixel_format(&spec.encoding.pixel_format)
        .frame_rate(spec.fps)
        .audio_codec(&spec.encoding.audio_codec)
        .audio_bitrate(&spec.encoding.audio_bitrate)
        .duration(duration)
        .faststart()
}

/// Check a probed render against the spec.
pub fn verify_render(info: &MediaInfo, spec: &SlideshowSpec) -> MediaResult<()> {
    if !info.has_video() {
        return Err(MediaError::invalid_media("rendered file has no video stream"));
    }
    if !info.has_audio() {
        return Err(MediaError::invalid_media("rendered file has no audio stream"));
    }
    if info.width != spec.width || info.height != spec.height {
        return Err(MediaError::invalid_media(format!(
            "rendered resolution {}x{} differs from {}x{}",
            info.width, info.height, spec.width, spec.height
        )));
    }

    let expected = spec.frame_exact_duration();
    let tolerance = spec.tolerance();
    if (info.duration - expected).abs() > tolerance {
        return Err(MediaError::DurationMismatch {
            expected,
            actual: info.duration,
            tolerance,
        });
    }
    Ok(())
}

/// Render the slideshow, then probe and verify the result.
pub async fn render_slideshow(
    images: &[PathBuf],
    audio: &Path,
    output: &Path,
    spec: &SlideshowSpec,
    runner: &FfmpegRunner,
) -> MediaResult<MediaInfo> {
    require_non_empty(audio).await?;
    for image in images {
        require_non_empty(image).await?;
    }

    let slides = plan_slides(images, spec)?;
    debug!(
        frames = ?slides.iter().map(|s| s.frames).collect::<Vec<_>>(),
        "Planned slideshow"
    );

    let cmd = build_slideshow_command(&slides, audio, output, spec);
    let mut logger = ProgressLogger::new("slideshow", spec.frame_exact_duration());
    runner
        .run_with_progress(&cmd, move |p| {
            logger.observe(&p);
        })
        .await?;

    require_non_empty(output).await?;
    let info = probe_media(output).await?;
    verify_render(&info, spec)?;

    info!(
        path = %output.display(),
        duration = info.duration,
        slides = slides.len(),
        "Rendered slideshow"
    );
    Ok(info)
}
