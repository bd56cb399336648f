//! Run orchestration.
//!
//! A run walks [`Stage::ORDER`] once. Each stage reads only what earlier
//! stages produced, and the first failure stops the run with the failing
//! stage attached.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::watch;
use tracing::Instrument;

use shorts_models::script::normalize_topic;
use shorts_models::{
    ImageSet, NarrationAudio, RenderedVideo, RunId, Script, Stage, SubtitledVideo, UploadResult,
    VideoMetadata,
};
use shorts_services::{
    GeminiClient, ImageSearch, Orientation, SpeechSynthesizer, TextGenerator, UnsplashClient,
    VideoHost, VoicevoxClient, YoutubeClient,
};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult, StageError, StageResult};
use crate::logging::RunLogger;
use crate::media::{FfmpegToolkit, MediaToolkit};
use crate::metrics;
use crate::stages;
use crate::workspace::RunWorkspace;

/// Characters of the topic kept in a generated output name.
const OUTPUT_STEM_CHARS: usize = 20;

/// External collaborators of a run.
#[derive(Clone)]
pub struct Services {
    pub text: Arc<dyn TextGenerator>,
    pub images: Arc<dyn ImageSearch>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    /// `None` when uploading is disabled
    pub host: Option<Arc<dyn VideoHost>>,
    pub media: Arc<dyn MediaToolkit>,
}

impl Services {
    /// Production clients built from configuration.
    ///
    /// `cancel` kills running ffmpeg processes when it turns true.
    pub fn from_config(
        config: &PipelineConfig,
        cancel: Option<watch::Receiver<bool>>,
    ) -> PipelineResult<Self> {
        let text = GeminiClient::new(config.gemini.clone())
            .map_err(|e| PipelineError::config(format!("Gemini client: {}", e)))?;
        let images = UnsplashClient::new(config.unsplash.clone())
            .map_err(|e| PipelineError::config(format!("Unsplash client: {}", e)))?;
        let speech = VoicevoxClient::new(config.voicevox.clone())
            .map_err(|e| PipelineError::config(format!("VOICEVOX client: {}", e)))?;

        let host: Option<Arc<dyn VideoHost>> = if config.upload.enabled {
            let client = YoutubeClient::new(config.youtube.clone())
                .map_err(|e| PipelineError::config(format!("YouTube client: {}", e)))?;
            Some(Arc::new(client))
        } else {
            None
        };

        let mut media = FfmpegToolkit::new(config.render_timeout);
        if let Some(rx) = cancel {
            media = media.with_cancel(rx);
        }

        Ok(Self {
            text: Arc::new(text),
            images: Arc::new(images),
            speech: Arc::new(speech),
            host,
            media: Arc::new(media),
        })
    }
}

/// Wall time of one stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub seconds: f64,
    pub skipped: bool,
}

/// Everything a successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub topic: String,
    pub script: Script,
    pub image_count: usize,
    /// Narration length in seconds
    pub audio_duration: f64,
    pub output_path: PathBuf,
    pub srt_path: PathBuf,
    pub thumbnail_path: Option<PathBuf>,
    pub upload: Option<UploadResult>,
    /// Kept workspace, when intermediates are retained
    pub workspace: Option<PathBuf>,
    pub stage_timings: Vec<StageTiming>,
}

impl RunReport {
    /// Total wall time over all stages.
    pub fn total_seconds(&self) -> f64 {
        self.stage_timings.iter().map(|t| t.seconds).sum()
    }
}

/// File name for the delivered video.
///
/// A given name gets `.mp4` appended when missing and may not contain a
/// path. Without one, the name is derived from the topic and `now`.
pub fn output_file_name(
    topic: &str,
    name: Option<&str>,
    now: DateTime<Local>,
) -> PipelineResult<String> {
    match name.map(str::trim) {
        Some(name) => {
            if name.is_empty() || name == "." || name == ".." {
                return Err(PipelineError::invalid_input("output name is empty"));
            }
            if name.contains(['/', '\\']) {
                return Err(PipelineError::invalid_input(format!(
                    "output name '{}' must not contain a path separator",
                    name
                )));
            }
            if name.to_ascii_lowercase().ends_with(".mp4") {
                Ok(name.to_string())
            } else {
                Ok(format!("{}.mp4", name))
            }
        }
        None => {
            let stem: String = topic
                .trim()
                .chars()
                .filter_map(|c| {
                    if c.is_alphanumeric() || c == '-' || c == '_' {
                        Some(c)
                    } else if c.is_whitespace() {
                        Some('_')
                    } else {
                        None
                    }
                })
                .take(OUTPUT_STEM_CHARS)
                .collect();
            let stem = if stem.is_empty() { "short".to_string() } else { stem };
            Ok(format!("{}_{}.mp4", stem, now.format("%Y%m%d_%H%M%S")))
        }
    }
}

/// Outputs of the stages that have run so far.
#[derive(Default)]
struct RunState {
    script: Option<Script>,
    images: Option<ImageSet>,
    audio: Option<NarrationAudio>,
    rendered: Option<RenderedVideo>,
    delivered: Option<SubtitledVideo>,
    upload: Option<UploadResult>,
}

fn require<'a, T>(slot: &'a Option<T>, what: &str) -> StageResult<&'a T> {
    slot.as_ref()
        .ok_or_else(|| StageError::integrity(format!("{} was not produced", what)))
}

/// Per-run values shared by the stages.
struct RunContext<'a> {
    topic: &'a str,
    workspace: &'a RunWorkspace,
    output_path: &'a Path,
}

/// Sequences the stages for one topic at a time.
pub struct Pipeline {
    config: PipelineConfig,
    services: Services,
    skip_upload: bool,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, services: Services) -> Self {
        Self {
            config,
            services,
            skip_upload: false,
        }
    }

    /// Record the upload stage as skipped regardless of configuration.
    pub fn with_skip_upload(mut self, skip: bool) -> Self {
        self.skip_upload = skip;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage for `topic`.
    ///
    /// On failure the run workspace is kept and its path logged. On success
    /// it is removed unless intermediates are retained.
    pub async fn run(&self, topic: &str, output_name: Option<&str>) -> PipelineResult<RunReport> {
        let topic = normalize_topic(topic).map_err(|e| PipelineError::invalid_input(e.to_string()))?;
        let file_name = output_file_name(&topic, output_name, Local::now())?;
        let output_path = self.config.output_dir.join(file_name);

        let run_id = RunId::new();
        let logger = RunLogger::new(&run_id, &topic);
        let span = logger.create_span();

        self.run_inner(run_id, &topic, &output_path, &logger)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        run_id: RunId,
        topic: &str,
        output_path: &Path,
        logger: &RunLogger,
    ) -> PipelineResult<RunReport> {
        logger.log_start();
        let started = Instant::now();

        let workspace = RunWorkspace::create(&self.config.temp_dir, &run_id)
            .await
            .map_err(PipelineError::Workspace)?;
        let ctx = RunContext {
            topic,
            workspace: &workspace,
            output_path,
        };

        let mut state = RunState::default();
        let mut timings = Vec::with_capacity(Stage::ORDER.len());

        for stage in Stage::ORDER {
            if let Some(reason) = self.skip_reason(stage) {
                logger.log_stage_skipped(stage, reason);
                timings.push(StageTiming {
                    stage,
                    seconds: 0.0,
                    skipped: true,
                });
                continue;
            }

            logger.log_stage_start(stage);
            let stage_started = Instant::now();
            match self.run_stage(stage, &mut state, &ctx).await {
                Ok(detail) => {
                    let elapsed = stage_started.elapsed();
                    logger.log_stage_complete(stage, elapsed, &detail);
                    metrics::record_stage_duration(stage, elapsed.as_secs_f64());
                    timings.push(StageTiming {
                        stage,
                        seconds: elapsed.as_secs_f64(),
                        skipped: false,
                    });
                }
                Err(source) => {
                    metrics::record_stage_failure(stage);
                    metrics::record_run("failure");
                    logger.log_stage_failed(stage, source.code(), &source.to_string());
                    let kept = workspace.preserve();
                    logger.log_workspace_preserved(&kept);
                    return Err(PipelineError::stage(stage, source));
                }
            }
        }

        let report = self.finish(run_id, topic, state, timings, workspace).await?;
        metrics::record_run("success");
        logger.log_completion(&report.output_path, started.elapsed());
        Ok(report)
    }

    fn skip_reason(&self, stage: Stage) -> Option<&'static str> {
        if stage != Stage::Upload {
            return None;
        }
        if self.skip_upload {
            Some("upload skipped on request")
        } else if !self.config.upload.enabled {
            Some("upload disabled")
        } else if self.services.host.is_none() {
            Some("no video host configured")
        } else {
            None
        }
    }

    /// Run one stage, storing its output in `state`. Returns a log detail.
    async fn run_stage(
        &self,
        stage: Stage,
        state: &mut RunState,
        ctx: &RunContext<'_>,
    ) -> StageResult<String> {
        let config = &self.config;
        match stage {
            Stage::Script => {
                let script = stages::generate_script(
                    self.services.text.as_ref(),
                    ctx.topic,
                    config.video.duration_secs,
                    &config.script,
                )
                .await?;
                let detail = format!(
                    "\"{}\" ({} chars, {} keywords)",
                    script.title,
                    script.narration.chars().count(),
                    script.keywords.len()
                );
                state.script = Some(script);
                Ok(detail)
            }
            Stage::Images => {
                let orientation = Orientation::for_frame(config.video.width, config.video.height);
                let images = stages::fetch_images(
                    self.services.images.as_ref(),
                    &require(&state.script, "script")?.keywords,
                    &config.images,
                    orientation,
                    ctx.workspace.root(),
                )
                .await?;
                let detail = format!("{} images", images.len());
                state.images = Some(images);
                Ok(detail)
            }
            Stage::Voice => {
                let audio = stages::synthesize_narration(
                    self.services.speech.as_ref(),
                    &require(&state.script, "script")?.narration,
                    &config.voice,
                    config.video.duration_secs as f64,
                    &ctx.workspace.path("narration.wav"),
                )
                .await?;
                let detail = format!("{:.2}s of narration", audio.duration_secs);
                state.audio = Some(audio);
                Ok(detail)
            }
            Stage::Video => {
                let spec = stages::slideshow_spec(&config.video, &config.encoding);
                let rendered = stages::compose_video(
                    self.services.media.as_ref(),
                    require(&state.images, "image set")?,
                    require(&state.audio, "narration")?,
                    &spec,
                    &ctx.workspace.path("rendered.mp4"),
                )
                .await?;
                let detail = format!(
                    "{}x{}, {:.2}s",
                    rendered.width, rendered.height, rendered.duration_secs
                );
                state.rendered = Some(rendered);
                Ok(detail)
            }
            Stage::Subtitles => {
                let script = require(&state.script, "script")?;
                let delivered = stages::add_subtitles(
                    self.services.media.as_ref(),
                    require(&state.rendered, "rendered video")?,
                    require(&state.audio, "narration")?,
                    &script.narration,
                    &script.title,
                    &config.subtitles,
                    &config.encoding,
                    ctx.workspace,
                    ctx.output_path,
                )
                .await?;
                let detail = format!(
                    "{} cues, {}",
                    delivered.cue_count,
                    delivered.path.display()
                );
                state.delivered = Some(delivered);
                Ok(detail)
            }
            Stage::Upload => {
                let host = self
                    .services
                    .host
                    .as_deref()
                    .ok_or_else(|| StageError::integrity("no video host configured"))?;
                let metadata = VideoMetadata::from_script(
                    ctx.topic,
                    require(&state.script, "script")?,
                    config.upload.privacy,
                );
                let result =
                    stages::upload_video(host, require(&state.delivered, "subtitled video")?, &metadata)
                        .await?;
                let detail = result.url.clone();
                state.upload = Some(result);
                Ok(detail)
            }
        }
    }

    async fn finish(
        &self,
        run_id: RunId,
        topic: &str,
        state: RunState,
        stage_timings: Vec<StageTiming>,
        workspace: RunWorkspace,
    ) -> PipelineResult<RunReport> {
        let missing = |what: &str| {
            PipelineError::stage(
                Stage::Subtitles,
                StageError::integrity(format!("{} was not produced", what)),
            )
        };
        let script = state.script.ok_or_else(|| missing("script"))?;
        let image_count = state.images.as_ref().map(ImageSet::len).unwrap_or(0);
        let audio_duration = state.audio.as_ref().map(|a| a.duration_secs).unwrap_or(0.0);
        let delivered = state.delivered.ok_or_else(|| missing("subtitled video"))?;

        let workspace = if self.config.keep_intermediates {
            Some(workspace.preserve())
        } else {
            workspace.remove().await;
            None
        };

        Ok(RunReport {
            run_id,
            topic: topic.to_string(),
            script,
            image_count,
            audio_duration,
            output_path: delivered.path,
            srt_path: delivered.srt_path,
            thumbnail_path: delivered.thumbnail_path,
            upload: state.upload,
            workspace,
            stage_timings,
        })
    }
}

/// Format a wall time for console output.
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.1}s", elapsed.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_generated_output_name() {
        let name = output_file_name("Deep sea: creatures!", None, fixed_now()).unwrap();
        assert_eq!(name, "Deep_sea_creatures_20240309_140507.mp4");

        let name = output_file_name("宇宙の不思議についての長い長い長いテーマです", None, fixed_now()).unwrap();
        assert_eq!(name, "宇宙の不思議についての長い長い長いテーマ_20240309_140507.mp4");

        let name = output_file_name("!!!", None, fixed_now()).unwrap();
        assert_eq!(name, "short_20240309_140507.mp4");
    }

    #[test]
    fn test_given_output_name() {
        assert_eq!(
            output_file_name("t", Some("clip"), fixed_now()).unwrap(),
            "clip.mp4"
        );
        assert_eq!(
            output_file_name("t", Some("clip.MP4"), fixed_now()).unwrap(),
            "clip.MP4"
        );
        for bad in ["../clip", "a/b", "a\\b", "  ", ".."] {
            assert!(
                matches!(
                    output_file_name("t", Some(bad), fixed_now()),
                    Err(PipelineError::InvalidInput(_))
                ),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(12_345)), "12.3s");
    }
}
