//! Pipeline configuration.
//!
//! Everything is read from environment variables (after `.env` is loaded)
//! through [`EnvReader`], so every missing key and bad value is reported in
//! one pass.

use std::path::PathBuf;
use std::time::Duration;

use shorts_media::SubtitleStyle;
use shorts_models::{EncodingConfig, EnvReader, PrivacyStatus};
use shorts_services::{GeminiConfig, UnsplashConfig, VoicevoxConfig, YoutubeConfig};

use crate::error::{PipelineError, PipelineResult};

/// Output video geometry and timing.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSettings {
    /// Target duration in seconds
    pub duration_secs: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            duration_secs: 30,
            width: 1080,
            height: 1920,
            fps: 30,
        }
    }
}

/// Script generation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptSettings {
    /// Narration language named in the prompt
    pub language: String,
    pub min_chars: usize,
    /// Speakable characters per second; caps the narration length
    pub chars_per_second: usize,
    pub keyword_count: usize,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            language: "Japanese".to_string(),
            min_chars: 20,
            chars_per_second: 5,
            keyword_count: 5,
        }
    }
}

impl ScriptSettings {
    /// Longest narration accepted for a video of `duration_secs`.
    pub fn max_chars(&self, duration_secs: u32) -> usize {
        duration_secs as usize * self.chars_per_second
    }
}

/// Image fetching and validation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSettings {
    pub max_images: usize,
    pub min_images: usize,
    /// Candidates requested per search
    pub per_page: u32,
    pub download_parallel: usize,
    pub min_bytes: u64,
    pub min_width: u32,
    pub min_height: u32,
    pub min_aspect: f64,
    pub max_aspect: f64,
    /// Query tried once when keywords yield fewer than `min_images`
    pub fallback_query: String,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            max_images: 5,
            min_images: 3,
            per_page: 10,
            download_parallel: 4,
            min_bytes: 10_000,
            min_width: 800,
            min_height: 600,
            min_aspect: 0.3,
            max_aspect: 3.0,
            fallback_query: "nature landscape".to_string(),
        }
    }
}

/// Narration synthesis settings.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSettings {
    pub speaker_id: u32,
    pub speed_scale: f64,
    /// Longest text sent in one synthesis call
    pub chunk_chars: usize,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            speaker_id: 3,
            speed_scale: 1.0,
            chunk_chars: 100,
        }
    }
}

/// Caption settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleSettings {
    pub min_cue_ms: u64,
    pub style: SubtitleStyle,
}

impl Default for SubtitleSettings {
    fn default() -> Self {
        Self {
            min_cue_ms: shorts_media::subtitles::DEFAULT_MIN_CUE_MS,
            style: SubtitleStyle::default(),
        }
    }
}

/// Upload settings.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadSettings {
    pub enabled: bool,
    pub privacy: PrivacyStatus,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            privacy: PrivacyStatus::Private,
        }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub video: VideoSettings,
    pub script: ScriptSettings,
    pub images: ImageSettings,
    pub voice: VoiceSettings,
    pub subtitles: SubtitleSettings,
    pub upload: UploadSettings,
    pub encoding: EncodingConfig,
    pub output_dir: PathBuf,
    /// Parent of the per-run workspaces
    pub temp_dir: PathBuf,
    /// Keep the run workspace after a successful run
    pub keep_intermediates: bool,
    /// Upper bound on each ffmpeg invocation
    pub render_timeout: Duration,
    pub gemini: GeminiConfig,
    pub unsplash: UnsplashConfig,
    pub voicevox: VoicevoxConfig,
    pub youtube: YoutubeConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            video: VideoSettings::default(),
            script: ScriptSettings::default(),
            images: ImageSettings::default(),
            voice: VoiceSettings::default(),
            subtitles: SubtitleSettings::default(),
            upload: UploadSettings::default(),
            encoding: EncodingConfig::default(),
            output_dir: PathBuf::from("./output"),
            temp_dir: PathBuf::from("./temp"),
            keep_intermediates: false,
            render_timeout: Duration::from_secs(600),
            gemini: GeminiConfig::default(),
            unsplash: UnsplashConfig::default(),
            voicevox: VoicevoxConfig::default(),
            youtube: YoutubeConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from the process environment.
    pub fn from_env() -> PipelineResult<Self> {
        Self::from_reader(EnvReader::from_env())
    }

    /// Load through a custom lookup function.
    pub fn from_lookup<F>(lookup: F) -> PipelineResult<Self>
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self::from_reader(EnvReader::from_fn(lookup))
    }

    /// Read every setting, then validate. All problems are returned together.
    pub fn from_reader(mut env: EnvReader) -> PipelineResult<Self> {
        let d = Self::default();

        let video = VideoSettings {
            duration_secs: env.parse("VIDEO_DURATION", d.video.duration_secs),
            width: env.parse("VIDEO_WIDTH", d.video.width),
            height: env.parse("VIDEO_HEIGHT", d.video.height),
            fps: env.parse("VIDEO_FPS", d.video.fps),
        };
        let script = ScriptSettings {
            language: env.string("SCRIPT_LANGUAGE", &d.script.language),
            min_chars: env.parse("SCRIPT_MIN_CHARS", d.script.min_chars),
            chars_per_second: env.parse("SCRIPT_CHARS_PER_SECOND", d.script.chars_per_second),
            keyword_count: env.parse("SCRIPT_KEYWORD_COUNT", d.script.keyword_count),
        };
        let images = ImageSettings {
            max_images: env.parse("MAX_IMAGES", d.images.max_images),
            min_images: env.parse("MIN_IMAGES", d.images.min_images),
            per_page: env.parse("IMAGE_PER_PAGE", d.images.per_page),
            download_parallel: env.parse("IMAGE_DOWNLOAD_PARALLEL", d.images.download_parallel),
            min_bytes: env.parse("IMAGE_MIN_BYTES", d.images.min_bytes),
            min_width: env.parse("IMAGE_MIN_WIDTH", d.images.min_width),
            min_height: env.parse("IMAGE_MIN_HEIGHT", d.images.min_height),
            min_aspect: env.parse("IMAGE_MIN_ASPECT", d.images.min_aspect),
            max_aspect: env.parse("IMAGE_MAX_ASPECT", d.images.max_aspect),
            fallback_query: env.string("IMAGE_FALLBACK_QUERY", &d.images.fallback_query),
        };
        let voice = VoiceSettings {
            speaker_id: env.parse("VOICE_SPEAKER_ID", d.voice.speaker_id),
            speed_scale: env.parse("VOICE_SPEED_SCALE", d.voice.speed_scale),
            chunk_chars: env.parse("VOICE_CHUNK_CHARS", d.voice.chunk_chars),
        };

        let style_defaults = d.subtitles.style;
        let subtitles = SubtitleSettings {
            min_cue_ms: env.parse("SUBTITLE_MIN_CUE_MS", d.subtitles.min_cue_ms),
            style: SubtitleStyle {
                font_name: env.string("SUBTITLE_FONT", &style_defaults.font_name),
                font_size: env.parse("SUBTITLE_FONT_SIZE", style_defaults.font_size),
                outline: env.parse("SUBTITLE_OUTLINE", style_defaults.outline),
                margin_v: env.parse("SUBTITLE_MARGIN_V", style_defaults.margin_v),
                ..style_defaults
            },
        };
        let upload = UploadSettings {
            enabled: env.bool("UPLOAD_ENABLED", d.upload.enabled),
            privacy: env.parse("UPLOAD_PRIVACY", d.upload.privacy),
        };
        let encoding = EncodingConfig::default()
            .with_crf(env.parse("VIDEO_CRF", d.encoding.crf))
            .with_preset(env.string("VIDEO_PRESET", &d.encoding.preset));

        let config = Self {
            video,
            script,
            images,
            voice,
            subtitles,
            upload,
            encoding,
            output_dir: PathBuf::from(env.string("OUTPUT_DIR", "./output")),
            temp_dir: PathBuf::from(env.string("TEMP_DIR", "./temp")),
            keep_intermediates: env.bool("KEEP_INTERMEDIATES", d.keep_intermediates),
            render_timeout: Duration::from_secs(env.parse("RENDER_TIMEOUT_SECS", 600)),
            gemini: GeminiConfig::from_reader(&mut env),
            unsplash: UnsplashConfig::from_reader(&mut env),
            voicevox: VoicevoxConfig::from_reader(&mut env),
            youtube: YoutubeConfig::from_reader(&mut env),
        };

        if let Err(problems) = config.validate() {
            for problem in problems {
                env.push_error(problem);
            }
        }
        env.finish().map_err(PipelineError::Config)?;
        Ok(config)
    }

    /// Check value ranges and cross-field rules.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let v = &self.video;

        if !(1..=300).contains(&v.duration_secs) {
            errors.push("VIDEO_DURATION must be between 1 and 300 seconds".to_string());
        }
        if v.width == 0 || v.height == 0 {
            errors.push("VIDEO_WIDTH and VIDEO_HEIGHT must be positive".to_string());
        } else if v.width % 2 != 0 || v.height % 2 != 0 {
            errors.push("VIDEO_WIDTH and VIDEO_HEIGHT must be even for yuv420p".to_string());
        }
        if !(1..=60).contains(&v.fps) {
            errors.push("VIDEO_FPS must be between 1 and 60".to_string());
        }

        let i = &self.images;
        if !(1..=20).contains(&i.max_images) {
            errors.push("MAX_IMAGES must be between 1 and 20".to_string());
        }
        if i.min_images == 0 || i.min_images > i.max_images {
            errors.push("MIN_IMAGES must be positive and not greater than MAX_IMAGES".to_string());
        }
        if i.download_parallel == 0 {
            errors.push("IMAGE_DOWNLOAD_PARALLEL must be at least 1".to_string());
        }
        if !(i.min_aspect > 0.0 && i.min_aspect <= i.max_aspect) {
            errors.push("IMAGE_MIN_ASPECT must be positive and not above IMAGE_MAX_ASPECT".to_string());
        }

        if self.script.keyword_count == 0 {
            errors.push("SCRIPT_KEYWORD_COUNT must be at least 1".to_string());
        }
        if self.script.min_chars > self.script.max_chars(v.duration_secs) {
            errors.push(
                "SCRIPT_MIN_CHARS exceeds VIDEO_DURATION * SCRIPT_CHARS_PER_SECOND".to_string(),
            );
        }
        if self.voice.chunk_chars == 0 {
            errors.push("VOICE_CHUNK_CHARS must be at least 1".to_string());
        }
        if !(self.voice.speed_scale > 0.0) {
            errors.push("VOICE_SPEED_SCALE must be positive".to_string());
        }
        if self.render_timeout.is_zero() {
            errors.push("RENDER_TIMEOUT_SECS must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// One-line summary for startup logs; never includes secrets.
    pub fn summary(&self) -> String {
        format!(
            "{}x{} @ {}fps, {}s, images {}..={}, speaker {}, upload {} ({}), output {}",
            self.video.width,
            self.video.height,
            self.video.fps,
            self.video.duration_secs,
            self.images.min_images,
            self.images.max_images,
            self.voice.speaker_id,
            if self.upload.enabled { "on" } else { "off" },
            self.upload.privacy,
            self.output_dir.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_keys(extra: &'static [(&'static str, &'static str)]) -> PipelineResult<PipelineConfig> {
        PipelineConfig::from_lookup(move |key| {
            let base = [("GEMINI_API_KEY", "g"), ("UNSPLASH_ACCESS_KEY", "u")];
            extra
                .iter()
                .chain(base.iter())
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        })
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = with_keys(&[]).unwrap();
        assert_eq!(config.video.width, 1080);
        assert_eq!(config.video.height, 1920);
        assert_eq!(config.script.max_chars(30), 150);
        assert_eq!(config.upload.privacy, PrivacyStatus::Private);
        assert!(config.upload.enabled);
    }

    #[test]
    fn test_overrides() {
        let config = with_keys(&[
            ("VIDEO_DURATION", "45"),
            ("UPLOAD_PRIVACY", "unlisted"),
            ("UPLOAD_ENABLED", "false"),
            ("KEEP_INTERMEDIATES", "yes"),
            ("VOICEVOX_SERVER_URL", "http://voicevox:50021"),
        ])
        .unwrap();
        assert_eq!(config.video.duration_secs, 45);
        assert_eq!(config.upload.privacy, PrivacyStatus::Unlisted);
        assert!(!config.upload.enabled);
        assert!(config.keep_intermediates);
        assert_eq!(config.voicevox.base_url, "http://voicevox:50021");
    }

    #[test]
    fn test_all_problems_reported_together() {
        let err = PipelineConfig::from_lookup(|key| match key {
            "VIDEO_DURATION" => Some("301".into()),
            "VIDEO_WIDTH" => Some("1081".into()),
            "VIDEO_FPS" => Some("abc".into()),
            "MAX_IMAGES" => Some("2".into()),
            "MIN_IMAGES" => Some("3".into()),
            "UPLOAD_PRIVACY" => Some("secret".into()),
            _ => None,
        })
        .unwrap_err();

        let PipelineError::Config(problems) = err else {
            panic!("expected config error");
        };
        let text = problems.join("\n");
        for needle in [
            "GEMINI_API_KEY",
            "UNSPLASH_ACCESS_KEY",
            "VIDEO_DURATION",
            "even",
            "VIDEO_FPS",
            "MIN_IMAGES",
            "UPLOAD_PRIVACY",
        ] {
            assert!(text.contains(needle), "missing {needle} in:\n{text}");
        }
    }

    #[test]
    fn test_validate_ranges() {
        let mut config = PipelineConfig::default();
        assert!(config.validate().is_ok());

        config.video.fps = 61;
        config.images.max_images = 21;
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
