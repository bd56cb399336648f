//! FFmpeg CLI wrapper for the shorts pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation and timeout support via tokio
//! - Frame-exact slideshow rendering with a narration track
//! - Subtitle cue planning, SRT output and burn-in
//! - WAV inspection and concatenation
//! - Thumbnail extraction and artifact file helpers

pub mod command;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod probe;
pub mod progress;
pub mod slideshow;
pub mod subtitles;
pub mod thumbnail;
pub mod wav;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use fs_utils::{ensure_dir, move_file, require_non_empty};
pub use probe::{probe_media, MediaInfo};
pub use progress::{FfmpegProgress, ProgressLogger};
pub use slideshow::{plan_slides, render_slideshow, Slide, SlideshowSpec};
pub use subtitles::{burn_subtitles, plan_cues, to_srt, write_srt, Cue, SubtitleStyle};
pub use thumbnail::{generate_thumbnail, ThumbnailCaption};
pub use wav::{concat_wav, concat_wav_async, inspect_wav, WavInfo};
