//! Thumbnail extraction.

use std::path::Path;

use tracing::{debug, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::filters::escape_filter_value;
use crate::fs_utils::require_non_empty;
use shorts_models::encoding::{THUMBNAIL_SCALE_WIDTH, THUMBNAIL_TIMESTAMP_SECS};

/// Characters per caption line.
pub const CAPTION_LINE_CHARS: usize = 10;
/// Caption lines kept before the title is cut with an ellipsis.
pub const CAPTION_MAX_LINES: usize = 5;

/// Title drawn over the thumbnail frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailCaption {
    pub text: String,
    /// Fontconfig family, same as the burned-in subtitles
    pub font_name: String,
}

/// Seek position for the thumbnail frame, kept inside short videos.
pub fn thumbnail_timestamp(video_duration: f64) -> f64 {
    if video_duration > THUMBNAIL_TIMESTAMP_SECS * 2.0 {
        THUMBNAIL_TIMESTAMP_SECS
    } else {
        (video_duration / 2.0).max(0.0)
    }
}

/// Break a title into lines of at most `width` characters.
///
/// Whitespace is preferred as a break point; unbroken runs (Japanese text)
/// are cut at the width. Lines past `max_lines` are dropped and the last
/// kept line ends with an ellipsis.
pub fn wrap_caption(text: &str, width: usize, max_lines: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        let current_len = current.chars().count();
        if current_len > 0 && current_len + 1 + word_len <= width {
            current.push(' ');
            current.push_str(word);
            continue;
        }
        if current_len > 0 {
            lines.push(std::mem::take(&mut current));
        }
        let chars: Vec<char> = word.chars().collect();
        let mut chunks = chars.chunks(width).peekable();
        while let Some(chunk) = chunks.next() {
            let piece: String = chunk.iter().collect();
            if chunks.peek().is_some() {
                lines.push(piece);
            } else {
                current = piece;
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    if lines.len() > max_lines {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            let mut kept: String = last.chars().take(width.saturating_sub(1)).collect();
            kept.push('…');
            *last = kept;
        }
    }
    lines
}

/// `drawtext` filter reading the caption from `text_file`.
///
/// Drawn on the full-size frame before scaling, centered, white with a black
/// border. Font size follows the frame width so the wrap width fits.
pub fn caption_filter(text_file: &Path, font_name: &str) -> String {
    format!(
        "drawtext=textfile={}:expansion=none:font={}:fontsize=w/12:fontcolor=white:\
         borderw=4:bordercolor=black:line_spacing=12:x=(w-text_w)/2:y=(h-text_h)/2",
        escape_filter_value(&text_file.to_string_lossy()),
        escape_filter_value(font_name)
    )
}

/// Build the single-frame extraction command.
///
/// With a caption file the title is drawn over the frame first.
pub fn build_thumbnail_command(
    video_path: &Path,
    output_path: &Path,
    video_duration: f64,
    caption: Option<(&Path, &str)>,
) -> FfmpegCommand {
    let scale = format!("scale={}:-2", THUMBNAIL_SCALE_WIDTH);
    let filter = match caption {
        Some((text_file, font_name)) => format!("{},{}", caption_filter(text_file, font_name), scale),
        None => scale,
    };
    FfmpegCommand::new(output_path)
        .input_with_args(
            ["-ss".to_string(), format!("{:.3}", thumbnail_timestamp(video_duration))],
            video_path,
        )
        .single_frame()
        .video_filter(filter)
        .output_args(["-q:v", "2"])
}

/// Generate a JPEG thumbnail from a video file.
///
/// When a caption is given the title is drawn over the frame. If that fails
/// (ffmpeg built without drawtext, missing font) a plain frame is written.
pub async fn generate_thumbnail(
    video_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    video_duration: f64,
    caption: Option<&ThumbnailCaption>,
    runner: &FfmpegRunner,
) -> MediaResult<()> {
    let video_path = video_path.as_ref();
    let output_path = output_path.as_ref();

    if let Some(caption) = caption.filter(|c| !c.text.trim().is_empty()) {
        let text_file = output_path.with_extension("caption.txt");
        let lines = wrap_caption(&caption.text, CAPTION_LINE_CHARS, CAPTION_MAX_LINES);
        tokio::fs::write(&text_file, lines.join("\n")).await?;

        let cmd = build_thumbnail_command(
            video_path,
            output_path,
            video_duration,
            Some((text_file.as_path(), caption.font_name.as_str())),
        );
        let result = runner.run(&cmd).await;

        if let Err(e) = tokio::fs::remove_file(&text_file).await {
            debug!(path = %text_file.display(), "Failed to delete caption file: {}", e);
        }
        match result {
            Ok(()) => {
                require_non_empty(output_path).await?;
                return Ok(());
            }
            Err(e) => warn!("Captioned thumbnail failed, using a plain frame: {}", e),
        }
    }

    let cmd = build_thumbnail_command(video_path, output_path, video_duration, None);
    runner.run(&cmd).await?;
    require_non_empty(output_path).await?;
    Ok(())
}
