//! Subtitle cue planning, SRT output and burn-in.
//!
//! Cue timing is proportional to sentence length. Boundaries sit at the
//! cumulative character fractions of the narration, computed in integer
//! milliseconds, so consecutive cues share an edge and the last cue ends
//! exactly at the span.

use std::path::Path;
use tracing::{debug, info};

use shorts_models::timestamp::format_srt_timestamp;
use shorts_models::EncodingConfig;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters;
use crate::fs_utils::require_non_empty;

/// Default minimum cue length in milliseconds.
pub const DEFAULT_MIN_CUE_MS: u64 = 1000;

/// Characters that end a sentence.
const SENTENCE_TERMINATORS: &[char] = &['。', '！', '？', '.', '!', '?'];

/// A timed caption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    /// 1-based SRT index
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

impl Cue {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// Split narration into sentences, keeping terminal punctuation.
///
/// Newlines also end a sentence. Runs of terminators (`?!`, `。。`) stay with
/// the sentence they close.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();

    for line in text.lines() {
        let mut current = String::new();
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            current.push(c);
            if SENTENCE_TERMINATORS.contains(&c) {
                while let Some(&next) = chars.peek() {
                    if !SENTENCE_TERMINATORS.contains(&next) {
                        break;
                    }
                    current.push(next);
                    chars.next();
                }
                push_trimmed(&mut sentences, &current);
                current.clear();
            }
        }
        push_trimmed(&mut sentences, &current);
    }

    sentences
}

fn push_trimmed(out: &mut Vec<String>, s: &str) {
    let s = s.trim();
    if !s.is_empty() {
        out.push(s.to_string());
    }
}

/// Plan cues over `[0, span_ms]`.
///
/// Cues shorter than `min_cue_ms` are merged into the following cue, or into
/// the preceding one when they are last. Returns no cues for empty text or a
/// zero span.
pub fn plan_cues(narration: &str, span_ms: u64, min_cue_ms: u64) -> Vec<Cue> {
    let sentences = split_sentences(narration);
    if sentences.is_empty() || span_ms == 0 {
        return Vec::new();
    }

    let weights: Vec<u64> = sentences.iter().map(|s| s.chars().count() as u64).collect();
    let total: u64 = weights.iter().sum();

    // boundaries[k] = span * (chars before sentence k) / total
    let mut boundaries = Vec::with_capacity(sentences.len() + 1);
    let mut cumulative = 0u64;
    boundaries.push(0u64);
    for w in &weights {
        cumulative += w;
        boundaries.push(((span_ms as u128 * cumulative as u128) / total as u128) as u64);
    }

    let mut groups: Vec<(String, u64, u64)> = sentences
        .into_iter()
        .enumerate()
        .map(|(i, text)| (text, boundaries[i], boundaries[i + 1]))
        .collect();

    let min_cue_ms = min_cue_ms.max(1);
    while groups.len() > 1 {
        let Some(short) = groups.iter().position(|(_, s, e)| e - s < min_cue_ms) else {
            break;
        };
        let (left, right) = if short + 1 < groups.len() {
            (short, short + 1)
        } else {
            (short - 1, short)
        };
        let (right_text, _, right_end) = groups.remove(right);
        let merged = &mut groups[left];
        merged.0 = join_text(&merged.0, &right_text);
        merged.2 = right_end;
    }

    groups
        .into_iter()
        .enumerate()
        .map(|(i, (text, start_ms, end_ms))| Cue {
            index: i + 1,
            start_ms,
            end_ms,
            text,
        })
        .collect()
}

/// Join two caption fragments; Latin text gets a separating space.
fn join_text(left: &str, right: &str) -> String {
    let needs_space = left.chars().last().is_some_and(|c| c.is_ascii())
        && right.chars().next().is_some_and(|c| c.is_ascii());
    if needs_space {
        format!("{} {}", left, right)
    } else {
        format!("{}{}", left, right)
    }
}

/// Check cue ordering invariants against a video duration.
pub fn validate_cues(cues: &[Cue], video_duration_ms: u64) -> MediaResult<()> {
    let mut previous_end = 0u64;
    for cue in cues {
        if cue.start_ms >= cue.end_ms {
            return Err(MediaError::invalid_input(format!(
                "cue {} is empty ({} >= {})",
                cue.index, cue.start_ms, cue.end_ms
            )));
        }
        if cue.end_ms > video_duration_ms {
            return Err(MediaError::invalid_input(format!(
                "cue {} ends at {}ms after video end {}ms",
                cue.index, cue.end_ms, video_duration_ms
            )));
        }
        if cue.start_ms < previous_end {
            return Err(MediaError::invalid_input(format!(
                "cue {} overlaps the previous cue",
                cue.index
            )));
        }
        previous_end = cue.end_ms;
    }
    Ok(())
}

/// Render cues as SRT.
pub fn to_srt(cues: &[Cue]) -> String {
    let mut out = String::new();
    for cue in cues {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            cue.index,
            format_srt_timestamp(cue.start_ms),
            format_srt_timestamp(cue.end_ms),
            cue.text
        ));
    }
    out
}

/// Write cues to an SRT file.
pub async fn write_srt(cues: &[Cue], path: impl AsRef<Path>) -> MediaResult<()> {
    let path = path.as_ref();
    tokio::fs::write(path, to_srt(cues)).await?;
    debug!(path = %path.display(), cues = cues.len(), "Wrote SRT");
    Ok(())
}

/// Caption appearance passed to libass via `force_style`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleStyle {
    pub font_name: String,
    pub font_size: u32,
    /// ASS colour, `&HBBGGRR`
    pub primary_colour: String,
    pub outline_colour: String,
    pub outline: u32,
    pub shadow: u32,
    /// Distance from the bottom edge
    pub margin_v: u32,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font_name: "Noto Sans CJK JP".to_string(),
            font_size: 24,
            primary_colour: "&Hffffff".to_string(),
            outline_colour: "&H000000".to_string(),
            outline: 2,
            shadow: 1,
            margin_v: 60,
        }
    }
}

impl SubtitleStyle {
    /// `force_style` value for the subtitles filter.
    pub fn force_style(&self) -> String {
        format!(
            "FontName={},FontSize={},PrimaryColour={},OutlineColour={},Outline={},Shadow={},Alignment=2,MarginV={}",
            self.font_name.replace(['\'', ',', '='], ""),
            self.font_size,
            self.primary_colour,
            self.outline_colour,
            self.outline,
            self.shadow,
            self.margin_v
        )
    }
}

/// Burn an SRT file into a video. Audio is stream-copied.
///
/// ffmpeg runs from the SRT's directory so the filter only sees a bare file name.
pub async fn burn_subtitles(
    video: &Path,
    srt: &Path,
    output: &Path,
    style: &SubtitleStyle,
    encoding: &EncodingConfig,
    runner: &FfmpegRunner,
) -> MediaResult<()> {
    require_non_empty(video).await?;
    require_non_empty(srt).await?;

    let cmd = build_burn_command(video, srt, output, style, encoding)?;
    runner.run(&cmd).await?;
    require_non_empty(output).await?;

    info!(path = %output.display(), "Burned subtitles");
    Ok(())
}

/// Build the burn-in invocation.
pub fn build_burn_command(
    video: &Path,
    srt: &Path,
    output: &Path,
    style: &SubtitleStyle,
    encoding: &EncodingConfig,
) -> MediaResult<FfmpegCommand> {
    let srt_name = srt
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| MediaError::invalid_input(format!("bad SRT path {}", srt.display())))?;
    let srt_dir = srt.parent().filter(|p| !p.as_os_str().is_empty());

    let video = std::path::absolute(video)?;
    let output = std::path::absolute(output)?;

    let mut cmd = FfmpegCommand::single(&video, &output)
        .video_filter(filters::burn_subtitles(srt_name, &style.force_style()))
        .video_codec(&encoding.codec)
        .preset(&encoding.preset)
        .crf(encoding.crf)
        .pixel_format(&encoding.pixel_format)
        .audio_codec("copy")
        .faststart();
    if let Some(dir) = srt_dir {
        cmd = cmd.working_dir(dir);
    }
    Ok(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_split_sentences_keeps_punctuation() {
        let sentences = split_sentences("深海は暗い。光る魚がいる！本当？\nYes. Really?! ok");
        assert_eq!(
            sentences,
            vec!["深海は暗い。", "光る魚がいる！", "本当？", "Yes.", "Really?!", "ok"]
        );
    }

    #[test]
    fn test_cues_cover_span_without_overlap() {
        let narration = "First sentence here. Second one is a bit longer than that. Third!";
        let cues = plan_cues(narration, 30_000, 1000);

        assert_eq!(cues.len(), 3);
        assert_eq!(cues[0].start_ms, 0);
        assert_eq!(cues.last().unwrap().end_ms, 30_000);
        for pair in cues.windows(2) {
            assert_eq!(pair[0].end_ms, pair[1].start_ms);
        }
        assert!(validate_cues(&cues, 30_000).is_ok());
    }

    #[test]
    fn test_timing_is_proportional() {
        // 4 chars and 12 chars over 16 seconds
        let cues = plan_cues("abc.\nabcdefghijk.", 16_000, 1000);
        assert_eq!(cues[0].end_ms, 4_000);
        assert_eq!(cues[1].start_ms, 4_000);
        assert_eq!(cues[1].end_ms, 16_000);
    }

    #[test]
    fn test_short_cues_are_merged() {
        // "Hi." takes 3 of 103 chars over 10s, roughly 291ms
        let long = format!("{}.", "a".repeat(99));
        let narration = format!("Hi. {}", long);
        let cues = plan_cues(&narration, 10_000, 1000);

        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, format!("Hi. {}", long));
        assert_eq!((cues[0].start_ms, cues[0].end_ms), (0, 10_000));
    }

    #[test]
    fn test_trailing_short_cue_merges_backwards() {
        let long = format!("{}.", "a".repeat(99));
        let narration = format!("{} Ok.", long);
        let cues = plan_cues(&narration, 10_000, 1000);

        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].end_ms, 10_000);
    }

    #[test]
    fn test_japanese_merge_has_no_space() {
        let cues = plan_cues("あ。いいいいいいいいいいいいいいいいいいい。", 5_000, 1000);
        assert_eq!(cues.len(), 1);
        assert!(cues[0].text.starts_with("あ。い"));
    }

    #[test]
    fn test_empty_inputs() {
        assert!(plan_cues("", 30_000, 1000).is_empty());
        assert!(plan_cues("   \n ", 30_000, 1000).is_empty());
        assert!(plan_cues("Hello.", 0, 1000).is_empty());
    }

    #[test]
    fn test_span_shorter_than_min_gives_single_cue() {
        let cues = plan_cues("One. Two. Three.", 500, 1000);
        assert_eq!(cues.len(), 1);
        assert_eq!((cues[0].start_ms, cues[0].end_ms), (0, 500));
    }

    #[test]
    fn test_validate_rejects_overrun_and_overlap() {
        let cue = |index, start_ms, end_ms| Cue {
            index,
            start_ms,
            end_ms,
            text: "x".into(),
        };
        assert!(validate_cues(&[cue(1, 0, 31_000)], 30_000).is_err());
        assert!(validate_cues(&[cue(1, 0, 2_000), cue(2, 1_500, 3_000)], 30_000).is_err());
        assert!(validate_cues(&[cue(1, 1_000, 1_000)], 30_000).is_err());
    }

    #[test]
    fn test_to_srt() {
        let cues = vec![
            Cue {
                index: 1,
                start_ms: 0,
                end_ms: 1_500,
                text: "Hello.".into(),
            },
            Cue {
                index: 2,
                start_ms: 1_500,
                end_ms: 62_001,
                text: "World.".into(),
            },
        ];
        assert_eq!(
            to_srt(&cues),
            "1\n00:00:00,000 --> 00:00:01,500\nHello.\n\n2\n00:00:01,500 --> 00:01:02,001\nWorld.\n\n"
        );
    }

    #[tokio::test]
    async fn test_write_srt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("narration.srt");
        let cues = plan_cues("One sentence. Another sentence.", 4_000, 1000);

        write_srt(&cues, &path).await.unwrap();
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(content.starts_with("1\n00:00:00,000 --> "));
    }

    #[test]
    fn test_force_style() {
        let style = SubtitleStyle::default();
        let s = style.force_style();
        assert!(s.starts_with("FontName=Noto Sans CJK JP,FontSize=24"));
        assert!(s.contains("Outline=2"));
    }

    #[test]
    fn test_burn_command_uses_bare_srt_name() {
        let cmd = build_burn_command(
            Path::new("/work/rendered.mp4"),
            Path::new("/work/narration.srt"),
            Path::new("/work/subtitled.mp4"),
            &SubtitleStyle::default(),
            &EncodingConfig::default(),
        )
        .unwrap();
        let args = cmd.build_args();
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert!(args[vf + 1].starts_with("subtitles=filename=narration.srt:"));

        let ca = args.iter().position(|a| a == "-c:a").unwrap();
        assert_eq!(args[ca + 1], "copy");
    }
}
