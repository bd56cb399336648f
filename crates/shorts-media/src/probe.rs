//! FFprobe media information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Media file information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Container duration in seconds
    pub duration: f64,
    /// Width in pixels (0 without a video stream)
    pub width: u32,
    /// Height in pixels (0 without a video stream)
    pub height: u32,
    /// Frame rate (0 without a video stream)
    pub fps: f64,
    /// Video codec name
    pub video_codec: Option<String>,
    /// Audio codec name
    pub audio_codec: Option<String>,
    /// Audio sample rate in Hz
    pub sample_rate: Option<u32>,
    /// File size in bytes
    pub size: u64,
}

impl MediaInfo {
    pub fn has_video(&self) -> bool {
        self.video_codec.is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.audio_codec.is_some()
    }
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    sample_rate: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// Probe a media file.
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let ffprobe = check_ffprobe()?;

    let output = Command::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe failed on {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_probe_output(json: &[u8]) -> MediaResult<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    let duration = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| MediaError::invalid_media("container reports no duration"))?;

    let size = probe
        .format
        .size
        .as_deref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let mut info = MediaInfo {
        duration,
        size,
        ..Default::default()
    };

    if let Some(video) = probe.streams.iter().find(|s| s.codec_type == "video") {
        info.video_codec = Some(video.codec_name.clone().unwrap_or_default());
        info.width = video.width.unwrap_or(0);
        info.height = video.height.unwrap_or(0);
        info.fps = video
            .avg_frame_rate
            .as_deref()
            .and_then(parse_frame_rate)
            .or_else(|| video.r_frame_rate.as_deref().and_then(parse_frame_rate))
            .unwrap_or(0.0);
    }

    if let Some(audio) = probe.streams.iter().find(|s| s.codec_type == "audio") {
        info.audio_codec = Some(audio.codec_name.clone().unwrap_or_default());
        info.sample_rate = audio.sample_rate.as_deref().and_then(|r| r.parse().ok());
    }

    Ok(info)
}

/// Parse frame rate string (e.g., "30/1" or "29.97"). Returns `None` for "0/0".
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok().filter(|v: &f64| *v > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
    }

    #[test]
    fn test_parse_rendered_video() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 1080, "height": 1920,
                 "avg_frame_rate": "24/1", "r_frame_rate": "24/1"},
                {"codec_type": "audio", "codec_name": "aac", "sample_rate": "48000"}
            ],
            "format": {"duration": "30.016000", "size": "1843200"}
        }"#;

        let info = parse_probe_output(json).unwrap();
        assert!(info.has_video());
        assert!(info.has_audio());
        assert_eq!((info.width, info.height), (1080, 1920));
        assert!((info.fps - 24.0).abs() < 1e-9);
        assert!((info.duration - 30.016).abs() < 1e-9);
        assert_eq!(info.sample_rate, Some(48000));
    }

    #[test]
    fn test_parse_audio_only() {
        let json = br#"{
            "streams": [{"codec_type": "audio", "codec_name": "pcm_s16le", "sample_rate": "24000"}],
            "format": {"duration": "12.5"}
        }"#;

        let info = parse_probe_output(json).unwrap();
        assert!(!info.has_video());
        assert_eq!(info.width, 0);
        assert_eq!(info.size, 0);
    }

    #[test]
    fn test_missing_duration_is_invalid() {
        let json = br#"{"streams": [], "format": {}}"#;
        assert!(matches!(
            parse_probe_output(json),
            Err(MediaError::InvalidMedia(_))
        ));
    }
}
