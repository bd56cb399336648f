//! Encoder settings shared by the slideshow render and the subtitle burn-in.

use serde::{Deserialize, Serialize};

/// Thumbnail width; height follows the aspect ratio.
pub const THUMBNAIL_SCALE_WIDTH: u32 = 480;
/// Preferred thumbnail position for videos long enough to have one.
pub const THUMBNAIL_TIMESTAMP_SECS: f64 = 1.0;

/// H.264/AAC output settings.
///
/// Both encodes of a run use the same values so the burned-in pass does not
/// change the picture format of the rendered slideshow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    pub codec: String,
    /// x264 speed/size trade-off
    pub preset: String,
    /// 0-51, lower is better
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
    /// `yuv420p` keeps the output playable on phones
    pub pixel_format: String,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: "libx264".into(),
            preset: "medium".into(),
            crf: 20,
            audio_codec: "aac".into(),
            audio_bitrate: "128k".into(),
            pixel_format: "yuv420p".into(),
        }
    }
}

impl EncodingConfig {
    pub fn with_crf(self, crf: u8) -> Self {
        Self { crf, ..self }
    }

    pub fn with_preset(self, preset: impl Into<String>) -> Self {
        Self {
            preset: preset.into(),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_target_phones() {
        let config = EncodingConfig::default();
        assert_eq!(config.codec, "libx264");
        assert_eq!(config.pixel_format, "yuv420p");
        assert_eq!(config.with_crf(28).crf, 28);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: EncodingConfig = serde_json::from_str(r#"{"crf": 28}"#).unwrap();
        assert_eq!(config.crf, 28);
        assert_eq!(config.preset, "medium");
    }
}
