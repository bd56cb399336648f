//! Pipeline stage identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One discrete step of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Script,
    Images,
    Voice,
    Video,
    Subtitles,
    Upload,
}

impl Stage {
    /// Fixed execution order. Each stage consumes only outputs of earlier ones.
    pub const ORDER: [Stage; 6] = [
        Stage::Script,
        Stage::Images,
        Stage::Voice,
        Stage::Video,
        Stage::Subtitles,
        Stage::Upload,
    ];

    /// Stable lowercase name, used in logs, metrics and error reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Script => "script",
            Stage::Images => "images",
            Stage::Voice => "voice",
            Stage::Video => "video",
            Stage::Subtitles => "subtitles",
            Stage::Upload => "upload",
        }
    }

    /// 1-based position in [`Stage::ORDER`].
    pub fn position(&self) -> usize {
        Stage::ORDER
            .iter()
            .position(|s| s == self)
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    /// Human-readable label for progress output.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Script => "Generating script",
            Stage::Images => "Fetching images",
            Stage::Voice => "Synthesizing narration",
            Stage::Video => "Composing video",
            Stage::Subtitles => "Burning subtitles",
            Stage::Upload => "Uploading",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
