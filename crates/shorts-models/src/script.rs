//! The narration script produced by the script stage.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum topic length accepted from callers (characters).
pub const MAX_TOPIC_CHARS: usize = 100;

/// Script validation failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("field `{0}` is missing or empty")]
    EmptyField(&'static str),

    #[error("narration too short: {actual} characters (min {min})")]
    NarrationTooShort { actual: usize, min: usize },

    #[error("narration too long: {actual} characters (max {max})")]
    NarrationTooLong { actual: usize, max: usize },

    #[error("topic must be between 1 and {MAX_TOPIC_CHARS} characters")]
    InvalidTopic,
}

/// Generated video script.
///
/// Built once per run and never mutated afterwards; every later stage reads
/// from the same value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    /// Video title
    pub title: String,
    /// Text read by the narrator
    pub narration: String,
    /// Image search keywords, in priority order
    pub keywords: Vec<String>,
}

impl Script {
    /// Build a script from raw parts, normalising whitespace and keyword order.
    ///
    /// Keywords are trimmed, empty entries dropped and duplicates removed
    /// case-insensitively while keeping the first occurrence.
    pub fn new(
        title: impl Into<String>,
        narration: impl Into<String>,
        keywords: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, ScriptError> {
        let title = title.into().trim().to_string();
        let narration = narration.into().trim().to_string();

        let mut seen = Vec::<String>::new();
        let mut unique = Vec::new();
        for keyword in keywords {
            let keyword = keyword.into().trim().to_string();
            if keyword.is_empty() {
                continue;
            }
            let folded = keyword.to_lowercase();
            if seen.contains(&folded) {
                continue;
            }
            seen.push(folded);
            unique.push(keyword);
        }

        let script = Self {
            title,
            narration,
            keywords: unique,
        };
        script.validate()?;
        Ok(script)
    }

    /// Check the structural invariants: all three fields are present.
    pub fn validate(&self) -> Result<(), ScriptError> {
        if self.title.trim().is_empty() {
            return Err(ScriptError::EmptyField("title"));
        }
        if self.narration.trim().is_empty() {
            return Err(ScriptError::EmptyField("narration"));
        }
        if self.keywords.is_empty() {
            return Err(ScriptError::EmptyField("keywords"));
        }
        Ok(())
    }

    /// Check the narration fits the speakable window.
    pub fn validate_length(&self, min_chars: usize, max_chars: usize) -> Result<(), ScriptError> {
        let actual = self.narration_chars();
        if actual < min_chars {
            return Err(ScriptError::NarrationTooShort {
                actual,
                min: min_chars,
            });
        }
        if actual > max_chars {
            return Err(ScriptError::NarrationTooLong {
                actual,
                max: max_chars,
            });
        }
        Ok(())
    }

    /// Narration length in characters (not bytes).
    pub fn narration_chars(&self) -> usize {
        self.narration.chars().count()
    }

    /// Keep at most `count` keywords.
    pub fn truncate_keywords(&mut self, count: usize) {
        self.keywords.truncate(count.max(1));
    }
}

/// Validate and normalise a caller-provided topic.
pub fn normalize_topic(topic: &str) -> Result<String, ScriptError> {
    let topic = topic.trim();
    let chars = topic.chars().count();
    if chars == 0 || chars > MAX_TOPIC_CHARS {
        return Err(ScriptError::InvalidTopic);
    }
    Ok(topic.to_string())
}
