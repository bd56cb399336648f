//! Upload metadata derived from a script.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::script::Script;

/// YouTube title limit (characters).
pub const MAX_TITLE_CHARS: usize = 100;
/// YouTube description limit (bytes).
pub const MAX_DESCRIPTION_BYTES: usize = 5000;
/// YouTube combined tag limit (characters).
pub const MAX_TAGS_TOTAL_CHARS: usize = 500;
/// "Education"
pub const DEFAULT_CATEGORY_ID: &str = "27";

/// Video visibility after upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    #[default]
    Private,
    Public,
    Unlisted,
}

impl PrivacyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyStatus::Private => "private",
            PrivacyStatus::Public => "public",
            PrivacyStatus::Unlisted => "unlisted",
        }
    }
}

impl fmt::Display for PrivacyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrivacyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "private" => Ok(PrivacyStatus::Private),
            "public" => Ok(PrivacyStatus::Public),
            "unlisted" => Ok(PrivacyStatus::Unlisted),
            other => Err(format!(
                "unknown privacy status '{}' (expected private, public or unlisted)",
                other
            )),
        }
    }
}

/// Title, description and classification sent with the upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy: PrivacyStatus,
}

impl VideoMetadata {
    /// Derive metadata from the run's script.
    ///
    /// The description is the narration followed by one hashtag per keyword
    /// and `#Shorts`. Tags are the keywords plus the topic.
    pub fn from_script(topic: &str, script: &Script, privacy: PrivacyStatus) -> Self {
        let title = truncate_chars(script.title.trim(), MAX_TITLE_CHARS);

        let mut hashtags: Vec<String> = script
            .keywords
            .iter()
            .map(|k| format!("#{}", k.split_whitespace().collect::<String>()))
            .filter(|h| h.len() > 1)
            .collect();
        hashtags.push("#Shorts".to_string());

        let description = format!("{}\n\n{}", script.narration.trim(), hashtags.join(" "));
        let description = truncate_bytes(&description, MAX_DESCRIPTION_BYTES);

        let mut tags = Vec::new();
        let mut total = 0usize;
        for tag in script
            .keywords
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(topic.trim()))
        {
            if tag.is_empty() || tags.iter().any(|t: &String| t.eq_ignore_ascii_case(tag)) {
                continue;
            }
            let len = tag.chars().count();
            if total + len > MAX_TAGS_TOTAL_CHARS {
                break;
            }
            total += len;
            tags.push(tag.to_string());
        }

        Self {
            title,
            description,
            tags,
            category_id: DEFAULT_CATEGORY_ID.to_string(),
            privacy,
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn truncate_bytes(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script() -> Script {
        Script::new(
            "Deep Sea Creatures",
            "Anglerfish carry their own light.",
            vec!["deep sea", "anglerfish"],
        )
        .unwrap()
    }

    #[test]
    fn test_from_script() {
        let meta = VideoMetadata::from_script("the deep sea", &script(), PrivacyStatus::Private);
        assert_eq!(meta.title, "Deep Sea Creatures");
        assert!(meta.description.starts_with("Anglerfish carry"));
        assert!(meta.description.ends_with("#deepsea #anglerfish #Shorts"));
        assert_eq!(meta.tags, vec!["deep sea", "anglerfish", "the deep sea"]);
        assert_eq!(meta.category_id, "27");
    }

    #[test]
    fn test_limits_are_enforced() {
        let long_title = "あ".repeat(150);
        let long_narration = "い".repeat(3000);
        let script = Script::new(long_title, long_narration, vec!["k"]).unwrap();
        let meta = VideoMetadata::from_script("t", &script, PrivacyStatus::Public);
        assert_eq!(meta.title.chars().count(), MAX_TITLE_CHARS);
        assert!(meta.description.len() <= MAX_DESCRIPTION_BYTES);
    }

    #[test]
    fn test_privacy_parse() {
        assert_eq!("Unlisted".parse::<PrivacyStatus>().unwrap(), PrivacyStatus::Unlisted);
        assert!("friends".parse::<PrivacyStatus>().is_err());
        assert_eq!(PrivacyStatus::default().as_str(), "private");
    }
}
