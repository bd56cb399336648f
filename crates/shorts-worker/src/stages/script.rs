//! Script stage: topic to title, narration and image keywords.

use serde_json::{Map, Value};
use tracing::debug;

use shorts_models::Script;
use shorts_services::{ServiceError, TextGenerator};

use crate::config::ScriptSettings;
use crate::error::StageResult;

/// Build the generation prompt.
pub fn build_prompt(topic: &str, target_secs: u32, settings: &ScriptSettings) -> String {
    let max_chars = settings.max_chars(target_secs);
    format!(
        r#"Write the script for a {secs}-second vertical short video.

Topic: {topic}

Requirements:
- Narration in natural {language}, readable aloud within {secs} seconds ({min} to {max} characters)
- Open with a hook, keep the content simple, end memorably
- A short, catchy title in {language}
- {count} concrete image-search keywords in English

Respond with a single JSON object and nothing else:
{{"title": "...", "narration": "...", "keywords": ["...", "..."]}}"#,
        secs = target_secs,
        topic = topic,
        language = settings.language,
        min = settings.min_chars,
        max = max_chars,
        count = settings.keyword_count,
    )
}

/// Parse a model response into a [`Script`].
///
/// The JSON object is taken from the first `{` to the last `}`. `script` is
/// accepted for `narration`, and `keywords` may be an array or a
/// comma-separated string.
pub fn parse_script(response: &str) -> Result<Script, ServiceError> {
    let start = response.find('{');
    let end = response.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &response[s..=e],
        _ => return Err(ServiceError::invalid_response("no JSON object in script response")),
    };

    let value: Value = serde_json::from_str(json)
        .map_err(|e| ServiceError::invalid_response(format!("script JSON is malformed: {}", e)))?;
    let obj = value
        .as_object()
        .ok_or_else(|| ServiceError::invalid_response("script JSON is not an object"))?;

    let title = string_field(obj, &["title"])?;
    let narration = string_field(obj, &["narration", "script"])?;
    let keywords = keywords_field(obj)?;

    Script::new(title, narration, keywords)
        .map_err(|e| ServiceError::invalid_response(format!("invalid script: {}", e)))
}

fn string_field(obj: &Map<String, Value>, names: &[&'static str]) -> Result<String, ServiceError> {
    let (name, value) = names
        .iter()
        .find_map(|n| obj.get(*n).map(|v| (*n, v)))
        .ok_or_else(|| ServiceError::invalid_response(format!("script is missing `{}`", names[0])))?;
    match value {
        Value::String(s) if !s.trim().is_empty() => Ok(s.clone()),
        Value::String(_) => Err(ServiceError::invalid_response(format!("`{}` is empty", name))),
        _ => Err(ServiceError::invalid_response(format!("`{}` is not a string", name))),
    }
}

fn keywords_field(obj: &Map<String, Value>) -> Result<Vec<String>, ServiceError> {
    match obj.get("keywords") {
        None => Err(ServiceError::invalid_response("script is missing `keywords`")),
        Some(Value::String(s)) => Ok(s
            .split([',', '、', '，'])
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(|s| s.to_string())
                    .ok_or_else(|| ServiceError::invalid_response("`keywords` holds a non-string"))
            })
            .collect(),
        Some(_) => Err(ServiceError::invalid_response(
            "`keywords` is neither a list nor a string",
        )),
    }
}

/// Generate and validate the script for `topic`.
pub async fn generate_script(
    generator: &dyn TextGenerator,
    topic: &str,
    target_secs: u32,
    settings: &ScriptSettings,
) -> StageResult<Script> {
    let prompt = build_prompt(topic, target_secs, settings);
    let response = generator.generate(&prompt).await?;
    debug!(chars = response.len(), "Script response received");

    let mut script = parse_script(&response)?;
    script
        .validate_length(settings.min_chars, settings.max_chars(target_secs))
        .map_err(|e| ServiceError::invalid_response(e.to_string()))?;
    script.truncate_keywords(settings.keyword_count);
    Ok(script)
}
