//! Voice stage: narration text to one WAV file.

use std::path::Path;

use tracing::{debug, info};

use shorts_media::concat_wav_async;
use shorts_models::NarrationAudio;
use shorts_services::{SpeechSynthesizer, VoiceParams};

use crate::config::VoiceSettings;
use crate::error::{StageError, StageResult};

/// Seconds of the target duration kept free of speech.
pub const SPEECH_MARGIN_SECS: f64 = 2.0;

const SENTENCE_ENDS: &[char] = &['。', '！', '？', '.', '!', '?'];

/// Collapse runs of whitespace into single spaces.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split text into chunks of at most `max_chars` characters.
///
/// Chunks break after sentence punctuation. A sentence longer than the
/// limit is split at the character boundary.
pub fn split_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let text = normalize_whitespace(text);

    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        if SENTENCE_ENDS.contains(&c) && !chars.peek().is_some_and(|n| SENTENCE_ENDS.contains(n)) {
            sentences.push(std::mem::take(&mut current));
        }
    }
    if !current.trim().is_empty() {
        sentences.push(current);
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut chunk = String::new();
    for sentence in sentences {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        let len = sentence.chars().count();

        if len > max_chars {
            if !chunk.is_empty() {
                chunks.push(std::mem::take(&mut chunk));
            }
            let chars: Vec<char> = sentence.chars().collect();
            for piece in chars.chunks(max_chars) {
                let piece: String = piece.iter().collect();
                let piece = piece.trim();
                if !piece.is_empty() {
                    chunks.push(piece.to_string());
                }
            }
            continue;
        }

        let space = !chunk.is_empty() && needs_space(&chunk, sentence);
        let joined_len = chunk.chars().count() + usize::from(space) + len;
        if !chunk.is_empty() && joined_len > max_chars {
            chunks.push(std::mem::take(&mut chunk));
        } else if space {
            chunk.push(' ');
        }
        chunk.push_str(sentence);
    }
    if !chunk.is_empty() {
        chunks.push(chunk);
    }
    chunks
}

fn needs_space(left: &str, right: &str) -> bool {
    let l = left.chars().last().is_some_and(|c| c.is_ascii());
    let r = right.chars().next().is_some_and(|c| c.is_ascii());
    l && r
}

/// Speech budget for one chunk, proportional to its share of the text.
pub fn chunk_budget(target_secs: f64, chunk_chars: usize, total_chars: usize) -> f64 {
    let speech_secs = (target_secs - SPEECH_MARGIN_SECS).max(1.0);
    speech_secs * chunk_chars as f64 / total_chars.max(1) as f64
}

/// Synthesize `narration` into `output`.
pub async fn synthesize_narration(
    synthesizer: &dyn SpeechSynthesizer,
    narration: &str,
    settings: &VoiceSettings,
    target_secs: f64,
    output: &Path,
) -> StageResult<NarrationAudio> {
    let chunks = split_chunks(narration, settings.chunk_chars);
    if chunks.is_empty() {
        return Err(StageError::integrity("narration is empty after normalization"));
    }
    let total_chars: usize = chunks.iter().map(|c| c.chars().count()).sum();

    let mut wavs = Vec::with_capacity(chunks.len());
    for (index, chunk) in chunks.iter().enumerate() {
        let params = VoiceParams {
            speaker_id: settings.speaker_id,
            speed_scale: settings.speed_scale,
            max_secs: Some(chunk_budget(target_secs, chunk.chars().count(), total_chars)),
        };
        let wav = synthesizer.synthesize(chunk, &params).await?;
        debug!(chunk = index + 1, of = chunks.len(), bytes = wav.len(), "Synthesized chunk");
        wavs.push(wav);
    }

    let info = match concat_wav_async(wavs, output.to_path_buf()).await {
        Ok(info) => info,
        Err(e) => {
            discard_partial(output).await;
            return Err(e.into());
        }
    };

    info!(
        path = %output.display(),
        duration = info.duration_secs,
        chunks = chunks.len(),
        "Narration ready"
    );
    Ok(NarrationAudio {
        path: output.to_path_buf(),
        duration_secs: info.duration_secs,
        sample_rate: info.sample_rate,
    })
}

/// Remove a partially written narration so nothing downstream reads it.
async fn discard_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed partial narration"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => debug!(path = %path.display(), "Failed to remove partial narration: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use shorts_services::ServiceResult;

    /// Alternates sample rates so the chunks cannot be joined.
    struct MismatchedSpeech {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SpeechSynthesizer for MismatchedSpeech {
        async fn synthesize(&self, _text: &str, _params: &VoiceParams) -> ServiceResult<Vec<u8>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let rate = if call % 2 == 0 { 24000 } else { 16000 };
            Ok(shorts_media::wav::encode_pcm16(&[0i16; 2400], rate).unwrap())
        }

        async fn health_check(&self) -> ServiceResult<String> {
            Ok("test".to_string())
        }
    }

    #[tokio::test]
    async fn test_failed_concat_leaves_no_narration() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("narration.wav");
        tokio::fs::write(&output, b"stale").await.unwrap();

        let speech = MismatchedSpeech {
            calls: AtomicUsize::new(0),
        };
        let settings = VoiceSettings {
            chunk_chars: 6,
            ..VoiceSettings::default()
        };
        let result =
            synthesize_narration(&speech, "一つ目です。二つ目です。", &settings, 30.0, &output).await;

        assert!(result.is_err());
        assert_eq!(speech.calls.load(Ordering::SeqCst), 2);
        assert!(!output.exists());

        // Already gone: nothing to do
        discard_partial(&output).await;
    }

    #[test]
    fn test_split_chunks_on_sentences() {
        let chunks = split_chunks("深海は暗い。光る魚がいる！  本当？", 10);
        assert_eq!(chunks, vec!["深海は暗い。", "光る魚がいる！本当？"]);
    }

    #[test]
    fn test_split_chunks_hard_splits_long_sentence() {
        let chunks = split_chunks("あいうえおかきくけこさしすせそ。", 6);
        assert_eq!(chunks, vec!["あいうえおか", "きくけこさし", "すせそ。"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 6));
    }

    #[test]
    fn test_split_chunks_ascii_spacing() {
        let chunks = split_chunks("Hello there. How are you?!\nFine.", 100);
        assert_eq!(chunks, vec!["Hello there. How are you?! Fine."]);
    }

    #[test]
    fn test_split_chunks_never_exceeds_limit() {
        let text = "一つ目の文です。二つ目の文はもう少し長いです。三。四つ目！";
        for max in 1..20 {
            for chunk in split_chunks(text, max) {
                assert!(chunk.chars().count() <= max, "max={max} chunk={chunk}");
            }
        }
    }

    #[test]
    fn test_chunk_budget() {
        assert!((chunk_budget(30.0, 50, 100) - 14.0).abs() < 1e-9);
        assert!((chunk_budget(1.0, 10, 10) - 1.0).abs() < 1e-9);
    }
}
