//! WAV inspection and concatenation.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Decoded WAV header plus length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Sample frames (samples per channel)
    pub frames: u64,
    pub duration_secs: f64,
}

impl WavInfo {
    fn from_reader<R: std::io::Read>(reader: &WavReader<R>) -> Self {
        let spec = reader.spec();
        let frames = reader.duration() as u64;
        Self {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            bits_per_sample: spec.bits_per_sample,
            frames,
            duration_secs: frames as f64 / spec.sample_rate.max(1) as f64,
        }
    }
}

/// Parse a WAV held in memory.
pub fn inspect_wav(bytes: &[u8]) -> MediaResult<WavInfo> {
    let reader = WavReader::new(Cursor::new(bytes))?;
    Ok(WavInfo::from_reader(&reader))
}

/// Read the header of a WAV file on disk.
pub fn inspect_wav_file(path: impl AsRef<Path>) -> MediaResult<WavInfo> {
    let reader = WavReader::open(path)?;
    Ok(WavInfo::from_reader(&reader))
}

/// Concatenate WAV chunks into one file.
///
/// All chunks must share sample rate, channel count and sample format.
/// The result must contain at least one frame.
pub fn concat_wav(chunks: &[Vec<u8>], output: &Path) -> MediaResult<WavInfo> {
    let Some(first) = chunks.first() else {
        return Err(MediaError::invalid_input("no audio chunks to concatenate"));
    };
    let spec = WavReader::new(Cursor::new(first.as_slice()))?.spec();

    let mut writer = WavWriter::create(output, spec)?;
    for (i, chunk) in chunks.iter().enumerate() {
        let mut reader = WavReader::new(Cursor::new(chunk.as_slice()))?;
        check_same_format(&spec, &reader.spec(), i)?;

        match spec.sample_format {
            SampleFormat::Float => {
                for sample in reader.samples::<f32>() {
                    writer.write_sample(sample?)?;
                }
            }
            SampleFormat::Int => {
                for sample in reader.samples::<i32>() {
                    writer.write_sample(sample?)?;
                }
            }
        }
    }
    writer.finalize()?;

    let info = inspect_wav_file(output)?;
    if info.frames == 0 {
        return Err(MediaError::invalid_media(format!(
            "{} contains no audio frames",
            output.display()
        )));
    }

    debug!(
        chunks = chunks.len(),
        duration = info.duration_secs,
        sample_rate = info.sample_rate,
        "Concatenated WAV"
    );
    Ok(info)
}

/// [`concat_wav`] on the blocking pool.
pub async fn concat_wav_async(chunks: Vec<Vec<u8>>, output: PathBuf) -> MediaResult<WavInfo> {
    tokio::task::spawn_blocking(move || concat_wav(&chunks, &output))
        .await
        .map_err(|e| MediaError::Io(std::io::Error::other(e)))?
}

fn check_same_format(expected: &WavSpec, actual: &WavSpec, index: usize) -> MediaResult<()> {
    if expected.sample_rate != actual.sample_rate
        || expected.channels != actual.channels
        || expected.bits_per_sample != actual.bits_per_sample
        || expected.sample_format != actual.sample_format
    {
        return Err(MediaError::AudioFormatMismatch(format!(
            "chunk {} is {}Hz/{}ch/{}bit, expected {}Hz/{}ch/{}bit",
            index,
            actual.sample_rate,
            actual.channels,
            actual.bits_per_sample,
            expected.sample_rate,
            expected.channels,
            expected.bits_per_sample
        )));
    }
    Ok(())
}

/// Encode mono 16-bit samples as WAV bytes.
pub fn encode_pcm16(samples: &[i16], sample_rate: u32) -> MediaResult<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for &s in samples {
            writer.write_sample(s)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_inspect_wav() {
        let bytes = encode_pcm16(&vec![0i16; 24_000], 24_000).unwrap();
        let info = inspect_wav(&bytes).unwrap();
        assert_eq!(info.frames, 24_000);
        assert_eq!(info.channels, 1);
        assert!((info.duration_secs - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_concat_preserves_order_and_length() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("narration.wav");
        let a = encode_pcm16(&[1, 2, 3], 24_000).unwrap();
        let b = encode_pcm16(&[4, 5], 24_000).unwrap();

        let info = concat_wav(&[a, b], &out).unwrap();
        assert_eq!(info.frames, 5);

        let mut reader = WavReader::open(&out).unwrap();
        let samples: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(samples, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_concat_rejects_mismatched_rates() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("narration.wav");
        let a = encode_pcm16(&[1, 2, 3], 24_000).unwrap();
        let b = encode_pcm16(&[4, 5], 44_100).unwrap();

        assert!(matches!(
            concat_wav(&[a, b], &out),
            Err(MediaError::AudioFormatMismatch(_))
        ));
    }

    #[test]
    fn test_concat_rejects_silence_of_zero_length() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("narration.wav");
        let empty = encode_pcm16(&[], 24_000).unwrap();

        assert!(matches!(
            concat_wav(&[empty], &out),
            Err(MediaError::InvalidMedia(_))
        ));
        assert!(concat_wav(&[], &out).is_err());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(inspect_wav(b"not a wav"), Err(MediaError::Wav(_))));
    }
}
