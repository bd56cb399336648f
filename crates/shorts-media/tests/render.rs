//! End-to-end renders against the real ffmpeg binaries.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use shorts_media::wav::encode_pcm16;
use shorts_media::{
    burn_subtitles, plan_cues, probe_media, render_slideshow, write_srt, FfmpegRunner,
    SlideshowSpec, SubtitleStyle,
};
use shorts_models::EncodingConfig;

const MAX_IMAGES: usize = 20;

fn ffmpeg_available() -> bool {
    which::which("ffmpeg").is_ok() && which::which("ffprobe").is_ok()
}

fn spec(duration_secs: f64) -> SlideshowSpec {
    SlideshowSpec {
        width: 216,
        height: 384,
        fps: 24,
        duration_secs,
        encoding: EncodingConfig::default().with_preset("ultrafast"),
    }
}

/// Solid-colour binary PPM, one shade per index.
fn write_ppm(path: &Path, index: usize) {
    let (w, h) = (64usize, 96usize);
    let mut bytes = format!("P6\n{} {}\n255\n", w, h).into_bytes();
    let shade = (index * 12 % 256) as u8;
    for _ in 0..w * h {
        bytes.extend_from_slice(&[shade, 255 - shade, 128]);
    }
    std::fs::write(path, bytes).unwrap();
}

fn images(dir: &Path, n: usize) -> Vec<PathBuf> {
    (0..n)
        .map(|i| {
            let path = dir.join(format!("image_{:02}.ppm", i));
            write_ppm(&path, i);
            path
        })
        .collect()
}

fn narration(dir: &Path, secs: f64) -> PathBuf {
    let rate = 24000u32;
    let samples: Vec<i16> = (0..(secs * rate as f64) as usize)
        .map(|i| ((i as f64 * 440.0 * std::f64::consts::TAU / rate as f64).sin() * 8000.0) as i16)
        .collect();
    let path = dir.join("narration.wav");
    std::fs::write(&path, encode_pcm16(&samples, rate).unwrap()).unwrap();
    path
}

async fn render(image_count: usize, narration_secs: f64, target_secs: f64) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let images = images(dir.path(), image_count);
    let audio = narration(dir.path(), narration_secs);
    let output = dir.path().join("rendered.mp4");
    let s = spec(target_secs);

    let info = render_slideshow(&images, &audio, &output, &s, &FfmpegRunner::new())
        .await
        .unwrap();

    assert!((info.duration - target_secs).abs() <= s.tolerance(), "duration {}", info.duration);
    assert_eq!((info.width, info.height), (216, 384));
    assert!(info.has_audio());
    (dir, output)
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_single_image_matches_target_duration() {
    if !ffmpeg_available() {
        return;
    }
    render(1, 2.0, 4.0).await;
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_max_images_match_target_duration() {
    if !ffmpeg_available() {
        return;
    }
    // 96 frames over 20 slides: fades are clamped to half a slide
    render(MAX_IMAGES, 2.0, 4.0).await;
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_long_narration_is_cut_to_target() {
    if !ffmpeg_available() {
        return;
    }
    render(3, 6.0, 3.0).await;
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_burned_video_keeps_duration() {
    if !ffmpeg_available() {
        return;
    }
    let (dir, rendered) = render(2, 3.0, 4.0).await;

    let cues = plan_cues("First caption. Second caption.", 3000, 500);
    let srt = dir.path().join("narration.srt");
    write_srt(&cues, &srt).await.unwrap();

    let output = dir.path().join("subtitled.mp4");
    burn_subtitles(
        &rendered,
        &srt,
        &output,
        &SubtitleStyle::default(),
        &EncodingConfig::default().with_preset("ultrafast"),
        &FfmpegRunner::new(),
    )
    .await
    .unwrap();

    let info = probe_media(&output).await.unwrap();
    assert!((info.duration - 4.0).abs() <= spec(4.0).tolerance(), "duration {}", info.duration);
    assert!(info.has_video() && info.has_audio());
}
