//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};
use tracing::info;

/// Progress information from FFmpeg.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Current FPS
    pub fps: f64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Fold one line of `-progress` output into the current state.
    ///
    /// Returns a snapshot at the end of each progress block (`progress=...`).
    /// Lines that are not `key=value` pairs are ignored.
    pub fn apply_line(&mut self, line: &str) -> Option<FfmpegProgress> {
        let (key, value) = line.trim().split_once('=')?;
        match key {
            // ffmpeg reports out_time_ms in microseconds despite the name
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.out_time_ms = us / 1000;
                }
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    self.frame = frame;
                }
            }
            "fps" => {
                if let Ok(fps) = value.parse() {
                    self.fps = fps;
                }
            }
            "speed" => {
                if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                    self.speed = speed;
                }
            }
            "progress" => {
                if value == "end" {
                    self.is_complete = true;
                }
                return Some(self.clone());
            }
            _ => {}
        }
        None
    }

    /// Calculate progress percentage given total duration in milliseconds.
    pub fn percentage(&self, total_duration_ms: i64) -> f64 {
        if total_duration_ms <= 0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / total_duration_ms as f64) * 100.0).clamp(0.0, 100.0)
    }

    /// Estimate time remaining in seconds.
    pub fn eta_seconds(&self, total_duration_ms: i64) -> Option<f64> {
        if self.speed <= 0.0 || self.out_time_ms <= 0 {
            return None;
        }

        let remaining_ms = total_duration_ms - self.out_time_ms;
        if remaining_ms <= 0 {
            return Some(0.0);
        }

        Some((remaining_ms as f64 / 1000.0) / self.speed)
    }
}

/// Whether a stderr line belongs to the `-progress` stream.
pub(crate) fn is_progress_line(line: &str) -> bool {
    match line.split_once('=') {
        Some((key, _)) => !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
        None => false,
    }
}

/// Logs render progress in quarter steps.
#[derive(Debug, Clone)]
pub struct ProgressLogger {
    label: String,
    total_ms: i64,
    next_step: u8,
}

impl ProgressLogger {
    pub fn new(label: impl Into<String>, total_secs: f64) -> Self {
        Self {
            label: label.into(),
            total_ms: (total_secs * 1000.0) as i64,
            next_step: 25,
        }
    }

    /// Record a snapshot; returns the percentage if a step was logged.
    pub fn observe(&mut self, progress: &FfmpegProgress) -> Option<u8> {
        let pct = progress.percentage(self.total_ms);
        if self.next_step > 100 || pct < self.next_step as f64 {
            return None;
        }
        while self.next_step <= 100 && pct >= self.next_step as f64 {
            self.next_step += 25;
        }
        let step = self.next_step - 25;
        info!(
            label = %self.label,
            percent = step,
            speed = progress.speed,
            eta_secs = progress.eta_seconds(self.total_ms).unwrap_or(0.0),
            "Render progress"
        );
        Some(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_lines() {
        let mut progress = FfmpegProgress::default();

        assert!(progress.apply_line("out_time_us=5000000").is_none());
        assert_eq!(progress.out_time_ms, 5000);

        progress.apply_line("speed=1.5x");
        assert!((progress.speed - 1.5).abs() < 0.01);

        progress.apply_line("speed=N/A");
        assert!((progress.speed - 1.5).abs() < 0.01);

        let snapshot = progress.apply_line("progress=end").unwrap();
        assert!(snapshot.is_complete);
    }

    #[test]
    fn test_percentage_and_eta() {
        let progress = FfmpegProgress {
            out_time_ms: 5000,
            speed: 2.0,
            ..Default::default()
        };

        assert!((progress.percentage(10000) - 50.0).abs() < 0.01);
        assert!((progress.eta_seconds(10000).unwrap() - 2.5).abs() < 0.01);
        assert_eq!(progress.percentage(0), 0.0);
    }

    #[test]
    fn test_progress_line_detection() {
        assert!(is_progress_line("out_time_us=100"));
        assert!(is_progress_line("progress=continue"));
        assert!(!is_progress_line("[libx264 @ 0x55] error: bad option"));
        assert!(!is_progress_line("Invalid data found when processing input"));
    }

    #[test]
    fn test_logger_steps() {
        let mut logger = ProgressLogger::new("slideshow", 10.0);
        let at = |ms| FfmpegProgress {
            out_time_ms: ms,
            ..Default::default()
        };

        assert_eq!(logger.observe(&at(1000)), None);
        assert_eq!(logger.observe(&at(6000)), Some(50));
        assert_eq!(logger.observe(&at(6500)), None);
        assert_eq!(logger.observe(&at(10000)), Some(100));
        assert_eq!(logger.observe(&at(10000)), None);
    }
}
