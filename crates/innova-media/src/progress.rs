//! Encoder progress reported through `-progress pipe:2`.
//!
//! Progress is telemetry only: it drives logs and job status polling but
//! never decides whether an encode succeeded.

use serde::{Deserialize, Serialize};

/// Keys FFmpeg writes in a `-progress` block.
const PROGRESS_KEYS: &[&str] = &[
    "frame",
    "fps",
    "bitrate",
    "total_size",
    "out_time_us",
    "out_time_ms",
    "out_time",
    "dup_frames",
    "drop_frames",
    "speed",
    "progress",
];

/// Snapshot of a running encode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Frames written so far
    pub frame: u64,
    /// Current encode FPS
    pub fps: f64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Bytes written so far
    pub total_size: u64,
    /// Encoding speed (1.5 = 1.5x realtime)
    pub speed: f64,
    /// Set by the final `progress=end` block
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Progress percentage given the expected output duration in milliseconds.
    pub fn percentage(&self, total_duration_ms: i64) -> f64 {
        if self.is_complete {
            return 100.0;
        }
        if total_duration_ms <= 0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / total_duration_ms as f64) * 100.0).clamp(0.0, 100.0)
    }
}

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(FfmpegProgress) + Send + Sync + 'static>;

/// Whether a stderr line belongs to a progress block rather than a log message.
pub(crate) fn is_progress_line(line: &str) -> bool {
    line.trim()
        .split_once('=')
        .map(|(key, _)| PROGRESS_KEYS.contains(&key) || key.starts_with("stream_"))
        .unwrap_or(false)
}

/// Fold one progress line into `current`.
///
/// Returns a snapshot at the end of every block (`progress=continue|end`).
pub(crate) fn parse_progress_line(
    line: &str,
    current: &mut FfmpegProgress,
) -> Option<FfmpegProgress> {
    let (key, value) = line.trim().split_once('=')?;

    match key {
        "out_time_us" => {
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
        }
        // Despite the name FFmpeg reports microseconds here too.
        "out_time_ms" => {
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
        }
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
        }
        "fps" => {
            if let Ok(fps) = value.parse() {
                current.fps = fps;
            }
        }
        "total_size" => {
            if let Ok(size) = value.parse() {
                current.total_size = size;
            }
        }
        "speed" => {
            // "1.5x" or "N/A"
            if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                current.speed = speed;
            }
        }
        "progress" => {
            if value == "end" {
                current.is_complete = true;
            }
            return Some(current.clone());
        }
        _ => {}
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percentage() {
        let progress = FfmpegProgress {
            out_time_ms: 1500,
            ..Default::default()
        };

        assert!((progress.percentage(3000) - 50.0).abs() < 0.01);
        assert!((progress.percentage(1000) - 100.0).abs() < 0.01);
        assert!(progress.percentage(0).abs() < 0.01);
    }

    #[test]
    fn test_block_parsing() {
        let mut progress = FfmpegProgress::default();
        let block = [
            "frame=75",
            "fps=25.00",
            "total_size=48",
            "out_time_us=3000000",
            "out_time_ms=3000000",
            "speed=1.5x",
        ];
        for line in block {
            assert!(parse_progress_line(line, &mut progress).is_none());
        }
        assert_eq!(progress.frame, 75);
        assert_eq!(progress.out_time_ms, 3000);
        assert!((progress.speed - 1.5).abs() < 0.01);

        let snapshot = parse_progress_line("progress=continue", &mut progress).unwrap();
        assert!(!snapshot.is_complete);

        let snapshot = parse_progress_line("progress=end", &mut progress).unwrap();
        assert!(snapshot.is_complete);
        assert!((snapshot.percentage(10_000) - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_speed_not_available() {
        let mut progress = FfmpegProgress::default();
        parse_progress_line("speed=N/A", &mut progress);
        assert!(progress.speed.abs() < f64::EPSILON);
    }

    #[test]
    fn test_progress_line_classification() {
        assert!(is_progress_line("out_time_us=1000"));
        assert!(is_progress_line("stream_0_0_q=28.0"));
        assert!(is_progress_line("progress=end"));
        assert!(!is_progress_line("[Parsed_drawtext_1 @ 0x55] Cannot find a valid font"));
        assert!(!is_progress_line("Error opening input file"));
    }
}
