//! FFprobe media inspection.

use std::path::Path;
use std::process::Stdio;

use innova_models::MediaMetadata;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::error::{ProbeError, ProbeResult};

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    size: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
}

/// Probe a media file.
///
/// Fails with [`ProbeError::NotFound`] before spawning anything when the
/// path does not exist.
pub async fn probe(path: impl AsRef<Path>) -> ProbeResult<MediaMetadata> {
    let path = path.as_ref();

    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(ProbeError::NotFound(path.to_path_buf()));
    }

    which::which("ffprobe").map_err(|_| ProbeError::FfprobeNotFound)?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(ProbeError::Unreadable {
            path: path.to_path_buf(),
            message: stderr
                .lines()
                .last()
                .unwrap_or("FFprobe failed")
                .to_string(),
            stderr: (!stderr.is_empty()).then_some(stderr),
        });
    }

    let metadata = metadata_from_output(path, &output.stdout)?;
    debug!(
        path = %path.display(),
        duration = metadata.duration_seconds,
        format = %metadata.container_format,
        "Probed media"
    );
    Ok(metadata)
}

/// Duration of a media file in seconds.
pub async fn probe_duration(path: impl AsRef<Path>) -> ProbeResult<f64> {
    Ok(probe(path).await?.duration_seconds)
}

/// Turn FFprobe's JSON report into metadata.
pub(crate) fn metadata_from_output(path: &Path, stdout: &[u8]) -> ProbeResult<MediaMetadata> {
    let report: FfprobeOutput = serde_json::from_slice(stdout)?;

    let format = match report.format {
        Some(format) if !report.streams.is_empty() => format,
        _ => return Err(ProbeError::NoStreams(path.to_path_buf())),
    };

    let video = report
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"));

    let duration_seconds = format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let size_bytes = format
        .size
        .as_deref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let bitrate_bps = format
        .bit_rate
        .as_deref()
        .and_then(|b| b.parse::<u64>().ok())
        .unwrap_or(0);

    Ok(MediaMetadata {
        duration_seconds,
        container_format: format.format_name.unwrap_or_default(),
        size_bytes,
        bitrate_bps,
        width: video.and_then(|v| v.width),
        height: video.and_then(|v| v.height),
        frame_rate_expr: video.and_then(|v| v.r_frame_rate.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIDEO_REPORT: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080, "r_frame_rate": "30000/1001"},
            {"index": 1, "codec_type": "audio", "codec_name": "aac", "sample_rate": "48000"}
        ],
        "format": {
            "filename": "clip.mp4",
            "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
            "duration": "10.010000",
            "size": "5242880",
            "bit_rate": "4190000"
        }
    }"#;

    const AUDIO_REPORT: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "audio", "codec_name": "mp3"}
        ],
        "format": {
            "format_name": "mp3",
            "duration": "184.320000",
            "size": "2949120",
            "bit_rate": "128000"
        }
    }"#;

    #[test]
    fn test_video_report() {
        let meta = metadata_from_output(Path::new("clip.mp4"), VIDEO_REPORT.as_bytes()).unwrap();
        assert!((meta.duration_seconds - 10.01).abs() < 1e-9);
        assert_eq!(meta.container_format, "mov,mp4,m4a,3gp,3g2,mj2");
        assert_eq!(meta.size_bytes, 5_242_880);
        assert_eq!(meta.bitrate_bps, 4_190_000);
        assert_eq!(meta.width, Some(1920));
        assert_eq!(meta.height, Some(1080));
        assert_eq!(meta.frame_rate_expr.as_deref(), Some("30000/1001"));
        assert!((meta.frame_rate().unwrap() - 29.97).abs() < 0.01);
    }

    #[test]
    fn test_audio_only_report_has_no_video_fields() {
        let meta = metadata_from_output(Path::new("song.mp3"), AUDIO_REPORT.as_bytes()).unwrap();
        assert!(!meta.has_video());
        assert!(meta.width.is_none());
        assert!(meta.frame_rate_expr.is_none());
        assert!((meta.duration_seconds - 184.32).abs() < 1e-9);
    }

    #[test]
    fn test_missing_format_fields_default_to_zero() {
        let report = r#"{"streams": [{"codec_type": "video", "width": 640, "height": 360}], "format": {}}"#;
        let meta = metadata_from_output(Path::new("x.webm"), report.as_bytes()).unwrap();
        assert_eq!(meta.duration_seconds, 0.0);
        assert_eq!(meta.size_bytes, 0);
        assert_eq!(meta.container_format, "");
    }

    #[test]
    fn test_no_streams() {
        let err = metadata_from_output(Path::new("junk.bin"), br#"{"streams": []}"#).unwrap_err();
        assert!(matches!(err, ProbeError::NoStreams(_)));

        let err = metadata_from_output(Path::new("junk.bin"), b"{}").unwrap_err();
        assert!(matches!(err, ProbeError::NoStreams(_)));
    }

    #[tokio::test]
    async fn test_missing_file_fails_before_spawning() {
        let err = probe("/definitely/not/here.mp4").await.unwrap_err();
        assert!(matches!(err, ProbeError::NotFound(_)));
    }
}
