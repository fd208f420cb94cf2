//! End-to-end pipeline tests against a real FFmpeg.
//!
//! Each test returns early when ffmpeg, ffprobe or the needed encoders are
//! not installed.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use innova_media::{probe, EncodePool, TransformOptions, TransformPipeline, TransformStage};
use innova_models::{AudioMode, ColorFilters, EditSpec};
use tempfile::TempDir;
use tokio::process::Command;
use tokio::sync::watch;

async fn ffmpeg_ready() -> bool {
    if which::which("ffmpeg").is_err() || which::which("ffprobe").is_err() {
        return false;
    }
    match Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .output()
        .await
    {
        Ok(out) => {
            let encoders = String::from_utf8_lossy(&out.stdout);
            encoders.contains("libx264") && encoders.contains(" aac ")
        }
        Err(_) => false,
    }
}

/// Render a synthetic clip with lavfi sources.
async fn render(args: &[&str], output: &Path) -> bool {
    Command::new("ffmpeg")
        .args(["-y", "-hide_banner", "-v", "error"])
        .args(args)
        .arg(output)
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

async fn test_clip(dir: &Path) -> Option<PathBuf> {
    let path = dir.join("source.mp4");
    let ok = render(
        &[
            "-f", "lavfi", "-i", "testsrc=duration=10:size=320x240:rate=25",
            "-f", "lavfi", "-i", "sine=frequency=440:duration=10",
            "-c:v", "libx264", "-preset", "ultrafast", "-c:a", "aac", "-shortest",
        ],
        &path,
    )
    .await;
    ok.then_some(path)
}

async fn test_tone(dir: &Path) -> Option<PathBuf> {
    let path = dir.join("tone.m4a");
    let ok = render(
        &["-f", "lavfi", "-i", "sine=frequency=880:duration=4", "-c:a", "aac"],
        &path,
    )
    .await;
    ok.then_some(path)
}

fn pipeline(dir: &Path) -> TransformPipeline {
    TransformPipeline::new(dir, EncodePool::new(1, 4))
}

#[tokio::test]
async fn test_trim_produces_window_length() {
    if !ffmpeg_ready().await {
        return;
    }
    let dir = TempDir::new().unwrap();
    let Some(source) = test_clip(dir.path()).await else {
        return;
    };

    let spec = EditSpec::new(&source, "trimmed.mp4")
        .with_trim(2.0, 5.0)
        .with_filters(ColorFilters {
            brightness: 120,
            grayscale: 100,
            ..ColorFilters::default()
        });

    let progressed = Arc::new(AtomicBool::new(false));
    let seen = progressed.clone();
    let options = TransformOptions::default().with_progress(Box::new(move |_| {
        seen.store(true, Ordering::SeqCst);
    }));

    let output = pipeline(dir.path()).transform_with(&spec, options).await.unwrap();
    assert_eq!(output, dir.path().join("trimmed.mp4"));
    assert!(progressed.load(Ordering::SeqCst));

    let meta = probe(&output).await.unwrap();
    assert!((meta.duration_seconds - 3.0).abs() < 0.25, "{}", meta.duration_seconds);
    assert_eq!(meta.width, Some(320));
    assert_eq!(meta.height, Some(240));
}

#[tokio::test]
async fn test_replace_audio_keeps_video_length() {
    if !ffmpeg_ready().await {
        return;
    }
    let dir = TempDir::new().unwrap();
    let (Some(source), Some(tone)) = (test_clip(dir.path()).await, test_tone(dir.path()).await)
    else {
        return;
    };

    let spec = EditSpec::new(&source, "dubbed.mp4").with_audio(&tone, AudioMode::Replace);
    let output = pipeline(dir.path()).transform(&spec).await.unwrap();

    let meta = probe(&output).await.unwrap();
    assert!((meta.duration_seconds - 10.0).abs() < 0.5, "{}", meta.duration_seconds);
}

#[tokio::test]
async fn test_cancelled_encode_leaves_no_output() {
    if !ffmpeg_ready().await {
        return;
    }
    let dir = TempDir::new().unwrap();
    let Some(source) = test_clip(dir.path()).await else {
        return;
    };

    let (cancel_tx, cancel_rx) = watch::channel(true);
    let spec = EditSpec::new(&source, "cancelled.mp4");
    let err = pipeline(dir.path())
        .transform_with(&spec, TransformOptions::default().with_cancel(cancel_rx))
        .await
        .unwrap_err();
    drop(cancel_tx);

    assert_eq!(err.stage, TransformStage::Cancelled);
    assert!(!dir.path().join("cancelled.mp4").exists());
}

#[tokio::test]
async fn test_probe_audio_only_file() {
    if !ffmpeg_ready().await {
        return;
    }
    let dir = TempDir::new().unwrap();
    let Some(tone) = test_tone(dir.path()).await else {
        return;
    };

    let meta = probe(&tone).await.unwrap();
    assert!(!meta.has_video());
    assert!((meta.duration_seconds - 4.0).abs() < 0.25);
}

#[tokio::test]
async fn test_corrupt_input_is_encode_failure() {
    if !ffmpeg_ready().await {
        return;
    }
    let dir = TempDir::new().unwrap();
    let bogus = dir.path().join("bogus.mp4");
    tokio::fs::write(&bogus, b"definitely not a video").await.unwrap();

    let spec = EditSpec::new(&bogus, "out.mp4");
    let err = pipeline(dir.path()).transform(&spec).await.unwrap_err();
    assert_eq!(err.stage, TransformStage::EncodeFailed);
    assert!(!err.cause.is_empty());
    assert!(!dir.path().join("out.mp4").exists());
}
