//! Probed media metadata.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// What the demuxer reports about a media file.
///
/// Produced fresh by every probe; never cached. Video fields are `None`
/// when the file has no video stream (e.g. an audio upload).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    /// Duration in seconds
    pub duration_seconds: f64,
    /// Container format name(s), e.g. "mov,mp4,m4a,3gp,3g2,mj2"
    pub container_format: String,
    /// File size in bytes
    pub size_bytes: u64,
    /// Overall bitrate in bits/second
    pub bitrate_bps: u64,
    /// Width of the first video stream
    pub width: Option<u32>,
    /// Height of the first video stream
    pub height: Option<u32>,
    /// Raw frame rate expression of the first video stream, e.g. "30000/1001"
    pub frame_rate_expr: Option<String>,
}

impl MediaMetadata {
    /// Whether a video stream was found.
    pub fn has_video(&self) -> bool {
        self.width.is_some() && self.height.is_some()
    }

    /// Frame rate as a number, parsed from the raw expression.
    pub fn frame_rate(&self) -> Option<f64> {
        self.frame_rate_expr.as_deref().and_then(parse_frame_rate)
    }
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
pub fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
        assert!(parse_frame_rate("abc").is_none());
    }

    #[test]
    fn test_audio_only_metadata() {
        let meta = MediaMetadata {
            duration_seconds: 12.5,
            container_format: "mp3".to_string(),
            size_bytes: 200_000,
            bitrate_bps: 128_000,
            width: None,
            height: None,
            frame_rate_expr: None,
        };
        assert!(!meta.has_video());
        assert!(meta.frame_rate().is_none());

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["durationSeconds"], 12.5);
        assert!(json["width"].is_null());
        assert!(json["frameRateExpr"].is_null());
    }
}
