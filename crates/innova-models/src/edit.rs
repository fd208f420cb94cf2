//! Declarative video edit requests.
//!
//! An [`EditSpec`] describes everything the transform pipeline applies to a
//! single input: an optional trim window, color correction, timed text
//! overlays and an optional extra audio track.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Neutral value for brightness, contrast and saturation.
pub const NEUTRAL_LEVEL: u32 = 100;
/// Upper bound for brightness, contrast and saturation.
pub const MAX_LEVEL: u32 = 200;
/// Upper bound for grayscale.
pub const MAX_GRAYSCALE: u32 = 100;

/// Default overlay font size.
pub const DEFAULT_TEXT_SIZE: u32 = 36;
/// Default overlay font color.
pub const DEFAULT_TEXT_COLOR: &str = "white";
/// Default overlay duration in seconds.
pub const DEFAULT_TEXT_DURATION: f64 = 5.0;

/// Validation failures for an [`EditSpec`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditSpecError {
    #[error("Trim end ({end}) must be greater than trim start ({start})")]
    InvalidTrim { start: f64, end: f64 },

    #[error("Trim start must be a non-negative number, got {0}")]
    InvalidTrimStart(f64),

    #[error("Filter {name}={value} is out of range (0-{max})")]
    FilterOutOfRange {
        name: &'static str,
        value: u32,
        max: u32,
    },

    #[error("Text overlay #{index}: {reason}")]
    InvalidOverlay { index: usize, reason: String },

    #[error("Invalid font color: {0}")]
    InvalidColor(String),

    #[error("Invalid output name: {0}")]
    InvalidOutputName(String),
}

/// Trim window in seconds, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrimWindow {
    pub start: f64,
    pub end: f64,
}

impl TrimWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Length of the encode window.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    fn validate(&self) -> Result<(), EditSpecError> {
        if !self.start.is_finite() || self.start < 0.0 {
            return Err(EditSpecError::InvalidTrimStart(self.start));
        }
        if !self.end.is_finite() || self.end <= self.start {
            return Err(EditSpecError::InvalidTrim {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }
}

/// Color correction levels.
///
/// Brightness, contrast and saturation are percentages where 100 is
/// neutral. Grayscale is 0 (untouched) to 100 (fully desaturated).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ColorFilters {
    #[serde(default = "neutral_level")]
    pub brightness: u32,
    #[serde(default = "neutral_level")]
    pub contrast: u32,
    #[serde(default = "neutral_level")]
    pub saturation: u32,
    #[serde(default)]
    pub grayscale: u32,
}

fn neutral_level() -> u32 {
    NEUTRAL_LEVEL
}

impl Default for ColorFilters {
    fn default() -> Self {
        Self {
            brightness: NEUTRAL_LEVEL,
            contrast: NEUTRAL_LEVEL,
            saturation: NEUTRAL_LEVEL,
            grayscale: 0,
        }
    }
}

impl ColorFilters {
    fn validate(&self) -> Result<(), EditSpecError> {
        let levels = [
            ("brightness", self.brightness, MAX_LEVEL),
            ("contrast", self.contrast, MAX_LEVEL),
            ("saturation", self.saturation, MAX_LEVEL),
            ("grayscale", self.grayscale, MAX_GRAYSCALE),
        ];
        for (name, value, max) in levels {
            if value > max {
                return Err(EditSpecError::FilterOutOfRange { name, value, max });
            }
        }
        Ok(())
    }
}

/// A centered text overlay visible during `[start_time, start_time + duration)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TextOverlay {
    pub text: String,
    #[serde(default = "default_text_size")]
    pub size: u32,
    #[serde(default = "default_text_color")]
    pub color: String,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default = "default_text_duration")]
    pub duration: f64,
}

fn default_text_size() -> u32 {
    DEFAULT_TEXT_SIZE
}
fn default_text_color() -> String {
    DEFAULT_TEXT_COLOR.to_string()
}
fn default_text_duration() -> f64 {
    DEFAULT_TEXT_DURATION
}

impl TextOverlay {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            size: DEFAULT_TEXT_SIZE,
            color: DEFAULT_TEXT_COLOR.to_string(),
            start_time: 0.0,
            duration: DEFAULT_TEXT_DURATION,
        }
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn with_timing(mut self, start_time: f64, duration: f64) -> Self {
        self.start_time = start_time;
        self.duration = duration;
        self
    }

    /// End of the visibility window (exclusive).
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    fn validate(&self, index: usize) -> Result<(), EditSpecError> {
        let invalid = |reason: &str| EditSpecError::InvalidOverlay {
            index,
            reason: reason.to_string(),
        };

        if self.text.trim().is_empty() {
            return Err(invalid("text must not be empty"));
        }
        if self.size == 0 {
            return Err(invalid("size must be positive"));
        }
        if !self.start_time.is_finite() || self.start_time < 0.0 {
            return Err(invalid("startTime must be a non-negative number"));
        }
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(invalid("duration must be positive"));
        }
        if !is_valid_color(&self.color) {
            return Err(EditSpecError::InvalidColor(self.color.clone()));
        }
        Ok(())
    }
}

/// Font colors are color names or hex values, optionally with an `@alpha` suffix.
fn is_valid_color(color: &str) -> bool {
    let (base, alpha) = match color.split_once('@') {
        Some((base, alpha)) => (base, Some(alpha)),
        None => (color, None),
    };

    let base_ok = !base.is_empty() && base.chars().all(|c| c.is_ascii_alphanumeric() || c == '#');
    let alpha_ok = alpha.map_or(true, |a| {
        !a.is_empty() && a.chars().all(|c| c.is_ascii_digit() || c == '.')
    });

    base_ok && alpha_ok
}

/// How an extra audio track combines with the input's own audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioMode {
    /// Output audio comes only from the extra track.
    #[default]
    Replace,
    /// Original audio mixed with the extra track at half volume.
    Mix,
}

impl AudioMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioMode::Replace => "replace",
            AudioMode::Mix => "mix",
        }
    }
}

/// Extra audio input for an edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AudioTrack {
    pub path: PathBuf,
    #[serde(default)]
    pub mode: AudioMode,
}

impl AudioTrack {
    pub fn new(path: impl Into<PathBuf>, mode: AudioMode) -> Self {
        Self {
            path: path.into(),
            mode,
        }
    }
}

/// A complete edit request for one input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditSpec {
    /// Local path of the uploaded input.
    pub input_path: PathBuf,
    /// File name of the output inside the processed directory.
    pub output_name: String,
    #[serde(default)]
    pub trim: Option<TrimWindow>,
    #[serde(default)]
    pub filters: Option<ColorFilters>,
    #[serde(default)]
    pub text_overlays: Vec<TextOverlay>,
    #[serde(default)]
    pub audio: Option<AudioTrack>,
}

impl EditSpec {
    /// Create a spec that re-encodes `input_path` with no edits.
    pub fn new(input_path: impl Into<PathBuf>, output_name: impl Into<String>) -> Self {
        Self {
            input_path: input_path.into(),
            output_name: output_name.into(),
            trim: None,
            filters: None,
            text_overlays: Vec::new(),
            audio: None,
        }
    }

    pub fn with_trim(mut self, start: f64, end: f64) -> Self {
        self.trim = Some(TrimWindow::new(start, end));
        self
    }

    pub fn with_filters(mut self, filters: ColorFilters) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn with_overlay(mut self, overlay: TextOverlay) -> Self {
        self.text_overlays.push(overlay);
        self
    }

    pub fn with_audio(mut self, path: impl Into<PathBuf>, mode: AudioMode) -> Self {
        self.audio = Some(AudioTrack::new(path, mode));
        self
    }

    /// Check every invariant that does not require the filesystem.
    pub fn validate(&self) -> Result<(), EditSpecError> {
        validate_output_name(&self.output_name)?;

        if let Some(trim) = &self.trim {
            trim.validate()?;
        }
        if let Some(filters) = &self.filters {
            filters.validate()?;
        }
        for (index, overlay) in self.text_overlays.iter().enumerate() {
            overlay.validate(index)?;
        }
        Ok(())
    }
}

/// Output names must be bare file names so the output stays inside the
/// processed directory.
pub fn validate_output_name(name: &str) -> Result<(), EditSpecError> {
    let invalid = || EditSpecError::InvalidOutputName(name.to_string());

    if name.is_empty() || name == "." || name == ".." {
        return Err(invalid());
    }
    if name.contains(['/', '\\', '\0']) || name.contains("..") {
        return Err(invalid());
    }
    if name.starts_with('-') {
        // Would be parsed as an ffmpeg option.
        return Err(invalid());
    }
    Ok(())
}
