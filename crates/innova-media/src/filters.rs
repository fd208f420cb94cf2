//! Typed FFmpeg video filter graph.
//!
//! Edits are kept as [`FilterOp`] values and rendered to FFmpeg's textual
//! filter syntax only when the command line is built. Color correction
//! always comes first, as a single comma-joined stage in the order
//! brightness, contrast, saturation, grayscale; text overlays follow in
//! the order the caller supplied them, so later overlays draw on top.

use innova_models::edit::NEUTRAL_LEVEL;
use innova_models::{ColorFilters, EditSpec, TextOverlay};

/// Half-open visibility window `[start, end)` in output seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Whether playback time `t` falls inside the window.
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t < self.end
    }

    /// FFmpeg timeline expression equivalent to [`TimeWindow::contains`].
    pub fn to_enable_expr(&self) -> String {
        format!(
            "gte(t,{})*lt(t,{})",
            format_number(self.start),
            format_number(self.end)
        )
    }
}

/// A centered `drawtext` overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawText {
    pub text: String,
    pub font_size: u32,
    pub font_color: String,
    pub visible: TimeWindow,
}

impl From<&TextOverlay> for DrawText {
    fn from(overlay: &TextOverlay) -> Self {
        Self {
            text: overlay.text.clone(),
            font_size: overlay.size,
            font_color: overlay.color.clone(),
            visible: TimeWindow::new(overlay.start_time, overlay.end_time()),
        }
    }
}

/// One video filter operation.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    /// `eq=brightness`, range [-1, 1]
    Brightness(f64),
    /// `eq=contrast`, multiplicative
    Contrast(f64),
    /// `eq=saturation`, multiplicative
    Saturation(f64),
    /// `hue=s`, 0 = fully desaturated
    Desaturate(f64),
    DrawText(DrawText),
}

impl FilterOp {
    /// Color terms share a single stage.
    pub fn is_color(&self) -> bool {
        !matches!(self, FilterOp::DrawText(_))
    }

    /// Render in FFmpeg filter syntax.
    pub fn render(&self) -> String {
        match self {
            FilterOp::Brightness(v) => format!("eq=brightness={}", format_number(*v)),
            FilterOp::Contrast(v) => format!("eq=contrast={}", format_number(*v)),
            FilterOp::Saturation(v) => format!("eq=saturation={}", format_number(*v)),
            FilterOp::Desaturate(v) => format!("hue=s={}", format_number(*v)),
            FilterOp::DrawText(dt) => format!(
                "drawtext=text={}:fontsize={}:fontcolor={}:x=(w-text_w)/2:y=(h-text_h)/2:enable='{}'",
                escape_text(&dt.text),
                dt.font_size,
                dt.font_color,
                dt.visible.to_enable_expr()
            ),
        }
    }
}

/// Ordered video filter operations for one edit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGraph {
    ops: Vec<FilterOp>,
}

impl FilterGraph {
    /// Build the graph for an edit request.
    pub fn from_spec(spec: &EditSpec) -> Self {
        Self::build(spec.filters.as_ref(), &spec.text_overlays)
    }

    /// Build from color levels and overlays.
    pub fn build(filters: Option<&ColorFilters>, overlays: &[TextOverlay]) -> Self {
        let mut ops = filters.map(color_ops).unwrap_or_default();
        ops.extend(
            overlays
                .iter()
                .map(|overlay| FilterOp::DrawText(DrawText::from(overlay))),
        );
        Self { ops }
    }

    pub fn ops(&self) -> &[FilterOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Color correction terms.
    pub fn color_ops(&self) -> impl Iterator<Item = &FilterOp> {
        self.ops.iter().filter(|op| op.is_color())
    }

    /// Text overlays in layering order.
    pub fn draw_texts(&self) -> impl Iterator<Item = &DrawText> {
        self.ops.iter().filter_map(|op| match op {
            FilterOp::DrawText(dt) => Some(dt),
            _ => None,
        })
    }

    /// Filter stages: one color-correction stage (if any), then one per overlay.
    pub fn stages(&self) -> Vec<String> {
        let color: Vec<String> = self.color_ops().map(FilterOp::render).collect();

        let mut stages = Vec::new();
        if !color.is_empty() {
            stages.push(color.join(","));
        }
        stages.extend(
            self.ops
                .iter()
                .filter(|op| !op.is_color())
                .map(FilterOp::render),
        );
        stages
    }

    /// The `-vf` argument, or `None` when nothing needs filtering.
    pub fn to_filter_string(&self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self.stages().join(","))
        }
    }
}

/// Color terms for every level that differs from neutral.
fn color_ops(filters: &ColorFilters) -> Vec<FilterOp> {
    let mut ops = Vec::new();

    if filters.brightness != NEUTRAL_LEVEL {
        ops.push(FilterOp::Brightness(
            (filters.brightness as f64 - 100.0) / 100.0,
        ));
    }
    if filters.contrast != NEUTRAL_LEVEL {
        ops.push(FilterOp::Contrast(filters.contrast as f64 / 100.0));
    }
    if filters.saturation != NEUTRAL_LEVEL {
        ops.push(FilterOp::Saturation(filters.saturation as f64 / 100.0));
    }
    if filters.grayscale > 0 {
        ops.push(FilterOp::Desaturate(1.0 - filters.grayscale as f64 / 100.0));
    }

    ops
}

/// Characters drawtext's own text expansion treats specially.
const EXPANSION_SPECIALS: &[char] = &['\\', '%'];
/// Characters special inside a filter option value.
const OPTION_SPECIALS: &[char] = &['\\', '\'', ':'];
/// Characters special to the filtergraph parser.
const GRAPH_SPECIALS: &[char] = &['\\', '\'', ',', ';', '[', ']'];

/// Escape overlay text as an unquoted `text=` value inside a `-vf` graph.
///
/// FFmpeg unescapes the value three times: once splitting the graph into
/// filters, once splitting the filter's options, and once more when
/// drawtext expands `%{...}` sequences. Each pass gets its own layer of
/// backslashes, innermost first, so the text drawn is exactly the input.
pub fn escape_text(text: &str) -> String {
    let expansion = escape_with(text, EXPANSION_SPECIALS, false);
    // The option parser trims unescaped whitespace at both ends.
    let option = escape_with(&expansion, OPTION_SPECIALS, true);
    escape_with(&option, GRAPH_SPECIALS, false)
}

fn escape_with(text: &str, specials: &[char], keep_edge_whitespace: bool) -> String {
    let first = text.find(|c: char| !c.is_whitespace()).unwrap_or(text.len());
    let last = text
        .rfind(|c: char| !c.is_whitespace())
        .map_or(0, |i| i + 1);

    let mut escaped = String::with_capacity(text.len() + 8);
    for (i, c) in text.char_indices() {
        let edge = keep_edge_whitespace && c.is_whitespace() && (i < first || i >= last);
        if edge || specials.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Shortest decimal form, rounded to 6 places ("0.2", "1", "0.35").
fn format_number(value: f64) -> String {
    let rounded = (value * 1_000_000.0).round() / 1_000_000.0;
    if rounded == 0.0 {
        "0".to_string()
    } else {
        format!("{}", rounded)
    }
}
