//! Layout and rendering configuration
//!
//! Geometric constants are expressed as fractions of the em size of the
//! current style and converted to device units once per style by the
//! metrics pass.

use crate::error::MathResult;
use crate::font::MathStyle;
use serde::{Deserialize, Serialize};
use std::path::Path;

// =============================================================================
// Colors
// =============================================================================

/// A color in RGBA format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    pub const GRAY: Color = Color::rgb(160, 160, 160);
    pub const SELECTION: Color = Color::new(120, 160, 255, 96);
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

// =============================================================================
// Layout Configuration
// =============================================================================

/// Font size, zoom and the geometric constants of the metrics pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Em size of text style at 100% zoom, in device units
    pub base_font_size: f32,
    /// Zoom in percent
    pub zoom: u32,
    pub display_scale: f32,
    pub text_scale: f32,
    pub script_scale: f32,
    pub scriptscript_scale: f32,

    /// Height of the math axis above the baseline
    pub axis_height: f32,
    /// Superscript baseline raise
    pub sup_shift: f32,
    /// Subscript baseline drop
    pub sub_shift: f32,
    /// Horizontal gap between nucleus and scripts
    pub script_gap: f32,
    /// Vertical gap between a large operator and its limits
    pub limits_gap: f32,

    pub fraction_rule: f32,
    /// Gap between the rule and numerator / denominator
    pub fraction_gap: f32,
    /// Horizontal padding on both sides of a fraction
    pub fraction_padding: f32,

    pub radical_gap: f32,
    pub radical_width: f32,
    /// Raise of a root degree above the baseline, relative to the radicand height
    pub degree_raise: f32,

    pub delimiter_width: f32,
    /// Extra height delimiters extend beyond their content
    pub delimiter_extra: f32,

    pub column_gap: f32,
    pub row_gap: f32,

    pub decoration_height: f32,
    pub decoration_gap: f32,

    /// Space on each side of a binary operator
    pub binop_space: f32,
    /// Space on each side of a relation
    pub relation_space: f32,

    /// Width of an empty cell placeholder
    pub empty_cell_width: f32,
    /// Draw a frame around empty cells
    pub frame_empty_cells: bool,
    /// Space between the formula and an equation number
    pub number_gap: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            base_font_size: 16.0,
            zoom: 100,
            display_scale: 1.0,
            text_scale: 1.0,
            script_scale: 0.7,
            scriptscript_scale: 0.5,
            axis_height: 0.25,
            sup_shift: 0.45,
            sub_shift: 0.25,
            script_gap: 0.05,
            limits_gap: 0.1,
            fraction_rule: 0.05,
            fraction_gap: 0.1,
            fraction_padding: 0.1,
            radical_gap: 0.1,
            radical_width: 0.6,
            degree_raise: 0.6,
            delimiter_width: 0.35,
            delimiter_extra: 0.1,
            column_gap: 1.0,
            row_gap: 0.3,
            decoration_height: 0.3,
            decoration_gap: 0.05,
            binop_space: 0.22,
            relation_space: 0.28,
            empty_cell_width: 0.5,
            frame_empty_cells: true,
            number_gap: 1.0,
        }
    }
}

impl LayoutConfig {
    /// Em size in device units for `style`, zoom included
    pub fn font_size(&self, style: MathStyle) -> f32 {
        let scale = match style {
            MathStyle::Display => self.display_scale,
            MathStyle::Text => self.text_scale,
            MathStyle::Script => self.script_scale,
            MathStyle::ScriptScript => self.scriptscript_scale,
        };
        self.base_font_size * scale * self.zoom as f32 / 100.0
    }

    /// Convert an em-relative constant to device units for `style`
    pub fn units(&self, ratio: f32, style: MathStyle) -> i32 {
        (ratio * self.font_size(style)).round() as i32
    }
}

// =============================================================================
// Render Configuration
// =============================================================================

/// Colors used by the draw pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub text_color: Color,
    /// Color of Unknown nodes
    pub error_color: Color,
    pub frame_color: Color,
    pub selection_color: Color,
    pub cursor_color: Color,
    /// Color of macro names drawn without a known template
    pub macro_color: Color,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            text_color: Color::BLACK,
            error_color: Color::RED,
            frame_color: Color::GRAY,
            selection_color: Color::SELECTION,
            cursor_color: Color::BLACK,
            macro_color: Color::BLUE,
        }
    }
}

// =============================================================================
// Combined Configuration
// =============================================================================

/// Complete configuration of an editing session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MathConfig {
    pub layout: LayoutConfig,
    pub render: RenderConfig,
}

impl MathConfig {
    /// Parse a configuration document
    pub fn from_json(json: &str) -> MathResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to a pretty-printed configuration document
    pub fn to_json(&self) -> MathResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load from a file, falling back to defaults when it is missing or invalid
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match Self::from_json(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to parse math config, using defaults: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read math config, using defaults: {}", e);
                Self::default()
            }
        }
    }
}
