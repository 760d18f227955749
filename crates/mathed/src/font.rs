//! Fonts, TeX math styles and the font-metrics provider seam
//!
//! The core never measures glyphs itself. Every leaf dimension comes from a
//! [`FontMetrics`] implementation supplied by the host; [`FixedFontMetrics`]
//! is an approximation good enough for tests and for hosts without real fonts.

use serde::{Deserialize, Serialize};

// =============================================================================
// Dimensions
// =============================================================================

/// Width, ascent and descent of a box, in device units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dimension {
    pub width: i32,
    pub ascent: i32,
    pub descent: i32,
}

impl Dimension {
    pub const fn new(width: i32, ascent: i32, descent: i32) -> Self {
        Self {
            width,
            ascent,
            descent,
        }
    }

    pub const fn zero() -> Self {
        Self::new(0, 0, 0)
    }

    /// Total height (ascent plus descent)
    pub fn height(&self) -> i32 {
        self.ascent + self.descent
    }

    /// Grow this box horizontally by `other`, sharing the baseline
    pub fn append(&mut self, other: &Dimension) {
        self.width += other.width;
        self.ascent = self.ascent.max(other.ascent);
        self.descent = self.descent.max(other.descent);
    }
}

// =============================================================================
// TeX Styles
// =============================================================================

/// One of TeX's four math styles
///
/// Nested material moves to a smaller style; the order of the variants is
/// the order of shrinking.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum MathStyle {
    Display,
    #[default]
    Text,
    Script,
    ScriptScript,
}

impl MathStyle {
    /// Style used for superscripts, subscripts and root degrees
    pub fn script(self) -> Self {
        match self {
            MathStyle::Display | MathStyle::Text => MathStyle::Script,
            MathStyle::Script | MathStyle::ScriptScript => MathStyle::ScriptScript,
        }
    }

    /// Style used for the numerator and denominator of a fraction
    pub fn fraction(self) -> Self {
        match self {
            MathStyle::Display => MathStyle::Text,
            MathStyle::Text => MathStyle::Script,
            MathStyle::Script | MathStyle::ScriptScript => MathStyle::ScriptScript,
        }
    }

    /// Whether this is one of the two script styles
    pub fn is_script(self) -> bool {
        matches!(self, MathStyle::Script | MathStyle::ScriptScript)
    }

    /// LaTeX command that selects this style
    pub fn command(self) -> &'static str {
        match self {
            MathStyle::Display => "displaystyle",
            MathStyle::Text => "textstyle",
            MathStyle::Script => "scriptstyle",
            MathStyle::ScriptScript => "scriptscriptstyle",
        }
    }
}

// =============================================================================
// Font Families
// =============================================================================

/// Physical font family a glyph is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FontFamily {
    /// Upright roman (digits, function names, upright Greek)
    Roman,
    /// Math italic (variables, lowercase Greek)
    MathItalic,
    /// Text italic
    Italic,
    Bold,
    SansSerif,
    Typewriter,
    Calligraphic,
    BlackboardBold,
    Fraktur,
    /// Operators, relations, arrows
    Symbol,
    /// Big operators and stretchy pieces
    Extension,
}

/// Font selected by a font-change command such as `\mathbf` or `\text`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FontId {
    MathRm,
    MathBf,
    MathIt,
    MathSf,
    MathTt,
    MathCal,
    MathBb,
    MathFrak,
    TextRm,
    TextBf,
    TextIt,
    TextSf,
    TextTt,
    Mbox,
}

impl FontId {
    /// Family used to draw characters inside this font
    pub fn family(self) -> FontFamily {
        match self {
            FontId::MathRm | FontId::TextRm | FontId::Mbox => FontFamily::Roman,
            FontId::MathBf | FontId::TextBf => FontFamily::Bold,
            FontId::MathIt | FontId::TextIt => FontFamily::Italic,
            FontId::MathSf | FontId::TextSf => FontFamily::SansSerif,
            FontId::MathTt | FontId::TextTt => FontFamily::Typewriter,
            FontId::MathCal => FontFamily::Calligraphic,
            FontId::MathBb => FontFamily::BlackboardBold,
            FontId::MathFrak => FontFamily::Fraktur,
        }
    }

    /// Whether the argument of this font is typeset in text mode
    pub fn is_text_mode(self) -> bool {
        matches!(
            self,
            FontId::TextRm
                | FontId::TextBf
                | FontId::TextIt
                | FontId::TextSf
                | FontId::TextTt
                | FontId::Mbox
        )
    }

    /// The `\mathxx{}` / `\textxx{}` command name for this font
    pub fn command(self) -> &'static str {
        match self {
            FontId::MathRm => "mathrm",
            FontId::MathBf => "mathbf",
            FontId::MathIt => "mathit",
            FontId::MathSf => "mathsf",
            FontId::MathTt => "mathtt",
            FontId::MathCal => "mathcal",
            FontId::MathBb => "mathbb",
            FontId::MathFrak => "mathfrak",
            FontId::TextRm => "text",
            FontId::TextBf => "textbf",
            FontId::TextIt => "textit",
            FontId::TextSf => "textsf",
            FontId::TextTt => "texttt",
            FontId::Mbox => "mbox",
        }
    }

    /// The old-style switch (`\bf`, `\rm`, ...) for this font, if one exists
    pub fn old_style_command(self) -> Option<&'static str> {
        match self {
            FontId::MathRm => Some("rm"),
            FontId::MathBf => Some("bf"),
            FontId::MathIt => Some("it"),
            FontId::MathSf => Some("sf"),
            FontId::MathTt => Some("tt"),
            FontId::MathCal => Some("cal"),
            _ => None,
        }
    }
}

/// Everything a metrics provider needs to know to measure a glyph
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FontInfo {
    pub family: FontFamily,
    pub style: MathStyle,
    /// Em size in device units (zoom and style scaling already applied)
    pub size: f32,
}

impl FontInfo {
    pub fn new(family: FontFamily, style: MathStyle, size: f32) -> Self {
        Self {
            family,
            style,
            size,
        }
    }
}

// =============================================================================
// Metrics Provider
// =============================================================================

/// Font-metrics provider consumed by the metrics pass
///
/// Implementations return dimensions already rounded to device units.
pub trait FontMetrics {
    /// Dimension of a single character
    fn char_dim(&self, font: &FontInfo, ch: char) -> Dimension;

    /// Dimension of a string drawn as one run
    fn string_dim(&self, font: &FontInfo, text: &str) -> Dimension {
        let mut dim = Dimension::zero();
        for ch in text.chars() {
            dim.append(&self.char_dim(font, ch));
        }
        dim
    }
}

/// Approximate metrics derived from the em size alone
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedFontMetrics;

impl FixedFontMetrics {
    pub fn new() -> Self {
        Self
    }

    fn width_ratio(family: FontFamily, ch: char) -> f32 {
        if family == FontFamily::Extension {
            return 1.0;
        }
        let base = match ch {
            'm' | 'w' | 'M' | 'W' => 0.8,
            'i' | 'j' | 'l' | 'I' => 0.3,
            'a'..='z' => 0.5,
            'A'..='Z' => 0.7,
            '0'..='9' => 0.5,
            ' ' => 0.25,
            '.' | ',' | ';' | ':' | '!' | '\'' | '|' => 0.3,
            '(' | ')' | '[' | ']' | '{' | '}' => 0.4,
            _ => 0.75,
        };
        match family {
            FontFamily::Bold | FontFamily::BlackboardBold => base * 1.1,
            FontFamily::Typewriter => 0.55,
            _ => base,
        }
    }

    fn ascent_ratio(family: FontFamily, ch: char) -> f32 {
        if family == FontFamily::Extension {
            return 1.0;
        }
        match ch {
            'b' | 'd' | 'f' | 'h' | 'k' | 'l' | 't' | 'i' | 'j' => 0.7,
            'a'..='z' => 0.45,
            '(' | ')' | '[' | ']' | '{' | '}' | '|' => 0.75,
            ' ' => 0.0,
            '.' | ',' => 0.1,
            '-' | '+' | '=' | '<' | '>' => 0.55,
            _ => 0.7,
        }
    }

    fn descent_ratio(family: FontFamily, ch: char) -> f32 {
        if family == FontFamily::Extension {
            return 0.4;
        }
        match ch {
            'g' | 'j' | 'p' | 'q' | 'y' | ',' | ';' => 0.2,
            '(' | ')' | '[' | ']' | '{' | '}' | '|' => 0.25,
            _ => 0.0,
        }
    }
}

impl FontMetrics for FixedFontMetrics {
    fn char_dim(&self, font: &FontInfo, ch: char) -> Dimension {
        let em = font.size.max(0.0);
        Dimension::new(
            (em * Self::width_ratio(font.family, ch)).round() as i32,
            (em * Self::ascent_ratio(font.family, ch)).round() as i32,
            (em * Self::descent_ratio(font.family, ch)).round() as i32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_shrinking() {
        assert_eq!(MathStyle::Display.script(), MathStyle::Script);
        assert_eq!(MathStyle::Text.script(), MathStyle::Script);
        assert_eq!(MathStyle::Script.script(), MathStyle::ScriptScript);
        assert_eq!(MathStyle::ScriptScript.script(), MathStyle::ScriptScript);

        assert_eq!(MathStyle::Display.fraction(), MathStyle::Text);
        assert_eq!(MathStyle::Text.fraction(), MathStyle::Script);
        assert_eq!(MathStyle::ScriptScript.fraction(), MathStyle::ScriptScript);
    }

    #[test]
    fn test_dimension_append() {
        let mut dim = Dimension::new(3, 5, 1);
        dim.append(&Dimension::new(4, 2, 6));
        assert_eq!(dim, Dimension::new(7, 5, 6));
        assert_eq!(dim.height(), 11);
    }

    #[test]
    fn test_font_id_modes() {
        assert!(FontId::TextRm.is_text_mode());
        assert!(FontId::Mbox.is_text_mode());
        assert!(!FontId::MathBf.is_text_mode());
        assert_eq!(FontId::MathBf.old_style_command(), Some("bf"));
        assert_eq!(FontId::MathBb.old_style_command(), None);
    }

    #[test]
    fn test_fixed_metrics_shrink_with_size() {
        let metrics = FixedFontMetrics::new();
        let big = FontInfo::new(FontFamily::MathItalic, MathStyle::Text, 20.0);
        let small = FontInfo::new(FontFamily::MathItalic, MathStyle::Script, 14.0);
        for ch in ['a', 'g', 'M', '1', '('] {
            let b = metrics.char_dim(&big, ch);
            let s = metrics.char_dim(&small, ch);
            assert!(s.width <= b.width);
            assert!(s.ascent <= b.ascent);
            assert!(s.descent <= b.descent);
        }
    }

    #[test]
    fn test_string_dim_sums_widths() {
        let metrics = FixedFontMetrics::new();
        let font = FontInfo::new(FontFamily::Roman, MathStyle::Text, 10.0);
        let sin = metrics.string_dim(&font, "sin");
        let expected: i32 = "sin".chars().map(|c| metrics.char_dim(&font, c).width).sum();
        assert_eq!(sin.width, expected);
    }
}
