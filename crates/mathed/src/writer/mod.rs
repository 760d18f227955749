//! Writers - serialize math trees to LaTeX and other targets
//!
//! Every target implements [`NodeWriter`], which dispatches each node kind
//! to one template method. The LaTeX writer is the persisted form and the
//! clipboard format; the others are one-way and may approximate.

pub mod cas;
pub mod latex;
pub mod maple;
pub mod mathematica;
pub mod mathml;
pub mod normalized;
pub mod octave;

use crate::array::MathArray;
use crate::error::MathResult;
use crate::font::FontId;
use crate::grid::GridNode;
use crate::model::{DecorationKind, FracStyle, Limits, MathNode, NUCLEUS, SUB, SUP};
use crate::symbols::SymbolInfo;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use latex::{to_latex, to_latex_fragile, write_formula, LatexWriter};
pub use maple::to_maple;
pub use mathematica::to_mathematica;
pub use mathml::{formula_to_mathml, to_mathml, MathMlWriter};
pub use normalized::to_normalized;
pub use octave::to_octave;

// =============================================================================
// Visitor Contract
// =============================================================================

/// Per-target templates for every node kind
pub trait NodeWriter {
    fn write_array(&mut self, array: &MathArray) {
        for node in array {
            self.write_node(node);
        }
    }

    fn write_node(&mut self, node: &MathNode) {
        match node {
            MathNode::Char(c) => self.write_char(*c),
            MathNode::Symbol(symbol) => self.write_symbol(symbol.info()),
            MathNode::Font {
                font,
                old_style,
                cell,
            } => self.write_font(*font, *old_style, cell),
            MathNode::Script {
                limits,
                has_sup,
                has_sub,
                cells,
            } => self.write_script(
                &cells[NUCLEUS],
                has_sup.then_some(&cells[SUP]),
                has_sub.then_some(&cells[SUB]),
                *limits,
            ),
            MathNode::Fraction { style, cells } => {
                self.write_fraction(*style, &cells[0], &cells[1])
            }
            MathNode::Delimiter { left, right, cell } => self.write_delimiter(left, right, cell),
            MathNode::Grid(grid) => self.write_grid(grid),
            MathNode::Sqrt { cell } => self.write_sqrt(cell),
            MathNode::Root { cells } => self.write_root(&cells[0], &cells[1]),
            MathNode::Decoration { kind, cell } => self.write_decoration(*kind, cell),
            MathNode::MacroTemplate { name, arity, cells } => {
                self.write_macro_template(name, *arity, &cells[0], &cells[1])
            }
            MathNode::MacroInstance { name, cells } => self.write_macro_instance(name, cells),
            MathNode::Unknown(text) => self.write_unknown(text),
        }
    }

    fn write_char(&mut self, c: char);

    fn write_symbol(&mut self, symbol: &'static SymbolInfo);

    /// Fonts are dropped by default
    fn write_font(&mut self, _font: FontId, _old_style: bool, cell: &MathArray) {
        self.write_array(cell);
    }

    fn write_script(
        &mut self,
        nucleus: &MathArray,
        sup: Option<&MathArray>,
        sub: Option<&MathArray>,
        limits: Limits,
    );

    fn write_fraction(&mut self, style: FracStyle, num: &MathArray, den: &MathArray);

    fn write_delimiter(&mut self, left: &str, right: &str, cell: &MathArray);

    fn write_grid(&mut self, grid: &GridNode);

    fn write_sqrt(&mut self, cell: &MathArray);

    fn write_root(&mut self, degree: &MathArray, radicand: &MathArray);

    /// Decorations are dropped by default
    fn write_decoration(&mut self, _kind: DecorationKind, cell: &MathArray) {
        self.write_array(cell);
    }

    /// Definitions produce no output by default
    fn write_macro_template(
        &mut self,
        _name: &str,
        _arity: usize,
        _body: &MathArray,
        _display: &MathArray,
    ) {
    }

    fn write_macro_instance(&mut self, name: &str, args: &[MathArray]);

    fn write_unknown(&mut self, text: &str);
}

// =============================================================================
// Write Stream
// =============================================================================

/// String sink for TeX-like output
///
/// Tracks whether the last thing written was a control word, so that a
/// following letter is separated by a space (`\alpha x`, not `\alphax`).
#[derive(Debug, Clone, Default)]
pub struct WriteStream {
    buf: String,
    fragile: bool,
    text_mode: bool,
    pending_space: bool,
}

impl WriteStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stream whose output lands in a moving argument
    pub fn fragile(fragile: bool) -> Self {
        Self {
            fragile,
            ..Self::default()
        }
    }

    pub fn is_fragile(&self) -> bool {
        self.fragile
    }

    pub fn text_mode(&self) -> bool {
        self.text_mode
    }

    /// Switch text mode, returning the previous setting
    pub fn set_text_mode(&mut self, text_mode: bool) -> bool {
        std::mem::replace(&mut self.text_mode, text_mode)
    }

    pub fn push_str(&mut self, s: &str) {
        if std::mem::take(&mut self.pending_space)
            && s.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        {
            self.buf.push(' ');
        }
        self.buf.push_str(s);
    }

    pub fn push_char(&mut self, c: char) {
        let mut tmp = [0u8; 4];
        self.push_str(c.encode_utf8(&mut tmp));
    }

    /// `\name`, remembering to separate a following letter
    pub fn control_word(&mut self, name: &str) {
        self.push_str("\\");
        self.buf.push_str(name);
        self.pending_space = name
            .chars()
            .last()
            .is_some_and(|c| c.is_ascii_alphabetic());
    }

    /// Source text copied as is; a trailing control word still separates a
    /// following letter
    pub fn verbatim(&mut self, text: &str) {
        self.push_str(text);
        self.pending_space = ends_with_control_word(text);
    }

    /// `\protect` in fragile context
    pub fn protect(&mut self) {
        if self.fragile {
            self.control_word("protect");
        }
    }

    /// Whether the output so far ends with `c`
    pub fn ends_with(&self, c: char) -> bool {
        self.buf.ends_with(c)
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

/// Whether `text` ends with `\` followed by letters
pub(crate) fn ends_with_control_word(text: &str) -> bool {
    let trimmed = text.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    trimmed.len() < text.len() && trimmed.ends_with('\\') && !trimmed.ends_with("\\\\")
}

impl fmt::Write for WriteStream {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_str(s);
        Ok(())
    }
}

// =============================================================================
// Targets
// =============================================================================

/// Output format selectable at run time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Latex,
    Normalized,
    Maple,
    Mathematica,
    Octave,
    MathMl,
}

impl Target {
    pub const ALL: [Target; 6] = [
        Target::Latex,
        Target::Normalized,
        Target::Maple,
        Target::Mathematica,
        Target::Octave,
        Target::MathMl,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Target::Latex => "latex",
            Target::Normalized => "normalized",
            Target::Maple => "maple",
            Target::Mathematica => "mathematica",
            Target::Octave => "octave",
            Target::MathMl => "mathml",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }

    /// Serialize `array` in this format
    pub fn write(self, array: &MathArray) -> MathResult<String> {
        Ok(match self {
            Target::Latex => to_latex(array),
            Target::Normalized => to_normalized(array),
            Target::Maple => to_maple(array),
            Target::Mathematica => to_mathematica(array),
            Target::Octave => to_octave(array),
            Target::MathMl => return to_mathml(array),
        })
    }
}

/// Write `array` as LaTeX into any formatter sink
pub fn write_latex_to<W: fmt::Write>(out: &mut W, array: &MathArray) -> MathResult<()> {
    out.write_str(&to_latex(array))?;
    Ok(())
}

/// Write `array` as LaTeX into a byte sink
pub fn write_latex_io<W: std::io::Write>(out: &mut W, array: &MathArray) -> MathResult<()> {
    out.write_all(to_latex(array).as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_word_separation() {
        let mut stream = WriteStream::new();
        stream.control_word("alpha");
        stream.push_char('x');
        stream.control_word("beta");
        stream.push_char('1');
        assert_eq!(stream.as_str(), "\\alpha x\\beta1");
    }

    #[test]
    fn test_verbatim_control_word_separation() {
        let mut stream = WriteStream::new();
        stream.verbatim("\\bogus");
        stream.push_str("x^{2}");
        stream.verbatim("\\begin{foo}");
        stream.push_char('y');
        stream.verbatim("\\,");
        stream.push_char('z');
        assert_eq!(stream.as_str(), "\\bogus x^{2}\\begin{foo}y\\,z");
    }

    #[test]
    fn test_protect_only_when_fragile() {
        let mut stream = WriteStream::new();
        stream.protect();
        assert_eq!(stream.as_str(), "");
        let mut fragile = WriteStream::fragile(true);
        fragile.protect();
        fragile.control_word("vec");
        assert_eq!(fragile.as_str(), "\\protect\\vec");
    }

    #[test]
    fn test_target_names() {
        for target in Target::ALL {
            assert_eq!(Target::from_name(target.name()), Some(target));
        }
        assert_eq!(Target::from_name("MathML"), Some(Target::MathMl));
        assert_eq!(Target::from_name("troff"), None);
    }

    #[test]
    fn test_write_to_sinks() {
        let array = MathArray::from_chars("x");
        let mut text = String::new();
        write_latex_to(&mut text, &array).unwrap();
        assert_eq!(text, "x");
        let mut bytes = Vec::new();
        write_latex_io(&mut bytes, &array).unwrap();
        assert_eq!(bytes, b"x");
    }
}
