//! LaTeX writer - the persisted form of a formula
//!
//! Output reparses to an equivalent tree. Unknown nodes are reproduced
//! verbatim, so source the parser could not classify survives a round trip.

use super::{ends_with_control_word, NodeWriter, WriteStream};
use crate::array::MathArray;
use crate::font::FontId;
use crate::formula::{Formula, HullType};
use crate::grid::{GridKind, GridNode};
use crate::model::{DecorationKind, FracStyle, Limits, MathNode};
use crate::symbols::SymbolInfo;

/// Serialize `array` as LaTeX
pub fn to_latex(array: &MathArray) -> String {
    let mut writer = LatexWriter::new(false);
    writer.write_array(array);
    writer.finish()
}

/// Serialize `array` for a moving argument, protecting fragile commands
pub fn to_latex_fragile(array: &MathArray) -> String {
    let mut writer = LatexWriter::new(true);
    writer.write_array(array);
    writer.finish()
}

/// Serialize a complete formula including its hull
pub fn write_formula(formula: &Formula) -> String {
    let mut writer = LatexWriter::new(false);
    writer.write_formula(formula);
    writer.finish()
}

/// [`NodeWriter`] producing LaTeX source
#[derive(Debug, Default)]
pub struct LatexWriter {
    os: WriteStream,
}

impl LatexWriter {
    pub fn new(fragile: bool) -> Self {
        Self {
            os: WriteStream::fragile(fragile),
        }
    }

    pub fn finish(self) -> String {
        self.os.into_string()
    }

    pub fn write_formula(&mut self, formula: &Formula) {
        let hull = formula.hull();
        match hull {
            HullType::Simple => {
                self.os.push_str("$");
                self.write_array(formula.cell());
                // `$$` would read back as a display formula
                self.os.push_str(if formula.cell().is_empty() { " $" } else { "$" });
            }
            HullType::Equation => {
                self.os.push_str("\\[");
                self.write_array(formula.cell());
                self.os.push_str("\\]");
            }
            _ => {
                let grid = formula.grid();
                let Some(env) = hull.env_name() else {
                    return;
                };
                // equation* reads back as an unnumbered display
                let starred = hull != HullType::NumberedEquation
                    && grid.rows().iter().all(|row| !row.numbered);
                let env = if starred {
                    format!("{}*", env)
                } else {
                    env.to_string()
                };
                self.os.push_str(&format!("\\begin{{{}}}\n", env));
                self.write_rows(grid, Some((hull, starred)));
                self.os.push_str(&format!("\n\\end{{{}}}", env));
            }
        }
    }

    fn write_braced(&mut self, cell: &MathArray) {
        self.os.push_str("{");
        self.write_array(cell);
        self.os.push_str("}");
    }

    fn write_delimiter_name(&mut self, name: &str) {
        match name.strip_prefix('\\') {
            Some(word) if word.chars().all(|c| c.is_ascii_alphabetic()) => {
                self.os.control_word(word)
            }
            _ => self.os.push_str(name),
        }
    }

    fn write_rows(&mut self, grid: &GridNode, hull: Option<(HullType, bool)>) {
        let (separator, row_break) = if hull.is_some() {
            (" & ", "\\\\\n")
        } else {
            (" & ", "\\\\ ")
        };
        let last = grid.nrows().saturating_sub(1);
        for (row, info) in grid.rows().iter().enumerate() {
            for (col, cell) in grid.row_cells(row).iter().enumerate() {
                if col > 0 {
                    self.os.push_str(separator);
                }
                self.write_array(cell);
            }
            if let Some(label) = &info.label {
                self.os.control_word("label");
                self.os.push_str(&format!("{{{}}}", label));
            }
            if let Some((hull, starred)) = hull {
                let numbered_by_default = hull != HullType::Multline || row == last;
                if !starred && !info.numbered && numbered_by_default {
                    self.os.control_word("nonumber");
                }
            }
            if row < last {
                let row_break = match &info.skip {
                    Some(skip) => format!("\\\\[{}]{}", skip, &row_break[2..]),
                    None => row_break.to_string(),
                };
                self.os.push_str(&row_break);
            }
        }
    }
}

/// Whether `node` is an unknown control word that would swallow a letter
fn is_unknown_control_word(node: &MathNode) -> bool {
    matches!(node, MathNode::Unknown(text) if ends_with_control_word(text))
}

impl NodeWriter for LatexWriter {
    fn write_array(&mut self, array: &MathArray) {
        let nodes = array.nodes();
        for (i, node) in nodes.iter().enumerate() {
            match node {
                // `\bogus{z}` keeps the source spelling of an unknown command
                // followed by a letter; every other node is spaced by the stream
                MathNode::Char(c)
                    if c.is_ascii_alphanumeric() && i > 0 && is_unknown_control_word(&nodes[i - 1]) =>
                {
                    self.os.push_str(&format!("{{{}}}", c));
                }
                _ => self.write_node(node),
            }
        }
    }

    fn write_char(&mut self, c: char) {
        let text_mode = self.os.text_mode();
        match c {
            '{' | '}' | '%' | '#' | '&' | '$' => self.os.push_str(&format!("\\{}", c)),
            '_' if !text_mode => self.os.push_str("\\_"),
            '\\' => self.os.control_word("backslash"),
            ' ' if !text_mode => self.os.push_str("\\ "),
            ' ' if self.os.ends_with(' ') || self.os.ends_with('{') => self.os.push_str("\\ "),
            ' ' if self.os.as_str().ends_with(|c: char| c.is_ascii_alphabetic())
                && ends_with_control_word(self.os.as_str()) =>
            {
                self.os.push_str("\\ ")
            }
            c => self.os.push_char(c),
        }
    }

    fn write_symbol(&mut self, symbol: &'static SymbolInfo) {
        if symbol.is_control_word() {
            self.os.control_word(symbol.name);
        } else {
            self.os.push_str(&format!("\\{}", symbol.name));
        }
    }

    fn write_font(&mut self, font: FontId, old_style: bool, cell: &MathArray) {
        let old_command = old_style.then(|| font.old_style_command()).flatten();
        let saved = self.os.set_text_mode(font.is_text_mode());
        match old_command {
            Some(command) => {
                self.os.push_str("{");
                self.os.control_word(command);
                self.write_array(cell);
                self.os.push_str("}");
            }
            None => {
                self.os.control_word(font.command());
                self.write_braced(cell);
            }
        }
        self.os.set_text_mode(saved);
    }

    fn write_script(
        &mut self,
        nucleus: &MathArray,
        sup: Option<&MathArray>,
        sub: Option<&MathArray>,
        limits: Limits,
    ) {
        match nucleus.nodes() {
            [node] if !matches!(node, MathNode::Script { .. }) => self.write_node(node),
            _ => self.write_braced(nucleus),
        }
        match limits {
            Limits::Default => {}
            Limits::Limits => self.os.control_word("limits"),
            Limits::NoLimits => self.os.control_word("nolimits"),
        }
        if let Some(sub) = sub {
            self.os.push_str("_");
            self.write_braced(sub);
        }
        if let Some(sup) = sup {
            self.os.push_str("^");
            self.write_braced(sup);
        }
    }

    fn write_fraction(&mut self, style: FracStyle, num: &MathArray, den: &MathArray) {
        if style.is_infix() {
            self.os.push_str("{");
            self.write_array(num);
            self.os.control_word(style.command());
            self.write_array(den);
            self.os.push_str("}");
        } else {
            self.os.control_word(style.command());
            self.write_braced(num);
            self.write_braced(den);
        }
    }

    fn write_delimiter(&mut self, left: &str, right: &str, cell: &MathArray) {
        self.os.control_word("left");
        self.write_delimiter_name(left);
        self.write_array(cell);
        self.os.control_word("right");
        self.write_delimiter_name(right);
    }

    fn write_grid(&mut self, grid: &GridNode) {
        let kind = grid.kind();
        self.os
            .push_str(&format!("\\begin{{{}}}", kind.env_name()));
        if matches!(
            kind,
            GridKind::Array | GridKind::Aligned | GridKind::Gathered
        ) && grid.v_align() != 'c'
        {
            self.os.push_str(&format!("[{}]", grid.v_align()));
        }
        if kind.writes_alignment() {
            self.os.push_str(&format!("{{{}}}", grid.align_string()));
        }
        self.write_rows(grid, None);
        self.os.push_str(&format!("\\end{{{}}}", kind.env_name()));
    }

    fn write_sqrt(&mut self, cell: &MathArray) {
        self.os.control_word("sqrt");
        self.write_braced(cell);
    }

    fn write_root(&mut self, degree: &MathArray, radicand: &MathArray) {
        self.os.protect();
        self.os.control_word("sqrt");
        self.os.push_str("[");
        self.write_array(degree);
        self.os.push_str("]");
        self.write_braced(radicand);
    }

    fn write_decoration(&mut self, kind: DecorationKind, cell: &MathArray) {
        if kind.is_fragile() {
            self.os.protect();
        }
        self.os.control_word(kind.name());
        self.write_braced(cell);
    }

    fn write_macro_template(
        &mut self,
        name: &str,
        arity: usize,
        body: &MathArray,
        _display: &MathArray,
    ) {
        self.os.control_word("newcommand");
        self.os.push_str(&format!("{{\\{}}}", name));
        if arity > 0 {
            self.os.push_str(&format!("[{}]", arity));
        }
        self.write_braced(body);
    }

    fn write_macro_instance(&mut self, name: &str, args: &[MathArray]) {
        self.os.control_word(name);
        for arg in args {
            self.write_braced(arg);
        }
    }

    fn write_unknown(&mut self, text: &str) {
        self.os.verbatim(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, parse_formula};
    use pretty_assertions::assert_eq;

    fn round_trip(source: &str) -> String {
        to_latex(&parse(source))
    }

    #[test]
    fn test_fraction_round_trip_exact() {
        assert_eq!(round_trip("\\frac{a}{b}"), "\\frac{a}{b}");
    }

    #[test]
    fn test_unknown_command_verbatim() {
        assert_eq!(round_trip("\\bogusmacro{z}"), "\\bogusmacro{z}");
    }

    #[test]
    fn test_unknown_command_keeps_following_nodes_apart() {
        for (source, written) in [
            ("\\bogus x^2", "\\bogus x^{2}"),
            ("\\bogus {ab}", "\\bogus{a}b"),
            ("\\bogus {ab}^2", "\\bogus{ab}^{2}"),
            ("\\bogus\\frac{a}{b}", "\\bogus\\frac{a}{b}"),
            ("\\bogus\\text{a}", "\\bogus\\text{a}"),
            ("\\bogus x", "\\bogus{x}"),
        ] {
            let tree = parse(source);
            assert_eq!(to_latex(&tree), written, "{}", source);
            assert_eq!(parse(&to_latex(&tree)), tree, "{}", source);
        }
    }

    #[test]
    fn test_unknown_command_before_script_nucleus() {
        let tree = parse("\\bogus x^2");
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.nodes()[0], MathNode::unknown("\\bogus"));
        assert!(matches!(tree.nodes()[1], MathNode::Script { .. }));
    }

    #[test]
    fn test_symbols_separated_from_letters() {
        assert_eq!(round_trip("\\alpha x+\\beta"), "\\alpha x+\\beta");
        assert_eq!(round_trip("\\alpha\\,x"), "\\alpha\\,x");
    }

    #[test]
    fn test_scripts() {
        assert_eq!(round_trip("x^2"), "x^{2}");
        assert_eq!(round_trip("x_i^2"), "x_{i}^{2}");
        assert_eq!(round_trip("{ab}^2"), "{ab}^{2}");
        assert_eq!(round_trip("{}^2"), "{}^{2}");
        assert_eq!(round_trip("\\sum\\limits_{i}"), "\\sum\\limits_{i}");
    }

    #[test]
    fn test_escaped_characters() {
        let array = MathArray::from_chars("{%&}");
        assert_eq!(to_latex(&array), "\\{\\%\\&\\}");
    }

    #[test]
    fn test_fonts() {
        assert_eq!(round_trip("\\mathbf{x}"), "\\mathbf{x}");
        assert_eq!(round_trip("{\\bf x}"), "{\\bf x}");
        assert_eq!(round_trip("\\text{a b}"), "\\text{a b}");
    }

    #[test]
    fn test_infix_fraction() {
        assert_eq!(round_trip("a \\over b"), "{a\\over b}");
    }

    #[test]
    fn test_delimiters() {
        assert_eq!(round_trip("\\left( x \\right."), "\\left(x\\right.");
        assert_eq!(
            round_trip("\\left\\langle x \\right\\rangle"),
            "\\left\\langle x\\right\\rangle"
        );
    }

    #[test]
    fn test_roots_and_decorations() {
        assert_eq!(round_trip("\\sqrt{x}"), "\\sqrt{x}");
        assert_eq!(round_trip("\\sqrt[3]{x}"), "\\sqrt[3]{x}");
        assert_eq!(round_trip("\\hat x"), "\\hat{x}");
    }

    #[test]
    fn test_fragile_protects() {
        let array = parse("\\overrightarrow{AB}\\sqrt[3]{x}\\hat{y}");
        assert_eq!(
            to_latex_fragile(&array),
            "\\protect\\overrightarrow{AB}\\protect\\sqrt[3]{x}\\hat{y}"
        );
        assert_eq!(
            to_latex(&array),
            "\\overrightarrow{AB}\\sqrt[3]{x}\\hat{y}"
        );
    }

    #[test]
    fn test_matrix() {
        assert_eq!(
            round_trip("\\begin{pmatrix} a & b \\\\ c & d \\end{pmatrix}"),
            "\\begin{pmatrix}a & b\\\\ c & d\\end{pmatrix}"
        );
        assert_eq!(
            round_trip("\\begin{array}[t]{lr} 1 & 2 \\end{array}"),
            "\\begin{array}[t]{lr}1 & 2\\end{array}"
        );
    }

    #[test]
    fn test_grid_built_by_hand() {
        let grid = GridNode::new(GridKind::BMatrix, 1, 2);
        let array = MathArray::from_nodes(vec![MathNode::Grid(grid)]);
        assert_eq!(to_latex(&array), "\\begin{bmatrix} & \\end{bmatrix}");
    }

    #[test]
    fn test_macros() {
        let mut macros = crate::macros::MacroTable::new();
        let array =
            crate::parser::parse_with_macros("\\newcommand{\\sq}[1]{#1^{2}}\\sq{y}", &mut macros);
        assert_eq!(to_latex(&array), "\\newcommand{\\sq}[1]{#1^{2}}\\sq{y}");
    }

    #[test]
    fn test_formula_hulls() {
        assert_eq!(write_formula(&parse_formula("$x$")), "$x$");
        assert_eq!(write_formula(&parse_formula("\\[x\\]")), "\\[x\\]");
        assert_eq!(
            write_formula(&parse_formula("\\begin{equation}x\\end{equation}")),
            "\\begin{equation}\nx\n\\end{equation}"
        );
    }

    #[test]
    fn test_align_rows_numbering() {
        let formula = parse_formula(
            "\\begin{align} a &= b \\label{first} \\\\[2pt] c &= d \\nonumber \\end{align}",
        );
        assert_eq!(
            write_formula(&formula),
            "\\begin{align}\na & =b\\label{first}\\\\[2pt]\nc & =d\\nonumber\n\\end{align}"
        );
        let starred = parse_formula("\\begin{gather*} a \\\\ b \\end{gather*}");
        assert_eq!(
            write_formula(&starred),
            "\\begin{gather*}\na\\\\\nb\n\\end{gather*}"
        );
    }

    #[test]
    fn test_text_mode_spaces() {
        let text = MathNode::font(FontId::TextRm, MathArray::from_chars("a  b"));
        let array = MathArray::from_nodes(vec![text]);
        let latex = to_latex(&array);
        assert_eq!(latex, "\\text{a \\ b}");
        assert_eq!(parse(&latex), array);
    }

    #[test]
    fn test_control_word_suffix_detection() {
        assert!(ends_with_control_word("x\\alpha"));
        assert!(!ends_with_control_word("x\\\\alpha"));
        assert!(!ends_with_control_word("alpha"));
        assert!(!ends_with_control_word("\\,"));
    }
}
