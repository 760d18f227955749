//! Normalized writer - bracketed debug form of a tree
//!
//! Every cell is written as `[..]` and every composite node as
//! `[kind cell cell ..]`, so `\frac{a}{b}` becomes `[frac [a] [b]]`.

use super::{NodeWriter, WriteStream};
use crate::array::MathArray;
use crate::font::FontId;
use crate::grid::GridNode;
use crate::model::{DecorationKind, FracStyle, Limits};
use crate::symbols::SymbolInfo;

/// Serialize `array` in normalized form, without the outer brackets
pub fn to_normalized(array: &MathArray) -> String {
    let mut writer = NormalizedWriter::default();
    for node in array {
        writer.write_node(node);
    }
    writer.os.into_string()
}

#[derive(Debug, Default)]
struct NormalizedWriter {
    os: WriteStream,
}

impl NormalizedWriter {
    fn cell(&mut self, cell: &MathArray) {
        self.os.push_str(" [");
        self.write_array(cell);
        self.os.push_str("]");
    }

    fn open(&mut self, kind: &str) {
        self.os.push_str("[");
        self.os.push_str(kind);
    }

    fn close(&mut self) {
        self.os.push_str("]");
    }
}

impl NodeWriter for NormalizedWriter {
    fn write_char(&mut self, c: char) {
        self.os.push_char(c);
    }

    fn write_symbol(&mut self, symbol: &'static SymbolInfo) {
        self.os.push_str(&format!("[symbol {}]", symbol.name));
    }

    fn write_font(&mut self, font: FontId, _old_style: bool, cell: &MathArray) {
        self.open("font ");
        self.os.push_str(font.command());
        self.cell(cell);
        self.close();
    }

    fn write_script(
        &mut self,
        nucleus: &MathArray,
        sup: Option<&MathArray>,
        sub: Option<&MathArray>,
        limits: Limits,
    ) {
        let kind = match (sup.is_some(), sub.is_some()) {
            (true, true) => "subsup",
            (true, false) => "sup",
            (false, true) => "sub",
            (false, false) => "script",
        };
        self.open(kind);
        match limits {
            Limits::Default => {}
            Limits::Limits => self.os.push_str(" limits"),
            Limits::NoLimits => self.os.push_str(" nolimits"),
        }
        self.cell(nucleus);
        if let Some(sub) = sub {
            self.cell(sub);
        }
        if let Some(sup) = sup {
            self.cell(sup);
        }
        self.close();
    }

    fn write_fraction(&mut self, style: FracStyle, num: &MathArray, den: &MathArray) {
        self.open(style.command());
        self.cell(num);
        self.cell(den);
        self.close();
    }

    fn write_delimiter(&mut self, left: &str, right: &str, cell: &MathArray) {
        self.open("delim ");
        self.os.push_str(left);
        self.os.push_str(" ");
        self.os.push_str(right);
        self.cell(cell);
        self.close();
    }

    fn write_grid(&mut self, grid: &GridNode) {
        let kind = match grid.kind().env_name() {
            "" => "hull",
            name => name,
        };
        self.open("grid ");
        self.os.push_str(kind);
        for row in 0..grid.nrows() {
            self.os.push_str(" [");
            for (col, cell) in grid.row_cells(row).iter().enumerate() {
                if col > 0 {
                    self.os.push_str(" ");
                }
                self.os.push_str("[");
                self.write_array(cell);
                self.os.push_str("]");
            }
            self.os.push_str("]");
        }
        self.close();
    }

    fn write_sqrt(&mut self, cell: &MathArray) {
        self.open("sqrt");
        self.cell(cell);
        self.close();
    }

    fn write_root(&mut self, degree: &MathArray, radicand: &MathArray) {
        self.open("root");
        self.cell(degree);
        self.cell(radicand);
        self.close();
    }

    fn write_decoration(&mut self, kind: DecorationKind, cell: &MathArray) {
        self.open("deco ");
        self.os.push_str(kind.name());
        self.cell(cell);
        self.close();
    }

    fn write_macro_template(
        &mut self,
        name: &str,
        arity: usize,
        body: &MathArray,
        _display: &MathArray,
    ) {
        self.open(&format!("template {} {}", name, arity));
        self.cell(body);
        self.close();
    }

    fn write_macro_instance(&mut self, name: &str, args: &[MathArray]) {
        self.open("macro ");
        self.os.push_str(name);
        for arg in args {
            self.cell(arg);
        }
        self.close();
    }

    fn write_unknown(&mut self, text: &str) {
        self.os.push_str(&format!("[unknown {}]", text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fraction() {
        assert_eq!(to_normalized(&parse("\\frac{a}{b}")), "[frac [a] [b]]");
    }

    #[test]
    fn test_scripts_and_symbols() {
        assert_eq!(
            to_normalized(&parse("x_i^2+\\alpha")),
            "[subsup [x] [i] [2]]+[symbol alpha]"
        );
        assert_eq!(
            to_normalized(&parse("\\sum\\limits_{k}")),
            "[sub limits [[symbol sum]] [k]]"
        );
    }

    #[test]
    fn test_grid_rows() {
        assert_eq!(
            to_normalized(&parse("\\begin{matrix} a & b \\\\ c & d \\end{matrix}")),
            "[grid matrix [[a] [b]] [[c] [d]]]"
        );
    }

    #[test]
    fn test_misc_nodes() {
        assert_eq!(
            to_normalized(&parse("\\sqrt[3]{x}\\left(y\\right)\\hat{z}\\foo")),
            "[root [3] [x]][delim ( ) [y]][deco hat [z]][unknown \\foo]"
        );
        assert_eq!(to_normalized(&parse("\\mathbf{v}")), "[font mathbf [v]]");
    }
}
