//! MathML Writer - Serialize math trees to presentation MathML
//!
//! The node walk goes through [`NodeWriter`], whose templates cannot fail;
//! the first XML error is kept and reported by [`MathMlWriter::finish`].

use super::NodeWriter;
use crate::array::MathArray;
use crate::error::{MathError, MathResult};
use crate::font::{FontId, MathStyle};
use crate::formula::{Formula, HullType};
use crate::grid::GridNode;
use crate::model::{DecorationKind, FracStyle, Limits, MathNode};
use crate::symbols::{lookup_symbol, SymbolClass, SymbolInfo};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;

/// MathML namespace URI
const MATHML_NS_URI: &str = "http://www.w3.org/1998/Math/MathML";

/// Writer for converting math trees to MathML
pub struct MathMlWriter<W: Write> {
    writer: Writer<W>,
    error: Option<MathError>,
}

impl<W: Write> MathMlWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: Writer::new(inner),
            error: None,
        }
    }

    /// Write `array` wrapped in a `<math>` element
    pub fn write(&mut self, array: &MathArray, display: bool) -> MathResult<()> {
        self.open_math(display);
        self.write_array(array);
        self.end("math");
        self.take_error()
    }

    /// Write a formula; multi-row hulls become a top-level table
    pub fn write_formula(&mut self, formula: &Formula) -> MathResult<()> {
        let hull = formula.hull();
        self.open_math(hull != HullType::Simple);
        if hull.is_multi_row() {
            let numbers = formula.equation_numbers(1);
            let grid = formula.grid();
            self.start("mtable");
            for row in 0..grid.nrows() {
                self.start("mtr");
                for cell in grid.row_cells(row) {
                    self.start("mtd");
                    self.write_array(cell);
                    self.end("mtd");
                }
                if let Some(Some(number)) = numbers.get(row) {
                    self.start("mtd");
                    self.leaf("mtext", &format!("({})", number));
                    self.end("mtd");
                }
                self.end("mtr");
            }
            self.end("mtable");
        } else {
            self.write_array(formula.cell());
        }
        self.end("math");
        self.take_error()
    }

    /// Consume the writer, returning the sink or the first error
    pub fn finish(mut self) -> MathResult<W> {
        self.take_error()?;
        Ok(self.writer.into_inner())
    }

    fn take_error(&mut self) -> MathResult<()> {
        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn emit(&mut self, event: Event<'_>) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.writer.write_event(event) {
            self.error = Some(MathError::MathMlWrite(e.to_string()));
        }
    }

    fn open_math(&mut self, display: bool) {
        let mut elem = BytesStart::new("math");
        elem.push_attribute(("xmlns", MATHML_NS_URI));
        if display {
            elem.push_attribute(("display", "block"));
        }
        self.emit(Event::Start(elem));
    }

    fn start(&mut self, name: &str) {
        self.emit(Event::Start(BytesStart::new(name)));
    }

    fn start_with(&mut self, name: &str, attributes: &[(&str, &str)]) {
        let mut elem = BytesStart::new(name);
        for &attribute in attributes {
            elem.push_attribute(attribute);
        }
        self.emit(Event::Start(elem));
    }

    fn end(&mut self, name: &str) {
        self.emit(Event::End(BytesEnd::new(name)));
    }

    /// `<name>text</name>`
    fn leaf(&mut self, name: &str, text: &str) {
        self.start(name);
        self.emit(Event::Text(BytesText::new(text)));
        self.end(name);
    }

    fn row(&mut self, cell: &MathArray) {
        self.start("mrow");
        self.write_array(cell);
        self.end("mrow");
    }

    fn fence(&mut self, name: &str) {
        if name == "." {
            return;
        }
        let glyph = fence_glyph(name);
        self.start_with("mo", &[("fence", "true"), ("stretchy", "true")]);
        self.emit(Event::Text(BytesText::new(glyph)));
        self.end("mo");
    }

    fn table(&mut self, grid: &GridNode) {
        self.start("mtable");
        for row in 0..grid.nrows() {
            self.start("mtr");
            for cell in grid.row_cells(row) {
                self.start("mtd");
                self.write_array(cell);
                self.end("mtd");
            }
            self.end("mtr");
        }
        self.end("mtable");
    }
}

/// Serialize `array` as an inline `<math>` element
pub fn to_mathml(array: &MathArray) -> MathResult<String> {
    let mut buffer = Vec::new();
    {
        let mut writer = MathMlWriter::new(&mut buffer);
        writer.write(array, false)?;
    }
    String::from_utf8(buffer).map_err(|e| MathError::MathMlWrite(e.to_string()))
}

/// Serialize a formula, display hulls as block math
pub fn formula_to_mathml(formula: &Formula) -> MathResult<String> {
    let mut buffer = Vec::new();
    {
        let mut writer = MathMlWriter::new(&mut buffer);
        writer.write_formula(formula)?;
    }
    String::from_utf8(buffer).map_err(|e| MathError::MathMlWrite(e.to_string()))
}

fn fence_glyph(name: &str) -> &str {
    match name.strip_prefix('\\') {
        Some(word) => lookup_symbol(word).map(|s| s.glyph).unwrap_or(word),
        None => name,
    }
}

fn math_variant(font: FontId) -> &'static str {
    match font {
        FontId::MathRm | FontId::TextRm | FontId::Mbox => "normal",
        FontId::MathBf | FontId::TextBf => "bold",
        FontId::MathIt | FontId::TextIt => "italic",
        FontId::MathSf | FontId::TextSf => "sans-serif",
        FontId::MathTt | FontId::TextTt => "monospace",
        FontId::MathCal => "script",
        FontId::MathBb => "double-struck",
        FontId::MathFrak => "fraktur",
    }
}

fn accent_glyph(kind: DecorationKind) -> &'static str {
    match kind {
        DecorationKind::Hat | DecorationKind::WideHat => "^",
        DecorationKind::Tilde | DecorationKind::WideTilde => "~",
        DecorationKind::Bar | DecorationKind::Overline => "\u{AF}",
        DecorationKind::Underline => "_",
        DecorationKind::Vec | DecorationKind::OverRightArrow => "\u{2192}",
        DecorationKind::OverLeftArrow => "\u{2190}",
        DecorationKind::OverLeftRightArrow => "\u{2194}",
        DecorationKind::Dot => "\u{2D9}",
        DecorationKind::Ddot => "\u{A8}",
        DecorationKind::Acute => "\u{B4}",
        DecorationKind::Grave => "`",
        DecorationKind::Breve => "\u{2D8}",
        DecorationKind::Check => "\u{2C7}",
        DecorationKind::OverBrace => "\u{23DE}",
        DecorationKind::UnderBrace => "\u{23DF}",
    }
}

/// Whether a character is set as an operator
fn is_operator_char(c: char) -> bool {
    matches!(
        c,
        '+' | '-' | '*' | '/' | '=' | '<' | '>' | '(' | ')' | '[' | ']' | ',' | ';' | ':' | '!'
            | '|' | '\'' | '.'
    )
}

impl<W: Write> NodeWriter for MathMlWriter<W> {
    fn write_array(&mut self, array: &MathArray) {
        let nodes = array.nodes();
        let mut i = 0;
        while i < nodes.len() {
            // digit runs form one number
            let mut number = String::new();
            while let Some(MathNode::Char(c)) = nodes.get(i) {
                if !(c.is_ascii_digit() || (*c == '.' && !number.is_empty())) {
                    break;
                }
                number.push(*c);
                i += 1;
            }
            if !number.is_empty() {
                self.leaf("mn", &number);
                continue;
            }
            self.write_node(&nodes[i]);
            i += 1;
        }
    }

    fn write_char(&mut self, c: char) {
        let mut tmp = [0u8; 4];
        let text = c.encode_utf8(&mut tmp);
        if c.is_ascii_digit() {
            self.leaf("mn", text);
        } else if c.is_alphabetic() {
            self.leaf("mi", text);
        } else if c == ' ' {
            self.leaf("mtext", "\u{A0}");
        } else if is_operator_char(c) {
            self.leaf("mo", text);
        } else {
            self.leaf("mi", text);
        }
    }

    fn write_symbol(&mut self, symbol: &'static SymbolInfo) {
        match symbol.class {
            SymbolClass::Space => {
                let width = format!("{:.3}em", symbol.space_mu as f32 / 18.0);
                self.emit(Event::Empty({
                    let mut elem = BytesStart::new("mspace");
                    elem.push_attribute(("width", width.as_str()));
                    elem
                }));
            }
            SymbolClass::Function | SymbolClass::LimitFunction => {
                self.leaf("mi", symbol.name);
            }
            SymbolClass::Greek | SymbolClass::Ordinary => self.leaf("mi", symbol.glyph),
            _ if symbol.alpha_like => self.leaf("mi", symbol.glyph),
            _ => self.leaf("mo", symbol.glyph),
        }
    }

    fn write_font(&mut self, font: FontId, _old_style: bool, cell: &MathArray) {
        let plain_text: Option<String> = cell
            .iter()
            .map(|node| match node {
                MathNode::Char(c) => Some(*c),
                _ => None,
            })
            .collect();
        match plain_text {
            Some(text) if font.is_text_mode() => {
                self.start_with("mtext", &[("mathvariant", math_variant(font))]);
                self.emit(Event::Text(BytesText::new(&text)));
                self.end("mtext");
            }
            _ => {
                self.start_with("mstyle", &[("mathvariant", math_variant(font))]);
                self.row(cell);
                self.end("mstyle");
            }
        }
    }

    fn write_script(
        &mut self,
        nucleus: &MathArray,
        sup: Option<&MathArray>,
        sub: Option<&MathArray>,
        limits: Limits,
    ) {
        let stacked = limits.stacked(nucleus, MathStyle::Display);
        let name = match (sub.is_some(), sup.is_some(), stacked) {
            (true, true, false) => "msubsup",
            (true, false, false) => "msub",
            (false, true, false) => "msup",
            (true, true, true) => "munderover",
            (true, false, true) => "munder",
            (false, true, true) => "mover",
            (false, false, _) => {
                self.row(nucleus);
                return;
            }
        };
        self.start(name);
        self.row(nucleus);
        if let Some(sub) = sub {
            self.row(sub);
        }
        if let Some(sup) = sup {
            self.row(sup);
        }
        self.end(name);
    }

    fn write_fraction(&mut self, style: FracStyle, num: &MathArray, den: &MathArray) {
        if style.has_parens() {
            self.start("mrow");
            self.fence("(");
        }
        if style.has_rule() {
            self.start("mfrac");
        } else {
            self.start_with("mfrac", &[("linethickness", "0")]);
        }
        self.row(num);
        self.row(den);
        self.end("mfrac");
        if style.has_parens() {
            self.fence(")");
            self.end("mrow");
        }
    }

    fn write_delimiter(&mut self, left: &str, right: &str, cell: &MathArray) {
        self.start("mrow");
        self.fence(left);
        self.write_array(cell);
        self.fence(right);
        self.end("mrow");
    }

    fn write_grid(&mut self, grid: &GridNode) {
        match grid.kind().fences() {
            Some((left, right)) => {
                self.start("mrow");
                self.fence(left);
                self.table(grid);
                self.fence(right);
                self.end("mrow");
            }
            None => self.table(grid),
        }
    }

    fn write_sqrt(&mut self, cell: &MathArray) {
        self.start("msqrt");
        self.write_array(cell);
        self.end("msqrt");
    }

    fn write_root(&mut self, degree: &MathArray, radicand: &MathArray) {
        self.start("mroot");
        self.row(radicand);
        self.row(degree);
        self.end("mroot");
    }

    fn write_decoration(&mut self, kind: DecorationKind, cell: &MathArray) {
        let name = if kind.is_under() { "munder" } else { "mover" };
        let accent = if kind.is_under() { "accentunder" } else { "accent" };
        self.start_with(name, &[(accent, "true")]);
        self.row(cell);
        self.leaf("mo", accent_glyph(kind));
        self.end(name);
    }

    fn write_macro_instance(&mut self, name: &str, args: &[MathArray]) {
        self.start("mrow");
        self.leaf("mi", name);
        for arg in args {
            self.row(arg);
        }
        self.end("mrow");
    }

    fn write_unknown(&mut self, text: &str) {
        self.start("merror");
        self.leaf("mtext", text);
        self.end("merror");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, parse_formula};

    fn mathml(source: &str) -> String {
        to_mathml(&parse(source)).unwrap()
    }

    #[test]
    fn test_fraction_mathml() {
        assert_eq!(
            mathml("\\frac{a}{b}"),
            "<math xmlns=\"http://www.w3.org/1998/Math/MathML\"><mfrac><mrow><mi>a</mi></mrow><mrow><mi>b</mi></mrow></mfrac></math>"
        );
    }

    #[test]
    fn test_numbers_and_operators() {
        let xml = mathml("12+x");
        assert!(xml.contains("<mn>12</mn><mo>+</mo><mi>x</mi>"));
    }

    #[test]
    fn test_scripts_mathml() {
        assert!(mathml("x^2").contains("<msup><mrow><mi>x</mi></mrow><mrow><mn>2</mn></mrow></msup>"));
        assert!(mathml("\\sum_{i}^{n}").contains("<munderover>"));
        assert!(mathml("x_i").contains("<msub>"));
    }

    #[test]
    fn test_text_is_escaped() {
        let xml = mathml("\\text{a<b}");
        assert!(xml.contains("<mtext mathvariant=\"normal\">a&lt;b</mtext>"));
    }

    #[test]
    fn test_unknown_is_error_element() {
        assert!(mathml("\\bogus").contains("<merror><mtext>\\bogus</mtext></merror>"));
    }

    #[test]
    fn test_matrix_fences() {
        let xml = mathml("\\begin{pmatrix}a&b\\end{pmatrix}");
        assert!(xml.contains("<mo fence=\"true\" stretchy=\"true\">(</mo><mtable><mtr><mtd><mi>a</mi></mtd>"));
    }

    #[test]
    fn test_formula_display_and_numbers() {
        let formula = parse_formula("\\begin{align} a &= b \\\\ c &= d \\nonumber \\end{align}");
        let xml = formula_to_mathml(&formula).unwrap();
        assert!(xml.starts_with("<math xmlns=\"http://www.w3.org/1998/Math/MathML\" display=\"block\">"));
        assert!(xml.contains("<mtext>(1)</mtext>"));
        assert!(!xml.contains("(2)"));
    }

    /// Sink that rejects every write
    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_sink_failure_is_reported() {
        let mut writer = MathMlWriter::new(BrokenSink);
        let err = writer.write(&parse("\\frac{a}{b}"), false).unwrap_err();
        assert!(matches!(err, MathError::MathMlWrite(_)));
        assert!(writer.finish().is_ok());
    }

    #[test]
    fn test_finish_returns_sink() {
        let mut writer = MathMlWriter::new(Vec::new());
        writer.write(&parse("x"), true).unwrap();
        let bytes = writer.finish().unwrap();
        assert!(String::from_utf8(bytes).unwrap().contains("<mi>x</mi>"));
    }
}
