//! Shared writer for computer-algebra targets
//!
//! Maple, Mathematica and Octave differ only in spelling: how functions are
//! applied, how matrices and subscripts look, and what the named constants
//! are called. A [`CasDialect`] supplies those spellings and [`CasWriter`]
//! does the walk. Output is one-way and approximate; fonts, decorations and
//! spacing are dropped.

use super::{NodeWriter, WriteStream};
use crate::array::MathArray;
use crate::grid::GridNode;
use crate::model::{FracStyle, Limits, MathNode};
use crate::symbols::{SymbolClass, SymbolInfo};

/// Spelling rules of one computer-algebra language
pub trait CasDialect {
    /// Spelling of a named symbol, `None` to fall back to its name
    fn symbol(&self, name: &str) -> Option<&'static str>;

    /// Spelling of a plain character
    fn char(&self, c: char) -> String {
        c.to_string()
    }

    /// Function name as written by this dialect (`sin` or `Sin`)
    fn function(&self, name: &str) -> String {
        name.to_string()
    }

    /// `f(args)` or `f[args]`
    fn apply(&self, function: &str, args: &[String]) -> String {
        format!("{}({})", function, args.join(","))
    }

    fn power(&self, base: &str, exponent: &str) -> String {
        format!("({})^({})", base, exponent)
    }

    fn subscript(&self, base: &str, index: &str) -> String;

    fn fraction(&self, num: &str, den: &str) -> String {
        format!("({})/({})", num, den)
    }

    fn binomial(&self, n: &str, k: &str) -> String;

    fn sqrt(&self, x: &str) -> String {
        self.apply("sqrt", &[x.to_string()])
    }

    fn root(&self, degree: &str, x: &str) -> String {
        format!("({})^(1/({}))", x, degree)
    }

    fn abs(&self, x: &str) -> String {
        self.apply("abs", &[x.to_string()])
    }

    fn matrix(&self, rows: &[Vec<String>]) -> String;
}

/// [`NodeWriter`] that renders through a [`CasDialect`]
#[derive(Debug)]
pub struct CasWriter<D> {
    dialect: D,
    os: WriteStream,
}

impl<D: CasDialect> CasWriter<D> {
    pub fn new(dialect: D) -> Self {
        Self {
            dialect,
            os: WriteStream::new(),
        }
    }

    /// Serialize `array` with this writer's dialect
    pub fn write(dialect: D, array: &MathArray) -> String {
        let mut writer = Self::new(dialect);
        writer.write_array(array);
        writer.os.into_string()
    }

    /// Render a cell into its own string
    fn render(&mut self, cell: &MathArray) -> String {
        let saved = std::mem::take(&mut self.os);
        self.write_array(cell);
        std::mem::replace(&mut self.os, saved).into_string()
    }

    /// Render a cell, wrapping it in parentheses unless it is one node
    fn render_operand(&mut self, cell: &MathArray) -> String {
        let text = self.render(cell);
        if cell.len() > 1 {
            format!("({})", text)
        } else {
            text
        }
    }
}

impl<D: CasDialect> NodeWriter for CasWriter<D> {
    fn write_array(&mut self, array: &MathArray) {
        let nodes = array.nodes();
        let mut i = 0;
        while i < nodes.len() {
            let node = &nodes[i];
            // sin x -> sin(x): a function name takes the next node as argument
            if let MathNode::Symbol(symbol) = node {
                if matches!(
                    symbol.class,
                    SymbolClass::Function | SymbolClass::LimitFunction
                ) {
                    if let Some(arg) = nodes.get(i + 1) {
                        let arg = match arg {
                            MathNode::Delimiter { cell, .. } => self.render(cell),
                            other => self.render(&MathArray::from_nodes(vec![other.clone()])),
                        };
                        let function = self.dialect.function(symbol.name);
                        let text = self.dialect.apply(&function, &[arg]);
                        self.os.push_str(&text);
                        i += 2;
                        continue;
                    }
                }
            }
            self.write_node(node);
            i += 1;
        }
    }

    fn write_char(&mut self, c: char) {
        if c != ' ' {
            let text = self.dialect.char(c);
            self.os.push_str(&text);
        }
    }

    fn write_symbol(&mut self, symbol: &'static SymbolInfo) {
        match self.dialect.symbol(symbol.name) {
            Some(text) => self.os.push_str(text),
            None => match symbol.class {
                SymbolClass::Space => {}
                SymbolClass::Function | SymbolClass::LimitFunction => {
                    let name = self.dialect.function(symbol.name);
                    self.os.push_str(&name);
                }
                _ if symbol.is_control_word() => self.os.push_str(symbol.name),
                _ => self.os.push_str(symbol.glyph),
            },
        }
    }

    fn write_script(
        &mut self,
        nucleus: &MathArray,
        sup: Option<&MathArray>,
        sub: Option<&MathArray>,
        _limits: Limits,
    ) {
        let mut base = self.render_operand(nucleus);
        if let Some(sub) = sub {
            let index = self.render(sub);
            base = self.dialect.subscript(&base, &index);
        }
        if let Some(sup) = sup {
            let exponent = self.render(sup);
            base = self.dialect.power(&base, &exponent);
        }
        self.os.push_str(&base);
    }

    fn write_fraction(&mut self, style: FracStyle, num: &MathArray, den: &MathArray) {
        let num = self.render(num);
        let den = self.render(den);
        let text = if style.has_parens() {
            self.dialect.binomial(&num, &den)
        } else {
            self.dialect.fraction(&num, &den)
        };
        self.os.push_str(&text);
    }

    fn write_delimiter(&mut self, left: &str, right: &str, cell: &MathArray) {
        let inner = self.render(cell);
        let text = match (left, right) {
            ("|", "|") | ("\\vert", "\\vert") => self.dialect.abs(&inner),
            _ => format!("({})", inner),
        };
        self.os.push_str(&text);
    }

    fn write_grid(&mut self, grid: &GridNode) {
        let rows: Vec<Vec<String>> = (0..grid.nrows())
            .map(|row| {
                grid.row_cells(row)
                    .iter()
                    .map(|cell| self.render(cell))
                    .collect()
            })
            .collect();
        let text = self.dialect.matrix(&rows);
        self.os.push_str(&text);
    }

    fn write_sqrt(&mut self, cell: &MathArray) {
        let x = self.render(cell);
        let text = self.dialect.sqrt(&x);
        self.os.push_str(&text);
    }

    fn write_root(&mut self, degree: &MathArray, radicand: &MathArray) {
        let degree = self.render(degree);
        let x = self.render(radicand);
        let text = self.dialect.root(&degree, &x);
        self.os.push_str(&text);
    }

    fn write_macro_instance(&mut self, name: &str, args: &[MathArray]) {
        if args.is_empty() {
            self.os.push_str(name);
            return;
        }
        let args: Vec<String> = args.iter().map(|arg| self.render(arg)).collect();
        let text = self.dialect.apply(name, &args);
        self.os.push_str(&text);
    }

    fn write_unknown(&mut self, text: &str) {
        self.os.push_str(text.trim_start_matches('\\'));
    }
}
