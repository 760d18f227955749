//! LaTeX Parser - read LaTeX math source into a math tree
//!
//! Parsing never fails. Unknown control sequences become
//! [`MathNode::Unknown`] nodes holding their source text, unterminated groups
//! are closed at the end of input and missing arguments are filled with empty
//! cells, so the user can keep editing a formula that is not yet well formed.

use crate::array::MathArray;
use crate::formula::{Formula, HullType};
use crate::grid::{GridKind, GridNode};
use crate::macros::{MacroTable, MAX_MACRO_ARGS};
use crate::model::{Limits, MathNode, SUB, SUP};
use crate::symbols::{is_delimiter_name, lookup_keyword, lookup_symbol, Keyword};
use tracing::debug;

// =============================================================================
// Tokenizer
// =============================================================================

/// Token types of LaTeX math source
#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// Any character without a catcode of its own
    Char(char),
    /// A run of whitespace
    Space,
    /// `\name` with a letter name
    Word(String),
    /// `\c` with a single non-letter
    ControlSymbol(char),
    BeginGroup,
    EndGroup,
    Superscript,
    Subscript,
    /// `&`
    Align,
    /// `#1` .. `#9`
    Param(u32),
}

/// A token with the byte offset it starts at
#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    start: usize,
}

struct Tokenizer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.char_indices().peekable(),
        }
    }

    fn tokenize(mut self) -> Vec<Spanned> {
        let mut tokens = Vec::new();
        while let Some(&(start, c)) = self.chars.peek() {
            let token = match c {
                '%' => {
                    self.skip_comment();
                    continue;
                }
                c if c.is_whitespace() => {
                    while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
                        self.chars.next();
                    }
                    Token::Space
                }
                '\\' => {
                    self.chars.next();
                    self.read_command()
                }
                '#' => {
                    self.chars.next();
                    match self.chars.peek().and_then(|(_, d)| d.to_digit(10)) {
                        Some(d) if d > 0 => {
                            self.chars.next();
                            Token::Param(d)
                        }
                        _ => Token::Char('#'),
                    }
                }
                _ => {
                    self.chars.next();
                    match c {
                        '{' => Token::BeginGroup,
                        '}' => Token::EndGroup,
                        '^' => Token::Superscript,
                        '_' => Token::Subscript,
                        '&' => Token::Align,
                        _ => Token::Char(c),
                    }
                }
            };
            tokens.push(Spanned { token, start });
        }
        tokens
    }

    fn skip_comment(&mut self) {
        for (_, c) in self.chars.by_ref() {
            if c == '\n' {
                break;
            }
        }
    }

    fn read_command(&mut self) -> Token {
        let mut name = String::new();
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_alphabetic() {
                name.push(c);
                self.chars.next();
            } else {
                break;
            }
        }

        if name.is_empty() {
            return match self.chars.next() {
                Some((_, c)) => Token::ControlSymbol(c),
                None => Token::ControlSymbol('\\'),
            };
        }

        // spaces after a control word are not significant
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
        Token::Word(name)
    }
}

// =============================================================================
// Parser State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Math,
    Text,
}

/// How the math region of a formula is closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MathEnd {
    Dollar,
    DoubleDollar,
    /// `\]`
    Bracket,
    /// `\)`
    Paren,
}

/// Which closing tokens end the cell being parsed
#[derive(Debug, Clone, Copy)]
struct Ctx {
    mode: Mode,
    group: bool,
    bracket: bool,
    grid: bool,
    left: bool,
    math_end: Option<MathEnd>,
}

impl Ctx {
    fn top(mode: Mode) -> Self {
        Self {
            mode,
            group: false,
            bracket: false,
            grid: false,
            left: false,
            math_end: None,
        }
    }

    fn group(mode: Mode) -> Self {
        Self {
            group: true,
            ..Self::top(mode)
        }
    }
}

/// Why the parsing of a cell stopped
#[derive(Debug, Clone, PartialEq)]
enum Stop {
    Eof,
    EndGroup,
    Bracket,
    Align,
    NewRow(Option<String>),
    End(String),
    Right,
    MathEnd,
}

/// Row metadata collected while a grid row is parsed
#[derive(Debug, Clone, Default)]
struct RowMeta {
    numbered: Option<bool>,
    label: Option<String>,
    skip: Option<String>,
}

// =============================================================================
// Parser
// =============================================================================

/// Recursive-descent parser for LaTeX math
pub struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Spanned>,
    position: usize,
    macros: MacroTable,
    rows: Vec<RowMeta>,
}

/// Parse LaTeX math into a single cell
pub fn parse(input: &str) -> MathArray {
    Parser::new(input).parse_array()
}

/// Parse with a caller-owned macro table; `\newcommand`s are added to it
pub fn parse_with_macros(input: &str, macros: &mut MacroTable) -> MathArray {
    let mut parser = Parser::with_macros(input, std::mem::take(macros));
    let array = parser.parse_array();
    *macros = parser.into_macros();
    array
}

/// Parse a complete formula including its hull wrapper (`$..$`, `\[..\]`,
/// `\begin{align}..`)
pub fn parse_formula(input: &str) -> Formula {
    Parser::new(input).parse_formula()
}

/// [`parse_formula`] with a caller-owned macro table
pub fn parse_formula_with_macros(input: &str, macros: &mut MacroTable) -> Formula {
    let mut parser = Parser::with_macros(input, std::mem::take(macros));
    let formula = parser.parse_formula();
    *macros = parser.into_macros();
    formula
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self::with_macros(input, MacroTable::new())
    }

    pub fn with_macros(input: &'a str, macros: MacroTable) -> Self {
        Self {
            input,
            tokens: Tokenizer::new(input).tokenize(),
            position: 0,
            macros,
            rows: Vec::new(),
        }
    }

    pub fn macros(&self) -> &MacroTable {
        &self.macros
    }

    pub fn into_macros(self) -> MacroTable {
        self.macros
    }

    /// Parse the whole input as the content of one cell
    pub fn parse_array(&mut self) -> MathArray {
        let mut cell = MathArray::new();
        let stop = self.parse_into(&mut cell, Ctx::top(Mode::Math));
        debug_assert_eq!(stop, Stop::Eof);
        cell
    }

    /// Parse the whole input as a formula, recognizing the hull wrapper
    pub fn parse_formula(&mut self) -> Formula {
        self.skip_spaces();
        let (hull, end) = match self.peek() {
            Some(Token::Char('$')) => {
                self.position += 1;
                if self.peek() == Some(&Token::Char('$')) {
                    self.position += 1;
                    (HullType::Equation, MathEnd::DoubleDollar)
                } else {
                    (HullType::Simple, MathEnd::Dollar)
                }
            }
            Some(Token::ControlSymbol('[')) => {
                self.position += 1;
                (HullType::Equation, MathEnd::Bracket)
            }
            Some(Token::ControlSymbol('(')) => {
                self.position += 1;
                (HullType::Simple, MathEnd::Paren)
            }
            Some(Token::Word(word)) if word == "begin" => {
                let start = self.position;
                self.position += 1;
                let env = self.read_raw_group().unwrap_or_default();
                if let Some((hull, starred)) = HullType::from_env(&env) {
                    let formula = self.parse_hull(hull, starred, &env);
                    self.finish_formula();
                    return formula;
                }
                self.position = start;
                return Formula::from_cell(HullType::Simple, self.parse_array());
            }
            _ => return Formula::from_cell(HullType::Simple, self.parse_array()),
        };

        let mut cell = MathArray::new();
        let ctx = Ctx {
            math_end: Some(end),
            ..Ctx::top(Mode::Math)
        };
        if self.parse_into(&mut cell, ctx) == Stop::Eof {
            debug!("formula not closed before end of input");
        }
        self.finish_formula();
        Formula::from_cell(hull, cell)
    }

    fn finish_formula(&mut self) {
        self.skip_spaces();
        if self.position < self.tokens.len() {
            debug!(
                "ignoring text after the formula: {:?}",
                &self.input[self.tokens[self.position].start..]
            );
            self.position = self.tokens.len();
        }
    }

    fn parse_hull(&mut self, hull: HullType, starred: bool, env: &str) -> Formula {
        let (rows, metas) = self.parse_rows(env, Mode::Math);
        let mut grid = GridNode::from_rows_padded(GridKind::Hull, rows, hull.default_cols());
        if hull == HullType::Align && grid.cols() % 2 == 1 {
            grid.add_column(grid.cols() - 1);
        }
        for col in 0..grid.cols() {
            grid.set_col_align(col, hull.col_align(col));
        }

        let numbered = hull.is_numbered_by_default() && !starred;
        let last = grid.nrows() - 1;
        for (row, meta) in metas.into_iter().enumerate() {
            let default = if hull == HullType::Multline {
                numbered && row == last
            } else {
                numbered
            };
            grid.set_numbered(row, meta.numbered.unwrap_or(default));
            grid.set_label(row, meta.label);
            grid.set_row_skip(row, meta.skip);
        }
        Formula::from_grid(hull, grid)
    }

    // =========================================================================
    // Token access
    // =========================================================================

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|s| &s.token)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).map(|s| s.token.clone());
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(&Token::Space) {
            self.position += 1;
        }
    }

    /// Source text of a `{..}` group, braces excluded
    fn read_raw_group(&mut self) -> Option<String> {
        self.skip_spaces();
        if self.peek() != Some(&Token::BeginGroup) {
            return None;
        }
        self.position += 1;
        let start = self.tokens.get(self.position).map(|s| s.start);
        let mut depth = 0usize;
        let mut end = None;
        while let Some(spanned) = self.tokens.get(self.position) {
            self.position += 1;
            match spanned.token {
                Token::BeginGroup => depth += 1,
                Token::EndGroup if depth == 0 => {
                    end = Some(spanned.start);
                    break;
                }
                Token::EndGroup => depth -= 1,
                _ => {}
            }
        }
        if end.is_none() {
            debug!("unterminated group in raw argument");
        }
        let end = end.unwrap_or(self.input.len());
        let start = start.unwrap_or(end).min(end);
        Some(self.input[start..end].trim().to_string())
    }

    /// Source text of a `[..]` optional argument
    fn read_raw_optional(&mut self) -> Option<String> {
        let save = self.position;
        self.skip_spaces();
        if self.peek() != Some(&Token::Char('[')) {
            self.position = save;
            return None;
        }
        self.position += 1;
        let start = self.tokens.get(self.position).map(|s| s.start);
        let mut depth = 0usize;
        let mut end = None;
        while let Some(spanned) = self.tokens.get(self.position) {
            self.position += 1;
            match spanned.token {
                Token::BeginGroup => depth += 1,
                Token::EndGroup => depth = depth.saturating_sub(1),
                Token::Char(']') if depth == 0 => {
                    end = Some(spanned.start);
                    break;
                }
                _ => {}
            }
        }
        let end = end.unwrap_or(self.input.len());
        let start = start.unwrap_or(end).min(end);
        Some(self.input[start..end].trim().to_string())
    }

    // =========================================================================
    // Cells
    // =========================================================================

    fn parse_into(&mut self, cell: &mut MathArray, ctx: Ctx) -> Stop {
        while let Some(token) = self.next() {
            if let Some(stop) = self.parse_token(token, cell, ctx) {
                return stop;
            }
        }
        Stop::Eof
    }

    fn parse_token(&mut self, token: Token, cell: &mut MathArray, ctx: Ctx) -> Option<Stop> {
        match token {
            Token::Space => {
                if ctx.mode == Mode::Text {
                    cell.push(MathNode::Char(' '));
                }
            }
            Token::Char('$') if matches!(ctx.math_end, Some(MathEnd::Dollar)) => {
                return Some(Stop::MathEnd);
            }
            Token::Char('$') if matches!(ctx.math_end, Some(MathEnd::DoubleDollar)) => {
                if self.peek() == Some(&Token::Char('$')) {
                    self.position += 1;
                } else {
                    debug!("display math closed by a single $");
                }
                return Some(Stop::MathEnd);
            }
            Token::Char(']') if ctx.bracket => return Some(Stop::Bracket),
            Token::Char(c @ ('#' | '$')) => cell.push(MathNode::unknown(c.to_string())),
            Token::Char(c) => cell.push(MathNode::Char(c)),
            Token::BeginGroup => self.parse_group(cell, ctx.mode),
            Token::EndGroup => {
                if ctx.group {
                    return Some(Stop::EndGroup);
                }
                debug!("ignoring unmatched closing brace");
            }
            Token::Superscript if ctx.mode == Mode::Text => cell.push(MathNode::Char('^')),
            Token::Subscript if ctx.mode == Mode::Text => cell.push(MathNode::Char('_')),
            Token::Superscript => self.attach_script(cell, true, ctx.mode),
            Token::Subscript => self.attach_script(cell, false, ctx.mode),
            Token::Align => {
                if ctx.grid {
                    return Some(Stop::Align);
                }
                debug!("alignment tab outside of a grid");
                cell.push(MathNode::unknown("&"));
            }
            Token::Param(k) => cell.push(MathNode::unknown(format!("#{}", k))),
            Token::ControlSymbol(c) => return self.parse_control_symbol(c, cell, ctx),
            Token::Word(name) => return self.parse_command(&name, cell, ctx),
        }
        None
    }

    /// A `{..}` group: used as nucleus when a script follows, otherwise its
    /// content joins the current cell
    fn parse_group(&mut self, cell: &mut MathArray, mode: Mode) {
        let mut inner = MathArray::new();
        if self.parse_into(&mut inner, Ctx::group(mode)) != Stop::EndGroup {
            debug!("unterminated group closed at end of input");
        }
        let save = self.position;
        self.skip_spaces();
        if mode == Mode::Math
            && matches!(self.peek(), Some(Token::Superscript | Token::Subscript))
        {
            cell.push(MathNode::script(inner, None, None));
            return;
        }
        self.position = save;
        cell.append(inner);
    }

    /// One argument: a braced group or a single token
    fn parse_argument(&mut self, mode: Mode) -> MathArray {
        self.skip_spaces();
        let mut arg = MathArray::new();
        match self.peek() {
            None => debug!("missing argument at end of input, using an empty cell"),
            Some(Token::BeginGroup) => {
                self.position += 1;
                if self.parse_into(&mut arg, Ctx::group(mode)) != Stop::EndGroup {
                    debug!("unterminated argument closed at end of input");
                }
            }
            Some(Token::EndGroup | Token::Align) => {
                debug!("missing argument, using an empty cell");
            }
            Some(_) => {
                if let Some(token) = self.next() {
                    // a single token cannot be closed by anything
                    let _ = self.parse_token(token, &mut arg, Ctx::top(mode));
                }
            }
        }
        arg
    }

    /// Optional `[..]` argument parsed as math
    fn parse_optional(&mut self, mode: Mode) -> Option<MathArray> {
        let save = self.position;
        self.skip_spaces();
        if self.peek() != Some(&Token::Char('[')) {
            self.position = save;
            return None;
        }
        self.position += 1;
        let mut arg = MathArray::new();
        let ctx = Ctx {
            bracket: true,
            ..Ctx::top(mode)
        };
        if self.parse_into(&mut arg, ctx) != Stop::Bracket {
            debug!("unterminated optional argument");
        }
        Some(arg)
    }

    fn attach_script(&mut self, cell: &mut MathArray, sup: bool, mode: Mode) {
        let arg = self.parse_argument(mode);
        let slot = if sup { SUP } else { SUB };

        let last = cell.len().checked_sub(1).and_then(|pos| cell.get_mut(pos));
        if let Some(MathNode::Script {
            has_sup,
            has_sub,
            cells,
            ..
        }) = last
        {
            let flag = if sup { has_sup } else { has_sub };
            if !*flag {
                *flag = true;
                cells[slot] = arg;
                return;
            }
            debug!("double script, nesting");
        }

        let nucleus = match cell.len().checked_sub(1).and_then(|pos| cell.remove(pos)) {
            Some(node) => MathArray::from_nodes(vec![node]),
            None => MathArray::new(),
        };
        let node = if sup {
            MathNode::script(nucleus, Some(arg), None)
        } else {
            MathNode::script(nucleus, None, Some(arg))
        };
        cell.push(node);
    }

    fn parse_control_symbol(&mut self, c: char, cell: &mut MathArray, ctx: Ctx) -> Option<Stop> {
        match c {
            '\\' if ctx.grid => {
                let skip = self.read_raw_optional();
                return Some(Stop::NewRow(skip));
            }
            ']' if ctx.math_end == Some(MathEnd::Bracket) => return Some(Stop::MathEnd),
            ')' if ctx.math_end == Some(MathEnd::Paren) => return Some(Stop::MathEnd),
            _ => {}
        }
        if ctx.mode == Mode::Text && c == ' ' {
            cell.push(MathNode::Char(' '));
            return None;
        }
        match lookup_symbol(&c.to_string()).and_then(|s| MathNode::symbol(s.name)) {
            Some(node) => cell.push(node),
            None => {
                debug!("unknown control symbol \\{}", c);
                cell.push(MathNode::unknown(format!("\\{}", c)));
            }
        }
        None
    }

    // =========================================================================
    // Commands
    // =========================================================================

    fn parse_command(&mut self, name: &str, cell: &mut MathArray, ctx: Ctx) -> Option<Stop> {
        let mode = ctx.mode;

        if let Some(arity) = self.macros.get(name).map(|data| data.arity) {
            let args = (0..arity).map(|_| self.parse_argument(mode)).collect();
            cell.push(MathNode::macro_instance_with(name, args));
            return None;
        }

        let Some(keyword) = lookup_keyword(name) else {
            debug!("unknown control sequence \\{}", name);
            cell.push(MathNode::unknown(format!("\\{}", name)));
            return None;
        };

        match keyword {
            Keyword::Symbol(symbol) => cell.push(MathNode::Symbol(symbol)),
            Keyword::Fraction(style) => {
                let num = self.parse_argument(mode);
                let den = self.parse_argument(mode);
                cell.push(MathNode::fraction_styled(style, num, den));
            }
            Keyword::InfixFraction(style) => {
                let num = std::mem::take(cell);
                let mut den = MathArray::new();
                let stop = self.parse_into(&mut den, ctx);
                cell.push(MathNode::fraction_styled(style, num, den));
                return Some(stop);
            }
            Keyword::Sqrt => {
                let degree = self.parse_optional(mode);
                let radicand = self.parse_argument(mode);
                cell.push(match degree {
                    Some(degree) => MathNode::root(degree, radicand),
                    None => MathNode::sqrt(radicand),
                });
            }
            Keyword::Font(font) => {
                let inner = if font.is_text_mode() {
                    Mode::Text
                } else {
                    Mode::Math
                };
                let arg = self.parse_argument(inner);
                cell.push(MathNode::font(font, arg));
            }
            Keyword::OldFont(font) => {
                let mut rest = MathArray::new();
                let stop = self.parse_into(&mut rest, ctx);
                cell.push(MathNode::Font {
                    font,
                    old_style: true,
                    cell: rest,
                });
                return Some(stop);
            }
            Keyword::Decoration(kind) => {
                let arg = self.parse_argument(mode);
                cell.push(MathNode::decoration(kind, arg));
            }
            Keyword::Left => return self.parse_left_right(cell, ctx),
            Keyword::Right => {
                if ctx.left {
                    return Some(Stop::Right);
                }
                debug!("\\right without \\left");
                cell.push(MathNode::unknown("\\right"));
            }
            Keyword::Begin => {
                let env = self.read_raw_group().unwrap_or_default();
                match GridKind::from_env(&env) {
                    Some(kind) => {
                        let grid = self.parse_grid(kind, &env, mode);
                        cell.push(MathNode::Grid(grid));
                    }
                    None => {
                        debug!("unknown environment {}", env);
                        cell.push(MathNode::unknown(format!("\\begin{{{}}}", env)));
                    }
                }
            }
            Keyword::End => {
                let env = self.read_raw_group().unwrap_or_default();
                if ctx.grid {
                    return Some(Stop::End(env));
                }
                debug!("\\end{{{}}} without \\begin", env);
                cell.push(MathNode::unknown(format!("\\end{{{}}}", env)));
            }
            Keyword::Limits(limits) => self.apply_limits(cell, limits, name),
            Keyword::Label => {
                let label = self.read_raw_group().unwrap_or_default();
                match self.rows.last_mut() {
                    Some(row) => row.label = Some(label),
                    None => cell.push(MathNode::unknown(format!("\\label{{{}}}", label))),
                }
            }
            Keyword::NoNumber => match self.rows.last_mut() {
                Some(row) => row.numbered = Some(false),
                None => cell.push(MathNode::unknown(format!("\\{}", name))),
            },
            Keyword::NewCommand => {
                let node = self.parse_newcommand(mode);
                cell.push(node);
            }
        }
        None
    }

    fn apply_limits(&mut self, cell: &mut MathArray, value: Limits, name: &str) {
        let pos = match cell.len().checked_sub(1) {
            Some(pos) => pos,
            None => {
                debug!("\\{} without an operator", name);
                cell.push(MathNode::unknown(format!("\\{}", name)));
                return;
            }
        };
        if let Some(MathNode::Script { limits, .. }) = cell.get_mut(pos) {
            *limits = value;
            return;
        }
        if let Some(node) = cell.remove(pos) {
            cell.push(MathNode::Script {
                limits: value,
                has_sup: false,
                has_sub: false,
                cells: [
                    MathArray::from_nodes(vec![node]),
                    MathArray::new(),
                    MathArray::new(),
                ],
            });
        }
    }

    fn read_delimiter(&mut self) -> Option<String> {
        self.skip_spaces();
        let name = match self.peek()? {
            Token::Char(c) => c.to_string(),
            Token::ControlSymbol(c) => format!("\\{}", c),
            Token::Word(word) => format!("\\{}", word),
            _ => return None,
        };
        if is_delimiter_name(&name) {
            self.position += 1;
            Some(name)
        } else {
            None
        }
    }

    fn parse_left_right(&mut self, cell: &mut MathArray, ctx: Ctx) -> Option<Stop> {
        let left = self.read_delimiter().unwrap_or_else(|| {
            debug!("\\left without a delimiter");
            ".".to_string()
        });
        let mut inner = MathArray::new();
        let stop = self.parse_into(&mut inner, Ctx { left: true, ..ctx });
        if stop == Stop::Right {
            let right = self.read_delimiter().unwrap_or_else(|| {
                debug!("\\right without a delimiter");
                ".".to_string()
            });
            cell.push(MathNode::delimiter(left, right, inner));
            return None;
        }
        debug!("missing \\right, closing with an empty delimiter");
        cell.push(MathNode::delimiter(left, ".", inner));
        Some(stop)
    }

    fn parse_newcommand(&mut self, mode: Mode) -> MathNode {
        self.skip_spaces();
        let name = match self.peek() {
            Some(Token::Word(_)) => match self.next() {
                Some(Token::Word(name)) => Some(name),
                _ => None,
            },
            Some(Token::BeginGroup) => {
                self.position += 1;
                self.skip_spaces();
                let name = match self.next() {
                    Some(Token::Word(name)) => Some(name),
                    _ => None,
                };
                while let Some(token) = self.next() {
                    if token == Token::EndGroup {
                        break;
                    }
                }
                name
            }
            _ => None,
        };
        let Some(name) = name else {
            debug!("\\newcommand without a macro name");
            return MathNode::unknown("\\newcommand");
        };

        let arity = self
            .read_raw_optional()
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(0)
            .min(MAX_MACRO_ARGS);
        let body = self.parse_argument(mode);
        let node = MathNode::macro_template(name, arity, body, MathArray::new());
        self.macros.define(&node);
        node
    }

    // =========================================================================
    // Grids
    // =========================================================================

    fn parse_grid(&mut self, kind: GridKind, env: &str, mode: Mode) -> GridNode {
        let v_align = match kind {
            GridKind::Array | GridKind::Aligned | GridKind::Gathered => self.read_raw_optional(),
            _ => None,
        };
        let align = if kind == GridKind::Array {
            self.read_raw_group()
        } else {
            None
        };

        let (rows, metas) = self.parse_rows(env, mode);
        let mut grid = GridNode::from_rows_padded(kind, rows, 1);
        if let Some(align) = align {
            grid.set_align_string(&align);
        }
        if let Some(v) = v_align.and_then(|v| v.chars().next()) {
            grid.set_v_align(v);
        }
        for (row, meta) in metas.into_iter().enumerate() {
            if let Some(numbered) = meta.numbered {
                grid.set_numbered(row, numbered);
            }
            grid.set_label(row, meta.label);
            grid.set_row_skip(row, meta.skip);
        }
        grid
    }

    fn parse_rows(&mut self, env: &str, mode: Mode) -> (Vec<Vec<MathArray>>, Vec<RowMeta>) {
        let ctx = Ctx {
            grid: true,
            ..Ctx::top(mode)
        };
        let mut rows = Vec::new();
        let mut metas = Vec::new();
        let mut row = Vec::new();
        self.rows.push(RowMeta::default());

        loop {
            let mut cell = MathArray::new();
            let stop = self.parse_into(&mut cell, ctx);
            row.push(cell);
            match stop {
                Stop::Align => {}
                Stop::NewRow(skip) => {
                    let mut meta = self.rows.pop().unwrap_or_default();
                    meta.skip = skip;
                    metas.push(meta);
                    rows.push(std::mem::take(&mut row));
                    self.rows.push(RowMeta::default());
                }
                Stop::End(name) => {
                    if name != env {
                        debug!("\\begin{{{}}} closed by \\end{{{}}}", env, name);
                    }
                    break;
                }
                _ => {
                    debug!("unterminated environment {}", env);
                    break;
                }
            }
        }
        metas.push(self.rows.pop().unwrap_or_default());
        rows.push(row);
        (rows, metas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::FontId;
    use crate::model::{DecorationKind, FracStyle};
    use pretty_assertions::assert_eq;

    fn chars(text: &str) -> MathArray {
        MathArray::from_chars(text)
    }

    #[test]
    fn test_parse_plain_chars() {
        assert_eq!(parse("a + b"), chars("a+b"));
    }

    #[test]
    fn test_parse_fraction() {
        let array = parse("\\frac{a}{b}");
        assert_eq!(
            array,
            MathArray::from_nodes(vec![MathNode::fraction(chars("a"), chars("b"))])
        );
    }

    #[test]
    fn test_parse_fraction_single_token_arguments() {
        assert_eq!(parse("\\frac12"), parse("\\frac{1}{2}"));
    }

    #[test]
    fn test_parse_superscript() {
        let array = parse("x^{2}");
        assert_eq!(
            array,
            MathArray::from_nodes(vec![MathNode::script(chars("x"), Some(chars("2")), None)])
        );
    }

    #[test]
    fn test_parse_sub_and_sup_share_node() {
        let array = parse("x_i^2");
        assert_eq!(
            array,
            MathArray::from_nodes(vec![MathNode::script(
                chars("x"),
                Some(chars("2")),
                Some(chars("i"))
            )])
        );
    }

    #[test]
    fn test_group_as_nucleus() {
        let array = parse("{ab}^2");
        assert_eq!(
            array,
            MathArray::from_nodes(vec![MathNode::script(chars("ab"), Some(chars("2")), None)])
        );
        assert_eq!(parse("{ab}c"), chars("abc"));
    }

    #[test]
    fn test_unknown_command_keeps_following_group() {
        let array = parse("\\bogusmacro{z}");
        assert_eq!(
            array,
            MathArray::from_nodes(vec![MathNode::unknown("\\bogusmacro"), MathNode::Char('z')])
        );
    }

    #[test]
    fn test_unterminated_group_is_closed() {
        let array = parse("\\frac{a}{b");
        assert_eq!(
            array,
            MathArray::from_nodes(vec![MathNode::fraction(chars("a"), chars("b"))])
        );
    }

    #[test]
    fn test_missing_arguments_are_empty() {
        let array = parse("\\frac{a}");
        assert_eq!(
            array,
            MathArray::from_nodes(vec![MathNode::fraction(chars("a"), MathArray::new())])
        );
    }

    #[test]
    fn test_stray_closing_brace_ignored() {
        assert_eq!(parse("a}b"), chars("ab"));
    }

    #[test]
    fn test_parse_root_with_degree() {
        let array = parse("\\sqrt[3]{x}");
        assert_eq!(
            array,
            MathArray::from_nodes(vec![MathNode::root(chars("3"), chars("x"))])
        );
    }

    #[test]
    fn test_parse_symbols_and_spaces() {
        let array = parse("\\alpha\\,\\leq \\{");
        let names: Vec<_> = array
            .iter()
            .map(|node| match node {
                MathNode::Symbol(s) => s.name(),
                _ => "?",
            })
            .collect();
        assert_eq!(names, vec!["alpha", ",", "leq", "{"]);
    }

    #[test]
    fn test_parse_text_mode() {
        let array = parse("\\text{a b^c}");
        assert_eq!(
            array,
            MathArray::from_nodes(vec![MathNode::font(FontId::TextRm, chars("a b^c"))])
        );
    }

    #[test]
    fn test_parse_old_style_font() {
        let array = parse("{\\bf xy}z");
        assert_eq!(
            array,
            MathArray::from_nodes(vec![
                MathNode::Font {
                    font: FontId::MathBf,
                    old_style: true,
                    cell: chars("xy"),
                },
                MathNode::Char('z'),
            ])
        );
    }

    #[test]
    fn test_parse_infix_fraction() {
        let array = parse("{a \\over b}");
        assert_eq!(
            array,
            MathArray::from_nodes(vec![MathNode::fraction_styled(
                FracStyle::Over,
                chars("a"),
                chars("b")
            )])
        );
    }

    #[test]
    fn test_parse_left_right() {
        let array = parse("\\left( x \\right\\}");
        assert_eq!(
            array,
            MathArray::from_nodes(vec![MathNode::delimiter("(", "\\}", chars("x"))])
        );
    }

    #[test]
    fn test_missing_right_closes_with_dot() {
        let array = parse("\\left[ x");
        assert_eq!(
            array,
            MathArray::from_nodes(vec![MathNode::delimiter("[", ".", chars("x"))])
        );
    }

    #[test]
    fn test_parse_decoration() {
        let array = parse("\\hat x");
        assert_eq!(
            array,
            MathArray::from_nodes(vec![MathNode::decoration(DecorationKind::Hat, chars("x"))])
        );
    }

    #[test]
    fn test_parse_matrix() {
        let array = parse("\\begin{pmatrix} a & b \\\\ c \\end{pmatrix}");
        let MathNode::Grid(grid) = &array.nodes()[0] else {
            panic!("expected grid");
        };
        assert_eq!(grid.kind(), GridKind::PMatrix);
        assert_eq!(grid.nrows(), 2);
        assert_eq!(grid.cols(), 2);
        assert_eq!(grid.cell(1, 0), Some(&chars("c")));
        assert_eq!(grid.cell(1, 1), Some(&MathArray::new()));
        assert!(grid.is_consistent());
    }

    #[test]
    fn test_parse_array_alignment() {
        let array = parse("\\begin{array}[t]{lr} 1 & 2 \\end{array}");
        let MathNode::Grid(grid) = &array.nodes()[0] else {
            panic!("expected grid");
        };
        assert_eq!(grid.align_string(), "lr");
        assert_eq!(grid.v_align(), 't');
    }

    #[test]
    fn test_unknown_environment() {
        let array = parse("\\begin{foo}x\\end{foo}");
        assert_eq!(
            array,
            MathArray::from_nodes(vec![
                MathNode::unknown("\\begin{foo}"),
                MathNode::Char('x'),
                MathNode::unknown("\\end{foo}"),
            ])
        );
    }

    #[test]
    fn test_limits_flag() {
        let array = parse("\\sum\\limits_{i}");
        match &array.nodes()[0] {
            MathNode::Script {
                limits, has_sub, ..
            } => {
                assert_eq!(*limits, Limits::Limits);
                assert!(*has_sub);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_newcommand_registers_macro() {
        let mut macros = MacroTable::new();
        let array = parse_with_macros("\\newcommand{\\sq}[1]{#1^2} \\sq{y}", &mut macros);
        assert_eq!(array.len(), 2);
        assert!(matches!(
            &array.nodes()[0],
            MathNode::MacroTemplate { name, arity: 1, .. } if name == "sq"
        ));
        assert_eq!(
            array.nodes()[1],
            MathNode::macro_instance_with("sq", vec![chars("y")])
        );
        assert!(macros.contains("sq"));
    }

    #[test]
    fn test_comments_ignored() {
        assert_eq!(parse("a % comment\nb"), chars("ab"));
    }

    #[test]
    fn test_parse_formula_hulls() {
        assert_eq!(parse_formula("$x$").hull(), HullType::Simple);
        assert_eq!(parse_formula("\\[x\\]").hull(), HullType::Equation);
        assert_eq!(parse_formula("$$x$$").hull(), HullType::Equation);
        let formula = parse_formula("\\begin{equation}x\\end{equation}");
        assert_eq!(formula.hull(), HullType::NumberedEquation);
        assert!(formula.grid().rows()[0].numbered);
        assert_eq!(formula.cell(), &chars("x"));
    }

    #[test]
    fn test_parse_align_rows() {
        let formula = parse_formula(
            "\\begin{align} a &= b \\label{first} \\\\[2pt] c &= d \\nonumber \\end{align}",
        );
        assert_eq!(formula.hull(), HullType::Align);
        let grid = formula.grid();
        assert_eq!(grid.nrows(), 2);
        assert_eq!(grid.cols(), 2);
        assert_eq!(grid.rows()[0].label.as_deref(), Some("first"));
        assert_eq!(grid.rows()[0].skip.as_deref(), Some("2pt"));
        assert!(grid.rows()[0].numbered);
        assert!(!grid.rows()[1].numbered);
        assert_eq!(grid.cell(1, 1), Some(&chars("=d")));
    }

    #[test]
    fn test_raw_arguments_slice_after_multibyte_text() {
        let formula = parse_formula(
            "\\begin{align} é &= ü \\label{eq:ß} \\\\[1.5ex] c &= d \\end{align}",
        );
        let grid = formula.grid();
        assert_eq!(grid.nrows(), 2);
        assert_eq!(grid.rows()[0].label.as_deref(), Some("eq:ß"));
        assert_eq!(grid.rows()[0].skip.as_deref(), Some("1.5ex"));
    }

    #[test]
    fn test_starred_hull_unnumbered() {
        let formula = parse_formula("\\begin{gather*} a \\\\ b \\end{gather*}");
        assert_eq!(formula.hull(), HullType::Gather);
        assert!(formula.grid().rows().iter().all(|row| !row.numbered));
    }
}
