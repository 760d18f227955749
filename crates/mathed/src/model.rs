//! Math tree - the closed set of node kinds of a formula
//!
//! A node owns its child cells exclusively. The number of cells of a node is
//! fixed when the node is constructed: single-cell kinds hold a bare
//! [`MathArray`], fixed-arity kinds hold arrays, and the variable-arity kinds
//! (grids and macro instances) keep their cells behind boxed slices or
//! private fields. Changing the kind of a node always means building a new
//! node and substituting it.

use crate::array::MathArray;
use crate::font::{FontId, MathStyle};
use crate::grid::GridNode;
use crate::symbols::{SymbolClass, SymbolRef};
use serde::{Deserialize, Serialize};
use std::slice;

// =============================================================================
// Math Node
// =============================================================================

/// A node in the math expression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MathNode {
    /// A single character typed or parsed verbatim
    Char(char),
    /// A named symbol from the symbol table
    Symbol(SymbolRef),
    /// Font change applied to one cell (`\mathbf{..}`, `\text{..}`, `{\bf ..}`)
    Font {
        font: FontId,
        /// Written as an old-style switch (`{\bf x}`) instead of `\mathbf{x}`
        old_style: bool,
        cell: MathArray,
    },
    /// Nucleus with optional superscript and subscript
    ///
    /// The three cells always exist; the flags say which script slots are
    /// shown and written.
    Script {
        limits: Limits,
        has_sup: bool,
        has_sub: bool,
        cells: [MathArray; 3],
    },
    /// Numerator over denominator
    Fraction {
        style: FracStyle,
        cells: [MathArray; 2],
    },
    /// `\left<l> .. \right<r>`
    Delimiter {
        left: String,
        right: String,
        cell: MathArray,
    },
    /// Rows by columns of cells (matrices, arrays, aligned equations)
    Grid(GridNode),
    /// Square root
    Sqrt { cell: MathArray },
    /// Root with a degree cell followed by the radicand
    Root { cells: [MathArray; 2] },
    /// Wide accent, arrow or brace over or under one cell
    Decoration {
        kind: DecorationKind,
        cell: MathArray,
    },
    /// `\newcommand` definition: body cell and display-form cell
    MacroTemplate {
        name: String,
        arity: usize,
        cells: [MathArray; 2],
    },
    /// Use of a user macro with one cell per argument
    MacroInstance {
        name: String,
        cells: Box<[MathArray]>,
    },
    /// Verbatim source the parser could not classify
    Unknown(String),
}

/// Cell indices of a [`MathNode::Script`]
pub const NUCLEUS: usize = 0;
pub const SUP: usize = 1;
pub const SUB: usize = 2;

/// Cell indices of a [`MathNode::Root`]
pub const DEGREE: usize = 0;
pub const RADICAND: usize = 1;

impl MathNode {
    /// Look up a symbol node by name
    pub fn symbol(name: &str) -> Option<Self> {
        SymbolRef::new(name).map(MathNode::Symbol)
    }

    pub fn fraction(num: MathArray, den: MathArray) -> Self {
        MathNode::Fraction {
            style: FracStyle::Frac,
            cells: [num, den],
        }
    }

    pub fn fraction_styled(style: FracStyle, num: MathArray, den: MathArray) -> Self {
        MathNode::Fraction {
            style,
            cells: [num, den],
        }
    }

    /// Script node; an absent slot is an empty, hidden cell
    pub fn script(nucleus: MathArray, sup: Option<MathArray>, sub: Option<MathArray>) -> Self {
        MathNode::Script {
            limits: Limits::Default,
            has_sup: sup.is_some(),
            has_sub: sub.is_some(),
            cells: [nucleus, sup.unwrap_or_default(), sub.unwrap_or_default()],
        }
    }

    pub fn sqrt(cell: MathArray) -> Self {
        MathNode::Sqrt { cell }
    }

    pub fn root(degree: MathArray, radicand: MathArray) -> Self {
        MathNode::Root {
            cells: [degree, radicand],
        }
    }

    pub fn font(font: FontId, cell: MathArray) -> Self {
        MathNode::Font {
            font,
            old_style: false,
            cell,
        }
    }

    pub fn delimiter(left: impl Into<String>, right: impl Into<String>, cell: MathArray) -> Self {
        MathNode::Delimiter {
            left: left.into(),
            right: right.into(),
            cell,
        }
    }

    pub fn decoration(kind: DecorationKind, cell: MathArray) -> Self {
        MathNode::Decoration { kind, cell }
    }

    pub fn macro_template(
        name: impl Into<String>,
        arity: usize,
        body: MathArray,
        display: MathArray,
    ) -> Self {
        MathNode::MacroTemplate {
            name: name.into(),
            arity,
            cells: [body, display],
        }
    }

    /// Macro use with `arity` empty argument cells
    pub fn macro_instance(name: impl Into<String>, arity: usize) -> Self {
        MathNode::MacroInstance {
            name: name.into(),
            cells: vec![MathArray::new(); arity].into_boxed_slice(),
        }
    }

    pub fn macro_instance_with(name: impl Into<String>, args: Vec<MathArray>) -> Self {
        MathNode::MacroInstance {
            name: name.into(),
            cells: args.into_boxed_slice(),
        }
    }

    pub fn unknown(text: impl Into<String>) -> Self {
        MathNode::Unknown(text.into())
    }

    // =========================================================================
    // Cells
    // =========================================================================

    /// Child cells in index order
    pub fn cells(&self) -> &[MathArray] {
        match self {
            MathNode::Char(_) | MathNode::Symbol(_) | MathNode::Unknown(_) => &[],
            MathNode::Font { cell, .. }
            | MathNode::Delimiter { cell, .. }
            | MathNode::Sqrt { cell }
            | MathNode::Decoration { cell, .. } => slice::from_ref(cell),
            MathNode::Script { cells, .. } => cells,
            MathNode::Fraction { cells, .. }
            | MathNode::Root { cells }
            | MathNode::MacroTemplate { cells, .. } => cells,
            MathNode::Grid(grid) => grid.cells(),
            MathNode::MacroInstance { cells, .. } => cells,
        }
    }

    /// Mutable child cells; the slice length cannot change
    pub(crate) fn cells_mut(&mut self) -> &mut [MathArray] {
        match self {
            MathNode::Char(_) | MathNode::Symbol(_) | MathNode::Unknown(_) => &mut [],
            MathNode::Font { cell, .. }
            | MathNode::Delimiter { cell, .. }
            | MathNode::Sqrt { cell }
            | MathNode::Decoration { cell, .. } => slice::from_mut(cell),
            MathNode::Script { cells, .. } => cells,
            MathNode::Fraction { cells, .. }
            | MathNode::Root { cells }
            | MathNode::MacroTemplate { cells, .. } => cells,
            MathNode::Grid(grid) => grid.cells_mut(),
            MathNode::MacroInstance { cells, .. } => cells,
        }
    }

    pub fn cell(&self, idx: usize) -> Option<&MathArray> {
        self.cells().get(idx)
    }

    pub(crate) fn cell_mut(&mut self, idx: usize) -> Option<&mut MathArray> {
        self.cells_mut().get_mut(idx)
    }

    /// Number of child cells
    pub fn arity(&self) -> usize {
        self.cells().len()
    }

    pub fn is_composite(&self) -> bool {
        self.arity() > 0
    }

    /// Short kind name used by debug output
    pub fn kind_name(&self) -> &'static str {
        match self {
            MathNode::Char(_) => "char",
            MathNode::Symbol(_) => "symbol",
            MathNode::Font { .. } => "font",
            MathNode::Script { .. } => "script",
            MathNode::Fraction { .. } => "frac",
            MathNode::Delimiter { .. } => "delim",
            MathNode::Grid(_) => "grid",
            MathNode::Sqrt { .. } => "sqrt",
            MathNode::Root { .. } => "root",
            MathNode::Decoration { .. } => "deco",
            MathNode::MacroTemplate { .. } => "macrotemplate",
            MathNode::MacroInstance { .. } => "macro",
            MathNode::Unknown(_) => "unknown",
        }
    }

    /// Whether cell `idx` is shown and reachable by the cursor
    pub fn is_active_cell(&self, idx: usize) -> bool {
        match self {
            MathNode::Script {
                has_sup, has_sub, ..
            } => match idx {
                NUCLEUS => true,
                SUP => *has_sup,
                SUB => *has_sub,
                _ => false,
            },
            _ => idx < self.arity(),
        }
    }

    /// Every cell is empty (or the node has none)
    pub fn is_empty_composite(&self) -> bool {
        self.cells().iter().all(MathArray::is_empty)
    }

    /// Content left behind when the node is unwrapped: its shown cells in order
    pub fn into_content(self) -> MathArray {
        let mut content = MathArray::new();
        for (idx, cell) in self.cells().iter().enumerate() {
            if self.is_active_cell(idx) {
                content.append(cell.clone());
            }
        }
        content
    }

    /// Visit this node and all nested nodes, pre-order
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a MathNode)) {
        f(self);
        for cell in self.cells() {
            cell.walk(f);
        }
    }

    /// LaTeX package this node itself needs
    pub fn required_package(&self) -> Option<&'static str> {
        match self {
            MathNode::Symbol(symbol) => symbol.requires,
            MathNode::Font { font, .. } => match font {
                FontId::MathBb | FontId::MathFrak => Some("amssymb"),
                FontId::TextRm
                | FontId::TextBf
                | FontId::TextIt
                | FontId::TextSf
                | FontId::TextTt => Some("amsmath"),
                _ => None,
            },
            MathNode::Fraction { style, .. } => match style {
                FracStyle::Dfrac | FracStyle::Tfrac | FracStyle::Binom => Some("amsmath"),
                _ => None,
            },
            MathNode::Grid(grid) => grid.kind().required_package(),
            _ => None,
        }
    }

    /// Symbol class of a leaf, used for operator spacing
    pub fn symbol_class(&self) -> Option<SymbolClass> {
        match self {
            MathNode::Symbol(symbol) => Some(symbol.class),
            MathNode::Char(c) => match c {
                '+' | '-' | '*' => Some(SymbolClass::BinaryOp),
                '=' | '<' | '>' => Some(SymbolClass::Relation),
                ',' | ';' => Some(SymbolClass::Punctuation),
                _ => None,
            },
            _ => None,
        }
    }

    // =========================================================================
    // Cell navigation
    // =========================================================================

    /// Cell entered when moving right into the node
    pub fn first_idx(&self) -> Option<usize> {
        (self.arity() > 0).then_some(0)
    }

    /// Cell entered when moving left into the node
    pub fn last_idx(&self) -> Option<usize> {
        match self {
            MathNode::Script { .. } => Some(NUCLEUS),
            MathNode::Fraction { .. } | MathNode::MacroTemplate { .. } => Some(0),
            _ => self.arity().checked_sub(1),
        }
    }

    /// Cell reached by moving right off the end of cell `idx`
    pub fn idx_right(&self, idx: usize) -> Option<usize> {
        match self {
            MathNode::Grid(grid) => grid.idx_right(idx),
            MathNode::Root { .. } => (idx == DEGREE).then_some(RADICAND),
            MathNode::MacroInstance { cells, .. } => (idx + 1 < cells.len()).then_some(idx + 1),
            _ => None,
        }
    }

    /// Cell reached by moving left off the start of cell `idx`
    pub fn idx_left(&self, idx: usize) -> Option<usize> {
        match self {
            MathNode::Grid(grid) => grid.idx_left(idx),
            MathNode::Root { .. } => (idx == RADICAND).then_some(DEGREE),
            MathNode::MacroInstance { .. } => idx.checked_sub(1),
            _ => None,
        }
    }

    /// Cell reached by moving up from cell `idx`
    pub fn idx_up(&self, idx: usize) -> Option<usize> {
        match self {
            MathNode::Fraction { .. } => (idx == 1).then_some(0),
            MathNode::Script { has_sup, .. } => match idx {
                NUCLEUS if *has_sup => Some(SUP),
                SUB => Some(NUCLEUS),
                _ => None,
            },
            MathNode::Root { .. } => (idx == RADICAND).then_some(DEGREE),
            MathNode::Grid(grid) => grid.idx_up(idx),
            MathNode::MacroTemplate { .. } => (idx == 1).then_some(0),
            _ => None,
        }
    }

    /// Cell reached by moving down from cell `idx`
    pub fn idx_down(&self, idx: usize) -> Option<usize> {
        match self {
            MathNode::Fraction { .. } => (idx == 0).then_some(1),
            MathNode::Script { has_sub, .. } => match idx {
                NUCLEUS if *has_sub => Some(SUB),
                SUP => Some(NUCLEUS),
                _ => None,
            },
            MathNode::Root { .. } => (idx == DEGREE).then_some(RADICAND),
            MathNode::Grid(grid) => grid.idx_down(idx),
            MathNode::MacroTemplate { .. } => (idx == 0).then_some(1),
            _ => None,
        }
    }
}

// =============================================================================
// Node Attributes
// =============================================================================

/// Fraction flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FracStyle {
    /// `\frac{a}{b}`
    Frac,
    /// `\dfrac{a}{b}`, always display-sized content
    Dfrac,
    /// `\tfrac{a}{b}`, always text-sized content
    Tfrac,
    /// `{a \over b}`
    Over,
    /// `{a \atop b}`, no rule
    Atop,
    /// `\binom{a}{b}`, parentheses and no rule
    Binom,
    /// `{a \choose b}`
    Choose,
}

impl FracStyle {
    pub fn command(self) -> &'static str {
        match self {
            FracStyle::Frac => "frac",
            FracStyle::Dfrac => "dfrac",
            FracStyle::Tfrac => "tfrac",
            FracStyle::Over => "over",
            FracStyle::Atop => "atop",
            FracStyle::Binom => "binom",
            FracStyle::Choose => "choose",
        }
    }

    /// Written between the two cells rather than before them
    pub fn is_infix(self) -> bool {
        matches!(self, FracStyle::Over | FracStyle::Atop | FracStyle::Choose)
    }

    pub fn has_rule(self) -> bool {
        matches!(
            self,
            FracStyle::Frac | FracStyle::Dfrac | FracStyle::Tfrac | FracStyle::Over
        )
    }

    pub fn has_parens(self) -> bool {
        matches!(self, FracStyle::Binom | FracStyle::Choose)
    }

    /// Style of the numerator and denominator inside a fraction set in `outer`
    pub fn cell_style(self, outer: MathStyle) -> MathStyle {
        match self {
            FracStyle::Dfrac => MathStyle::Display.fraction(),
            FracStyle::Tfrac => MathStyle::Text.fraction(),
            _ => outer.fraction(),
        }
    }
}

/// Placement of the scripts of a large operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Limits {
    /// Limits in display style only
    #[default]
    Default,
    /// `\limits`: always above and below
    Limits,
    /// `\nolimits`: always to the side
    NoLimits,
}

impl Limits {
    /// Whether scripts on `nucleus` go above and below in `style`
    pub fn stacked(self, nucleus: &MathArray, style: MathStyle) -> bool {
        match self {
            Limits::Limits => true,
            Limits::NoLimits => false,
            Limits::Default => {
                style == MathStyle::Display
                    && nucleus.len() == 1
                    && matches!(nucleus.get(0), Some(MathNode::Symbol(s)) if s.takes_limits())
            }
        }
    }
}

/// Accent, arrow or brace drawn over or under a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecorationKind {
    Hat,
    WideHat,
    Tilde,
    WideTilde,
    Bar,
    Overline,
    Underline,
    Vec,
    Dot,
    Ddot,
    Acute,
    Grave,
    Breve,
    Check,
    OverRightArrow,
    OverLeftArrow,
    OverLeftRightArrow,
    OverBrace,
    UnderBrace,
}

impl DecorationKind {
    const ALL: [DecorationKind; 19] = [
        DecorationKind::Hat,
        DecorationKind::WideHat,
        DecorationKind::Tilde,
        DecorationKind::WideTilde,
        DecorationKind::Bar,
        DecorationKind::Overline,
        DecorationKind::Underline,
        DecorationKind::Vec,
        DecorationKind::Dot,
        DecorationKind::Ddot,
        DecorationKind::Acute,
        DecorationKind::Grave,
        DecorationKind::Breve,
        DecorationKind::Check,
        DecorationKind::OverRightArrow,
        DecorationKind::OverLeftArrow,
        DecorationKind::OverLeftRightArrow,
        DecorationKind::OverBrace,
        DecorationKind::UnderBrace,
    ];

    /// LaTeX command name
    pub fn name(self) -> &'static str {
        match self {
            DecorationKind::Hat => "hat",
            DecorationKind::WideHat => "widehat",
            DecorationKind::Tilde => "tilde",
            DecorationKind::WideTilde => "widetilde",
            DecorationKind::Bar => "bar",
            DecorationKind::Overline => "overline",
            DecorationKind::Underline => "underline",
            DecorationKind::Vec => "vec",
            DecorationKind::Dot => "dot",
            DecorationKind::Ddot => "ddot",
            DecorationKind::Acute => "acute",
            DecorationKind::Grave => "grave",
            DecorationKind::Breve => "breve",
            DecorationKind::Check => "check",
            DecorationKind::OverRightArrow => "overrightarrow",
            DecorationKind::OverLeftArrow => "overleftarrow",
            DecorationKind::OverLeftRightArrow => "overleftrightarrow",
            DecorationKind::OverBrace => "overbrace",
            DecorationKind::UnderBrace => "underbrace",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }

    /// Name of the polyline template in the deco table
    pub fn deco_name(self) -> &'static str {
        match self {
            DecorationKind::Hat | DecorationKind::WideHat => "hat",
            DecorationKind::Tilde | DecorationKind::WideTilde => "tilde",
            DecorationKind::Bar | DecorationKind::Overline | DecorationKind::Underline => "bar",
            DecorationKind::Vec => "vec",
            DecorationKind::Dot => "dot",
            DecorationKind::Ddot => "ddot",
            DecorationKind::Acute => "acute",
            DecorationKind::Grave => "grave",
            DecorationKind::Breve => "breve",
            DecorationKind::Check => "check",
            DecorationKind::OverRightArrow => "rightarrow",
            DecorationKind::OverLeftArrow => "leftarrow",
            DecorationKind::OverLeftRightArrow => "leftrightarrow",
            DecorationKind::OverBrace => "overbrace",
            DecorationKind::UnderBrace => "underbrace",
        }
    }

    pub fn is_under(self) -> bool {
        matches!(self, DecorationKind::Underline | DecorationKind::UnderBrace)
    }

    /// Stretches over the full width of the cell
    pub fn is_wide(self) -> bool {
        matches!(
            self,
            DecorationKind::WideHat
                | DecorationKind::WideTilde
                | DecorationKind::Overline
                | DecorationKind::Underline
                | DecorationKind::OverRightArrow
                | DecorationKind::OverLeftArrow
                | DecorationKind::OverLeftRightArrow
                | DecorationKind::OverBrace
                | DecorationKind::UnderBrace
        )
    }

    /// Needs `\protect` inside moving arguments
    pub fn is_fragile(self) -> bool {
        matches!(
            self,
            DecorationKind::OverRightArrow
                | DecorationKind::OverLeftArrow
                | DecorationKind::OverLeftRightArrow
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GridKind, GridNode};

    #[test]
    fn test_fixed_arity() {
        assert_eq!(MathNode::Char('x').arity(), 0);
        assert_eq!(MathNode::symbol("alpha").unwrap().arity(), 0);
        assert_eq!(MathNode::sqrt(MathArray::new()).arity(), 1);
        assert_eq!(
            MathNode::fraction(MathArray::new(), MathArray::new()).arity(),
            2
        );
        assert_eq!(MathNode::script(MathArray::new(), None, None).arity(), 3);
        assert_eq!(MathNode::macro_instance("foo", 2).arity(), 2);
        let grid = GridNode::new(GridKind::Matrix, 3, 2);
        assert_eq!(MathNode::Grid(grid).arity(), 6);
    }

    #[test]
    fn test_script_active_cells() {
        let script = MathNode::script(MathArray::from_chars("x"), Some(MathArray::new()), None);
        assert!(script.is_active_cell(NUCLEUS));
        assert!(script.is_active_cell(SUP));
        assert!(!script.is_active_cell(SUB));
        assert_eq!(script.idx_up(NUCLEUS), Some(SUP));
        assert_eq!(script.idx_down(NUCLEUS), None);
        assert_eq!(script.idx_right(NUCLEUS), None);
    }

    #[test]
    fn test_fraction_vertical_navigation() {
        let frac = MathNode::fraction(MathArray::new(), MathArray::new());
        assert_eq!(frac.idx_down(0), Some(1));
        assert_eq!(frac.idx_up(1), Some(0));
        assert_eq!(frac.idx_up(0), None);
        assert_eq!(frac.idx_right(0), None);
    }

    #[test]
    fn test_grid_navigation() {
        let grid = MathNode::Grid(GridNode::new(GridKind::Matrix, 2, 2));
        assert_eq!(grid.idx_right(0), Some(1));
        assert_eq!(grid.idx_right(1), None);
        assert_eq!(grid.idx_left(3), Some(2));
        assert_eq!(grid.idx_left(2), None);
        assert_eq!(grid.idx_down(1), Some(3));
        assert_eq!(grid.idx_down(3), None);
        assert_eq!(grid.idx_up(2), Some(0));
    }

    #[test]
    fn test_into_content_skips_hidden_scripts() {
        let script = MathNode::script(
            MathArray::from_chars("x"),
            Some(MathArray::from_chars("2")),
            None,
        );
        assert_eq!(script.into_content(), MathArray::from_chars("x2"));
    }

    #[test]
    fn test_decoration_names() {
        for kind in DecorationKind::ALL {
            assert_eq!(DecorationKind::from_name(kind.name()), Some(kind));
        }
        assert!(DecorationKind::Underline.is_under());
        assert!(DecorationKind::WideHat.is_wide());
        assert!(!DecorationKind::Hat.is_wide());
    }

    #[test]
    fn test_frac_cell_style() {
        assert_eq!(FracStyle::Frac.cell_style(MathStyle::Display), MathStyle::Text);
        assert_eq!(FracStyle::Dfrac.cell_style(MathStyle::Script), MathStyle::Text);
        assert_eq!(FracStyle::Tfrac.cell_style(MathStyle::Display), MathStyle::Script);
        assert!(FracStyle::Over.is_infix());
        assert!(!FracStyle::Atop.has_rule());
        assert!(FracStyle::Binom.has_parens());
    }

    #[test]
    fn test_limits_default_depends_on_style() {
        let sum = MathArray::from_nodes(vec![MathNode::symbol("sum").unwrap()]);
        assert!(Limits::Default.stacked(&sum, MathStyle::Display));
        assert!(!Limits::Default.stacked(&sum, MathStyle::Text));
        assert!(Limits::Limits.stacked(&sum, MathStyle::Text));
        assert!(!Limits::NoLimits.stacked(&sum, MathStyle::Display));
        let x = MathArray::from_chars("x");
        assert!(!Limits::Default.stacked(&x, MathStyle::Display));
    }

    #[test]
    fn test_node_serde_round_trip() {
        let node = MathNode::fraction(
            MathArray::from_nodes(vec![MathNode::symbol("alpha").unwrap()]),
            MathArray::from_chars("b"),
        );
        let json = serde_json::to_string(&node).unwrap();
        let back: MathNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }
}
