//! Metrics pass - width, ascent and descent for every node
//!
//! The pass produces a layout tree mirroring the math tree: one
//! [`CellLayout`] per cell and one [`NodeLayout`] per node. Every offset the
//! draw pass uses is stored here, so drawing never recomputes geometry.
//! Coordinates are integer device units; x grows right, y grows down and
//! every box is anchored at its left baseline point.

use crate::array::MathArray;
use crate::config::LayoutConfig;
use crate::cursor::{CursorGeometry, CursorSlice};
use crate::font::{Dimension, FontFamily, FontId, FontInfo, FontMetrics, MathStyle};
use crate::formula::Formula;
use crate::grid::{GridKind, GridNode};
use crate::macros::MacroTable;
use crate::model::{DecorationKind, FracStyle, Limits, MathNode, SUB, SUP};
use crate::symbols::{SymbolClass, SymbolInfo};
use serde::{Deserialize, Serialize};

/// Deepest macro expansion nesting laid out before falling back to the
/// unexpanded form
const MAX_MACRO_DEPTH: usize = 16;

// =============================================================================
// Layout Types
// =============================================================================

/// A position in device units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// How a glyph is inked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ink {
    Text,
    /// Unknown source text
    Error,
    /// Macro names and template labels
    Macro,
}

/// A drawable piece of a node, relative to the node's origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LayoutItem {
    /// Text with its baseline at `y`
    Glyph {
        x: i32,
        y: i32,
        text: String,
        font: FontInfo,
        ink: Ink,
    },
    /// Filled rectangle with its top-left corner at (`x`, `y`)
    Rule {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    /// Stretchy symbol from the deco table filling the given box
    Deco {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        name: String,
    },
    /// Outline rectangle
    Frame {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
}

/// A child cell placed inside its node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedCell {
    /// Offset of the cell origin from the node origin
    pub dx: i32,
    /// Baseline shift of the cell relative to the node baseline
    pub dy: i32,
    /// Hidden cells (absent script slots, arguments of expanded macros) are
    /// laid out but not drawn
    pub shown: bool,
    pub layout: CellLayout,
}

impl PlacedCell {
    fn at(dx: i32, dy: i32, layout: CellLayout) -> Self {
        Self {
            dx,
            dy,
            shown: true,
            layout,
        }
    }

    fn hidden(layout: CellLayout) -> Self {
        Self {
            dx: 0,
            dy: 0,
            shown: false,
            layout,
        }
    }
}

/// Layout of one cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellLayout {
    pub dim: Dimension,
    pub style: MathStyle,
    /// Cursor x offset of every position `0..=len`
    pub xs: Vec<i32>,
    pub nodes: Vec<NodeLayout>,
    pub empty: bool,
    /// Empty cell drawn with a placeholder frame
    pub framed: bool,
}

impl CellLayout {
    /// Position whose x offset is closest to `x`
    pub fn closest_pos(&self, x: i32) -> usize {
        self.xs
            .iter()
            .enumerate()
            .min_by_key(|(_, px)| (**px - x).abs())
            .map(|(pos, _)| pos)
            .unwrap_or(0)
    }
}

/// Column and row geometry of a laid out grid
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GridMetrics {
    pub col_widths: Vec<i32>,
    pub col_gap: i32,
    /// Baseline of every row relative to the node baseline
    pub row_baselines: Vec<i32>,
    /// Sum of column widths plus the gaps between them
    pub content_width: i32,
}

/// Layout of one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeLayout {
    pub dim: Dimension,
    /// Offset of the node origin from its cell origin
    pub x: i32,
    /// One entry per child cell, in cell index order
    pub cells: Vec<PlacedCell>,
    /// Drawn but not editable cells (macro expansions)
    pub views: Vec<PlacedCell>,
    pub items: Vec<LayoutItem>,
    pub grid: Option<GridMetrics>,
}

impl NodeLayout {
    fn leaf(dim: Dimension, items: Vec<LayoutItem>) -> Self {
        Self {
            dim,
            x: 0,
            cells: Vec::new(),
            views: Vec::new(),
            items,
            grid: None,
        }
    }

    fn composite(dim: Dimension, cells: Vec<PlacedCell>, items: Vec<LayoutItem>) -> Self {
        Self {
            dim,
            x: 0,
            cells,
            views: Vec::new(),
            items,
            grid: None,
        }
    }
}

/// Result of the metrics pass over a whole formula
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaLayout {
    /// Hull grid; its cells are the cells of the formula
    pub root: NodeLayout,
    pub style: MathStyle,
}

impl FormulaLayout {
    pub fn dim(&self) -> Dimension {
        self.root.dim
    }

    /// Origin (relative to the formula origin) and layout of the cell
    /// addressed by `frames`
    pub fn locate(&self, frames: &[CursorSlice]) -> Option<(Point, &CellLayout)> {
        let (first, rest) = frames.split_first()?;
        let placed = self.root.cells.get(first.idx)?;
        let mut origin = Point::new(placed.dx, placed.dy);
        let mut cell = &placed.layout;
        let mut parent_pos = first.pos;
        for frame in rest {
            let node = cell.nodes.get(parent_pos)?;
            let placed = node.cells.get(frame.idx)?;
            origin = origin.offset(node.x + placed.dx, placed.dy);
            cell = &placed.layout;
            parent_pos = frame.pos;
        }
        Some((origin, cell))
    }

    /// Caret position: x, baseline y, ascent and descent of the cell
    pub fn cursor_box(&self, frames: &[CursorSlice]) -> Option<(Point, Dimension)> {
        let (origin, cell) = self.locate(frames)?;
        let pos = frames.last()?.pos;
        let x = cell.xs.get(pos).copied()?;
        Some((origin.offset(x, 0), cell.dim))
    }
}

impl CursorGeometry for FormulaLayout {
    fn cursor_x(&self, frames: &[CursorSlice]) -> Option<i32> {
        self.cursor_box(frames).map(|(point, _)| point.x)
    }
}

// =============================================================================
// Layout Engine
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct Ctx {
    style: MathStyle,
    font: Option<FontId>,
    text_mode: bool,
    macro_depth: usize,
}

impl Ctx {
    fn new(style: MathStyle) -> Self {
        Self {
            style,
            font: None,
            text_mode: false,
            macro_depth: 0,
        }
    }

    fn with_style(self, style: MathStyle) -> Self {
        Self { style, ..self }
    }
}

/// Computes layout trees from a font-metrics provider and a configuration
pub struct LayoutEngine<'a> {
    metrics: &'a dyn FontMetrics,
    config: &'a LayoutConfig,
    macros: Option<&'a MacroTable>,
    first_number: usize,
}

impl<'a> LayoutEngine<'a> {
    pub fn new(metrics: &'a dyn FontMetrics, config: &'a LayoutConfig) -> Self {
        Self {
            metrics,
            config,
            macros: None,
            first_number: 1,
        }
    }

    /// Expand instances of macros found in `macros`
    pub fn with_macros(mut self, macros: &'a MacroTable) -> Self {
        self.macros = Some(macros);
        self
    }

    /// Number given to the first numbered row
    pub fn with_first_number(mut self, first: usize) -> Self {
        self.first_number = first;
        self
    }

    /// Lay out a whole formula in its hull's style
    pub fn layout_formula(&self, formula: &Formula) -> FormulaLayout {
        let style = formula.hull().style();
        let ctx = Ctx::new(style);
        let mut root = self.layout_grid(formula.grid(), ctx);

        let numbers = formula.equation_numbers(self.first_number);
        if numbers.iter().any(Option::is_some) {
            let gap = self.units(self.config.number_gap, ctx);
            let x = root.dim.width + gap;
            let baselines = root
                .grid
                .as_ref()
                .map(|g| g.row_baselines.clone())
                .unwrap_or_default();
            let font = self.font_info(FontFamily::Roman, MathStyle::Text);
            let mut width = root.dim.width;
            for (row, number) in numbers.iter().enumerate() {
                let Some(number) = number else {
                    continue;
                };
                let text = format!("({})", number);
                let dim = self.metrics.string_dim(&font, &text);
                let y = baselines.get(row).copied().unwrap_or(0);
                root.items.push(LayoutItem::Glyph {
                    x,
                    y,
                    text,
                    font,
                    ink: Ink::Text,
                });
                width = width.max(x + dim.width);
                root.dim.ascent = root.dim.ascent.max(dim.ascent - y);
                root.dim.descent = root.dim.descent.max(y + dim.descent);
            }
            root.dim.width = width;
        }
        FormulaLayout { root, style }
    }

    /// Lay out a single cell at `style`
    pub fn layout_array(&self, array: &MathArray, style: MathStyle) -> CellLayout {
        self.layout_cell(array, Ctx::new(style))
    }

    /// Dimension of `array` at `style`
    pub fn metrics(&self, array: &MathArray, style: MathStyle) -> Dimension {
        self.layout_array(array, style).dim
    }

    fn units(&self, ratio: f32, ctx: Ctx) -> i32 {
        self.config.units(ratio, ctx.style)
    }

    fn font_info(&self, family: FontFamily, style: MathStyle) -> FontInfo {
        FontInfo::new(family, style, self.config.font_size(style))
    }

    fn char_family(c: char, ctx: Ctx) -> FontFamily {
        match ctx.font {
            Some(font) if c.is_alphanumeric() => font.family(),
            Some(font) if ctx.text_mode => font.family(),
            _ if ctx.text_mode => FontFamily::Roman,
            _ if c.is_alphabetic() => FontFamily::MathItalic,
            _ => FontFamily::Roman,
        }
    }

    // =========================================================================
    // Cells
    // =========================================================================

    fn layout_cell(&self, array: &MathArray, ctx: Ctx) -> CellLayout {
        let mut nodes = Vec::with_capacity(array.len());
        let mut xs = Vec::with_capacity(array.len() + 1);
        let mut dim = Dimension::zero();
        let mut x = 0;
        let mut after_operand = false;
        xs.push(0);

        let spacing = !(ctx.style.is_script() || ctx.text_mode);
        for node in array {
            let class = node.symbol_class();
            let space = match class {
                Some(SymbolClass::BinaryOp) if spacing && after_operand => {
                    self.units(self.config.binop_space, ctx)
                }
                Some(SymbolClass::Relation) | Some(SymbolClass::Arrow) if spacing => {
                    self.units(self.config.relation_space, ctx)
                }
                _ => 0,
            };
            after_operand = !matches!(
                class,
                Some(SymbolClass::BinaryOp)
                    | Some(SymbolClass::Relation)
                    | Some(SymbolClass::Arrow)
                    | Some(SymbolClass::Punctuation)
                    | Some(SymbolClass::LargeOp)
            );

            x += space;
            let mut layout = self.layout_node(node, ctx);
            layout.x = x;
            x += layout.dim.width + space;
            dim.ascent = dim.ascent.max(layout.dim.ascent);
            dim.descent = dim.descent.max(layout.dim.descent);
            xs.push(x);
            nodes.push(layout);
        }
        dim.width = x;

        let empty = array.is_empty();
        if empty {
            let font = self.font_info(FontFamily::MathItalic, ctx.style);
            dim = Dimension::new(
                self.units(self.config.empty_cell_width, ctx),
                self.metrics.char_dim(&font, 'x').ascent,
                0,
            );
            xs = vec![0];
        }

        CellLayout {
            dim,
            style: ctx.style,
            xs,
            nodes,
            empty,
            framed: empty && self.config.frame_empty_cells,
        }
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    fn layout_node(&self, node: &MathNode, ctx: Ctx) -> NodeLayout {
        match node {
            MathNode::Char(c) => self.layout_char(*c, ctx),
            MathNode::Symbol(symbol) => self.layout_symbol(symbol.info(), ctx),
            MathNode::Unknown(text) => self.layout_text(text, Ink::Error, ctx),
            MathNode::Font { font, cell, .. } => {
                let inner = Ctx {
                    font: Some(*font),
                    text_mode: font.is_text_mode(),
                    ..ctx
                };
                let cell = self.layout_cell(cell, inner);
                NodeLayout::composite(cell.dim, vec![PlacedCell::at(0, 0, cell)], Vec::new())
            }
            MathNode::Script {
                limits,
                has_sup,
                has_sub,
                cells,
            } => self.layout_script(*limits, *has_sup, *has_sub, cells, ctx),
            MathNode::Fraction { style, cells } => self.layout_fraction(*style, cells, ctx),
            MathNode::Delimiter { left, right, cell } => {
                self.layout_delimiter(left, right, cell, ctx)
            }
            MathNode::Grid(grid) => self.layout_grid(grid, ctx),
            MathNode::Sqrt { cell } => self.layout_sqrt(cell, ctx),
            MathNode::Root { cells } => self.layout_root(cells, ctx),
            MathNode::Decoration { kind, cell } => self.layout_decoration(*kind, cell, ctx),
            MathNode::MacroTemplate { name, cells, .. } => {
                self.layout_macro_template(name, cells, ctx)
            }
            MathNode::MacroInstance { name, cells } => self.layout_macro_instance(name, cells, ctx),
        }
    }

    fn layout_char(&self, c: char, ctx: Ctx) -> NodeLayout {
        let font = self.font_info(Self::char_family(c, ctx), ctx.style);
        let dim = self.metrics.char_dim(&font, c);
        NodeLayout::leaf(
            dim,
            vec![LayoutItem::Glyph {
                x: 0,
                y: 0,
                text: c.to_string(),
                font,
                ink: Ink::Text,
            }],
        )
    }

    fn layout_text(&self, text: &str, ink: Ink, ctx: Ctx) -> NodeLayout {
        let font = self.font_info(FontFamily::Roman, ctx.style);
        let dim = self.metrics.string_dim(&font, text);
        NodeLayout::leaf(
            dim,
            vec![LayoutItem::Glyph {
                x: 0,
                y: 0,
                text: text.to_string(),
                font,
                ink,
            }],
        )
    }

    fn layout_symbol(&self, symbol: &SymbolInfo, ctx: Ctx) -> NodeLayout {
        if symbol.class == SymbolClass::Space {
            let em = self.config.font_size(ctx.style);
            let width = ((symbol.space_mu as f32) * em / 18.0).round() as i32;
            return NodeLayout::leaf(Dimension::new(width.max(0), 0, 0), Vec::new());
        }

        let mut font = self.font_info(symbol.family, ctx.style);
        if symbol.class == SymbolClass::LargeOp && ctx.style == MathStyle::Display {
            font.size *= 1.4;
        }
        let glyph_dim = self.metrics.string_dim(&font, symbol.glyph);
        let mut dim = glyph_dim;
        if symbol.class == SymbolClass::LargeOp {
            // center on the math axis
            let axis = self.units(self.config.axis_height, ctx);
            let height = glyph_dim.height();
            dim.ascent = height / 2 + axis;
            dim.descent = (height - dim.ascent).max(0);
        }
        NodeLayout::leaf(
            dim,
            vec![LayoutItem::Glyph {
                x: 0,
                y: glyph_dim.ascent - dim.ascent,
                text: symbol.glyph.to_string(),
                font,
                ink: Ink::Text,
            }],
        )
    }

    fn layout_script(
        &self,
        limits: Limits,
        has_sup: bool,
        has_sub: bool,
        cells: &[MathArray; 3],
        ctx: Ctx,
    ) -> NodeLayout {
        let nucleus = self.layout_cell(&cells[0], ctx);
        let script_ctx = ctx.with_style(ctx.style.script());
        let sup = self.layout_cell(&cells[SUP], script_ctx);
        let sub = self.layout_cell(&cells[SUB], script_ctx);
        let gap = self.units(self.config.script_gap, ctx);
        let stacked = limits.stacked(&cells[0], ctx.style);

        let (nuc_dx, sup_pos, sub_pos, width) = if stacked {
            let lgap = self.units(self.config.limits_gap, ctx);
            let mut width = nucleus.dim.width;
            if has_sup {
                width = width.max(sup.dim.width);
            }
            if has_sub {
                width = width.max(sub.dim.width);
            }
            let sup_pos = (
                (width - sup.dim.width) / 2,
                -(nucleus.dim.ascent + lgap + sup.dim.descent),
            );
            let sub_pos = (
                (width - sub.dim.width) / 2,
                nucleus.dim.descent + lgap + sub.dim.ascent,
            );
            ((width - nucleus.dim.width) / 2, sup_pos, sub_pos, width)
        } else {
            let sx = nucleus.dim.width + gap;
            let mut raise = self
                .units(self.config.sup_shift, ctx)
                .max(nucleus.dim.ascent - sup.dim.ascent / 2);
            let mut drop = self
                .units(self.config.sub_shift, ctx)
                .max(nucleus.dim.descent);
            if has_sup && has_sub {
                let clearance = (raise - sup.dim.descent) - (sub.dim.ascent - drop);
                let min = 2 * gap.max(1);
                if clearance < min {
                    drop += min - clearance;
                }
            }
            if !has_sup {
                raise = 0;
            }
            if !has_sub {
                drop = 0;
            }
            let mut width = sx;
            let mut script_width = 0;
            if has_sup {
                script_width = script_width.max(sup.dim.width);
            }
            if has_sub {
                script_width = script_width.max(sub.dim.width);
            }
            if has_sup || has_sub {
                width += script_width;
            } else {
                width = nucleus.dim.width;
            }
            (0, (sx, -raise), (sx, drop), width)
        };

        let mut dim = Dimension::new(width, nucleus.dim.ascent, nucleus.dim.descent);
        if has_sup {
            dim.ascent = dim.ascent.max(sup.dim.ascent - sup_pos.1);
            dim.descent = dim.descent.max(sup_pos.1 + sup.dim.descent);
        }
        if has_sub {
            dim.descent = dim.descent.max(sub_pos.1 + sub.dim.descent);
            dim.ascent = dim.ascent.max(sub.dim.ascent - sub_pos.1);
        }

        let place = |shown: bool, pos: (i32, i32), layout: CellLayout| {
            if shown {
                PlacedCell::at(pos.0, pos.1, layout)
            } else {
                PlacedCell::hidden(layout)
            }
        };
        let cells = vec![
            PlacedCell::at(nuc_dx, 0, nucleus),
            place(has_sup, sup_pos, sup),
            place(has_sub, sub_pos, sub),
        ];
        NodeLayout::composite(dim, cells, Vec::new())
    }

    fn layout_fraction(&self, style: FracStyle, cells: &[MathArray; 2], ctx: Ctx) -> NodeLayout {
        let inner = ctx.with_style(style.cell_style(ctx.style));
        let num = self.layout_cell(&cells[0], inner);
        let den = self.layout_cell(&cells[1], inner);

        let padding = self.units(self.config.fraction_padding, ctx);
        let gap = self.units(self.config.fraction_gap, ctx);
        let axis = self.units(self.config.axis_height, ctx);
        let rule = if style.has_rule() {
            self.units(self.config.fraction_rule, ctx).max(1)
        } else {
            0
        };
        let fence = if style.has_parens() {
            self.units(self.config.delimiter_width, ctx)
        } else {
            0
        };

        let inner_width = num.dim.width.max(den.dim.width) + 2 * padding;
        let rule_top = -axis - rule / 2;
        let num_dy = rule_top - gap - num.dim.descent;
        let den_dy = rule_top + rule + gap + den.dim.ascent;
        let ascent = num.dim.ascent - num_dy;
        let descent = den_dy + den.dim.descent;

        let mut items = Vec::new();
        if rule > 0 {
            items.push(LayoutItem::Rule {
                x: fence,
                y: rule_top,
                width: inner_width,
                height: rule,
            });
        }
        if fence > 0 {
            for (x, name) in [(0, "("), (fence + inner_width, ")")] {
                items.push(LayoutItem::Deco {
                    x,
                    y: -ascent,
                    width: fence,
                    height: ascent + descent,
                    name: name.to_string(),
                });
            }
        }

        let num_dx = fence + (inner_width - num.dim.width) / 2;
        let den_dx = fence + (inner_width - den.dim.width) / 2;
        NodeLayout::composite(
            Dimension::new(inner_width + 2 * fence, ascent, descent),
            vec![
                PlacedCell::at(num_dx, num_dy, num),
                PlacedCell::at(den_dx, den_dy, den),
            ],
            items,
        )
    }

    fn layout_delimiter(&self, left: &str, right: &str, cell: &MathArray, ctx: Ctx) -> NodeLayout {
        let cell = self.layout_cell(cell, ctx);
        let extra = self.units(self.config.delimiter_extra, ctx);
        let width = self.units(self.config.delimiter_width, ctx);
        let ascent = cell.dim.ascent + extra;
        let descent = cell.dim.descent + extra;
        let side = |name: &str| if name == "." { width / 3 } else { width };
        let lw = side(left);
        let rw = side(right);

        let mut items = Vec::new();
        for (x, w, name) in [(0, lw, left), (lw + cell.dim.width, rw, right)] {
            if name != "." {
                items.push(LayoutItem::Deco {
                    x,
                    y: -ascent,
                    width: w,
                    height: ascent + descent,
                    name: name.to_string(),
                });
            }
        }
        let dim = Dimension::new(lw + cell.dim.width + rw, ascent, descent);
        NodeLayout::composite(dim, vec![PlacedCell::at(lw, 0, cell)], items)
    }

    fn layout_grid(&self, grid: &GridNode, ctx: Ctx) -> NodeLayout {
        let layouts: Vec<CellLayout> = grid
            .cells()
            .iter()
            .map(|cell| self.layout_cell(cell, ctx))
            .collect();
        let cols = grid.cols();
        let rows = grid.nrows();

        let mut col_widths = vec![0; cols];
        let mut row_ascents = vec![0; rows];
        let mut row_descents = vec![0; rows];
        for (idx, layout) in layouts.iter().enumerate() {
            let (r, c) = (idx / cols, idx % cols);
            col_widths[c] = col_widths[c].max(layout.dim.width);
            row_ascents[r] = row_ascents[r].max(layout.dim.ascent);
            row_descents[r] = row_descents[r].max(layout.dim.descent);
        }

        let col_gap = self.units(self.config.column_gap, ctx);
        let row_gap = self.units(self.config.row_gap, ctx);
        let content_width =
            col_widths.iter().sum::<i32>() + col_gap * (cols as i32 - 1).max(0);

        // row baselines measured from the top of the grid
        let mut tops = Vec::with_capacity(rows);
        let mut y = 0;
        for r in 0..rows {
            if r > 0 {
                y += row_descents[r - 1] + row_gap;
            }
            y += row_ascents[r];
            tops.push(y);
        }
        let height = y + row_descents.last().copied().unwrap_or(0);

        let axis = self.units(self.config.axis_height, ctx);
        let ascent = if grid.kind() == GridKind::Hull {
            row_ascents.first().copied().unwrap_or(0)
        } else {
            match grid.v_align() {
                't' => row_ascents.first().copied().unwrap_or(0),
                'b' => tops.last().copied().unwrap_or(0),
                _ => height / 2 + axis,
            }
        };
        let descent = height - ascent;
        let row_baselines: Vec<i32> = tops.iter().map(|top| top - ascent).collect();

        let fence = if grid.kind().fences().is_some() {
            self.units(self.config.delimiter_width, ctx)
        } else {
            0
        };
        let mut col_x = Vec::with_capacity(cols);
        let mut x = fence;
        for width in &col_widths {
            col_x.push(x);
            x += width + col_gap;
        }

        let cells = layouts
            .into_iter()
            .enumerate()
            .map(|(idx, layout)| {
                let (r, c) = (idx / cols, idx % cols);
                let slack = col_widths[c] - layout.dim.width;
                let align = match grid.col_align(c) {
                    'l' => 0,
                    'r' => slack,
                    _ => slack / 2,
                };
                PlacedCell::at(col_x[c] + align, row_baselines[r], layout)
            })
            .collect();

        let mut items = Vec::new();
        let mut dim = Dimension::new(content_width, ascent.max(0), descent.max(0));
        if let Some((left, right)) = grid.kind().fences() {
            let extra = self.units(self.config.delimiter_extra, ctx);
            dim.ascent += extra;
            dim.descent += extra;
            for (x, name) in [(0, left), (fence + content_width, right)] {
                if name != "." {
                    items.push(LayoutItem::Deco {
                        x,
                        y: -dim.ascent,
                        width: fence,
                        height: dim.height(),
                        name: name.to_string(),
                    });
                }
            }
            dim.width += 2 * fence;
        }

        let mut layout = NodeLayout::composite(dim, cells, items);
        layout.grid = Some(GridMetrics {
            col_widths,
            col_gap,
            row_baselines,
            content_width,
        });
        layout
    }

    fn radical(&self, cell: CellLayout, x: i32, ctx: Ctx) -> (Dimension, PlacedCell, Vec<LayoutItem>) {
        let sign = self.units(self.config.radical_width, ctx);
        let gap = self.units(self.config.radical_gap, ctx);
        let rule = self.units(self.config.fraction_rule, ctx).max(1);
        let ascent = cell.dim.ascent + gap + rule;
        let descent = cell.dim.descent;
        let items = vec![
            LayoutItem::Deco {
                x,
                y: -ascent,
                width: sign,
                height: ascent + descent,
                name: "sqrt".to_string(),
            },
            LayoutItem::Rule {
                x: x + sign,
                y: -ascent,
                width: cell.dim.width,
                height: rule,
            },
        ];
        let dim = Dimension::new(x + sign + cell.dim.width, ascent, descent);
        (dim, PlacedCell::at(x + sign, 0, cell), items)
    }

    fn layout_sqrt(&self, cell: &MathArray, ctx: Ctx) -> NodeLayout {
        let cell = self.layout_cell(cell, ctx);
        let (dim, placed, items) = self.radical(cell, 0, ctx);
        NodeLayout::composite(dim, vec![placed], items)
    }

    fn layout_root(&self, cells: &[MathArray; 2], ctx: Ctx) -> NodeLayout {
        let degree_ctx = ctx.with_style(ctx.style.script().script());
        let degree = self.layout_cell(&cells[0], degree_ctx);
        let radicand = self.layout_cell(&cells[1], ctx);
        let sign = self.units(self.config.radical_width, ctx);

        let x = (degree.dim.width - sign / 2).max(0);
        let (mut dim, placed, items) = self.radical(radicand, x, ctx);
        let raise = (dim.height() as f32 * self.config.degree_raise).round() as i32 - dim.descent;
        let degree_dy = -raise - degree.dim.descent;
        dim.ascent = dim.ascent.max(degree.dim.ascent - degree_dy);
        dim.width = dim.width.max(degree.dim.width);
        NodeLayout::composite(dim, vec![PlacedCell::at(0, degree_dy, degree), placed], items)
    }

    fn layout_decoration(&self, kind: DecorationKind, cell: &MathArray, ctx: Ctx) -> NodeLayout {
        let cell = self.layout_cell(cell, ctx);
        let height = self.units(self.config.decoration_height, ctx);
        let gap = self.units(self.config.decoration_gap, ctx);
        let narrow = self.units(0.5, ctx);

        let deco_width = if kind.is_wide() {
            cell.dim.width
        } else {
            cell.dim.width.min(narrow).max(narrow / 2)
        };
        let width = cell.dim.width.max(deco_width);
        let cell_dx = (width - cell.dim.width) / 2;
        let deco_x = (width - deco_width) / 2;

        let mut dim = Dimension::new(width, cell.dim.ascent, cell.dim.descent);
        let deco_y = if kind.is_under() {
            let y = cell.dim.descent + gap;
            dim.descent = y + height;
            y
        } else {
            let y = -(cell.dim.ascent + gap + height);
            dim.ascent = -y;
            y
        };
        let items = vec![LayoutItem::Deco {
            x: deco_x,
            y: deco_y,
            width: deco_width,
            height,
            name: kind.deco_name().to_string(),
        }];
        NodeLayout::composite(dim, vec![PlacedCell::at(cell_dx, 0, cell)], items)
    }

    fn frame_item(layout: &CellLayout, dx: i32, dy: i32) -> LayoutItem {
        LayoutItem::Frame {
            x: dx,
            y: dy - layout.dim.ascent,
            width: layout.dim.width,
            height: layout.dim.height(),
        }
    }

    fn layout_macro_template(&self, name: &str, cells: &[MathArray; 2], ctx: Ctx) -> NodeLayout {
        let font = self.font_info(FontFamily::Roman, ctx.style);
        let label = format!("\\newcommand{{\\{}}}", name);
        let label_dim = self.metrics.string_dim(&font, &label);
        let gap = self.units(self.config.script_gap, ctx).max(1);
        let row_gap = self.units(self.config.row_gap, ctx);

        let body = self.layout_cell(&cells[0], ctx);
        let display = self.layout_cell(&cells[1], ctx);
        let x = label_dim.width + gap;
        let display_dy = body.dim.descent + row_gap + display.dim.ascent;

        let items = vec![
            LayoutItem::Glyph {
                x: 0,
                y: 0,
                text: label,
                font,
                ink: Ink::Macro,
            },
            Self::frame_item(&body, x, 0),
            Self::frame_item(&display, x, display_dy),
        ];
        let dim = Dimension::new(
            x + body.dim.width.max(display.dim.width),
            body.dim.ascent.max(label_dim.ascent),
            display_dy + display.dim.descent,
        );
        NodeLayout::composite(
            dim,
            vec![PlacedCell::at(x, 0, body), PlacedCell::at(x, display_dy, display)],
            items,
        )
    }

    fn layout_macro_instance(&self, name: &str, args: &[MathArray], ctx: Ctx) -> NodeLayout {
        let template = self
            .macros
            .filter(|_| ctx.macro_depth < MAX_MACRO_DEPTH)
            .and_then(|table| table.get(name));

        if let Some(data) = template {
            let expansion = data.expand(args);
            let inner = Ctx {
                macro_depth: ctx.macro_depth + 1,
                ..ctx
            };
            let view = self.layout_cell(&expansion, inner);
            let cells = args
                .iter()
                .map(|arg| PlacedCell::hidden(self.layout_cell(arg, ctx)))
                .collect();
            let mut layout = NodeLayout::composite(view.dim, cells, Vec::new());
            layout.views.push(PlacedCell::at(0, 0, view));
            return layout;
        }

        let font = self.font_info(FontFamily::Roman, ctx.style);
        let label = format!("\\{}", name);
        let label_dim = self.metrics.string_dim(&font, &label);
        let gap = self.units(self.config.script_gap, ctx).max(1);
        let mut items = vec![LayoutItem::Glyph {
            x: 0,
            y: 0,
            text: label,
            font,
            ink: Ink::Macro,
        }];
        let mut dim = label_dim;
        let mut cells = Vec::with_capacity(args.len());
        for arg in args {
            let layout = self.layout_cell(arg, ctx);
            let x = dim.width + gap;
            items.push(Self::frame_item(&layout, x, 0));
            dim.append(&Dimension::new(gap + layout.dim.width, layout.dim.ascent, layout.dim.descent));
            cells.push(PlacedCell::at(x, 0, layout));
        }
        NodeLayout::composite(dim, cells, items)
    }
}
