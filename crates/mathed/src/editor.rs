//! Editing session over one formula
//!
//! A [`MathEditor`] owns the formula tree together with its cursor, macro
//! table and cached layout. Every edit funnels through `touch`, which drops
//! the layout and the hit cache, so the next draw always runs the metrics
//! pass first.

use crate::array::MathArray;
use crate::config::MathConfig;
use crate::cursor::{resolve_cell, resolve_cell_mut, resolve_container, Container, Cursor, CursorGeometry, CursorSlice};
use crate::error::MathResult;
use crate::font::{Dimension, FixedFontMetrics, FontMetrics};
use crate::formula::{Formula, HullType};
use crate::grid::{GridKind, GridNode};
use crate::layout::{FormulaLayout, LayoutEngine, Point};
use crate::macros::MacroTable;
use crate::model::{MathNode, RADICAND, SUB, SUP};
use crate::parser::{parse_formula_with_macros, parse_with_macros};
use crate::render::{HitCache, Painter, Renderer};
use crate::symbols::{lookup_keyword, Keyword};
use crate::writer::{formula_to_mathml, to_latex, write_formula, Target};
use tracing::{debug, trace};

// =============================================================================
// Clipboard
// =============================================================================

/// Clipboard contents, kept in the persisted LaTeX form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Clipboard {
    text: Option<String>,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn set(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    pub fn clear(&mut self) {
        self.text = None;
    }

    pub fn is_empty(&self) -> bool {
        self.text.as_deref().map_or(true, str::is_empty)
    }
}

// =============================================================================
// Editor
// =============================================================================

/// One open formula with its cursor
pub struct MathEditor {
    formula: Formula,
    cursor: Cursor,
    macros: MacroTable,
    config: MathConfig,
    metrics: Box<dyn FontMetrics>,
    /// Result of the last metrics pass; `None` after any edit
    layout: Option<FormulaLayout>,
    /// Cell boxes recorded by the last draw
    hits: HitCache,
    modified: bool,
}

impl std::fmt::Debug for MathEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MathEditor")
            .field("formula", &self.formula)
            .field("cursor", &self.cursor)
            .field("modified", &self.modified)
            .finish_non_exhaustive()
    }
}

impl Default for MathEditor {
    fn default() -> Self {
        Self::empty()
    }
}

impl MathEditor {
    /// Open `formula`, picking up the macro templates it defines
    pub fn new(formula: Formula) -> Self {
        let mut macros = MacroTable::new();
        for cell in formula.grid().cells() {
            macros.collect_from(cell);
        }
        Self {
            formula,
            cursor: Cursor::new(),
            macros,
            config: MathConfig::default(),
            metrics: Box::new(FixedFontMetrics::new()),
            layout: None,
            hits: HitCache::new(),
            modified: false,
        }
    }

    /// Empty inline formula
    pub fn empty() -> Self {
        Self::new(Formula::default())
    }

    /// Open a formula from its persisted LaTeX form
    pub fn from_latex(text: &str) -> Self {
        let mut macros = MacroTable::new();
        let formula = parse_formula_with_macros(text, &mut macros);
        let mut editor = Self::new(formula);
        editor.macros = macros;
        editor
    }

    pub fn with_config(mut self, config: MathConfig) -> Self {
        self.set_config(config);
        self
    }

    /// Replace the font metrics provider used by the metrics pass
    pub fn with_metrics(mut self, metrics: Box<dyn FontMetrics>) -> Self {
        self.metrics = metrics;
        self.invalidate();
        self
    }

    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    /// Replace the whole formula; the cursor goes back to the start
    pub fn set_formula(&mut self, formula: Formula) {
        *self = Self {
            config: std::mem::take(&mut self.config),
            metrics: std::mem::replace(&mut self.metrics, Box::new(FixedFontMetrics::new())),
            ..Self::new(formula)
        };
        self.modified = true;
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn macros(&self) -> &MacroTable {
        &self.macros
    }

    pub fn config(&self) -> &MathConfig {
        &self.config
    }

    /// Change layout or colors; the formula itself is untouched
    pub fn set_config(&mut self, config: MathConfig) {
        self.config = config;
        self.invalidate();
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn mark_saved(&mut self) {
        self.modified = false;
    }

    /// Change the hull type, keeping the content
    pub fn set_hull(&mut self, hull: HullType) {
        if hull == self.formula.hull() {
            return;
        }
        self.formula.mutate(hull);
        self.touch();
    }

    /// Record an edit: clamp the cursor and drop everything derived from the
    /// old tree
    fn touch(&mut self) {
        self.cursor.normalize(self.formula.grid());
        self.invalidate();
        self.modified = true;
    }

    fn invalidate(&mut self) {
        self.layout = None;
        self.hits.clear();
    }

    // =========================================================================
    // Metrics and drawing
    // =========================================================================

    /// Current layout, running the metrics pass if the tree changed
    pub fn layout(&mut self) -> &FormulaLayout {
        let Self {
            layout,
            formula,
            macros,
            config,
            metrics,
            ..
        } = self;
        layout.get_or_insert_with(|| {
            trace!("running metrics pass");
            LayoutEngine::new(&**metrics, &config.layout)
                .with_macros(macros)
                .layout_formula(formula)
        })
    }

    /// Size of the whole formula
    pub fn dim(&mut self) -> Dimension {
        self.layout().dim()
    }

    /// Paint the formula with its left baseline point at `origin`
    ///
    /// Paints the selection highlight, or the caret when nothing is
    /// selected, and records the hit cache used by
    /// [`set_position_from_point`](Self::set_position_from_point).
    pub fn draw(&mut self, painter: &mut dyn Painter, origin: Point) {
        self.layout();
        let Some(layout) = self.layout.as_ref() else {
            return;
        };
        let renderer = Renderer::from_math_config(&self.config);
        let selection = self.cursor.selection().filter(|range| !range.is_empty());
        self.hits = renderer.draw(layout, origin, selection.as_ref(), painter);
        if selection.is_none() {
            renderer.draw_cursor(layout, origin, self.cursor.frames(), painter);
        }
    }

    pub fn hits(&self) -> &HitCache {
        &self.hits
    }

    /// Put the cursor at the cell position closest to (`x`, `y`)
    ///
    /// Uses the cells recorded by the last [`draw`](Self::draw); returns false
    /// when nothing has been drawn since the last edit.
    pub fn set_position_from_point(&mut self, x: i32, y: i32) -> bool {
        let Some(frames) = self.hits.position_at(x, y) else {
            return false;
        };
        self.cursor = Cursor::at(self.formula.grid(), frames);
        true
    }

    /// Extend the selection to the cell position closest to (`x`, `y`)
    pub fn select_to_point(&mut self, x: i32, y: i32) -> bool {
        let Some(frames) = self.hits.position_at(x, y) else {
            return false;
        };
        self.cursor.cancel_macro_name();
        self.cursor.start_selection();
        self.cursor.set_frames(frames);
        self.cursor.normalize(self.formula.grid());
        true
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn move_left(&mut self, select: bool) -> bool {
        self.cursor.left(self.formula.grid(), select)
    }

    pub fn move_right(&mut self, select: bool) -> bool {
        self.cursor.right(self.formula.grid(), select)
    }

    pub fn move_up(&mut self, select: bool) -> bool {
        self.layout();
        let geometry = self.layout.as_ref().map(|l| l as &dyn CursorGeometry);
        self.cursor.up(self.formula.grid(), select, geometry)
    }

    pub fn move_down(&mut self, select: bool) -> bool {
        self.layout();
        let geometry = self.layout.as_ref().map(|l| l as &dyn CursorGeometry);
        self.cursor.down(self.formula.grid(), select, geometry)
    }

    pub fn home(&mut self, select: bool) -> bool {
        self.cursor.home(self.formula.grid(), select)
    }

    pub fn end(&mut self, select: bool) -> bool {
        self.cursor.end(self.formula.grid(), select)
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Select the whole hull cell the cursor is in
    pub fn select_all(&mut self) {
        self.cursor.cancel_macro_name();
        self.cursor.normalize(self.formula.grid());
        let idx = self.cursor.frames()[0].idx;
        let len = self.formula.grid().cells().get(idx).map_or(0, MathArray::len);
        self.cursor.set_frames(vec![CursorSlice::new(idx, len)]);
        self.cursor.set_anchor(vec![CursorSlice::new(idx, 0)]);
    }

    pub fn clear_selection(&mut self) {
        self.cursor.clear_selection();
    }

    /// Copy of the selected nodes
    pub fn selected(&self) -> Option<MathArray> {
        let range = self.cursor.selection()?;
        if range.is_empty() {
            return None;
        }
        resolve_cell(self.formula.grid(), &range.path).map(|cell| cell.slice(range.from, range.to))
    }

    /// Remove the selected nodes, leaving the point where they were
    fn erase_selection(&mut self) -> Option<MathArray> {
        let range = self.cursor.selection();
        self.cursor.clear_selection();
        let range = range?;
        let mut frames = range.path;
        if let Some(last) = frames.last_mut() {
            last.pos = range.from;
        }
        let erased = if range.from < range.to {
            let cell = resolve_cell_mut(self.formula.grid_mut(), &frames)?;
            Some(cell.erase(range.from, range.to))
        } else {
            None
        };
        self.cursor.set_frames(frames);
        if erased.is_some() {
            trace!("erased selection {}..{}", range.from, range.to);
            self.touch();
        }
        erased
    }

    // =========================================================================
    // Clipboard
    // =========================================================================

    /// Put the selection on `clipboard` as LaTeX
    pub fn copy(&self, clipboard: &mut Clipboard) -> bool {
        match self.selected() {
            Some(selected) => {
                clipboard.set(to_latex(&selected));
                true
            }
            None => false,
        }
    }

    pub fn cut(&mut self, clipboard: &mut Clipboard) -> bool {
        if !self.copy(clipboard) {
            return false;
        }
        self.erase_selection();
        self.unwrap_if_empty();
        true
    }

    /// Parse the clipboard text and insert it at the point, replacing the
    /// selection
    pub fn paste(&mut self, clipboard: &Clipboard) -> bool {
        let Some(text) = clipboard.text() else {
            return false;
        };
        let array = parse_with_macros(text, &mut self.macros);
        self.cursor.cancel_macro_name();
        self.erase_selection();
        debug!("pasting {} nodes", array.len());
        self.insert_array_at_point(array)
    }

    // =========================================================================
    // Insertion
    // =========================================================================

    /// Insert `node` at the point, replacing the selection
    pub fn insert(&mut self, node: MathNode) -> bool {
        self.cursor.cancel_macro_name();
        self.erase_selection();
        if matches!(node, MathNode::MacroTemplate { .. }) {
            self.macros.define(&node);
        }
        self.insert_at_point(node)
    }

    /// Insert `array` at the point, replacing the selection
    pub fn insert_array(&mut self, array: MathArray) -> bool {
        self.cursor.cancel_macro_name();
        self.erase_selection();
        self.macros.collect_from(&array);
        self.insert_array_at_point(array)
    }

    fn insert_at_point(&mut self, node: MathNode) -> bool {
        self.insert_array_at_point(MathArray::from_nodes(vec![node]))
    }

    fn insert_array_at_point(&mut self, array: MathArray) -> bool {
        self.cursor.normalize(self.formula.grid());
        let pos = self.cursor.pos();
        let Some(cell) = resolve_cell_mut(self.formula.grid_mut(), self.cursor.frames()) else {
            return false;
        };
        let count = cell.insert_array(pos, array);
        self.cursor.set_pos(pos + count);
        self.touch();
        true
    }

    /// Insert the construct called `name`, wrapping the selection into its
    /// first cell and moving into that cell
    ///
    /// `name` may be a construct keyword (`frac`, `sqrt`, `mathbf`, `hat`,
    /// `left`), `root`, a matrix environment, a defined macro or a symbol.
    /// Returns false for names that are none of these.
    pub fn insert_construct(&mut self, name: &str) -> bool {
        let Some((mut node, entry)) = self.build_construct(name) else {
            return false;
        };
        self.cursor.cancel_macro_name();
        let content = self.erase_selection().unwrap_or_default();
        let Some(entry) = entry else {
            return self.insert_at_point(node);
        };
        let offset = content.len();
        if let Some(cell) = node.cell_mut(entry) {
            cell.append(content);
        }
        let pos = self.cursor.pos();
        if !self.insert_at_point(node) {
            return false;
        }
        self.cursor.set_pos(pos);
        self.cursor.push(entry, offset);
        true
    }

    /// Fresh node for `name` and the cell the cursor enters
    fn build_construct(&self, name: &str) -> Option<(MathNode, Option<usize>)> {
        if let Some(data) = self.macros.get(name) {
            let entry = (data.arity > 0).then_some(0);
            return Some((MathNode::macro_instance(name, data.arity), entry));
        }
        if let Some(kind) = GridKind::from_env(name) {
            return Some((MathNode::Grid(GridNode::new(kind, 1, 1)), Some(0)));
        }
        if name == "root" {
            let node = MathNode::root(MathArray::new(), MathArray::new());
            return Some((node, Some(RADICAND)));
        }
        let empty = MathArray::new();
        let built = match lookup_keyword(name)? {
            Keyword::Symbol(symbol) => (MathNode::Symbol(symbol), None),
            Keyword::Fraction(style) | Keyword::InfixFraction(style) => {
                (MathNode::fraction_styled(style, empty.clone(), empty), Some(0))
            }
            Keyword::Sqrt => (MathNode::sqrt(empty), Some(0)),
            Keyword::Font(font) => (MathNode::font(font, empty), Some(0)),
            Keyword::OldFont(font) => (
                MathNode::Font {
                    font,
                    old_style: true,
                    cell: empty,
                },
                Some(0),
            ),
            Keyword::Decoration(kind) => (MathNode::decoration(kind, empty), Some(0)),
            Keyword::Left => (MathNode::delimiter("(", ")", empty), Some(0)),
            _ => return None,
        };
        Some(built)
    }

    /// Attach or enter a superscript (`sup`) or subscript on the node before
    /// the point
    fn add_script(&mut self, sup: bool) -> bool {
        let slot = if sup { SUP } else { SUB };
        let script = |nucleus: MathArray| {
            if sup {
                MathNode::script(nucleus, Some(MathArray::new()), None)
            } else {
                MathNode::script(nucleus, None, Some(MathArray::new()))
            }
        };

        if self.cursor.has_selection() {
            let nucleus = self.erase_selection().unwrap_or_default();
            let pos = self.cursor.pos();
            if !self.insert_at_point(script(nucleus)) {
                return false;
            }
            self.cursor.set_pos(pos);
            self.cursor.push(slot, 0);
            return true;
        }

        self.cursor.normalize(self.formula.grid());
        let pos = self.cursor.pos();
        let Some(cell) = resolve_cell_mut(self.formula.grid_mut(), self.cursor.frames()) else {
            return false;
        };
        let prev_is_script = pos > 0 && matches!(cell.get(pos - 1), Some(MathNode::Script { .. }));
        let (at, entry) = if prev_is_script {
            let Some(MathNode::Script {
                has_sup,
                has_sub,
                cells,
                ..
            }) = cell.get_mut(pos - 1)
            else {
                return false;
            };
            let shown = if sup { has_sup } else { has_sub };
            let entry = if *shown { cells[slot].len() } else { 0 };
            *shown = true;
            (pos - 1, entry)
        } else if pos > 0 {
            let nucleus: MathArray = cell.remove(pos - 1).into_iter().collect();
            cell.insert(pos - 1, script(nucleus));
            (pos - 1, 0)
        } else {
            cell.insert(0, script(MathArray::new()));
            (0, 0)
        };
        self.cursor.set_pos(at);
        self.cursor.push(slot, entry);
        self.touch();
        true
    }

    // =========================================================================
    // Typing
    // =========================================================================

    /// Handle one typed character
    ///
    /// `\` starts a macro name; letters extend it and any other character
    /// resolves it and is then handled itself, except a space, which only
    /// terminates the name. `^` and `_` open scripts, `/` turns a selection
    /// into a numerator and everything else is inserted as a character.
    pub fn interpret(&mut self, c: char) -> bool {
        if let Some(name) = self.cursor.macro_name() {
            if c.is_ascii_alphabetic() {
                self.cursor.push_macro_char(c);
                return true;
            }
            if name.is_empty() {
                // control symbol: `\,` `\{` `\ `
                self.cursor.cancel_macro_name();
                return self.resolve_macro_name(&c.to_string());
            }
            let name = self.cursor.take_macro_name().unwrap_or_default();
            self.resolve_macro_name(&name);
            if c == ' ' {
                return true;
            }
        }

        match c {
            '\\' => {
                self.cursor.start_macro_name();
                true
            }
            '^' => self.add_script(true),
            '_' => self.add_script(false),
            '/' if self.cursor.has_selection() => {
                if !self.insert_construct("frac") {
                    return false;
                }
                self.move_down(false);
                true
            }
            c => self.insert(MathNode::Char(c)),
        }
    }

    /// Feed every character of `text` through [`interpret`](Self::interpret)
    pub fn type_text(&mut self, text: &str) {
        for c in text.chars() {
            self.interpret(c);
        }
    }

    /// Finish a pending macro name, if any
    pub fn commit_macro_name(&mut self) -> bool {
        match self.cursor.take_macro_name() {
            Some(name) if !name.is_empty() => self.resolve_macro_name(&name),
            _ => false,
        }
    }

    fn resolve_macro_name(&mut self, name: &str) -> bool {
        debug!("resolving typed name \\{}", name);
        if self.insert_construct(name) {
            return true;
        }
        self.insert(MathNode::unknown(format!("\\{}", name)))
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    /// Delete the node before the point
    ///
    /// At the start of a cell the owning node is unwrapped instead: it is
    /// replaced by the content of its shown cells.
    pub fn backspace(&mut self) -> bool {
        if let Some(mut name) = self.cursor.take_macro_name() {
            if name.pop().is_some() {
                self.cursor.start_macro_name();
                for c in name.chars() {
                    self.cursor.push_macro_char(c);
                }
            }
            return true;
        }
        if self.cursor.has_selection() {
            return self.delete_selection();
        }
        self.cursor.normalize(self.formula.grid());
        let pos = self.cursor.pos();
        if pos > 0 {
            self.remove_at(pos - 1);
            self.cursor.set_pos(pos - 1);
            self.touch();
            self.unwrap_if_empty();
            return true;
        }
        self.pull_out()
    }

    /// Delete the node after the point
    pub fn delete(&mut self) -> bool {
        self.cursor.cancel_macro_name();
        if self.cursor.has_selection() {
            return self.delete_selection();
        }
        self.cursor.normalize(self.formula.grid());
        let pos = self.cursor.pos();
        let len = self.cursor.cell(self.formula.grid()).map_or(0, MathArray::len);
        if pos < len {
            self.remove_at(pos);
            self.touch();
            self.unwrap_if_empty();
            return true;
        }
        self.unwrap_if_empty()
    }

    fn delete_selection(&mut self) -> bool {
        if self.erase_selection().is_none() {
            return false;
        }
        self.unwrap_if_empty();
        true
    }

    fn remove_at(&mut self, pos: usize) -> Option<MathNode> {
        resolve_cell_mut(self.formula.grid_mut(), self.cursor.frames())?.remove(pos)
    }

    /// Whether every shown cell of the node owning the point is empty
    fn container_is_empty(&self) -> bool {
        match self.cursor.container(self.formula.grid()) {
            Some(Container::Node(node)) => node
                .cells()
                .iter()
                .enumerate()
                .all(|(idx, cell)| !node.is_active_cell(idx) || cell.is_empty()),
            _ => false,
        }
    }

    /// Position of the point within the content the owning node unwraps to
    fn content_offset(&self) -> usize {
        let idx = self.cursor.idx();
        let before = match self.cursor.container(self.formula.grid()) {
            Some(Container::Node(node)) => node
                .cells()
                .iter()
                .enumerate()
                .take(idx)
                .filter(|(i, _)| node.is_active_cell(*i))
                .map(|(_, cell)| cell.len())
                .sum(),
            _ => 0,
        };
        before + self.cursor.pos()
    }

    /// Remove the node owning the point if nothing is left in it
    ///
    /// The emptied node is deleted outright: the parent cell ends up one node
    /// shorter and the point sits where the node was.
    fn unwrap_if_empty(&mut self) -> bool {
        if self.cursor.depth() > 1 && self.container_is_empty() {
            self.unwrap_container(0)
        } else {
            false
        }
    }

    /// Backspace at the start of a cell: splices the content of the owning
    /// node into the parent cell (grids excepted)
    fn pull_out(&mut self) -> bool {
        if self.cursor.depth() < 2 {
            return false;
        }
        if self.container_is_empty() {
            return self.unwrap_container(0);
        }
        match self.cursor.container(self.formula.grid()) {
            Some(Container::Node(MathNode::Grid(_))) | None => false,
            Some(_) => {
                let offset = self.content_offset();
                self.unwrap_container(offset)
            }
        }
    }

    /// Replace the node owning the point by its content, leaving the point
    /// `offset` nodes into that content
    ///
    /// The parent cell changes length by the content length minus one, so an
    /// empty node shrinks it by one and a single-node content keeps it.
    fn unwrap_container(&mut self, offset: usize) -> bool {
        let depth = self.cursor.depth();
        if depth < 2 {
            return false;
        }
        let parent = self.cursor.frames()[..depth - 1].to_vec();
        let pos = parent[depth - 2].pos;
        let Some(cell) = resolve_cell_mut(self.formula.grid_mut(), &parent) else {
            return false;
        };
        let Some(node) = cell.remove(pos) else {
            return false;
        };
        debug!("unwrapping {} at {}", node.kind_name(), pos);
        cell.insert_array(pos, node.into_content());
        self.cursor.set_frames(parent);
        self.cursor.set_pos(pos + offset);
        self.touch();
        true
    }

    // =========================================================================
    // Grid editing
    // =========================================================================

    /// Frame level whose cell belongs to the innermost grid around the point
    fn grid_level(&self) -> usize {
        let frames = self.cursor.frames();
        let root = self.formula.grid();
        (1..frames.len())
            .rev()
            .find(|&level| {
                matches!(
                    resolve_container(root, &frames[..=level]),
                    Some(Container::Node(MathNode::Grid(_)))
                )
            })
            .unwrap_or(0)
    }

    fn grid_mut_at(&mut self, level: usize) -> Option<&mut GridNode> {
        if level == 0 {
            return Some(self.formula.grid_mut());
        }
        let frames = &self.cursor.frames()[..level];
        let pos = frames[level - 1].pos;
        match resolve_cell_mut(self.formula.grid_mut(), frames)?.get_mut(pos)? {
            MathNode::Grid(grid) => Some(grid),
            _ => None,
        }
    }

    /// Move into cell `idx` of the grid at `level`
    fn enter_grid_cell(&mut self, level: usize, idx: usize) {
        let mut frames = self.cursor.frames()[..=level].to_vec();
        frames[level] = CursorSlice::new(idx, 0);
        self.cursor.clear_selection();
        self.cursor.set_frames(frames);
        self.touch();
    }

    /// Add a row below the cursor's row and move into it
    pub fn add_row(&mut self) -> bool {
        self.cursor.normalize(self.formula.grid());
        let level = self.grid_level();
        let hull = self.formula.hull();
        if level == 0 && !hull.is_multi_row() {
            debug!("{:?} hull has a single row", hull);
            return false;
        }
        let idx = self.cursor.frames()[level].idx;
        let Some(grid) = self.grid_mut_at(level) else {
            return false;
        };
        let (row, col) = (grid.row_of(idx), grid.col_of(idx));
        grid.add_row(row);
        if level == 0 {
            grid.set_numbered(row + 1, hull.is_numbered_by_default());
        }
        let target = grid.index(row + 1, col);
        self.enter_grid_cell(level, target);
        true
    }

    /// Delete the cursor's row; the last row cannot be deleted
    pub fn delete_row(&mut self) -> bool {
        self.cursor.normalize(self.formula.grid());
        let level = self.grid_level();
        let idx = self.cursor.frames()[level].idx;
        let Some(grid) = self.grid_mut_at(level) else {
            return false;
        };
        let (row, col) = (grid.row_of(idx), grid.col_of(idx));
        if !grid.delete_row(row) {
            return false;
        }
        let target = grid.index(row.min(grid.nrows() - 1), col);
        self.enter_grid_cell(level, target);
        true
    }

    /// Add a column right of the cursor's column and move into it
    pub fn add_column(&mut self) -> bool {
        self.cursor.normalize(self.formula.grid());
        let level = self.grid_level();
        if level == 0 {
            debug!("hull columns are fixed by the hull type");
            return false;
        }
        let idx = self.cursor.frames()[level].idx;
        let Some(grid) = self.grid_mut_at(level) else {
            return false;
        };
        let (row, col) = (grid.row_of(idx), grid.col_of(idx));
        grid.add_column(col);
        let target = grid.index(row, col + 1);
        self.enter_grid_cell(level, target);
        true
    }

    /// Delete the cursor's column; the last column cannot be deleted
    pub fn delete_column(&mut self) -> bool {
        self.cursor.normalize(self.formula.grid());
        let level = self.grid_level();
        if level == 0 {
            debug!("hull columns are fixed by the hull type");
            return false;
        }
        let idx = self.cursor.frames()[level].idx;
        let Some(grid) = self.grid_mut_at(level) else {
            return false;
        };
        let (row, col) = (grid.row_of(idx), grid.col_of(idx));
        if !grid.delete_column(col) {
            return false;
        }
        let target = grid.index(row, col.min(grid.cols() - 1));
        self.enter_grid_cell(level, target);
        true
    }

    // =========================================================================
    // Output
    // =========================================================================

    /// Persisted LaTeX form including the hull wrapper
    pub fn latex(&self) -> String {
        write_formula(&self.formula)
    }

    /// Serialize the formula for `target`
    ///
    /// LaTeX and MathML keep the hull; the other targets write one line per
    /// hull row.
    pub fn write(&self, target: Target) -> MathResult<String> {
        match target {
            Target::Latex => Ok(self.latex()),
            Target::MathMl => formula_to_mathml(&self.formula),
            target => {
                let grid = self.formula.grid();
                let mut lines = Vec::with_capacity(grid.nrows());
                for row in 0..grid.nrows() {
                    let mut line = String::new();
                    for cell in grid.row_cells(row) {
                        line.push_str(&target.write(cell)?);
                    }
                    lines.push(line);
                }
                Ok(lines.join("\n"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FracStyle, NUCLEUS};
    use crate::parser::parse_formula;
    use crate::render::RecordingPainter;
    use pretty_assertions::assert_eq;

    fn cell_latex(editor: &MathEditor) -> String {
        to_latex(editor.formula().cell())
    }

    #[test]
    fn test_typing_plain_characters() {
        let mut editor = MathEditor::empty();
        editor.type_text("a+b");
        assert_eq!(cell_latex(&editor), "a+b");
        assert_eq!(editor.cursor().pos(), 3);
        assert!(editor.is_modified());
    }

    #[test]
    fn test_typing_macro_name_resolves_symbol() {
        let mut editor = MathEditor::empty();
        editor.type_text("\\alpha x");
        assert_eq!(cell_latex(&editor), "\\alpha x");
        assert_eq!(editor.formula().cell().len(), 2);
    }

    #[test]
    fn test_typing_macro_name_terminated_by_other_char() {
        let mut editor = MathEditor::empty();
        editor.type_text("\\pi+1");
        let nodes = editor.formula().cell().nodes();
        assert_eq!(nodes.len(), 3);
        assert!(matches!(nodes[0], MathNode::Symbol(s) if s.name() == "pi"));
        assert_eq!(nodes[1], MathNode::Char('+'));
    }

    #[test]
    fn test_typing_unknown_macro_name() {
        let mut editor = MathEditor::empty();
        editor.type_text("\\bogus ");
        assert_eq!(editor.formula().cell().nodes(), &[MathNode::unknown("\\bogus")]);
    }

    #[test]
    fn test_typed_unknown_command_before_script_persists() {
        let mut editor = MathEditor::empty();
        editor.type_text("\\bogus x^2");
        assert_eq!(editor.formula().cell().len(), 2);
        assert_eq!(editor.latex(), "$\\bogus x^{2}$");
        assert_eq!(parse_formula(&editor.latex()), *editor.formula());
    }

    #[test]
    fn test_typing_construct_enters_it() {
        let mut editor = MathEditor::empty();
        editor.type_text("\\sqrt x");
        assert_eq!(cell_latex(&editor), "\\sqrt{x}");
        assert_eq!(editor.cursor().depth(), 2);
    }

    #[test]
    fn test_backspace_in_macro_name() {
        let mut editor = MathEditor::empty();
        editor.type_text("\\alpx");
        editor.backspace();
        assert_eq!(editor.cursor().macro_name(), Some("alp"));
        editor.type_text("ha ");
        assert_eq!(cell_latex(&editor), "\\alpha");
        assert_eq!(editor.cursor().macro_name(), None);
    }

    #[test]
    fn test_superscript_wraps_previous_node() {
        let mut editor = MathEditor::empty();
        editor.type_text("x^2");
        assert_eq!(cell_latex(&editor), "x^{2}");
        assert_eq!(editor.cursor().depth(), 2);
        assert_eq!(editor.cursor().idx(), SUP);

        editor.move_right(false);
        editor.type_text("_i");
        assert_eq!(cell_latex(&editor), "x_{i}^{2}");
        assert_eq!(editor.formula().cell().len(), 1);
    }

    #[test]
    fn test_script_at_start_has_empty_nucleus() {
        let mut editor = MathEditor::empty();
        editor.interpret('_');
        let node = &editor.formula().cell().nodes()[0];
        assert!(node.cell(NUCLEUS).is_some_and(MathArray::is_empty));
        assert!(node.is_active_cell(SUB));
    }

    #[test]
    fn test_slash_wraps_selection_into_numerator() {
        let mut editor = MathEditor::empty();
        editor.type_text("ab");
        editor.select_all();
        editor.interpret('/');
        editor.interpret('c');
        assert_eq!(cell_latex(&editor), "\\frac{ab}{c}");
    }

    #[test]
    fn test_slash_without_selection_is_a_char() {
        let mut editor = MathEditor::empty();
        editor.type_text("a/b");
        assert_eq!(cell_latex(&editor), "a/b");
    }

    #[test]
    fn test_insert_construct_wraps_selection() {
        let mut editor = MathEditor::empty();
        editor.type_text("xy");
        editor.select_all();
        assert!(editor.insert_construct("mathbf"));
        assert_eq!(cell_latex(&editor), "\\mathbf{xy}");
        assert_eq!(editor.cursor().depth(), 2);
        assert_eq!(editor.cursor().pos(), 2);
        assert!(!editor.insert_construct("nosuchthing"));
    }

    #[test]
    fn test_insert_root_enters_radicand() {
        let mut editor = MathEditor::empty();
        editor.insert_construct("root");
        editor.interpret('x');
        assert_eq!(cell_latex(&editor), "\\sqrt[]{x}");
        assert_eq!(editor.cursor().idx(), RADICAND);
    }

    #[test]
    fn test_backspace_deletes_previous_node() {
        let mut editor = MathEditor::from_latex("$abc$");
        editor.end(false);
        assert!(editor.backspace());
        assert_eq!(cell_latex(&editor), "ab");
        editor.home(false);
        assert!(!editor.backspace());
    }

    #[test]
    fn test_backspace_unwraps_emptied_font() {
        let mut editor = MathEditor::from_latex("$a\\mathbf{x}b$");
        editor.move_right(false);
        editor.move_right(false);
        editor.move_right(false);
        assert_eq!(editor.cursor().depth(), 2);
        assert_eq!(editor.formula().cell().len(), 3);
        editor.backspace();
        assert_eq!(cell_latex(&editor), "ab");
        assert_eq!(editor.formula().cell().len(), 2);
        assert_eq!(editor.cursor().depth(), 1);
        assert_eq!(editor.cursor().pos(), 1);
    }

    #[test]
    fn test_backspace_at_cell_start_pulls_content() {
        let mut editor = MathEditor::from_latex("$\\frac{a}{b}$");
        editor.move_right(false);
        editor.move_down(false);
        editor.home(false);
        assert_eq!(editor.cursor().idx(), 1);
        editor.backspace();
        assert_eq!(cell_latex(&editor), "ab");
        assert_eq!(editor.cursor().pos(), 1);
    }

    #[test]
    fn test_delete_selected_numerator_unwraps_fraction() {
        let mut editor = MathEditor::new(Formula::from_cell(
            HullType::Simple,
            MathArray::from_nodes(vec![MathNode::fraction(
                MathArray::from_chars("a"),
                MathArray::new(),
            )]),
        ));
        editor.move_right(false);
        editor.move_right(true);
        assert!(editor.selected().is_some());
        assert!(editor.delete());
        assert!(editor.formula().cell().is_empty());
        assert_eq!(editor.cursor().frames(), &[CursorSlice::new(0, 0)]);
    }

    #[test]
    fn test_delete_keeps_fraction_with_content() {
        let mut editor = MathEditor::from_latex("$\\frac{a}{b}$");
        editor.move_right(false);
        editor.delete();
        assert_eq!(cell_latex(&editor), "\\frac{}{b}");
        assert_eq!(editor.cursor().depth(), 2);
    }

    #[test]
    fn test_copy_cut_paste_through_latex() {
        let mut editor = MathEditor::from_latex("$x+\\frac{1}{2}$");
        let mut clipboard = Clipboard::new();
        assert!(!editor.copy(&mut clipboard));

        editor.select_all();
        assert!(editor.copy(&mut clipboard));
        assert_eq!(clipboard.text(), Some("x+\\frac{1}{2}"));

        assert!(editor.cut(&mut clipboard));
        assert!(editor.formula().cell().is_empty());

        editor.paste(&clipboard);
        editor.paste(&clipboard);
        assert_eq!(cell_latex(&editor), "x+\\frac{1}{2}x+\\frac{1}{2}");
    }

    #[test]
    fn test_paste_defines_macros() {
        let mut editor = MathEditor::empty();
        let mut clipboard = Clipboard::new();
        clipboard.set("\\newcommand{\\twice}[1]{#1#1}");
        editor.paste(&clipboard);
        assert!(editor.macros().contains("twice"));
        editor.type_text("\\twice y");
        assert_eq!(editor.cursor().depth(), 2);
    }

    #[test]
    fn test_matrix_rows_and_columns() {
        let mut editor = MathEditor::empty();
        editor.insert_construct("pmatrix");
        assert!(editor.add_row());
        assert!(editor.add_column());
        let MathNode::Grid(grid) = &editor.formula().cell().nodes()[0] else {
            panic!("expected a grid");
        };
        assert_eq!((grid.nrows(), grid.cols()), (2, 2));
        assert!(grid.is_consistent());
        assert_eq!(editor.cursor().idx(), grid.index(1, 1));

        assert!(editor.delete_row());
        assert!(editor.delete_column());
        assert!(!editor.delete_row());
        assert!(!editor.delete_column());
    }

    #[test]
    fn test_hull_rows() {
        let mut editor = MathEditor::from_latex("\\[x\\]");
        assert!(!editor.add_row());

        editor.set_hull(HullType::Align);
        assert!(editor.add_row());
        assert_eq!(editor.formula().grid().nrows(), 2);
        assert!(editor.formula().grid().rows()[1].numbered);
        assert!(!editor.add_column());
        assert!(editor.delete_row());
        assert_eq!(editor.formula().grid().nrows(), 1);
    }

    #[test]
    fn test_layout_is_dropped_on_edit() {
        let mut editor = MathEditor::empty();
        editor.type_text("a");
        let narrow = editor.dim().width;
        editor.type_text("bcd");
        assert!(editor.dim().width > narrow);
    }

    #[test]
    fn test_draw_and_click() {
        let mut editor = MathEditor::from_latex("$ab$");
        assert!(!editor.set_position_from_point(0, 0));

        let mut painter = RecordingPainter::new();
        editor.draw(&mut painter, Point::new(0, 0));
        assert!(!painter.is_empty());
        assert!(!editor.hits().is_empty());

        let width = editor.dim().width;
        assert!(editor.set_position_from_point(width + 50, 0));
        assert_eq!(editor.cursor().pos(), 2);
        assert!(editor.set_position_from_point(-50, 0));
        assert_eq!(editor.cursor().pos(), 0);

        editor.type_text("c");
        assert!(editor.hits().is_empty());
    }

    #[test]
    fn test_write_targets() {
        let editor = MathEditor::from_latex("\\begin{align}a&=b\\\\c&=d\\end{align}");
        assert_eq!(editor.write(Target::Maple).unwrap_or_default(), "a=b\nc=d");
        assert!(editor.latex().starts_with("\\begin{align}"));
        assert!(editor
            .write(Target::MathMl)
            .unwrap_or_default()
            .contains("<mtable"));
    }

    #[test]
    fn test_infix_construct_builds_fraction() {
        let mut editor = MathEditor::empty();
        editor.insert_construct("over");
        let node = &editor.formula().cell().nodes()[0];
        assert!(matches!(
            node,
            MathNode::Fraction {
                style: FracStyle::Over,
                ..
            }
        ));
    }
}
