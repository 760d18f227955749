//! Cursor - a path of (cell index, position) frames into a formula
//!
//! Frame 0 addresses a cell of the formula's hull grid. Every deeper frame
//! addresses a cell of the node found at the previous frame's position. All
//! movement is total: a cursor that no longer fits the tree is clamped back
//! into it before anything else happens.

use crate::array::MathArray;
use crate::grid::GridNode;
use crate::model::MathNode;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

// =============================================================================
// Frames
// =============================================================================

/// One level of a cursor path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CursorSlice {
    /// Cell index within the owning node
    pub idx: usize,
    /// Position within that cell, `0..=len`
    pub pos: usize,
}

impl CursorSlice {
    pub const fn new(idx: usize, pos: usize) -> Self {
        Self { idx, pos }
    }
}

/// The owner of the cell a frame points into
#[derive(Debug, Clone, Copy)]
pub enum Container<'a> {
    Hull(&'a GridNode),
    Node(&'a MathNode),
}

impl<'a> Container<'a> {
    pub fn cells(&self) -> &'a [MathArray] {
        match self {
            Container::Hull(grid) => grid.cells(),
            Container::Node(node) => node.cells(),
        }
    }

    fn is_active_cell(&self, idx: usize) -> bool {
        match self {
            Container::Hull(grid) => idx < grid.nargs(),
            Container::Node(node) => node.is_active_cell(idx),
        }
    }

    fn idx_right(&self, idx: usize) -> Option<usize> {
        match self {
            Container::Hull(grid) => grid.idx_right(idx),
            Container::Node(node) => node.idx_right(idx),
        }
    }

    fn idx_left(&self, idx: usize) -> Option<usize> {
        match self {
            Container::Hull(grid) => grid.idx_left(idx),
            Container::Node(node) => node.idx_left(idx),
        }
    }

    fn idx_up(&self, idx: usize) -> Option<usize> {
        match self {
            Container::Hull(grid) => grid.idx_up(idx),
            Container::Node(node) => node.idx_up(idx),
        }
    }

    fn idx_down(&self, idx: usize) -> Option<usize> {
        match self {
            Container::Hull(grid) => grid.idx_down(idx),
            Container::Node(node) => node.idx_down(idx),
        }
    }
}

/// Cell addressed by the last frame of `frames`
pub fn resolve_cell<'a>(root: &'a GridNode, frames: &[CursorSlice]) -> Option<&'a MathArray> {
    let (first, rest) = frames.split_first()?;
    let mut cell = root.cells().get(first.idx)?;
    let mut parent_pos = first.pos;
    for frame in rest {
        cell = cell.get(parent_pos)?.cell(frame.idx)?;
        parent_pos = frame.pos;
    }
    Some(cell)
}

pub(crate) fn resolve_cell_mut<'a>(
    root: &'a mut GridNode,
    frames: &[CursorSlice],
) -> Option<&'a mut MathArray> {
    let (first, rest) = frames.split_first()?;
    let mut cell = root.cells_mut().get_mut(first.idx)?;
    let mut parent_pos = first.pos;
    for frame in rest {
        cell = cell.get_mut(parent_pos)?.cell_mut(frame.idx)?;
        parent_pos = frame.pos;
    }
    Some(cell)
}

/// Node owning the cell addressed by the last frame of `frames`
pub fn resolve_container<'a>(root: &'a GridNode, frames: &[CursorSlice]) -> Option<Container<'a>> {
    match frames.len() {
        0 => None,
        1 => Some(Container::Hull(root)),
        n => {
            let parent = &frames[..n - 1];
            let cell = resolve_cell(root, parent)?;
            cell.get(parent[n - 2].pos).map(Container::Node)
        }
    }
}

/// Clamp `frames` so that every frame addresses an existing, shown cell
pub(crate) fn clamp_frames(root: &GridNode, frames: &mut Vec<CursorSlice>) {
    if frames.is_empty() {
        frames.push(CursorSlice::default());
    }
    if frames[0].idx >= root.nargs() {
        frames.truncate(1);
        frames[0] = CursorSlice::new(root.nargs() - 1, 0);
    }
    let mut depth = 1;
    while depth <= frames.len() {
        let valid = match resolve_container(root, &frames[..depth]) {
            Some(container) => container.is_active_cell(frames[depth - 1].idx),
            None => false,
        };
        if !valid {
            frames.truncate(depth - 1);
            break;
        }
        let len = resolve_cell(root, &frames[..depth]).map(MathArray::len).unwrap_or(0);
        let frame = &mut frames[depth - 1];
        frame.pos = frame.pos.min(len);
        depth += 1;
    }
    if frames.is_empty() {
        frames.push(CursorSlice::default());
    }
}

// =============================================================================
// Selection
// =============================================================================

/// A selection normalized to one cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRange {
    /// Frames down to the cell holding the selection; the last frame's
    /// position is meaningless
    pub path: Vec<CursorSlice>,
    pub from: usize,
    pub to: usize,
}

impl SelectionRange {
    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }
}

/// Editing state of a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Normal,
    Selecting,
    /// A `\name` is being typed
    MacroNameEntry,
}

/// Pixel geometry of cursor positions, provided by the last metrics pass
pub trait CursorGeometry {
    /// Horizontal pixel position of the cursor at `frames`
    fn cursor_x(&self, frames: &[CursorSlice]) -> Option<i32>;
}

// =============================================================================
// Cursor
// =============================================================================

/// Point, optional anchor and macro-name buffer of one editing session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    frames: Vec<CursorSlice>,
    anchor: Option<Vec<CursorSlice>>,
    macro_name: Option<String>,
}

impl Default for Cursor {
    fn default() -> Self {
        Self::new()
    }
}

impl Cursor {
    /// Cursor at the start of the first hull cell
    pub fn new() -> Self {
        Self {
            frames: vec![CursorSlice::default()],
            anchor: None,
            macro_name: None,
        }
    }

    /// Cursor at an explicit path, clamped into `root`
    pub fn at(root: &GridNode, frames: Vec<CursorSlice>) -> Self {
        let mut cursor = Self {
            frames,
            anchor: None,
            macro_name: None,
        };
        cursor.normalize(root);
        cursor
    }

    pub fn frames(&self) -> &[CursorSlice] {
        &self.frames
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn top(&self) -> CursorSlice {
        self.frames.last().copied().unwrap_or_default()
    }

    pub fn pos(&self) -> usize {
        self.top().pos
    }

    pub fn idx(&self) -> usize {
        self.top().idx
    }

    pub fn state(&self) -> CursorState {
        if self.macro_name.is_some() {
            CursorState::MacroNameEntry
        } else if self.anchor.is_some() {
            CursorState::Selecting
        } else {
            CursorState::Normal
        }
    }

    /// Cell the point is in
    pub fn cell<'a>(&self, root: &'a GridNode) -> Option<&'a MathArray> {
        resolve_cell(root, &self.frames)
    }

    /// Node owning the point's cell
    pub fn container<'a>(&self, root: &'a GridNode) -> Option<Container<'a>> {
        resolve_container(root, &self.frames)
    }

    /// Node just before the point
    pub fn prev_node<'a>(&self, root: &'a GridNode) -> Option<&'a MathNode> {
        let pos = self.pos();
        pos.checked_sub(1)
            .and_then(|p| self.cell(root).and_then(|cell| cell.get(p)))
    }

    /// Node just after the point
    pub fn next_node<'a>(&self, root: &'a GridNode) -> Option<&'a MathNode> {
        self.cell(root).and_then(|cell| cell.get(self.pos()))
    }

    /// Clamp the point and anchor into `root`
    pub fn normalize(&mut self, root: &GridNode) {
        clamp_frames(root, &mut self.frames);
        if let Some(anchor) = self.anchor.as_mut() {
            clamp_frames(root, anchor);
        }
    }

    pub(crate) fn set_frames(&mut self, frames: Vec<CursorSlice>) {
        self.frames = frames;
    }

    pub(crate) fn set_pos(&mut self, pos: usize) {
        if let Some(top) = self.frames.last_mut() {
            top.pos = pos;
        }
    }

    /// Enter cell `idx` of the node after the point
    pub(crate) fn push(&mut self, idx: usize, pos: usize) {
        trace!("cursor enters cell {} at depth {}", idx, self.frames.len());
        self.frames.push(CursorSlice::new(idx, pos));
    }

    /// Leave the current cell; the point ends up before the node
    pub(crate) fn pop(&mut self) -> bool {
        if self.frames.len() > 1 {
            self.frames.pop();
            trace!("cursor leaves to depth {}", self.frames.len());
            true
        } else {
            false
        }
    }

    // =========================================================================
    // Macro name entry
    // =========================================================================

    pub fn macro_name(&self) -> Option<&str> {
        self.macro_name.as_deref()
    }

    pub(crate) fn start_macro_name(&mut self) {
        trace!("entering macro name mode");
        self.macro_name = Some(String::new());
    }

    pub(crate) fn push_macro_char(&mut self, c: char) {
        if let Some(name) = self.macro_name.as_mut() {
            name.push(c);
        }
    }

    pub(crate) fn take_macro_name(&mut self) -> Option<String> {
        self.macro_name.take()
    }

    /// Abandon a partially typed macro name
    pub fn cancel_macro_name(&mut self) {
        if self.macro_name.take().is_some() {
            trace!("macro name entry cancelled");
        }
    }

    // =========================================================================
    // Selection
    // =========================================================================

    pub fn has_selection(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn anchor(&self) -> Option<&[CursorSlice]> {
        self.anchor.as_deref()
    }

    /// Fix the anchor at the point, if not already selecting
    pub fn start_selection(&mut self) {
        if self.anchor.is_none() {
            trace!("selection anchored");
            self.anchor = Some(self.frames.clone());
        }
    }

    pub(crate) fn set_anchor(&mut self, anchor: Vec<CursorSlice>) {
        self.anchor = Some(anchor);
    }

    pub fn clear_selection(&mut self) {
        self.anchor = None;
    }

    /// Selection between anchor and point, lifted to their common cell
    ///
    /// Returns `None` when nothing is selected or when the two ends lie in
    /// different cells of the hull grid.
    pub fn selection(&self) -> Option<SelectionRange> {
        let anchor = self.anchor.as_ref()?;
        let point = &self.frames;
        let common = anchor
            .iter()
            .zip(point.iter())
            .take_while(|(a, p)| a == p)
            .count();

        let shortest = anchor.len().min(point.len());
        if common == shortest {
            // one end is on the path of the other
            let level = shortest - 1;
            let mut path = point[..=level].to_vec();
            let pos = point[level].pos;
            let deeper = anchor.len() != point.len();
            path[level].pos = 0;
            return Some(SelectionRange {
                path,
                from: pos,
                to: if deeper { pos + 1 } else { pos },
            });
        }

        if anchor[common].idx == point[common].idx {
            let level = common;
            let span = |frames: &[CursorSlice]| {
                let pos = frames[level].pos;
                if frames.len() > level + 1 {
                    (pos, pos + 1)
                } else {
                    (pos, pos)
                }
            };
            let (a_lo, a_hi) = span(anchor);
            let (p_lo, p_hi) = span(point);
            return Some(SelectionRange {
                path: point[..=level].to_vec(),
                from: a_lo.min(p_lo),
                to: a_hi.max(p_hi),
            });
        }

        if common == 0 {
            debug!("rejecting selection across hull cells");
            return None;
        }
        let level = common - 1;
        let pos = point[level].pos;
        Some(SelectionRange {
            path: point[..=level].to_vec(),
            from: pos,
            to: pos + 1,
        })
    }

    // =========================================================================
    // Movement
    // =========================================================================

    fn prepare_move(&mut self, root: &GridNode, select: bool) {
        self.normalize(root);
        self.cancel_macro_name();
        if select {
            self.start_selection();
        } else {
            self.clear_selection();
        }
    }

    /// Move one logical unit right; returns false at the end of the formula
    pub fn right(&mut self, root: &GridNode, select: bool) -> bool {
        self.prepare_move(root, select);
        let Some(cell) = self.cell(root) else {
            return false;
        };
        let top = self.top();
        if top.pos < cell.len() {
            let entry = if select {
                None
            } else {
                cell.get(top.pos).and_then(MathNode::first_idx)
            };
            match entry {
                Some(idx) => self.push(idx, 0),
                None => self.set_pos(top.pos + 1),
            }
            return true;
        }
        if let Some(next) = self.container(root).and_then(|c| c.idx_right(top.idx)) {
            if let Some(frame) = self.frames.last_mut() {
                *frame = CursorSlice::new(next, 0);
            }
            return true;
        }
        if self.pop() {
            let pos = self.pos();
            self.set_pos(pos + 1);
            return true;
        }
        false
    }

    /// Move one logical unit left; returns false at the start of the formula
    pub fn left(&mut self, root: &GridNode, select: bool) -> bool {
        self.prepare_move(root, select);
        let Some(cell) = self.cell(root) else {
            return false;
        };
        let top = self.top();
        if top.pos > 0 {
            let entry = if select {
                None
            } else {
                cell.get(top.pos - 1)
                    .and_then(|node| node.last_idx().map(|idx| (idx, node)))
            };
            self.set_pos(top.pos - 1);
            if let Some((idx, node)) = entry {
                let len = node.cell(idx).map(MathArray::len).unwrap_or(0);
                self.push(idx, len);
            }
            return true;
        }
        if let Some(prev) = self.container(root).and_then(|c| c.idx_left(top.idx)) {
            let len = self
                .container(root)
                .and_then(|c| c.cells().get(prev).map(MathArray::len))
                .unwrap_or(0);
            if let Some(frame) = self.frames.last_mut() {
                *frame = CursorSlice::new(prev, len);
            }
            return true;
        }
        self.pop()
    }

    pub fn up(
        &mut self,
        root: &GridNode,
        select: bool,
        geometry: Option<&dyn CursorGeometry>,
    ) -> bool {
        self.vertical(root, select, true, geometry)
    }

    pub fn down(
        &mut self,
        root: &GridNode,
        select: bool,
        geometry: Option<&dyn CursorGeometry>,
    ) -> bool {
        self.vertical(root, select, false, geometry)
    }

    fn vertical(
        &mut self,
        root: &GridNode,
        select: bool,
        up: bool,
        geometry: Option<&dyn CursorGeometry>,
    ) -> bool {
        self.prepare_move(root, select);
        let target_x = geometry.and_then(|g| g.cursor_x(&self.frames));
        for level in (0..self.frames.len()).rev() {
            let Some(container) = resolve_container(root, &self.frames[..=level]) else {
                continue;
            };
            let idx = self.frames[level].idx;
            let target = if up {
                container.idx_up(idx)
            } else {
                container.idx_down(idx)
            };
            let Some(target) = target else {
                continue;
            };
            let old_pos = self.frames[level].pos;
            self.frames.truncate(level + 1);
            let len = container.cells().get(target).map(MathArray::len).unwrap_or(0);
            self.frames[level] = CursorSlice::new(target, old_pos.min(len));
            if let (Some(x), Some(geometry)) = (target_x, geometry) {
                self.closest_to_x(geometry, len, x);
            }
            trace!("cursor moved {} to cell {}", if up { "up" } else { "down" }, target);
            return true;
        }
        false
    }

    fn closest_to_x(&mut self, geometry: &dyn CursorGeometry, len: usize, x: i32) {
        let mut best: Option<(i32, usize)> = None;
        for pos in 0..=len {
            self.set_pos(pos);
            if let Some(px) = geometry.cursor_x(&self.frames) {
                let distance = (px - x).abs();
                if best.map_or(true, |(d, _)| distance < d) {
                    best = Some((distance, pos));
                }
            }
        }
        if let Some((_, pos)) = best {
            self.set_pos(pos);
        }
    }

    /// First position of the current cell
    pub fn home(&mut self, root: &GridNode, select: bool) -> bool {
        self.prepare_move(root, select);
        let moved = self.pos() != 0;
        self.set_pos(0);
        moved
    }

    /// Last position of the current cell
    pub fn end(&mut self, root: &GridNode, select: bool) -> bool {
        self.prepare_move(root, select);
        let len = self.cell(root).map(MathArray::len).unwrap_or(0);
        let moved = self.pos() != len;
        self.set_pos(len);
        moved
    }
}
