//! Grid - rows by columns of cells with per-row metadata
//!
//! Cells are stored row-major. The row side table always has one entry per
//! row and the alignment string one entry per column; every structural edit
//! updates all three together.

use crate::array::MathArray;
use crate::error::{MathError, MathResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

// =============================================================================
// Grid Kinds
// =============================================================================

/// Environment a grid is written as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GridKind {
    /// Outermost grid of a formula; the hull decides how it is written
    Hull,
    Array,
    Matrix,
    PMatrix,
    BMatrix,
    /// `Bmatrix` (braces)
    BraceMatrix,
    VMatrix,
    /// `Vmatrix` (double bars)
    DoubleVMatrix,
    Cases,
    Aligned,
    Gathered,
}

impl GridKind {
    const ENVIRONMENTS: [GridKind; 10] = [
        GridKind::Array,
        GridKind::Matrix,
        GridKind::PMatrix,
        GridKind::BMatrix,
        GridKind::BraceMatrix,
        GridKind::VMatrix,
        GridKind::DoubleVMatrix,
        GridKind::Cases,
        GridKind::Aligned,
        GridKind::Gathered,
    ];

    /// LaTeX environment name
    pub fn env_name(self) -> &'static str {
        match self {
            GridKind::Hull => "",
            GridKind::Array => "array",
            GridKind::Matrix => "matrix",
            GridKind::PMatrix => "pmatrix",
            GridKind::BMatrix => "bmatrix",
            GridKind::BraceMatrix => "Bmatrix",
            GridKind::VMatrix => "vmatrix",
            GridKind::DoubleVMatrix => "Vmatrix",
            GridKind::Cases => "cases",
            GridKind::Aligned => "aligned",
            GridKind::Gathered => "gathered",
        }
    }

    pub fn from_env(name: &str) -> Option<Self> {
        Self::ENVIRONMENTS
            .iter()
            .copied()
            .find(|kind| kind.env_name() == name)
    }

    pub fn required_package(self) -> Option<&'static str> {
        match self {
            GridKind::Hull | GridKind::Array => None,
            _ => Some("amsmath"),
        }
    }

    /// Fences drawn around the grid, as delimiter names
    pub fn fences(self) -> Option<(&'static str, &'static str)> {
        match self {
            GridKind::PMatrix => Some(("(", ")")),
            GridKind::BMatrix => Some(("[", "]")),
            GridKind::BraceMatrix => Some(("\\{", "\\}")),
            GridKind::VMatrix => Some(("|", "|")),
            GridKind::DoubleVMatrix => Some(("\\|", "\\|")),
            GridKind::Cases => Some(("\\{", ".")),
            _ => None,
        }
    }

    /// Default horizontal alignment of column `col`
    pub fn default_align(self, col: usize) -> char {
        match self {
            GridKind::Cases => 'l',
            GridKind::Aligned => {
                if col % 2 == 0 {
                    'r'
                } else {
                    'l'
                }
            }
            _ => 'c',
        }
    }

    /// Whether the alignment string is written (`\begin{array}{lcr}`)
    pub fn writes_alignment(self) -> bool {
        self == GridKind::Array
    }
}

// =============================================================================
// Row Metadata
// =============================================================================

/// Side-table entry for one grid row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowInfo {
    /// Row carries an equation number
    pub numbered: bool,
    pub label: Option<String>,
    /// Extra vertical skip after the row (`\\[2pt]`)
    pub skip: Option<String>,
}

// =============================================================================
// Grid Node
// =============================================================================

/// A rows by columns arrangement of cells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridNode {
    kind: GridKind,
    cols: usize,
    cells: Vec<MathArray>,
    rows: Vec<RowInfo>,
    col_align: Vec<char>,
    v_align: char,
}

impl GridNode {
    /// Empty grid; zero counts are raised to one
    pub fn new(kind: GridKind, rows: usize, cols: usize) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        Self {
            kind,
            cols,
            cells: vec![MathArray::new(); rows * cols],
            rows: vec![RowInfo::default(); rows],
            col_align: (0..cols).map(|c| kind.default_align(c)).collect(),
            v_align: 'c',
        }
    }

    /// Build from explicit rows, rejecting empty or ragged input
    pub fn from_rows(kind: GridKind, rows: Vec<Vec<MathArray>>) -> MathResult<Self> {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        if rows.is_empty() || cols == 0 {
            return Err(MathError::InvalidStructure(
                "grid needs at least one row and one column".to_string(),
            ));
        }
        if rows.iter().any(|row| row.len() != cols) {
            return Err(MathError::InvalidStructure(format!(
                "every grid row must have {} cells",
                cols
            )));
        }
        Ok(Self::from_rows_padded(kind, rows, cols))
    }

    /// Build from rows of any length, padding short rows with empty cells
    pub fn from_rows_padded(kind: GridKind, rows: Vec<Vec<MathArray>>, min_cols: usize) -> Self {
        let cols = rows
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .max(min_cols)
            .max(1);
        let nrows = rows.len().max(1);
        let mut grid = Self::new(kind, nrows, cols);
        for (r, row) in rows.into_iter().enumerate() {
            for (c, cell) in row.into_iter().enumerate() {
                grid.cells[r * cols + c] = cell;
            }
        }
        grid
    }

    pub fn kind(&self) -> GridKind {
        self.kind
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Total number of cells
    pub fn nargs(&self) -> usize {
        self.cells.len()
    }

    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    pub fn row_of(&self, idx: usize) -> usize {
        idx / self.cols
    }

    pub fn col_of(&self, idx: usize) -> usize {
        idx % self.cols
    }

    pub fn cells(&self) -> &[MathArray] {
        &self.cells
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [MathArray] {
        &mut self.cells
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&MathArray> {
        if col >= self.cols {
            return None;
        }
        self.cells.get(self.index(row, col))
    }

    pub(crate) fn cell_mut(&mut self, row: usize, col: usize) -> Option<&mut MathArray> {
        if col >= self.cols {
            return None;
        }
        let idx = self.index(row, col);
        self.cells.get_mut(idx)
    }

    /// Cells of one row
    pub fn row_cells(&self, row: usize) -> &[MathArray] {
        let start = (row * self.cols).min(self.cells.len());
        let end = (start + self.cols).min(self.cells.len());
        &self.cells[start..end]
    }

    pub fn rows(&self) -> &[RowInfo] {
        &self.rows
    }

    pub fn row_info(&self, row: usize) -> Option<&RowInfo> {
        self.rows.get(row)
    }

    pub fn set_numbered(&mut self, row: usize, numbered: bool) {
        if let Some(info) = self.rows.get_mut(row) {
            info.numbered = numbered;
        }
    }

    pub fn set_label(&mut self, row: usize, label: Option<String>) {
        if let Some(info) = self.rows.get_mut(row) {
            info.label = label;
        }
    }

    pub fn set_row_skip(&mut self, row: usize, skip: Option<String>) {
        if let Some(info) = self.rows.get_mut(row) {
            info.skip = skip;
        }
    }

    pub fn col_align(&self, col: usize) -> char {
        self.col_align.get(col).copied().unwrap_or('c')
    }

    pub fn set_col_align(&mut self, col: usize, align: char) {
        if let Some(slot) = self.col_align.get_mut(col) {
            *slot = align;
        }
    }

    /// Alignment letters of all columns, e.g. `"rcl"`
    pub fn align_string(&self) -> String {
        self.col_align.iter().collect()
    }

    /// Apply an alignment string; `|` separators are ignored and missing
    /// columns keep their alignment
    pub fn set_align_string(&mut self, align: &str) {
        let letters = align.chars().filter(|c| matches!(c, 'l' | 'c' | 'r'));
        for (slot, letter) in self.col_align.iter_mut().zip(letters) {
            *slot = letter;
        }
    }

    pub fn v_align(&self) -> char {
        self.v_align
    }

    pub fn set_v_align(&mut self, align: char) {
        if matches!(align, 't' | 'c' | 'b') {
            self.v_align = align;
        }
    }

    // =========================================================================
    // Cell navigation
    // =========================================================================

    /// Next cell in the same row
    pub fn idx_right(&self, idx: usize) -> Option<usize> {
        let next = idx + 1;
        (next % self.cols != 0 && next < self.nargs()).then_some(next)
    }

    /// Previous cell in the same row
    pub fn idx_left(&self, idx: usize) -> Option<usize> {
        (idx % self.cols != 0).then(|| idx - 1)
    }

    /// Same column, previous row
    pub fn idx_up(&self, idx: usize) -> Option<usize> {
        idx.checked_sub(self.cols)
    }

    /// Same column, next row
    pub fn idx_down(&self, idx: usize) -> Option<usize> {
        let below = idx + self.cols;
        (below < self.nargs()).then_some(below)
    }

    // =========================================================================
    // Structural edits
    // =========================================================================

    /// Insert an empty row after row `after`
    pub fn add_row(&mut self, after: usize) {
        let row = (after + 1).min(self.nrows());
        let at = row * self.cols;
        let empty = std::iter::repeat_with(MathArray::new).take(self.cols);
        self.cells.splice(at..at, empty);
        let numbered = self.rows.get(after).map(|r| r.numbered).unwrap_or(false)
            && self.kind == GridKind::Hull;
        self.rows.insert(
            row,
            RowInfo {
                numbered,
                ..RowInfo::default()
            },
        );
    }

    /// Insert an empty column after column `after`
    pub fn add_column(&mut self, after: usize) {
        let col = (after + 1).min(self.cols);
        let old_cols = self.cols;
        let mut cells = Vec::with_capacity(self.nrows() * (old_cols + 1));
        for (i, cell) in std::mem::take(&mut self.cells).into_iter().enumerate() {
            if i % old_cols == col {
                cells.push(MathArray::new());
            }
            cells.push(cell);
            if col == old_cols && i % old_cols == old_cols - 1 {
                cells.push(MathArray::new());
            }
        }
        self.cells = cells;
        self.cols += 1;
        self.col_align.insert(col, self.kind.default_align(col));
    }

    /// Remove row `row`; the last remaining row is never removed
    pub fn delete_row(&mut self, row: usize) -> bool {
        if self.nrows() <= 1 || row >= self.nrows() {
            debug!("rejecting deletion of row {} of {}", row, self.nrows());
            return false;
        }
        let at = row * self.cols;
        self.cells.drain(at..at + self.cols);
        self.rows.remove(row);
        true
    }

    /// Remove column `col`; the last remaining column is never removed
    pub fn delete_column(&mut self, col: usize) -> bool {
        if self.cols <= 1 || col >= self.cols {
            debug!("rejecting deletion of column {} of {}", col, self.cols);
            return false;
        }
        let cols = self.cols;
        let mut i = 0;
        self.cells.retain(|_| {
            let keep = i % cols != col;
            i += 1;
            keep
        });
        self.cols -= 1;
        self.col_align.remove(col);
        true
    }

    /// Whether the shape invariants hold
    pub fn is_consistent(&self) -> bool {
        self.cols >= 1
            && !self.rows.is_empty()
            && self.cells.len() == self.rows.len() * self.cols
            && self.col_align.len() == self.cols
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labelled(rows: usize, cols: usize) -> GridNode {
        let mut grid = GridNode::new(GridKind::Matrix, rows, cols);
        for r in 0..rows {
            for c in 0..cols {
                if let Some(cell) = grid.cell_mut(r, c) {
                    *cell = MathArray::from_chars(&format!("{}{}", r, c));
                }
            }
        }
        grid
    }

    #[test]
    fn test_new_grid_shape() {
        let grid = GridNode::new(GridKind::Matrix, 3, 2);
        assert_eq!(grid.nrows(), 3);
        assert_eq!(grid.cols(), 2);
        assert_eq!(grid.nargs(), 6);
        assert!(grid.is_consistent());
    }

    #[test]
    fn test_zero_counts_raised_to_one() {
        let grid = GridNode::new(GridKind::Array, 0, 0);
        assert_eq!(grid.nrows(), 1);
        assert_eq!(grid.cols(), 1);
    }

    #[test]
    fn test_add_row_and_column() {
        let mut grid = labelled(3, 2);
        grid.add_row(1);
        grid.add_column(0);
        assert_eq!(grid.nrows(), 4);
        assert_eq!(grid.cols(), 3);
        assert_eq!(grid.rows().len(), 4);
        assert!(grid.is_consistent());

        assert_eq!(grid.cell(1, 0), Some(&MathArray::from_chars("10")));
        assert_eq!(grid.cell(1, 2), Some(&MathArray::from_chars("11")));
        assert_eq!(grid.cell(3, 0), Some(&MathArray::from_chars("20")));
        for c in 0..3 {
            assert!(grid.cell(2, c).is_some_and(|cell| cell.is_empty()));
        }
        for r in 0..4 {
            assert!(grid.cell(r, 1).is_some_and(|cell| cell.is_empty()));
        }
        assert_eq!(grid.row_info(2), Some(&RowInfo::default()));
    }

    #[test]
    fn test_add_column_at_end() {
        let mut grid = labelled(2, 2);
        grid.add_column(1);
        assert_eq!(grid.cols(), 3);
        assert_eq!(grid.cell(0, 1), Some(&MathArray::from_chars("01")));
        assert!(grid.cell(0, 2).is_some_and(|cell| cell.is_empty()));
        assert_eq!(grid.cell(1, 0), Some(&MathArray::from_chars("10")));
        assert!(grid.is_consistent());
    }

    #[test]
    fn test_delete_row_and_column() {
        let mut grid = labelled(3, 3);
        assert!(grid.delete_row(1));
        assert!(grid.delete_column(0));
        assert_eq!(grid.nrows(), 2);
        assert_eq!(grid.cols(), 2);
        assert_eq!(grid.cell(1, 0), Some(&MathArray::from_chars("21")));
        assert!(grid.is_consistent());
    }

    #[test]
    fn test_last_row_and_column_kept() {
        let mut grid = GridNode::new(GridKind::Matrix, 1, 1);
        assert!(!grid.delete_row(0));
        assert!(!grid.delete_column(0));
        assert_eq!(grid.nargs(), 1);
    }

    #[test]
    fn test_from_rows_checks_shape() {
        let ragged = vec![vec![MathArray::new(), MathArray::new()], vec![MathArray::new()]];
        assert!(GridNode::from_rows(GridKind::Matrix, ragged.clone()).is_err());
        assert!(GridNode::from_rows(GridKind::Matrix, vec![]).is_err());
        let padded = GridNode::from_rows_padded(GridKind::Matrix, ragged, 0);
        assert_eq!(padded.cols(), 2);
        assert!(padded.is_consistent());
    }

    #[test]
    fn test_alignment_string() {
        let mut grid = GridNode::new(GridKind::Array, 1, 3);
        assert_eq!(grid.align_string(), "ccc");
        grid.set_align_string("l|cr");
        assert_eq!(grid.align_string(), "lcr");
        let aligned = GridNode::new(GridKind::Aligned, 1, 2);
        assert_eq!(aligned.align_string(), "rl");
    }

    #[test]
    fn test_env_names() {
        assert_eq!(GridKind::from_env("pmatrix"), Some(GridKind::PMatrix));
        assert_eq!(GridKind::from_env("Bmatrix"), Some(GridKind::BraceMatrix));
        assert_eq!(GridKind::from_env("tabular"), None);
        assert_eq!(GridKind::Cases.fences(), Some(("\\{", ".")));
    }
}
