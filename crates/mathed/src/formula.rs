//! Formula hull - the outermost grid and how it is embedded in text

use crate::array::MathArray;
use crate::font::MathStyle;
use crate::grid::{GridKind, GridNode};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Kind of the outermost container of a formula
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HullType {
    /// Inline `$..$`
    #[default]
    Simple,
    /// Unnumbered display `\[..\]`
    Equation,
    /// `\begin{equation}`
    NumberedEquation,
    /// Three `rcl` columns
    Eqnarray,
    /// `rl` column pairs
    Align,
    /// One centered column per row
    Gather,
    /// One long equation split over rows
    Multline,
}

impl HullType {
    /// Environment name of the numbered form, if the hull is an environment
    pub fn env_name(self) -> Option<&'static str> {
        match self {
            HullType::Simple | HullType::Equation => None,
            HullType::NumberedEquation => Some("equation"),
            HullType::Eqnarray => Some("eqnarray"),
            HullType::Align => Some("align"),
            HullType::Gather => Some("gather"),
            HullType::Multline => Some("multline"),
        }
    }

    /// Parse an environment name, returning the hull and whether it is starred
    pub fn from_env(name: &str) -> Option<(Self, bool)> {
        let (base, starred) = match name.strip_suffix('*') {
            Some(base) => (base, true),
            None => (name, false),
        };
        let hull = match base {
            "equation" if starred => HullType::Equation,
            "equation" => HullType::NumberedEquation,
            "displaymath" => HullType::Equation,
            "math" => HullType::Simple,
            "eqnarray" => HullType::Eqnarray,
            "align" => HullType::Align,
            "gather" => HullType::Gather,
            "multline" => HullType::Multline,
            _ => return None,
        };
        Some((hull, starred))
    }

    pub fn is_numbered_by_default(self) -> bool {
        !matches!(self, HullType::Simple | HullType::Equation)
    }

    /// Whether the hull holds more than one row
    pub fn is_multi_row(self) -> bool {
        matches!(
            self,
            HullType::Eqnarray | HullType::Align | HullType::Gather | HullType::Multline
        )
    }

    pub fn default_cols(self) -> usize {
        match self {
            HullType::Eqnarray => 3,
            HullType::Align => 2,
            _ => 1,
        }
    }

    /// Alignment of column `col` of the hull grid
    pub fn col_align(self, col: usize) -> char {
        match self {
            HullType::Eqnarray => ['r', 'c', 'l'][col % 3],
            HullType::Align => {
                if col % 2 == 0 {
                    'r'
                } else {
                    'l'
                }
            }
            _ => 'c',
        }
    }

    pub fn style(self) -> MathStyle {
        match self {
            HullType::Simple => MathStyle::Text,
            _ => MathStyle::Display,
        }
    }
}

/// A complete formula: hull type plus the outermost grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    hull: HullType,
    grid: GridNode,
}

impl Default for Formula {
    fn default() -> Self {
        Self::new(HullType::Simple)
    }
}

impl Formula {
    /// Empty formula with one row
    pub fn new(hull: HullType) -> Self {
        let mut grid = GridNode::new(GridKind::Hull, 1, hull.default_cols());
        for col in 0..grid.cols() {
            grid.set_col_align(col, hull.col_align(col));
        }
        grid.set_numbered(0, hull.is_numbered_by_default());
        Self { hull, grid }
    }

    /// Single-cell formula holding `content`
    pub fn from_cell(hull: HullType, content: MathArray) -> Self {
        let mut formula = Self::new(hull);
        if let Some(cell) = formula.grid.cell_mut(0, 0) {
            *cell = content;
        }
        formula
    }

    /// Formula around an already built hull grid
    pub fn from_grid(hull: HullType, grid: GridNode) -> Self {
        Self { hull, grid }
    }

    pub fn hull(&self) -> HullType {
        self.hull
    }

    pub fn grid(&self) -> &GridNode {
        &self.grid
    }

    pub(crate) fn grid_mut(&mut self) -> &mut GridNode {
        &mut self.grid
    }

    /// First cell of the hull grid
    pub fn cell(&self) -> &MathArray {
        &self.grid.cells()[0]
    }

    /// Equation number (1-based, counted from `first`) of every row, `None`
    /// for unnumbered rows
    pub fn equation_numbers(&self, first: usize) -> Vec<Option<usize>> {
        let mut next = first;
        self.grid
            .rows()
            .iter()
            .map(|row| {
                row.numbered.then(|| {
                    next += 1;
                    next - 1
                })
            })
            .collect()
    }

    /// Change the hull type, keeping the content
    ///
    /// Surplus columns are merged into the last kept column and missing ones
    /// are added empty. Converting to a single-row hull merges all rows.
    pub fn mutate(&mut self, hull: HullType) {
        if hull == self.hull {
            return;
        }
        debug!("mutating hull {:?} -> {:?}", self.hull, hull);
        let mut target_cols = hull.default_cols();
        if hull == HullType::Align {
            let cols = self.grid.cols();
            target_cols = (cols + cols % 2).max(2);
        }

        self.fit_columns(target_cols);
        if !hull.is_multi_row() {
            self.merge_rows();
        }

        for col in 0..self.grid.cols() {
            self.grid.set_col_align(col, hull.col_align(col));
        }
        let numbered = hull.is_numbered_by_default();
        let last = self.grid.nrows() - 1;
        for row in 0..self.grid.nrows() {
            let row_numbered = if hull == HullType::Multline {
                numbered && row == last
            } else {
                numbered
            };
            self.grid.set_numbered(row, row_numbered);
        }
        self.hull = hull;
    }

    fn merge_rows(&mut self) {
        let cols = self.grid.cols();
        while self.grid.nrows() > 1 {
            let moved: Vec<MathArray> = self.grid.row_cells(1).to_vec();
            for (col, content) in moved.into_iter().enumerate().take(cols) {
                if let Some(cell) = self.grid.cell_mut(0, col) {
                    cell.append(content);
                }
            }
            self.grid.delete_row(1);
        }
    }

    fn fit_columns(&mut self, target: usize) {
        let target = target.max(1);
        while self.grid.cols() > target {
            let last = self.grid.cols() - 1;
            for row in 0..self.grid.nrows() {
                let content = self
                    .grid
                    .cell_mut(row, last)
                    .map(std::mem::take)
                    .unwrap_or_default();
                if let Some(cell) = self.grid.cell_mut(row, last - 1) {
                    cell.append(content);
                }
            }
            self.grid.delete_column(last);
        }
        while self.grid.cols() < target {
            let last = self.grid.cols() - 1;
            self.grid.add_column(last);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hull_from_env() {
        assert_eq!(
            HullType::from_env("equation"),
            Some((HullType::NumberedEquation, false))
        );
        assert_eq!(HullType::from_env("equation*"), Some((HullType::Equation, true)));
        assert_eq!(HullType::from_env("align*"), Some((HullType::Align, true)));
        assert_eq!(HullType::from_env("pmatrix"), None);
    }

    #[test]
    fn test_new_formula_shape() {
        let formula = Formula::new(HullType::Eqnarray);
        assert_eq!(formula.grid().cols(), 3);
        assert_eq!(formula.grid().align_string(), "rcl");
        assert!(formula.grid().rows()[0].numbered);

        let simple = Formula::default();
        assert_eq!(simple.grid().nargs(), 1);
        assert!(!simple.grid().rows()[0].numbered);
    }

    #[test]
    fn test_mutate_to_simple_merges_everything() {
        let mut formula = Formula::new(HullType::Eqnarray);
        formula.grid_mut().add_row(0);
        for (i, text) in ["a", "=", "b", "c", "=", "d"].iter().enumerate() {
            formula.grid_mut().cells_mut()[i] = MathArray::from_chars(text);
        }
        formula.mutate(HullType::Simple);
        assert_eq!(formula.hull(), HullType::Simple);
        assert_eq!(formula.grid().nargs(), 1);
        assert_eq!(formula.cell(), &MathArray::from_chars("a=bc=d"));
    }

    #[test]
    fn test_mutate_to_align_pads_columns() {
        let mut formula = Formula::from_cell(HullType::Equation, MathArray::from_chars("x"));
        formula.mutate(HullType::Align);
        assert_eq!(formula.grid().cols(), 2);
        assert_eq!(formula.grid().align_string(), "rl");
        assert_eq!(formula.cell(), &MathArray::from_chars("x"));
        assert!(formula.grid().rows()[0].numbered);
    }

    #[test]
    fn test_equation_numbers() {
        let mut formula = Formula::new(HullType::Gather);
        formula.grid_mut().add_row(0);
        formula.grid_mut().add_row(1);
        formula.grid_mut().set_numbered(1, false);
        assert_eq!(formula.equation_numbers(1), vec![Some(1), None, Some(2)]);
    }
}
