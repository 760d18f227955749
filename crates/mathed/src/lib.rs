//! Mathed - math formula editing core
//!
//! This crate provides the pieces of an in-document formula editor:
//! - A typed formula tree (nodes, cells and grids) with a read-only symbol table
//! - A cursor model with selection, typing semantics and unwrap-on-empty deletion
//! - A metrics pass and a draw pass driven by host-supplied fonts and painter
//! - A forgiving LaTeX parser and writers for LaTeX, MathML and CAS dialects
//! - Macro templates and formula hulls (inline, display, numbered environments)

pub mod array;
pub mod config;
pub mod cursor;
pub mod deco;
pub mod editor;
pub mod error;
pub mod font;
pub mod formula;
pub mod grid;
pub mod layout;
pub mod macros;
pub mod model;
pub mod parser;
pub mod render;
pub mod symbols;
pub mod writer;

pub use array::MathArray;
pub use config::{Color, LayoutConfig, MathConfig, RenderConfig};
pub use cursor::{Cursor, CursorGeometry, CursorSlice, CursorState, SelectionRange};
pub use deco::{deco_polylines, lookup_deco, Deco, Quadrant};
pub use editor::{Clipboard, MathEditor};
pub use error::*;
pub use font::{Dimension, FixedFontMetrics, FontFamily, FontId, FontInfo, FontMetrics, MathStyle};
pub use formula::{Formula, HullType};
pub use grid::{GridKind, GridNode, RowInfo};
pub use layout::{CellLayout, FormulaLayout, LayoutEngine, LayoutItem, NodeLayout, Point};
pub use macros::{MacroData, MacroTable};
pub use model::{DecorationKind, FracStyle, Limits, MathNode};
pub use parser::{parse, parse_formula, parse_formula_with_macros, parse_with_macros, Parser};
pub use render::{HitCache, Painter, Rect, RecordingPainter, RenderPrimitive, Renderer};
pub use symbols::{lookup_symbol, SymbolClass, SymbolInfo, SymbolRef};
pub use writer::{
    formula_to_mathml, to_latex, to_latex_fragile, to_maple, to_mathematica, to_mathml,
    to_normalized, to_octave, write_formula, NodeWriter, Target, WriteStream,
};

#[cfg(test)]
mod tests {
    use super::*;

    // =============================================================================
    // Integration Tests
    // =============================================================================

    #[test]
    fn test_parse_layout_render_pipeline() {
        let formula = parse_formula("$\\frac{a}{b}$");

        let metrics = FixedFontMetrics::new();
        let config = LayoutConfig::default();
        let layout = LayoutEngine::new(&metrics, &config).layout_formula(&formula);
        assert!(layout.dim().width > 0);
        assert!(layout.dim().height() > 0);

        let mut painter = RecordingPainter::new();
        let hits = Renderer::new().draw(&layout, Point::new(0, 0), None, &mut painter);
        assert!(!painter.is_empty());
        assert!(!hits.is_empty());
    }

    #[test]
    fn test_latex_roundtrip() {
        let source = "\\sum_{i=1}^{n}x_{i}^{2}";
        let tree = parse(source);
        assert_eq!(parse(&to_latex(&tree)), tree);
    }

    #[test]
    fn test_every_target_writes() {
        let tree = parse("\\sqrt{x^{2}+1}");
        for target in Target::ALL {
            let text = target.write(&tree).unwrap_or_default();
            assert!(!text.is_empty(), "{} produced nothing", target.name());
        }
    }

    #[test]
    fn test_editor_pipeline() {
        let mut editor = MathEditor::empty();
        editor.type_text("\\frac a");
        editor.move_down(false);
        editor.type_text("b");
        assert_eq!(editor.latex(), "$\\frac{a}{b}$");

        let mut painter = RecordingPainter::new();
        editor.draw(&mut painter, Point::new(10, 20));
        assert!(painter.texts().any(|t| t == "a"));
    }
}
