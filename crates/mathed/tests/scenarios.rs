//! End-to-end editing and serialization scenarios
//!
//! Each test drives the public API the way a host application would: parse
//! persisted LaTeX, move the cursor, edit, lay out and write back.

use mathed::model::{NUCLEUS, SUB, SUP};
use mathed::{
    parse, parse_formula, to_latex, Cursor, CursorSlice, FixedFontMetrics, Formula, GridKind,
    GridNode, HullType, LayoutConfig, LayoutEngine, MathArray, MathEditor, MathNode, MathStyle,
    RowInfo,
};
use pretty_assertions::assert_eq;

// =============================================================================
// Parsing and writing
// =============================================================================

#[test]
fn test_fraction_parses_and_writes_back() {
    let tree = parse("\\frac{a}{b}");
    assert_eq!(tree.len(), 1);
    let MathNode::Fraction { cells, .. } = &tree.nodes()[0] else {
        panic!("expected a fraction, got {:?}", tree);
    };
    assert_eq!(cells[0].nodes(), &[MathNode::Char('a')]);
    assert_eq!(cells[1].nodes(), &[MathNode::Char('b')]);
    assert_eq!(to_latex(&tree), "\\frac{a}{b}");
}

#[test]
fn test_unknown_macro_keeps_source() {
    let tree = parse("\\bogusmacro{z}");
    assert_eq!(
        tree.nodes(),
        &[MathNode::unknown("\\bogusmacro"), MathNode::Char('z')]
    );
    assert_eq!(to_latex(&tree), "\\bogusmacro{z}");
}

#[test]
fn test_unterminated_group_is_closed() {
    let tree = parse("\\frac{a}{b");
    assert_eq!(to_latex(&tree), "\\frac{a}{b}");

    let tree = parse("\\frac{a}");
    let MathNode::Fraction { cells, .. } = &tree.nodes()[0] else {
        panic!("expected a fraction");
    };
    assert!(cells[1].is_empty());
}

#[test]
fn test_formula_hulls_round_trip() {
    for source in [
        "$x+y$",
        "\\[x+y\\]",
        "\\begin{equation}E=mc^{2}\\end{equation}",
        "\\begin{align*}a&=b\\\\c&=d\\end{align*}",
    ] {
        let formula = parse_formula(source);
        let written = mathed::write_formula(&formula);
        assert_eq!(parse_formula(&written), formula, "{}", source);
    }
}

// =============================================================================
// Cursor
// =============================================================================

#[test]
fn test_moving_right_through_script_leaves_it() {
    let tree = parse("x^{2}");
    let MathNode::Script {
        has_sup,
        has_sub,
        cells,
        ..
    } = &tree.nodes()[0]
    else {
        panic!("expected a script");
    };
    assert!(*has_sup);
    assert!(!*has_sub);
    assert_eq!(cells[NUCLEUS].nodes(), &[MathNode::Char('x')]);
    assert_eq!(cells[SUP].nodes(), &[MathNode::Char('2')]);
    assert!(cells[SUB].is_empty());

    let formula = Formula::from_cell(HullType::Simple, tree);
    let root = formula.grid();
    let mut cursor = Cursor::at(root, vec![CursorSlice::new(0, 0), CursorSlice::new(NUCLEUS, 0)]);
    assert!(cursor.right(root, false));
    assert!(cursor.right(root, false));
    assert_eq!(cursor.frames(), &[CursorSlice::new(0, 1)]);
}

#[test]
fn test_cursor_boundaries_are_total() {
    let formula = parse_formula("$\\frac{}{}$");
    let root = formula.grid();
    let mut cursor = Cursor::new();
    assert!(!cursor.left(root, false));
    assert!(cursor.right(root, false));
    assert_eq!(cursor.depth(), 2);
    assert!(cursor.right(root, false));
    assert!(!cursor.right(root, false));
    assert_eq!(cursor.frames(), &[CursorSlice::new(0, 1)]);
}

// =============================================================================
// Grids
// =============================================================================

#[test]
fn test_grid_rows_and_columns_grow() {
    let rows = (0..3)
        .map(|r| {
            (0..2)
                .map(|c| MathArray::from_chars(&format!("{}{}", r, c)))
                .collect()
        })
        .collect();
    let mut grid = GridNode::from_rows(GridKind::Matrix, rows).unwrap();

    grid.add_row(1);
    grid.add_column(0);

    assert_eq!((grid.nrows(), grid.cols()), (4, 3));
    assert!(grid.is_consistent());
    assert_eq!(grid.rows().len(), 4);
    assert_eq!(grid.rows()[2], RowInfo::default());
    assert_eq!(grid.rows()[3], RowInfo::default());

    assert_eq!(to_latex(grid.cell(1, 0).unwrap()), "10");
    assert_eq!(to_latex(grid.cell(3, 2).unwrap()), "21");
    for row in 0..4 {
        assert!(grid.cell(row, 1).unwrap().is_empty());
    }
    for col in 0..3 {
        assert!(grid.cell(2, col).unwrap().is_empty());
    }
}

#[test]
fn test_grid_never_loses_last_row_or_column() {
    let mut grid = GridNode::new(GridKind::Array, 1, 1);
    assert!(!grid.delete_row(0));
    assert!(!grid.delete_column(0));
    assert!(grid.is_consistent());
}

// =============================================================================
// Editing
// =============================================================================

#[test]
fn test_deleting_only_numerator_unwraps_fraction() {
    let formula = Formula::from_cell(
        HullType::Simple,
        MathArray::from_nodes(vec![MathNode::fraction(
            MathArray::from_chars("n"),
            MathArray::new(),
        )]),
    );
    let mut editor = MathEditor::new(formula);
    editor.move_right(false);
    editor.end(true);

    assert!(editor.delete());
    assert!(editor.formula().cell().is_empty());
    assert_eq!(editor.cursor().frames(), &[CursorSlice::new(0, 0)]);
    assert_eq!(editor.latex(), "$ $");
    assert_eq!(parse_formula(&editor.latex()), *editor.formula());
}

#[test]
fn test_emptied_single_cell_composites_disappear() {
    for source in ["$a\\mathrm{x}b$", "$a\\left(x\\right)b$", "$a\\hat{x}b$", "$a\\sqrt{x}b$"] {
        let mut editor = MathEditor::from_latex(source);
        editor.move_right(false);
        editor.move_right(false);
        editor.move_right(false);
        assert_eq!(editor.cursor().depth(), 2, "{}", source);
        editor.backspace();
        assert_eq!(editor.formula().cell().len(), 2, "{}", source);
        assert_eq!(editor.cursor().frames(), &[CursorSlice::new(0, 1)], "{}", source);
    }
}

#[test]
fn test_typing_a_formula() {
    let mut editor = MathEditor::empty();
    editor.set_hull(HullType::Equation);
    editor.type_text("x^2");
    editor.move_right(false);
    editor.type_text("+\\sqrt y");
    assert_eq!(editor.latex(), "\\[x^{2}+\\sqrt{y}\\]");
}

// =============================================================================
// Metrics
// =============================================================================

#[test]
fn test_nested_subscript_uses_scriptscript_size() {
    let metrics = FixedFontMetrics::new();
    let config = LayoutConfig::default();
    let engine = LayoutEngine::new(&metrics, &config);

    let formula = Formula::from_cell(HullType::Equation, parse("a_{b_{c}}"));
    let layout = engine.layout_formula(&formula);
    assert_eq!(layout.style, MathStyle::Display);

    let path = [
        CursorSlice::new(0, 0),
        CursorSlice::new(SUB, 0),
        CursorSlice::new(SUB, 0),
    ];
    let (_, inner) = layout.locate(&path).unwrap();
    assert_eq!(inner.style, MathStyle::ScriptScript);

    let lone = engine.metrics(&MathArray::from_chars("c"), MathStyle::ScriptScript);
    assert_eq!(inner.dim.width, lone.width);
    let text = engine.metrics(&MathArray::from_chars("c"), MathStyle::Text);
    assert!(lone.width < text.width);
}
