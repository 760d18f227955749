//! Draw pass - paint a laid out formula through an abstract painter
//!
//! Drawing never measures anything: every offset comes from the
//! [`FormulaLayout`] produced by the metrics pass. While painting, the
//! renderer records the absolute box of every editable cell in a
//! [`HitCache`], which maps a pointer position back to a cursor path.

use crate::config::{Color, MathConfig, RenderConfig};
use crate::cursor::{CursorSlice, SelectionRange};
use crate::deco::deco_polylines;
use crate::font::FontInfo;
use crate::layout::{CellLayout, FormulaLayout, Ink, LayoutItem, NodeLayout, Point};
use serde::{Deserialize, Serialize};
use tracing::trace;

// =============================================================================
// Render Primitives
// =============================================================================

/// An axis-aligned rectangle in device units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    /// Squared distance from `p` to the nearest point of the rectangle
    pub fn distance_sq(&self, p: Point) -> i64 {
        let dx = (self.x - p.x).max(p.x - (self.x + self.width)).max(0) as i64;
        let dy = (self.y - p.y).max(p.y - (self.y + self.height)).max(0) as i64;
        dx * dx + dy * dy
    }
}

/// A recorded painter call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RenderPrimitive {
    /// Text with its baseline starting at `position`
    Text {
        text: String,
        position: Point,
        font: FontInfo,
        color: Color,
    },
    Line {
        start: Point,
        end: Point,
        color: Color,
    },
    Polyline {
        points: Vec<Point>,
        color: Color,
    },
    Rectangle {
        rect: Rect,
        color: Color,
        filled: bool,
    },
}

/// Drawing primitives supplied by the host
pub trait Painter {
    fn draw_text(&mut self, x: i32, y: i32, text: &str, font: &FontInfo, color: Color);

    fn draw_line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, color: Color);

    /// Connected line segments through `points`
    fn draw_polyline(&mut self, points: &[Point], color: Color) {
        for pair in points.windows(2) {
            self.draw_line(pair[0].x, pair[0].y, pair[1].x, pair[1].y, color);
        }
    }

    fn draw_rectangle(&mut self, rect: Rect, color: Color, filled: bool);
}

/// Painter that keeps every call as a [`RenderPrimitive`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordingPainter {
    pub primitives: Vec<RenderPrimitive>,
}

impl RecordingPainter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    /// All text runs in painting order
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.primitives.iter().filter_map(|p| match p {
            RenderPrimitive::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

impl Painter for RecordingPainter {
    fn draw_text(&mut self, x: i32, y: i32, text: &str, font: &FontInfo, color: Color) {
        self.primitives.push(RenderPrimitive::Text {
            text: text.to_string(),
            position: Point::new(x, y),
            font: *font,
            color,
        });
    }

    fn draw_line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, color: Color) {
        self.primitives.push(RenderPrimitive::Line {
            start: Point::new(x1, y1),
            end: Point::new(x2, y2),
            color,
        });
    }

    fn draw_polyline(&mut self, points: &[Point], color: Color) {
        self.primitives.push(RenderPrimitive::Polyline {
            points: points.to_vec(),
            color,
        });
    }

    fn draw_rectangle(&mut self, rect: Rect, color: Color, filled: bool) {
        self.primitives.push(RenderPrimitive::Rectangle {
            rect,
            color,
            filled,
        });
    }
}

// =============================================================================
// Hit Testing
// =============================================================================

/// Absolute geometry of one editable cell from the last draw
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitCell {
    /// Cursor path to the cell; the last frame's position is zero
    pub path: Vec<CursorSlice>,
    pub bounds: Rect,
    /// Absolute x of every cursor position in the cell
    pub xs: Vec<i32>,
}

/// Cell boxes recorded by the last draw, for click-to-position
///
/// The cache is derived data. It describes the tree as it was when drawn and
/// must be thrown away whenever the formula changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitCache {
    cells: Vec<HitCell>,
}

impl HitCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cells(&self) -> &[HitCell] {
        &self.cells
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Cursor path closest to the pointer at (`x`, `y`)
    ///
    /// The innermost cell containing the point wins; when no cell contains
    /// it, the nearest cell is used.
    pub fn position_at(&self, x: i32, y: i32) -> Option<Vec<CursorSlice>> {
        let p = Point::new(x, y);
        let cell = self
            .cells
            .iter()
            .filter(|cell| cell.bounds.contains(p))
            .max_by_key(|cell| (cell.path.len(), std::cmp::Reverse(cell.bounds.area())))
            .or_else(|| {
                self.cells
                    .iter()
                    .min_by_key(|cell| (cell.bounds.distance_sq(p), std::cmp::Reverse(cell.path.len())))
            })?;

        let pos = cell
            .xs
            .iter()
            .enumerate()
            .min_by_key(|(_, cx)| (**cx - x).abs())
            .map(|(pos, _)| pos)
            .unwrap_or(0);
        let mut path = cell.path.clone();
        if let Some(last) = path.last_mut() {
            last.pos = pos;
        }
        Some(path)
    }
}

// =============================================================================
// Renderer
// =============================================================================

/// Paints layouts with a fixed set of colors
#[derive(Debug, Clone)]
pub struct Renderer {
    config: RenderConfig,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            config: RenderConfig::default(),
        }
    }

    pub fn with_config(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn from_math_config(config: &MathConfig) -> Self {
        Self::with_config(config.render.clone())
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Paint `layout` with its left baseline point at `origin`
    ///
    /// The selection, if any, is highlighted before content is painted.
    pub fn draw(
        &self,
        layout: &FormulaLayout,
        origin: Point,
        selection: Option<&SelectionRange>,
        painter: &mut dyn Painter,
    ) -> HitCache {
        if let Some(selection) = selection {
            self.draw_selection(layout, origin, selection, painter);
        }

        let mut hits = HitCache::new();
        let root = &layout.root;
        self.draw_items(root, origin, painter);
        for (idx, placed) in root.cells.iter().enumerate() {
            let cell_origin = origin.offset(placed.dx, placed.dy);
            let mut path = vec![CursorSlice::new(idx, 0)];
            self.draw_cell(&placed.layout, cell_origin, &mut path, true, &mut hits, painter);
        }
        trace!("drew formula, {} hit cells", hits.cells.len());
        hits
    }

    /// Filled highlight behind the selected range
    pub fn draw_selection(
        &self,
        layout: &FormulaLayout,
        origin: Point,
        selection: &SelectionRange,
        painter: &mut dyn Painter,
    ) {
        let Some((cell_origin, cell)) = layout.locate(&selection.path) else {
            return;
        };
        let (Some(x1), Some(x2)) = (cell.xs.get(selection.from), cell.xs.get(selection.to)) else {
            return;
        };
        let top = origin.y + cell_origin.y - cell.dim.ascent;
        let rect = Rect::new(
            origin.x + cell_origin.x + x1,
            top,
            x2 - x1,
            cell.dim.height(),
        );
        painter.draw_rectangle(rect, self.config.selection_color, true);
    }

    /// Caret line at the cursor position
    pub fn draw_cursor(
        &self,
        layout: &FormulaLayout,
        origin: Point,
        frames: &[CursorSlice],
        painter: &mut dyn Painter,
    ) {
        if let Some((point, dim)) = layout.cursor_box(frames) {
            let x = origin.x + point.x;
            let y = origin.y + point.y;
            painter.draw_line(
                x,
                y - dim.ascent,
                x,
                y + dim.descent,
                self.config.cursor_color,
            );
        }
    }

    fn draw_cell(
        &self,
        cell: &CellLayout,
        origin: Point,
        path: &mut Vec<CursorSlice>,
        editable: bool,
        hits: &mut HitCache,
        painter: &mut dyn Painter,
    ) {
        let bounds = Rect::new(
            origin.x,
            origin.y - cell.dim.ascent,
            cell.dim.width,
            cell.dim.height(),
        );
        if editable {
            hits.cells.push(HitCell {
                path: path.clone(),
                bounds,
                xs: cell.xs.iter().map(|x| origin.x + x).collect(),
            });
        }
        if cell.framed {
            painter.draw_rectangle(bounds, self.config.frame_color, false);
        }

        for (pos, node) in cell.nodes.iter().enumerate() {
            let node_origin = origin.offset(node.x, 0);
            self.draw_items(node, node_origin, painter);

            for view in node.views.iter().filter(|view| view.shown) {
                let view_origin = node_origin.offset(view.dx, view.dy);
                self.draw_cell(&view.layout, view_origin, path, false, hits, painter);
            }

            for (idx, placed) in node.cells.iter().enumerate() {
                if !placed.shown {
                    continue;
                }
                if let Some(last) = path.last_mut() {
                    last.pos = pos;
                }
                path.push(CursorSlice::new(idx, 0));
                let child_origin = node_origin.offset(placed.dx, placed.dy);
                self.draw_cell(&placed.layout, child_origin, path, editable, hits, painter);
                path.pop();
            }
        }
        if let Some(last) = path.last_mut() {
            last.pos = 0;
        }
    }

    fn ink_color(&self, ink: Ink) -> Color {
        match ink {
            Ink::Text => self.config.text_color,
            Ink::Error => self.config.error_color,
            Ink::Macro => self.config.macro_color,
        }
    }

    fn draw_items(&self, node: &NodeLayout, origin: Point, painter: &mut dyn Painter) {
        let color = self.config.text_color;
        for item in &node.items {
            match item {
                LayoutItem::Glyph {
                    x,
                    y,
                    text,
                    font,
                    ink,
                } => {
                    painter.draw_text(origin.x + x, origin.y + y, text, font, self.ink_color(*ink));
                }
                LayoutItem::Rule {
                    x,
                    y,
                    width,
                    height,
                } => {
                    let rect = Rect::new(origin.x + x, origin.y + y, *width, *height);
                    painter.draw_rectangle(rect, color, true);
                }
                LayoutItem::Deco {
                    x,
                    y,
                    width,
                    height,
                    name,
                } => {
                    let Some(lines) =
                        deco_polylines(name, origin.x + x, origin.y + y, *width, *height)
                    else {
                        trace!("no deco template for {}", name);
                        continue;
                    };
                    for line in lines {
                        painter.draw_polyline(&line, color);
                    }
                }
                LayoutItem::Frame {
                    x,
                    y,
                    width,
                    height,
                } => {
                    let rect = Rect::new(origin.x + x, origin.y + y, *width, *height);
                    painter.draw_rectangle(rect, self.config.frame_color, false);
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::MathArray;
    use crate::config::LayoutConfig;
    use crate::font::FixedFontMetrics;
    use crate::formula::{Formula, HullType};
    use crate::layout::LayoutEngine;
    use crate::model::MathNode;

    fn layout_of(content: MathArray) -> FormulaLayout {
        let metrics = FixedFontMetrics::new();
        let config = LayoutConfig::default();
        let engine = LayoutEngine::new(&metrics, &config);
        engine.layout_formula(&Formula::from_cell(HullType::Simple, content))
    }

    #[test]
    fn test_rect_contains() {
        let rect = Rect::new(0, 0, 10, 5);
        assert!(rect.contains(Point::new(10, 5)));
        assert!(!rect.contains(Point::new(11, 0)));
        assert_eq!(rect.distance_sq(Point::new(13, 9)), 9 + 16);
    }

    #[test]
    fn test_draw_simple_text() {
        let layout = layout_of(MathArray::from_chars("xy"));
        let mut painter = RecordingPainter::new();
        Renderer::new().draw(&layout, Point::new(0, 20), None, &mut painter);
        assert_eq!(painter.texts().collect::<Vec<_>>(), vec!["x", "y"]);
    }

    #[test]
    fn test_draw_fraction_rule() {
        let layout = layout_of(MathArray::from_nodes(vec![MathNode::fraction(
            MathArray::from_chars("a"),
            MathArray::from_chars("b"),
        )]));
        let mut painter = RecordingPainter::new();
        Renderer::new().draw(&layout, Point::default(), None, &mut painter);
        let filled = painter
            .primitives
            .iter()
            .filter(|p| matches!(p, RenderPrimitive::Rectangle { filled: true, .. }))
            .count();
        assert_eq!(filled, 1);
        assert_eq!(painter.texts().count(), 2);
    }

    #[test]
    fn test_draw_sqrt_uses_polyline() {
        let layout = layout_of(MathArray::from_nodes(vec![MathNode::sqrt(
            MathArray::from_chars("x"),
        )]));
        let mut painter = RecordingPainter::new();
        Renderer::new().draw(&layout, Point::default(), None, &mut painter);
        assert!(painter
            .primitives
            .iter()
            .any(|p| matches!(p, RenderPrimitive::Polyline { .. })));
    }

    #[test]
    fn test_unknown_drawn_in_error_color() {
        let layout = layout_of(MathArray::from_nodes(vec![MathNode::unknown("\\bogus")]));
        let mut painter = RecordingPainter::new();
        let renderer = Renderer::new();
        renderer.draw(&layout, Point::default(), None, &mut painter);
        let color = painter.primitives.iter().find_map(|p| match p {
            RenderPrimitive::Text { color, .. } => Some(*color),
            _ => None,
        });
        assert_eq!(color, Some(renderer.config().error_color));
    }

    #[test]
    fn test_empty_cell_framed() {
        let layout = layout_of(MathArray::new());
        let mut painter = RecordingPainter::new();
        Renderer::new().draw(&layout, Point::default(), None, &mut painter);
        assert!(matches!(
            painter.primitives.as_slice(),
            [RenderPrimitive::Rectangle { filled: false, .. }]
        ));
    }

    #[test]
    fn test_selection_painted_first() {
        let layout = layout_of(MathArray::from_chars("abc"));
        let selection = SelectionRange {
            path: vec![CursorSlice::new(0, 0)],
            from: 1,
            to: 3,
        };
        let mut painter = RecordingPainter::new();
        Renderer::new().draw(&layout, Point::default(), Some(&selection), &mut painter);
        match &painter.primitives[0] {
            RenderPrimitive::Rectangle { rect, filled, .. } => {
                assert!(*filled);
                assert!(rect.x > 0);
                assert!(rect.width > 0);
            }
            other => panic!("expected highlight, got {:?}", other),
        }
    }

    #[test]
    fn test_hit_cache_finds_denominator() {
        let layout = layout_of(MathArray::from_nodes(vec![MathNode::fraction(
            MathArray::from_chars("a"),
            MathArray::from_chars("b"),
        )]));
        let mut painter = RecordingPainter::new();
        let hits = Renderer::new().draw(&layout, Point::new(100, 100), None, &mut painter);
        assert_eq!(hits.cells().len(), 3);

        let den = hits
            .cells()
            .iter()
            .find(|cell| cell.path == vec![CursorSlice::new(0, 0), CursorSlice::new(1, 0)])
            .unwrap();
        let x = den.xs[1];
        let y = den.bounds.y + den.bounds.height / 2;
        let path = hits.position_at(x, y).unwrap();
        assert_eq!(path, vec![CursorSlice::new(0, 0), CursorSlice::new(1, 1)]);
    }

    #[test]
    fn test_hit_cache_outside_falls_back_to_nearest() {
        let layout = layout_of(MathArray::from_chars("ab"));
        let mut painter = RecordingPainter::new();
        let hits = Renderer::new().draw(&layout, Point::default(), None, &mut painter);
        let path = hits.position_at(10_000, 0).unwrap();
        assert_eq!(path, vec![CursorSlice::new(0, 2)]);
        assert!(HitCache::new().position_at(0, 0).is_none());
    }

    #[test]
    fn test_draw_cursor_line() {
        let layout = layout_of(MathArray::from_chars("ab"));
        let mut painter = RecordingPainter::new();
        Renderer::new().draw_cursor(&layout, Point::default(), &[CursorSlice::new(0, 1)], &mut painter);
        match &painter.primitives[..] {
            [RenderPrimitive::Line { start, end, .. }] => {
                assert_eq!(start.x, end.x);
                assert!(start.y < end.y);
                assert!(start.x > 0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
