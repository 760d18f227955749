//! Vector decorations - stretchy symbols drawn from normalized polylines
//!
//! Each template is a set of polylines in the unit square (x right, y down).
//! A named deco refers to a template plus a quarter-turn rotation; drawing it
//! rotates the template about the square's center and scales it to the box
//! the metrics pass reserved.

use crate::layout::Point;
use std::collections::HashMap;
use std::sync::OnceLock;

/// A polyline in unit-square coordinates
pub type Polyline = &'static [(f32, f32)];

/// Clockwise rotation in quarter turns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quadrant {
    Zero,
    Quarter,
    Half,
    ThreeQuarters,
}

impl Quadrant {
    /// Rotate a unit-square point about (0.5, 0.5)
    pub fn rotate(self, (x, y): (f32, f32)) -> (f32, f32) {
        let (u, v) = (x - 0.5, y - 0.5);
        let (u, v) = match self {
            Quadrant::Zero => (u, v),
            Quadrant::Quarter => (-v, u),
            Quadrant::Half => (-u, -v),
            Quadrant::ThreeQuarters => (v, -u),
        };
        (u + 0.5, v + 0.5)
    }
}

/// A named entry of the deco table
#[derive(Debug, Clone, Copy)]
pub struct Deco {
    pub name: &'static str,
    pub quadrant: Quadrant,
    pub template: &'static [Polyline],
}

impl Deco {
    /// Polylines transformed into the box at (`x`, `y`) of the given size
    pub fn polylines(&self, x: i32, y: i32, width: i32, height: i32) -> Vec<Vec<Point>> {
        let (w, h) = (width.max(0) as f32, height.max(0) as f32);
        self.template
            .iter()
            .map(|line| {
                line.iter()
                    .map(|&p| {
                        let (px, py) = self.quadrant.rotate(p);
                        Point::new(x + (px * w).round() as i32, y + (py * h).round() as i32)
                    })
                    .collect()
            })
            .collect()
    }
}

/// Look up a deco by name
pub fn lookup_deco(name: &str) -> Option<&'static Deco> {
    table().get(name).copied()
}

/// Transformed polylines of the named deco, `None` for unknown names
pub fn deco_polylines(name: &str, x: i32, y: i32, width: i32, height: i32) -> Option<Vec<Vec<Point>>> {
    lookup_deco(name).map(|deco| deco.polylines(x, y, width, height))
}

fn table() -> &'static HashMap<&'static str, &'static Deco> {
    static TABLE: OnceLock<HashMap<&'static str, &'static Deco>> = OnceLock::new();
    TABLE.get_or_init(|| DECOS.iter().map(|d| (d.name, d)).collect())
}

// =============================================================================
// Templates
// =============================================================================

const PAREN: &[Polyline] = &[&[
    (0.9, 0.0),
    (0.5, 0.12),
    (0.25, 0.32),
    (0.2, 0.5),
    (0.25, 0.68),
    (0.5, 0.88),
    (0.9, 1.0),
]];

const BRACKET: &[Polyline] = &[&[(0.9, 0.0), (0.3, 0.0), (0.3, 1.0), (0.9, 1.0)]];

const BRACE: &[Polyline] = &[&[
    (0.9, 0.0),
    (0.6, 0.05),
    (0.5, 0.15),
    (0.5, 0.4),
    (0.2, 0.5),
    (0.5, 0.6),
    (0.5, 0.85),
    (0.6, 0.95),
    (0.9, 1.0),
]];

const ANGLE: &[Polyline] = &[&[(0.8, 0.0), (0.2, 0.5), (0.8, 1.0)]];

const FLOOR: &[Polyline] = &[&[(0.3, 0.0), (0.3, 1.0), (0.9, 1.0)]];

const CEIL: &[Polyline] = &[&[(0.3, 1.0), (0.3, 0.0), (0.9, 0.0)]];

const VERT: &[Polyline] = &[&[(0.5, 0.0), (0.5, 1.0)]];

const DOUBLE_VERT: &[Polyline] = &[&[(0.3, 0.0), (0.3, 1.0)], &[(0.7, 0.0), (0.7, 1.0)]];

const SLASH: &[Polyline] = &[&[(0.9, 0.0), (0.1, 1.0)]];

const RADICAL: &[Polyline] = &[&[(0.0, 0.6), (0.15, 0.5), (0.45, 1.0), (0.85, 0.0), (1.0, 0.0)]];

const HAT: &[Polyline] = &[&[(0.0, 1.0), (0.5, 0.0), (1.0, 1.0)]];

const TILDE: &[Polyline] = &[&[(0.0, 0.8), (0.25, 0.2), (0.5, 0.5), (0.75, 0.8), (1.0, 0.2)]];

const BAR: &[Polyline] = &[&[(0.0, 0.5), (1.0, 0.5)]];

const ARROW: &[Polyline] = &[
    &[(0.0, 0.5), (1.0, 0.5)],
    &[(0.8, 0.1), (1.0, 0.5), (0.8, 0.9)],
];

const DOUBLE_ARROW: &[Polyline] = &[
    &[(0.0, 0.5), (1.0, 0.5)],
    &[(0.8, 0.1), (1.0, 0.5), (0.8, 0.9)],
    &[(0.2, 0.1), (0.0, 0.5), (0.2, 0.9)],
];

const DOT: &[Polyline] = &[&[(0.4, 0.3), (0.6, 0.3), (0.6, 0.7), (0.4, 0.7), (0.4, 0.3)]];

const DDOT: &[Polyline] = &[
    &[(0.15, 0.3), (0.35, 0.3), (0.35, 0.7), (0.15, 0.7), (0.15, 0.3)],
    &[(0.65, 0.3), (0.85, 0.3), (0.85, 0.7), (0.65, 0.7), (0.65, 0.3)],
];

const ACUTE: &[Polyline] = &[&[(0.3, 1.0), (0.7, 0.0)]];

const GRAVE: &[Polyline] = &[&[(0.3, 0.0), (0.7, 1.0)]];

const BREVE: &[Polyline] = &[&[(0.0, 0.0), (0.2, 0.7), (0.5, 1.0), (0.8, 0.7), (1.0, 0.0)]];

const fn deco(name: &'static str, quadrant: Quadrant, template: &'static [Polyline]) -> Deco {
    Deco {
        name,
        quadrant,
        template,
    }
}

use Quadrant::{Half, Quarter, ThreeQuarters, Zero};

static DECOS: &[Deco] = &[
    // delimiters
    deco("(", Zero, PAREN),
    deco(")", Half, PAREN),
    deco("[", Zero, BRACKET),
    deco("]", Half, BRACKET),
    deco("\\{", Zero, BRACE),
    deco("\\}", Half, BRACE),
    deco("\\lbrace", Zero, BRACE),
    deco("\\rbrace", Half, BRACE),
    deco("\\langle", Zero, ANGLE),
    deco("\\rangle", Half, ANGLE),
    deco("\\lfloor", Zero, FLOOR),
    deco("\\rfloor", Half, CEIL),
    deco("\\lceil", Zero, CEIL),
    deco("\\rceil", Half, FLOOR),
    deco("|", Zero, VERT),
    deco("\\vert", Zero, VERT),
    deco("\\|", Zero, DOUBLE_VERT),
    deco("\\Vert", Zero, DOUBLE_VERT),
    deco("/", Zero, SLASH),
    deco("\\backslash", Quarter, SLASH),
    // radical
    deco("sqrt", Zero, RADICAL),
    // accents
    deco("hat", Zero, HAT),
    deco("check", Half, HAT),
    deco("tilde", Zero, TILDE),
    deco("bar", Zero, BAR),
    deco("vec", Zero, ARROW),
    deco("dot", Zero, DOT),
    deco("ddot", Zero, DDOT),
    deco("acute", Zero, ACUTE),
    deco("grave", Zero, GRAVE),
    deco("breve", Zero, BREVE),
    // wide decorations
    deco("rightarrow", Zero, ARROW),
    deco("leftarrow", Half, ARROW),
    deco("leftrightarrow", Zero, DOUBLE_ARROW),
    deco("overbrace", Quarter, BRACE),
    deco("underbrace", ThreeQuarters, BRACE),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DecorationKind;
    use crate::symbols::is_delimiter_name;

    #[test]
    fn test_quadrant_rotation() {
        assert_eq!(Quadrant::Zero.rotate((0.25, 0.5)), (0.25, 0.5));
        assert_eq!(Quadrant::Half.rotate((0.0, 0.0)), (1.0, 1.0));
        // a left-pointing tip turns upward
        let (x, y) = Quadrant::Quarter.rotate((0.2, 0.5));
        assert!((x - 0.5).abs() < 1e-6);
        assert!((y - 0.2).abs() < 1e-6);
        let (x, y) = Quadrant::ThreeQuarters.rotate((0.2, 0.5));
        assert!((x - 0.5).abs() < 1e-6);
        assert!((y - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_polylines_scale_to_box() {
        let lines = deco_polylines("[", 10, 20, 8, 40).unwrap();
        assert_eq!(
            lines[0],
            vec![
                Point::new(17, 20),
                Point::new(12, 20),
                Point::new(12, 60),
                Point::new(17, 60)
            ]
        );
    }

    #[test]
    fn test_right_bracket_mirrors_left() {
        let left = deco_polylines("[", 0, 0, 10, 10).unwrap();
        let right = deco_polylines("]", 0, 0, 10, 10).unwrap();
        assert_eq!(right[0][0], Point::new(10 - left[0][0].x, 10 - left[0][0].y));
    }

    #[test]
    fn test_every_decoration_has_template() {
        for name in [
            "hat", "widehat", "tilde", "bar", "overline", "underline", "vec", "dot", "ddot",
            "acute", "grave", "breve", "check", "overrightarrow", "overleftarrow",
            "overleftrightarrow", "overbrace", "underbrace",
        ] {
            let kind = DecorationKind::from_name(name).unwrap();
            assert!(lookup_deco(kind.deco_name()).is_some(), "{}", name);
        }
    }

    #[test]
    fn test_every_delimiter_has_template() {
        for name in [
            "(", ")", "[", "]", "|", "/", "\\{", "\\}", "\\|", "\\langle", "\\rangle",
            "\\lfloor", "\\rfloor", "\\lceil", "\\rceil", "\\vert", "\\Vert", "\\lbrace",
            "\\rbrace", "\\backslash",
        ] {
            assert!(is_delimiter_name(name));
            assert!(lookup_deco(name).is_some(), "{}", name);
        }
        assert!(lookup_deco(".").is_none());
    }

    #[test]
    fn test_degenerate_box() {
        let lines = deco_polylines("sqrt", 5, 5, -3, 0).unwrap();
        assert!(lines[0].iter().all(|p| *p == Point::new(5, 5)));
    }
}
