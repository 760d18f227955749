//! Octave writer

use super::cas::{CasDialect, CasWriter};
use crate::array::MathArray;

/// Serialize `array` as an Octave expression
pub fn to_octave(array: &MathArray) -> String {
    CasWriter::write(Octave, array)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Octave;

impl CasDialect for Octave {
    fn symbol(&self, name: &str) -> Option<&'static str> {
        Some(match name {
            "pi" => "pi",
            "infty" => "Inf",
            "cdot" | "times" => "*",
            "div" => "/",
            "leq" | "le" => "<=",
            "geq" | "ge" => ">=",
            "neq" | "ne" => "!=",
            "ln" => "log",
            _ => return None,
        })
    }

    fn function(&self, name: &str) -> String {
        match name {
            "ln" => "log".to_string(),
            name => name.to_string(),
        }
    }

    fn subscript(&self, base: &str, index: &str) -> String {
        format!("{}({})", base, index)
    }

    fn binomial(&self, n: &str, k: &str) -> String {
        format!("nchoosek({},{})", n, k)
    }

    fn matrix(&self, rows: &[Vec<String>]) -> String {
        let rows: Vec<String> = rows.iter().map(|row| row.join(", ")).collect();
        format!("[{}]", rows.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn test_octave_expressions() {
        assert_eq!(to_octave(&parse("\\frac{a}{b}")), "(a)/(b)");
        assert_eq!(to_octave(&parse("x_i")), "x(i)");
        assert_eq!(to_octave(&parse("\\sqrt[3]{x}")), "(x)^(1/(3))");
        assert_eq!(to_octave(&parse("\\ln x")), "log(x)");
        assert_eq!(to_octave(&parse("\\binom{n}{k}")), "nchoosek(n,k)");
    }

    #[test]
    fn test_octave_matrix() {
        assert_eq!(
            to_octave(&parse("\\begin{bmatrix}1&2\\\\3&4\\end{bmatrix}")),
            "[1, 2; 3, 4]"
        );
    }
}
