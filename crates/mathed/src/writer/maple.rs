//! Maple writer

use super::cas::{CasDialect, CasWriter};
use crate::array::MathArray;

/// Serialize `array` as a Maple expression
pub fn to_maple(array: &MathArray) -> String {
    CasWriter::write(Maple, array)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Maple;

impl CasDialect for Maple {
    fn symbol(&self, name: &str) -> Option<&'static str> {
        Some(match name {
            "pi" => "Pi",
            "infty" => "infinity",
            "cdot" | "times" => "*",
            "div" => "/",
            "leq" | "le" => "<=",
            "geq" | "ge" => ">=",
            "neq" | "ne" => "<>",
            _ => return None,
        })
    }

    fn subscript(&self, base: &str, index: &str) -> String {
        format!("{}[{}]", base, index)
    }

    fn binomial(&self, n: &str, k: &str) -> String {
        format!("binomial({},{})", n, k)
    }

    fn root(&self, degree: &str, x: &str) -> String {
        format!("root({},{})", x, degree)
    }

    fn matrix(&self, rows: &[Vec<String>]) -> String {
        let rows: Vec<String> = rows.iter().map(|row| format!("[{}]", row.join(","))).collect();
        format!("matrix([{}])", rows.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn test_maple_expressions() {
        assert_eq!(to_maple(&parse("\\frac{a}{b}")), "(a)/(b)");
        assert_eq!(to_maple(&parse("x^2")), "(x)^(2)");
        assert_eq!(to_maple(&parse("x_i")), "x[i]");
        assert_eq!(to_maple(&parse("\\sqrt[3]{x}")), "root(x,3)");
        assert_eq!(to_maple(&parse("2\\pi\\cdot r")), "2Pi*r");
        assert_eq!(to_maple(&parse("\\binom{n}{k}")), "binomial(n,k)");
    }

    #[test]
    fn test_maple_functions_and_matrices() {
        assert_eq!(to_maple(&parse("\\sin x")), "sin(x)");
        assert_eq!(to_maple(&parse("\\sin\\left(x+y\\right)")), "sin(x+y)");
        assert_eq!(
            to_maple(&parse("\\begin{pmatrix}1&2\\\\3&4\\end{pmatrix}")),
            "matrix([[1,2],[3,4]])"
        );
        assert_eq!(to_maple(&parse("\\left|x\\right|")), "abs(x)");
    }
}
