//! Mathematica writer

use super::cas::{CasDialect, CasWriter};
use crate::array::MathArray;

/// Serialize `array` as a Mathematica expression
pub fn to_mathematica(array: &MathArray) -> String {
    CasWriter::write(Mathematica, array)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Mathematica;

impl CasDialect for Mathematica {
    fn symbol(&self, name: &str) -> Option<&'static str> {
        Some(match name {
            "pi" => "Pi",
            "infty" => "Infinity",
            "cdot" | "times" => "*",
            "div" => "/",
            "leq" | "le" => "<=",
            "geq" | "ge" => ">=",
            "neq" | "ne" => "!=",
            "ln" => "Log",
            _ => return None,
        })
    }

    fn char(&self, c: char) -> String {
        match c {
            '=' => "==".to_string(),
            c => c.to_string(),
        }
    }

    fn function(&self, name: &str) -> String {
        if name == "ln" {
            return "Log".to_string();
        }
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => String::new(),
        }
    }

    fn apply(&self, function: &str, args: &[String]) -> String {
        format!("{}[{}]", function, args.join(", "))
    }

    fn power(&self, base: &str, exponent: &str) -> String {
        format!("Power[{}, {}]", base, exponent)
    }

    fn subscript(&self, base: &str, index: &str) -> String {
        format!("Subscript[{}, {}]", base, index)
    }

    fn fraction(&self, num: &str, den: &str) -> String {
        format!("Divide[{}, {}]", num, den)
    }

    fn binomial(&self, n: &str, k: &str) -> String {
        format!("Binomial[{}, {}]", n, k)
    }

    fn sqrt(&self, x: &str) -> String {
        format!("Sqrt[{}]", x)
    }

    fn root(&self, degree: &str, x: &str) -> String {
        format!("Surd[{}, {}]", x, degree)
    }

    fn abs(&self, x: &str) -> String {
        format!("Abs[{}]", x)
    }

    fn matrix(&self, rows: &[Vec<String>]) -> String {
        let rows: Vec<String> = rows
            .iter()
            .map(|row| format!("{{{}}}", row.join(", ")))
            .collect();
        format!("{{{}}}", rows.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn test_mathematica_expressions() {
        assert_eq!(to_mathematica(&parse("\\frac{a}{b}")), "Divide[a, b]");
        assert_eq!(to_mathematica(&parse("x^2")), "Power[x, 2]");
        assert_eq!(to_mathematica(&parse("x_i")), "Subscript[x, i]");
        assert_eq!(to_mathematica(&parse("\\sqrt{x}")), "Sqrt[x]");
        assert_eq!(to_mathematica(&parse("a=b")), "a==b");
        assert_eq!(to_mathematica(&parse("\\infty")), "Infinity");
    }

    #[test]
    fn test_mathematica_functions_and_matrices() {
        assert_eq!(to_mathematica(&parse("\\sin x")), "Sin[x]");
        assert_eq!(to_mathematica(&parse("\\ln x")), "Log[x]");
        assert_eq!(
            to_mathematica(&parse("\\begin{matrix}1&2\\\\3&4\\end{matrix}")),
            "{{1, 2}, {3, 4}}"
        );
    }
}
