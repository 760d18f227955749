//! Error types for the mathed crate
//!
//! Parsing and editing never fail: malformed input is turned into a best-effort
//! tree. The variants below only come from writers with fallible sinks,
//! configuration loading and checked constructors.

use thiserror::Error;

/// Errors that can occur in math operations
#[derive(Error, Debug)]
pub enum MathError {
    /// Configuration document could not be decoded
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// The XML writer or its sink failed while writing MathML
    #[error("MathML writing error: {0}")]
    MathMlWrite(String),

    /// I/O error from a writer sink or a config file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Formatting into a string sink failed
    #[error("Format error: {0}")]
    Format(#[from] std::fmt::Error),

    /// A symbol name that is not in the symbol table
    #[error("Unknown symbol: \\{0}")]
    UnknownSymbol(String),

    /// A hand-built structure violates an arity or shape invariant
    #[error("Invalid math structure: {0}")]
    InvalidStructure(String),
}

/// Result type for math operations
pub type MathResult<T> = Result<T, MathError>;
