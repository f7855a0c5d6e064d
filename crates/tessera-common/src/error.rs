//! Error types for Tessera.

use thiserror::Error;

/// Result type alias using TesseraError.
pub type Result<T> = std::result::Result<T, TesseraError>;

/// Errors that can occur in Tessera operations.
#[derive(Debug, Error)]
pub enum TesseraError {
    // Constraint errors
    #[error("[NotUnique] column {column} already holds value {value}")]
    NotUnique { column: String, value: String },

    #[error("Row arity mismatch: expected {expected} values, got {actual}")]
    RowArity { expected: usize, actual: usize },

    // Lookup errors
    #[error("Column not found: {0}")]
    ColumnNotFound(usize),

    #[error("Index not found for column {0}")]
    IndexNotFound(usize),

    #[error("Row not found: {0}")]
    RowNotFound(usize),

    // Value errors
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    // Program errors
    #[error("Invalid instruction: {0}")]
    InvalidInstruction(String),

    // B+ tree errors
    #[error("B+ tree corrupted: {0}")]
    BTreeCorrupted(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },

    // Internal errors
    #[error("Internal inconsistency: {0}")]
    InternalInconsistency(String),
}

impl TesseraError {
    /// Returns true for faults that indicate a bug rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            TesseraError::BTreeCorrupted(_) | TesseraError::InternalInconsistency(_)
        )
    }
}
