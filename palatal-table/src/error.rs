//! Error types for table loading and transformation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableError {
    /// Malformed input file: missing header, wrong column count,
    /// unparseable numeric cell, or a factor value outside the
    /// declared vocabulary. Fatal before any modeling.
    #[error("data format error at line {line}: {reason}")]
    DataFormat { line: usize, reason: String },

    /// Outcome recoding encountered a level absent from the mapping.
    #[error("column '{column}' has level '{value}' absent from the recoding map")]
    UnmappedLevel { column: String, value: String },

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("column '{column}' is not a {expected} column")]
    WrongColumnKind {
        column: String,
        expected: &'static str,
    },

    #[error("level '{level}' is not a level of column '{column}'")]
    UnknownLevel { column: String, level: String },

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse input: {0}")]
    Csv(#[from] csv::Error),
}
