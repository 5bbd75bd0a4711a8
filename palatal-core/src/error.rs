//! Error types for model fitting and post-hoc analysis.

use palatal_table::TableError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    /// The information matrix could not be factorized even after a
    /// ridge retry; the design is rank-deficient beyond repair.
    #[error("information matrix is singular: {0}")]
    Singular(String),

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// The outcome column is not a two-level factor or a 0/1 numeric column.
    #[error("outcome column '{column}' is not binary: {reason}")]
    NonBinaryOutcome { column: String, reason: String },

    #[error("cannot fit a model on an empty table")]
    EmptyTable,

    /// `predicted_probability` was asked to evaluate the linear predictor
    /// without a value for a column the model uses.
    #[error("no value supplied for model covariate '{0}'")]
    MissingCovariate(String),

    #[error(transparent)]
    Table(#[from] TableError),
}
