//! Error types for the simplex oracle.

use thiserror::Error;

/// Errors raised while loading or solving an LP.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimplexError {
    /// Problem data has inconsistent dimensions
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// A variable or constraint has an empty bound interval
    #[error("invalid bounds on {kind} {index}: [{lower}, {upper}]")]
    InvalidBounds {
        /// "column" or "row"
        kind: &'static str,
        /// Index of the offending entry
        index: usize,
        /// Lower bound
        lower: f64,
        /// Upper bound
        upper: f64,
    },

    /// Problem data contains NaN or an infinite matrix/objective entry
    #[error("non-finite value in {0}")]
    NonFinite(&'static str),

    /// The slack basis could not be inverted
    #[error("basis matrix is singular")]
    SingularBasis,
}

/// Result type for simplex operations.
pub type SimplexResult<T> = Result<T, SimplexError>;
