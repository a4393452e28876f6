//! Error types for the LP relaxation.
//!
//! Numeric overflow, oracle trouble and conflicts are normal events during
//! propagation and are reported in-band (boolean results, the trail's conflict
//! interface). The variants below cover construction, registration and
//! configuration.

use simplex_core::SimplexError;
use thiserror::Error;

/// Errors that can occur while building or configuring the relaxation.
#[derive(Error, Debug)]
pub enum RelaxError {
    /// Columns or constraints are malformed
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// A setting is out of range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Some row has inverted bounds; the model is unsatisfiable
    #[error("Relaxation is trivially infeasible: {0}")]
    Infeasible(String),

    /// The LP oracle rejected the problem
    #[error("LP oracle error: {0}")]
    Oracle(#[from] SimplexError),

    /// Integer arithmetic left the safe 64-bit range
    #[error("Integer overflow while building {0}")]
    Overflow(&'static str),
}

/// Result type for relaxation operations.
pub type RelaxResult<T> = Result<T, RelaxError>;
