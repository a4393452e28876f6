//! Bounded revised simplex used as the numeric oracle of an LP relaxation.
//!
//! The solver works on problems of the form
//!
//! ```text
//! minimize    c^T x + offset
//! subject to  row_lower <= A x <= row_upper
//!             col_lower <=  x  <= col_upper
//! ```
//!
//! and exposes what a cutting-plane engine needs from a simplex: warm-start
//! bases, an iteration cap, duals and reduced costs, row and column statuses,
//! rows of the basis inverse, and a Farkas dual ray on infeasibility.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod basis;
pub mod error;
pub mod problem;
pub mod simplex;

pub use basis::BasisState;
pub use error::{SimplexError, SimplexResult};
pub use problem::{from_triplets, LpProblem, ProblemStatus, SimplexSettings, SparseCsc, VariableStatus};
pub use simplex::RevisedSimplex;
