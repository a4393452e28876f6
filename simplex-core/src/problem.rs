//! LP problem data, solver settings and status types.
//!
//! Problems are stored in the bounded form
//!
//! ```text
//! minimize    c^T x + offset
//! subject to  row_lower <= A x <= row_upper
//!             col_lower <=  x  <= col_upper
//! ```
//!
//! where any bound may be infinite. The matrix is kept in CSC format.

use crate::error::{SimplexError, SimplexResult};
use sprs::{CsMat, TriMat};
use std::time::Instant;

/// Sparse matrix in CSC format.
pub type SparseCsc = CsMat<f64>;

/// Build a sparse CSC matrix from triplets (row, col, value).
pub fn from_triplets<I>(nrows: usize, ncols: usize, triplets: I) -> SparseCsc
where
    I: IntoIterator<Item = (usize, usize, f64)>,
{
    let mut tri = TriMat::new((nrows, ncols));
    for (i, j, v) in triplets {
        tri.add_triplet(i, j, v);
    }
    tri.to_csc()
}

/// A linear program in bounded form.
#[derive(Debug, Clone)]
pub struct LpProblem {
    matrix: SparseCsc,
    /// Objective coefficients (length n)
    pub objective: Vec<f64>,
    /// Constant added to the objective value
    pub objective_offset: f64,
    /// Column lower bounds (may be -inf)
    pub col_lower: Vec<f64>,
    /// Column upper bounds (may be +inf)
    pub col_upper: Vec<f64>,
    /// Row lower bounds (may be -inf)
    pub row_lower: Vec<f64>,
    /// Row upper bounds (may be +inf)
    pub row_upper: Vec<f64>,
}

impl LpProblem {
    /// Create a problem with `num_cols` free columns and no rows.
    pub fn new(num_cols: usize) -> Self {
        Self {
            matrix: from_triplets(0, num_cols, std::iter::empty()),
            objective: vec![0.0; num_cols],
            objective_offset: 0.0,
            col_lower: vec![f64::NEG_INFINITY; num_cols],
            col_upper: vec![f64::INFINITY; num_cols],
            row_lower: Vec::new(),
            row_upper: Vec::new(),
        }
    }

    /// Replace the constraint matrix and row bounds.
    ///
    /// Column data (objective and bounds) is left untouched.
    pub fn set_rows<I>(&mut self, row_lower: Vec<f64>, row_upper: Vec<f64>, triplets: I)
    where
        I: IntoIterator<Item = (usize, usize, f64)>,
    {
        let num_rows = row_lower.len();
        self.matrix = from_triplets(num_rows, self.num_cols(), triplets);
        self.row_lower = row_lower;
        self.row_upper = row_upper;
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.row_lower.len()
    }

    /// Number of columns.
    pub fn num_cols(&self) -> usize {
        self.objective.len()
    }

    /// Constraint matrix (CSC, num_rows x num_cols).
    pub fn matrix(&self) -> &SparseCsc {
        &self.matrix
    }

    /// Set the bounds of one column.
    pub fn set_variable_bounds(&mut self, col: usize, lower: f64, upper: f64) {
        self.col_lower[col] = lower;
        self.col_upper[col] = upper;
    }

    /// Set the bounds of one row.
    pub fn set_constraint_bounds(&mut self, row: usize, lower: f64, upper: f64) {
        self.row_lower[row] = lower;
        self.row_upper[row] = upper;
    }

    /// Set one objective coefficient.
    pub fn set_objective_coefficient(&mut self, col: usize, value: f64) {
        self.objective[col] = value;
    }

    /// Check dimensions, finiteness and bound consistency.
    pub fn validate(&self) -> SimplexResult<()> {
        let (m, n) = (self.matrix.rows(), self.matrix.cols());
        if m != self.row_lower.len() || m != self.row_upper.len() {
            return Err(SimplexError::DimensionMismatch(format!(
                "matrix has {} rows but row bounds have {}/{} entries",
                m,
                self.row_lower.len(),
                self.row_upper.len()
            )));
        }
        if n != self.objective.len() || n != self.col_lower.len() || n != self.col_upper.len() {
            return Err(SimplexError::DimensionMismatch(format!(
                "matrix has {} columns but column data has {}/{}/{} entries",
                n,
                self.objective.len(),
                self.col_lower.len(),
                self.col_upper.len()
            )));
        }
        if self.matrix.data().iter().any(|v| !v.is_finite()) {
            return Err(SimplexError::NonFinite("constraint matrix"));
        }
        if self.objective.iter().any(|v| !v.is_finite()) || !self.objective_offset.is_finite() {
            return Err(SimplexError::NonFinite("objective"));
        }
        check_bounds("column", &self.col_lower, &self.col_upper)?;
        check_bounds("row", &self.row_lower, &self.row_upper)
    }
}

fn check_bounds(kind: &'static str, lower: &[f64], upper: &[f64]) -> SimplexResult<()> {
    for (index, (&lo, &hi)) in lower.iter().zip(upper.iter()).enumerate() {
        if lo.is_nan() || hi.is_nan() || lo > hi || lo == f64::INFINITY || hi == f64::NEG_INFINITY {
            return Err(SimplexError::InvalidBounds {
                kind,
                index,
                lower: lo,
                upper: hi,
            });
        }
    }
    Ok(())
}

/// Simplex settings.
#[derive(Debug, Clone)]
pub struct SimplexSettings {
    /// Maximum number of pivots (including bound flips) per solve
    pub max_iterations: usize,

    /// Tolerance on primal bound violations
    pub primal_tolerance: f64,

    /// Tolerance on reduced-cost sign violations
    pub dual_tolerance: f64,

    /// Smallest magnitude accepted as a pivot element
    pub pivot_tolerance: f64,

    /// Recompute the basis inverse from scratch after this many pivots
    pub refactorization_period: usize,

    /// Switch to Bland's rule after this many consecutive degenerate pivots
    pub bland_after_degenerate: usize,

    /// Wall-clock deadline, checked between pivots
    pub deadline: Option<Instant>,
}

impl Default for SimplexSettings {
    fn default() -> Self {
        Self {
            max_iterations: usize::MAX,
            primal_tolerance: 1e-7,
            dual_tolerance: 1e-7,
            pivot_tolerance: 1e-9,
            refactorization_period: 64,
            bland_after_degenerate: 50,
            deadline: None,
        }
    }
}

/// Status of the last solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemStatus {
    /// No solve has been attempted since the last reset
    Init,
    /// Optimal basis found
    Optimal,
    /// No primal feasible point exists; equivalently the dual is unbounded
    /// and [`RevisedSimplex::dual_ray`](crate::RevisedSimplex::dual_ray) is a certificate
    PrimalInfeasible,
    /// The objective is unbounded below on a feasible problem
    PrimalUnbounded,
    /// Iteration or time limit reached before a conclusion
    IterationLimit,
    /// Numerical trouble; results are meaningless
    Abnormal,
}

/// Status of a variable (structural or slack) with respect to the basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableStatus {
    /// In the basis
    Basic,
    /// Non-basic at its lower bound
    AtLowerBound,
    /// Non-basic at its upper bound
    AtUpperBound,
    /// Non-basic with equal bounds
    FixedValue,
    /// Non-basic free variable held at zero
    Free,
}

impl VariableStatus {
    /// True when the variable is non-basic at one of its bounds.
    pub fn is_at_bound(self) -> bool {
        matches!(
            self,
            VariableStatus::AtLowerBound | VariableStatus::AtUpperBound | VariableStatus::FixedValue
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_bad_bounds() {
        let mut lp = LpProblem::new(2);
        lp.set_rows(vec![0.0], vec![1.0], vec![(0, 0, 1.0), (0, 1, 1.0)]);
        assert!(lp.validate().is_ok());

        lp.set_variable_bounds(1, 2.0, 1.0);
        assert!(matches!(
            lp.validate(),
            Err(SimplexError::InvalidBounds { kind: "column", index: 1, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_nan_objective() {
        let mut lp = LpProblem::new(1);
        lp.set_objective_coefficient(0, f64::NAN);
        assert_eq!(lp.validate(), Err(SimplexError::NonFinite("objective")));
    }

    #[test]
    fn test_set_rows_keeps_columns() {
        let mut lp = LpProblem::new(3);
        lp.set_variable_bounds(2, -1.0, 4.0);
        lp.set_rows(vec![f64::NEG_INFINITY; 2], vec![1.0, 2.0], vec![(1, 2, 3.0)]);
        assert_eq!(lp.num_rows(), 2);
        assert_eq!(lp.num_cols(), 3);
        assert_eq!(lp.col_upper[2], 4.0);
        assert_eq!(lp.matrix().nnz(), 1);
    }
}
