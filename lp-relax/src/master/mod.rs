//! Numeric LP oracle behind the relaxation.
//!
//! The relaxation only talks to the simplex through [`MasterBackend`]: load
//! a scaled problem, solve it under an iteration cap, then query values,
//! duals, basis rows and the dual ray in the scaled space.

mod scaling;
mod simplex_backend;

pub use scaling::LpScaler;
pub use simplex_backend::SimplexBackend;

use crate::error::RelaxResult;
use simplex_core::{BasisState, LpProblem, VariableStatus};
use std::time::Instant;

/// Status of a master solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterStatus {
    /// Optimal basis found.
    Optimal,

    /// Primal infeasible: a dual ray is available.
    Infeasible,

    /// Objective unbounded below.
    Unbounded,

    /// Iteration or time limit hit before a conclusion.
    IterationLimit,

    /// Numerical difficulties; nothing can be read back.
    NumericalError,
}

impl MasterStatus {
    /// True when the primal point can be read back.
    pub fn has_primal_solution(self) -> bool {
        matches!(self, MasterStatus::Optimal | MasterStatus::IterationLimit)
    }
}

/// Limits for one master solve.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolveLimits {
    /// Maximum simplex iterations.
    pub max_iterations: usize,

    /// Wall-clock deadline.
    pub deadline: Option<Instant>,
}

/// Trait for LP oracles used by the relaxation.
///
/// All indices and values are in the space of the problem passed to
/// [`solve`](MasterBackend::solve).
pub trait MasterBackend {
    /// Solve `problem`, warm-starting from the current state when possible.
    fn solve(&mut self, problem: &LpProblem, limits: SolveLimits) -> RelaxResult<MasterStatus>;

    /// Iterations of the last solve.
    fn iterations(&self) -> usize;

    /// Objective value of the last solve.
    fn objective_value(&self) -> f64;

    /// Value of a column.
    fn variable_value(&self, col: usize) -> f64;

    /// Reduced cost of a column.
    fn reduced_cost(&self, col: usize) -> f64;

    /// Basis status of a column.
    fn variable_status(&self, col: usize) -> VariableStatus;

    /// Dual value of a row.
    fn dual_value(&self, row: usize) -> f64;

    /// Activity of a row.
    fn constraint_activity(&self, row: usize) -> f64;

    /// Basis status of a row.
    fn constraint_status(&self, row: usize) -> VariableStatus;

    /// Variable basic at position `pos`; values `>= num_cols` denote the
    /// slack of row `value - num_cols`.
    fn basis(&self, pos: usize) -> usize;

    /// Row `pos` of the basis inverse.
    fn unit_row_left_inverse(&self, pos: usize) -> Vec<f64>;

    /// Dual ray after an infeasible solve. A positive multiplier refers to
    /// the row upper bound.
    fn dual_ray(&self) -> Vec<f64>;

    /// Current basis.
    fn state(&self) -> BasisState;

    /// Start the next solve from `state`.
    fn load_state(&mut self, state: BasisState);

    /// Start the next solve from the slack basis.
    fn clear_state(&mut self);
}
