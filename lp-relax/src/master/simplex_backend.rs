//! Master backend using the revised simplex of `simplex-core`.

use simplex_core::{BasisState, LpProblem, ProblemStatus, RevisedSimplex, SimplexSettings, VariableStatus};

use super::{MasterBackend, MasterStatus, SolveLimits};
use crate::error::RelaxResult;

/// Master backend using [`RevisedSimplex`].
#[derive(Debug, Clone, Default)]
pub struct SimplexBackend {
    simplex: RevisedSimplex,
}

impl SimplexBackend {
    /// Create a backend with the given simplex settings.
    pub fn new(settings: SimplexSettings) -> Self {
        Self {
            simplex: RevisedSimplex::new(settings),
        }
    }

    /// The wrapped solver.
    pub fn simplex(&self) -> &RevisedSimplex {
        &self.simplex
    }
}

impl MasterBackend for SimplexBackend {
    fn solve(&mut self, problem: &LpProblem, limits: SolveLimits) -> RelaxResult<MasterStatus> {
        let mut settings = self.simplex.settings().clone();
        settings.max_iterations = limits.max_iterations;
        settings.deadline = limits.deadline;
        self.simplex.set_settings(settings);

        let status = match self.simplex.solve(problem)? {
            ProblemStatus::Optimal => MasterStatus::Optimal,
            ProblemStatus::PrimalInfeasible => MasterStatus::Infeasible,
            ProblemStatus::PrimalUnbounded => MasterStatus::Unbounded,
            ProblemStatus::IterationLimit => MasterStatus::IterationLimit,
            ProblemStatus::Init | ProblemStatus::Abnormal => MasterStatus::NumericalError,
        };
        Ok(status)
    }

    fn iterations(&self) -> usize {
        self.simplex.iterations()
    }

    fn objective_value(&self) -> f64 {
        self.simplex.objective_value()
    }

    fn variable_value(&self, col: usize) -> f64 {
        self.simplex.variable_value(col)
    }

    fn reduced_cost(&self, col: usize) -> f64 {
        self.simplex.reduced_cost(col)
    }

    fn variable_status(&self, col: usize) -> VariableStatus {
        self.simplex.variable_status(col)
    }

    fn dual_value(&self, row: usize) -> f64 {
        self.simplex.dual_value(row)
    }

    fn constraint_activity(&self, row: usize) -> f64 {
        self.simplex.constraint_activity(row)
    }

    fn constraint_status(&self, row: usize) -> VariableStatus {
        self.simplex.constraint_status(row)
    }

    fn basis(&self, pos: usize) -> usize {
        self.simplex.basis(pos)
    }

    fn unit_row_left_inverse(&self, pos: usize) -> Vec<f64> {
        self.simplex.unit_row_left_inverse(pos)
    }

    fn dual_ray(&self) -> Vec<f64> {
        self.simplex.dual_ray().to_vec()
    }

    fn state(&self) -> BasisState {
        self.simplex.state()
    }

    fn load_state(&mut self, state: BasisState) {
        self.simplex.load_state(state);
    }

    fn clear_state(&mut self) {
        self.simplex.clear_state();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        // min -x - y  s.t.  x + y <= 3,  x, y in [0, 2]
        let mut lp = LpProblem::new(2);
        lp.set_rows(vec![f64::NEG_INFINITY], vec![3.0], vec![(0, 0, 1.0), (0, 1, 1.0)]);
        lp.objective = vec![-1.0, -1.0];
        lp.col_lower = vec![0.0, 0.0];
        lp.col_upper = vec![2.0, 2.0];

        let mut backend = SimplexBackend::default();
        let limits = SolveLimits {
            max_iterations: 100,
            deadline: None,
        };
        assert_eq!(backend.solve(&lp, limits).unwrap(), MasterStatus::Optimal);
        assert!((backend.objective_value() + 3.0).abs() < 1e-9);

        lp.set_constraint_bounds(0, 5.0, f64::INFINITY);
        assert_eq!(backend.solve(&lp, limits).unwrap(), MasterStatus::Infeasible);
        let ray = backend.dual_ray();
        assert_eq!(ray.len(), 1);
        assert!(ray[0] < 0.0);
    }
}
