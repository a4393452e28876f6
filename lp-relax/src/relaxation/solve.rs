//! Building the scaled LP from the pool and solving it.

use simplex_core::{BasisState, LpProblem, VariableStatus};

use super::{stats, LinearProgrammingConstraint, CP_EPSILON, ZERO_TOLERANCE};
use crate::master::{LpScaler, MasterStatus, SolveLimits};
use crate::math::arith::add_product_to;
use crate::model::{to_double, IntegerTrail};

/// Share of degenerate columns above which the LP counts as degenerate.
const DEGENERACY_RATIO: f64 = 0.3;

/// Degeneracy worth a log line.
const HIGH_DEGENERACY: f64 = 1000.0;

impl LinearProgrammingConstraint {
    /// Reload the integer mirror and the scaled LP from the rows the pool
    /// marks as loaded. Returns false if a loaded row has an empty domain.
    pub(super) fn create_lp_from_constraint_manager(&mut self, trail: &dyn IntegerTrail) -> bool {
        self.integer_lp.clear_rows();
        self.lp_rows.clear();
        for &index in self.pool.lp_constraints() {
            let ct = self.pool.constraint(index);
            if ct.lb > ct.ub {
                log::debug!("loaded row {index} has an empty domain");
                return false;
            }
            if !self.integer_lp.push_row(ct) {
                log::debug!("row {index} skipped: not over the columns");
                continue;
            }
            self.lp_rows.push(index);
        }

        let mut offset = 0;
        let mut objective = Vec::new();
        for (col, &coeff) in self.objective_coeffs.iter().enumerate() {
            if coeff == 0 {
                continue;
            }
            let var = self.integer_lp.variables[col];
            if trail.is_fixed_at_level_zero(var) {
                let value = trail.level_zero_lower_bound(var);
                if add_product_to(coeff, value, &mut offset) {
                    continue;
                }
            }
            objective.push((col, coeff));
        }
        self.integer_lp.objective_infinity_norm = objective
            .iter()
            .map(|&(_, c)| c.saturating_abs())
            .fold(offset.saturating_abs(), i64::max);
        self.integer_lp.objective = objective;
        self.integer_lp.objective_offset = offset;

        let num_rows = self.integer_lp.num_rows();
        let num_cols = self.integer_lp.num_cols();
        let entries: Vec<(usize, usize, f64)> = self
            .integer_lp
            .rows
            .iter()
            .enumerate()
            .flat_map(|(row, r)| r.terms.iter().map(move |&(col, coeff)| (row, col, coeff as f64)))
            .collect();
        let mut costs = vec![0.0; num_cols];
        for &(col, coeff) in &self.integer_lp.objective {
            costs[col] = coeff as f64;
        }
        self.scaler = LpScaler::compute(num_rows, num_cols, &entries, &costs);

        let scaler = &self.scaler;
        let mut problem = LpProblem::new(num_cols);
        let (row_lower, row_upper) = self
            .integer_lp
            .rows
            .iter()
            .enumerate()
            .map(|(row, r)| {
                (
                    scaler.scale_row_bound(row, to_double(r.lb)),
                    scaler.scale_row_bound(row, to_double(r.ub)),
                )
            })
            .unzip();
        problem.set_rows(
            row_lower,
            row_upper,
            entries
                .iter()
                .map(|&(row, col, value)| (row, col, scaler.scale_entry(row, col, value))),
        );
        for (col, &cost) in costs.iter().enumerate() {
            problem.set_objective_coefficient(col, scaler.scale_cost(col, cost));
        }
        problem.objective_offset = offset as f64 / scaler.objective_scale();
        self.problem = problem;
        self.needs_rebuild = false;
        self.update_bounds_of_lp_variables(trail);

        log::debug!("LP rebuilt: {}", self.dimension_string());
        true
    }

    /// Copy the current integer bounds on the LP columns.
    pub(super) fn update_bounds_of_lp_variables(&mut self, trail: &dyn IntegerTrail) {
        for (col, &var) in self.integer_lp.variables.iter().enumerate() {
            let lb = self.scaler.scale_col_bound(col, to_double(trail.lower_bound(var)));
            let ub = self.scaler.scale_col_bound(col, to_double(trail.upper_bound(var)));
            self.problem.set_variable_bounds(col, lb, ub);
        }
    }

    /// Carry the row statuses of `state`, taken over `old_rows`, to the rows
    /// loaded now. New rows start basic.
    pub(super) fn remap_basis(&self, state: &BasisState, old_rows: &[usize]) -> BasisState {
        let num_cols = self.integer_lp.num_cols();
        if state.statuses.len() != num_cols + old_rows.len() {
            return BasisState::default();
        }
        let mut statuses = state.statuses[..num_cols].to_vec();
        for &index in &self.lp_rows {
            let status = old_rows
                .iter()
                .position(|&old| old == index)
                .map_or(VariableStatus::Basic, |pos| state.statuses[num_cols + pos]);
            statuses.push(status);
        }
        BasisState { statuses }
    }

    pub(super) fn solve_limits(&self) -> SolveLimits {
        let mut budget = if self.current_level == 0 {
            self.settings.root_lp_iterations
        } else {
            self.next_simplex_iter
        };
        if let Some(remaining) = self.time_limit.remaining_work() {
            budget = budget.min(remaining);
        }
        SolveLimits {
            max_iterations: usize::try_from(budget).unwrap_or(usize::MAX),
            deadline: self.time_limit.deadline(),
        }
    }

    /// Solve the loaded LP and cache its point when optimal. Returns false
    /// when the oracle failed.
    pub(super) fn solve_lp(&mut self) -> bool {
        if self.current_level == 0 {
            self.lp_at_level_zero_is_final = false;
        }
        let limits = self.solve_limits();
        let status = match self.backend.solve(&self.problem, limits) {
            Ok(status) => status,
            Err(err) => {
                log::debug!("LP solve failed: {err}");
                self.backend.clear_state();
                self.last_status = None;
                return false;
            }
        };

        let iterations = self.backend.iterations() as u64;
        self.time_limit.add_work(iterations);
        self.counters.total_simplex_iterations += iterations;
        self.counters.num_solves += 1;
        self.counters.num_solves_by_status[stats::status_index(status)] += 1;
        self.last_status = Some(status);
        log::debug!(
            "LP solve at level {}: {:?} after {} iterations ({})",
            self.current_level,
            status,
            iterations,
            self.dimension_string()
        );

        if !status.has_primal_solution() {
            self.num_degenerate_columns = 0;
            self.is_degenerate = false;
            return true;
        }
        let degeneracy = self.calculate_degeneracy();
        if status != MasterStatus::Optimal {
            return true;
        }

        self.counters.degeneracy_sum += degeneracy as f64;
        if self.average_degeneracy() >= HIGH_DEGENERACY {
            log::debug!("high average degeneracy: {:.1}", self.average_degeneracy());
        }

        let num_cols = self.integer_lp.num_cols();
        let values: Vec<f64> = (0..num_cols)
            .map(|col| self.scaler.unscale_value(col, self.backend.variable_value(col)))
            .collect();
        self.solution.is_integer = values.iter().all(|v| (v - v.round()).abs() <= CP_EPSILON);
        self.solution.reduced_costs = (0..num_cols)
            .map(|col| self.scaler.unscale_reduced_cost(col, self.backend.reduced_cost(col)))
            .collect();
        self.solution.objective = self.scaler.unscale_objective(self.backend.objective_value());
        if self.current_level == 0 {
            self.solution.level_zero_values = values.clone();
            self.solution.level_zero_objective = self.solution.objective;
        }
        self.solution.set_values(&self.integer_lp.variables, values);
        self.solution.is_set = true;
        self.solution.level = self.current_level;
        true
    }

    /// Count the non-basic columns with a zero reduced cost and update the
    /// degeneracy flag and count.
    fn calculate_degeneracy(&mut self) -> usize {
        let num_cols = self.integer_lp.num_cols();
        let degenerate = (0..num_cols)
            .filter(|&col| {
                self.backend.variable_status(col) != VariableStatus::Basic
                    && self.backend.reduced_cost(col).abs() < ZERO_TOLERANCE
            })
            .count();
        self.is_degenerate = num_cols > 0 && degenerate as f64 >= DEGENERACY_RATIO * num_cols as f64;
        self.num_degenerate_columns = degenerate;
        degenerate
    }

    /// Adapt the iteration budget of the solves below the root to how the
    /// last one went, using the degenerate column count of that solve.
    pub(super) fn update_simplex_iteration_limit(&mut self) {
        if self.settings.linearization_level < 2 {
            return;
        }
        let num_cols = self.integer_lp.num_cols() as u64;
        if num_cols == 0 {
            return;
        }
        let degenerate = self.is_degenerate;
        let decrease_factor = 10 * self.num_degenerate_columns as u64 / num_cols;
        match self.last_status {
            Some(MasterStatus::IterationLimit) => {
                if degenerate {
                    self.next_simplex_iter /= decrease_factor.max(1);
                } else {
                    self.next_simplex_iter = self.next_simplex_iter.saturating_mul(2);
                }
            }
            Some(MasterStatus::Optimal) => {
                if degenerate {
                    self.next_simplex_iter /= (2 * decrease_factor).max(1);
                } else {
                    self.next_simplex_iter = num_cols / 40;
                }
            }
            _ => {}
        }
        self.next_simplex_iter = self
            .next_simplex_iter
            .clamp(self.settings.min_simplex_iterations, self.settings.max_simplex_iterations);
    }

    pub(super) fn dimension_string(&self) -> String {
        format!(
            "{} rows, {} columns, {} entries",
            self.integer_lp.num_rows(),
            self.integer_lp.num_cols(),
            self.integer_lp.rows.iter().map(|r| r.terms.len()).sum::<usize>()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelaxResult;
    use crate::master::{MasterBackend, SimplexBackend};
    use crate::model::{BoundsTrail, LinearConstraint};
    use crate::settings::LpSettings;
    use crate::time_limit::TimeLimit;

    #[test]
    fn test_fixed_objective_terms_fold_into_offset() {
        let mut trail = BoundsTrail::new();
        let x = trail.new_variable(0, 4);
        let y = trail.new_variable(3, 3);
        let mut lp = LinearProgrammingConstraint::new(
            LpSettings::default().with_lazy_constraints(false),
            vec![x, y],
            Box::new(SimplexBackend::default()),
            TimeLimit::unlimited(),
        )
        .unwrap();
        lp.add_linear_constraint(LinearConstraint::less_or_equal(&[(x, 1), (y, 1)], 5)).unwrap();
        lp.set_objective_coefficient(x, 2).unwrap();
        lp.set_objective_coefficient(y, -5).unwrap();
        lp.register_with(&mut trail).unwrap();

        let integer_lp = lp.integer_lp();
        assert_eq!(integer_lp.objective, vec![(0, 2)]);
        assert_eq!(integer_lp.objective_offset, -15);
        assert_eq!(integer_lp.objective_infinity_norm, 15);
        assert_eq!(integer_lp.num_rows(), 1);
    }

    #[test]
    fn test_remap_basis_follows_pool_indices() {
        let mut trail = BoundsTrail::new();
        let x = trail.new_variable(0, 4);
        let mut lp = LinearProgrammingConstraint::new(
            LpSettings::default(),
            vec![x],
            Box::new(SimplexBackend::default()),
            TimeLimit::unlimited(),
        )
        .unwrap();
        lp.lp_rows = vec![2, 5];
        lp.integer_lp.push_row(&LinearConstraint::less_or_equal(&[(x, 1)], 3));
        let old = BasisState {
            statuses: vec![VariableStatus::AtLowerBound, VariableStatus::AtUpperBound, VariableStatus::Basic],
        };
        let remapped = lp.remap_basis(&old, &[5, 7]);
        assert_eq!(
            remapped.statuses,
            vec![VariableStatus::AtLowerBound, VariableStatus::Basic, VariableStatus::AtUpperBound]
        );

        let mismatched = lp.remap_basis(&old, &[5]);
        assert_eq!(mismatched, BasisState::default());
    }

    /// Oracle that reports a fixed status with every column non-basic at a
    /// fixed reduced cost.
    struct ScriptedBackend {
        status: MasterStatus,
        reduced_cost: f64,
        num_cols: usize,
    }

    impl ScriptedBackend {
        fn boxed(status: MasterStatus, reduced_cost: f64) -> Box<dyn MasterBackend> {
            Box::new(Self {
                status,
                reduced_cost,
                num_cols: 0,
            })
        }
    }

    impl MasterBackend for ScriptedBackend {
        fn solve(&mut self, problem: &LpProblem, _limits: SolveLimits) -> RelaxResult<MasterStatus> {
            self.num_cols = problem.num_cols();
            Ok(self.status)
        }
        fn iterations(&self) -> usize {
            1
        }
        fn objective_value(&self) -> f64 {
            0.0
        }
        fn variable_value(&self, _col: usize) -> f64 {
            0.0
        }
        fn reduced_cost(&self, _col: usize) -> f64 {
            self.reduced_cost
        }
        fn variable_status(&self, _col: usize) -> VariableStatus {
            VariableStatus::AtLowerBound
        }
        fn dual_value(&self, _row: usize) -> f64 {
            0.0
        }
        fn constraint_activity(&self, _row: usize) -> f64 {
            0.0
        }
        fn constraint_status(&self, _row: usize) -> VariableStatus {
            VariableStatus::Basic
        }
        fn basis(&self, pos: usize) -> usize {
            self.num_cols + pos
        }
        fn unit_row_left_inverse(&self, _pos: usize) -> Vec<f64> {
            Vec::new()
        }
        fn dual_ray(&self) -> Vec<f64> {
            Vec::new()
        }
        fn state(&self) -> BasisState {
            BasisState::default()
        }
        fn load_state(&mut self, _state: BasisState) {}
        fn clear_state(&mut self) {}
    }

    /// Two columns, one decision taken, so solves use the adaptive budget.
    fn scripted(
        settings: LpSettings,
        status: MasterStatus,
        reduced_cost: f64,
    ) -> (BoundsTrail, LinearProgrammingConstraint) {
        let mut trail = BoundsTrail::new();
        let x = trail.new_variable(0, 4);
        let y = trail.new_variable(0, 4);
        let mut lp = LinearProgrammingConstraint::new(
            settings.without_cuts().with_lazy_constraints(false),
            vec![x, y],
            ScriptedBackend::boxed(status, reduced_cost),
            TimeLimit::unlimited(),
        )
        .unwrap();
        lp.add_linear_constraint(LinearConstraint::less_or_equal(&[(x, 1), (y, 1)], 6)).unwrap();
        lp.register_with(&mut trail).unwrap();
        trail.new_decision_level();
        (trail, lp)
    }

    fn adaptive() -> LpSettings {
        LpSettings::default().with_linearization_level(2)
    }

    #[test]
    fn test_degenerate_iteration_limit_cuts_budget() {
        let (mut trail, mut lp) = scripted(adaptive(), MasterStatus::IterationLimit, 0.0);
        assert_eq!(lp.next_simplex_iterations(), 500);
        assert!(lp.propagate(&mut trail));
        assert_eq!(lp.current_level(), 1);
        assert_eq!(lp.num_degenerate_columns(), 2);
        assert!(lp.is_degenerate());
        // 10 * 2 / 2 = 10
        assert_eq!(lp.next_simplex_iterations(), 50);
    }

    #[test]
    fn test_iteration_limit_doubles_budget_up_to_max() {
        let (mut trail, mut lp) = scripted(adaptive(), MasterStatus::IterationLimit, 1.0);
        assert!(lp.propagate(&mut trail));
        assert!(!lp.is_degenerate());
        assert_eq!(lp.next_simplex_iterations(), 1000);
        assert!(lp.propagate(&mut trail));
        assert_eq!(lp.next_simplex_iterations(), 1000);
    }

    #[test]
    fn test_degenerate_optimum_cuts_budget_twice_as_hard() {
        let (mut trail, mut lp) = scripted(adaptive(), MasterStatus::Optimal, 0.0);
        assert!(lp.propagate(&mut trail));
        assert!(lp.is_degenerate());
        assert_eq!(lp.next_simplex_iterations(), 25);
        assert!((lp.average_degeneracy() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_optimum_resets_budget_to_problem_size() {
        // 2 / 40 = 0, clamped up to the minimum.
        let (mut trail, mut lp) = scripted(adaptive(), MasterStatus::Optimal, 1.0);
        assert!(lp.propagate(&mut trail));
        assert!(!lp.is_degenerate());
        assert_eq!(lp.next_simplex_iterations(), 10);

        let settings = LpSettings {
            min_simplex_iterations: 3,
            ..adaptive()
        };
        let (mut trail, mut lp) = scripted(settings, MasterStatus::Optimal, 1.0);
        assert!(lp.propagate(&mut trail));
        assert_eq!(lp.next_simplex_iterations(), 3);
    }

    #[test]
    fn test_budget_is_fixed_below_linearization_level_two() {
        let (mut trail, mut lp) = scripted(LpSettings::default(), MasterStatus::IterationLimit, 0.0);
        assert!(lp.propagate(&mut trail));
        assert_eq!(lp.next_simplex_iterations(), 500);
    }

    #[test]
    fn test_average_degeneracy_ignores_non_optimal_solves() {
        let (mut trail, mut lp) = scripted(adaptive(), MasterStatus::IterationLimit, 0.0);
        assert!(lp.propagate(&mut trail));
        assert_eq!(lp.statistics().num_solves, 1);
        assert_eq!(lp.average_degeneracy(), 0.0);
    }
}
