//! Turning LP results into deductions.
//!
//! Two modes, selected by `use_exact_lp_reason`:
//! - exact: duals and rays are scaled to integer multipliers and combined
//!   into a constraint that is valid whatever the floating-point error; it
//!   is then propagated like any other linear constraint
//! - reduced costs: the classic bound and fixing deductions read from the
//!   floating-point reduced costs, only applied on optimal solves

use super::{LinearProgrammingConstraint, CP_EPSILON, LP_EPSILON, ZERO_TOLERANCE};
use crate::certificate::{
    adjust_new_linear_constraint, compute_new_linear_constraint, relax_linear_reason, scale_lp_multipliers,
    IntegerSumLe,
};
use crate::master::MasterStatus;
use crate::math::arith::add_product_to;
use crate::math::{implied_lower_bound, prevent_overflow};
use crate::model::{
    to_double, IntegerLiteral, IntegerTrail, IntegerValue, IntegerVariable, MAX_INTEGER_VALUE, MIN_INTEGER_VALUE,
};

/// Multipliers are scaled so that the combination stays below `2^62`.
const MAX_MULTIPLIER_POW: i32 = 62;

impl LinearProgrammingConstraint {
    /// Exploit the status of the last solve. Returns false on conflict.
    pub(super) fn analyze_lp(&mut self, trail: &mut dyn IntegerTrail) -> bool {
        let Some(status) = self.last_status else {
            return true;
        };

        if status == MasterStatus::Infeasible {
            let reason = if self.settings.use_exact_lp_reason {
                match self.exact_dual_ray_reason(&*trail) {
                    Some(reason) => reason,
                    None => return true,
                }
            } else {
                let combination = self.dual_ray_column_combination();
                self.reduced_cost_reason(&*trail, &combination)
            };
            log::debug!("LP infeasible at level {}: {} literals", self.current_level, reason.len());
            return trail.report_conflict(&reason);
        }

        self.update_simplex_iteration_limit();

        if let Some(objective_var) = self.objective_var {
            if self.settings.use_exact_lp_reason {
                if status.has_primal_solution() && !self.exact_lp_reasoning(trail, objective_var) {
                    return false;
                }
            } else if status == MasterStatus::Optimal && !self.reduced_cost_deductions(trail, objective_var) {
                return false;
            }
        }

        if status == MasterStatus::Optimal {
            let vars = &self.integer_lp.variables;
            let view: &dyn IntegerTrail = &*trail;
            self.rc_averages
                .update(&self.solution.reduced_costs, |col| view.is_fixed(vars[col]));
        }
        true
    }

    /// Combine the duals into `sum rc x - s * objective_var <= ub` and
    /// propagate it. The constraint is kept for incremental propagation.
    fn exact_lp_reasoning(&mut self, trail: &mut dyn IntegerTrail, objective_var: IntegerVariable) -> bool {
        let lp_multipliers: Vec<(usize, f64)> = (0..self.integer_lp.num_rows())
            .map(|row| (row, -self.backend.dual_value(row)))
            .filter(|&(_, m)| m.abs() >= ZERO_TOLERANCE)
            .collect();
        let scaler = &self.scaler;
        let (mut multipliers, scaling) = scale_lp_multipliers(
            &self.integer_lp,
            &lp_multipliers,
            |row, m| scaler.unscale_dual(row, m),
            true,
            MAX_MULTIPLIER_POW,
        );
        let obj_scale = scaling.round() as IntegerValue;
        if obj_scale == 0 {
            return true;
        }

        let Some(mut rc_ub) = compute_new_linear_constraint(&self.integer_lp, &multipliers, &mut self.acc) else {
            log::debug!("exact reasoning: overflow in the dual combination");
            return true;
        };
        // Adding obj_scale * (objective - objective_var) <= 0.
        if !self.acc.add_scaled(obj_scale, &self.integer_lp.objective)
            || !add_product_to(-obj_scale, self.integer_lp.objective_offset, &mut rc_ub)
        {
            log::debug!("exact reasoning: overflow adding the objective");
            return true;
        }
        if !adjust_new_linear_constraint(&self.integer_lp, &*trail, &mut multipliers, &mut self.acc, &mut rc_ub) {
            return true;
        }

        let mut ct = self.acc.to_constraint(&self.integer_lp.variables, rc_ub);
        ct.vars.push(objective_var);
        ct.coeffs.push(-obj_scale);
        ct.divide_by_gcd();
        prevent_overflow(&*trail, &mut ct);

        if ct.is_empty() {
            return ct.ub >= 0 || trail.report_conflict(&[]);
        }

        let sum_le = IntegerSumLe::new(&ct);
        if self.current_level == 0 {
            self.optimal_constraints.clear();
        }
        self.counters.num_cut_propagations += 1;
        let feasible = sum_le.propagate(trail);
        self.optimal_constraints.push(sum_le);
        feasible
    }

    /// Infeasibility explanation built from the dual ray, or `None` if the
    /// integer combination does not prove infeasibility.
    fn exact_dual_ray_reason(&mut self, trail: &dyn IntegerTrail) -> Option<Vec<IntegerLiteral>> {
        let ray = self.backend.dual_ray();
        let lp_multipliers: Vec<(usize, f64)> =
            ray.iter().copied().take(self.integer_lp.num_rows()).enumerate().collect();
        let scaler = &self.scaler;
        let (mut multipliers, _) = scale_lp_multipliers(
            &self.integer_lp,
            &lp_multipliers,
            |row, m| scaler.unscale_multiplier(row, m),
            false,
            MAX_MULTIPLIER_POW,
        );

        let mut ub = compute_new_linear_constraint(&self.integer_lp, &multipliers, &mut self.acc)?;
        if !adjust_new_linear_constraint(&self.integer_lp, trail, &mut multipliers, &mut self.acc, &mut ub) {
            return None;
        }
        let mut ct = self.acc.to_constraint(&self.integer_lp.variables, ub);
        ct.divide_by_gcd();
        prevent_overflow(trail, &mut ct);

        let implied = implied_lower_bound(trail, &ct)?;
        if implied <= ct.ub {
            log::debug!("dual ray does not prove infeasibility: {implied} <= {}", ct.ub);
            return None;
        }

        let slack = implied.saturating_sub(ct.ub) - 1;
        let mut reason = Vec::with_capacity(ct.len());
        let mut coeffs = Vec::with_capacity(ct.len());
        for (var, coeff) in ct.terms() {
            if coeff > 0 {
                reason.push(trail.lower_bound_as_literal(var));
                coeffs.push(coeff);
            } else {
                reason.push(trail.upper_bound_as_literal(var));
                coeffs.push(-coeff);
            }
        }
        relax_linear_reason(trail, slack, &coeffs, &mut reason);
        Some(reason)
    }

    /// Per column, the coefficient of the row combination given by the dual
    /// ray.
    fn dual_ray_column_combination(&self) -> Vec<f64> {
        let mut combination = vec![0.0; self.integer_lp.num_cols()];
        let ray = self.backend.dual_ray();
        for (row, &w) in ray.iter().enumerate().take(self.integer_lp.num_rows()) {
            if w.abs() < ZERO_TOLERANCE {
                continue;
            }
            let multiplier = self.scaler.unscale_multiplier(row, w);
            for &(col, coeff) in &self.integer_lp.rows[row].terms {
                combination[col] += multiplier * coeff as f64;
            }
        }
        combination
    }

    /// Bounds that keep the columns with a non-zero reduced cost where the
    /// LP put them.
    fn reduced_cost_reason(&self, trail: &dyn IntegerTrail, reduced_costs: &[f64]) -> Vec<IntegerLiteral> {
        let mut reason = Vec::new();
        for (col, &rc) in reduced_costs.iter().enumerate() {
            let var = self.integer_lp.variables[col];
            if rc > LP_EPSILON {
                reason.push(trail.lower_bound_as_literal(var));
            } else if rc < -LP_EPSILON {
                reason.push(trail.upper_bound_as_literal(var));
            }
        }
        trail.remove_level_zero_bounds(&mut reason);
        reason
    }

    /// Objective bound and reduced-cost fixing from an optimal solve.
    fn reduced_cost_deductions(&mut self, trail: &mut dyn IntegerTrail, objective_var: IntegerVariable) -> bool {
        let objective = self.solution.objective;
        let mut reason = self.reduced_cost_reason(&*trail, &self.solution.reduced_costs);

        let new_lb = (objective - CP_EPSILON).ceil();
        if new_lb.is_finite() && new_lb > MIN_INTEGER_VALUE as f64 && new_lb < MAX_INTEGER_VALUE as f64 {
            let new_lb = new_lb as IntegerValue;
            if new_lb > trail.lower_bound(objective_var)
                && !trail.enqueue(IntegerLiteral::greater_or_equal(objective_var, new_lb), &reason)
            {
                return false;
            }
        }

        let objective_ub = trail.upper_bound(objective_var);
        if objective_ub >= MAX_INTEGER_VALUE {
            return true;
        }
        let delta = objective_ub as f64 - objective;
        if !delta.is_finite() {
            return true;
        }
        reason.push(trail.upper_bound_as_literal(objective_var));

        for (col, &rc) in self.solution.reduced_costs.iter().enumerate() {
            let var = self.integer_lp.variables[col];
            let value = self.solution.values[col];
            if rc > LP_EPSILON {
                let new_ub = (value + delta / rc + CP_EPSILON).floor();
                if new_ub < to_double(trail.upper_bound(var))
                    && !trail.enqueue(IntegerLiteral::lower_or_equal(var, new_ub as IntegerValue), &reason)
                {
                    return false;
                }
            } else if rc < -LP_EPSILON {
                let new_lb = (value + delta / rc - CP_EPSILON).ceil();
                if new_lb > to_double(trail.lower_bound(var))
                    && !trail.enqueue(IntegerLiteral::greater_or_equal(var, new_lb as IntegerValue), &reason)
                {
                    return false;
                }
            }
        }
        true
    }
}
