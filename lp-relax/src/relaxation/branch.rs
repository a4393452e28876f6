//! Strong branching on a fractional column.
//!
//! Both sides of `floor(v) < x < ceil(v)` are solved on a copy of the
//! column bounds, from the current basis. An infeasible side fixes the
//! column to the other one; two feasible sides bound the objective by the
//! smaller of their optima.

use super::{LinearProgrammingConstraint, CP_EPSILON};
use crate::master::MasterStatus;
use crate::model::{
    to_double, IntegerLiteral, IntegerTrail, IntegerValue, IntegerVariable, MAX_INTEGER_VALUE, MIN_INTEGER_VALUE,
};

/// Result of solving one side of a branch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BranchOutcome {
    /// Optimal, with its objective and the integer bound it implies.
    Bounded {
        /// LP objective of the side.
        objective: f64,
        /// `ceil(objective - eps)`.
        new_bound: IntegerValue,
    },
    /// The side has no LP solution.
    Infeasible,
    /// Limit hit or numerical trouble.
    Inconclusive,
    /// Not solved.
    Skipped,
}

/// What [`branch_on_var`](LinearProgrammingConstraint::branch_on_var) found.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchingReport {
    /// Column branched on, positive view.
    pub var: IntegerVariable,
    /// LP value before branching.
    pub value: f64,
    /// Upper bound of the down side.
    pub floor: IntegerValue,
    /// Lower bound of the up side.
    pub ceil: IntegerValue,
    /// Outcome of the down side.
    pub down: BranchOutcome,
    /// Outcome of the up side.
    pub up: BranchOutcome,
    /// Literals pushed on the trail.
    pub deductions: Vec<IntegerLiteral>,
    /// Both sides infeasible, or a deduction failed.
    pub conflict: bool,
}

impl BranchingReport {
    fn skipped(var: IntegerVariable) -> Self {
        Self {
            var,
            value: 0.0,
            floor: 0,
            ceil: 0,
            down: BranchOutcome::Skipped,
            up: BranchOutcome::Skipped,
            deductions: Vec::new(),
            conflict: false,
        }
    }

    /// True when something was deduced.
    pub fn successful(&self) -> bool {
        !self.deductions.is_empty()
    }
}

impl LinearProgrammingConstraint {
    /// Solve both sides of the fractional column `var` and push what they
    /// imply: a fixing when one side is infeasible, an objective lower bound
    /// when both are feasible. Does nothing without an objective variable,
    /// a cached LP point, or when `var` is not fractional.
    pub fn branch_on_var(&mut self, var: IntegerVariable, trail: &mut dyn IntegerTrail) -> BranchingReport {
        let report = self.evaluate_branches(var, trail);
        self.update_bounds_of_lp_variables(&*trail);
        self.last_branching = Some(report.clone());
        report
    }

    fn evaluate_branches(&mut self, var: IntegerVariable, trail: &mut dyn IntegerTrail) -> BranchingReport {
        let var = var.positive();
        let mut report = BranchingReport::skipped(var);
        let (Some(col), Some(objective_var)) = (self.integer_lp.column_of(var), self.objective_var) else {
            return report;
        };
        if !self.solution.is_set {
            return report;
        }
        let value = self.solution.values[col];
        report.value = value;
        if (value - value.round()).abs() <= CP_EPSILON {
            return report;
        }
        let (lb, ub) = (trail.lower_bound(var), trail.upper_bound(var));
        let (floor, ceil) = (value.floor() as IntegerValue, value.ceil() as IntegerValue);
        if floor < lb || ceil > ub {
            return report;
        }
        report.floor = floor;
        report.ceil = ceil;
        self.counters.num_strong_branches += 1;

        let reason = self.branching_reason(&*trail);
        let objective_lb = trail.lower_bound(objective_var);

        report.down = self.solve_branch(col, lb, floor);
        match report.down {
            BranchOutcome::Infeasible => {
                if !push(trail, &mut report, IntegerLiteral::greater_or_equal(var, ceil), &reason) {
                    return report;
                }
            }
            BranchOutcome::Bounded { new_bound, .. } if new_bound > objective_lb => {}
            _ => return report,
        }

        report.up = self.solve_branch(col, ceil, ub);
        match report.up {
            BranchOutcome::Infeasible if report.down == BranchOutcome::Infeasible => {
                report.conflict = true;
                trail.report_conflict(&reason);
                return report;
            }
            BranchOutcome::Infeasible => {
                if !push(trail, &mut report, IntegerLiteral::lower_or_equal(var, floor), &reason) {
                    return report;
                }
            }
            BranchOutcome::Bounded { new_bound, .. } if new_bound > objective_lb => {}
            _ => return report,
        }

        let bound = match (report.down, report.up) {
            (BranchOutcome::Bounded { new_bound: down, .. }, BranchOutcome::Bounded { new_bound: up, .. }) => {
                down.min(up)
            }
            (BranchOutcome::Bounded { new_bound, .. }, _) | (_, BranchOutcome::Bounded { new_bound, .. }) => new_bound,
            _ => return report,
        };
        if bound > trail.lower_bound(objective_var) {
            push(trail, &mut report, IntegerLiteral::greater_or_equal(objective_var, bound), &reason);
        }
        log::debug!(
            "strong branch on {:?} = {:.4}: down {:?}, up {:?}, {} deductions",
            var,
            value,
            report.down,
            report.up,
            report.deductions.len()
        );
        report
    }

    /// Both branch solves depend on every column bound.
    fn branching_reason(&self, trail: &dyn IntegerTrail) -> Vec<IntegerLiteral> {
        let mut reason = Vec::with_capacity(2 * self.integer_lp.num_cols());
        for &var in &self.integer_lp.variables {
            reason.push(trail.lower_bound_as_literal(var));
            reason.push(trail.upper_bound_as_literal(var));
        }
        trail.remove_level_zero_bounds(&mut reason);
        reason
    }

    /// Solve with `col` restricted to `[lower, upper]`, then restore the
    /// column bounds and the basis.
    fn solve_branch(&mut self, col: usize, lower: IntegerValue, upper: IntegerValue) -> BranchOutcome {
        let saved = self.backend.state();
        let (old_lower, old_upper) = (self.problem.col_lower[col], self.problem.col_upper[col]);
        self.problem.set_variable_bounds(
            col,
            self.scaler.scale_col_bound(col, to_double(lower)),
            self.scaler.scale_col_bound(col, to_double(upper)),
        );
        let limits = self.solve_limits();
        let result = self.backend.solve(&self.problem, limits);
        self.problem.set_variable_bounds(col, old_lower, old_upper);

        let iterations = self.backend.iterations() as u64;
        self.time_limit.add_work(iterations);
        self.counters.total_simplex_iterations += iterations;

        let outcome = match result {
            Ok(MasterStatus::Optimal) => {
                let objective = self.scaler.unscale_objective(self.backend.objective_value());
                let new_bound = (objective - CP_EPSILON).ceil();
                if new_bound.is_finite() && new_bound > MIN_INTEGER_VALUE as f64 && new_bound < MAX_INTEGER_VALUE as f64 {
                    BranchOutcome::Bounded {
                        objective,
                        new_bound: new_bound as IntegerValue,
                    }
                } else {
                    BranchOutcome::Inconclusive
                }
            }
            Ok(MasterStatus::Infeasible) => BranchOutcome::Infeasible,
            Ok(_) => BranchOutcome::Inconclusive,
            Err(err) => {
                log::debug!("branch solve failed: {err}");
                BranchOutcome::Inconclusive
            }
        };
        self.backend.load_state(saved);
        outcome
    }
}

fn push(
    trail: &mut dyn IntegerTrail,
    report: &mut BranchingReport,
    literal: IntegerLiteral,
    reason: &[IntegerLiteral],
) -> bool {
    if !trail.enqueue(literal, reason) {
        report.conflict = true;
        return false;
    }
    report.deductions.push(literal);
    true
}
