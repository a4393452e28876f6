//! Turn integer combinations of rows into cuts.

use crate::certificate::compute_new_linear_constraint;
use crate::math::arith::to_i64;
use crate::math::{remove_fixed_terms, ScatteredIntegerVector};
use crate::model::{IntegerLiteral, IntegerTrail, IntegerValue, LinearConstraint, MAX_INTEGER_VALUE};
use crate::relaxation::IntegerLp;

use super::cover::{knapsack_cover, lifted_knapsack_cover};
use super::cut_data::{CutData, ExprVar};
use super::flow_cover::flow_cover;
use super::implied_bounds::ImpliedBounds;
use super::pool::ConstraintPool;
use super::rounding::round_cut;

/// Relative tolerance on the LP violation of a base combination.
const BASE_TOLERANCE: f64 = 1e-6;

/// The LP solution as seen by the cut pipeline.
#[derive(Debug, Clone, Copy)]
pub struct SolutionView<'a> {
    /// Integer rows and columns.
    pub lp: &'a IntegerLp,
    /// LP values indexed by `IntegerVariable::index()`, both views filled.
    pub lp_values: &'a [f64],
    /// Activity of each loaded row.
    pub row_activities: &'a [f64],
}

/// Counters of the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CutBuilderStats {
    /// Multiplier lists processed.
    pub num_attempts: usize,
    /// Combinations dropped because they did not fit in 64 bits.
    pub num_overflows: usize,
    /// Combinations dropped because the LP did not satisfy them.
    pub num_numerical_rejects: usize,
    /// Bounds tightened at level zero while preprocessing.
    pub num_level_zero_tightenings: usize,
}

/// Cut derivation pipeline shared by every separator.
#[derive(Debug, Clone)]
pub struct CutBuilder {
    acc: ScatteredIntegerVector,
    implied_bounds: ImpliedBounds,
    max_integer_rounding_scaling: i64,
    infeasible: bool,
    stats: CutBuilderStats,
}

impl CutBuilder {
    /// New pipeline.
    pub fn new(max_integer_rounding_scaling: i64) -> Self {
        Self {
            acc: ScatteredIntegerVector::new(),
            implied_bounds: ImpliedBounds::new(),
            max_integer_rounding_scaling,
            infeasible: false,
            stats: CutBuilderStats::default(),
        }
    }

    /// Implied bounds used for substitution and flow covers.
    pub fn implied_bounds(&self) -> &ImpliedBounds {
        &self.implied_bounds
    }

    /// Mutable implied bounds.
    pub fn implied_bounds_mut(&mut self) -> &mut ImpliedBounds {
        &mut self.implied_bounds
    }

    /// Counters.
    pub fn stats(&self) -> &CutBuilderStats {
        &self.stats
    }

    /// True once preprocessing proved the model infeasible; clears the flag.
    pub fn take_infeasible(&mut self) -> bool {
        std::mem::take(&mut self.infeasible)
    }

    /// Steps 1 to 4: combine, convert, make positive and preprocess.
    ///
    /// Returns `sum c x <= ub` with positive coefficients on variables of
    /// either view, or `None` if the combination overflows or cannot be a
    /// useful cut.
    pub fn materialize<T: IntegerTrail + ?Sized>(
        &mut self,
        lp: &IntegerLp,
        multipliers: &[(usize, IntegerValue)],
        trail: &mut T,
    ) -> Option<LinearConstraint> {
        let Some(ub) = compute_new_linear_constraint(lp, multipliers, &mut self.acc) else {
            self.stats.num_overflows += 1;
            return None;
        };
        let mut ct = self.acc.to_constraint(&lp.variables, ub);
        ct.make_all_coefficients_positive();
        self.preprocess(trail, &mut ct).then_some(ct)
    }

    /// Fold fixed terms, reject hopeless cuts and, at level zero, tighten
    /// the variables whose range exceeds the slack.
    fn preprocess<T: IntegerTrail + ?Sized>(&mut self, trail: &mut T, ct: &mut LinearConstraint) -> bool {
        if !remove_fixed_terms(&*trail, ct) {
            self.stats.num_overflows += 1;
            return false;
        }
        if ct.is_empty() {
            return false;
        }
        let mut min_activity: i128 = 0;
        for (var, coeff) in ct.terms() {
            min_activity += coeff as i128 * trail.level_zero_lower_bound(var) as i128;
        }
        let slack = ct.ub as i128 - min_activity;
        if slack < 0 {
            return false;
        }
        if trail.current_decision_level() != 0 {
            return true;
        }
        for (var, coeff) in ct.terms() {
            let lb = trail.level_zero_lower_bound(var);
            let ub = trail.level_zero_upper_bound(var);
            if (coeff as i128) * (ub as i128 - lb as i128) <= slack {
                continue;
            }
            let Some(new_ub) = to_i64(lb as i128 + slack / coeff as i128) else {
                continue;
            };
            self.stats.num_level_zero_tightenings += 1;
            if !trail.enqueue(IntegerLiteral::lower_or_equal(var, new_ub), &[]) {
                self.infeasible = true;
                return false;
            }
        }
        true
    }

    /// Run the whole pipeline on an integer combination of loaded rows and
    /// offer every strengthened cut to the pool under `name` plus a
    /// heuristic suffix. Returns true if at least one cut was added.
    pub fn add_cut_from_constraints<T: IntegerTrail + ?Sized>(
        &mut self,
        name: &str,
        multipliers: &[(usize, IntegerValue)],
        view: &SolutionView<'_>,
        trail: &mut T,
        pool: &mut ConstraintPool,
    ) -> bool {
        self.stats.num_attempts += 1;
        let lp = view.lp;
        let Some(ct) = self.materialize(lp, multipliers, trail) else {
            return false;
        };
        let Some(base) = CutData::from_constraint(&ct, &*trail, view.lp_values, |v| lp.column_of(v)) else {
            return false;
        };

        let mut added = false;
        if let Some(cut) = flow_cover(&base, &self.implied_bounds, lp, view.lp_values) {
            added |= self.postprocess_and_add(name, "_F", &cut, view, pool);
        }
        if !base.terms.iter().any(|t| t.has_relevant_lp_value()) {
            return added;
        }

        // Row slacks turn the combination into an equality that rounding
        // can exploit.
        let mut with_slacks = base.clone();
        for &(row, multiplier) in multipliers {
            let integer_row = &lp.rows[row];
            if multiplier == 0 || integer_row.is_equality() {
                continue;
            }
            if !with_slacks.push_row_slack(row, multiplier, integer_row.lb, integer_row.ub, view.row_activities[row]) {
                return added;
            }
        }
        let magnitude: f64 = with_slacks
            .terms
            .iter()
            .map(|t| (t.coeff as f64 * t.lp_value).abs())
            .sum::<f64>()
            + (with_slacks.rhs as f64).abs();
        if with_slacks.violation() > BASE_TOLERANCE * (1.0 + magnitude) {
            self.stats.num_numerical_rejects += 1;
            log::debug!("{name}: base combination violated by {:.3e}", with_slacks.violation());
            return added;
        }

        let max_scaling = self.max_integer_rounding_scaling;
        if let Some(cut) = round_cut(&with_slacks, max_scaling) {
            added |= self.postprocess_and_add(name, "_R", &cut, view, pool);
        }
        let has_wide_range = with_slacks.terms.iter().any(|t| t.bound_diff > 1);
        if has_wide_range && !self.implied_bounds.is_empty() {
            for (suffix, positive_only) in [("_RB", false), ("_RBP", true)] {
                let mut substituted = with_slacks.clone();
                if self.implied_bounds.substitute(&mut substituted, view.lp_values, lp, positive_only) == 0 {
                    continue;
                }
                if let Some(cut) = round_cut(&substituted, max_scaling) {
                    added |= self.postprocess_and_add(name, suffix, &cut, view, pool);
                }
            }
        }

        if let Some(cut) = knapsack_cover(&base) {
            added |= self.postprocess_and_add(name, "_KB", &cut, view, pool);
        }
        if let Some(cut) = lifted_knapsack_cover(&base) {
            added |= self.postprocess_and_add(name, "_KL", &cut, view, pool);
        }
        added
    }

    /// Strengthen a standalone `<=` constraint with knapsack cover and
    /// rounding, without row slacks.
    pub fn strengthen_constraint<T: IntegerTrail + ?Sized>(
        &mut self,
        name: &str,
        mut ct: LinearConstraint,
        view: &SolutionView<'_>,
        trail: &mut T,
        pool: &mut ConstraintPool,
    ) -> bool {
        let lp = view.lp;
        ct.make_all_coefficients_positive();
        if !self.preprocess(trail, &mut ct) {
            return false;
        }
        let Some(base) = CutData::from_constraint(&ct, &*trail, view.lp_values, |v| lp.column_of(v)) else {
            return false;
        };
        let mut added = false;
        if let Some(cut) = knapsack_cover(&base) {
            added |= self.postprocess_and_add(name, "_K", &cut, view, pool);
        }
        if let Some(cut) = round_cut(&base, self.max_integer_rounding_scaling) {
            added |= self.postprocess_and_add(name, "_R", &cut, view, pool);
        }
        added
    }

    /// Expand expressions back to columns, substitute row slacks by their
    /// rows, divide by the gcd and offer the result to the pool.
    fn postprocess_and_add(
        &mut self,
        name: &str,
        suffix: &str,
        cut: &CutData,
        view: &SolutionView<'_>,
        pool: &mut ConstraintPool,
    ) -> bool {
        if cut.violation() <= 0.0 {
            return false;
        }
        let Some(ct) = self.expand(cut, view.lp) else {
            self.stats.num_overflows += 1;
            return false;
        };
        if ct.is_empty() || ct.ub >= MAX_INTEGER_VALUE {
            return false;
        }
        pool.add_cut(ct, &format!("{name}{suffix}"), view.lp_values)
    }

    /// `cut` over the columns, `None` on overflow.
    pub fn expand(&mut self, cut: &CutData, lp: &IntegerLp) -> Option<LinearConstraint> {
        self.acc.reset(lp.num_cols());
        let mut rhs = cut.rhs;
        for term in &cut.terms {
            if term.coeff == 0 {
                continue;
            }
            rhs -= term.coeff as i128 * term.expr_offset as i128;
            for k in 0..2 {
                if term.expr_coeffs[k] == 0 {
                    continue;
                }
                let coeff = term.coeff.checked_mul(term.expr_coeffs[k])?;
                let ok = match term.expr_vars[k] {
                    ExprVar::Column(col) => self.acc.add(col, coeff),
                    ExprVar::Row(row) => self.acc.add_scaled(coeff, &lp.rows[row].terms),
                };
                if !ok {
                    return None;
                }
            }
        }
        let mut ct = self.acc.to_constraint(&lp.variables, to_i64(rhs)?);
        ct.divide_by_gcd();
        Some(ct)
    }
}
