//! Objective cut.
//!
//! The objective is integral, so `objective >= proven lower bound` can cut
//! the LP optimum when the LP objective is far below that bound.

use crate::model::{LinearConstraint, MIN_INTEGER_VALUE};

use super::separators::{CutSeparator, SeparationContext};

/// Objectives with coefficients below this are added as they are.
const MAX_DIRECT_MAGNITUDE: i64 = 1_000_000_000;

/// Objective cut separator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectiveSeparator;

impl CutSeparator for ObjectiveSeparator {
    fn name(&self) -> &'static str {
        "Objective"
    }

    fn separate(&mut self, ctx: &mut SeparationContext<'_>) -> usize {
        let Some(objective) = ctx.objective else {
            return 0;
        };
        let lp = ctx.view.lp;
        if lp.objective.len() <= 1 {
            return 0;
        }
        let proven_lb = ctx.trail.level_zero_lower_bound(objective.var);
        if objective.lp_value + 1.0 >= proven_lb as f64 {
            return 0;
        }

        // sum c x + offset >= lb, negated into a <= constraint.
        let terms: Vec<_> = lp.objective.iter().map(|&(col, c)| (lp.variables[col], -c)).collect();
        let Some(ub) = lp.objective_offset.checked_sub(proven_lb) else {
            return 0;
        };
        let objective_ct = LinearConstraint::new(&terms, MIN_INTEGER_VALUE, ub);
        let magnitude = lp.objective.iter().map(|&(_, c)| c.saturating_abs()).max().unwrap_or(0);
        if magnitude < MAX_DIRECT_MAGNITUDE && ctx.pool.add_cut(objective_ct.clone(), self.name(), ctx.view.lp_values) {
            return 1;
        }

        let added = ctx
            .builder
            .strengthen_constraint(self.name(), objective_ct, &ctx.view, &mut *ctx.trail, &mut *ctx.pool);
        usize::from(added)
    }
}
