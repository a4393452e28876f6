//! Chvatal-Gomory cuts from rows of the basis inverse.
//!
//! For a fractional basic column, the row of the basis inverse at its
//! position is a combination of the LP rows in which that column has
//! coefficient one and every other basic variable vanishes. Scaled to
//! integers it is a good base for rounding.

use simplex_core::VariableStatus;

use crate::certificate::scale_lp_multipliers;
use crate::relaxation::ZERO_TOLERANCE;

use super::separators::{CutSeparator, SeparationContext};

/// Basic columns closer than this to an integer are skipped.
const MIN_FRACTIONALITY: f64 = 0.01;

/// Keep the scaled multipliers well below the 64-bit range.
const MAX_POW: i32 = 52;

/// Gomory separator.
#[derive(Debug, Clone, Copy, Default)]
pub struct GomorySeparator;

impl CutSeparator for GomorySeparator {
    fn name(&self) -> &'static str {
        "CG"
    }

    fn separate(&mut self, ctx: &mut SeparationContext<'_>) -> usize {
        let lp = ctx.view.lp;
        let num_cols = lp.num_cols();
        let mut added = 0;
        for pos in 0..lp.num_rows() {
            let basic = ctx.backend.basis(pos);
            if basic >= num_cols {
                continue;
            }
            let value = ctx.column_value(basic);
            if (value - value.round()).abs() < MIN_FRACTIONALITY {
                continue;
            }
            if ctx.time_limit.limit_reached() {
                break;
            }

            let lambda = ctx.backend.unit_row_left_inverse(pos);
            let mut lp_multipliers: Vec<(usize, f64)> = lambda
                .iter()
                .enumerate()
                .filter(|&(_, &w)| w.abs() >= ZERO_TOLERANCE)
                .filter(|&(row, _)| ctx.backend.constraint_status(row) != VariableStatus::Basic)
                .map(|(row, &w)| (row, w))
                .collect();
            if lp_multipliers.is_empty() {
                continue;
            }

            for sign in [1.0, -1.0] {
                if sign < 0.0 {
                    for entry in &mut lp_multipliers {
                        entry.1 = -entry.1;
                    }
                }
                let scaler = ctx.scaler;
                let (multipliers, _) =
                    scale_lp_multipliers(lp, &lp_multipliers, |row, w| scaler.unscale_multiplier(row, w), false, MAX_POW);
                if multipliers.is_empty() {
                    continue;
                }
                if ctx.add_cut_from_constraints(self.name(), &multipliers) {
                    added += 1;
                }
            }
        }
        added
    }
}
