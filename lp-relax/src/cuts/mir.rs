//! Mixed-integer rounding cuts on aggregations of tight rows.
//!
//! Each tight row is first tried alone (`MIR_1`). When that fails, rows are
//! added one at a time, each eliminating a basic column that is far from its
//! bounds, and the pipeline is tried again on the aggregate (`MIR_2`, ...).
//! Both the column and the row are drawn at random, weighted by the distance
//! to the bounds and by the dual value.

use rand::distributions::{Distribution, WeightedIndex};
use simplex_core::VariableStatus;

use crate::math::arith::gcd;
use crate::model::{IntegerValue, MAX_INTEGER_VALUE, MIN_INTEGER_VALUE};

use super::separators::{CutSeparator, SeparationContext};

/// Activity tolerance for a row to count as tight.
const TIGHT_TOLERANCE: f64 = 1e-4;

/// Smallest row weight, so that a weighted draw is always possible.
const MIN_ROW_WEIGHT: f64 = 1e-8;

/// Columns closer than this to a bound are not worth eliminating.
const MIN_BOUND_DISTANCE: f64 = 1e-2;

/// Dense aggregate over the columns with the list of touched positions.
#[derive(Debug, Clone, Default)]
struct DenseCut {
    coeffs: Vec<IntegerValue>,
    touched: Vec<usize>,
    is_touched: Vec<bool>,
}

impl DenseCut {
    fn reset(&mut self, size: usize) {
        for &col in &self.touched {
            self.coeffs[col] = 0;
            self.is_touched[col] = false;
        }
        self.touched.clear();
        self.coeffs.resize(size, 0);
        self.is_touched.resize(size, false);
    }

    fn add_scaled(&mut self, multiplier: IntegerValue, terms: &[(usize, IntegerValue)]) {
        for &(col, coeff) in terms {
            if !self.is_touched[col] {
                self.is_touched[col] = true;
                self.touched.push(col);
            }
            self.coeffs[col] = self.coeffs[col].saturating_add(coeff.saturating_mul(multiplier));
        }
    }

    fn scale(&mut self, factor: IntegerValue) {
        for &col in &self.touched {
            self.coeffs[col] = self.coeffs[col].saturating_mul(factor);
        }
    }
}

/// MIR separator.
#[derive(Debug, Clone, Default)]
pub struct MirSeparator {
    dense: DenseCut,
}

impl CutSeparator for MirSeparator {
    fn name(&self) -> &'static str {
        "MIR"
    }

    fn separate(&mut self, ctx: &mut SeparationContext<'_>) -> usize {
        let lp = ctx.view.lp;
        let num_rows = lp.num_rows();

        let mut base_rows: Vec<(usize, IntegerValue)> = Vec::new();
        let mut row_weights = vec![0.0; num_rows];
        let mut at_ub = vec![false; num_rows];
        let mut at_lb = vec![false; num_rows];
        for row in 0..num_rows {
            let status = ctx.backend.constraint_status(row);
            let activity = ctx.view.row_activities[row];
            let integer_row = &lp.rows[row];
            let fixed = status == VariableStatus::FixedValue;
            if (integer_row.ub < MAX_INTEGER_VALUE && activity > integer_row.ub as f64 - TIGHT_TOLERANCE)
                || status == VariableStatus::AtUpperBound
                || fixed
            {
                at_ub[row] = true;
                base_rows.push((row, 1));
            }
            if (integer_row.lb > MIN_INTEGER_VALUE && activity < integer_row.lb as f64 + TIGHT_TOLERANCE)
                || status == VariableStatus::AtLowerBound
                || fixed
            {
                at_lb[row] = true;
                base_rows.push((row, -1));
            }
            row_weights[row] = ctx.backend.dual_value(row).abs().max(MIN_ROW_WEIGHT);
        }

        let mut added = 0;
        let mut used_rows = vec![false; num_rows];
        for &entry in &base_rows {
            if ctx.time_limit.limit_reached() {
                break;
            }
            let mut multipliers = vec![entry];
            if ctx.add_cut_from_constraints("MIR_1", &multipliers) {
                added += 1;
                continue;
            }

            self.dense.reset(lp.num_cols());
            self.dense.add_scaled(entry.1, &lp.rows[entry.0].terms);
            used_rows.iter_mut().for_each(|u| *u = false);
            used_rows[entry.0] = true;

            for i in 0..ctx.max_mir_aggregations {
                // Pick a basic column to eliminate, far from its bounds.
                let mut max_magnitude: IntegerValue = 0;
                let mut weights = Vec::new();
                let mut candidates = Vec::new();
                for &col in &self.dense.touched {
                    let coeff = self.dense.coeffs[col];
                    if coeff == 0 {
                        continue;
                    }
                    max_magnitude = max_magnitude.max(coeff.saturating_abs());
                    if lp.column_degree(col) <= 1 {
                        continue;
                    }
                    if ctx.backend.variable_status(col) != VariableStatus::Basic {
                        continue;
                    }
                    let (lb, ub) = ctx.level_zero_bounds(col);
                    let value = ctx.column_value(col);
                    let distance = (ub as f64 - value).min(value - lb as f64);
                    if distance > MIN_BOUND_DISTANCE {
                        weights.push(distance);
                        candidates.push(col);
                    }
                }
                let Ok(dist) = WeightedIndex::new(&weights) else {
                    break;
                };
                let to_eliminate = candidates[dist.sample(&mut *ctx.rng)];
                let dense_coeff = self.dense.coeffs[to_eliminate];

                // Tight rows that can cancel it.
                let mut possible_rows = Vec::new();
                weights.clear();
                for &(row, coeff) in &lp.columns[to_eliminate] {
                    if used_rows[row] {
                        continue;
                    }
                    used_rows[row] = true;
                    let mut add_row = false;
                    if at_ub[row] && ((coeff > 0 && dense_coeff < 0) || (coeff < 0 && dense_coeff > 0)) {
                        add_row = true;
                    }
                    if at_lb[row] && ((coeff > 0 && dense_coeff > 0) || (coeff < 0 && dense_coeff < 0)) {
                        add_row = true;
                    }
                    if add_row {
                        possible_rows.push(row);
                        weights.push(row_weights[row]);
                    }
                }
                let Ok(dist) = WeightedIndex::new(&weights) else {
                    break;
                };
                let row_to_combine = possible_rows[dist.sample(&mut *ctx.rng)];
                let to_combine_coeff = lp.rows[row_to_combine].coeff(to_eliminate);
                if to_combine_coeff == 0 {
                    break;
                }

                let mut mult1 = -to_combine_coeff;
                let mut mult2 = dense_coeff;
                if mult1 < 0 {
                    mult1 = -mult1;
                    mult2 = -mult2;
                }
                let divisor = gcd(mult1, mult2);
                mult1 /= divisor;
                mult2 /= divisor;

                for &(_, m) in &multipliers {
                    max_magnitude = max_magnitude.max(m.saturating_abs());
                }
                let bound = (max_magnitude as i128) * (mult1.unsigned_abs() as i128)
                    + (lp.infinity_norms[row_to_combine] as i128) * (mult2.unsigned_abs() as i128);
                if bound >= i64::MAX as i128 {
                    break;
                }

                for entry in &mut multipliers {
                    entry.1 *= mult1;
                }
                multipliers.push((row_to_combine, mult2));
                if ctx.add_cut_from_constraints(&format!("MIR_{}", i + 2), &multipliers) {
                    added += 1;
                    break;
                }
                if i + 1 == ctx.max_mir_aggregations {
                    break;
                }
                self.dense.scale(mult1);
                self.dense.add_scaled(mult2, &lp.rows[row_to_combine].terms);
            }
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_cut_cancels_column() {
        let mut dense = DenseCut::default();
        dense.reset(3);
        dense.add_scaled(1, &[(0, 2), (1, 3)]);
        // Eliminate column 1 with the row 4 x1 + x2.
        dense.scale(4);
        dense.add_scaled(-3, &[(1, 4), (2, 1)]);
        assert_eq!(dense.coeffs, vec![8, 0, -3]);
        assert_eq!(dense.touched, vec![0, 1, 2]);

        dense.reset(2);
        assert_eq!(dense.coeffs, vec![0, 0]);
        assert!(dense.touched.is_empty());
    }
}
