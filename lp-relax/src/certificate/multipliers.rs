//! Integer linear combinations of the loaded rows.
//!
//! Any integer combination `sum m_r * row_r` with the bound picked by the
//! sign of each multiplier is a valid constraint. Floating-point duals,
//! rays and basis rows are turned into such combinations by scaling them
//! with a power of two and rounding.

use crate::math::arith::{add_product_to, floor_ratio};
use crate::math::ScatteredIntegerVector;
use crate::model::{to_double, IntegerTrail, IntegerValue, MAX_INTEGER_VALUE, MIN_INTEGER_VALUE};
use crate::relaxation::{IntegerLp, ZERO_TOLERANCE};

/// Coefficient magnitude `adjust_new_linear_constraint` never goes past.
const MAX_WANTED_COEFF: IntegerValue = 1_000_000_000_000_000_000;

/// `(row, integer multiplier)` pairs.
pub type IntegerMultipliers = Vec<(usize, IntegerValue)>;

/// Scale LP multipliers to integers.
///
/// `unscale` maps an LP multiplier of a row to the integer rows' space.
/// Multipliers that are tiny or that point at an infinite bound are
/// skipped. The scale is the largest power of two keeping
/// `sum infnorm_r * |m_r|` (plus the objective norm when
/// `take_objective` is set) below `2^max_pow`. Returns the rounded
/// multipliers and the scale, or an empty list when no scale `>= 1`
/// exists.
pub fn scale_lp_multipliers(
    lp: &IntegerLp,
    lp_multipliers: &[(usize, f64)],
    unscale: impl Fn(usize, f64) -> f64,
    take_objective: bool,
    max_pow: i32,
) -> (IntegerMultipliers, f64) {
    let mut max_sum = 0.0;
    let mut cp_multipliers = Vec::with_capacity(lp_multipliers.len());
    for &(row, lp_multi) in lp_multipliers {
        if lp_multi.abs() < ZERO_TOLERANCE {
            continue;
        }
        if lp_multi > 0.0 && lp.rows[row].ub >= MAX_INTEGER_VALUE {
            continue;
        }
        if lp_multi < 0.0 && lp.rows[row].lb <= MIN_INTEGER_VALUE {
            continue;
        }
        let cp_multi = unscale(row, lp_multi);
        cp_multipliers.push((row, cp_multi));
        max_sum += to_double(lp.infinity_norms[row]) * cp_multi.abs();
    }
    if take_objective {
        max_sum += to_double(lp.objective_infinity_norm);
    }

    let mut scaling = 1.0;
    let mut integer_multipliers = Vec::new();
    if max_sum == 0.0 {
        return (integer_multipliers, scaling);
    }
    let threshold = 2f64.powi(max_pow) / max_sum;
    if threshold < 1.0 {
        return (integer_multipliers, scaling);
    }
    while 2.0 * scaling <= threshold {
        scaling *= 2.0;
    }
    for (row, cp_multi) in cp_multipliers {
        let coeff = (cp_multi * scaling).round() as IntegerValue;
        if coeff != 0 {
            integer_multipliers.push((row, coeff));
        }
    }
    (integer_multipliers, scaling)
}

/// Accumulate `sum m_r * row_r` into `acc` and return its upper bound
/// `sum m_r * (m_r > 0 ? ub_r : lb_r)`, or `None` on overflow.
pub fn compute_new_linear_constraint(
    lp: &IntegerLp,
    multipliers: &[(usize, IntegerValue)],
    acc: &mut ScatteredIntegerVector,
) -> Option<IntegerValue> {
    let mut upper_bound = 0;
    acc.reset(lp.num_cols());
    for &(row, multiplier) in multipliers {
        if multiplier == 0 {
            continue;
        }
        let row = &lp.rows[row];
        if !acc.add_scaled(multiplier, &row.terms) {
            return None;
        }
        let bound = if multiplier > 0 { row.ub } else { row.lb };
        if bound <= MIN_INTEGER_VALUE || bound >= MAX_INTEGER_VALUE {
            return None;
        }
        if !add_product_to(multiplier, bound, &mut upper_bound) {
            return None;
        }
    }
    Some(upper_bound)
}

/// Add bounded multiples of the rows of `multipliers` when this increases
/// `implied_lb - ub` of the combination under the current bounds.
///
/// A multiplier never changes sign unless its row is an equality, and no
/// coefficient is pushed past `1e18`. Returns false if the accumulator
/// could not be updated, in which case it must be discarded.
pub fn adjust_new_linear_constraint<T: IntegerTrail + ?Sized>(
    lp: &IntegerLp,
    trail: &T,
    multipliers: &mut [(usize, IntegerValue)],
    acc: &mut ScatteredIntegerVector,
    upper_bound: &mut IntegerValue,
) -> bool {
    for term in multipliers.iter_mut() {
        let (row_index, multiplier) = *term;
        if multiplier == 0 {
            continue;
        }
        let row = &lp.rows[row_index];

        let mut negative_limit = MAX_WANTED_COEFF;
        let mut positive_limit = MAX_WANTED_COEFF;
        if row.ub != row.lb {
            if multiplier > 0 {
                negative_limit = negative_limit.min(multiplier);
            } else {
                positive_limit = positive_limit.min(-multiplier);
            }
        }

        let row_bound = if multiplier > 0 { row.ub } else { row.lb };
        if row_bound != 0 {
            let abs_bound = row_bound.saturating_abs();
            let limit1 = floor_ratio((MAX_WANTED_COEFF - upper_bound.saturating_abs()).max(0), abs_bound);
            let limit2 = floor_ratio(MAX_WANTED_COEFF, abs_bound);
            if (*upper_bound > 0) == (row_bound > 0) {
                positive_limit = positive_limit.min(limit1);
                negative_limit = negative_limit.min(limit2);
            } else {
                negative_limit = negative_limit.min(limit1);
                positive_limit = positive_limit.min(limit2);
            }
        }

        // Change of |ub - implied_lb| per unit added to the multiplier; a
        // heuristic, so floating point is fine.
        let mut positive_diff = to_double(row_bound);
        let mut negative_diff = to_double(row_bound);
        for &(col, coeff) in &row.terms {
            let abs_coeff = coeff.saturating_abs();
            let var = lp.variables[col];
            let lb = trail.lower_bound(var);
            let ub = trail.upper_bound(var);
            let current = acc.get(col);
            if current == 0 {
                let overflow_limit = floor_ratio(MAX_WANTED_COEFF, abs_coeff);
                positive_limit = positive_limit.min(overflow_limit);
                negative_limit = negative_limit.min(overflow_limit);
                let (c, l, u) = (to_double(coeff), to_double(lb), to_double(ub));
                if coeff > 0 {
                    positive_diff -= c * l;
                    negative_diff -= c * u;
                } else {
                    positive_diff -= c * u;
                    negative_diff -= c * l;
                }
                continue;
            }

            let magnitude = current.saturating_abs();
            let other_direction_limit = floor_ratio(
                if lb == ub {
                    MAX_WANTED_COEFF + magnitude.min(MAX_INTEGER_VALUE - MAX_WANTED_COEFF)
                } else {
                    magnitude
                },
                abs_coeff,
            );
            let same_direction_limit = floor_ratio((MAX_WANTED_COEFF - magnitude).max(0), abs_coeff);
            if (current > 0) == (coeff > 0) {
                negative_limit = negative_limit.min(other_direction_limit);
                positive_limit = positive_limit.min(same_direction_limit);
            } else {
                negative_limit = negative_limit.min(same_direction_limit);
                positive_limit = positive_limit.min(other_direction_limit);
            }

            let implied = if current > 0 { lb } else { ub };
            if implied != 0 {
                positive_diff -= to_double(coeff) * to_double(implied);
                negative_diff -= to_double(coeff) * to_double(implied);
            }
        }

        let mut to_add: IntegerValue = 0;
        if positive_diff <= -1.0 && positive_limit > 0 {
            to_add = positive_limit;
        }
        if negative_diff >= 1.0
            && negative_limit > 0
            && (to_add == 0
                || (to_double(negative_limit) * negative_diff).abs()
                    > (to_double(positive_limit) * positive_diff).abs())
        {
            to_add = -negative_limit;
        }
        if to_add != 0 {
            let mut new_ub = *upper_bound;
            if !add_product_to(to_add, row_bound, &mut new_ub) {
                continue;
            }
            if !acc.add_scaled(to_add, &row.terms) {
                return false;
            }
            term.1 += to_add;
            *upper_bound = new_ub;
        }
    }
    true
}
