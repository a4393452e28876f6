//! Overflow-safe normalization of `<=` constraints.
//!
//! After [`prevent_overflow`], every activity of the constraint over the
//! level-zero bound box, every partial sum of it and every slack against its
//! upper bound fits strictly inside the 64-bit range. The propagators can
//! then work in plain `i64` arithmetic.

use super::arith::{ceil_ratio_128, floor_ratio_128, to_i64};
use crate::model::{BoundOracle, IntegerTrail, IntegerValue, LinearConstraint, MAX_INTEGER_VALUE, MIN_INTEGER_VALUE};

/// Largest magnitude allowed for any intermediate value.
///
/// One below `i64::MAX` so that a sum exactly at `i64::MAX` is still seen
/// as an overflow.
pub const OVERFLOW_THRESHOLD: i128 = (i64::MAX - 1) as i128;

fn make_trivial(ct: &mut LinearConstraint) {
    ct.vars.clear();
    ct.coeffs.clear();
    ct.lb = MIN_INTEGER_VALUE;
    ct.ub = 0;
}

/// Fold the terms fixed at level zero into the upper bound. Returns false
/// if the new bound does not fit, leaving `ct` unchanged.
pub fn remove_fixed_terms<O: BoundOracle + ?Sized>(oracle: &O, ct: &mut LinearConstraint) -> bool {
    let mut ub = ct.ub as i128;
    let mut kept = 0;
    for i in 0..ct.vars.len() {
        let var = ct.vars[i];
        if oracle.is_fixed_at_level_zero(var) {
            ub -= ct.coeffs[i] as i128 * oracle.level_zero_lower_bound(var) as i128;
            continue;
        }
        ct.vars[kept] = var;
        ct.coeffs[kept] = ct.coeffs[i];
        kept += 1;
    }
    let Some(ub) = to_i64(ub) else {
        return false;
    };
    ct.vars.truncate(kept);
    ct.coeffs.truncate(kept);
    ct.ub = ub;
    true
}

/// Replace `sum c x <= ub` (with `c > 0`) by `sum floor(c/d) x <= ub'`.
///
/// The remainders are bounded using level-zero lower bounds, never the
/// current ones: a term that vanishes would otherwise drop the bound it
/// relied on from any later explanation.
fn divide_constraint<O: BoundOracle + ?Sized>(oracle: &O, divisor: IntegerValue, ct: &mut LinearConstraint) -> bool {
    let d = divisor as i128;
    let mut adjust: i128 = 0;
    let mut kept = 0;
    for i in 0..ct.vars.len() {
        let coeff = ct.coeffs[i] as i128;
        let new_coeff = floor_ratio_128(coeff, d);
        let remainder = coeff - new_coeff * d;
        let lb = oracle.level_zero_lower_bound(ct.vars[i]) as i128;
        let Some(next) = remainder.checked_mul(lb).and_then(|p| adjust.checked_add(p)) else {
            return false;
        };
        adjust = next;
        if new_coeff == 0 {
            continue;
        }
        ct.vars[kept] = ct.vars[i];
        ct.coeffs[kept] = new_coeff as i64;
        kept += 1;
    }
    ct.vars.truncate(kept);
    ct.coeffs.truncate(kept);
    let Some(new_ub) = (ct.ub as i128).checked_sub(adjust) else {
        return false;
    };
    match to_i64(floor_ratio_128(new_ub, d)) {
        Some(ub) => {
            ct.ub = ub;
            true
        }
        None => false,
    }
}

/// Largest `coeff * max(|lb|, |ub|, ub - lb)` over the terms.
fn max_term_magnitude<O: BoundOracle + ?Sized>(oracle: &O, ct: &LinearConstraint) -> Option<i128> {
    let mut max_delta: i128 = 0;
    for (var, coeff) in ct.terms() {
        let lb = oracle.level_zero_lower_bound(var) as i128;
        let ub = oracle.level_zero_upper_bound(var) as i128;
        let range = lb.abs().max(ub.abs()).max(ub - lb);
        max_delta = max_delta.max((coeff as i128).checked_mul(range)?);
    }
    Some(max_delta)
}

/// Largest magnitude among the partial activity sums at both corners of the
/// box and the corresponding slacks.
fn max_activity_magnitude<O: BoundOracle + ?Sized>(oracle: &O, ct: &LinearConstraint) -> Option<i128> {
    let (mut min_neg, mut min_pos, mut max_neg, mut max_pos) = (0i128, 0i128, 0i128, 0i128);
    for (var, coeff) in ct.terms() {
        let coeff = coeff as i128;
        let lb = oracle.level_zero_lower_bound(var) as i128;
        let ub = oracle.level_zero_upper_bound(var) as i128;
        let low = coeff.checked_mul(lb)?;
        if lb > 0 {
            min_pos = min_pos.checked_add(low)?;
        } else {
            min_neg = min_neg.checked_add(low)?;
        }
        let high = coeff.checked_mul(ub)?;
        if ub > 0 {
            max_pos = max_pos.checked_add(high)?;
        } else {
            max_neg = max_neg.checked_add(high)?;
        }
    }
    let ub = ct.ub as i128;
    let min_slack = ub.checked_sub(min_pos.checked_add(min_neg)?)?;
    let max_slack = ub.checked_sub(max_pos.checked_add(max_neg)?)?;
    [
        -min_neg,
        min_pos,
        min_pos + min_neg,
        -max_neg,
        max_pos,
        max_pos + max_neg,
        min_slack.abs(),
        max_slack.abs(),
    ]
    .into_iter()
    .max()
}

fn required_divisor(magnitude: Option<i128>) -> Option<IntegerValue> {
    let magnitude = magnitude?;
    if magnitude <= OVERFLOW_THRESHOLD {
        return Some(1);
    }
    to_i64(ceil_ratio_128(magnitude, OVERFLOW_THRESHOLD))
}

/// Rescale `ct` so no computation over the level-zero box can overflow.
///
/// The constraint is read as `sum c x <= ub`; any finite lower bound is
/// dropped. Coefficients are made positive and fixed terms are folded into
/// the bound first. When the magnitudes are still too large the constraint
/// is divided, possibly several times. If even 128-bit arithmetic is not
/// enough the constraint becomes the trivial `0 <= 0`; callers must check
/// that the result is still useful.
pub fn prevent_overflow<O: BoundOracle + ?Sized>(oracle: &O, ct: &mut LinearConstraint) {
    ct.lb = MIN_INTEGER_VALUE;
    if ct.ub >= MAX_INTEGER_VALUE {
        make_trivial(ct);
        return;
    }
    ct.make_all_coefficients_positive();
    if !remove_fixed_terms(oracle, ct) {
        make_trivial(ct);
        return;
    }
    loop {
        let divisor = match required_divisor(max_term_magnitude(oracle, ct)) {
            Some(1) => required_divisor(max_activity_magnitude(oracle, ct)),
            other => other,
        };
        match divisor {
            Some(1) => return,
            Some(d) if divide_constraint(oracle, d, ct) => {}
            _ => {
                make_trivial(ct);
                return;
            }
        }
    }
}

/// True if computing the implied lower bound or the slack of `ct` over the
/// level-zero box could overflow.
pub fn possible_overflow<O: BoundOracle + ?Sized>(oracle: &O, ct: &LinearConstraint) -> bool {
    let mut lower_bound: i128 = 0;
    for (var, coeff) in ct.terms() {
        let bound = if coeff > 0 {
            oracle.level_zero_lower_bound(var)
        } else {
            oracle.level_zero_upper_bound(var)
        };
        lower_bound += coeff as i128 * bound as i128;
        if to_i64(lower_bound).is_none() {
            return true;
        }
    }
    to_i64(ct.ub as i128 - lower_bound).is_none()
}

/// Smallest activity of `ct` under the current bounds, `None` on overflow.
pub fn implied_lower_bound<T: IntegerTrail + ?Sized>(trail: &T, ct: &LinearConstraint) -> Option<IntegerValue> {
    let mut lower_bound: i128 = 0;
    for (var, coeff) in ct.terms() {
        let bound = if coeff > 0 {
            trail.lower_bound(var)
        } else {
            trail.upper_bound(var)
        };
        lower_bound += coeff as i128 * bound as i128;
        to_i64(lower_bound)?;
    }
    to_i64(lower_bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundsTrail, IntegerVariable};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn vertex_magnitudes_fit(trail: &BoundsTrail, ct: &LinearConstraint) -> bool {
        // Worst case over the box is reached per term at one of the bounds.
        let mut low: i128 = 0;
        let mut high: i128 = 0;
        for (var, coeff) in ct.terms() {
            let a = coeff as i128 * trail.level_zero_lower_bound(var) as i128;
            let b = coeff as i128 * trail.level_zero_upper_bound(var) as i128;
            low += a.min(b);
            high += a.max(b);
        }
        let ub = ct.ub as i128;
        low.abs() <= OVERFLOW_THRESHOLD
            && high.abs() <= OVERFLOW_THRESHOLD
            && (ub - low).abs() <= OVERFLOW_THRESHOLD
            && (ub - high).abs() <= OVERFLOW_THRESHOLD
    }

    #[test]
    fn test_large_activity_is_divided() {
        let mut trail = BoundsTrail::new();
        let x = trail.new_variable(0, 1_000_000_000);
        let y = trail.new_variable(-1_000_000_000, 1_000_000_000);
        let z = trail.new_variable(0, 1_000_000_000);
        let mut ct = LinearConstraint::less_or_equal(
            &[(x, 10_000_000_000), (y, -3_000_000_000), (z, 7)],
            1_000_000_000_000_000_000,
        );
        prevent_overflow(&trail, &mut ct);

        assert!(ct.coeffs.iter().all(|&c| c > 0));
        assert!(ct.coeffs[0] < 10_000_000_000);
        assert_eq!(ct.vars[1], y.negation());
        assert!(vertex_magnitudes_fit(&trail, &ct));
        assert!(!possible_overflow(&trail, &ct));
    }

    #[test]
    fn test_small_constraint_untouched() {
        let mut trail = BoundsTrail::new();
        let x = trail.new_variable(0, 10);
        let y = trail.new_variable(0, 10);
        let mut ct = LinearConstraint::less_or_equal(&[(x, 3), (y, 5)], 20);
        let before = ct.clone();
        prevent_overflow(&trail, &mut ct);
        assert_eq!(ct, before);
    }

    #[test]
    fn test_fixed_terms_folded() {
        let mut trail = BoundsTrail::new();
        let x = trail.new_variable(4, 4);
        let y = trail.new_variable(0, 10);
        let mut ct = LinearConstraint::less_or_equal(&[(x, 3), (y, 5)], 20);
        prevent_overflow(&trail, &mut ct);
        assert_eq!(ct.vars, vec![y]);
        assert_eq!(ct.coeffs, vec![5]);
        assert_eq!(ct.ub, 8);
    }

    #[test]
    fn test_unbounded_domain_trivializes_when_divided() {
        let mut trail = BoundsTrail::new();
        let x = trail.new_variable(MIN_INTEGER_VALUE, MAX_INTEGER_VALUE);
        let y = trail.new_variable(0, 1);
        let mut ct = LinearConstraint::less_or_equal(&[(x, 3), (y, 1)], 0);
        prevent_overflow(&trail, &mut ct);
        assert!(vertex_magnitudes_fit(&trail, &ct));
    }

    #[test]
    fn test_idempotent_and_safe_on_random_constraints() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..300 {
            let mut trail = BoundsTrail::new();
            let n = rng.gen_range(1..6);
            let mut terms = Vec::new();
            for _ in 0..n {
                let lb = rng.gen_range(-1_000_000_000i64..=0);
                let ub = lb + rng.gen_range(0..2_000_000_000i64);
                let var: IntegerVariable = trail.new_variable(lb, ub);
                let magnitude = 10i64.pow(rng.gen_range(0..12));
                let coeff = rng.gen_range(-magnitude..=magnitude);
                if coeff != 0 {
                    terms.push((var, coeff));
                }
            }
            let ub = rng.gen_range(-1_000_000_000_000_000_000i64..1_000_000_000_000_000_000);
            let mut ct = LinearConstraint::less_or_equal(&terms, ub);

            prevent_overflow(&trail, &mut ct);
            assert!(vertex_magnitudes_fit(&trail, &ct));

            let mut again = ct.clone();
            prevent_overflow(&trail, &mut again);
            assert_eq!(again, ct);
        }
    }

    #[test]
    fn test_implied_lower_bound_uses_current_bounds() {
        let mut trail = BoundsTrail::new();
        let x = trail.new_variable(0, 10);
        let y = trail.new_variable(-5, 5);
        let ct = LinearConstraint::less_or_equal(&[(x, 2), (y, -3)], 0);
        assert_eq!(implied_lower_bound(&trail, &ct), Some(-15));
        trail.decide(crate::model::IntegerLiteral::greater_or_equal(x, 4));
        assert_eq!(implied_lower_bound(&trail, &ct), Some(-7));
    }
}
