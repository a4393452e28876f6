//! Integer rounding (c-MIR) of a [`CutData`].

use std::collections::BTreeSet;

use crate::math::arith::{floor_ratio_128, to_i64};

use super::cut_data::CutData;

/// Most divisors tried per cut.
const MAX_DIVISORS: usize = 50;

/// Strengthen `data` by mixed-integer rounding.
///
/// Every expression is a non-negative integer, so for a divisor `d` with
/// `q = floor(rhs / d)`, `r = rhs - d * q > 0` and `f = d - r`,
/// `sum (f * floor(a / d) + max(0, (a mod d) - r)) * expr <= f * q` is
/// valid. Divisors with `f > max_scaling` or an overflowing coefficient are
/// skipped. Returns the most efficacious violated cut, if any.
pub fn round_cut(data: &CutData, max_scaling: i64) -> Option<CutData> {
    let mut divisors: BTreeSet<i64> = data
        .terms
        .iter()
        .filter(|t| t.coeff != 0 && t.has_relevant_lp_value())
        .map(|t| t.coeff.saturating_abs())
        .filter(|&d| d > 1)
        .collect();
    divisors.insert(2);

    let mut best: Option<(f64, i64, CutData)> = None;
    for &divisor in divisors.iter().rev().take(MAX_DIVISORS) {
        consider(data, divisor, max_scaling, &mut best);
    }
    let (_, best_divisor, _) = best.as_ref()?;
    let best_divisor = *best_divisor;
    for shift in 1..=3 {
        let divisor = best_divisor >> shift;
        if divisor <= 1 {
            break;
        }
        consider(data, divisor, max_scaling, &mut best);
    }
    best.map(|(_, _, cut)| cut)
}

fn consider(data: &CutData, divisor: i64, max_scaling: i64, best: &mut Option<(f64, i64, CutData)>) {
    let Some(cut) = apply_divisor(data, divisor, max_scaling) else {
        return;
    };
    let efficacy = cut.efficacy();
    if efficacy <= 0.0 {
        return;
    }
    if best.as_ref().map_or(true, |b| efficacy > b.0) {
        *best = Some((efficacy, divisor, cut));
    }
}

/// Rounded cut for one divisor, `None` when it is not stronger than the
/// input or does not fit.
pub fn apply_divisor(data: &CutData, divisor: i64, max_scaling: i64) -> Option<CutData> {
    if divisor <= 1 {
        return None;
    }
    let d = divisor as i128;
    let q = floor_ratio_128(data.rhs, d);
    let r = data.rhs - d * q;
    if r == 0 {
        return None;
    }
    let f = d - r;
    if f > max_scaling as i128 {
        return None;
    }

    let mut cut = CutData {
        rhs: f.checked_mul(q)?,
        terms: Vec::with_capacity(data.terms.len()),
    };
    for term in &data.terms {
        let a = term.coeff as i128;
        let a_div = floor_ratio_128(a, d);
        let a_mod = a - d * a_div;
        let coeff = f * a_div + (a_mod - r).max(0);
        let coeff = to_i64(coeff)?;
        if coeff != 0 {
            let mut rounded = *term;
            rounded.coeff = coeff;
            cut.terms.push(rounded);
        }
    }
    Some(cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cuts::cut_data::{CutTerm, ExprVar};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn term(coeff: i64, col: usize, bound_diff: i64, lp: f64) -> CutTerm {
        CutTerm::single(coeff, ExprVar::Column(col), 1, 0, bound_diff, lp)
    }

    #[test]
    fn test_binary_pair() {
        // 2x + 2y <= 3 at x = y = 0.75 rounds to x + y <= 1.
        let data = CutData {
            rhs: 3,
            terms: vec![term(2, 0, 1, 0.75), term(2, 1, 1, 0.75)],
        };
        let cut = round_cut(&data, 600).unwrap();
        assert_eq!(cut.rhs, 1);
        assert!(cut.terms.iter().all(|t| t.coeff == 1));
        assert!(cut.violation() > 0.4);
    }

    #[test]
    fn test_integral_rhs_is_skipped() {
        let data = CutData {
            rhs: 4,
            terms: vec![term(2, 0, 1, 0.5), term(2, 1, 1, 0.5)],
        };
        assert!(apply_divisor(&data, 2, 600).is_none());
        assert!(apply_divisor(&data, 1, 600).is_none());
    }

    #[test]
    fn test_scaling_limit() {
        let data = CutData {
            rhs: 1,
            terms: vec![term(1000, 0, 1, 0.001)],
        };
        // f = 1000 - 1 > 10
        assert!(apply_divisor(&data, 1000, 10).is_none());
        assert!(apply_divisor(&data, 1000, 1000).is_some());
    }

    #[test]
    fn test_rounding_is_valid_on_small_boxes() {
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        for _ in 0..200 {
            let n = rng.gen_range(1..=3);
            let terms: Vec<CutTerm> = (0..n)
                .map(|k| term(rng.gen_range(-9..=9), k, rng.gen_range(1..=4), rng.gen_range(0.0..2.0)))
                .collect();
            let data = CutData {
                rhs: rng.gen_range(-5..=20),
                terms,
            };
            for divisor in 2..=7 {
                let Some(cut) = apply_divisor(&data, divisor, 600) else {
                    continue;
                };
                let ranges: Vec<i128> = data.terms.iter().map(|t| t.bound_diff as i128).collect();
                let mut point = vec![0i128; n];
                loop {
                    let value = |a: ExprVar| match a {
                        ExprVar::Column(k) => point[k],
                        ExprVar::Row(_) => 0,
                    };
                    if data.activity_at(value) <= data.rhs {
                        assert!(cut.activity_at(value) <= cut.rhs, "{data:?} / {divisor} cuts {point:?}");
                    }
                    let mut k = 0;
                    while k < n && point[k] == ranges[k] {
                        point[k] = 0;
                        k += 1;
                    }
                    if k == n {
                        break;
                    }
                    point[k] += 1;
                }
            }
        }
    }
}
