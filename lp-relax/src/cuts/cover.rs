//! Knapsack cover cuts, plain and lifted.

use super::cut_data::{CutData, CutTerm};

/// Positive copy of `data` without zero terms, `None` if some negative
/// term is unbounded or the knapsack is already infeasible.
fn positive_knapsack(data: &CutData) -> Option<CutData> {
    let mut knapsack = data.clone();
    if !knapsack.make_all_terms_positive() {
        return None;
    }
    knapsack.remove_zero_terms();
    (knapsack.rhs >= 0).then_some(knapsack)
}

/// Indices of a cover, greedily taken from the terms closest to their upper
/// range, or `None` if the bounded terms never exceed the right-hand side.
fn greedy_cover(knapsack: &CutData, binary_only: bool) -> Option<Vec<usize>> {
    let mut order: Vec<usize> = (0..knapsack.len())
        .filter(|&i| {
            let t = &knapsack.terms[i];
            t.is_bounded() && (!binary_only || t.is_binary())
        })
        .collect();
    order.sort_by(|&i, &j| {
        let ti = &knapsack.terms[i];
        let tj = &knapsack.terms[j];
        let di = ti.bound_diff as f64 - ti.lp_value;
        let dj = tj.bound_diff as f64 - tj.lp_value;
        di.total_cmp(&dj).then(tj.coeff.cmp(&ti.coeff))
    });

    let mut weight: i128 = 0;
    let mut cover = Vec::new();
    for i in order {
        let t = &knapsack.terms[i];
        weight += t.coeff as i128 * t.bound_diff as i128;
        cover.push(i);
        if weight > knapsack.rhs {
            return Some(cover);
        }
    }
    None
}

/// `sum_C expr <= sum_C range - 1` for a greedy cover `C` of the positive
/// knapsack: the terms of `C` cannot all be at their upper range.
pub fn knapsack_cover(data: &CutData) -> Option<CutData> {
    let knapsack = positive_knapsack(data)?;
    let cover = greedy_cover(&knapsack, false)?;
    let mut cut = CutData {
        rhs: -1,
        terms: Vec::with_capacity(cover.len()),
    };
    for i in cover {
        let t = knapsack.terms[i];
        cut.rhs += t.bound_diff as i128;
        cut.terms.push(CutTerm { coeff: 1, ..t });
    }
    Some(cut)
}

/// Minimal cover inequality over a 0/1 knapsack, lifted on the items
/// outside the cover.
///
/// With the cover sorted by decreasing weight and `mu_h` the sum of its
/// `h` heaviest weights, an outside item of weight `a` gets coefficient
/// `h` where `mu_h <= a < mu_{h+1}`.
pub fn lifted_knapsack_cover(data: &CutData) -> Option<CutData> {
    let knapsack = positive_knapsack(data)?;
    if knapsack
        .terms
        .iter()
        .any(|t| !t.is_binary() || t.coeff as i128 > knapsack.rhs)
    {
        return None;
    }
    let mut cover = greedy_cover(&knapsack, true)?;

    // Reduce to a minimal cover, lightest items first.
    cover.sort_by_key(|&i| knapsack.terms[i].coeff);
    let mut weight: i128 = cover.iter().map(|&i| knapsack.terms[i].coeff as i128).sum();
    cover.retain(|&i| {
        let a = knapsack.terms[i].coeff as i128;
        if weight - a > knapsack.rhs {
            weight -= a;
            false
        } else {
            true
        }
    });

    let mut in_cover = vec![false; knapsack.len()];
    for &i in &cover {
        in_cover[i] = true;
    }
    let mut prefix: Vec<i128> = cover.iter().map(|&i| knapsack.terms[i].coeff as i128).collect();
    prefix.sort_unstable_by(|a, b| b.cmp(a));
    let mut mu = vec![0i128];
    for a in prefix {
        let last = *mu.last().unwrap_or(&0);
        mu.push(last + a);
    }

    let mut cut = CutData {
        rhs: cover.len() as i128 - 1,
        terms: Vec::with_capacity(knapsack.len()),
    };
    for (i, t) in knapsack.terms.iter().enumerate() {
        let coeff = if in_cover[i] {
            1
        } else {
            let a = t.coeff as i128;
            (mu.iter().take_while(|&&m| m <= a).count() - 1) as i64
        };
        if coeff > 0 {
            cut.terms.push(CutTerm { coeff, ..*t });
        }
    }
    Some(cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cuts::cut_data::ExprVar;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn term(coeff: i64, col: usize, bound_diff: i64, lp: f64) -> CutTerm {
        CutTerm::single(coeff, ExprVar::Column(col), 1, 0, bound_diff, lp)
    }

    fn coeff_of(cut: &CutData, col: usize) -> i64 {
        cut.terms
            .iter()
            .find(|t| t.expr_vars[0] == ExprVar::Column(col))
            .map_or(0, |t| t.coeff)
    }

    #[test]
    fn test_three_binaries() {
        let data = CutData {
            rhs: 5,
            terms: vec![term(2, 0, 1, 1.0), term(2, 1, 1, 1.0), term(2, 2, 1, 0.5)],
        };
        let cut = knapsack_cover(&data).unwrap();
        assert_eq!(cut.rhs, 2);
        assert_eq!(cut.len(), 3);
        assert!(cut.violation() > 0.4);
    }

    #[test]
    fn test_general_integer_cover() {
        // 3x + 2y <= 10, x in [0, 2], y in [0, 3]: 6 + 6 > 10 so x + y <= 4.
        let data = CutData {
            rhs: 10,
            terms: vec![term(3, 0, 2, 1.8), term(2, 1, 3, 2.5)],
        };
        let cut = knapsack_cover(&data).unwrap();
        assert_eq!(cut.rhs, 4);
    }

    #[test]
    fn test_lifting() {
        let data = CutData {
            rhs: 14,
            terms: vec![
                term(5, 0, 1, 0.9),
                term(5, 1, 1, 0.9),
                term(5, 2, 1, 0.9),
                term(8, 3, 1, 0.1),
            ],
        };
        let cut = lifted_knapsack_cover(&data).unwrap();
        assert_eq!(cut.rhs, 2);
        for col in 0..4 {
            assert_eq!(coeff_of(&cut, col), 1);
        }
        // Not applicable to general integers.
        let general = CutData {
            rhs: 10,
            terms: vec![term(3, 0, 2, 1.8), term(2, 1, 3, 2.5)],
        };
        assert!(lifted_knapsack_cover(&general).is_none());
    }

    #[test]
    fn test_covers_are_valid_on_binary_points() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..300 {
            let n = rng.gen_range(2..=6);
            let terms: Vec<CutTerm> = (0..n)
                .map(|k| term(rng.gen_range(-3..=12), k, 1, rng.gen_range(0.0..=1.0)))
                .collect();
            let data = CutData {
                rhs: rng.gen_range(0..=25),
                terms,
            };
            let cuts: Vec<CutData> = [knapsack_cover(&data), lifted_knapsack_cover(&data)]
                .into_iter()
                .flatten()
                .collect();
            for mask in 0u32..(1 << n) {
                let value = |a: ExprVar| match a {
                    ExprVar::Column(k) => ((mask >> k) & 1) as i128,
                    ExprVar::Row(_) => 0,
                };
                if data.activity_at(value) <= data.rhs {
                    for cut in &cuts {
                        assert!(cut.activity_at(value) <= cut.rhs, "{data:?} -> {cut:?} at {mask:b}");
                    }
                }
            }
        }
    }
}
