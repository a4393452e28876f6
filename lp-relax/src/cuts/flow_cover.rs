//! Lifted simple generalized flow cover cuts.
//!
//! The base inequality is read as a single-node flow set: positive terms
//! are inflows `y_j = a_j * expr_j` bounded by `u_j * x_j`, negative terms
//! are outflows. For a cover `C` of inflows with excess
//! `lambda = sum_C u_j - b > 0`,
//!
//! `sum_C (y_j + (u_j - lambda)^+ (1 - x_j)) <= b + sum_out y_j`
//!
//! is valid. The indicator `x_j` is the term itself when it is 0/1, the
//! negation of a literal forcing the term to zero, or the constant 1.

use crate::relaxation::IntegerLp;

use super::cut_data::{CutData, CutTerm};
use super::implied_bounds::{literal_term, ImpliedBounds};

#[derive(Debug, Clone, Copy)]
enum Indicator {
    /// The term is its own 0/1 indicator.
    Itself,
    /// `1 - x` is this 0/1 term.
    Literal(CutTerm),
    /// Constant one.
    One,
}

#[derive(Debug, Clone, Copy)]
struct Inflow {
    term: usize,
    capacity: i128,
    indicator: Indicator,
    /// Fraction of the capacity used at the LP solution.
    usage: f64,
}

/// Flow cover cut from `data`, if one is violated at the LP solution.
pub fn flow_cover(data: &CutData, implied_bounds: &ImpliedBounds, lp: &IntegerLp, lp_values: &[f64]) -> Option<CutData> {
    if data.rhs < 0 {
        return None;
    }
    let mut inflows: Vec<Inflow> = Vec::new();
    for (i, term) in data.terms.iter().enumerate() {
        if term.coeff <= 0 || !term.is_bounded() || term.bound_diff == 0 {
            continue;
        }
        let capacity = term.coeff as i128 * term.bound_diff as i128;
        let indicator = if term.is_binary() {
            Indicator::Itself
        } else if let Some((col, entry)) = implied_bounds.zero_forcing_literal(term, lp) {
            Indicator::Literal(literal_term(0, col, &entry, lp_values))
        } else {
            Indicator::One
        };
        inflows.push(Inflow {
            term: i,
            capacity,
            indicator,
            usage: term.lp_value / term.bound_diff as f64,
        });
    }
    inflows.sort_by(|a, b| b.usage.total_cmp(&a.usage).then(a.term.cmp(&b.term)));

    let mut total: i128 = 0;
    let mut cover_len = 0;
    for inflow in &inflows {
        total += inflow.capacity;
        cover_len += 1;
        if total > data.rhs {
            break;
        }
    }
    if total <= data.rhs {
        return None;
    }
    let lambda = total - data.rhs;
    let cover = &inflows[..cover_len];

    let mut in_cover = vec![false; data.len()];
    for inflow in cover {
        in_cover[inflow.term] = true;
    }
    // Outflows and covered inflows keep their coefficient; other inflows
    // are dropped.
    let mut cut = CutData {
        rhs: data.rhs,
        terms: Vec::with_capacity(data.len()),
    };
    let mut position = vec![usize::MAX; data.len()];
    for (i, term) in data.terms.iter().enumerate() {
        if term.coeff < 0 || in_cover[i] {
            position[i] = cut.terms.len();
            cut.terms.push(*term);
        }
    }
    for inflow in cover {
        let extra = (inflow.capacity - lambda).max(0);
        if extra == 0 {
            continue;
        }
        let extra = i64::try_from(extra).ok()?;
        match inflow.indicator {
            Indicator::One => {}
            Indicator::Itself => {
                // extra * (1 - expr)
                let term = &mut cut.terms[position[inflow.term]];
                term.coeff = term.coeff.checked_sub(extra)?;
                cut.rhs -= extra as i128;
            }
            Indicator::Literal(literal) => cut.terms.push(CutTerm { coeff: extra, ..literal }),
        }
    }
    cut.remove_zero_terms();
    (cut.violation() > 0.0).then_some(cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cuts::cut_data::ExprVar;
    use crate::cuts::implied_bounds::ImpliedBoundEntry;
    use crate::model::IntegerVariable;

    fn var(k: u32) -> IntegerVariable {
        IntegerVariable::positive_from_index(k)
    }

    /// y1 + y2 <= 10 with y_i in [0, 8] and b_i = 0 => y_i = 0.
    fn fixed_charge() -> (CutData, ImpliedBounds, IntegerLp, Vec<f64>) {
        let lp = IntegerLp::new((0..4).map(var).collect());
        let mut ib = ImpliedBounds::new();
        for (y, b) in [(0, 2), (1, 3)] {
            ib.add(
                var(y).negation(),
                ImpliedBoundEntry {
                    indicator: var(b),
                    is_positive: false,
                    bound: 0,
                },
            );
        }
        let mut lp_values = vec![0.0; 8];
        for (k, v) in [(0u32, 5.0), (1, 5.0), (2, 0.625), (3, 0.625)] {
            lp_values[var(k).index()] = v;
            lp_values[var(k).negation().index()] = -v;
        }
        let data = CutData {
            rhs: 10,
            terms: vec![
                CutTerm::single(1, ExprVar::Column(0), 1, 0, 8, 5.0),
                CutTerm::single(1, ExprVar::Column(1), 1, 0, 8, 5.0),
            ],
        };
        (data, ib, lp, lp_values)
    }

    #[test]
    fn test_fixed_charge_cover() {
        let (data, ib, lp, lp_values) = fixed_charge();
        let cut = flow_cover(&data, &ib, &lp, &lp_values).unwrap();
        // y1 + y2 + 2 (1 - b1) + 2 (1 - b2) <= 10
        assert_eq!(cut.rhs, 10);
        assert_eq!(cut.len(), 4);
        assert!((cut.violation() - 1.5).abs() < 1e-9);

        for y1 in 0..=8i128 {
            for y2 in 0..=8i128 {
                for b1 in 0..=1i128 {
                    for b2 in 0..=1i128 {
                        if (b1 == 0 && y1 > 0) || (b2 == 0 && y2 > 0) {
                            continue;
                        }
                        let value = |a: ExprVar| match a {
                            ExprVar::Column(0) => y1,
                            ExprVar::Column(1) => y2,
                            ExprVar::Column(2) => b1,
                            _ => b2,
                        };
                        if data.activity_at(value) <= data.rhs {
                            assert!(cut.activity_at(value) <= cut.rhs);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_binary_inflows() {
        // 6x + 6y - z <= 8, x, y binary, z in [0, 10]
        let lp = IntegerLp::new((0..3).map(var).collect());
        let data = CutData {
            rhs: 8,
            terms: vec![
                CutTerm::single(6, ExprVar::Column(0), 1, 0, 1, 1.0),
                CutTerm::single(6, ExprVar::Column(1), 1, 0, 1, 0.5),
                CutTerm::single(-1, ExprVar::Column(2), 1, 0, 10, 1.0),
            ],
        };
        let cut = flow_cover(&data, &ImpliedBounds::new(), &lp, &[]).unwrap();
        for x in 0..=1i128 {
            for y in 0..=1i128 {
                for z in 0..=10i128 {
                    let value = |a: ExprVar| match a {
                        ExprVar::Column(0) => x,
                        ExprVar::Column(1) => y,
                        _ => z,
                    };
                    if data.activity_at(value) <= data.rhs {
                        assert!(cut.activity_at(value) <= cut.rhs);
                    }
                }
            }
        }
    }
}
