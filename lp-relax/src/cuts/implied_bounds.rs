//! Implied bounds `literal => var >= bound` and their use in cuts.

use std::collections::HashMap;

use crate::model::{IntegerValue, IntegerVariable};
use crate::relaxation::IntegerLp;

use super::cut_data::{CutData, CutTerm, ExprVar};
use super::pool::expanded_value;

/// `literal => var >= bound`, where the literal is `indicator == 1` when
/// positive and `indicator == 0` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImpliedBoundEntry {
    /// 0/1 variable carrying the literal
    pub indicator: IntegerVariable,
    /// True for `indicator == 1`
    pub is_positive: bool,
    /// Implied lower bound
    pub bound: IntegerValue,
}

/// Implied bounds keyed by the bounded variable (either view).
#[derive(Debug, Clone, Default)]
pub struct ImpliedBounds {
    entries: HashMap<IntegerVariable, Vec<ImpliedBoundEntry>>,
}

impl ImpliedBounds {
    /// Empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `literal => var >= bound`. A weaker duplicate is ignored.
    pub fn add(&mut self, var: IntegerVariable, entry: ImpliedBoundEntry) {
        let list = self.entries.entry(var).or_default();
        match list
            .iter_mut()
            .find(|e| e.indicator == entry.indicator && e.is_positive == entry.is_positive)
        {
            Some(existing) => existing.bound = existing.bound.max(entry.bound),
            None => list.push(entry),
        }
    }

    /// Entries of `var`.
    pub fn get(&self, var: IntegerVariable) -> &[ImpliedBoundEntry] {
        self.entries.get(&var).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of bounded variables.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewrite non-binary terms `a * (v - L)` as `a * d * literal + a * s`
    /// with `s = v - L - d * literal >= 0`, using the entry of `v` with the
    /// largest `d * lp(literal)`. Returns the number of substitutions.
    pub fn substitute(
        &self,
        data: &mut CutData,
        lp_values: &[f64],
        lp: &IntegerLp,
        positive_only: bool,
    ) -> usize {
        if self.is_empty() {
            return 0;
        }
        let mut num_substituted = 0;
        let mut extra = Vec::new();
        for term in &mut data.terms {
            if term.coeff == 0 || term.is_binary() || !term.has_relevant_lp_value() {
                continue;
            }
            let Some((view, col, shift)) = single_column_view(term, lp) else {
                continue;
            };
            let mut best: Option<(f64, IntegerValue, CutTerm)> = None;
            for entry in self.get(view) {
                if positive_only && !entry.is_positive {
                    continue;
                }
                let Some(diff) = entry.bound.checked_sub(shift) else {
                    continue;
                };
                if diff <= 0 || diff > term.bound_diff {
                    continue;
                }
                let Some(indicator_col) = lp.column_of(entry.indicator) else {
                    continue;
                };
                if indicator_col == col {
                    continue;
                }
                let literal = literal_term(term.coeff, indicator_col, entry, lp_values);
                let score = diff as f64 * literal.lp_value;
                if best.as_ref().map_or(true, |b| score > b.0) {
                    best = Some((score, diff, literal));
                }
            }
            let Some((score, diff, literal)) = best else {
                continue;
            };
            if score <= 0.0 {
                continue;
            }
            // s = expr - diff * literal
            let (Some(c1), Some(o1)) = (
                diff.checked_mul(literal.expr_coeffs[0]),
                diff.checked_mul(literal.expr_offset),
            ) else {
                continue;
            };
            let Some(offset) = term.expr_offset.checked_sub(o1) else {
                continue;
            };
            let Some(literal_coeff) = term.coeff.checked_mul(diff) else {
                continue;
            };
            term.expr_vars[1] = literal.expr_vars[0];
            term.expr_coeffs[1] = -c1;
            term.expr_offset = offset;
            term.lp_value -= diff as f64 * literal.lp_value;
            extra.push(CutTerm {
                coeff: literal_coeff,
                ..literal
            });
            num_substituted += 1;
        }
        data.terms.extend(extra);
        num_substituted
    }

    /// Literal whose truth forces `v <= shift` for the term `v - shift`,
    /// i.e. an entry `literal => -v >= -shift`, with its indicator column.
    pub fn zero_forcing_literal(&self, term: &CutTerm, lp: &IntegerLp) -> Option<(usize, ImpliedBoundEntry)> {
        let (view, col, shift) = single_column_view(term, lp)?;
        let target = shift.checked_neg()?;
        self.get(view.negation())
            .iter()
            .filter(|e| e.bound >= target)
            .find_map(|e| {
                let c = lp.column_of(e.indicator)?;
                (c != col).then_some((c, *e))
            })
    }
}

/// `(view, column, shift)` when the term's expression is `view - shift`
/// over a single column.
fn single_column_view(term: &CutTerm, lp: &IntegerLp) -> Option<(IntegerVariable, usize, IntegerValue)> {
    if term.expr_coeffs[1] != 0 {
        return None;
    }
    let ExprVar::Column(col) = term.expr_vars[0] else {
        return None;
    };
    let view = match term.expr_coeffs[0] {
        1 => lp.view(col, 1),
        -1 => lp.view(col, -1),
        _ => return None,
    };
    Some((view, col, term.expr_offset.checked_neg()?))
}

/// 0/1 term for the literal of `entry`: `b` or `1 - b`.
pub(super) fn literal_term(coeff: IntegerValue, col: usize, entry: &ImpliedBoundEntry, lp_values: &[f64]) -> CutTerm {
    let value = expanded_value(lp_values, entry.indicator);
    if entry.is_positive {
        CutTerm::single(coeff, ExprVar::Column(col), 1, 0, 1, value)
    } else {
        CutTerm::single(coeff, ExprVar::Column(col), -1, 1, 1, 1.0 - value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(k: u32) -> IntegerVariable {
        IntegerVariable::positive_from_index(k)
    }

    fn two_columns() -> IntegerLp {
        IntegerLp::new(vec![var(0), var(1)])
    }

    #[test]
    fn test_add_keeps_strongest() {
        let mut ib = ImpliedBounds::new();
        let entry = ImpliedBoundEntry {
            indicator: var(1),
            is_positive: true,
            bound: 3,
        };
        ib.add(var(0), entry);
        ib.add(var(0), ImpliedBoundEntry { bound: 5, ..entry });
        ib.add(var(0), ImpliedBoundEntry { bound: 4, ..entry });
        assert_eq!(ib.get(var(0)).len(), 1);
        assert_eq!(ib.get(var(0))[0].bound, 5);
        assert!(ib.get(var(1)).is_empty());
    }

    #[test]
    fn test_substitution_preserves_points() {
        // x in [0, 10], b binary, b = 1 => x >= 6.
        let mut ib = ImpliedBounds::new();
        ib.add(
            var(0),
            ImpliedBoundEntry {
                indicator: var(1),
                is_positive: true,
                bound: 6,
            },
        );
        let mut data = CutData {
            rhs: 20,
            terms: vec![CutTerm::single(3, ExprVar::Column(0), 1, 0, 10, 4.0)],
        };
        let original = data.clone();
        let lp_values = vec![4.0, -4.0, 0.5, -0.5];
        let n = ib.substitute(&mut data, &lp_values, &two_columns(), false);
        assert_eq!(n, 1);
        assert_eq!(data.terms.len(), 2);
        assert_eq!(data.terms[1].coeff, 18);
        assert!((data.terms[0].lp_value - 1.0).abs() < 1e-12);

        // Identical left-hand side on every point, and the slack expression
        // stays in range on points satisfying the implication.
        for x in 0..=10i128 {
            for b in 0..=1i128 {
                let value = |a: ExprVar| match a {
                    ExprVar::Column(0) => x,
                    _ => b,
                };
                assert_eq!(data.activity_at(value), original.activity_at(value));
                if b == 0 || x >= 6 {
                    let s = data.terms[0].expr_value(value);
                    assert!(s >= 0 && s <= 10);
                }
            }
        }
    }

    #[test]
    fn test_zero_forcing_literal() {
        // b = 0 => x <= 0, stored as (not b) => -x >= 0.
        let mut ib = ImpliedBounds::new();
        ib.add(
            var(0).negation(),
            ImpliedBoundEntry {
                indicator: var(1),
                is_positive: false,
                bound: 0,
            },
        );
        let lp = two_columns();
        let term = CutTerm::single(1, ExprVar::Column(0), 1, 0, 10, 3.0);
        let (col, entry) = ib.zero_forcing_literal(&term, &lp).unwrap();
        assert_eq!(col, 1);
        assert!(!entry.is_positive);
        // x + 2 with x in [-2, 10]: the literal only gives x <= 0.
        let shifted = CutTerm::single(1, ExprVar::Column(0), 1, 2, 12, 3.0);
        assert!(ib.zero_forcing_literal(&shifted, &lp).is_none());
    }
}
