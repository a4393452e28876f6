//! Zero-half cuts.
//!
//! A combination of rows with multipliers `+-1` whose coefficients are all
//! even and whose right-hand side is odd yields, after division by two and
//! rounding, a cut violated by `(1 - slack) / 2` where `slack` is the total
//! slack of the combination at the LP point. Rows are reduced modulo two
//! after shifting every column to its nearest bound; the columns away from
//! their bounds are eliminated, and odd columns left at a bound cost their
//! distance to it.

use std::collections::BTreeSet;

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use simplex_core::VariableStatus;

use crate::model::{IntegerValue, MAX_INTEGER_VALUE, MIN_INTEGER_VALUE};

use super::separators::{CutSeparator, SeparationContext};

const BOUND_EPSILON: f64 = 1e-9;
const UNREACHABLE_COST: f64 = 1e9;

#[derive(Debug, Clone)]
struct BaseRow {
    row: usize,
    multiplier: IntegerValue,
    slack: f64,
}

#[derive(Debug, Clone, Default)]
struct ParityRow {
    /// Base rows of the combination.
    members: BTreeSet<usize>,
    /// Columns with an odd coefficient.
    odd_columns: BTreeSet<usize>,
    odd_rhs: bool,
}

impl ParityRow {
    fn add(&mut self, other: &ParityRow) {
        for &m in &other.members {
            if !self.members.remove(&m) {
                self.members.insert(m);
            }
        }
        for &c in &other.odd_columns {
            if !self.odd_columns.remove(&c) {
                self.odd_columns.insert(c);
            }
        }
        self.odd_rhs ^= other.odd_rhs;
    }
}

/// Collects tight rows and proposes zero-half multiplier lists.
#[derive(Debug, Clone, Default)]
pub struct ZeroHalfHelper {
    values: Vec<f64>,
    cost: Vec<f64>,
    shift: Vec<IntegerValue>,
    base_rows: Vec<BaseRow>,
    rows: Vec<ParityRow>,
}

impl ZeroHalfHelper {
    /// Empty helper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset with the column values and level-zero bounds.
    pub fn process_variables(&mut self, values: &[f64], lbs: &[IntegerValue], ubs: &[IntegerValue]) {
        self.base_rows.clear();
        self.rows.clear();
        self.cost.clear();
        self.shift.clear();
        self.values.clear();
        self.values.extend_from_slice(values);
        for ((&value, &lb), &ub) in values.iter().zip(lbs).zip(ubs) {
            let to_lb = if lb > MIN_INTEGER_VALUE { value - lb as f64 } else { f64::INFINITY };
            let to_ub = if ub < MAX_INTEGER_VALUE { ub as f64 - value } else { f64::INFINITY };
            let (cost, shift) = if to_lb <= to_ub { (to_lb, lb) } else { (to_ub, ub) };
            if cost.is_finite() {
                self.cost.push(cost.max(0.0));
                self.shift.push(shift);
            } else {
                self.cost.push(UNREACHABLE_COST);
                self.shift.push(0);
            }
        }
    }

    /// Add row `row` with both of its finite sides whose slack is below one.
    pub fn add_one_constraint(&mut self, row: usize, terms: &[(usize, IntegerValue)], lb: IntegerValue, ub: IntegerValue) {
        let activity: f64 = terms.iter().map(|&(c, a)| a as f64 * self.values[c]).sum();
        let mut odd_columns = BTreeSet::new();
        let mut shifted: i128 = 0;
        for &(col, coeff) in terms {
            if coeff % 2 != 0 {
                odd_columns.insert(col);
                shifted += self.shift[col] as i128;
            }
        }
        for (bound, multiplier) in [(ub, 1), (lb, -1)] {
            if bound <= MIN_INTEGER_VALUE || bound >= MAX_INTEGER_VALUE {
                continue;
            }
            let slack = ((bound as f64 - activity) * multiplier as f64).max(0.0);
            if slack >= 1.0 {
                continue;
            }
            self.rows.push(ParityRow {
                members: BTreeSet::from([self.base_rows.len()]),
                odd_columns: odd_columns.clone(),
                odd_rhs: (bound as i128 + shifted).rem_euclid(2) == 1,
            });
            self.base_rows.push(BaseRow { row, multiplier, slack });
        }
    }

    /// Multiplier lists of violated zero-half combinations.
    pub fn interesting_candidates(&mut self, rng: &mut ChaCha8Rng) -> Vec<Vec<(usize, IntegerValue)>> {
        let mut interior: Vec<usize> = self
            .rows
            .iter()
            .flat_map(|r| r.odd_columns.iter().copied())
            .collect::<BTreeSet<usize>>()
            .into_iter()
            .filter(|&c| self.cost[c] > BOUND_EPSILON)
            .collect();
        interior.shuffle(rng);

        let mut rows = std::mem::take(&mut self.rows);
        for col in interior {
            let pivot = rows
                .iter()
                .enumerate()
                .filter(|(_, r)| r.odd_columns.contains(&col))
                .min_by(|(_, a), (_, b)| self.slack_of(a).total_cmp(&self.slack_of(b)))
                .map(|(i, _)| i);
            let Some(pivot) = pivot else {
                continue;
            };
            let pivot_row = rows.swap_remove(pivot);
            for row in rows.iter_mut().filter(|r| r.odd_columns.contains(&col)) {
                row.add(&pivot_row);
            }
        }

        let mut seen: BTreeSet<Vec<(usize, IntegerValue)>> = BTreeSet::new();
        let mut candidates = Vec::new();
        for row in &rows {
            if !row.odd_rhs || row.members.is_empty() {
                continue;
            }
            let total = self.slack_of(row) + row.odd_columns.iter().map(|&c| self.cost[c]).sum::<f64>();
            if total >= 1.0 - 1e-6 {
                continue;
            }
            let mut multipliers: Vec<(usize, IntegerValue)> = row
                .members
                .iter()
                .map(|&m| (self.base_rows[m].row, self.base_rows[m].multiplier))
                .collect();
            multipliers.sort_unstable();
            if seen.insert(multipliers.clone()) {
                candidates.push(multipliers);
            }
        }
        candidates
    }

    fn slack_of(&self, row: &ParityRow) -> f64 {
        row.members.iter().map(|&m| self.base_rows[m].slack).sum()
    }
}

/// Zero-half separator over the non-basic rows.
#[derive(Debug, Clone, Default)]
pub struct ZeroHalfSeparator {
    helper: ZeroHalfHelper,
}

impl CutSeparator for ZeroHalfSeparator {
    fn name(&self) -> &'static str {
        "ZERO_HALF"
    }

    fn separate(&mut self, ctx: &mut SeparationContext<'_>) -> usize {
        if ctx.time_limit.limit_reached() {
            return 0;
        }
        let lp = ctx.view.lp;
        let num_cols = lp.num_cols();
        let mut values = Vec::with_capacity(num_cols);
        let mut lbs = Vec::with_capacity(num_cols);
        let mut ubs = Vec::with_capacity(num_cols);
        for col in 0..num_cols {
            let (lb, ub) = ctx.level_zero_bounds(col);
            values.push(ctx.column_value(col));
            lbs.push(lb);
            ubs.push(ub);
        }
        self.helper.process_variables(&values, &lbs, &ubs);
        for (row, integer_row) in lp.rows.iter().enumerate() {
            let status = ctx.backend.constraint_status(row);
            if matches!(status, VariableStatus::Basic | VariableStatus::Free) {
                continue;
            }
            self.helper
                .add_one_constraint(row, &integer_row.terms, integer_row.lb, integer_row.ub);
        }

        let mut added = 0;
        for multipliers in self.helper.interesting_candidates(ctx.rng) {
            if ctx.time_limit.limit_reached() {
                break;
            }
            if ctx.add_cut_from_constraints(self.name(), &multipliers) {
                added += 1;
            }
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_odd_cycle() {
        // x0 + x1 <= 1, x1 + x2 <= 1, x0 + x2 <= 1 at x = 1/2: summing the
        // three rows gives 2(x0 + x1 + x2) <= 3.
        let mut helper = ZeroHalfHelper::new();
        helper.process_variables(&[0.5; 3], &[0; 3], &[1; 3]);
        for (row, (a, b)) in [(0, 1), (1, 2), (0, 2)].into_iter().enumerate() {
            helper.add_one_constraint(row, &[(a, 1), (b, 1)], MIN_INTEGER_VALUE, 1);
        }
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let candidates = helper.interesting_candidates(&mut rng);
        assert_eq!(candidates, vec![vec![(0, 1), (1, 1), (2, 1)]]);
    }

    #[test]
    fn test_even_rhs_yields_nothing() {
        let mut helper = ZeroHalfHelper::new();
        helper.process_variables(&[0.5; 3], &[0; 3], &[1; 3]);
        helper.add_one_constraint(0, &[(0, 1), (1, 1)], MIN_INTEGER_VALUE, 1);
        helper.add_one_constraint(1, &[(0, 1), (1, 1)], MIN_INTEGER_VALUE, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert!(helper.interesting_candidates(&mut rng).is_empty());
    }

    #[test]
    fn test_slack_rows_are_ignored() {
        let mut helper = ZeroHalfHelper::new();
        helper.process_variables(&[0.0; 2], &[0; 2], &[5; 2]);
        helper.add_one_constraint(0, &[(0, 1), (1, 1)], MIN_INTEGER_VALUE, 3);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert!(helper.interesting_candidates(&mut rng).is_empty());
    }
}
