//! Branching heuristics driven by the LP solution.
//!
//! The relaxation keeps decayed averages of the reduced costs seen after
//! each optimal solve. The heuristics below read them, together with the
//! cached LP values, to propose the next decision of the integer search.

use crate::model::{IntegerLiteral, IntegerTrail, IntegerValue, IntegerVariable};
use crate::relaxation::{LinearProgrammingConstraint, CP_EPSILON};

/// Averages are halved after this many updates.
const DECAY_PERIOD: u64 = 10_000;

/// Tolerance of the binary heuristics.
const BINARY_EPSILON: f64 = 1e-6;

/// Decayed averages of the reduced costs of each column.
///
/// A positive reduced cost is the cost of moving the column up, a negative
/// one the cost of moving it down.
#[derive(Debug, Clone, Default)]
pub struct ReducedCostAverages {
    sum_cost_up: Vec<f64>,
    num_cost_up: Vec<u64>,
    sum_cost_down: Vec<f64>,
    num_cost_down: Vec<u64>,
    scores: Vec<f64>,
    positions_by_decreasing_score: Vec<usize>,
    num_calls_since_decay: u64,
    generation: u64,
}

impl ReducedCostAverages {
    /// Averages over `num_cols` columns.
    pub fn new(num_cols: usize) -> Self {
        Self {
            sum_cost_up: vec![0.0; num_cols],
            num_cost_up: vec![0; num_cols],
            sum_cost_down: vec![0.0; num_cols],
            num_cost_down: vec![0; num_cols],
            scores: vec![0.0; num_cols],
            ..Self::default()
        }
    }

    /// Record `reduced_costs`, skipping the columns for which `skip` holds,
    /// and recompute the scores.
    pub fn update(&mut self, reduced_costs: &[f64], skip: impl Fn(usize) -> bool) {
        let num_cols = reduced_costs.len();
        if self.scores.len() < num_cols {
            *self = Self {
                num_calls_since_decay: self.num_calls_since_decay,
                generation: self.generation,
                ..Self::new(num_cols)
            };
        }

        self.num_calls_since_decay += 1;
        if self.num_calls_since_decay == DECAY_PERIOD {
            for col in 0..num_cols {
                self.sum_cost_up[col] /= 2.0;
                self.num_cost_up[col] /= 2;
                self.sum_cost_down[col] /= 2.0;
                self.num_cost_down[col] /= 2;
            }
            self.num_calls_since_decay = 0;
        }

        for (col, &rc) in reduced_costs.iter().enumerate() {
            if skip(col) || rc.abs() < CP_EPSILON {
                continue;
            }
            if rc < 0.0 {
                self.sum_cost_down[col] -= rc;
                self.num_cost_down[col] += 1;
            } else {
                self.sum_cost_up[col] += rc;
                self.num_cost_up[col] += 1;
            }
        }

        self.positions_by_decreasing_score.clear();
        for col in 0..num_cols {
            let up = self.average_up(col);
            let down = self.average_down(col);
            self.scores[col] = if self.num_cost_up[col] > 0 && self.num_cost_down[col] > 0 {
                up.min(down)
            } else {
                0.5 * (up + down)
            };
            if self.scores[col] > 0.0 {
                self.positions_by_decreasing_score.push(col);
            }
        }
        let scores = &self.scores;
        self.positions_by_decreasing_score
            .sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
        self.generation += 1;
    }

    /// Average cost of moving `col` up, zero without data.
    pub fn average_up(&self, col: usize) -> f64 {
        match self.num_cost_up.get(col) {
            Some(&n) if n > 0 => self.sum_cost_up[col] / n as f64,
            _ => 0.0,
        }
    }

    /// Average cost of moving `col` down, zero without data.
    pub fn average_down(&self, col: usize) -> f64 {
        match self.num_cost_down.get(col) {
            Some(&n) if n > 0 => self.sum_cost_down[col] / n as f64,
            _ => 0.0,
        }
    }

    /// Branching score of `col`; higher is better.
    pub fn score(&self, col: usize) -> f64 {
        self.scores.get(col).copied().unwrap_or(0.0)
    }

    /// Columns with a positive score, best first, ties by column.
    pub fn positions(&self) -> &[usize] {
        &self.positions_by_decreasing_score
    }

    /// Incremented by every update.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Proposes the next decision of the integer search.
pub trait LpDecisionHeuristic {
    /// The next literal to decide, or `None` to defer to another heuristic.
    fn next_decision(&mut self, lp: &LinearProgrammingConstraint, trail: &dyn IntegerTrail) -> Option<IntegerLiteral>;
}

/// Branch on the column with the best reduced-cost average score.
#[derive(Debug, Clone, Default)]
pub struct ReducedCostAverageBranching {
    cursor: usize,
    generation: u64,
}

impl ReducedCostAverageBranching {
    /// New heuristic.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LpDecisionHeuristic for ReducedCostAverageBranching {
    fn next_decision(&mut self, lp: &LinearProgrammingConstraint, trail: &dyn IntegerTrail) -> Option<IntegerLiteral> {
        if !lp.has_solution() {
            return None;
        }
        let averages = lp.rc_averages();
        if trail.current_decision_level() == 0 || averages.generation() != self.generation {
            self.cursor = 0;
            self.generation = averages.generation();
        }

        let positions = averages.positions();
        let mut selected = None;
        for (i, &col) in positions.iter().enumerate().skip(self.cursor) {
            let var = lp.variables()[col];
            if trail.is_fixed(var) {
                continue;
            }
            let value = lp.solution_value(var);
            if (value - value.round()).abs() <= CP_EPSILON {
                continue;
            }
            self.cursor = i;
            selected = Some((col, var, value));
            break;
        }
        let (col, var, value) = selected?;

        let ub = trail.upper_bound(var);
        let value_ceil = (value - CP_EPSILON).ceil() as IntegerValue;
        if value_ceil >= ub {
            return Some(IntegerLiteral::greater_or_equal(var, ub));
        }
        let lb = trail.lower_bound(var);
        let value_floor = (value + CP_EPSILON).floor() as IntegerValue;
        if value_floor <= lb {
            return Some(IntegerLiteral::lower_or_equal(var, lb));
        }
        if averages.average_down(col) < averages.average_up(col) {
            Some(IntegerLiteral::lower_or_equal(var, value_floor))
        } else {
            Some(IntegerLiteral::greater_or_equal(var, value_ceil))
        }
    }
}

fn binary_columns(lp: &LinearProgrammingConstraint, trail: &dyn IntegerTrail) -> Vec<IntegerVariable> {
    lp.variables()
        .iter()
        .copied()
        .filter(|&var| trail.lower_bound(var) == 0 && trail.upper_bound(var) == 1)
        .collect()
}

/// Set to one the 0/1 column whose LP value is closest to one half.
#[derive(Debug, Clone)]
pub struct MostInfeasibleBinaryBranching {
    variables: Vec<IntegerVariable>,
}

impl MostInfeasibleBinaryBranching {
    /// Watch the columns that are 0/1 under the current bounds.
    pub fn new(lp: &LinearProgrammingConstraint, trail: &dyn IntegerTrail) -> Self {
        let variables = binary_columns(lp, trail);
        log::debug!("most infeasible binary branching over {} columns", variables.len());
        Self { variables }
    }
}

impl LpDecisionHeuristic for MostInfeasibleBinaryBranching {
    fn next_decision(&mut self, lp: &LinearProgrammingConstraint, trail: &dyn IntegerTrail) -> Option<IntegerLiteral> {
        if !lp.has_solution() {
            return None;
        }
        let mut best: Option<(IntegerVariable, f64)> = None;
        for &var in &self.variables {
            if trail.is_fixed(var) {
                continue;
            }
            let value = lp.solution_value(var);
            let distance = ((value - BINARY_EPSILON).ceil() - value).min(value - (value + BINARY_EPSILON).floor());
            if distance < BINARY_EPSILON {
                continue;
            }
            if best.map_or(true, |(_, d)| distance > d) {
                best = Some((var, distance));
            }
        }
        best.map(|(var, _)| IntegerLiteral::greater_or_equal(var, 1))
    }
}

/// Set to one the 0/1 column that was most expensive to push to zero.
#[derive(Debug, Clone)]
pub struct ReducedCostBinaryBranching {
    variables: Vec<IntegerVariable>,
    cost_to_zero: Vec<f64>,
    num_cost_to_zero: Vec<u64>,
    num_calls: u64,
}

impl ReducedCostBinaryBranching {
    /// Watch the columns that are 0/1 under the current bounds.
    pub fn new(lp: &LinearProgrammingConstraint, trail: &dyn IntegerTrail) -> Self {
        let variables = binary_columns(lp, trail);
        log::debug!("reduced cost binary branching over {} columns", variables.len());
        let n = variables.len();
        Self {
            variables,
            cost_to_zero: vec![0.0; n],
            num_cost_to_zero: vec![0; n],
            num_calls: 0,
        }
    }
}

impl LpDecisionHeuristic for ReducedCostBinaryBranching {
    fn next_decision(&mut self, lp: &LinearProgrammingConstraint, trail: &dyn IntegerTrail) -> Option<IntegerLiteral> {
        self.num_calls += 1;
        if self.num_calls == DECAY_PERIOD {
            for i in 0..self.variables.len() {
                self.cost_to_zero[i] /= 2.0;
                self.num_cost_to_zero[i] /= 2;
            }
            self.num_calls = 0;
        }
        if !lp.has_solution() {
            return None;
        }

        for (i, &var) in self.variables.iter().enumerate() {
            if trail.is_fixed(var) {
                continue;
            }
            let rc = lp.reduced_cost(var);
            if rc.abs() < BINARY_EPSILON {
                continue;
            }
            if lp.solution_value(var).round() == 1.0 && rc < 0.0 {
                self.cost_to_zero[i] -= rc;
                self.num_cost_to_zero[i] += 1;
            }
        }

        let mut selected = None;
        let mut best_cost = 0.0;
        for (i, &var) in self.variables.iter().enumerate() {
            if trail.is_fixed(var) || self.num_cost_to_zero[i] == 0 {
                continue;
            }
            let cost = self.cost_to_zero[i] / self.num_cost_to_zero[i] as f64;
            if best_cost < cost {
                best_cost = cost;
                selected = Some(var);
            }
        }
        selected.map(|var| IntegerLiteral::greater_or_equal(var, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scores_and_order() {
        let mut averages = ReducedCostAverages::new(4);
        averages.update(&[2.0, -1.0, 0.0, 4.0], |_| false);
        averages.update(&[2.0, -3.0, 0.0, -1.0], |_| false);
        // Column 0 only goes up: half its average.
        assert_eq!(averages.score(0), 1.0);
        assert_eq!(averages.average_down(1), 2.0);
        assert_eq!(averages.score(1), 1.0);
        assert_eq!(averages.score(2), 0.0);
        // Both directions: the smaller average.
        assert_eq!(averages.score(3), 1.0);
        assert_eq!(averages.positions(), &[0, 1, 3]);
        assert_eq!(averages.generation(), 2);
    }

    #[test]
    fn test_skipped_columns_get_no_data() {
        let mut averages = ReducedCostAverages::new(2);
        averages.update(&[5.0, 5.0], |col| col == 0);
        assert_eq!(averages.score(0), 0.0);
        assert_eq!(averages.score(1), 2.5);
        assert_eq!(averages.positions(), &[1]);
    }
}
