//! Bounded revised primal simplex.
//!
//! Every row gets a slack `s_r = a_r x` so the working system is
//! `[A | -I] (x, s) = 0` with bounds on all variables. Phase 1 minimizes the
//! sum of bound violations of the basic variables and phase 2 the true
//! objective; both share the same pricing and ratio test. When phase 1 stops
//! with a positive infeasibility, the phase-1 duals give a Farkas certificate.

use crate::basis::{BasisInverse, BasisState};
use crate::error::{SimplexError, SimplexResult};
use crate::problem::{LpProblem, ProblemStatus, SimplexSettings, VariableStatus};
use nalgebra::DVector;
use std::time::Instant;

/// Result of a ratio test.
struct Step {
    length: f64,
    /// Basis position leaving, its final value and status. `None` is a bound flip.
    leaving: Option<(usize, f64, VariableStatus)>,
}

/// Revised simplex solver with warm-start support.
#[derive(Debug, Clone)]
pub struct RevisedSimplex {
    settings: SimplexSettings,
    num_rows: usize,
    num_cols: usize,
    columns: Vec<Vec<(usize, f64)>>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    cost: Vec<f64>,
    objective_offset: f64,
    statuses: Vec<VariableStatus>,
    basis: Vec<usize>,
    factor: Option<BasisInverse>,
    values: Vec<f64>,
    duals: Vec<f64>,
    reduced_costs: Vec<f64>,
    dual_ray: Vec<f64>,
    status: ProblemStatus,
    iterations: usize,
    pending_state: Option<BasisState>,
}

impl Default for RevisedSimplex {
    fn default() -> Self {
        Self::new(SimplexSettings::default())
    }
}

impl RevisedSimplex {
    /// Create a solver with the given settings.
    pub fn new(settings: SimplexSettings) -> Self {
        Self {
            settings,
            num_rows: 0,
            num_cols: 0,
            columns: Vec::new(),
            lower: Vec::new(),
            upper: Vec::new(),
            cost: Vec::new(),
            objective_offset: 0.0,
            statuses: Vec::new(),
            basis: Vec::new(),
            factor: None,
            values: Vec::new(),
            duals: Vec::new(),
            reduced_costs: Vec::new(),
            dual_ray: Vec::new(),
            status: ProblemStatus::Init,
            iterations: 0,
            pending_state: None,
        }
    }

    /// Current settings.
    pub fn settings(&self) -> &SimplexSettings {
        &self.settings
    }

    /// Replace the settings used by the next solve.
    pub fn set_settings(&mut self, settings: SimplexSettings) {
        self.settings = settings;
    }

    /// Basis statuses after the last solve.
    pub fn state(&self) -> BasisState {
        BasisState {
            statuses: self.statuses.clone(),
        }
    }

    /// Use `state` as the starting basis of the next solve.
    pub fn load_state(&mut self, state: BasisState) {
        self.pending_state = Some(state);
    }

    /// Forget any basis: the next solve starts from the slack basis.
    pub fn clear_state(&mut self) {
        self.pending_state = None;
        self.statuses.clear();
        self.basis.clear();
        self.factor = None;
    }

    /// Solve `lp`, warm-starting from the stored basis when it is consistent
    /// with the problem dimensions.
    pub fn solve(&mut self, lp: &LpProblem) -> SimplexResult<ProblemStatus> {
        lp.validate()?;
        self.load_problem(lp);
        self.initialize_basis()?;
        self.iterations = 0;
        self.dual_ray.clear();
        self.status = self.run();
        match self.status {
            ProblemStatus::Optimal => self.compute_reduced_costs(),
            _ => self.reduced_costs = vec![0.0; self.num_cols + self.num_rows],
        }
        log::trace!(
            "simplex: {:?} after {} iterations ({} rows, {} cols)",
            self.status,
            self.iterations,
            self.num_rows,
            self.num_cols
        );
        Ok(self.status)
    }

    fn load_problem(&mut self, lp: &LpProblem) {
        let (m, n) = (lp.num_rows(), lp.num_cols());
        self.num_rows = m;
        self.num_cols = n;
        self.columns.clear();
        for col in lp.matrix().outer_iterator() {
            self.columns.push(col.iter().map(|(row, &v)| (row, v)).collect());
        }
        for row in 0..m {
            self.columns.push(vec![(row, -1.0)]);
        }
        self.lower = lp.col_lower.iter().chain(lp.row_lower.iter()).copied().collect();
        self.upper = lp.col_upper.iter().chain(lp.row_upper.iter()).copied().collect();
        self.cost = lp.objective.iter().copied().chain(std::iter::repeat(0.0).take(m)).collect();
        self.objective_offset = lp.objective_offset;
    }

    fn initialize_basis(&mut self) -> SimplexResult<()> {
        let total = self.num_cols + self.num_rows;
        let candidate = match self.pending_state.take() {
            Some(state) => state.statuses,
            None => std::mem::take(&mut self.statuses),
        };

        if candidate.len() == total && self.try_basis(candidate) {
            return Ok(());
        }
        if total > 0 && self.num_rows > 0 {
            log::debug!("simplex: starting from the slack basis");
        }
        self.slack_basis()
    }

    /// Install `statuses` if it describes an invertible basis.
    fn try_basis(&mut self, mut statuses: Vec<VariableStatus>) -> bool {
        let basis: Vec<usize> = statuses
            .iter()
            .enumerate()
            .filter(|(_, &s)| s == VariableStatus::Basic)
            .map(|(j, _)| j)
            .collect();
        if basis.len() != self.num_rows {
            return false;
        }
        let Some(factor) = BasisInverse::factorize(self.num_rows, &basis, &self.columns) else {
            return false;
        };
        for (j, status) in statuses.iter_mut().enumerate() {
            if *status != VariableStatus::Basic {
                *status = nonbasic_status(self.lower[j], self.upper[j], *status);
            }
        }
        self.statuses = statuses;
        self.basis = basis;
        self.factor = Some(factor);
        self.compute_values();
        true
    }

    fn slack_basis(&mut self) -> SimplexResult<()> {
        let n = self.num_cols;
        let mut statuses = vec![VariableStatus::Free; n + self.num_rows];
        for s in statuses.iter_mut().skip(n) {
            *s = VariableStatus::Basic;
        }
        if self.try_basis(statuses) {
            Ok(())
        } else {
            Err(SimplexError::SingularBasis)
        }
    }

    fn nonbasic_value(&self, j: usize) -> f64 {
        match self.statuses[j] {
            VariableStatus::AtLowerBound | VariableStatus::FixedValue => self.lower[j],
            VariableStatus::AtUpperBound => self.upper[j],
            VariableStatus::Free | VariableStatus::Basic => 0.0,
        }
    }

    /// Recompute all variable values from the statuses and the basis inverse.
    fn compute_values(&mut self) {
        let total = self.num_cols + self.num_rows;
        self.values = (0..total).map(|j| self.nonbasic_value(j)).collect();
        let mut rhs = DVector::zeros(self.num_rows);
        for j in 0..total {
            let v = self.values[j];
            if self.statuses[j] == VariableStatus::Basic || v == 0.0 {
                continue;
            }
            for &(row, a) in &self.columns[j] {
                rhs[row] += a * v;
            }
        }
        if let Some(factor) = &self.factor {
            let xb = factor.solve_dense(&rhs);
            for (pos, &var) in self.basis.iter().enumerate() {
                self.values[var] = -xb[pos];
            }
        }
    }

    fn deadline_passed(&self) -> bool {
        self.settings.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn run(&mut self) -> ProblemStatus {
        let mut degenerate_streak = 0usize;
        loop {
            if self.iterations >= self.settings.max_iterations || self.deadline_passed() {
                return ProblemStatus::IterationLimit;
            }
            let Some(factor) = &self.factor else {
                return ProblemStatus::Abnormal;
            };

            let (phase_one, basic_costs) = self.phase_costs();
            let y = factor.transpose_solve(&basic_costs);
            let bland = degenerate_streak > self.settings.bland_after_degenerate;

            let Some((entering, direction)) = self.price(&y, phase_one, bland) else {
                if phase_one {
                    self.dual_ray = y.iter().map(|v| -v).collect();
                    self.duals = vec![0.0; self.num_rows];
                    return ProblemStatus::PrimalInfeasible;
                }
                self.duals = y.iter().copied().collect();
                return ProblemStatus::Optimal;
            };

            let alpha = factor.solve_column(&self.columns[entering]);
            let Some(step) = self.ratio_test(entering, direction, &alpha, bland) else {
                return if phase_one {
                    ProblemStatus::Abnormal
                } else {
                    ProblemStatus::PrimalUnbounded
                };
            };

            if step.length <= 1e-12 {
                degenerate_streak += 1;
            } else {
                degenerate_streak = 0;
            }
            if !self.apply_step(entering, direction, &alpha, step) {
                return ProblemStatus::Abnormal;
            }
            self.iterations += 1;
        }
    }

    /// Costs of the basic variables for the current phase.
    fn phase_costs(&self) -> (bool, DVector<f64>) {
        let tol = self.settings.primal_tolerance;
        let mut costs = DVector::zeros(self.num_rows);
        let mut phase_one = false;
        for (pos, &var) in self.basis.iter().enumerate() {
            let x = self.values[var];
            if x < self.lower[var] - tol {
                costs[pos] = -1.0;
                phase_one = true;
            } else if x > self.upper[var] + tol {
                costs[pos] = 1.0;
                phase_one = true;
            }
        }
        if !phase_one {
            for (pos, &var) in self.basis.iter().enumerate() {
                costs[pos] = self.cost[var];
            }
        }
        (phase_one, costs)
    }

    fn column_dot(&self, j: usize, y: &DVector<f64>) -> f64 {
        self.columns[j].iter().map(|&(row, a)| a * y[row]).sum()
    }

    /// Pick an entering variable and its direction (+1 increase, -1 decrease).
    fn price(&self, y: &DVector<f64>, phase_one: bool, bland: bool) -> Option<(usize, f64)> {
        let tol = self.settings.dual_tolerance;
        let mut best: Option<(usize, f64)> = None;
        let mut best_score = 0.0;
        for j in 0..self.num_cols + self.num_rows {
            let cost = if phase_one { 0.0 } else { self.cost[j] };
            let direction = match self.statuses[j] {
                VariableStatus::Basic | VariableStatus::FixedValue => continue,
                VariableStatus::AtLowerBound => {
                    let d = cost - self.column_dot(j, y);
                    if d < -tol { (1.0, -d) } else { continue }
                }
                VariableStatus::AtUpperBound => {
                    let d = cost - self.column_dot(j, y);
                    if d > tol { (-1.0, d) } else { continue }
                }
                VariableStatus::Free => {
                    let d = cost - self.column_dot(j, y);
                    if d.abs() > tol { (-d.signum(), d.abs()) } else { continue }
                }
            };
            if bland {
                return Some((j, direction.0));
            }
            if direction.1 > best_score {
                best_score = direction.1;
                best = Some((j, direction.0));
            }
        }
        best
    }

    fn ratio_test(&self, entering: usize, direction: f64, alpha: &DVector<f64>, bland: bool) -> Option<Step> {
        let ptol = self.settings.primal_tolerance;
        let pivot_tol = self.settings.pivot_tolerance;

        let range = self.upper[entering] - self.lower[entering];
        let mut best = Step {
            length: if range.is_finite() { range } else { f64::INFINITY },
            leaving: None,
        };
        let mut best_alpha = 0.0f64;

        for (pos, &var) in self.basis.iter().enumerate() {
            if alpha[pos].abs() < pivot_tol {
                continue;
            }
            let rate = -direction * alpha[pos];
            let x = self.values[var];
            let (lo, hi) = (self.lower[var], self.upper[var]);
            let limit = if rate < 0.0 {
                if x > hi + ptol {
                    Some(((x - hi) / -rate, hi))
                } else if lo.is_finite() && x >= lo - ptol {
                    Some(((x - lo).max(0.0) / -rate, lo))
                } else {
                    None
                }
            } else if x < lo - ptol {
                Some(((lo - x) / rate, lo))
            } else if hi.is_finite() && x <= hi + ptol {
                Some(((hi - x).max(0.0) / rate, hi))
            } else {
                None
            };
            let Some((length, target)) = limit else {
                continue;
            };

            let better = if (length - best.length).abs() <= 1e-12 {
                match best.leaving {
                    None => false,
                    Some((best_pos, _, _)) if bland => var < self.basis[best_pos],
                    Some(_) => alpha[pos].abs() > best_alpha,
                }
            } else {
                length < best.length
            };
            if better {
                let status = if lo == hi {
                    VariableStatus::FixedValue
                } else if target == lo {
                    VariableStatus::AtLowerBound
                } else {
                    VariableStatus::AtUpperBound
                };
                best = Step {
                    length,
                    leaving: Some((pos, target, status)),
                };
                best_alpha = alpha[pos].abs();
            }
        }

        if best.length.is_finite() {
            Some(best)
        } else {
            None
        }
    }

    /// Move along the edge and update the basis. Returns false when a
    /// refactorization fails.
    fn apply_step(&mut self, entering: usize, direction: f64, alpha: &DVector<f64>, step: Step) -> bool {
        let t = step.length;
        self.values[entering] += direction * t;
        for (pos, &var) in self.basis.iter().enumerate() {
            self.values[var] -= direction * alpha[pos] * t;
        }

        let Some((pos, target, status)) = step.leaving else {
            let (status, value) = if direction > 0.0 {
                (VariableStatus::AtUpperBound, self.upper[entering])
            } else {
                (VariableStatus::AtLowerBound, self.lower[entering])
            };
            self.statuses[entering] = status;
            self.values[entering] = value;
            return true;
        };

        let leaving = self.basis[pos];
        self.values[leaving] = target;
        self.statuses[leaving] = status;
        self.statuses[entering] = VariableStatus::Basic;
        self.basis[pos] = entering;

        let needs_refactor = match &mut self.factor {
            Some(factor) => {
                factor.pivot(pos, alpha);
                factor.updates() >= self.settings.refactorization_period
            }
            None => return false,
        };
        if needs_refactor {
            match BasisInverse::factorize(self.num_rows, &self.basis, &self.columns) {
                Some(factor) => {
                    self.factor = Some(factor);
                    self.compute_values();
                }
                None => return false,
            }
        }
        true
    }

    fn compute_reduced_costs(&mut self) {
        let y = DVector::from_column_slice(&self.duals);
        self.reduced_costs = (0..self.num_cols + self.num_rows)
            .map(|j| {
                if self.statuses[j] == VariableStatus::Basic {
                    0.0
                } else {
                    self.cost[j] - self.column_dot(j, &y)
                }
            })
            .collect();
    }

    /// Status of the last solve.
    pub fn status(&self) -> ProblemStatus {
        self.status
    }

    /// Pivots performed by the last solve.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Number of rows of the loaded problem.
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Number of structural columns of the loaded problem.
    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// Objective value at the current point (including the offset).
    pub fn objective_value(&self) -> f64 {
        self.cost
            .iter()
            .take(self.num_cols)
            .zip(self.values.iter())
            .map(|(c, x)| c * x)
            .sum::<f64>()
            + self.objective_offset
    }

    /// Value of a structural column.
    pub fn variable_value(&self, col: usize) -> f64 {
        self.values[col]
    }

    /// Reduced cost of a structural column (zero unless optimal).
    pub fn reduced_cost(&self, col: usize) -> f64 {
        self.reduced_costs[col]
    }

    /// Basis status of a structural column.
    pub fn variable_status(&self, col: usize) -> VariableStatus {
        self.statuses[col]
    }

    /// Dual value of a row. Non-positive when the row is at its upper bound.
    pub fn dual_value(&self, row: usize) -> f64 {
        self.duals.get(row).copied().unwrap_or(0.0)
    }

    /// Activity `a_r x` of a row.
    pub fn constraint_activity(&self, row: usize) -> f64 {
        self.values[self.num_cols + row]
    }

    /// Basis status of a row (the status of its slack).
    pub fn constraint_status(&self, row: usize) -> VariableStatus {
        self.statuses[self.num_cols + row]
    }

    /// Variable that is basic at position `pos`. Indices `>= num_cols` are
    /// the slack of row `index - num_cols`.
    pub fn basis(&self, pos: usize) -> usize {
        self.basis[pos]
    }

    /// Row `pos` of the basis inverse, as multipliers over the rows.
    pub fn unit_row_left_inverse(&self, pos: usize) -> Vec<f64> {
        match &self.factor {
            Some(factor) => factor.row(pos),
            None => vec![0.0; self.num_rows],
        }
    }

    /// Farkas certificate available after [`ProblemStatus::PrimalInfeasible`].
    ///
    /// With multipliers `w = dual_ray()`, the aggregated row
    /// `sum_r w_r a_r x <= sum_r w_r (w_r > 0 ? row_upper_r : row_lower_r)`
    /// has a minimum activity over the column box strictly above its right
    /// hand side.
    pub fn dual_ray(&self) -> &[f64] {
        &self.dual_ray
    }
}

fn nonbasic_status(lower: f64, upper: f64, previous: VariableStatus) -> VariableStatus {
    let (lo_finite, hi_finite) = (lower.is_finite(), upper.is_finite());
    if lo_finite && hi_finite && lower == upper {
        return VariableStatus::FixedValue;
    }
    match previous {
        VariableStatus::AtUpperBound if hi_finite => VariableStatus::AtUpperBound,
        _ if lo_finite => VariableStatus::AtLowerBound,
        _ if hi_finite => VariableStatus::AtUpperBound,
        _ => VariableStatus::Free,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_var_lp() -> LpProblem {
        // min -x - y s.t. x + y <= 3, 0 <= x,y <= 2
        let mut lp = LpProblem::new(2);
        lp.set_rows(vec![f64::NEG_INFINITY], vec![3.0], vec![(0, 0, 1.0), (0, 1, 1.0)]);
        for col in 0..2 {
            lp.set_variable_bounds(col, 0.0, 2.0);
            lp.set_objective_coefficient(col, -1.0);
        }
        lp
    }

    #[test]
    fn test_simple_optimum() {
        let mut simplex = RevisedSimplex::default();
        let status = simplex.solve(&two_var_lp()).unwrap();
        assert_eq!(status, ProblemStatus::Optimal);
        assert!((simplex.objective_value() + 3.0).abs() < 1e-9);
        assert!((simplex.constraint_activity(0) - 3.0).abs() < 1e-9);
        assert!(simplex.dual_value(0) < 0.0);
    }

    #[test]
    fn test_nonbasic_status_fallbacks() {
        use VariableStatus::*;
        assert_eq!(nonbasic_status(1.0, 1.0, AtUpperBound), FixedValue);
        assert_eq!(nonbasic_status(0.0, f64::INFINITY, AtUpperBound), AtLowerBound);
        assert_eq!(nonbasic_status(f64::NEG_INFINITY, 4.0, AtLowerBound), AtUpperBound);
        assert_eq!(nonbasic_status(f64::NEG_INFINITY, f64::INFINITY, Basic), Free);
    }

    #[test]
    fn test_warm_start_reuses_basis() {
        let mut simplex = RevisedSimplex::default();
        let lp = two_var_lp();
        simplex.solve(&lp).unwrap();
        let first = simplex.iterations();
        simplex.solve(&lp).unwrap();
        assert!(first > 0);
        assert_eq!(simplex.iterations(), 0);
    }

    #[test]
    fn test_inconsistent_state_falls_back_to_slacks() {
        let mut simplex = RevisedSimplex::default();
        simplex.load_state(BasisState {
            statuses: vec![VariableStatus::Basic; 3],
        });
        let status = simplex.solve(&two_var_lp()).unwrap();
        assert_eq!(status, ProblemStatus::Optimal);
    }
}
