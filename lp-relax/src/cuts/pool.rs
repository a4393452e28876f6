//! Managed constraint pool.
//!
//! Holds every constraint known to the relaxation, problem constraints and
//! cuts alike, and decides which of them are loaded into the LP:
//! - deduplication on the exact term list, merging bounds
//! - admission of cuts by efficacy at the current LP point
//! - unloading of cuts that stayed slack for too long
//! - loading of the most violated rows, skipping near-parallel ones
//!
//! Rows are never removed from the pool.

use std::collections::{BTreeMap, HashMap};

use crate::error::{RelaxError, RelaxResult};
use crate::model::{IntegerValue, IntegerVariable, LinearConstraint};
use crate::settings::ConstraintPoolSettings;

/// Tolerance used to decide whether a loaded row is slack.
const SLACK_TOLERANCE: f64 = 1e-6;

/// Value of `var` in an expanded LP solution indexed by [`IntegerVariable::index`].
pub fn expanded_value(lp_values: &[f64], var: IntegerVariable) -> f64 {
    lp_values.get(var.index()).copied().unwrap_or(0.0)
}

/// A constraint with pool metadata.
#[derive(Debug, Clone)]
pub struct ManagedConstraint {
    /// The canonical constraint: positive variables, sorted, gcd-free.
    pub constraint: LinearConstraint,

    /// Generated by a separator rather than given by the model.
    pub is_cut: bool,

    /// Currently loaded in the LP.
    pub in_lp: bool,

    /// Consecutive `change_lp` calls where the loaded row was slack.
    pub inactive_count: usize,

    /// Euclidean norm of the coefficients.
    pub l2_norm: f64,
}

/// Statistics for the constraint pool.
#[derive(Debug, Default, Clone)]
pub struct ConstraintPoolStats {
    /// Cuts admitted, per generator name.
    pub cuts_by_name: BTreeMap<String, usize>,

    /// Cuts that tightened the bound of an existing row.
    pub num_tightened: usize,

    /// Cut candidates rejected as duplicates or not violated enough.
    pub num_rejected: usize,

    /// Rows loaded into the LP by `change_lp`.
    pub num_loaded: usize,

    /// Cuts unloaded for inactivity.
    pub num_unloaded: usize,
}

/// Pool of managed constraints.
#[derive(Debug, Clone, Default)]
pub struct ConstraintPool {
    constraints: Vec<ManagedConstraint>,
    index_by_terms: HashMap<(Vec<IntegerVariable>, Vec<IntegerValue>), usize>,
    lp_constraints: Vec<usize>,
    objective: HashMap<IntegerVariable, f64>,
    objective_norm: f64,
    needs_rebuild: bool,
    settings: ConstraintPoolSettings,
    stats: ConstraintPoolStats,
}

impl ConstraintPool {
    /// Create an empty pool.
    pub fn new(settings: ConstraintPoolSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    fn normalize(ct: &mut LinearConstraint) -> RelaxResult<()> {
        if !ct.canonicalize() {
            return Err(RelaxError::Overflow("a managed constraint"));
        }
        ct.divide_by_gcd();
        Ok(())
    }

    /// Add a problem constraint. Returns its index and whether it is new.
    ///
    /// A constraint with the same terms as an existing one is merged into it
    /// by intersecting the bounds.
    pub fn add(&mut self, mut ct: LinearConstraint) -> RelaxResult<(usize, bool)> {
        Self::normalize(&mut ct)?;
        if ct.lb > ct.ub || (ct.is_empty() && (ct.lb > 0 || ct.ub < 0)) {
            return Err(RelaxError::Infeasible(format!("constraint {:?} has empty domain", ct)));
        }

        let key = (ct.vars.clone(), ct.coeffs.clone());
        if let Some(&index) = self.index_by_terms.get(&key) {
            let existing = &mut self.constraints[index].constraint;
            let tightened = ct.lb > existing.lb || ct.ub < existing.ub;
            existing.lb = existing.lb.max(ct.lb);
            existing.ub = existing.ub.min(ct.ub);
            if existing.lb > existing.ub {
                return Err(RelaxError::Infeasible(format!("merged constraint {:?} has empty domain", existing)));
            }
            if tightened {
                self.constraints[index].is_cut = false;
                if self.constraints[index].in_lp {
                    self.needs_rebuild = true;
                }
            }
            return Ok((index, false));
        }

        let index = self.push(ct, false);
        Ok((index, true))
    }

    fn push(&mut self, ct: LinearConstraint, is_cut: bool) -> usize {
        let index = self.constraints.len();
        self.index_by_terms
            .insert((ct.vars.clone(), ct.coeffs.clone()), index);
        self.constraints.push(ManagedConstraint {
            l2_norm: ct.l2_norm(),
            constraint: ct,
            is_cut,
            in_lp: false,
            inactive_count: 0,
        });
        index
    }

    /// Offer a cut `sum a x <= ub`. It is admitted only if it is violated by
    /// at least `min_violation_efficacy` at `lp_values` and is not dominated
    /// by an existing row with the same terms.
    pub fn add_cut(&mut self, mut ct: LinearConstraint, name: &str, lp_values: &[f64]) -> bool {
        if Self::normalize(&mut ct).is_err() || ct.is_empty() {
            self.stats.num_rejected += 1;
            return false;
        }
        let efficacy = ct.efficacy(|v| expanded_value(lp_values, v));
        if efficacy < self.settings.min_violation_efficacy {
            log::trace!("{name}: rejected cut with efficacy {efficacy:.2e}");
            self.stats.num_rejected += 1;
            return false;
        }

        let key = (ct.vars.clone(), ct.coeffs.clone());
        if let Some(&index) = self.index_by_terms.get(&key) {
            let managed = &mut self.constraints[index];
            if ct.ub >= managed.constraint.ub {
                self.stats.num_rejected += 1;
                return false;
            }
            managed.constraint.ub = ct.ub;
            managed.inactive_count = 0;
            if managed.in_lp {
                self.needs_rebuild = true;
            }
            self.stats.num_tightened += 1;
        } else {
            self.push(ct, true);
        }
        log::trace!("{name}: admitted cut with efficacy {efficacy:.2e}");
        *self.stats.cuts_by_name.entry(name.to_string()).or_default() += 1;
        true
    }

    /// Objective coefficient used to score candidate rows.
    pub fn set_objective_coefficient(&mut self, var: IntegerVariable, coeff: IntegerValue) {
        let (var, coeff) = if var.is_positive() {
            (var, coeff as f64)
        } else {
            (var.negation(), -(coeff as f64))
        };
        *self.objective.entry(var).or_default() += coeff;
        self.objective_norm = self.objective.values().map(|c| c * c).sum::<f64>().sqrt();
    }

    fn objective_parallelism(&self, managed: &ManagedConstraint) -> f64 {
        if self.objective_norm == 0.0 || managed.l2_norm == 0.0 {
            return 0.0;
        }
        let dot: f64 = managed
            .constraint
            .terms()
            .map(|(v, c)| c as f64 * self.objective.get(&v).copied().unwrap_or(0.0))
            .sum();
        dot.abs() / (self.objective_norm * managed.l2_norm)
    }

    fn cosine(a: &ManagedConstraint, b: &ManagedConstraint) -> f64 {
        if a.l2_norm == 0.0 || b.l2_norm == 0.0 {
            return 0.0;
        }
        // Both term lists are sorted by variable.
        let (x, y) = (&a.constraint, &b.constraint);
        let (mut i, mut j, mut dot) = (0, 0, 0.0);
        while i < x.len() && j < y.len() {
            match x.vars[i].cmp(&y.vars[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    dot += x.coeffs[i] as f64 * y.coeffs[j] as f64;
                    i += 1;
                    j += 1;
                }
            }
        }
        dot / (a.l2_norm * b.l2_norm)
    }

    /// Load every constraint of the pool.
    pub fn add_all_constraints_to_lp(&mut self) {
        let all: Vec<usize> = (0..self.constraints.len()).collect();
        self.set_lp_constraints(all);
    }

    /// Indices of the loaded constraints, in LP row order.
    pub fn lp_constraints(&self) -> &[usize] {
        &self.lp_constraints
    }

    /// Replace the loaded set.
    pub fn set_lp_constraints(&mut self, rows: Vec<usize>) {
        for managed in &mut self.constraints {
            managed.in_lp = false;
        }
        for &index in &rows {
            self.constraints[index].in_lp = true;
        }
        self.lp_constraints = rows;
    }

    /// Update the loaded set for the LP point `lp_values`.
    ///
    /// Returns whether the loaded set (or a loaded bound) changed and how
    /// many rows were added.
    pub fn change_lp(&mut self, lp_values: &[f64]) -> (bool, usize) {
        let mut changed = std::mem::take(&mut self.needs_rebuild);

        let max_inactive = self.settings.max_inactive_rounds;
        let mut kept = Vec::with_capacity(self.lp_constraints.len());
        for &index in &self.lp_constraints {
            let managed = &mut self.constraints[index];
            let ct = &managed.constraint;
            let activity = ct.activity(|v| expanded_value(lp_values, v));
            let tolerance = SLACK_TOLERANCE * (1.0 + managed.l2_norm);
            let slack = activity < ct.ub as f64 - tolerance && activity > ct.lb as f64 + tolerance;
            if slack {
                managed.inactive_count += 1;
            } else {
                managed.inactive_count = 0;
            }
            if managed.is_cut && managed.inactive_count > max_inactive {
                managed.in_lp = false;
                managed.inactive_count = 0;
                self.stats.num_unloaded += 1;
                changed = true;
                continue;
            }
            kept.push(index);
        }
        self.lp_constraints = kept;

        let mut candidates: Vec<(f64, usize)> = self
            .constraints
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.in_lp)
            .filter_map(|(index, m)| {
                let efficacy = m.constraint.efficacy(|v| expanded_value(lp_values, v));
                (efficacy >= self.settings.min_violation_efficacy)
                    .then(|| (efficacy + self.objective_parallelism(m), index))
            })
            .collect();
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

        let mut added: Vec<usize> = Vec::new();
        for (_, index) in candidates {
            if added.len() >= self.settings.max_constraints_added_per_round {
                break;
            }
            let candidate = &self.constraints[index];
            let parallel = added
                .iter()
                .any(|&other| Self::cosine(candidate, &self.constraints[other]) > self.settings.parallelism_threshold);
            if parallel {
                continue;
            }
            added.push(index);
        }
        for &index in &added {
            self.constraints[index].in_lp = true;
            self.constraints[index].inactive_count = 0;
            self.lp_constraints.push(index);
        }
        self.stats.num_loaded += added.len();

        (changed || !added.is_empty(), added.len())
    }

    /// All managed constraints.
    pub fn constraints(&self) -> &[ManagedConstraint] {
        &self.constraints
    }

    /// The constraint at `index`.
    pub fn constraint(&self, index: usize) -> &LinearConstraint {
        &self.constraints[index].constraint
    }

    /// Number of managed constraints.
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// True when the pool holds nothing.
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Number of managed cuts.
    pub fn num_cuts(&self) -> usize {
        self.constraints.iter().filter(|m| m.is_cut).count()
    }

    /// Pool statistics.
    pub fn stats(&self) -> &ConstraintPoolStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MIN_INTEGER_VALUE;

    fn x(k: u32) -> IntegerVariable {
        IntegerVariable::positive_from_index(k)
    }

    fn values(v: &[f64]) -> Vec<f64> {
        // Expanded layout: positive view at 2k, negation at 2k + 1.
        v.iter().flat_map(|&a| [a, -a]).collect()
    }

    #[test]
    fn test_add_and_merge() {
        let mut pool = ConstraintPool::new(ConstraintPoolSettings::default());
        // 2x + 4y in [0, 10] is stored as x + 2y in [0, 5].
        let (i1, new1) = pool.add(LinearConstraint::new(&[(x(0), 2), (x(1), 4)], 0, 10)).unwrap();
        let (i2, new2) = pool.add(LinearConstraint::new(&[(x(1), 2), (x(0), 1)], 1, 7)).unwrap();
        assert!(new1);
        assert!(!new2);
        assert_eq!(i1, i2);
        assert_eq!(pool.constraint(i1).lb, 1);
        assert_eq!(pool.constraint(i1).ub, 5);

        let (i3, new3) = pool.add(LinearConstraint::new(&[(x(0), 1), (x(1), 1)], 1, 9)).unwrap();
        assert!(new3);
        assert_ne!(i3, i1);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_infeasible_merge() {
        let mut pool = ConstraintPool::new(ConstraintPoolSettings::default());
        pool.add(LinearConstraint::new(&[(x(0), 1)], 0, 3)).unwrap();
        let err = pool.add(LinearConstraint::new(&[(x(0), 1)], 5, 9));
        assert!(matches!(err, Err(RelaxError::Infeasible(_))));
    }

    #[test]
    fn test_cut_admission() {
        let mut pool = ConstraintPool::new(ConstraintPoolSettings::default());
        let lp = values(&[1.0, 1.0]);
        let cut = LinearConstraint::less_or_equal(&[(x(0), 1), (x(1), 1)], 1);
        assert!(pool.add_cut(cut.clone(), "CG", &lp));
        // Same cut again is a duplicate.
        assert!(!pool.add_cut(cut, "CG", &lp));
        // Not violated.
        let weak = LinearConstraint::less_or_equal(&[(x(0), 1)], 2);
        assert!(!pool.add_cut(weak, "MIR_1", &lp));
        assert_eq!(pool.stats().cuts_by_name.get("CG"), Some(&1));
        assert_eq!(pool.num_cuts(), 1);
    }

    #[test]
    fn test_change_lp_loads_violated_rows() {
        let mut pool = ConstraintPool::new(ConstraintPoolSettings::default());
        pool.add(LinearConstraint::less_or_equal(&[(x(0), 1), (x(1), 1)], 1)).unwrap();
        pool.add(LinearConstraint::less_or_equal(&[(x(0), 1000), (x(1), 1000), (x(2), 1)], 1500)).unwrap();
        pool.add(LinearConstraint::new(&[(x(2), 1)], MIN_INTEGER_VALUE, 5)).unwrap();

        let (changed, added) = pool.change_lp(&values(&[1.0, 1.0, 0.0]));
        assert!(changed);
        // The second row is nearly parallel to the first.
        assert_eq!(added, 1);
        assert_eq!(pool.lp_constraints(), &[0]);

        let (changed, added) = pool.change_lp(&values(&[0.5, 0.5, 0.0]));
        assert!(!changed);
        assert_eq!(added, 0);
    }

    #[test]
    fn test_inactive_cuts_are_unloaded() {
        let settings = ConstraintPoolSettings {
            max_inactive_rounds: 2,
            ..Default::default()
        };
        let mut pool = ConstraintPool::new(settings);
        pool.add(LinearConstraint::less_or_equal(&[(x(0), 1)], 10)).unwrap();
        assert!(pool.add_cut(LinearConstraint::less_or_equal(&[(x(0), 1), (x(1), 1)], 1), "CG", &values(&[1.0, 1.0])));
        pool.add_all_constraints_to_lp();

        let slack = values(&[0.0, 0.0]);
        assert_eq!(pool.change_lp(&slack), (false, 0));
        assert_eq!(pool.change_lp(&slack), (false, 0));
        assert_eq!(pool.change_lp(&slack), (true, 0));
        assert_eq!(pool.lp_constraints(), &[0]);
        assert_eq!(pool.stats().num_unloaded, 1);
    }
}
