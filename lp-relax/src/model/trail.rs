//! Interface to the integer search and a reference trail.
//!
//! The relaxation never owns variable bounds. It reads them, and pushes
//! deductions back, through [`IntegerTrail`]. [`BoundsTrail`] is a small
//! self-contained implementation with decision levels and backtracking,
//! suitable for driving the relaxation outside of a full solver.

use super::integer::{IntegerLiteral, IntegerValue, IntegerVariable};

/// Level-zero bounds of integer variables.
pub trait BoundOracle {
    /// Lower bound of `var` at decision level zero.
    fn level_zero_lower_bound(&self, var: IntegerVariable) -> IntegerValue;

    /// Upper bound of `var` at decision level zero.
    fn level_zero_upper_bound(&self, var: IntegerVariable) -> IntegerValue;

    /// True if `var` is fixed at decision level zero.
    fn is_fixed_at_level_zero(&self, var: IntegerVariable) -> bool {
        self.level_zero_lower_bound(var) == self.level_zero_upper_bound(var)
    }
}

/// Bound storage and deduction interface of the integer search.
pub trait IntegerTrail: BoundOracle {
    /// Current lower bound of `var`.
    fn lower_bound(&self, var: IntegerVariable) -> IntegerValue;

    /// Current upper bound of `var`.
    fn upper_bound(&self, var: IntegerVariable) -> IntegerValue;

    /// Push `literal` with the given reason. Returns false on conflict.
    fn enqueue(&mut self, literal: IntegerLiteral, reason: &[IntegerLiteral]) -> bool;

    /// Report that the literals of `reason` cannot hold together. Always
    /// returns false so callers can `return trail.report_conflict(..)`.
    fn report_conflict(&mut self, reason: &[IntegerLiteral]) -> bool;

    /// Current decision level.
    fn current_decision_level(&self) -> usize;

    /// True if `var` is fixed under the current bounds.
    fn is_fixed(&self, var: IntegerVariable) -> bool {
        self.lower_bound(var) == self.upper_bound(var)
    }

    /// The literal `var >= lb(var)`.
    fn lower_bound_as_literal(&self, var: IntegerVariable) -> IntegerLiteral {
        IntegerLiteral::greater_or_equal(var, self.lower_bound(var))
    }

    /// The literal `var <= ub(var)`.
    fn upper_bound_as_literal(&self, var: IntegerVariable) -> IntegerLiteral {
        IntegerLiteral::lower_or_equal(var, self.upper_bound(var))
    }

    /// Drop the literals already implied by level-zero bounds.
    fn remove_level_zero_bounds(&self, reason: &mut Vec<IntegerLiteral>) {
        reason.retain(|lit| lit.bound > self.level_zero_lower_bound(lit.var));
    }
}

/// Registration surface used when the relaxation attaches to a search.
pub trait WatchRegistry {
    /// Call the propagator with `watch_index` when the bounds of `var` change.
    fn watch_variable(&mut self, var: IntegerVariable, watch_index: usize);

    /// Call the propagator on every propagation at level zero.
    fn always_call_at_level_zero(&mut self);
}

#[derive(Debug, Clone, Copy)]
struct BoundChange {
    var: usize,
    old_lb: IntegerValue,
    old_ub: IntegerValue,
}

/// Reference trail with decision levels.
#[derive(Debug, Clone, Default)]
pub struct BoundsTrail {
    lbs: Vec<IntegerValue>,
    ubs: Vec<IntegerValue>,
    level_zero_lbs: Vec<IntegerValue>,
    level_zero_ubs: Vec<IntegerValue>,
    changes: Vec<BoundChange>,
    level_starts: Vec<usize>,
    conflict: Option<Vec<IntegerLiteral>>,
    explanations: Vec<(IntegerLiteral, Vec<IntegerLiteral>)>,
    watches: Vec<(IntegerVariable, usize)>,
    level_zero_watch: bool,
}

impl BoundsTrail {
    /// Create an empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable with domain `[lb, ub]`.
    pub fn new_variable(&mut self, lb: IntegerValue, ub: IntegerValue) -> IntegerVariable {
        let k = self.lbs.len() as u32;
        self.lbs.push(lb);
        self.ubs.push(ub);
        self.level_zero_lbs.push(lb);
        self.level_zero_ubs.push(ub);
        IntegerVariable::positive_from_index(k)
    }

    /// Number of positive variables.
    pub fn num_variables(&self) -> usize {
        self.lbs.len()
    }

    /// Open a new decision level.
    pub fn new_decision_level(&mut self) {
        self.level_starts.push(self.changes.len());
    }

    /// Open a new decision level and push `literal` without reason.
    pub fn decide(&mut self, literal: IntegerLiteral) -> bool {
        self.new_decision_level();
        self.enqueue(literal, &[])
    }

    /// Undo every change made above `level`.
    pub fn backtrack_to(&mut self, level: usize) {
        if level >= self.level_starts.len() {
            return;
        }
        let start = self.level_starts[level];
        while self.changes.len() > start {
            if let Some(change) = self.changes.pop() {
                self.lbs[change.var] = change.old_lb;
                self.ubs[change.var] = change.old_ub;
            }
        }
        self.level_starts.truncate(level);
        self.conflict = None;
    }

    /// Reason of the last reported conflict, if any.
    pub fn conflict(&self) -> Option<&[IntegerLiteral]> {
        self.conflict.as_deref()
    }

    /// Every literal pushed with its reason, in order.
    pub fn explanations(&self) -> &[(IntegerLiteral, Vec<IntegerLiteral>)] {
        &self.explanations
    }

    /// Registered watches.
    pub fn watches(&self) -> &[(IntegerVariable, usize)] {
        &self.watches
    }

    /// True once a propagator asked to run at every level-zero propagation.
    pub fn wants_level_zero_calls(&self) -> bool {
        self.level_zero_watch
    }

    /// True if `literal` holds under the current bounds.
    pub fn holds(&self, literal: IntegerLiteral) -> bool {
        self.lower_bound(literal.var) >= literal.bound
    }

    fn record(&mut self, k: usize) {
        if !self.level_starts.is_empty() {
            self.changes.push(BoundChange {
                var: k,
                old_lb: self.lbs[k],
                old_ub: self.ubs[k],
            });
        }
    }
}

impl BoundOracle for BoundsTrail {
    fn level_zero_lower_bound(&self, var: IntegerVariable) -> IntegerValue {
        let k = var.positive_index();
        if var.is_positive() {
            self.level_zero_lbs[k]
        } else {
            -self.level_zero_ubs[k]
        }
    }

    fn level_zero_upper_bound(&self, var: IntegerVariable) -> IntegerValue {
        let k = var.positive_index();
        if var.is_positive() {
            self.level_zero_ubs[k]
        } else {
            -self.level_zero_lbs[k]
        }
    }
}

impl IntegerTrail for BoundsTrail {
    fn lower_bound(&self, var: IntegerVariable) -> IntegerValue {
        let k = var.positive_index();
        if var.is_positive() {
            self.lbs[k]
        } else {
            -self.ubs[k]
        }
    }

    fn upper_bound(&self, var: IntegerVariable) -> IntegerValue {
        let k = var.positive_index();
        if var.is_positive() {
            self.ubs[k]
        } else {
            -self.lbs[k]
        }
    }

    fn enqueue(&mut self, literal: IntegerLiteral, reason: &[IntegerLiteral]) -> bool {
        if self.lower_bound(literal.var) >= literal.bound {
            return true;
        }
        if literal.bound > self.upper_bound(literal.var) {
            let mut conflict = reason.to_vec();
            conflict.push(self.upper_bound_as_literal(literal.var));
            return self.report_conflict(&conflict);
        }

        let k = literal.var.positive_index();
        self.record(k);
        if literal.var.is_positive() {
            self.lbs[k] = literal.bound;
        } else {
            self.ubs[k] = -literal.bound;
        }
        if self.level_starts.is_empty() {
            self.level_zero_lbs[k] = self.lbs[k];
            self.level_zero_ubs[k] = self.ubs[k];
        }
        self.explanations.push((literal, reason.to_vec()));
        true
    }

    fn report_conflict(&mut self, reason: &[IntegerLiteral]) -> bool {
        self.conflict = Some(reason.to_vec());
        false
    }

    fn current_decision_level(&self) -> usize {
        self.level_starts.len()
    }
}

impl WatchRegistry for BoundsTrail {
    fn watch_variable(&mut self, var: IntegerVariable, watch_index: usize) {
        self.watches.push((var, watch_index));
    }

    fn always_call_at_level_zero(&mut self) {
        self.level_zero_watch = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_and_backtrack() {
        let mut trail = BoundsTrail::new();
        let x = trail.new_variable(0, 10);
        assert!(trail.enqueue(IntegerLiteral::greater_or_equal(x, 2), &[]));
        assert_eq!(trail.level_zero_lower_bound(x), 2);

        assert!(trail.decide(IntegerLiteral::lower_or_equal(x, 5)));
        assert_eq!(trail.upper_bound(x), 5);
        assert_eq!(trail.lower_bound(x.negation()), -5);
        assert_eq!(trail.level_zero_upper_bound(x), 10);
        assert_eq!(trail.current_decision_level(), 1);

        trail.backtrack_to(0);
        assert_eq!(trail.upper_bound(x), 10);
        assert_eq!(trail.lower_bound(x), 2);
        assert_eq!(trail.current_decision_level(), 0);
    }

    #[test]
    fn test_conflict_on_empty_domain() {
        let mut trail = BoundsTrail::new();
        let x = trail.new_variable(0, 3);
        let y = trail.new_variable(0, 3);
        let reason = [IntegerLiteral::greater_or_equal(y, 0)];
        assert!(!trail.enqueue(IntegerLiteral::greater_or_equal(x, 4), &reason));
        let conflict = trail.conflict().unwrap();
        assert_eq!(conflict.len(), 2);
        assert_eq!(conflict[1], IntegerLiteral::lower_or_equal(x, 3));
    }

    #[test]
    fn test_remove_level_zero_bounds() {
        let mut trail = BoundsTrail::new();
        let x = trail.new_variable(0, 3);
        trail.decide(IntegerLiteral::greater_or_equal(x, 1));
        let mut reason = vec![
            IntegerLiteral::greater_or_equal(x, 0),
            IntegerLiteral::greater_or_equal(x, 1),
            IntegerLiteral::lower_or_equal(x, 3),
        ];
        trail.remove_level_zero_bounds(&mut reason);
        assert_eq!(reason, vec![IntegerLiteral::greater_or_equal(x, 1)]);
    }
}
