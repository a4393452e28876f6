//! Exact `sum c x <= ub` propagator with relaxed explanations.

use crate::math::arith::to_i64;
use crate::model::{IntegerLiteral, IntegerTrail, IntegerValue, IntegerVariable, LinearConstraint};

/// Weaken the literals `var_i >= b_i` of `reason` toward their level-zero
/// bounds while the weighted total `sum coeffs_i * (b_i - b'_i)` stays
/// within `slack`, then drop the literals implied at level zero.
///
/// Literals with small coefficients are relaxed first.
pub fn relax_linear_reason<T: IntegerTrail + ?Sized>(
    trail: &T,
    mut slack: IntegerValue,
    coeffs: &[IntegerValue],
    reason: &mut Vec<IntegerLiteral>,
) {
    debug_assert_eq!(coeffs.len(), reason.len());
    if slack > 0 {
        let mut order: Vec<usize> = (0..reason.len()).collect();
        order.sort_by_key(|&i| coeffs[i]);
        for i in order {
            let coeff = coeffs[i];
            if coeff <= 0 {
                continue;
            }
            let lit = &mut reason[i];
            let room = lit.bound.saturating_sub(trail.level_zero_lower_bound(lit.var));
            let delta = room.min(slack / coeff);
            if delta <= 0 {
                continue;
            }
            lit.bound -= delta;
            slack -= delta * coeff;
            if slack == 0 {
                break;
            }
        }
    }
    trail.remove_level_zero_bounds(reason);
}

/// Retained exact constraint `sum coeffs * vars <= ub` with positive
/// coefficients, normalized so its activity over the level-zero box fits
/// in 64 bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegerSumLe {
    vars: Vec<IntegerVariable>,
    coeffs: Vec<IntegerValue>,
    ub: IntegerValue,
}

impl IntegerSumLe {
    /// Wrap a normalized `<=` constraint. Terms with a negative coefficient
    /// are put on the negated variable.
    pub fn new(ct: &LinearConstraint) -> Self {
        let mut vars = Vec::with_capacity(ct.len());
        let mut coeffs = Vec::with_capacity(ct.len());
        for (var, coeff) in ct.terms() {
            if coeff > 0 {
                vars.push(var);
                coeffs.push(coeff);
            } else if coeff < 0 {
                vars.push(var.negation());
                coeffs.push(-coeff);
            }
        }
        Self { vars, coeffs, ub: ct.ub }
    }

    /// Variables.
    pub fn vars(&self) -> &[IntegerVariable] {
        &self.vars
    }

    /// Coefficients, all positive.
    pub fn coeffs(&self) -> &[IntegerValue] {
        &self.coeffs
    }

    /// Upper bound.
    pub fn ub(&self) -> IntegerValue {
        self.ub
    }

    /// Number of terms.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// True without terms.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    fn lower_bound_reason<T: IntegerTrail + ?Sized>(&self, trail: &T, skip: Option<usize>) -> (Vec<IntegerLiteral>, Vec<IntegerValue>) {
        let mut reason = Vec::with_capacity(self.vars.len());
        let mut coeffs = Vec::with_capacity(self.vars.len());
        for (i, (&var, &coeff)) in self.vars.iter().zip(&self.coeffs).enumerate() {
            if Some(i) == skip {
                continue;
            }
            reason.push(trail.lower_bound_as_literal(var));
            coeffs.push(coeff);
        }
        (reason, coeffs)
    }

    /// Detect a conflict or push `var <= lb + slack / coeff` on every term
    /// whose range exceeds the slack. Returns false on conflict.
    pub fn propagate<T: IntegerTrail + ?Sized>(&self, trail: &mut T) -> bool {
        let mut min_activity: i128 = 0;
        for (&var, &coeff) in self.vars.iter().zip(&self.coeffs) {
            min_activity += coeff as i128 * trail.lower_bound(var) as i128;
        }
        let Some(slack) = to_i64(self.ub as i128 - min_activity) else {
            log::debug!("sum-le slack out of range, skipping");
            return true;
        };

        if slack < 0 {
            let (mut reason, coeffs) = self.lower_bound_reason(&*trail, None);
            relax_linear_reason(&*trail, -slack - 1, &coeffs, &mut reason);
            return trail.report_conflict(&reason);
        }

        for (i, (&var, &coeff)) in self.vars.iter().zip(&self.coeffs).enumerate() {
            let lb = trail.lower_bound(var);
            let ub = trail.upper_bound(var);
            if (coeff as i128) * (ub as i128 - lb as i128) <= slack as i128 {
                continue;
            }
            let div = slack / coeff;
            let new_ub = lb + div;
            let excess = coeff * (div + 1) - slack - 1;
            let (mut reason, coeffs) = self.lower_bound_reason(&*trail, Some(i));
            relax_linear_reason(&*trail, excess, &coeffs, &mut reason);
            if !trail.enqueue(IntegerLiteral::lower_or_equal(var, new_ub), &reason) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BoundsTrail;

    fn setup() -> (BoundsTrail, IntegerSumLe, [IntegerVariable; 3]) {
        let mut trail = BoundsTrail::new();
        let x = trail.new_variable(0, 3);
        let y = trail.new_variable(0, 3);
        let z = trail.new_variable(0, 3);
        let ct = LinearConstraint::less_or_equal(&[(x, 1), (y, 1), (z, 2)], 4);
        (trail, IntegerSumLe::new(&ct), [x, y, z])
    }

    #[test]
    fn test_propagates_with_relaxed_reasons() {
        let (mut trail, sum, [x, y, z]) = setup();
        trail.decide(IntegerLiteral::greater_or_equal(x, 2));
        assert!(sum.propagate(&mut trail));
        assert_eq!(trail.upper_bound(y), 2);
        assert_eq!(trail.upper_bound(z), 1);

        let explanations = trail.explanations();
        let (lit, reason) = explanations
            .iter()
            .find(|(l, _)| l.var == z.negation())
            .unwrap();
        assert_eq!(*lit, IntegerLiteral::lower_or_equal(z, 1));
        // x >= 1 is enough: 1 + 2 * 2 > 4.
        assert_eq!(reason, &vec![IntegerLiteral::greater_or_equal(x, 1)]);
    }

    #[test]
    fn test_conflict() {
        let (mut trail, sum, [x, _, z]) = setup();
        trail.decide(IntegerLiteral::greater_or_equal(x, 3));
        trail.enqueue(IntegerLiteral::greater_or_equal(z, 1), &[]);
        assert!(!sum.propagate(&mut trail));
        let conflict = trail.conflict().unwrap();
        assert!(conflict.contains(&IntegerLiteral::greater_or_equal(x, 3)));
        assert!(conflict.contains(&IntegerLiteral::greater_or_equal(z, 1)));
        assert_eq!(conflict.len(), 2);
    }

    #[test]
    fn test_relax_linear_reason() {
        let mut trail = BoundsTrail::new();
        let a = trail.new_variable(0, 10);
        let b = trail.new_variable(0, 10);
        trail.decide(IntegerLiteral::greater_or_equal(a, 5));
        trail.enqueue(IntegerLiteral::greater_or_equal(b, 2), &[]);
        let mut reason = vec![
            IntegerLiteral::greater_or_equal(a, 5),
            IntegerLiteral::greater_or_equal(b, 2),
        ];
        // b has the smaller coefficient and is relaxed to level zero first.
        relax_linear_reason(&trail, 7, &[3, 2], &mut reason);
        assert_eq!(reason, vec![IntegerLiteral::greater_or_equal(a, 4)]);
    }
}
