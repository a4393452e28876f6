//! Linear constraints over integer variables.

use super::integer::{to_double, IntegerValue, IntegerVariable, MAX_INTEGER_VALUE, MIN_INTEGER_VALUE};
use crate::math::arith::{ceil_ratio, floor_ratio, gcd};

/// `lb <= sum coeffs[i] * vars[i] <= ub` with integer coefficients.
///
/// Bounds may be the infinity sentinels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearConstraint {
    /// Variables (either view)
    pub vars: Vec<IntegerVariable>,
    /// Coefficients, one per variable
    pub coeffs: Vec<IntegerValue>,
    /// Lower bound
    pub lb: IntegerValue,
    /// Upper bound
    pub ub: IntegerValue,
}

impl LinearConstraint {
    /// Create a constraint from its terms.
    pub fn new(terms: &[(IntegerVariable, IntegerValue)], lb: IntegerValue, ub: IntegerValue) -> Self {
        Self {
            vars: terms.iter().map(|t| t.0).collect(),
            coeffs: terms.iter().map(|t| t.1).collect(),
            lb,
            ub,
        }
    }

    /// `sum terms <= ub`.
    pub fn less_or_equal(terms: &[(IntegerVariable, IntegerValue)], ub: IntegerValue) -> Self {
        Self::new(terms, MIN_INTEGER_VALUE, ub)
    }

    /// Number of terms.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// True when there are no terms.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterate over `(var, coeff)` pairs.
    pub fn terms(&self) -> impl Iterator<Item = (IntegerVariable, IntegerValue)> + '_ {
        self.vars.iter().copied().zip(self.coeffs.iter().copied())
    }

    /// Rewrite negative terms on the negated variable so every coefficient
    /// is positive.
    pub fn make_all_coefficients_positive(&mut self) {
        for (var, coeff) in self.vars.iter_mut().zip(self.coeffs.iter_mut()) {
            if *coeff < 0 {
                *coeff = -*coeff;
                *var = var.negation();
            }
        }
    }

    /// Express every term on the positive view, merge duplicates, drop zero
    /// coefficients and sort by variable. Returns false on overflow.
    pub fn canonicalize(&mut self) -> bool {
        let mut terms: Vec<(IntegerVariable, IntegerValue)> = self
            .terms()
            .map(|(v, c)| if v.is_positive() { (v, c) } else { (v.negation(), -c) })
            .collect();
        terms.sort_by_key(|t| t.0);

        let mut merged: Vec<(IntegerVariable, IntegerValue)> = Vec::with_capacity(terms.len());
        for (var, coeff) in terms {
            match merged.last_mut() {
                Some(last) if last.0 == var => match last.1.checked_add(coeff) {
                    Some(sum) => last.1 = sum,
                    None => return false,
                },
                _ => merged.push((var, coeff)),
            }
        }
        merged.retain(|t| t.1 != 0);
        self.vars = merged.iter().map(|t| t.0).collect();
        self.coeffs = merged.iter().map(|t| t.1).collect();
        true
    }

    /// Divide by the gcd of the coefficients, rounding the bounds inward.
    pub fn divide_by_gcd(&mut self) {
        let g = self.coeffs.iter().fold(0i64, |acc, &c| gcd(acc, c));
        if g <= 1 {
            return;
        }
        for c in &mut self.coeffs {
            *c /= g;
        }
        if self.lb > MIN_INTEGER_VALUE {
            self.lb = ceil_ratio(self.lb, g);
        }
        if self.ub < MAX_INTEGER_VALUE {
            self.ub = floor_ratio(self.ub, g);
        }
    }

    /// Activity at a point given by a lookup over variables of either view.
    pub fn activity(&self, value: impl Fn(IntegerVariable) -> f64) -> f64 {
        self.terms().map(|(v, c)| c as f64 * value(v)).sum()
    }

    /// Euclidean norm of the coefficients.
    pub fn l2_norm(&self) -> f64 {
        self.coeffs.iter().map(|&c| (c as f64) * (c as f64)).sum::<f64>().sqrt()
    }

    /// Largest coefficient magnitude.
    pub fn infinity_norm(&self) -> IntegerValue {
        self.coeffs.iter().map(|c| c.saturating_abs()).max().unwrap_or(0)
    }

    /// Normalized violation `(activity - ub) / ||a||` at a point. Lower-bound
    /// violations are counted as well.
    pub fn efficacy(&self, value: impl Fn(IntegerVariable) -> f64) -> f64 {
        let norm = self.l2_norm();
        if norm == 0.0 {
            return 0.0;
        }
        let activity = self.activity(value);
        let over = activity - to_double(self.ub);
        let under = to_double(self.lb) - activity;
        over.max(under) / norm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x(k: u32) -> IntegerVariable {
        IntegerVariable::positive_from_index(k)
    }

    #[test]
    fn test_make_positive() {
        let mut ct = LinearConstraint::less_or_equal(&[(x(0), 3), (x(1), -2)], 4);
        ct.make_all_coefficients_positive();
        assert_eq!(ct.coeffs, vec![3, 2]);
        assert_eq!(ct.vars, vec![x(0), x(1).negation()]);
    }

    #[test]
    fn test_canonicalize_merges() {
        let mut ct = LinearConstraint::less_or_equal(&[(x(2), 3), (x(0).negation(), 2), (x(2).negation(), 3), (x(0), 1)], 9);
        assert!(ct.canonicalize());
        assert_eq!(ct.vars, vec![x(0)]);
        assert_eq!(ct.coeffs, vec![-1]);
    }

    #[test]
    fn test_divide_by_gcd_rounds_inward() {
        let mut ct = LinearConstraint::new(&[(x(0), 4), (x(1), 6)], -7, 11);
        ct.divide_by_gcd();
        assert_eq!(ct.coeffs, vec![2, 3]);
        assert_eq!(ct.lb, -3);
        assert_eq!(ct.ub, 5);
    }

    #[test]
    fn test_efficacy() {
        let ct = LinearConstraint::less_or_equal(&[(x(0), 3), (x(1), 4)], 5);
        let e = ct.efficacy(|v| if v == x(0) { 1.0 } else { 1.0 });
        assert!((e - 2.0 / 5.0).abs() < 1e-12);
    }
}
