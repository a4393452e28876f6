//! Canonical cut representation shared by every strengthening heuristic.
//!
//! A [`CutData`] is `sum coeff_i * expr_i <= rhs` where each expression is
//! an affine function of at most two columns or row activities and always
//! lies in `[0, bound_diff_i]`. Shifting and complementing keep the LP
//! value of most expressions near zero, which is what rounding and cover
//! heuristics want.

use crate::model::{BoundOracle, IntegerValue, IntegerVariable, LinearConstraint, MAX_INTEGER_VALUE, MIN_INTEGER_VALUE};

use super::pool::expanded_value;

/// LP value above which a term is considered relevant.
pub const RELEVANT_LP_VALUE: f64 = 1e-2;

/// Atom an expression is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprVar {
    /// Relaxation column (positive variable).
    Column(usize),
    /// Activity of a loaded row.
    Row(usize),
}

/// One term `coeff * expr` of a [`CutData`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutTerm {
    /// Coefficient of the expression
    pub coeff: IntegerValue,
    /// Value of the expression at the LP solution
    pub lp_value: f64,
    /// Upper bound of the expression, `MAX_INTEGER_VALUE` when unbounded
    pub bound_diff: IntegerValue,
    /// `expr = sum expr_coeffs[k] * expr_vars[k] + expr_offset`; a zero
    /// coefficient marks an unused slot
    pub expr_vars: [ExprVar; 2],
    /// Coefficients of the expression atoms
    pub expr_coeffs: [IntegerValue; 2],
    /// Constant of the expression
    pub expr_offset: IntegerValue,
}

impl CutTerm {
    /// Term `coeff * (sign * atom + offset)`.
    pub fn single(coeff: IntegerValue, atom: ExprVar, sign: IntegerValue, offset: IntegerValue, bound_diff: IntegerValue, lp_value: f64) -> Self {
        Self {
            coeff,
            lp_value,
            bound_diff,
            expr_vars: [atom, atom],
            expr_coeffs: [sign, 0],
            expr_offset: offset,
        }
    }

    /// True when the expression is a 0/1 quantity.
    pub fn is_binary(&self) -> bool {
        self.bound_diff == 1
    }

    /// True when the expression has a finite upper bound.
    pub fn is_bounded(&self) -> bool {
        self.bound_diff < MAX_INTEGER_VALUE
    }

    /// True when the LP value is far enough from zero to matter.
    pub fn has_relevant_lp_value(&self) -> bool {
        self.lp_value > RELEVANT_LP_VALUE
    }

    /// Replace `expr` by `bound_diff - expr`, moving the constant into `rhs`.
    /// Returns false when the term is unbounded or the constant overflows.
    pub fn complement(&mut self, rhs: &mut i128) -> bool {
        if !self.is_bounded() {
            return false;
        }
        let Some(offset) = self.bound_diff.checked_sub(self.expr_offset) else {
            return false;
        };
        *rhs -= self.coeff as i128 * self.bound_diff as i128;
        self.coeff = -self.coeff;
        self.expr_coeffs = [-self.expr_coeffs[0], -self.expr_coeffs[1]];
        self.expr_offset = offset;
        self.lp_value = self.bound_diff as f64 - self.lp_value;
        true
    }

    /// Value of the expression given the value of each atom.
    pub fn expr_value(&self, value: impl Fn(ExprVar) -> i128) -> i128 {
        let mut result = self.expr_offset as i128;
        for k in 0..2 {
            if self.expr_coeffs[k] != 0 {
                result += self.expr_coeffs[k] as i128 * value(self.expr_vars[k]);
            }
        }
        result
    }
}

/// `sum terms <= rhs` with every expression in `[0, bound_diff]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CutData {
    /// Right-hand side, wide so shifting never overflows
    pub rhs: i128,
    /// Terms
    pub terms: Vec<CutTerm>,
}

impl CutData {
    /// Build from `sum coeff * var <= ub` over variables of either view.
    ///
    /// Each variable is shifted by its level-zero lower bound and
    /// complemented when its LP value is past the middle of its range.
    /// Returns `None` for an infinite lower bound or right-hand side.
    pub fn from_constraint<O>(
        ct: &LinearConstraint,
        oracle: &O,
        lp_values: &[f64],
        col_of: impl Fn(IntegerVariable) -> Option<usize>,
    ) -> Option<Self>
    where
        O: BoundOracle + ?Sized,
    {
        if ct.ub >= MAX_INTEGER_VALUE {
            return None;
        }
        let mut data = CutData {
            rhs: ct.ub as i128,
            terms: Vec::with_capacity(ct.len()),
        };
        for (var, coeff) in ct.terms() {
            if coeff == 0 {
                continue;
            }
            let col = col_of(var.positive())?;
            let lb = oracle.level_zero_lower_bound(var);
            let ub = oracle.level_zero_upper_bound(var);
            if lb <= MIN_INTEGER_VALUE {
                return None;
            }
            let bound_diff = if ub >= MAX_INTEGER_VALUE {
                MAX_INTEGER_VALUE
            } else {
                ub.checked_sub(lb).filter(|d| *d < MAX_INTEGER_VALUE)?
            };
            let sign = if var.is_positive() { 1 } else { -1 };
            let lp_value = expanded_value(lp_values, var) - lb as f64;
            data.rhs -= coeff as i128 * lb as i128;
            let mut term = CutTerm::single(coeff, ExprVar::Column(col), sign, -lb, bound_diff, lp_value);
            if term.is_bounded() && 2.0 * lp_value > bound_diff as f64 {
                term.complement(&mut data.rhs);
            }
            data.terms.push(term);
        }
        Some(data)
    }

    /// Append the slack of row `row` weighted by `|multiplier|`.
    ///
    /// A positive multiplier refers to the upper bound, so the slack is
    /// `ub - row`; a negative one to the lower bound with slack `row - lb`.
    pub fn push_row_slack(
        &mut self,
        row: usize,
        multiplier: IntegerValue,
        lb: IntegerValue,
        ub: IntegerValue,
        activity: f64,
    ) -> bool {
        let range = if lb <= MIN_INTEGER_VALUE || ub >= MAX_INTEGER_VALUE {
            MAX_INTEGER_VALUE
        } else {
            match ub.checked_sub(lb) {
                Some(d) if d < MAX_INTEGER_VALUE => d,
                _ => MAX_INTEGER_VALUE,
            }
        };
        let term = if multiplier > 0 {
            if ub >= MAX_INTEGER_VALUE {
                return false;
            }
            CutTerm::single(multiplier, ExprVar::Row(row), -1, ub, range, (ub as f64 - activity).max(0.0))
        } else {
            if lb <= MIN_INTEGER_VALUE {
                return false;
            }
            let Some(coeff) = multiplier.checked_neg() else {
                return false;
            };
            CutTerm::single(coeff, ExprVar::Row(row), 1, -lb, range, (activity - lb as f64).max(0.0))
        };
        self.terms.push(term);
        true
    }

    /// Number of terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// True without terms.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Left-hand side at the LP solution.
    pub fn lp_activity(&self) -> f64 {
        self.terms.iter().map(|t| t.coeff as f64 * t.lp_value).sum()
    }

    /// `lp_activity - rhs`, positive when the LP point is cut off.
    pub fn violation(&self) -> f64 {
        self.lp_activity() - self.rhs as f64
    }

    /// Violation divided by the Euclidean norm of the coefficients.
    pub fn efficacy(&self) -> f64 {
        let norm: f64 = self.terms.iter().map(|t| (t.coeff as f64).powi(2)).sum::<f64>().sqrt();
        if norm == 0.0 {
            return 0.0;
        }
        self.violation() / norm
    }

    /// Complement every negative term so all coefficients are positive.
    /// Fails when a negative term is unbounded.
    pub fn make_all_terms_positive(&mut self) -> bool {
        for term in &mut self.terms {
            if term.coeff < 0 && !term.complement(&mut self.rhs) {
                return false;
            }
        }
        true
    }

    /// Drop zero-coefficient terms.
    pub fn remove_zero_terms(&mut self) {
        self.terms.retain(|t| t.coeff != 0);
    }

    /// Left-hand side at an integer point, in wide arithmetic.
    pub fn activity_at(&self, value: impl Fn(ExprVar) -> i128) -> i128 {
        self.terms
            .iter()
            .map(|t| t.coeff as i128 * t.expr_value(&value))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BoundsTrail;

    #[test]
    fn test_from_constraint_shifts_and_complements() {
        let mut trail = BoundsTrail::new();
        let x = trail.new_variable(1, 5);
        let y = trail.new_variable(0, 4);
        // 2x + 3y <= 14 at x = 4.5 (past mid-range), y = 1
        let ct = LinearConstraint::less_or_equal(&[(x, 2), (y, 3)], 14);
        let mut lp_values = vec![0.0; 4];
        lp_values[x.index()] = 4.5;
        lp_values[x.negation().index()] = -4.5;
        lp_values[y.index()] = 1.0;
        lp_values[y.negation().index()] = -1.0;

        let data = CutData::from_constraint(&ct, &trail, &lp_values, |v| Some(v.positive_index())).unwrap();
        // x' = 5 - x, y' = y: -2x' + 3y' <= 14 - 2 - 8 = 4
        assert_eq!(data.rhs, 4);
        assert_eq!(data.terms[0].coeff, -2);
        assert_eq!(data.terms[0].expr_offset, 5);
        assert!((data.terms[0].lp_value - 0.5).abs() < 1e-12);
        assert_eq!(data.terms[1].coeff, 3);

        // Same set of integer points.
        for xv in 1..=5i128 {
            for yv in 0..=4i128 {
                let value = |a: ExprVar| match a {
                    ExprVar::Column(0) => xv,
                    _ => yv,
                };
                let lhs = data.activity_at(value);
                assert_eq!(lhs <= data.rhs, 2 * xv + 3 * yv <= 14);
            }
        }
    }

    #[test]
    fn test_negated_view_and_make_positive() {
        let mut trail = BoundsTrail::new();
        let x = trail.new_variable(0, 3);
        // 2 * (-x) <= -1, i.e. x >= 1
        let ct = LinearConstraint::less_or_equal(&[(x.negation(), 2)], -1);
        let lp_values = vec![0.5, -0.5];
        let mut data = CutData::from_constraint(&ct, &trail, &lp_values, |v| Some(v.positive_index())).unwrap();
        // -x in [-3, 0] shifted to -x + 3, then complemented to x since
        // its LP value 2.5 is past mid-range.
        assert_eq!(data.terms[0].coeff, -2);
        assert_eq!(data.terms[0].expr_coeffs[0], 1);
        assert_eq!(data.terms[0].expr_offset, 0);
        assert_eq!(data.rhs, -1);
        assert!(data.make_all_terms_positive());
        assert_eq!(data.terms[0].expr_coeffs[0], -1);
        assert_eq!(data.terms[0].expr_offset, 3);
        assert_eq!(data.rhs, 5);
        assert!(data.terms.iter().all(|t| t.coeff >= 0));
        for xv in 0..=3i128 {
            let lhs = data.activity_at(|_| xv);
            assert_eq!(lhs <= data.rhs, xv >= 1);
        }
    }

    #[test]
    fn test_row_slack_terms() {
        let mut data = CutData::default();
        assert!(data.push_row_slack(3, 2, MIN_INTEGER_VALUE, 7, 6.5));
        assert!(!data.push_row_slack(4, -1, MIN_INTEGER_VALUE, 7, 6.5));
        assert!(data.push_row_slack(4, -1, 2, 7, 6.5));
        let slack = data.terms[0];
        assert!(!slack.is_bounded());
        assert!((slack.lp_value - 0.5).abs() < 1e-12);
        assert_eq!(slack.expr_value(|_| 6), 1);
        assert_eq!(data.terms[1].bound_diff, 5);
        assert_eq!(data.terms[1].expr_value(|_| 6), 4);
    }
}
