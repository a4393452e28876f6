//! Integer mirror of the loaded LP rows.
//!
//! The floating-point LP is a scaled view of these rows; every exact
//! computation (cuts, certificates) goes through the mirror.

use std::collections::HashMap;

use crate::model::{IntegerValue, IntegerVariable, LinearConstraint, MAX_INTEGER_VALUE, MIN_INTEGER_VALUE};

/// One loaded row `lb <= sum coeff * col <= ub`, terms sorted by column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegerRow {
    /// Lower bound (may be the -infinity sentinel)
    pub lb: IntegerValue,
    /// Upper bound (may be the +infinity sentinel)
    pub ub: IntegerValue,
    /// `(column, coefficient)` pairs
    pub terms: Vec<(usize, IntegerValue)>,
}

impl IntegerRow {
    /// True when both bounds are equal.
    pub fn is_equality(&self) -> bool {
        self.lb == self.ub
    }

    /// Coefficient of `col`, zero if absent.
    pub fn coeff(&self, col: usize) -> IntegerValue {
        self.terms
            .binary_search_by_key(&col, |t| t.0)
            .map(|i| self.terms[i].1)
            .unwrap_or(0)
    }
}

/// Integer rows, objective and column data of the relaxation.
#[derive(Debug, Clone, Default)]
pub struct IntegerLp {
    /// Positive integer variable of each column.
    pub variables: Vec<IntegerVariable>,
    /// Loaded rows, in LP row order.
    pub rows: Vec<IntegerRow>,
    /// Largest magnitude among the coefficients and finite bounds of each row.
    pub infinity_norms: Vec<IntegerValue>,
    /// `(row, coefficient)` entries of each column.
    pub columns: Vec<Vec<(usize, IntegerValue)>>,
    /// Objective terms that are not fixed at level zero.
    pub objective: Vec<(usize, IntegerValue)>,
    /// Contribution of the fixed objective terms.
    pub objective_offset: IntegerValue,
    /// Largest magnitude in the objective, offset included.
    pub objective_infinity_norm: IntegerValue,
    column_index: HashMap<IntegerVariable, usize>,
}

impl IntegerLp {
    /// Empty mirror over the given columns.
    pub fn new(variables: Vec<IntegerVariable>) -> Self {
        let num_cols = variables.len();
        let column_index = variables.iter().enumerate().map(|(col, &var)| (var, col)).collect();
        Self {
            variables,
            columns: vec![Vec::new(); num_cols],
            column_index,
            ..Self::default()
        }
    }

    /// Column of `var` (either view).
    pub fn column_of(&self, var: IntegerVariable) -> Option<usize> {
        self.column_index.get(&var.positive()).copied()
    }

    /// Variable of `col` seen with `sign` (1 or -1).
    pub fn view(&self, col: usize, sign: IntegerValue) -> IntegerVariable {
        let var = self.variables[col];
        if sign < 0 {
            var.negation()
        } else {
            var
        }
    }

    /// Number of columns.
    pub fn num_cols(&self) -> usize {
        self.variables.len()
    }

    /// Number of loaded rows.
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Drop every row, keeping the columns.
    pub fn clear_rows(&mut self) {
        self.rows.clear();
        self.infinity_norms.clear();
        for column in &mut self.columns {
            column.clear();
        }
    }

    /// Append a row given on positive variables. Returns false if the bounds
    /// are inverted or a variable is not a column.
    pub fn push_row(&mut self, ct: &LinearConstraint) -> bool {
        if ct.lb > ct.ub {
            return false;
        }
        let mut norm: IntegerValue = 0;
        if ct.lb > MIN_INTEGER_VALUE {
            norm = norm.max(ct.lb.saturating_abs());
        }
        if ct.ub < MAX_INTEGER_VALUE {
            norm = norm.max(ct.ub.saturating_abs());
        }
        let mut terms = Vec::with_capacity(ct.len());
        for (var, coeff) in ct.terms() {
            let Some(col) = self.column_of(var) else {
                return false;
            };
            let coeff = if var.is_positive() { coeff } else { -coeff };
            norm = norm.max(coeff.saturating_abs());
            terms.push((col, coeff));
        }
        terms.sort_unstable_by_key(|t| t.0);

        let row = self.rows.len();
        for &(col, coeff) in &terms {
            self.columns[col].push((row, coeff));
        }
        self.rows.push(IntegerRow {
            lb: ct.lb,
            ub: ct.ub,
            terms,
        });
        self.infinity_norms.push(norm);
        true
    }

    /// Number of rows a column appears in.
    pub fn column_degree(&self, col: usize) -> usize {
        self.columns[col].len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_row_builds_columns_and_norms() {
        let vars: Vec<IntegerVariable> = (0..3).map(IntegerVariable::positive_from_index).collect();
        let mut lp = IntegerLp::new(vars.clone());

        let ct = LinearConstraint::new(&[(vars[2], -7), (vars[0], 3)], MIN_INTEGER_VALUE, 5);
        assert!(lp.push_row(&ct));
        assert_eq!(lp.rows[0].terms, vec![(0, 3), (2, -7)]);
        assert_eq!(lp.infinity_norms[0], 7);
        assert_eq!(lp.columns[2], vec![(0, -7)]);
        assert_eq!(lp.rows[0].coeff(2), -7);
        assert_eq!(lp.rows[0].coeff(1), 0);

        let bad = LinearConstraint::new(&[(vars[1], 1)], 4, 3);
        assert!(!lp.push_row(&bad));
        assert_eq!(lp.num_rows(), 1);

        lp.clear_rows();
        assert_eq!(lp.column_degree(2), 0);
    }
}
