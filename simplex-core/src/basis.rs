//! Basis bookkeeping and the dense basis inverse.
//!
//! The basis inverse is stored explicitly. Each pivot applies the usual
//! elementary row operations; the caller refactors from scratch
//! periodically to bound the accumulated error.

use crate::problem::VariableStatus;
use nalgebra::{DMatrix, DVector};

/// Warm-start information: one status per variable, structural columns first
/// and then one slack per row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasisState {
    /// Statuses of columns `0..n` followed by row slacks `n..n+m`
    pub statuses: Vec<VariableStatus>,
}

impl BasisState {
    /// Number of basic variables in the state.
    pub fn num_basic(&self) -> usize {
        self.statuses
            .iter()
            .filter(|&&s| s == VariableStatus::Basic)
            .count()
    }

    /// True if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}

/// Explicit inverse of the basis matrix.
#[derive(Debug, Clone)]
pub(crate) struct BasisInverse {
    inverse: DMatrix<f64>,
    updates: usize,
}

impl BasisInverse {
    /// Invert the basis made of `basis` columns. Returns `None` if singular.
    pub fn factorize(num_rows: usize, basis: &[usize], columns: &[Vec<(usize, f64)>]) -> Option<Self> {
        if num_rows == 0 {
            return Some(Self {
                inverse: DMatrix::zeros(0, 0),
                updates: 0,
            });
        }
        let mut b = DMatrix::zeros(num_rows, num_rows);
        for (pos, &var) in basis.iter().enumerate() {
            for &(row, value) in &columns[var] {
                b[(row, pos)] = value;
            }
        }
        let inverse = b.try_inverse()?;
        if inverse.iter().any(|v| !v.is_finite()) {
            return None;
        }
        Some(Self { inverse, updates: 0 })
    }

    /// Pivots applied since the last factorization.
    pub fn updates(&self) -> usize {
        self.updates
    }

    /// Compute `B^-1 a` for a sparse column `a`.
    pub fn solve_column(&self, column: &[(usize, f64)]) -> DVector<f64> {
        let mut result = DVector::zeros(self.inverse.nrows());
        for &(row, value) in column {
            result.axpy(value, &self.inverse.column(row), 1.0);
        }
        result
    }

    /// Compute `B^-T c`.
    pub fn transpose_solve(&self, c: &DVector<f64>) -> DVector<f64> {
        self.inverse.tr_mul(c)
    }

    /// Compute `B^-1 r` for a dense vector.
    pub fn solve_dense(&self, r: &DVector<f64>) -> DVector<f64> {
        &self.inverse * r
    }

    /// Row `pos` of `B^-1`.
    pub fn row(&self, pos: usize) -> Vec<f64> {
        self.inverse.row(pos).iter().copied().collect()
    }

    /// Replace the basic variable at position `pos`, where `alpha = B^-1 a_q`
    /// for the entering column `a_q`.
    pub fn pivot(&mut self, pos: usize, alpha: &DVector<f64>) {
        let n = self.inverse.nrows();
        let pivot = alpha[pos];
        let pivot_row: Vec<f64> = (0..n).map(|k| self.inverse[(pos, k)] / pivot).collect();
        for i in 0..n {
            if i == pos || alpha[i] == 0.0 {
                continue;
            }
            let factor = alpha[i];
            for (k, &v) in pivot_row.iter().enumerate() {
                if v != 0.0 {
                    self.inverse[(i, k)] -= factor * v;
                }
            }
        }
        for (k, &v) in pivot_row.iter().enumerate() {
            self.inverse[(pos, k)] = v;
        }
        self.updates += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<Vec<(usize, f64)>> {
        vec![
            vec![(0, 2.0), (1, 1.0)],
            vec![(0, 1.0), (1, 3.0)],
            vec![(0, -1.0)],
            vec![(1, -1.0)],
        ]
    }

    #[test]
    fn test_factorize_and_solve() {
        let cols = columns();
        let inv = BasisInverse::factorize(2, &[0, 1], &cols).unwrap();
        // B = [[2,1],[1,3]], B^-1 a_0 must be e_0
        let x = inv.solve_column(&cols[0]);
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!(x[1].abs() < 1e-12);
    }

    #[test]
    fn test_pivot_matches_refactorization() {
        let cols = columns();
        let mut inv = BasisInverse::factorize(2, &[2, 3], &cols).unwrap();
        let alpha = inv.solve_column(&cols[0]);
        inv.pivot(0, &alpha);
        let fresh = BasisInverse::factorize(2, &[0, 3], &cols).unwrap();
        for r in 0..2 {
            for (a, b) in inv.row(r).iter().zip(fresh.row(r).iter()) {
                assert!((a - b).abs() < 1e-12);
            }
        }
        assert_eq!(inv.updates(), 1);
    }

    #[test]
    fn test_singular_basis() {
        let cols = vec![vec![(0, 1.0), (1, 1.0)], vec![(0, 2.0), (1, 2.0)]];
        assert!(BasisInverse::factorize(2, &[0, 1], &cols).is_none());
    }
}
