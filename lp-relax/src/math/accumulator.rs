//! Exact linear-combination accumulator over relaxation columns.
//!
//! Cut derivation repeatedly combines a few rows against a large column
//! space. While few columns are touched the accumulator stays sparse and only
//! clears what it wrote; once more than a tenth of the columns are non-zero
//! it switches to dense iteration.

use super::arith::add_product_to;
use crate::model::{IntegerValue, IntegerVariable, LinearConstraint, MIN_INTEGER_VALUE};

const DENSE_FRACTION: f64 = 0.1;

/// Integer vector indexed by column with overflow-checked accumulation.
#[derive(Debug, Clone)]
pub struct ScatteredIntegerVector {
    dense: Vec<IntegerValue>,
    is_zero: Vec<bool>,
    non_zeros: Vec<usize>,
    is_sparse: bool,
}

impl Default for ScatteredIntegerVector {
    fn default() -> Self {
        Self {
            dense: Vec::new(),
            is_zero: Vec::new(),
            non_zeros: Vec::new(),
            is_sparse: true,
        }
    }
}

impl ScatteredIntegerVector {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    fn threshold(&self) -> f64 {
        DENSE_FRACTION * self.dense.len() as f64
    }

    /// Clear to `size` zeros. The representation is chosen from the number
    /// of non-zeros the previous use ended with.
    pub fn reset(&mut self, size: usize) {
        let previous = if self.is_sparse {
            for &col in &self.non_zeros {
                self.dense[col] = 0;
                self.is_zero[col] = true;
            }
            self.non_zeros.len()
        } else {
            let count = self.dense.iter().filter(|&&v| v != 0).count();
            self.dense.iter_mut().for_each(|v| *v = 0);
            self.is_zero.iter_mut().for_each(|z| *z = true);
            count
        };
        self.non_zeros.clear();
        if size != self.dense.len() {
            self.dense = vec![0; size];
            self.is_zero = vec![true; size];
        }
        self.is_sparse = previous as f64 <= DENSE_FRACTION * size as f64;
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// True when sized to zero columns.
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// True while the sparse representation is in use.
    pub fn is_sparse(&self) -> bool {
        self.is_sparse
    }

    /// Value at `col`.
    pub fn get(&self, col: usize) -> IntegerValue {
        self.dense[col]
    }

    fn touch(&mut self, col: usize) {
        if self.is_sparse && self.is_zero[col] {
            self.is_zero[col] = false;
            self.non_zeros.push(col);
        }
    }

    /// Add `value` at `col`. Returns false on overflow.
    pub fn add(&mut self, col: usize, value: IntegerValue) -> bool {
        self.touch(col);
        let mut entry = self.dense[col];
        if !add_product_to(value, 1, &mut entry) {
            return false;
        }
        self.dense[col] = entry;
        if self.is_sparse && self.non_zeros.len() as f64 > self.threshold() {
            self.is_sparse = false;
        }
        true
    }

    /// Add `multiplier * coeff` for every `(col, coeff)`. Returns false on
    /// overflow; the vector is then only good for `reset`.
    pub fn add_scaled(&mut self, multiplier: IntegerValue, terms: &[(usize, IntegerValue)]) -> bool {
        if multiplier == 0 {
            return true;
        }
        let threshold = self.threshold();
        if self.is_sparse && (terms.len() as f64) < threshold {
            for &(col, coeff) in terms {
                self.touch(col);
                if !add_product_to(multiplier, coeff, &mut self.dense[col]) {
                    return false;
                }
            }
            if self.non_zeros.len() as f64 > threshold {
                self.is_sparse = false;
            }
        } else {
            self.is_sparse = false;
            for &(col, coeff) in terms {
                if !add_product_to(multiplier, coeff, &mut self.dense[col]) {
                    return false;
                }
            }
        }
        true
    }

    /// Non-zero `(col, coeff)` pairs sorted by column.
    pub fn terms(&self) -> Vec<(usize, IntegerValue)> {
        if self.is_sparse {
            let mut cols = self.non_zeros.clone();
            cols.sort_unstable();
            cols.into_iter()
                .filter(|&c| self.dense[c] != 0)
                .map(|c| (c, self.dense[c]))
                .collect()
        } else {
            self.dense
                .iter()
                .enumerate()
                .filter(|(_, &v)| v != 0)
                .map(|(c, &v)| (c, v))
                .collect()
        }
    }

    /// `sum coeff * vars[col] <= ub` with an infinite lower bound.
    pub fn to_constraint(&self, vars: &[IntegerVariable], ub: IntegerValue) -> LinearConstraint {
        let terms = self.terms();
        LinearConstraint {
            vars: terms.iter().map(|&(c, _)| vars[c]).collect(),
            coeffs: terms.iter().map(|&(_, v)| v).collect(),
            lb: MIN_INTEGER_VALUE,
            ub,
        }
    }
}
