//! Power-of-two equilibration of the relaxation.
//!
//! Rows and columns are scaled with Ruiz iterations:
//! - row factor `r_i = 1/sqrt(||A'[i,:]||_inf)`
//! - column factor `c_j = 1/sqrt(||A'[:,j]||_inf)`
//!
//! Every factor is rounded to a power of two so that scaling and unscaling
//! are exact in floating point. The objective gets its own factor `f`.
//!
//! In the scaled problem `A' = R A C`, `x' = x / c`, `cost' = C cost / f`
//! and row bounds are multiplied by `r`.

const RUIZ_PASSES: usize = 8;

fn nearest_power_of_two(x: f64) -> f64 {
    if x <= 0.0 || !x.is_finite() {
        return 1.0;
    }
    x.log2().round().exp2()
}

/// Row, column and objective scaling factors.
#[derive(Debug, Clone, PartialEq)]
pub struct LpScaler {
    row_scale: Vec<f64>,
    col_scale: Vec<f64>,
    objective_scale: f64,
}

impl LpScaler {
    /// No scaling.
    pub fn identity(num_rows: usize, num_cols: usize) -> Self {
        Self {
            row_scale: vec![1.0; num_rows],
            col_scale: vec![1.0; num_cols],
            objective_scale: 1.0,
        }
    }

    /// Compute factors for the matrix given by `entries` and `objective`.
    pub fn compute(num_rows: usize, num_cols: usize, entries: &[(usize, usize, f64)], objective: &[f64]) -> Self {
        let mut scaler = Self::identity(num_rows, num_cols);
        for _ in 0..RUIZ_PASSES {
            let mut row_norms = vec![0.0_f64; num_rows];
            let mut col_norms = vec![0.0_f64; num_cols];
            for &(row, col, value) in entries {
                let scaled = (value * scaler.row_scale[row] * scaler.col_scale[col]).abs();
                row_norms[row] = row_norms[row].max(scaled);
                col_norms[col] = col_norms[col].max(scaled);
            }

            let mut changed = false;
            for (scale, norm) in scaler.row_scale.iter_mut().zip(&row_norms) {
                let factor = nearest_power_of_two(1.0 / norm.sqrt());
                changed |= factor != 1.0;
                *scale *= factor;
            }
            for (scale, norm) in scaler.col_scale.iter_mut().zip(&col_norms) {
                let factor = nearest_power_of_two(1.0 / norm.sqrt());
                changed |= factor != 1.0;
                *scale *= factor;
            }
            if !changed {
                break;
            }
        }

        let max_cost = objective
            .iter()
            .zip(&scaler.col_scale)
            .map(|(c, s)| (c * s).abs())
            .fold(0.0_f64, f64::max);
        scaler.objective_scale = nearest_power_of_two(max_cost);
        scaler
    }

    /// Scale factor of a row.
    pub fn row_scale(&self, row: usize) -> f64 {
        self.row_scale[row]
    }

    /// Scale factor of a column.
    pub fn col_scale(&self, col: usize) -> f64 {
        self.col_scale[col]
    }

    /// Objective factor.
    pub fn objective_scale(&self) -> f64 {
        self.objective_scale
    }

    /// Scaled matrix entry.
    pub fn scale_entry(&self, row: usize, col: usize, value: f64) -> f64 {
        value * self.row_scale[row] * self.col_scale[col]
    }

    /// Scaled objective coefficient.
    pub fn scale_cost(&self, col: usize, cost: f64) -> f64 {
        cost * self.col_scale[col] / self.objective_scale
    }

    /// Scaled column bound.
    pub fn scale_col_bound(&self, col: usize, bound: f64) -> f64 {
        bound / self.col_scale[col]
    }

    /// Scaled row bound.
    pub fn scale_row_bound(&self, row: usize, bound: f64) -> f64 {
        bound * self.row_scale[row]
    }

    /// Column value in the original space.
    pub fn unscale_value(&self, col: usize, value: f64) -> f64 {
        value * self.col_scale[col]
    }

    /// Reduced cost in the original space.
    pub fn unscale_reduced_cost(&self, col: usize, rc: f64) -> f64 {
        rc * self.objective_scale / self.col_scale[col]
    }

    /// Dual value in the original space.
    pub fn unscale_dual(&self, row: usize, dual: f64) -> f64 {
        dual * self.row_scale[row] * self.objective_scale
    }

    /// Row multiplier (basis-inverse row, dual ray) in the original space.
    pub fn unscale_multiplier(&self, row: usize, multiplier: f64) -> f64 {
        multiplier * self.row_scale[row]
    }

    /// Row activity in the original space.
    pub fn unscale_activity(&self, row: usize, activity: f64) -> f64 {
        activity / self.row_scale[row]
    }

    /// Objective value in the original space.
    pub fn unscale_objective(&self, objective: f64) -> f64 {
        objective * self.objective_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_power_of_two(x: f64) -> bool {
        x > 0.0 && x.log2().fract() == 0.0
    }

    #[test]
    fn test_factors_are_powers_of_two() {
        let entries = vec![(0, 0, 1000.0), (0, 1, 3.0), (1, 1, 0.001), (1, 2, 7.0)];
        let scaler = LpScaler::compute(2, 3, &entries, &[5000.0, 0.0, 1.0]);
        for r in 0..2 {
            assert!(is_power_of_two(scaler.row_scale(r)));
        }
        for c in 0..3 {
            assert!(is_power_of_two(scaler.col_scale(c)));
        }
        assert!(is_power_of_two(scaler.objective_scale()));

        let max = entries
            .iter()
            .map(|&(r, c, v)| scaler.scale_entry(r, c, v).abs())
            .fold(0.0_f64, f64::max);
        assert!(max < 1000.0);
    }

    #[test]
    fn test_round_trip_is_exact() {
        let entries = vec![(0, 0, 12.0), (1, 0, 0.5), (1, 1, 96.0)];
        let scaler = LpScaler::compute(2, 2, &entries, &[3.0, -40.0]);
        let x = 1.2345;
        assert_eq!(scaler.unscale_value(1, scaler.scale_col_bound(1, x)), x);
        assert_eq!(scaler.unscale_activity(0, scaler.scale_row_bound(0, x)), x);
    }
}
