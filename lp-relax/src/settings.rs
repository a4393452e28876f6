//! Configuration settings for the LP relaxation.

use crate::error::{RelaxError, RelaxResult};

/// Constraint pool settings.
#[derive(Debug, Clone)]
pub struct ConstraintPoolSettings {
    /// Maximum number of rows loaded by one call to `change_lp`.
    pub max_constraints_added_per_round: usize,

    /// Minimum normalized violation `(activity - ub) / ||a||` for a cut to be
    /// admitted and for an unloaded row to be loaded.
    pub min_violation_efficacy: f64,

    /// Unload a cut after this many consecutive calls where it was slack.
    pub max_inactive_rounds: usize,

    /// Skip a candidate whose cosine with a row added in the same round
    /// exceeds this value.
    pub parallelism_threshold: f64,
}

impl Default for ConstraintPoolSettings {
    fn default() -> Self {
        Self {
            max_constraints_added_per_round: 50,
            min_violation_efficacy: 1e-4,
            max_inactive_rounds: 100,
            parallelism_threshold: 0.999,
        }
    }
}

/// LP relaxation settings.
#[derive(Debug, Clone)]
pub struct LpSettings {
    // === Reasoning ===
    /// Derive deductions through exact integer certificates instead of the
    /// floating-point reduced costs.
    pub use_exact_lp_reason: bool,

    // === Simplex budget ===
    /// Iteration budget of each solve at level zero.
    pub root_lp_iterations: u64,

    /// Lower clamp of the adaptive budget below the root.
    pub min_simplex_iterations: u64,

    /// Upper clamp of the adaptive budget below the root.
    pub max_simplex_iterations: u64,

    // === Cuts ===
    /// Number of separation rounds per propagation at level zero.
    pub max_cut_rounds_at_level_zero: usize,

    /// Zero disables all built-in separators.
    pub cut_level: u32,

    /// Only run separators at level zero.
    pub only_add_cuts_at_level_zero: bool,

    /// Strengthen "objective >= proven bound" into a cut. Only valid when the
    /// objective variable equals the objective expression.
    pub add_objective_cut: bool,

    /// Aggregate tight rows into MIR cuts.
    pub add_mir_cuts: bool,

    /// Derive Chvatal-Gomory cuts from simplex basis rows.
    pub add_cg_cuts: bool,

    /// Search for zero-half combinations of tight rows.
    pub add_zero_half_cuts: bool,

    /// Maximum number of rows aggregated on top of the starting row.
    pub max_mir_aggregations: usize,

    /// Largest `delta - r` factor accepted by integer rounding.
    pub max_integer_rounding_scaling: i64,

    // === Relaxation content ===
    /// Start with an empty relaxation and let the pool load violated rows.
    pub add_lp_constraints_lazily: bool,

    /// Two or more enables the adaptive budget and LP branching.
    pub linearization_level: u32,

    /// Run strong branching at level zero.
    pub use_branching_in_lp: bool,

    // === Randomness and output ===
    /// Seed of the random source used for tie-breaking.
    pub random_seed: u64,

    /// Log separation rounds and statistics at info level.
    pub verbose: bool,

    /// Pool settings.
    pub pool: ConstraintPoolSettings,
}

impl Default for LpSettings {
    fn default() -> Self {
        Self {
            use_exact_lp_reason: true,

            root_lp_iterations: 2000,
            min_simplex_iterations: 10,
            max_simplex_iterations: 1000,

            max_cut_rounds_at_level_zero: 1,
            cut_level: 1,
            only_add_cuts_at_level_zero: false,
            add_objective_cut: false,
            add_mir_cuts: true,
            add_cg_cuts: true,
            add_zero_half_cuts: true,
            max_mir_aggregations: 5,
            max_integer_rounding_scaling: 600,

            add_lp_constraints_lazily: true,
            linearization_level: 1,
            use_branching_in_lp: false,

            random_seed: 0,
            verbose: false,
            pool: ConstraintPoolSettings::default(),
        }
    }
}

impl LpSettings {
    /// Create settings with verbose output enabled.
    pub fn verbose() -> Self {
        Self {
            verbose: true,
            ..Self::default()
        }
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    /// Enable or disable exact reasoning.
    pub fn with_exact_reason(mut self, exact: bool) -> Self {
        self.use_exact_lp_reason = exact;
        self
    }

    /// Load every constraint upfront instead of lazily.
    pub fn with_lazy_constraints(mut self, lazy: bool) -> Self {
        self.add_lp_constraints_lazily = lazy;
        self
    }

    /// Set the number of separation rounds at level zero.
    pub fn with_cut_rounds(mut self, rounds: usize) -> Self {
        self.max_cut_rounds_at_level_zero = rounds;
        self
    }

    /// Set the linearization level.
    pub fn with_linearization_level(mut self, level: u32) -> Self {
        self.linearization_level = level;
        self
    }

    /// Enable strong branching at level zero.
    pub fn with_lp_branching(mut self, enabled: bool) -> Self {
        self.use_branching_in_lp = enabled;
        self
    }

    /// Turn every built-in separator off.
    pub fn without_cuts(mut self) -> Self {
        self.cut_level = 0;
        self
    }

    /// Check value ranges.
    pub fn validate(&self) -> RelaxResult<()> {
        if self.min_simplex_iterations == 0 {
            return Err(RelaxError::InvalidParameter(
                "min_simplex_iterations must be positive".into(),
            ));
        }
        if self.min_simplex_iterations > self.max_simplex_iterations {
            return Err(RelaxError::InvalidParameter(format!(
                "min_simplex_iterations ({}) exceeds max_simplex_iterations ({})",
                self.min_simplex_iterations, self.max_simplex_iterations
            )));
        }
        if self.root_lp_iterations == 0 {
            return Err(RelaxError::InvalidParameter(
                "root_lp_iterations must be positive".into(),
            ));
        }
        if self.max_integer_rounding_scaling < 1 {
            return Err(RelaxError::InvalidParameter(
                "max_integer_rounding_scaling must be at least 1".into(),
            ));
        }
        let efficacy = self.pool.min_violation_efficacy;
        if !efficacy.is_finite() || efficacy < 0.0 {
            return Err(RelaxError::InvalidParameter(format!(
                "min_violation_efficacy must be a non-negative number, got {efficacy}"
            )));
        }
        if !(0.0..=1.0).contains(&self.pool.parallelism_threshold) {
            return Err(RelaxError::InvalidParameter(format!(
                "parallelism_threshold must be in [0, 1], got {}",
                self.pool.parallelism_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(LpSettings::default().validate().is_ok());
        assert!(LpSettings::verbose().verbose);
    }

    #[test]
    fn test_builders() {
        let s = LpSettings::default()
            .with_seed(7)
            .with_lazy_constraints(false)
            .with_cut_rounds(3)
            .without_cuts();
        assert_eq!(s.random_seed, 7);
        assert!(!s.add_lp_constraints_lazily);
        assert_eq!(s.max_cut_rounds_at_level_zero, 3);
        assert_eq!(s.cut_level, 0);
    }

    #[test]
    fn test_validate_rejects_inverted_budget() {
        let s = LpSettings {
            min_simplex_iterations: 50,
            max_simplex_iterations: 10,
            ..Default::default()
        };
        assert!(matches!(s.validate(), Err(RelaxError::InvalidParameter(_))));
    }
}
