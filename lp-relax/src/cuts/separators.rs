//! Separator registry.
//!
//! Every built-in cut family is a [`CutSeparator`] that turns the current LP
//! solution into multiplier lists and hands them to the [`CutBuilder`]. The
//! caller can add [`CutGenerator`]s that work on the expanded LP values and
//! write into the pool directly.

use rand_chacha::ChaCha8Rng;

use crate::master::{LpScaler, MasterBackend};
use crate::model::{IntegerTrail, IntegerValue, IntegerVariable};
use crate::settings::LpSettings;
use crate::time_limit::TimeLimit;

use super::builder::{CutBuilder, SolutionView};
use super::gomory::GomorySeparator;
use super::mir::MirSeparator;
use super::objective::ObjectiveSeparator;
use super::pool::ConstraintPool;
use super::zero_half::ZeroHalfSeparator;

/// Objective data needed by the objective cut.
#[derive(Debug, Clone, Copy)]
pub struct ObjectiveInfo {
    /// Variable bounded below by the objective.
    pub var: IntegerVariable,
    /// LP objective value, offset included.
    pub lp_value: f64,
}

/// Everything a separator may read or update during one round.
pub struct SeparationContext<'a> {
    /// Integer rows and the LP point.
    pub view: SolutionView<'a>,
    /// Solved master, in the scaled space.
    pub backend: &'a dyn MasterBackend,
    /// Scaling between the master and the integer rows.
    pub scaler: &'a LpScaler,
    /// Present when the relaxation has an objective variable.
    pub objective: Option<ObjectiveInfo>,
    /// Rows aggregated on top of the starting row by MIR.
    pub max_mir_aggregations: usize,
    /// Shared cut pipeline.
    pub builder: &'a mut CutBuilder,
    /// Destination of the cuts.
    pub pool: &'a mut ConstraintPool,
    /// Bounds of the integer search.
    pub trail: &'a mut dyn IntegerTrail,
    /// Random source for tie-breaking.
    pub rng: &'a mut ChaCha8Rng,
    /// Polled between candidates.
    pub time_limit: &'a TimeLimit,
}

impl SeparationContext<'_> {
    /// Run the cut pipeline on `multipliers`.
    pub fn add_cut_from_constraints(&mut self, name: &str, multipliers: &[(usize, IntegerValue)]) -> bool {
        self.builder
            .add_cut_from_constraints(name, multipliers, &self.view, &mut *self.trail, &mut *self.pool)
    }

    /// Level-zero bounds of a column.
    pub fn level_zero_bounds(&self, col: usize) -> (IntegerValue, IntegerValue) {
        let var = self.view.lp.variables[col];
        (self.trail.level_zero_lower_bound(var), self.trail.level_zero_upper_bound(var))
    }

    /// LP value of a column.
    pub fn column_value(&self, col: usize) -> f64 {
        self.view.lp_values[self.view.lp.variables[col].index()]
    }
}

/// A built-in cut family.
pub trait CutSeparator {
    /// Prefix of the names of the cuts it adds.
    fn name(&self) -> &'static str;

    /// Offer cuts for the current LP solution. Returns how many were added.
    fn separate(&mut self, ctx: &mut SeparationContext<'_>) -> usize;
}

/// A caller-supplied cut generator.
pub trait CutGenerator {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Only call this generator at decision level zero.
    fn only_at_level_zero(&self) -> bool {
        false
    }

    /// Add cuts for `lp_values` (indexed by [`IntegerVariable::index`]) to
    /// `pool`. Returning false signals that the model is infeasible.
    fn generate_cuts(&mut self, lp_values: &[f64], pool: &mut ConstraintPool) -> bool;
}

/// The enabled built-in separators, in calling order.
pub fn builtin_separators(settings: &LpSettings) -> Vec<Box<dyn CutSeparator>> {
    let mut separators: Vec<Box<dyn CutSeparator>> = Vec::new();
    if settings.cut_level == 0 {
        return separators;
    }
    if settings.add_objective_cut {
        separators.push(Box::new(ObjectiveSeparator));
    }
    if settings.add_mir_cuts {
        separators.push(Box::new(MirSeparator::default()));
    }
    if settings.add_cg_cuts {
        separators.push(Box::new(GomorySeparator));
    }
    if settings.add_zero_half_cuts {
        separators.push(Box::new(ZeroHalfSeparator::default()));
    }
    separators
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_order() {
        let settings = LpSettings {
            add_objective_cut: true,
            ..LpSettings::default()
        };
        let names: Vec<_> = builtin_separators(&settings).iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["Objective", "MIR", "CG", "ZERO_HALF"]);

        assert!(builtin_separators(&LpSettings::default().without_cuts()).is_empty());
    }
}
