//! Counters of the relaxation.

use std::collections::BTreeMap;
use std::fmt;

use crate::cuts::CutBuilderStats;
use crate::master::MasterStatus;

pub(super) const NUM_STATUSES: usize = 5;

pub(super) const STATUSES: [MasterStatus; NUM_STATUSES] = [
    MasterStatus::Optimal,
    MasterStatus::Infeasible,
    MasterStatus::Unbounded,
    MasterStatus::IterationLimit,
    MasterStatus::NumericalError,
];

pub(super) fn status_index(status: MasterStatus) -> usize {
    match status {
        MasterStatus::Optimal => 0,
        MasterStatus::Infeasible => 1,
        MasterStatus::Unbounded => 2,
        MasterStatus::IterationLimit => 3,
        MasterStatus::NumericalError => 4,
    }
}

/// Snapshot of the relaxation counters.
#[derive(Debug, Clone, Default)]
pub struct LpStatistics {
    /// Columns of the LP.
    pub num_cols: usize,
    /// Rows currently loaded.
    pub num_rows: usize,
    /// Non-zeros of the loaded rows.
    pub num_entries: usize,
    /// Constraints in the pool, cuts included.
    pub num_pool_constraints: usize,
    /// Cuts in the pool.
    pub num_pool_cuts: usize,
    /// Simplex iterations over every solve, branching solves included.
    pub total_simplex_iterations: u64,
    /// Main solves.
    pub num_solves: u64,
    /// Main solves per status.
    pub solves_by_status: Vec<(MasterStatus, u64)>,
    /// Exact constraints propagated.
    pub num_cut_propagations: u64,
    /// Cut rounds run.
    pub num_cut_rounds: u64,
    /// Strong-branching calls on a fractional column.
    pub num_strong_branches: u64,
    /// Admitted cuts per generator.
    pub cuts_by_name: BTreeMap<String, usize>,
    /// Cut construction counters.
    pub builder: CutBuilderStats,
    /// Mean number of degenerate columns per optimal solve.
    pub average_degeneracy: f64,
}

impl fmt::Display for LpStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "LP: {} rows x {} cols ({} entries), pool {} constraints / {} cuts",
            self.num_rows, self.num_cols, self.num_entries, self.num_pool_constraints, self.num_pool_cuts
        )?;
        write!(f, "  solves: {} (", self.num_solves)?;
        let mut first = true;
        for (status, count) in self.solves_by_status.iter().filter(|(_, c)| *c > 0) {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{status:?}: {count}")?;
            first = false;
        }
        writeln!(f, "), {} simplex iterations", self.total_simplex_iterations)?;
        writeln!(
            f,
            "  cut rounds: {}, exact propagations: {}, strong branches: {}, degeneracy: {:.1}",
            self.num_cut_rounds, self.num_cut_propagations, self.num_strong_branches, self.average_degeneracy
        )?;
        write!(
            f,
            "  cut attempts: {}, overflows: {}, numerical rejects: {}",
            self.builder.num_attempts, self.builder.num_overflows, self.builder.num_numerical_rejects
        )?;
        for (name, count) in &self.cuts_by_name {
            write!(f, "\n  {name}: {count}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_index_matches_table() {
        for (i, &status) in STATUSES.iter().enumerate() {
            assert_eq!(status_index(status), i);
        }
    }

    #[test]
    fn test_display_lists_cuts() {
        let mut stats = LpStatistics {
            num_solves: 3,
            solves_by_status: vec![(MasterStatus::Optimal, 2), (MasterStatus::Infeasible, 1)],
            ..LpStatistics::default()
        };
        stats.cuts_by_name.insert("MIR".to_string(), 4);
        let text = stats.to_string();
        assert!(text.contains("Optimal: 2, Infeasible: 1"));
        assert!(text.contains("MIR: 4"));
    }
}
