//! Search-facing state: per-level snapshots and LP-driven branching.

mod branching;
mod reversible;

pub use branching::{
    LpDecisionHeuristic, MostInfeasibleBinaryBranching, ReducedCostAverageBranching, ReducedCostAverages,
    ReducedCostBinaryBranching,
};
pub use reversible::LevelSnapshots;
