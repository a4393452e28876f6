//! LP relaxation engine for an integer search.
//!
//! The crate keeps the linear constraints of an integer model in a pool,
//! loads the useful ones into a scaled LP and runs it as a propagator:
//!
//! - **Exact reasoning**: duals and Farkas rays are turned into integer
//!   combinations of the rows, so bound deductions and conflict
//!   explanations stay valid whatever the floating-point error
//! - **Cutting planes**: Chvatal-Gomory, MIR, zero-half, knapsack covers
//!   (plain and lifted), flow covers and the objective cut, all derived in
//!   exact integer arithmetic and protected against 64-bit overflow
//! - **Search support**: per-level warm starts, reduced-cost branching
//!   heuristics and strong branching at the root
//!
//! The LP itself is solved by a [`MasterBackend`]; [`SimplexBackend`] wraps
//! the bounded revised simplex of `simplex-core`. The integer side is seen
//! through the [`IntegerTrail`] trait; [`BoundsTrail`] is a small reference
//! implementation.
//!
//! # Example
//!
//! ```
//! use lp_relax::{BoundsTrail, IntegerTrail, LinearConstraint, LinearProgrammingConstraint, LpSettings,
//!                SimplexBackend, TimeLimit};
//!
//! let mut trail = BoundsTrail::new();
//! let x = trail.new_variable(0, 1);
//! let y = trail.new_variable(0, 1);
//! let z = trail.new_variable(0, 1);
//! let objective = trail.new_variable(-100, 100);
//!
//! let mut lp = LinearProgrammingConstraint::new(
//!     LpSettings::default().with_cut_rounds(5),
//!     vec![x, y, z],
//!     Box::new(SimplexBackend::default()),
//!     TimeLimit::unlimited(),
//! )?;
//! lp.add_linear_constraint(LinearConstraint::less_or_equal(&[(x, 5), (y, 4), (z, 3)], 8))?;
//! for var in [x, y, z] {
//!     lp.set_objective_coefficient(var, -1)?;
//! }
//! lp.set_main_objective_variable(objective);
//! lp.register_with(&mut trail)?;
//!
//! assert!(lp.propagate(&mut trail));
//! assert_eq!(trail.lower_bound(objective), -2);
//! println!("{}", lp.statistics());
//! # Ok::<(), lp_relax::RelaxError>(())
//! ```

#![warn(missing_docs)]

pub mod certificate;
pub mod cuts;
pub mod error;
pub mod master;
pub mod math;
pub mod model;
pub mod relaxation;
pub mod search;
pub mod settings;
pub mod time_limit;

pub use cuts::{ConstraintPool, CutGenerator, CutSeparator, ImpliedBoundEntry};
pub use error::{RelaxError, RelaxResult};
pub use master::{LpScaler, MasterBackend, MasterStatus, SimplexBackend, SolveLimits};
pub use model::{
    BoundOracle, BoundsTrail, IntegerLiteral, IntegerTrail, IntegerValue, IntegerVariable, LinearConstraint,
    WatchRegistry, MAX_INTEGER_VALUE, MIN_INTEGER_VALUE,
};
pub use relaxation::{
    BranchingReport, IntegerLp, LinearProgrammingConstraint, LpStatistics, BranchOutcome, CP_EPSILON,
};
pub use search::{
    LpDecisionHeuristic, MostInfeasibleBinaryBranching, ReducedCostAverageBranching, ReducedCostBinaryBranching,
};
pub use settings::{ConstraintPoolSettings, LpSettings};
pub use time_limit::TimeLimit;
