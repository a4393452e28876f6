//! Cutting planes.
//!
//! Separators produce integer combinations of the loaded rows. The
//! [`CutBuilder`] turns each combination into a [`CutData`], runs the
//! strengtheners on it (flow cover, integer rounding with and without
//! implied-bound substitution, knapsack covers) and offers the results to
//! the [`ConstraintPool`].

pub mod builder;
pub mod cover;
pub mod cut_data;
pub mod flow_cover;
pub mod gomory;
pub mod implied_bounds;
pub mod mir;
pub mod objective;
pub mod pool;
pub mod rounding;
pub mod separators;
pub mod zero_half;

pub use builder::{CutBuilder, CutBuilderStats, SolutionView};
pub use cut_data::{CutData, CutTerm, ExprVar};
pub use implied_bounds::{ImpliedBoundEntry, ImpliedBounds};
pub use pool::{expanded_value, ConstraintPool, ConstraintPoolStats, ManagedConstraint};
pub use separators::{builtin_separators, CutGenerator, CutSeparator, ObjectiveInfo, SeparationContext};
