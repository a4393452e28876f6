//! Exact certificates derived from floating-point LP information.

pub mod multipliers;
pub mod sum_le;

pub use multipliers::{
    adjust_new_linear_constraint, compute_new_linear_constraint, scale_lp_multipliers, IntegerMultipliers,
};
pub use sum_le::{relax_linear_reason, IntegerSumLe};
