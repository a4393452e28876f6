//! Exact integer arithmetic used by cut derivation and reasoning.

pub mod accumulator;
pub mod arith;
pub mod overflow;

pub use accumulator::ScatteredIntegerVector;
pub use overflow::{implied_lower_bound, possible_overflow, prevent_overflow, remove_fixed_terms, OVERFLOW_THRESHOLD};
