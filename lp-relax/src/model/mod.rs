//! Integer model types shared by every part of the relaxation.

pub mod constraint;
pub mod integer;
pub mod trail;

pub use constraint::LinearConstraint;
pub use integer::{
    to_double, IntegerLiteral, IntegerValue, IntegerVariable, MAX_INTEGER_VALUE, MIN_INTEGER_VALUE,
};
pub use trail::{BoundOracle, BoundsTrail, IntegerTrail, WatchRegistry};
