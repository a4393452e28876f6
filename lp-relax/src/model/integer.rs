//! Integer variables, values and bound literals.

use std::fmt;

/// Integer value type. `MIN_INTEGER_VALUE`/`MAX_INTEGER_VALUE` stand for
/// minus/plus infinity.
pub type IntegerValue = i64;

/// Largest finite integer value; used as the +infinity sentinel.
pub const MAX_INTEGER_VALUE: IntegerValue = i64::MAX - 1;

/// Smallest finite integer value; used as the -infinity sentinel.
pub const MIN_INTEGER_VALUE: IntegerValue = -MAX_INTEGER_VALUE;

/// Convert an integer value to `f64`, mapping the sentinels to infinities.
pub fn to_double(value: IntegerValue) -> f64 {
    if value >= MAX_INTEGER_VALUE {
        f64::INFINITY
    } else if value <= MIN_INTEGER_VALUE {
        f64::NEG_INFINITY
    } else {
        value as f64
    }
}

/// An integer variable or its negation.
///
/// Even indices are positive variables, `index ^ 1` is the negation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntegerVariable(pub u32);

impl IntegerVariable {
    /// The `k`-th positive variable.
    pub fn positive_from_index(k: u32) -> Self {
        Self(2 * k)
    }

    /// The negated view of this variable.
    pub fn negation(self) -> Self {
        Self(self.0 ^ 1)
    }

    /// True for the non-negated view.
    pub fn is_positive(self) -> bool {
        self.0 & 1 == 0
    }

    /// The non-negated view.
    pub fn positive(self) -> Self {
        Self(self.0 & !1)
    }

    /// Index of the underlying positive variable.
    pub fn positive_index(self) -> usize {
        (self.0 / 2) as usize
    }

    /// Raw index, distinct for both views.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for IntegerVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_positive() {
            write!(f, "x{}", self.positive_index())
        } else {
            write!(f, "-x{}", self.positive_index())
        }
    }
}

/// The bound literal `var >= bound`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntegerLiteral {
    /// Variable (either view)
    pub var: IntegerVariable,
    /// Lower bound on `var`
    pub bound: IntegerValue,
}

impl IntegerLiteral {
    /// `var >= bound`.
    pub fn greater_or_equal(var: IntegerVariable, bound: IntegerValue) -> Self {
        Self { var, bound }
    }

    /// `var <= bound`, stored as `-var >= -bound`.
    pub fn lower_or_equal(var: IntegerVariable, bound: IntegerValue) -> Self {
        Self {
            var: var.negation(),
            bound: -bound,
        }
    }

    /// The complementary literal `var <= bound - 1`.
    pub fn negated(self) -> Self {
        Self::lower_or_equal(self.var, self.bound - 1)
    }
}

impl fmt::Debug for IntegerLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.var.is_positive() {
            write!(f, "[{:?} >= {}]", self.var, self.bound)
        } else {
            write!(f, "[{:?} <= {}]", self.var.negation(), -self.bound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negation_roundtrip() {
        let x = IntegerVariable::positive_from_index(3);
        assert!(x.is_positive());
        assert!(!x.negation().is_positive());
        assert_eq!(x.negation().negation(), x);
        assert_eq!(x.negation().positive(), x);
        assert_eq!(x.negation().positive_index(), 3);
    }

    #[test]
    fn test_literals() {
        let x = IntegerVariable::positive_from_index(0);
        let le = IntegerLiteral::lower_or_equal(x, 4);
        assert_eq!(le.var, x.negation());
        assert_eq!(le.bound, -4);
        assert_eq!(le.negated(), IntegerLiteral::greater_or_equal(x, 5));
        assert_eq!(format!("{le:?}"), "[x0 <= 4]");
    }

    #[test]
    fn test_to_double_sentinels() {
        assert_eq!(to_double(MAX_INTEGER_VALUE), f64::INFINITY);
        assert_eq!(to_double(MIN_INTEGER_VALUE), f64::NEG_INFINITY);
        assert_eq!(to_double(-12), -12.0);
    }
}
