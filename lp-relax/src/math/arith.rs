//! Checked and rounded integer arithmetic.

use crate::model::IntegerValue;

/// `a * b + *target`, failing if any step leaves the open 64-bit range.
///
/// Results equal to `i64::MIN` or `i64::MAX` count as overflow, so a value
/// that reached a saturation point is never mistaken for an exact one.
pub fn add_product_to(a: IntegerValue, b: IntegerValue, target: &mut IntegerValue) -> bool {
    let Some(prod) = a.checked_mul(b) else {
        return false;
    };
    if prod == i64::MIN || prod == i64::MAX {
        return false;
    }
    let Some(sum) = prod.checked_add(*target) else {
        return false;
    };
    if sum == i64::MIN || sum == i64::MAX {
        return false;
    }
    *target = sum;
    true
}

/// Greatest common divisor of the magnitudes; `gcd(0, 0) = 0`.
pub fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.min(i64::MAX as u64) as i64
}

/// `floor(a / b)` for `b > 0`.
pub fn floor_ratio(a: i64, b: i64) -> i64 {
    debug_assert!(b > 0);
    a.div_euclid(b)
}

/// `ceil(a / b)` for `b > 0`.
pub fn ceil_ratio(a: i64, b: i64) -> i64 {
    debug_assert!(b > 0);
    let q = a.div_euclid(b);
    if a.rem_euclid(b) == 0 {
        q
    } else {
        q + 1
    }
}

/// `floor(a / b)` in 128-bit arithmetic, `b > 0`.
pub fn floor_ratio_128(a: i128, b: i128) -> i128 {
    debug_assert!(b > 0);
    a.div_euclid(b)
}

/// `ceil(a / b)` in 128-bit arithmetic, `b > 0`.
pub fn ceil_ratio_128(a: i128, b: i128) -> i128 {
    debug_assert!(b > 0);
    let q = a.div_euclid(b);
    if a.rem_euclid(b) == 0 {
        q
    } else {
        q + 1
    }
}

/// Narrow a 128-bit value, treating the 64-bit extremes as overflow.
pub fn to_i64(value: i128) -> Option<i64> {
    if value <= i64::MIN as i128 || value >= i64::MAX as i128 {
        None
    } else {
        Some(value as i64)
    }
}
