//! Fixed-point math utilities for deterministic decision making.
//!
//! Combat power ratios are compared with fixed-point arithmetic so that two
//! AI runs with the same seed make the same choices on every platform.

use fixed::types::I32F32;

/// Fixed-point number type for all power and ratio math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Convert a percentage into a multiplier (`150` becomes `1.5`).
#[must_use]
pub fn percent(value: i32) -> Fixed {
    Fixed::from_num(value) / Fixed::from_num(100)
}

/// `numerator / (numerator + other)`, or zero when both are zero.
#[must_use]
pub fn share(numerator: Fixed, other: Fixed) -> Fixed {
    let total = numerator + other;
    if total <= Fixed::ZERO {
        Fixed::ZERO
    } else {
        numerator / total
    }
}

/// Multiply a fixed-point value by an integer factor and truncate.
#[must_use]
pub fn scaled(value: Fixed, factor: i32) -> i32 {
    (value * Fixed::from_num(factor)).to_num::<i32>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(percent(150), Fixed::from_num(1.5));
        assert_eq!(percent(0), Fixed::ZERO);
    }

    #[test]
    fn test_share() {
        assert_eq!(share(Fixed::from_num(1), Fixed::from_num(3)), Fixed::from_num(0.25));
        assert_eq!(share(Fixed::ZERO, Fixed::ZERO), Fixed::ZERO);
    }

    #[test]
    fn test_scaled_truncates() {
        assert_eq!(scaled(Fixed::from_num(2.5), 50), 125);
        assert_eq!(scaled(Fixed::from_num(-1.5), 100), -150);
    }
}
