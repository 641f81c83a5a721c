//! Shared integer helpers: flexible parsing of big integers, power-of-two
//! rounding for key widths, and the ceiling/floor divisions the interval
//! arithmetic leans on.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::One;
use thiserror::Error;

pub use anyhow::Result;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NumError {
    #[error("{0} must be an integer")]
    InvalidNumber(&'static str),
    #[error("value to round must be a positive integer")]
    NonPositive,
}

/// Parses a big integer from a string, trying base 10 first and falling back
/// to base 16 (with or without a `0x` prefix).
pub fn to_int(val: &str) -> Option<BigInt> {
    let trimmed = val.trim();
    if let Some(num) = BigInt::parse_bytes(trimmed.as_bytes(), 10) {
        return Some(num);
    }
    let hex = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    BigInt::parse_bytes(hex.as_bytes(), 16)
}

/// Like [`to_int`], but names the offending value in the error.
pub fn to_int_error(val: &str, what: &'static str) -> Result<BigInt, NumError> {
    to_int(val).ok_or(NumError::InvalidNumber(what))
}

/// Rounds up to the next power of two; a power of two rounds to itself.
pub fn pow2_round(val: i64) -> Result<u64, NumError> {
    if val <= 0 {
        return Err(NumError::NonPositive);
    }
    Ok((val as u64).next_power_of_two())
}

/// Number of bits needed to hold `val`, i.e. `ceil(log2(val))`.
/// `val` must be positive.
pub fn bits_to_hold(val: &BigInt) -> u64 {
    let bits = val.bits();
    if val.magnitude().count_ones() == 1 {
        bits - 1
    } else {
        bits
    }
}

/// [`bits_to_hold`] expressed in whole bytes.
pub fn bytes_to_hold(val: &BigInt) -> u64 {
    bits_to_hold(val) / 8
}

/// Smallest integer greater than or equal to `x / y`.
pub fn ceil_int(x: &BigInt, y: &BigInt) -> BigInt {
    x.div_ceil(y)
}

/// Largest integer less than or equal to `x / y`.
pub fn floor_int(x: &BigInt, y: &BigInt) -> BigInt {
    x.div_floor(y)
}

/// `2^exp` as a big integer.
pub fn pow2(exp: u64) -> BigInt {
    BigInt::one() << exp
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::Zero;

    #[test]
    fn to_int_decimal_first() {
        let target: BigInt = 1234.into();
        assert_eq!(to_int("1234"), Some(target));
        // "abcd" only parses as hex
        let target: BigInt = 0xabcd.into();
        assert_eq!(to_int("abcd"), Some(target.clone()));
        assert_eq!(to_int("0xabcd"), Some(target));
    }

    #[test]
    fn to_int_garbage() {
        assert_eq!(to_int("abcdgh"), None);
        assert_eq!(to_int(""), None);
        assert_eq!(
            to_int_error("1234abcdh", "Ciphertext"),
            Err(NumError::InvalidNumber("Ciphertext"))
        );
    }

    #[test]
    fn to_int_round_trips_through_display() {
        let big = to_int("6c1d38dbcb5c0ab72324618ce93f646c842aa702").unwrap();
        assert_eq!(to_int(&big.to_string()), Some(big));
    }

    #[test]
    fn pow2_round_values() {
        assert_eq!(pow2_round(255), Ok(256));
        assert_eq!(pow2_round(256), Ok(256));
        assert_eq!(pow2_round(34), Ok(64));
        assert_eq!(pow2_round(1), Ok(1));
    }

    #[test]
    fn pow2_round_rejects_non_positive() {
        assert_eq!(pow2_round(0), Err(NumError::NonPositive));
        assert_eq!(pow2_round(-1), Err(NumError::NonPositive));
    }

    #[test]
    fn pow2_round_idempotent() {
        for x in [3_i64, 100, 255, 1024, 4097] {
            let once = pow2_round(x).unwrap();
            assert_eq!(pow2_round(once as i64), Ok(once));
        }
    }

    #[test]
    fn bit_and_byte_widths() {
        assert_eq!(bits_to_hold(&1234.into()), 11);
        assert_eq!(bits_to_hold(&1024.into()), 10);
        assert_eq!(bits_to_hold(&BigInt::one()), 0);
        let max_256: BigInt = (BigInt::one() << 256u32) - 1;
        assert_eq!(bits_to_hold(&max_256), 256);
        assert_eq!(bytes_to_hold(&max_256), 32);
    }

    #[test]
    fn ceiling_division() {
        let c = |x: i64, y: i64| ceil_int(&x.into(), &y.into());
        assert_eq!(c(10, 5), 2.into());
        assert_eq!(c(99, 20), 5.into());
        assert_eq!(c(0, 7), BigInt::zero());
        // negative numerators round toward positive infinity
        assert_eq!(c(-5, 3), (-1).into());
    }

    #[test]
    fn floor_division() {
        let f = |x: i64, y: i64| floor_int(&x.into(), &y.into());
        assert_eq!(f(10, 5), 2.into());
        assert_eq!(f(99, 20), 4.into());
        assert_eq!(f(-5, 3), (-2).into());
    }

    #[test]
    fn division_bounds() {
        let x: BigInt = 12345.into();
        let y: BigInt = 67.into();
        assert!(ceil_int(&x, &y) * &y >= x);
        assert!(floor_int(&x, &y) * &y <= x);
    }
}
