//! Type conversion and formatting utilities.
//!
//! Functions for moving between alloy's fixed-width integers and the
//! arbitrary-precision types used by the analytics math, plus display-time
//! rounding of exact rationals.

use alloy::primitives::U256;
use bigdecimal::BigDecimal;
use num_bigint::{BigInt, BigUint};
use num_rational::BigRational;
use num_traits::Zero;
use once_cell::sync::Lazy;

// ============================================
// U256 Conversions
// ============================================

/// Convert alloy U256 to an arbitrary-precision unsigned integer.
pub fn u256_to_biguint(value: U256) -> BigUint {
    // Via bytes (faster than string parsing)
    let bytes: [u8; 32] = value.to_le_bytes();
    BigUint::from_bytes_le(&bytes)
}

/// Convert alloy U256 to an exact rational with denominator 1.
pub fn u256_to_rational(value: U256) -> BigRational {
    biguint_to_rational(&u256_to_biguint(value))
}

/// Lift an unsigned integer into an exact rational.
pub fn biguint_to_rational(value: &BigUint) -> BigRational {
    BigRational::from_integer(BigInt::from(value.clone()))
}

/// Lift a u128 (liquidity, owed tokens) into an exact rational.
pub fn u128_to_rational(value: u128) -> BigRational {
    BigRational::from_integer(BigInt::from(value))
}

/// Subtract `rhs` from `lhs`, saturating at zero.
///
/// Returns the difference and whether saturation happened.
pub fn saturating_sub(lhs: &BigRational, rhs: &BigRational) -> (BigRational, bool) {
    if lhs >= rhs {
        (lhs - rhs, false)
    } else {
        (BigRational::zero(), true)
    }
}

// ============================================
// Display Rounding
// ============================================

/// Scale a raw base-unit quantity by `10^exp` (positive) or `10^-exp` (negative).
pub fn shift_decimals(value: &BigRational, exp: i32) -> BigRational {
    let factor = BigRational::from_integer(BigInt::from(big_pow10(exp.unsigned_abs())));
    if exp >= 0 {
        value * factor
    } else {
        value / factor
    }
}

/// Round an exact rational to `digits` significant digits for display.
///
/// This is the only place where precision is discarded.
pub fn to_significant(value: &BigRational, digits: u64) -> String {
    if value.is_zero() {
        return "0".to_string();
    }

    let numerator = BigDecimal::from(value.numer().clone());
    let denominator = BigDecimal::from(value.denom().clone());
    let decimal = (numerator / denominator).with_prec(digits.max(1)).normalized();

    // Trailing integer zeros are kept as digits rather than an exponent
    if decimal.as_bigint_and_exponent().1 < 0 {
        decimal.with_scale(0).to_string()
    } else {
        decimal.to_string()
    }
}

// ============================================
// Internal Helpers
// ============================================

static POW10_CACHE: Lazy<[BigUint; 25]> =
    Lazy::new(|| std::array::from_fn(|i| BigUint::from(10u32).pow(i as u32)));

/// Compute 10^exp as an exact integer.
pub(crate) fn big_pow10(exp: u32) -> BigUint {
    if (exp as usize) < POW10_CACHE.len() {
        POW10_CACHE[exp as usize].clone()
    } else {
        BigUint::from(10u32).pow(exp)
    }
}
