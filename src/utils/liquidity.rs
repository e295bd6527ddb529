//! Liquidity amount calculations for concentrated-liquidity positions.
//!
//! Uses the clamped-price formulation: the current sqrt price is clamped into
//! the position's range, which covers the in-range and both out-of-range cases
//! with one pair of formulas. All quantities are exact rationals.

use num_bigint::{BigInt, BigUint};
use num_rational::BigRational;
use num_traits::{One, Zero};

use super::{
    conversion::{biguint_to_rational, u128_to_rational},
    price::Q96,
    tick_math::tick_to_sqrt_price_x96,
};
use crate::models::{Token, TokenAmounts};

/// Sqrt price bounds (Q64.96) of a position's tick range, with `lower <= upper`.
#[derive(Debug, Clone, PartialEq)]
pub struct TickRange {
    sqrt_lower: BigRational,
    sqrt_upper: BigRational,
    q96: BigRational,
}

impl TickRange {
    /// Build the range from its ticks; reversed ticks are swapped.
    pub fn new(tick_lower: i32, tick_upper: i32) -> Self {
        let (low, high) = if tick_lower <= tick_upper {
            (tick_lower, tick_upper)
        } else {
            (tick_upper, tick_lower)
        };

        Self {
            sqrt_lower: biguint_to_rational(&tick_to_sqrt_price_x96(low)),
            sqrt_upper: biguint_to_rational(&tick_to_sqrt_price_x96(high)),
            q96: BigRational::from_integer(BigInt::from(Q96.clone())),
        }
    }

    pub fn sqrt_lower(&self) -> &BigRational {
        &self.sqrt_lower
    }

    pub fn sqrt_upper(&self) -> &BigRational {
        &self.sqrt_upper
    }

    /// Clamp a sqrt price into `[sqrt_lower, sqrt_upper]`.
    pub fn clamp(&self, sqrt_price_x96: &BigRational) -> BigRational {
        if sqrt_price_x96 < &self.sqrt_lower {
            self.sqrt_lower.clone()
        } else if sqrt_price_x96 > &self.sqrt_upper {
            self.sqrt_upper.clone()
        } else {
            sqrt_price_x96.clone()
        }
    }

    /// Token amounts represented by `liquidity` at the given sqrt price.
    ///
    /// - amount0 = L * (sqrtUpper - sqrtP) / (sqrtP * sqrtUpper)
    /// - amount1 = L * (sqrtP - sqrtLower)
    ///
    /// with sqrtP clamped into the range and Q96 scaling applied.
    pub fn amounts_for_liquidity(
        &self,
        liquidity: &BigRational,
        sqrt_price_x96: &BigRational,
    ) -> (BigRational, BigRational) {
        let current = self.clamp(sqrt_price_x96);

        let amount0 = liquidity * (&self.sqrt_upper - &current) * &self.q96
            / (&current * &self.sqrt_upper);
        let amount1 = liquidity * (&current - &self.sqrt_lower) / &self.q96;

        (amount0, amount1)
    }

    /// Liquidity equivalent of a pair of token amounts at the given sqrt price.
    ///
    /// Both amounts are valued in token1 at the sqrt price and divided by the
    /// value of one unit of liquidity there. For a pair produced by
    /// [`TickRange::amounts_for_liquidity`] this is its exact inverse; any other
    /// non-zero pair, one-sided ones included, maps to positive liquidity.
    pub fn liquidity_for_amounts(
        &self,
        sqrt_price_x96: &BigRational,
        amount0: &BigRational,
        amount1: &BigRational,
    ) -> BigRational {
        let price = sqrt_price_x96 * sqrt_price_x96 / (&self.q96 * &self.q96);
        let (unit0, unit1) = self.amounts_for_liquidity(&BigRational::one(), sqrt_price_x96);
        let unit_value = unit0 * &price + unit1;

        // Degenerate range (lower == upper) holds no liquidity
        if unit_value.is_zero() {
            return BigRational::zero();
        }
        (amount0 * &price + amount1) / unit_value
    }
}

/// Current holdings of a position: amounts for `liquidity` at `sqrt_price_x96`
/// within `[tick_lower, tick_upper]`, tagged with the pool's tokens.
pub fn get_amounts_for_liquidity(
    liquidity: u128,
    sqrt_price_x96: &BigUint,
    tick_lower: i32,
    tick_upper: i32,
    token0: &Token,
    token1: &Token,
) -> TokenAmounts {
    let range = TickRange::new(tick_lower, tick_upper);
    let (amount0, amount1) = range.amounts_for_liquidity(
        &u128_to_rational(liquidity),
        &biguint_to_rational(sqrt_price_x96),
    );
    TokenAmounts::from_raw(token0, amount0, token1, amount1)
}
