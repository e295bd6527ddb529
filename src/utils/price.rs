//! Price conversion utilities for Uniswap V3.
//!
//! Functions for converting sqrtPriceX96 values and ticks to exact prices.
//! Squaring is done over arbitrary-precision integers and the result kept as
//! an exact rational; rounding only happens when a price is displayed.

use num_bigint::{BigInt, BigUint};
use num_rational::BigRational;
use num_traits::{One, Zero};
use once_cell::sync::Lazy;

use super::{conversion::biguint_to_rational, tick_math::tick_to_sqrt_price_x96};
use crate::models::{Price, Token};

// ============================================
// Constants
// ============================================

/// 2^96 (Q64.96 fixed point scaling factor)
pub static Q96: Lazy<BigUint> = Lazy::new(|| BigUint::one() << 96u32);

/// 2^192, the scale of a squared sqrtPriceX96
pub static Q192: Lazy<BigUint> = Lazy::new(|| BigUint::one() << 192u32);

// ============================================
// sqrtPriceX96 to Price Conversion
// ============================================

/// Convert a sqrtPriceX96 to an exact price with `base` as the base token.
///
/// `ratioX192 = sqrtPriceX96^2` is token1 per token0 scaled by 2^192; the
/// ratio is inverted when `base` is token1 in canonical order.
pub fn sqrt_price_x96_to_price(sqrt_price_x96: &BigUint, base: &Token, quote: &Token) -> Price {
    sqrt_ratio_x96_to_price(&biguint_to_rational(sqrt_price_x96), base, quote)
}

/// Same as [`sqrt_price_x96_to_price`] for a fractional sqrtPriceX96, such as a
/// liquidity-weighted average.
pub fn sqrt_ratio_x96_to_price(sqrt_price_x96: &BigRational, base: &Token, quote: &Token) -> Price {
    let ratio_x192 = sqrt_price_x96 * sqrt_price_x96;
    let q192 = BigRational::from_integer(BigInt::from(Q192.clone()));

    let token1_per_token0 = ratio_x192 / q192;
    let ratio = if base.sorts_before(quote) || token1_per_token0.is_zero() {
        token1_per_token0
    } else {
        token1_per_token0.recip()
    };

    Price::new(base.clone(), quote.clone(), ratio)
}

// ============================================
// Tick to Price Conversion
// ============================================

/// Price at a tick boundary, `1.0001^tick` in canonical orientation.
///
/// Strictly increasing in `tick` when `base` sorts before `quote`.
pub fn tick_to_price(base: &Token, quote: &Token, tick: i32) -> Price {
    sqrt_price_x96_to_price(&tick_to_sqrt_price_x96(tick), base, quote)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::tick_math::{MAX_TICK, MIN_TICK};
    use alloy::primitives::address;

    fn token0() -> Token {
        Token::new(
            1,
            address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
            "USDC".to_string(),
            "USD Coin".to_string(),
            6,
        )
    }

    fn token1() -> Token {
        Token::new(
            1,
            address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"),
            "WETH".to_string(),
            "Wrapped Ether".to_string(),
            18,
        )
    }

    #[test]
    fn test_sqrt_price_round_trip_is_exact() {
        let samples = [
            BigUint::from(1u8),
            BigUint::from(4295128739u64),
            Q96.clone(),
            BigUint::parse_bytes(b"1461446703485210103287273052203988822378723970342", 10).unwrap(),
            BigUint::parse_bytes(b"1350174849792634181862360983626536", 10).unwrap(),
        ];

        for sqrt_price in samples {
            let price = sqrt_price_x96_to_price(&sqrt_price, &token0(), &token1());
            let expected = BigRational::new(
                BigInt::from(&sqrt_price * &sqrt_price),
                BigInt::from(Q192.clone()),
            );
            assert_eq!(price.ratio(), &expected);
        }
    }

    #[test]
    fn test_price_orientation_follows_base_token() {
        let sqrt_price = BigUint::from(3u8) * Q96.clone();
        let forward = sqrt_price_x96_to_price(&sqrt_price, &token0(), &token1());
        let backward = sqrt_price_x96_to_price(&sqrt_price, &token1(), &token0());

        assert_eq!(forward.ratio(), &BigRational::from_integer(BigInt::from(9u8)));
        assert_eq!(backward.ratio(), &BigRational::new(BigInt::from(1u8), BigInt::from(9u8)));
        assert_eq!(backward.base, token1());
        assert_eq!(forward.invert(), backward);
    }

    #[test]
    fn test_tick_to_price_strictly_increasing() {
        let ticks = [MIN_TICK, -200_000, -1, 0, 1, 200_000, MAX_TICK];
        for pair in ticks.windows(2) {
            let lower = tick_to_price(&token0(), &token1(), pair[0]);
            let upper = tick_to_price(&token0(), &token1(), pair[1]);
            assert!(lower.ratio() < upper.ratio());
        }
    }

    #[test]
    fn test_tick_zero_is_unit_price() {
        let price = tick_to_price(&token0(), &token1(), 0);
        assert_eq!(price.ratio(), &BigRational::one());
    }

    #[test]
    fn test_adjusted_price_applies_decimals() {
        // 10^6 raw WETH per raw USDC is 10^-6 WETH per USDC
        let sqrt_price = BigUint::from(1000u32) * Q96.clone();
        let price = sqrt_price_x96_to_price(&sqrt_price, &token0(), &token1());
        let expected = BigRational::new(BigInt::from(1u8), BigInt::from(1_000_000_000_000u64))
            * BigRational::from_integer(BigInt::from(1_000_000u32));
        assert_eq!(price.adjusted(), expected);
        assert!(price.to_string().ends_with(" WETH/USDC"));
    }
}
