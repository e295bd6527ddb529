//! Tick math for Uniswap V3 positions.
//!
//! Implements tick-to-sqrtPriceX96 conversion following Uniswap V3's
//! TickMath.sol bit-decomposition approach, over arbitrary-precision integers
//! so that the Q128.128 intermediates can never overflow.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use once_cell::sync::Lazy;

// ============================================
// Tick Bounds
// ============================================

/// Minimum tick supported by the exchange (`log_1.0001(2^-128)`).
pub const MIN_TICK: i32 = -887272;

/// Maximum tick supported by the exchange (`log_1.0001(2^128)`).
pub const MAX_TICK: i32 = 887272;

// ============================================
// Precomputed Constants
// ============================================

// Precomputed multipliers for tick_to_sqrt_price_x96, in Q128.128.
// These are 1/sqrt(1.0001)^(2^i) for i = 0..19, the exact table used by TickMath.sol.
const TICK_MULTIPLIERS: [u128; 20] = [
    0xfffcb933bd6fad37aa2d162d1a594001, // 1.0001^(-0.5)
    0xfff97272373d413259a46990580e213a, // 1.0001^(-1)
    0xfff2e50f5f656932ef12357cf3c7fdcc, // 1.0001^(-2)
    0xffe5caca7e10e4e61c3624eaa0941cd0, // 1.0001^(-4)
    0xffcb9843d60f6159c9db58835c926644, // 1.0001^(-8)
    0xff973b41fa98c081472e6896dfb254c0, // 1.0001^(-16)
    0xff2ea16466c96a3843ec78b326b52861, // 1.0001^(-32)
    0xfe5dee046a99a2a811c461f1969c3053, // 1.0001^(-64)
    0xfcbe86c7900a88aedcffc83b479aa3a4, // 1.0001^(-128)
    0xf987a7253ac413176f2b074cf7815e54, // 1.0001^(-256)
    0xf3392b0822b70005940c7a398e4b70f3, // 1.0001^(-512)
    0xe7159475a2c29b7443b29c7fa6e889d9, // 1.0001^(-1024)
    0xd097f3bdfd2022b8845ad8f792aa5825, // 1.0001^(-2048)
    0xa9f746462d870fdf8a65dc1f90e061e5, // 1.0001^(-4096)
    0x70d869a156d2a1b890bb3df62baf32f7, // 1.0001^(-8192)
    0x31be135f97d08fd981231505542fcfa6, // 1.0001^(-16384)
    0x9aa508b5b7a84e1c677de54f3e99bc9,  // 1.0001^(-32768)
    0x5d6af8dedb81196699c329225ee604,   // 1.0001^(-65536)
    0x2216e584f5fa1ea926041bedfe98,     // 1.0001^(-131072)
    0x48a170391f7dc42444e8fa2,          // 1.0001^(-262144)
];

static Q128: Lazy<BigUint> = Lazy::new(|| BigUint::one() << 128u32);

static MAX_UINT256: Lazy<BigUint> = Lazy::new(|| (BigUint::one() << 256u32) - 1u32);

/// sqrtPriceX96 at MIN_TICK.
pub static MIN_SQRT_RATIO: Lazy<BigUint> = Lazy::new(|| BigUint::from(4295128739u64));

/// sqrtPriceX96 at MAX_TICK.
pub static MAX_SQRT_RATIO: Lazy<BigUint> = Lazy::new(|| {
    BigUint::parse_bytes(b"1461446703485210103287273052203988822378723970342", 10)
        .unwrap_or_default()
});

// ============================================
// Tick to Price Conversion
// ============================================

/// Convert a tick to its sqrt price ratio (Q64.96 format).
///
/// Formula: sqrt(1.0001^tick) * 2^96, rounded up exactly as TickMath.sol does.
/// Ticks outside `[MIN_TICK, MAX_TICK]` are clamped to the valid range.
pub fn tick_to_sqrt_price_x96(tick: i32) -> BigUint {
    let clamped_tick = tick.clamp(MIN_TICK, MAX_TICK);
    let abs_tick = clamped_tick.unsigned_abs();

    let mut ratio = Q128.clone();
    for (bit, multiplier) in TICK_MULTIPLIERS.iter().enumerate() {
        if abs_tick & (1 << bit) != 0 {
            ratio = (ratio * BigUint::from(*multiplier)) >> 128u32;
        }
    }

    // The table holds negative powers, positive ticks take the reciprocal
    if clamped_tick > 0 {
        ratio = &*MAX_UINT256 / ratio;
    }

    // Q128.128 -> Q64.96, rounding up so the result is never below the true price
    let remainder = &ratio & BigUint::from(u32::MAX);
    let sqrt_price_x96 = ratio >> 32u32;
    if remainder.is_zero() {
        sqrt_price_x96
    } else {
        sqrt_price_x96 + 1u32
    }
}

/// Find the greatest tick whose sqrt price is at or below `sqrt_price_x96`.
///
/// Binary search over the exact tick table; prices outside the representable
/// range map to the nearest bound.
pub fn sqrt_price_x96_to_tick(sqrt_price_x96: &BigUint) -> i32 {
    let mut low = MIN_TICK;
    let mut high = MAX_TICK;

    while low < high {
        let mid = low + (high - low + 1) / 2;
        if tick_to_sqrt_price_x96(mid) <= *sqrt_price_x96 {
            low = mid;
        } else {
            high = mid - 1;
        }
    }

    low
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_zero_is_q96() {
        assert_eq!(tick_to_sqrt_price_x96(0), BigUint::one() << 96u32);
    }

    #[test]
    fn test_tick_bounds_match_exchange_constants() {
        assert_eq!(tick_to_sqrt_price_x96(MIN_TICK), *MIN_SQRT_RATIO);
        assert_eq!(tick_to_sqrt_price_x96(MAX_TICK), *MAX_SQRT_RATIO);
    }

    #[test]
    fn test_out_of_range_ticks_are_clamped() {
        assert_eq!(tick_to_sqrt_price_x96(MIN_TICK - 10), *MIN_SQRT_RATIO);
        assert_eq!(tick_to_sqrt_price_x96(MAX_TICK + 10), *MAX_SQRT_RATIO);
    }

    #[test]
    fn test_known_tick_values() {
        // Values from TickMath.sol test vectors
        assert_eq!(
            tick_to_sqrt_price_x96(50),
            BigUint::parse_bytes(b"79426470787362580746886972461", 10).unwrap()
        );
        assert_eq!(
            tick_to_sqrt_price_x96(-50),
            BigUint::parse_bytes(b"79030349367926598376800521322", 10).unwrap()
        );
    }

    #[test]
    fn test_strictly_increasing_in_tick() {
        let ticks = [
            MIN_TICK, -500_000, -100_000, -60, -1, 0, 1, 60, 100_000, 500_000, MAX_TICK,
        ];
        for pair in ticks.windows(2) {
            assert!(tick_to_sqrt_price_x96(pair[0]) < tick_to_sqrt_price_x96(pair[1]));
        }
    }

    #[test]
    fn test_sqrt_price_to_tick_inverts_tick_table() {
        for tick in [MIN_TICK, -887_000, -201_240, -1, 0, 1, 195_000, MAX_TICK - 1] {
            assert_eq!(sqrt_price_x96_to_tick(&tick_to_sqrt_price_x96(tick)), tick);
        }
        // Just below the next tick still maps to the lower tick
        let below_next = tick_to_sqrt_price_x96(101) - 1u32;
        assert_eq!(sqrt_price_x96_to_tick(&below_next), 100);
    }
}
