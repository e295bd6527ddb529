//! Math and conversion utilities for position analytics.
//!
//! This module is organized into focused submodules:
//!
//! - [`conversion`] - Type conversions (U256, BigUint, BigRational) and display rounding
//! - [`tick_math`] - Uniswap V3 tick to sqrtPriceX96 conversion
//! - [`price`] - Price conversion utilities (sqrtPriceX96, ticks)
//! - [`liquidity`] - Liquidity to token amount conversion and its inverse

mod conversion;
mod liquidity;
mod price;
mod tick_math;

// ============================================
// Re-exports
// ============================================

// Conversion utilities
pub use conversion::{
    biguint_to_rational, saturating_sub, shift_decimals, to_significant, u128_to_rational,
    u256_to_biguint, u256_to_rational,
};

// Liquidity amount utilities
pub use liquidity::{get_amounts_for_liquidity, TickRange};

// Price conversion utilities
pub use price::{sqrt_price_x96_to_price, sqrt_ratio_x96_to_price, tick_to_price, Q192, Q96};

// Tick math utilities
pub use tick_math::{
    sqrt_price_x96_to_tick, tick_to_sqrt_price_x96, MAX_SQRT_RATIO, MAX_TICK, MIN_SQRT_RATIO,
    MIN_TICK,
};
