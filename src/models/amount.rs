use std::fmt;

use num_rational::BigRational;
use num_traits::Zero;

use crate::{
    models::Token,
    utils::{shift_decimals, to_significant},
};

/// An exact quantity of one token, in the token's base units.
///
/// Amounts derived from liquidity are fractional; they stay exact until display.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenAmount {
    pub token: Token,
    raw: BigRational,
}

impl TokenAmount {
    pub fn new(token: Token, raw: BigRational) -> Self {
        Self { token, raw }
    }

    pub fn zero(token: Token) -> Self {
        Self::new(token, BigRational::zero())
    }

    pub fn raw(&self) -> &BigRational {
        &self.raw
    }

    pub fn is_zero(&self) -> bool {
        self.raw.is_zero()
    }

    /// Amount in whole tokens (decimal-adjusted).
    pub fn adjusted(&self) -> BigRational {
        shift_decimals(&self.raw, -(self.token.decimals as i32))
    }

    pub fn to_significant(&self, digits: u64) -> String {
        to_significant(&self.adjusted(), digits)
    }

    pub(crate) fn map(&self, f: impl FnOnce(&BigRational) -> BigRational) -> Self {
        Self::new(self.token.clone(), f(&self.raw))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_significant(6), self.token.symbol)
    }
}

/// Amounts of both tokens of a pool, in pool order (token0, token1).
#[derive(Debug, Clone, PartialEq)]
pub struct TokenAmounts {
    pub amount0: TokenAmount,
    pub amount1: TokenAmount,
}

impl TokenAmounts {
    pub fn new(amount0: TokenAmount, amount1: TokenAmount) -> Self {
        Self { amount0, amount1 }
    }

    pub fn from_raw(token0: &Token, raw0: BigRational, token1: &Token, raw1: BigRational) -> Self {
        Self::new(
            TokenAmount::new(token0.clone(), raw0),
            TokenAmount::new(token1.clone(), raw1),
        )
    }

    pub fn zero(token0: &Token, token1: &Token) -> Self {
        Self::new(TokenAmount::zero(token0.clone()), TokenAmount::zero(token1.clone()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TokenAmount> {
        [&self.amount0, &self.amount1].into_iter()
    }

    pub fn is_zero(&self) -> bool {
        self.amount0.is_zero() && self.amount1.is_zero()
    }

    /// Apply `f` to each raw amount, keeping token tags.
    pub fn map(&self, f: impl Fn(&BigRational) -> BigRational) -> Self {
        Self::new(self.amount0.map(&f), self.amount1.map(&f))
    }

    /// Elementwise sum; both sides must be over the same token pair.
    pub fn checked_add(&self, other: &TokenAmounts) -> Option<Self> {
        if self.amount0.token != other.amount0.token || self.amount1.token != other.amount1.token {
            return None;
        }
        Some(Self::new(
            self.amount0.map(|raw| raw + other.amount0.raw()),
            self.amount1.map(|raw| raw + other.amount1.raw()),
        ))
    }
}

impl fmt::Display for TokenAmounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount0, self.amount1)
    }
}
