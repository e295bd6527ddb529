use std::{cmp::Ordering, fmt};

use num_rational::BigRational;
use num_traits::Zero;

use crate::{
    error::{Result, StatsError},
    models::{Token, TokenAmount, TokenAmounts},
    utils::{shift_decimals, to_significant},
};

/// An exact exchange rate between two tokens.
///
/// `ratio` is quote-token base units per one base-token base unit. Nothing is
/// rounded until [`Price::to_significant`] is called.
#[derive(Debug, Clone, PartialEq)]
pub struct Price {
    pub base: Token,
    pub quote: Token,
    ratio: BigRational,
}

impl Price {
    pub fn new(base: Token, quote: Token, ratio: BigRational) -> Self {
        Self { base, quote, ratio }
    }

    /// Raw ratio in base units (quote units per base unit).
    pub fn ratio(&self) -> &BigRational {
        &self.ratio
    }

    /// The same rate seen from the other side of the pair.
    ///
    /// Inverting a zero price yields zero rather than dividing by zero.
    pub fn invert(&self) -> Price {
        let ratio = if self.ratio.is_zero() {
            BigRational::zero()
        } else {
            self.ratio.recip()
        };
        Price::new(self.quote.clone(), self.base.clone(), ratio)
    }

    /// Human price: quote tokens per one whole base token.
    pub fn adjusted(&self) -> BigRational {
        let decimal_diff = self.base.decimals as i32 - self.quote.decimals as i32;
        shift_decimals(&self.ratio, decimal_diff)
    }

    /// Convert an amount of the base token into the quote token.
    pub fn quote(&self, amount: &TokenAmount) -> Result<TokenAmount> {
        if amount.token != self.base {
            return Err(StatsError::InconsistentInput(format!(
                "cannot quote {} with a {}/{} price",
                amount.token.symbol, self.quote.symbol, self.base.symbol
            )));
        }
        Ok(TokenAmount::new(self.quote.clone(), amount.raw() * &self.ratio))
    }

    /// Total value of an amount pair expressed in quote-token base units.
    ///
    /// Every amount must be denominated in either the base or the quote token.
    pub fn quote_total(&self, amounts: &TokenAmounts) -> Result<BigRational> {
        let mut total = BigRational::zero();
        for amount in amounts.iter() {
            if amount.token == self.quote {
                total += amount.raw();
            } else {
                total += self.quote(amount)?.raw();
            }
        }
        Ok(total)
    }

    /// Weighted blend of two prices over the same pair.
    ///
    /// Both prices must share base and quote; weights need not be normalized.
    pub fn blend(&self, weight: &BigRational, other: &Price, other_weight: &BigRational) -> Result<Price> {
        if self.base != other.base || self.quote != other.quote {
            return Err(StatsError::InconsistentInput(format!(
                "cannot blend {}/{} with {}/{}",
                self.quote.symbol, self.base.symbol, other.quote.symbol, other.base.symbol
            )));
        }

        let total_weight = weight + other_weight;
        if total_weight.is_zero() {
            return Err(StatsError::InconsistentInput(
                "price blend weights sum to zero".to_string(),
            ));
        }

        let ratio = (&self.ratio * weight + &other.ratio * other_weight) / total_weight;
        Ok(Price::new(self.base.clone(), self.quote.clone(), ratio))
    }

    pub fn to_significant(&self, digits: u64) -> String {
        to_significant(&self.adjusted(), digits)
    }
}

/// Prices compare only within the same base/quote pair.
impl PartialOrd for Price {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        (self.base == other.base && self.quote == other.quote).then(|| self.ratio.cmp(&other.ratio))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}/{}",
            self.to_significant(6),
            self.quote.symbol,
            self.base.symbol
        )
    }
}
