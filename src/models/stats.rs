use std::fmt;

use alloy::primitives::U256;
use chrono::{DateTime, TimeDelta, Utc};
use num_bigint::BigInt;
use num_rational::BigRational;

use crate::{
    models::{Price, TokenAmounts},
    utils::to_significant,
};

/// Annualized return per token, as a fraction (0.12 = 12%).
///
/// A leg is `None` when nothing of that token was deposited or the holding
/// duration is unknown.
#[derive(Debug, Clone, PartialEq)]
pub struct Apr {
    pub token0: Option<BigRational>,
    pub token1: Option<BigRational>,
}

/// Full economic picture of one liquidity position.
///
/// Built once per query and never mutated. Prices use token0 as base and
/// token1 as quote.
#[derive(Debug, Clone)]
pub struct PositionStats {
    pub position_id: U256,
    pub lower_tick_price: Price,
    pub upper_tick_price: Price,
    pub current_price: Price,
    pub uncollected: TokenAmounts,
    pub current: TokenAmounts,
    pub deposited: TokenAmounts,
    pub avg_deposit_price: Option<Price>,
    pub withdrawn: TokenAmounts,
    pub avg_withdrawn_price: Option<Price>,
    pub collected: TokenAmounts,
    pub avg_collected_price: Option<Price>,
    pub date_opened: Option<DateTime<Utc>>,
    pub date_closed: Option<DateTime<Utc>>,
    pub duration_held: Option<TimeDelta>,
    pub total_yield: TokenAmounts,
    pub avg_yield_price: Price,
    pub yield_per_day: Option<TokenAmounts>,
    pub apr: Apr,
}

fn or_na<T: fmt::Display>(value: Option<&T>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| v.to_string())
}

fn format_percent(value: Option<&BigRational>) -> String {
    match value {
        Some(v) => {
            let percent = v * BigRational::from_integer(BigInt::from(100u8));
            format!("{}%", to_significant(&percent, 4))
        },
        None => "N/A".to_string(),
    }
}

fn format_duration(duration: &TimeDelta) -> String {
    let days = duration.num_days();
    let hours = duration.num_hours() - days * 24;
    format!("{days}d {hours}h")
}

impl fmt::Display for PositionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "positionId: {}", self.position_id)?;
        writeln!(f, "lowerTickPrice: {}", self.lower_tick_price)?;
        writeln!(f, "upperTickPrice: {}", self.upper_tick_price)?;
        writeln!(f, "currentPrice: {}", self.current_price)?;
        writeln!(f, "uncollected: {}", self.uncollected)?;
        writeln!(f, "current: {}", self.current)?;
        writeln!(f, "deposited: {}", self.deposited)?;
        writeln!(f, "avgDepositPrice: {}", or_na(self.avg_deposit_price.as_ref()))?;
        writeln!(f, "withdrawn: {}", self.withdrawn)?;
        writeln!(f, "avgWithdrawnPrice: {}", or_na(self.avg_withdrawn_price.as_ref()))?;
        writeln!(f, "collected: {}", self.collected)?;
        writeln!(f, "avgCollectedPrice: {}", or_na(self.avg_collected_price.as_ref()))?;
        writeln!(f, "dateOpened: {}", or_na(self.date_opened.as_ref()))?;
        writeln!(f, "dateClosed: {}", or_na(self.date_closed.as_ref()))?;
        writeln!(
            f,
            "durationHeld: {}",
            self.duration_held
                .as_ref()
                .map_or_else(|| "N/A".to_string(), format_duration)
        )?;
        writeln!(f, "totalYield: {}", self.total_yield)?;
        writeln!(f, "avgYieldPrice: {}", self.avg_yield_price)?;
        writeln!(f, "yieldPerDay: {}", or_na(self.yield_per_day.as_ref()))?;
        write!(
            f,
            "apr: {} {} / {} {}",
            format_percent(self.apr.token0.as_ref()),
            self.deposited.amount0.token.symbol,
            format_percent(self.apr.token1.as_ref()),
            self.deposited.amount1.token.symbol
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Token;
    use alloy::primitives::address;
    use num_traits::One;

    fn stats() -> PositionStats {
        let token0 = Token::new(
            1,
            address!("1000000000000000000000000000000000000001"),
            "AAA".to_string(),
            "Token A".to_string(),
            0,
        );
        let token1 = Token::new(
            1,
            address!("2000000000000000000000000000000000000002"),
            "BBB".to_string(),
            "Token B".to_string(),
            0,
        );
        let price = Price::new(token0.clone(), token1.clone(), BigRational::one());
        let zero = TokenAmounts::zero(&token0, &token1);

        PositionStats {
            position_id: U256::from(42),
            lower_tick_price: price.clone(),
            upper_tick_price: price.clone(),
            current_price: price.clone(),
            uncollected: zero.clone(),
            current: zero.clone(),
            deposited: zero.clone(),
            avg_deposit_price: None,
            withdrawn: zero.clone(),
            avg_withdrawn_price: None,
            collected: zero.clone(),
            avg_collected_price: None,
            date_opened: None,
            date_closed: None,
            duration_held: Some(TimeDelta::hours(50)),
            total_yield: zero,
            avg_yield_price: price,
            yield_per_day: None,
            apr: Apr {
                token0: Some(BigRational::new(BigInt::from(1), BigInt::from(8))),
                token1: None,
            },
        }
    }

    #[test]
    fn test_display_marks_absent_values() {
        let rendered = stats().to_string();

        assert!(rendered.contains("positionId: 42\n"));
        assert!(rendered.contains("avgDepositPrice: N/A\n"));
        assert!(rendered.contains("dateClosed: N/A\n"));
        assert!(rendered.contains("currentPrice: 1 BBB/AAA\n"));
        assert!(rendered.contains("durationHeld: 2d 2h\n"));
        assert!(rendered.ends_with("apr: 12.5% AAA / N/A BBB"));
    }

    #[test]
    fn test_zero_amounts_render_as_zero() {
        let rendered = stats().to_string();
        assert!(rendered.contains("deposited: 0 AAA 0 BBB\n"));
    }
}
