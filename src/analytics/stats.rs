//! Position analytics orchestration.
//!
//! Reads the position and its pool, retrieves and folds the event history,
//! then derives yield, holding duration and APR.

use alloy::primitives::{Address, U256};
use chrono::{DateTime, TimeDelta, Utc};
use futures::{stream, try_join, StreamExt, TryStreamExt};
use log::{debug, info};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, Zero};

use super::{
    active_blocks::DEFAULT_CONCURRENCY,
    aggregator::{self, BlockPrices},
    events::fetch_history,
};
use crate::{
    error::{Result, StatsError},
    models::{Apr, PositionStats, Price, TokenAmounts},
    sources::ChainReader,
    utils::{
        get_amounts_for_liquidity, sqrt_price_x96_to_price, tick_to_price, u256_to_biguint,
        u256_to_rational, TickRange,
    },
};

const MILLIS_PER_DAY: i64 = 86_400_000;
const DAYS_PER_YEAR: u32 = 365;

/// Tuning for one analytics query.
#[derive(Debug, Clone)]
pub struct AnalyticsOptions {
    /// First block searched for position events.
    pub from_block: u64,
    /// Bound on concurrent lookups (prices, per-block scans, nonce probes).
    pub max_concurrent_requests: usize,
}

impl Default for AnalyticsOptions {
    fn default() -> Self {
        Self {
            from_block: 0,
            max_concurrent_requests: DEFAULT_CONCURRENCY,
        }
    }
}

/// Computes [`PositionStats`] from any [`ChainReader`].
pub struct PositionAnalytics<R> {
    reader: R,
    options: AnalyticsOptions,
}

impl<R: ChainReader> PositionAnalytics<R> {
    pub fn new(reader: R, options: AnalyticsOptions) -> Self {
        Self { reader, options }
    }

    /// Statistics for `position_id` as of now.
    pub async fn position_stats(&self, position_id: U256) -> Result<PositionStats> {
        self.position_stats_at(position_id, Utc::now()).await
    }

    /// Statistics for `position_id`, measuring open positions up to `now`.
    pub async fn position_stats_at(
        &self,
        position_id: U256,
        now: DateTime<Utc>,
    ) -> Result<PositionStats> {
        info!("Computing stats for position {position_id}");

        let position = self.reader.position(position_id).await?;
        if position.tick_lower > position.tick_upper {
            return Err(StatsError::InconsistentInput(format!(
                "position {position_id} has tick_lower {} above tick_upper {}",
                position.tick_lower, position.tick_upper
            )));
        }

        let (token0, token1, pool) = try_join!(
            self.reader.token(position.token0),
            self.reader.token(position.token1),
            self.reader
                .pool_address(position.token0, position.token1, position.fee),
        )?;
        if pool == Address::ZERO {
            return Err(StatsError::InconsistentInput(format!(
                "no pool for {}/{} at fee {}",
                token0.symbol, token1.symbol, position.fee
            )));
        }

        let (head, current_sqrt_price) =
            try_join!(self.reader.latest_block(), self.reader.sqrt_price_x96(pool, None))?;
        let current_sqrt_price = u256_to_biguint(current_sqrt_price);
        debug!("Pool {pool} at head {head}: sqrtPriceX96 {current_sqrt_price}");

        let lower_tick_price = tick_to_price(&token0, &token1, position.tick_lower);
        let upper_tick_price = tick_to_price(&token0, &token1, position.tick_upper);
        let current_price = sqrt_price_x96_to_price(&current_sqrt_price, &token0, &token1);
        let current = get_amounts_for_liquidity(
            position.liquidity,
            &current_sqrt_price,
            position.tick_lower,
            position.tick_upper,
            &token0,
            &token1,
        );
        let uncollected = TokenAmounts::from_raw(
            &token0,
            u256_to_rational(position.uncollected0),
            &token1,
            u256_to_rational(position.uncollected1),
        );

        let history = fetch_history(
            &self.reader,
            position_id,
            self.options.from_block,
            head,
            self.options.max_concurrent_requests,
        )
        .await?;
        let prices = self.block_prices(pool, &history.blocks()).await?;

        let range = TickRange::new(position.tick_lower, position.tick_upper);
        let deposits = aggregator::deposited(&history.increases, &prices)?;
        let withdrawals = aggregator::withdrawn(&history.decreases, &prices)?;
        let fees = aggregator::collected(&history.collects, &history.decreases, &prices, &range)?;

        let (date_opened, date_closed) = try_join!(
            self.timestamp(deposits.first_block),
            self.timestamp(withdrawals.last_block),
        )?;
        let duration_held = date_opened.map(|opened| date_closed.unwrap_or(now) - opened);

        let deposited = deposits.amounts(&token0, &token1);
        let withdrawn = withdrawals.amounts(&token0, &token1);
        let collected = fees.amounts(&token0, &token1);
        let avg_collected_price = fees.avg_price(&token0, &token1);

        let total_yield = collected.checked_add(&uncollected).ok_or_else(|| {
            StatsError::InconsistentInput("collected and uncollected token pairs differ".to_string())
        })?;
        let avg_yield_price = avg_yield_price(
            &collected,
            avg_collected_price.as_ref(),
            &uncollected,
            &current_price,
        )?;
        let yield_per_day = duration_held
            .as_ref()
            .and_then(|duration| per_day(&total_yield, duration));
        let apr = annualize(yield_per_day.as_ref(), &deposited);

        info!("Position {position_id}: deposited {deposited}, total yield {total_yield}");

        Ok(PositionStats {
            position_id,
            lower_tick_price,
            upper_tick_price,
            current_price,
            uncollected,
            current,
            deposited,
            avg_deposit_price: deposits.avg_price(&token0, &token1),
            withdrawn,
            avg_withdrawn_price: withdrawals.avg_price(&token0, &token1),
            collected,
            avg_collected_price,
            date_opened,
            date_closed,
            duration_held,
            total_yield,
            avg_yield_price,
            yield_per_day,
            apr,
        })
    }

    /// Pool sqrt price at every given block, fetched concurrently.
    async fn block_prices(&self, pool: Address, blocks: &[u64]) -> Result<BlockPrices> {
        let prices: Vec<(u64, U256)> = stream::iter(blocks.iter().copied())
            .map(|block| async move {
                let sqrt_price = self.reader.sqrt_price_x96(pool, Some(block)).await?;
                Ok::<_, StatsError>((block, sqrt_price))
            })
            .buffered(self.options.max_concurrent_requests.max(1))
            .try_collect()
            .await?;

        Ok(prices
            .into_iter()
            .map(|(block, sqrt_price)| (block, u256_to_biguint(sqrt_price)))
            .collect())
    }

    async fn timestamp(&self, block: Option<u64>) -> Result<Option<DateTime<Utc>>> {
        match block {
            Some(block) => Ok(Some(self.reader.block_timestamp(block).await?)),
            None => Ok(None),
        }
    }
}

/// Quote-value-weighted blend of the collected and uncollected fee prices.
///
/// Collected fees are priced at their average collection price and uncollected
/// fees at the current price. Falls back to the current price when nothing was
/// collected or the fees carry no value.
fn avg_yield_price(
    collected: &TokenAmounts,
    avg_collected_price: Option<&Price>,
    uncollected: &TokenAmounts,
    current_price: &Price,
) -> Result<Price> {
    let Some(collected_price) = avg_collected_price else {
        return Ok(current_price.clone());
    };

    let collected_value = collected_price.quote_total(collected)?;
    let uncollected_value = current_price.quote_total(uncollected)?;
    if (&collected_value + &uncollected_value).is_zero() {
        return Ok(current_price.clone());
    }

    collected_price.blend(&collected_value, current_price, &uncollected_value)
}

/// Scale `amounts` earned over `duration` to one day; absent for non-positive durations.
fn per_day(amounts: &TokenAmounts, duration: &TimeDelta) -> Option<TokenAmounts> {
    let millis = duration.num_milliseconds();
    if millis <= 0 {
        return None;
    }
    let factor = BigRational::new(BigInt::from(MILLIS_PER_DAY), BigInt::from(millis));
    Some(amounts.map(|raw| raw * &factor))
}

fn annualize(yield_per_day: Option<&TokenAmounts>, deposited: &TokenAmounts) -> Apr {
    let days = BigRational::from_integer(BigInt::from(DAYS_PER_YEAR));
    let leg = |daily: &BigRational, deposited: &BigRational| {
        (deposited.is_positive()).then(|| daily / deposited * &days)
    };

    match yield_per_day {
        Some(daily) => Apr {
            token0: leg(daily.amount0.raw(), deposited.amount0.raw()),
            token1: leg(daily.amount1.raw(), deposited.amount1.raw()),
        },
        None => Apr {
            token0: None,
            token1: None,
        },
    }
}
