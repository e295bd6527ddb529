//! Event history aggregation.
//!
//! Folds position manager events into liquidity-weighted totals. Deposits and
//! withdrawals fold their events directly; fees replay collects against the
//! principal that decreases left owed, weighting only the fee remainder.

use log::{debug, warn};
use num_bigint::BigUint;
use num_rational::BigRational;
use num_traits::Zero;
use rustc_hash::FxHashMap;

use crate::{
    error::{Result, StatsError},
    models::{EventKind, Price, PositionEvent, Token, TokenAmounts},
    utils::{
        biguint_to_rational, saturating_sub, sqrt_ratio_x96_to_price, u128_to_rational,
        u256_to_rational, TickRange,
    },
};

/// Pool sqrtPriceX96 keyed by block number.
pub type BlockPrices = FxHashMap<u64, BigUint>;

/// Accumulated amounts and liquidity-weighted sqrt price over a set of events.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedAggregate {
    pub amount0: BigRational,
    pub amount1: BigRational,
    pub total_liquidity: BigRational,
    /// Sum of `sqrtPriceX96 * liquidity` over the folded events.
    pub weighted_sqrt_price_x96: BigRational,
    pub first_block: Option<u64>,
    pub last_block: Option<u64>,
    pub event_count: usize,
}

impl Default for WeightedAggregate {
    fn default() -> Self {
        Self {
            amount0: BigRational::zero(),
            amount1: BigRational::zero(),
            total_liquidity: BigRational::zero(),
            weighted_sqrt_price_x96: BigRational::zero(),
            first_block: None,
            last_block: None,
            event_count: 0,
        }
    }
}

impl WeightedAggregate {
    pub fn accumulate(
        &mut self,
        block: u64,
        amount0: &BigRational,
        amount1: &BigRational,
        liquidity: &BigRational,
        sqrt_price_x96: &BigRational,
    ) {
        self.amount0 += amount0;
        self.amount1 += amount1;
        self.total_liquidity += liquidity;
        self.weighted_sqrt_price_x96 += sqrt_price_x96 * liquidity;
        self.first_block = Some(self.first_block.map_or(block, |first| first.min(block)));
        self.last_block = Some(self.last_block.map_or(block, |last| last.max(block)));
        self.event_count += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.event_count == 0
    }

    /// Liquidity-weighted average sqrtPriceX96, absent when no liquidity was folded.
    pub fn avg_sqrt_price_x96(&self) -> Option<BigRational> {
        if self.total_liquidity.is_zero() {
            return None;
        }
        Some(&self.weighted_sqrt_price_x96 / &self.total_liquidity)
    }

    pub fn avg_price(&self, base: &Token, quote: &Token) -> Option<Price> {
        self.avg_sqrt_price_x96()
            .map(|sqrt_price| sqrt_ratio_x96_to_price(&sqrt_price, base, quote))
    }

    pub fn amounts(&self, token0: &Token, token1: &Token) -> TokenAmounts {
        TokenAmounts::from_raw(token0, self.amount0.clone(), token1, self.amount1.clone())
    }
}

/// Fold events of one kind in `(block, log_index)` order.
///
/// `liquidity_of` yields the liquidity weight of an event given the pool's
/// sqrt price at the event's block. Every event's block must have a price.
pub fn fold_events<F>(
    kind: EventKind,
    events: &[PositionEvent],
    prices: &BlockPrices,
    liquidity_of: F,
) -> Result<WeightedAggregate>
where
    F: Fn(&PositionEvent, &BigRational) -> Result<BigRational>,
{
    let mut ordered: Vec<&PositionEvent> = events.iter().collect();
    ordered.sort_by_key(|event| event.sort_key());

    let mut aggregate = WeightedAggregate::default();
    for event in ordered {
        if event.kind != kind {
            return Err(StatsError::InconsistentInput(format!(
                "{:?} event at block {} in a {:?} fold",
                event.kind, event.block_number, kind
            )));
        }

        let sqrt_price_x96 = block_price(prices, event.block_number)?;
        let liquidity = liquidity_of(event, &sqrt_price_x96)?;

        aggregate.accumulate(
            event.block_number,
            &u256_to_rational(event.amount0),
            &u256_to_rational(event.amount1),
            &liquidity,
            &sqrt_price_x96,
        );
    }

    Ok(aggregate)
}

fn liquidity_delta(event: &PositionEvent, _sqrt_price_x96: &BigRational) -> Result<BigRational> {
    event.liquidity.map(u128_to_rational).ok_or_else(|| {
        StatsError::InconsistentInput(format!(
            "{:?} event at block {} carries no liquidity delta",
            event.kind, event.block_number
        ))
    })
}

/// Totals over `IncreaseLiquidity` events.
pub fn deposited(increases: &[PositionEvent], prices: &BlockPrices) -> Result<WeightedAggregate> {
    fold_events(EventKind::Increase, increases, prices, liquidity_delta)
}

/// Totals over `DecreaseLiquidity` events.
pub fn withdrawn(decreases: &[PositionEvent], prices: &BlockPrices) -> Result<WeightedAggregate> {
    fold_events(EventKind::Decrease, decreases, prices, liquidity_delta)
}

/// Fee totals: `Collect` events net of the principal released by `DecreaseLiquidity`.
///
/// Events are replayed in `(block, log_index)` order. A decrease credits its
/// amounts as owed principal and each collect pays that principal out first;
/// whatever it transfers beyond it is fee. The fee part of a collect is
/// weighted by its liquidity equivalent at that block's price within `range`.
pub fn collected(
    collects: &[PositionEvent],
    decreases: &[PositionEvent],
    prices: &BlockPrices,
    range: &TickRange,
) -> Result<WeightedAggregate> {
    let mut ordered: Vec<&PositionEvent> = collects.iter().chain(decreases).collect();
    // A decrease and the collect of the same transaction share a block; the decrease logs first
    ordered.sort_by_key(|event| (event.sort_key(), event.kind != EventKind::Decrease));

    let mut owed0 = BigRational::zero();
    let mut owed1 = BigRational::zero();
    let mut fees = WeightedAggregate::default();
    for event in ordered {
        match event.kind {
            EventKind::Decrease => {
                owed0 += u256_to_rational(event.amount0);
                owed1 += u256_to_rational(event.amount1);
            },
            EventKind::Collect => {
                let sqrt_price_x96 = block_price(prices, event.block_number)?;
                let fee0 = release_principal(&u256_to_rational(event.amount0), &mut owed0);
                let fee1 = release_principal(&u256_to_rational(event.amount1), &mut owed1);
                let liquidity = range.liquidity_for_amounts(&sqrt_price_x96, &fee0, &fee1);
                debug!(
                    "Collect at block {}: fees ({fee0}, {fee1}), liquidity equivalent {liquidity}",
                    event.block_number
                );

                fees.accumulate(event.block_number, &fee0, &fee1, &liquidity, &sqrt_price_x96);
            },
            EventKind::Increase => {
                return Err(StatsError::InconsistentInput(format!(
                    "Increase event at block {} in a fee fold",
                    event.block_number
                )));
            },
        }
    }

    if !owed0.is_zero() || !owed1.is_zero() {
        warn!(
            "Withdrawn principal ({owed0}, {owed1}) was not collected within the window; left out of fees"
        );
    }

    Ok(fees)
}

/// Pay `transferred` out of the outstanding principal `owed`, returning the fee remainder.
fn release_principal(transferred: &BigRational, owed: &mut BigRational) -> BigRational {
    let (fee, _) = saturating_sub(transferred, owed);
    let (still_owed, _) = saturating_sub(owed, transferred);
    *owed = still_owed;
    fee
}

fn block_price(prices: &BlockPrices, block: u64) -> Result<BigRational> {
    prices
        .get(&block)
        .map(biguint_to_rational)
        .ok_or(StatsError::MissingBlockPrice(block))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Q96;
    use alloy::primitives::{address, U256};
    use num_bigint::BigInt;
    use num_traits::ToPrimitive;

    fn token(addr: alloy::primitives::Address, symbol: &str) -> Token {
        Token::new(1, addr, symbol.to_string(), symbol.to_string(), 18)
    }

    fn tokens() -> (Token, Token) {
        (
            token(address!("1000000000000000000000000000000000000001"), "AAA"),
            token(address!("2000000000000000000000000000000000000002"), "BBB"),
        )
    }

    fn event(kind: EventKind, block: u64, liquidity: Option<u128>, amount0: u64, amount1: u64) -> PositionEvent {
        PositionEvent {
            kind,
            block_number: block,
            log_index: 0,
            liquidity,
            amount0: U256::from(amount0),
            amount1: U256::from(amount1),
        }
    }

    fn prices(entries: &[(u64, BigUint)]) -> BlockPrices {
        entries.iter().cloned().collect()
    }

    fn rational(value: u64) -> BigRational {
        BigRational::from_integer(BigInt::from(value))
    }

    #[test]
    fn test_deposit_totals_and_average_bounds() {
        let p1 = Q96.clone();
        let p2 = Q96.clone() * 2u32;
        let p3 = Q96.clone() * 3u32;
        let events = vec![
            event(EventKind::Increase, 10, Some(100), 5, 7),
            event(EventKind::Increase, 20, Some(300), 1, 2),
            event(EventKind::Increase, 30, Some(600), 4, 0),
        ];
        let aggregate =
            deposited(&events, &prices(&[(10, p1.clone()), (20, p2), (30, p3.clone())])).unwrap();

        assert_eq!(aggregate.total_liquidity, rational(1000));
        assert_eq!(aggregate.amount0, rational(10));
        assert_eq!(aggregate.amount1, rational(9));
        assert_eq!(aggregate.first_block, Some(10));
        assert_eq!(aggregate.last_block, Some(30));

        let avg = aggregate.avg_sqrt_price_x96().unwrap();
        assert!(avg >= biguint_to_rational(&p1));
        assert!(avg <= biguint_to_rational(&p3));

        let (token0, token1) = tokens();
        let avg_price = aggregate.avg_price(&token0, &token1).unwrap();
        let min_price = sqrt_ratio_x96_to_price(&biguint_to_rational(&p1), &token0, &token1);
        let max_price = sqrt_ratio_x96_to_price(&biguint_to_rational(&p3), &token0, &token1);
        assert!(avg_price.ratio() >= min_price.ratio());
        assert!(avg_price.ratio() <= max_price.ratio());
    }

    #[test]
    fn test_equal_weights_average_is_mean_sqrt_price() {
        let p1 = Q96.clone() * 2u32;
        let p2 = Q96.clone() * 4u32;
        let events = vec![
            event(EventKind::Increase, 1, Some(500), 1, 1),
            event(EventKind::Increase, 2, Some(500), 1, 1),
        ];
        let aggregate = deposited(&events, &prices(&[(1, p1), (2, p2)])).unwrap();

        let (token0, token1) = tokens();
        let avg_price = aggregate.avg_price(&token0, &token1).unwrap();
        // mean sqrt price is 3 * Q96, so the price is 9
        assert_eq!(avg_price.ratio(), &rational(9));
    }

    #[test]
    fn test_empty_and_zero_liquidity_have_no_average() {
        let empty = deposited(&[], &BlockPrices::default()).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.avg_sqrt_price_x96(), None);

        let zero = withdrawn(
            &[event(EventKind::Decrease, 5, Some(0), 0, 0)],
            &prices(&[(5, Q96.clone())]),
        )
        .unwrap();
        assert!(!zero.is_empty());
        let (token0, token1) = tokens();
        assert!(zero.avg_price(&token0, &token1).is_none());
    }

    #[test]
    fn test_events_folded_in_block_order() {
        let events = vec![
            event(EventKind::Decrease, 50, Some(1), 0, 0),
            event(EventKind::Decrease, 40, Some(1), 0, 0),
        ];
        let aggregate =
            withdrawn(&events, &prices(&[(40, Q96.clone()), (50, Q96.clone())])).unwrap();
        assert_eq!(aggregate.first_block, Some(40));
        assert_eq!(aggregate.last_block, Some(50));
    }

    #[test]
    fn test_missing_block_price_is_an_error() {
        let events = vec![event(EventKind::Increase, 7, Some(1), 0, 0)];
        let result = deposited(&events, &BlockPrices::default());
        assert!(matches!(result, Err(StatsError::MissingBlockPrice(7))));
    }

    #[test]
    fn test_wrong_event_kind_is_inconsistent() {
        let events = vec![event(EventKind::Collect, 7, None, 0, 0)];
        let result = deposited(&events, &prices(&[(7, Q96.clone())]));
        assert!(matches!(result, Err(StatsError::InconsistentInput(_))));
    }

    #[test]
    fn test_collected_excludes_withdrawn_principal() {
        let range = TickRange::new(-600, 600);
        let at_par = biguint_to_rational(&Q96);
        let (principal0, principal1) = range.amounts_for_liquidity(&rational(1_000_000_000), &at_par);
        let principal0 = principal0.to_integer().to_u64().unwrap();
        let principal1 = principal1.to_integer().to_u64().unwrap();

        let decreases = vec![event(EventKind::Decrease, 100, Some(1_000_000_000), principal0, principal1)];
        let collects = vec![event(EventKind::Collect, 100, None, principal0 + 40, principal1 + 60)];
        let aggregate = collected(&collects, &decreases, &prices(&[(100, Q96.clone())]), &range).unwrap();

        assert_eq!(aggregate.amount0, rational(40));
        assert_eq!(aggregate.amount1, rational(60));
        assert_eq!(aggregate.first_block, Some(100));
    }

    #[test]
    fn test_collected_without_decreases_weights_by_equivalent_liquidity() {
        let range = TickRange::new(-600, 600);
        let collects = vec![event(EventKind::Collect, 9, None, 30, 30)];
        let aggregate = collected(&collects, &[], &prices(&[(9, Q96.clone())]), &range).unwrap();

        assert!(aggregate.total_liquidity > BigRational::zero());
        assert_eq!(aggregate.avg_sqrt_price_x96(), Some(biguint_to_rational(&Q96)));
    }

    #[test]
    fn test_one_sided_fee_collect_has_an_average_price() {
        let range = TickRange::new(-600, 600);
        let collects = vec![event(EventKind::Collect, 9, None, 30, 0)];
        let aggregate = collected(&collects, &[], &prices(&[(9, Q96.clone())]), &range).unwrap();

        assert_eq!(aggregate.amount0, rational(30));
        assert!(aggregate.total_liquidity > BigRational::zero());
        let (token0, token1) = tokens();
        let avg = aggregate.avg_price(&token0, &token1).unwrap();
        assert_eq!(avg.ratio(), &rational(1));
    }

    #[test]
    fn test_close_then_small_one_sided_fee() {
        let range = TickRange::new(-600, 600);
        let liquidity: u128 = 1_000_000_000_000_000_000;
        let at_par = biguint_to_rational(&Q96);
        let (principal0, principal1) = range.amounts_for_liquidity(&u128_to_rational(liquidity), &at_par);
        // Principal is credited rounded down
        let principal0 = principal0.floor().to_integer().to_u64().unwrap();
        let principal1 = principal1.floor().to_integer().to_u64().unwrap();

        let decrease = event(EventKind::Decrease, 100, Some(liquidity), principal0, principal1);
        let collect = PositionEvent {
            log_index: 1,
            ..event(EventKind::Collect, 100, None, principal0 + 5000, principal1)
        };
        let aggregate =
            collected(&[collect], &[decrease], &prices(&[(100, Q96.clone())]), &range).unwrap();

        assert_eq!(aggregate.amount0, rational(5000));
        assert!(aggregate.amount1.is_zero());
        assert!(aggregate.total_liquidity > BigRational::zero());
        assert_eq!(aggregate.avg_sqrt_price_x96(), Some(at_par));
    }

    #[test]
    fn test_principal_collected_in_a_later_block() {
        let range = TickRange::new(-600, 600);
        let decreases = vec![event(EventKind::Decrease, 10, Some(1_000), 100, 100)];
        let collects = vec![
            event(EventKind::Collect, 20, None, 60, 0),
            event(EventKind::Collect, 30, None, 50, 120),
        ];
        let aggregate = collected(
            &collects,
            &decreases,
            &prices(&[(10, Q96.clone()), (20, Q96.clone() * 2u32), (30, Q96.clone())]),
            &range,
        )
        .unwrap();

        // Block 20 pays 60 of the owed token0; block 30 pays the last 40 and 100 token1
        assert_eq!(aggregate.amount0, rational(10));
        assert_eq!(aggregate.amount1, rational(20));
        assert_eq!(aggregate.event_count, 2);
        // Only the block 30 collect carried fees, so its price is the average
        assert_eq!(aggregate.avg_sqrt_price_x96(), Some(biguint_to_rational(&Q96)));
    }

    #[test]
    fn test_increase_in_fee_fold_is_inconsistent() {
        let range = TickRange::new(-600, 600);
        let collects = vec![event(EventKind::Increase, 3, Some(1), 0, 0)];
        let result = collected(&collects, &[], &prices(&[(3, Q96.clone())]), &range);
        assert!(matches!(result, Err(StatsError::InconsistentInput(_))));
    }
}
