//! Position event retrieval.
//!
//! Two strategies, chosen by what the event source advertises:
//! a direct scan over the whole block window, or discovery of the owner's
//! active blocks followed by one single-block query per block and event kind.

use alloy::primitives::{Address, U256};
use futures::{stream, try_join, StreamExt, TryStreamExt};
use log::{debug, info};

use super::active_blocks::ActiveBlockFinder;
use crate::{
    error::Result,
    models::{EventKind, PositionEvent},
    sources::{EventSource, PositionReader, TransactionCountOracle},
};

/// How a position's event history is retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStrategy {
    /// One range query per event kind.
    DirectRange,
    /// Active-block discovery, then per-block queries.
    ActiveBlocks,
}

impl ScanStrategy {
    pub fn for_source<S: EventSource + ?Sized>(source: &S) -> Self {
        if source.supports_range_queries() {
            ScanStrategy::DirectRange
        } else {
            ScanStrategy::ActiveBlocks
        }
    }
}

/// Every event of a position, each list in `(block, log_index)` order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventHistory {
    pub increases: Vec<PositionEvent>,
    pub decreases: Vec<PositionEvent>,
    pub collects: Vec<PositionEvent>,
}

impl EventHistory {
    fn new(
        mut increases: Vec<PositionEvent>,
        mut decreases: Vec<PositionEvent>,
        mut collects: Vec<PositionEvent>,
    ) -> Self {
        for events in [&mut increases, &mut decreases, &mut collects] {
            events.sort_by_key(PositionEvent::sort_key);
        }
        Self {
            increases,
            decreases,
            collects,
        }
    }

    /// Distinct blocks holding at least one event, ascending.
    pub fn blocks(&self) -> Vec<u64> {
        let mut blocks: Vec<u64> = self
            .increases
            .iter()
            .chain(&self.decreases)
            .chain(&self.collects)
            .map(|event| event.block_number)
            .collect();
        blocks.sort_unstable();
        blocks.dedup();
        blocks
    }

    pub fn len(&self) -> usize {
        self.increases.len() + self.decreases.len() + self.collects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Retrieve the full event history of `position_id` within `[from_block, to_block]`.
pub async fn fetch_history<R>(
    reader: &R,
    position_id: U256,
    from_block: u64,
    to_block: u64,
    concurrency: usize,
) -> Result<EventHistory>
where
    R: EventSource + PositionReader + TransactionCountOracle + ?Sized,
{
    let strategy = ScanStrategy::for_source(reader);
    info!("Fetching events of position {position_id} in blocks {from_block}..={to_block} ({strategy:?})");

    let history = match strategy {
        ScanStrategy::DirectRange => {
            let (increases, decreases, collects) = try_join!(
                events_in_range(reader, EventKind::Increase, position_id, from_block, to_block),
                events_in_range(reader, EventKind::Decrease, position_id, from_block, to_block),
                events_in_range(reader, EventKind::Collect, position_id, from_block, to_block),
            )?;
            EventHistory::new(increases, decreases, collects)
        },
        ScanStrategy::ActiveBlocks => {
            let owner = reader.owner_of(position_id).await?;
            let blocks = ActiveBlockFinder::new(reader, to_block)
                .with_concurrency(concurrency)
                .find(owner, from_block, Some(to_block))
                .await?;
            debug!("Owner {owner} active in {} blocks", blocks.len());

            let (increases, decreases, collects) = try_join!(
                events_in_blocks(reader, EventKind::Increase, position_id, owner, &blocks, concurrency),
                events_in_blocks(reader, EventKind::Decrease, position_id, owner, &blocks, concurrency),
                events_in_blocks(reader, EventKind::Collect, position_id, owner, &blocks, concurrency),
            )?;
            EventHistory::new(increases, decreases, collects)
        },
    };

    info!(
        "Position {position_id}: {} increases, {} decreases, {} collects",
        history.increases.len(),
        history.decreases.len(),
        history.collects.len()
    );
    Ok(history)
}

async fn events_in_range<R>(
    reader: &R,
    kind: EventKind,
    position_id: U256,
    from_block: u64,
    to_block: u64,
) -> Result<Vec<PositionEvent>>
where
    R: EventSource + ?Sized,
{
    Ok(reader
        .position_events(kind, position_id, from_block, to_block)
        .await?)
}

async fn events_in_blocks<R>(
    reader: &R,
    kind: EventKind,
    position_id: U256,
    owner: Address,
    blocks: &[u64],
    concurrency: usize,
) -> Result<Vec<PositionEvent>>
where
    R: EventSource + ?Sized,
{
    let per_block: Vec<Vec<PositionEvent>> = stream::iter(blocks.iter().copied())
        .map(|block| events_in_range(reader, kind, position_id, block, block))
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    let events: Vec<PositionEvent> = per_block.into_iter().flatten().collect();
    debug!("{} {kind:?} events in blocks where {owner} transacted", events.len());
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Position;
    use alloy::primitives::address;
    use anyhow::bail;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const OWNER: Address = address!("00000000000000000000000000000000000000aa");

    struct FakeSource {
        range_queries: bool,
        events: Vec<PositionEvent>,
        owner_tx_blocks: Vec<u64>,
        queried_ranges: Mutex<Vec<(u64, u64)>>,
    }

    impl FakeSource {
        fn new(range_queries: bool) -> Self {
            let event = |kind: EventKind, block: u64, log_index: u64| PositionEvent {
                kind,
                block_number: block,
                log_index,
                liquidity: (kind != EventKind::Collect).then_some(10),
                amount0: U256::from(1),
                amount1: U256::from(2),
            };
            Self {
                range_queries,
                events: vec![
                    event(EventKind::Collect, 300, 4),
                    event(EventKind::Increase, 200, 9),
                    event(EventKind::Increase, 100, 1),
                    event(EventKind::Decrease, 300, 2),
                    event(EventKind::Increase, 200, 3),
                ],
                owner_tx_blocks: vec![100, 150, 200, 300],
                queried_ranges: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EventSource for FakeSource {
        fn supports_range_queries(&self) -> bool {
            self.range_queries
        }

        async fn position_events(
            &self,
            kind: EventKind,
            _position_id: U256,
            from_block: u64,
            to_block: u64,
        ) -> anyhow::Result<Vec<PositionEvent>> {
            if !self.range_queries && from_block != to_block {
                bail!("range queries unsupported");
            }
            self.queried_ranges.lock().unwrap().push((from_block, to_block));
            Ok(self
                .events
                .iter()
                .filter(|e| e.kind == kind && e.block_number >= from_block && e.block_number <= to_block)
                .cloned()
                .collect())
        }
    }

    #[async_trait]
    impl PositionReader for FakeSource {
        async fn position(&self, _position_id: U256) -> anyhow::Result<Position> {
            bail!("not used")
        }

        async fn owner_of(&self, _position_id: U256) -> anyhow::Result<Address> {
            Ok(OWNER)
        }
    }

    #[async_trait]
    impl TransactionCountOracle for FakeSource {
        async fn transaction_count(&self, _account: Address, block: u64) -> anyhow::Result<u64> {
            Ok(self.owner_tx_blocks.iter().filter(|b| **b <= block).count() as u64)
        }
    }

    fn keys(events: &[PositionEvent]) -> Vec<(u64, u64)> {
        events.iter().map(PositionEvent::sort_key).collect()
    }

    #[test]
    fn test_strategy_follows_source_capability() {
        assert_eq!(ScanStrategy::for_source(&FakeSource::new(true)), ScanStrategy::DirectRange);
        assert_eq!(ScanStrategy::for_source(&FakeSource::new(false)), ScanStrategy::ActiveBlocks);
    }

    #[tokio::test]
    async fn test_direct_range_history_is_ordered() {
        let source = FakeSource::new(true);
        let history = fetch_history(&source, U256::from(7), 0, 1000, 4).await.unwrap();

        assert_eq!(keys(&history.increases), vec![(100, 1), (200, 3), (200, 9)]);
        assert_eq!(keys(&history.decreases), vec![(300, 2)]);
        assert_eq!(keys(&history.collects), vec![(300, 4)]);
        assert_eq!(history.blocks(), vec![100, 200, 300]);
        assert_eq!(source.queried_ranges.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_both_strategies_agree() {
        let direct = fetch_history(&FakeSource::new(true), U256::from(7), 0, 1000, 4)
            .await
            .unwrap();

        let source = FakeSource::new(false);
        let discovered = fetch_history(&source, U256::from(7), 0, 1000, 2).await.unwrap();

        assert_eq!(direct, discovered);
        // 4 active blocks times 3 event kinds, all single-block
        let ranges = source.queried_ranges.lock().unwrap();
        assert_eq!(ranges.len(), 12);
        assert!(ranges.iter().all(|(from, to)| from == to));
    }

    #[tokio::test]
    async fn test_window_excludes_outside_events() {
        let source = FakeSource::new(false);
        let history = fetch_history(&source, U256::from(7), 150, 250, 2).await.unwrap();

        assert_eq!(keys(&history.increases), vec![(200, 3), (200, 9)]);
        assert!(history.decreases.is_empty());
        assert_eq!(history.len(), 2);
    }
}
