//! Active-block discovery over an account's transaction count.
//!
//! Used when the event source cannot scan an arbitrary block range. An
//! account's nonce is monotonic in the block number, so the block holding the
//! account's i-th transaction is the smallest block whose count reaches `i`,
//! found by binary search in `O(log(range))` oracle calls.

use alloy::primitives::Address;
use futures::{stream, StreamExt, TryStreamExt};
use log::debug;

use crate::{
    error::{Result, StatsError},
    sources::TransactionCountOracle,
};

/// Default bound on in-flight count lookups.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Search window upper bound used when none is given: the next power of two
/// at or above `head`.
pub fn default_upper_bound(head: u64) -> u64 {
    head.max(1).checked_next_power_of_two().unwrap_or(u64::MAX)
}

/// Finds the blocks in which an account sent transactions.
pub struct ActiveBlockFinder<'a, O: ?Sized> {
    oracle: &'a O,
    head: u64,
    concurrency: usize,
}

impl<'a, O> ActiveBlockFinder<'a, O>
where
    O: TransactionCountOracle + ?Sized,
{
    /// `head` is the current chain height; counts above it are read at `head`.
    pub fn new(oracle: &'a O, head: u64) -> Self {
        Self {
            oracle,
            head,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    async fn count(&self, account: Address, block: u64) -> Result<u64> {
        Ok(self
            .oracle
            .transaction_count(account, block.min(self.head))
            .await?)
    }

    /// Ascending, duplicate-free blocks in `[from_block, to_block]` where
    /// `account` transacted.
    ///
    /// `to_block` defaults to [`default_upper_bound`] of the chain head.
    pub async fn find(
        &self,
        account: Address,
        from_block: u64,
        to_block: Option<u64>,
    ) -> Result<Vec<u64>> {
        self.find_filtered(account, from_block, to_block, |_| true).await
    }

    /// Same as [`ActiveBlockFinder::find`], keeping only blocks accepted by `predicate`.
    pub async fn find_filtered<P>(
        &self,
        account: Address,
        from_block: u64,
        to_block: Option<u64>,
        predicate: P,
    ) -> Result<Vec<u64>>
    where
        P: Fn(u64) -> bool,
    {
        let to_block = to_block.unwrap_or_else(|| default_upper_bound(self.head));
        if from_block > to_block {
            return Err(StatsError::InconsistentInput(format!(
                "active block search from {from_block} past {to_block}"
            )));
        }

        // First transaction index sent at or after `from_block`
        let first_index = match from_block {
            0 => 1,
            _ => self.count(account, from_block - 1).await? + 1,
        };
        let last_index = self.count(account, to_block).await?;

        if last_index < first_index {
            debug!("No transactions from {account} in blocks {from_block}..={to_block}");
            return Ok(Vec::new());
        }

        debug!(
            "Locating transactions {first_index}..={last_index} of {account} in blocks {from_block}..={to_block}"
        );

        let mut blocks: Vec<u64> = stream::iter(first_index..=last_index)
            .map(|index| self.block_of_transaction(account, index, from_block, to_block))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        blocks.dedup();
        blocks.retain(|block| predicate(*block));
        Ok(blocks)
    }

    /// Smallest block in `[low, high]` whose count reaches `index`.
    ///
    /// The caller guarantees `count(high) >= index`.
    async fn block_of_transaction(
        &self,
        account: Address,
        index: u64,
        mut low: u64,
        mut high: u64,
    ) -> Result<u64> {
        while low < high {
            let mid = low + (high - low) / 2;
            if self.count(account, mid).await? >= index {
                high = mid;
            } else {
                low = mid + 1;
            }
        }
        Ok(low)
    }
}
