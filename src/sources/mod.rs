//! Read-only capabilities the analytics core consumes.
//!
//! One narrow trait per external lookup. [`crate::rpc::RpcReader`] implements
//! all of them over JSON-RPC, [`crate::rpc::CachedReader`] memoizes any
//! implementation, and tests substitute in-memory fakes.

use alloy::primitives::{Address, U256};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{EventKind, Position, PositionEvent, Token};

/// Position manager state.
#[async_trait]
pub trait PositionReader: Send + Sync {
    /// Position record including currently uncollected fees.
    async fn position(&self, position_id: U256) -> Result<Position>;

    async fn owner_of(&self, position_id: U256) -> Result<Address>;
}

/// Pool price at the latest block or at a historical block.
#[async_trait]
pub trait PoolPriceReader: Send + Sync {
    async fn sqrt_price_x96(&self, pool: Address, block: Option<u64>) -> Result<U256>;
}

/// Factory lookup of the pool for a token pair and fee tier.
#[async_trait]
pub trait PoolResolver: Send + Sync {
    async fn pool_address(&self, token0: Address, token1: Address, fee: u32) -> Result<Address>;
}

/// ERC-20 metadata.
#[async_trait]
pub trait TokenMetadataReader: Send + Sync {
    async fn token(&self, address: Address) -> Result<Token>;
}

/// Position manager event logs.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Whether [`EventSource::position_events`] accepts arbitrary block ranges.
    ///
    /// When `false`, callers must restrict queries to single blocks discovered
    /// through the active-block finder.
    fn supports_range_queries(&self) -> bool;

    /// Events of one kind for one position within `[from_block, to_block]`.
    async fn position_events(
        &self,
        kind: EventKind,
        position_id: U256,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<PositionEvent>>;
}

/// Account nonce oracle.
#[async_trait]
pub trait TransactionCountOracle: Send + Sync {
    /// Number of transactions sent by `account` up to and including `block`.
    async fn transaction_count(&self, account: Address, block: u64) -> Result<u64>;
}

/// Chain head and block timestamps.
#[async_trait]
pub trait BlockReader: Send + Sync {
    async fn latest_block(&self) -> Result<u64>;

    async fn block_timestamp(&self, block: u64) -> Result<DateTime<Utc>>;
}

/// Everything the position analytics need, in one bound.
pub trait ChainReader:
    PositionReader
    + PoolPriceReader
    + PoolResolver
    + TokenMetadataReader
    + EventSource
    + TransactionCountOracle
    + BlockReader
{
}

impl<T> ChainReader for T where
    T: PositionReader
        + PoolPriceReader
        + PoolResolver
        + TokenMetadataReader
        + EventSource
        + TransactionCountOracle
        + BlockReader
{
}
