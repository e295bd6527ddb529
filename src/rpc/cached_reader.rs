use std::sync::Arc;

use alloy::primitives::{Address, U256};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::cache::{CacheKey, RequestCache, RequestKey};
use crate::{
    models::{EventKind, Position, PositionEvent, Token},
    sources::{
        BlockReader, EventSource, PoolPriceReader, PoolResolver, PositionReader,
        TokenMetadataReader, TransactionCountOracle,
    },
};

/// Routes every call of the wrapped reader through a shared [`RequestCache`].
///
/// Keys are scoped to `chain_id`, the chain the wrapped reader talks to.
pub struct CachedReader<R> {
    inner: R,
    cache: Arc<RequestCache>,
    chain_id: u64,
}

impl<R> CachedReader<R> {
    pub fn new(inner: R, cache: Arc<RequestCache>, chain_id: u64) -> Self {
        Self {
            inner,
            cache,
            chain_id,
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn cache(&self) -> &Arc<RequestCache> {
        &self.cache
    }

    fn key(&self, request: RequestKey) -> CacheKey {
        request.on_chain(self.chain_id)
    }
}

#[async_trait]
impl<R: PositionReader> PositionReader for CachedReader<R> {
    async fn position(&self, position_id: U256) -> Result<Position> {
        self.cache
            .get_or_fetch(self.key(RequestKey::Position { position_id }), || self.inner.position(position_id))
            .await
    }

    async fn owner_of(&self, position_id: U256) -> Result<Address> {
        self.cache
            .get_or_fetch(self.key(RequestKey::OwnerOf { position_id }), || self.inner.owner_of(position_id))
            .await
    }
}

#[async_trait]
impl<R: PoolPriceReader> PoolPriceReader for CachedReader<R> {
    async fn sqrt_price_x96(&self, pool: Address, block: Option<u64>) -> Result<U256> {
        self.cache
            .get_or_fetch(self.key(RequestKey::SqrtPrice { pool, block }), || {
                self.inner.sqrt_price_x96(pool, block)
            })
            .await
    }
}

#[async_trait]
impl<R: PoolResolver> PoolResolver for CachedReader<R> {
    async fn pool_address(&self, token0: Address, token1: Address, fee: u32) -> Result<Address> {
        self.cache
            .get_or_fetch(self.key(RequestKey::PoolAddress { token0, token1, fee }), || {
                self.inner.pool_address(token0, token1, fee)
            })
            .await
    }
}

#[async_trait]
impl<R: TokenMetadataReader> TokenMetadataReader for CachedReader<R> {
    async fn token(&self, address: Address) -> Result<Token> {
        self.cache
            .get_or_fetch(self.key(RequestKey::Token { address }), || self.inner.token(address))
            .await
    }
}

#[async_trait]
impl<R: EventSource> EventSource for CachedReader<R> {
    fn supports_range_queries(&self) -> bool {
        self.inner.supports_range_queries()
    }

    async fn position_events(
        &self,
        kind: EventKind,
        position_id: U256,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<PositionEvent>> {
        let key = self.key(RequestKey::PositionEvents {
            kind,
            position_id,
            from_block,
            to_block,
        });
        self.cache
            .get_or_fetch(key, || {
                self.inner
                    .position_events(kind, position_id, from_block, to_block)
            })
            .await
    }
}

#[async_trait]
impl<R: TransactionCountOracle> TransactionCountOracle for CachedReader<R> {
    async fn transaction_count(&self, account: Address, block: u64) -> Result<u64> {
        self.cache
            .get_or_fetch(self.key(RequestKey::TransactionCount { account, block }), || {
                self.inner.transaction_count(account, block)
            })
            .await
    }
}

#[async_trait]
impl<R: BlockReader> BlockReader for CachedReader<R> {
    async fn latest_block(&self) -> Result<u64> {
        self.cache
            .get_or_fetch(self.key(RequestKey::LatestBlock), || self.inner.latest_block())
            .await
    }

    async fn block_timestamp(&self, block: u64) -> Result<DateTime<Utc>> {
        self.cache
            .get_or_fetch(self.key(RequestKey::BlockTimestamp { block }), || {
                self.inner.block_timestamp(block)
            })
            .await
    }
}
