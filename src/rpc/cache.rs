//! Session cache for chain requests.
//!
//! Entries never expire. Concurrent requests for one key share a single
//! upstream fetch. Responses pinned to a block can be saved to disk and
//! restored in a later session.

use std::{future::Future, path::Path};

use alloy::primitives::{Address, U256};
use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use moka::future::Cache;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::models::EventKind;

/// A request identified by its method and parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum RequestKey {
    Position {
        position_id: U256,
    },
    OwnerOf {
        position_id: U256,
    },
    SqrtPrice {
        pool: Address,
        block: Option<u64>,
    },
    PoolAddress {
        token0: Address,
        token1: Address,
        fee: u32,
    },
    Token {
        address: Address,
    },
    PositionEvents {
        kind: EventKind,
        position_id: U256,
        from_block: u64,
        to_block: u64,
    },
    TransactionCount {
        account: Address,
        block: u64,
    },
    LatestBlock,
    BlockTimestamp {
        block: u64,
    },
}

impl RequestKey {
    /// Whether the response can be reused by a later session.
    ///
    /// True for responses fixed once the chain has passed the request's block.
    /// Event scans count only when they cover a single block: head-bounded
    /// ranges never repeat. Only such responses are written by [`RequestCache::save`].
    pub fn is_historical(&self) -> bool {
        match self {
            RequestKey::Position { .. } | RequestKey::OwnerOf { .. } | RequestKey::LatestBlock => {
                false
            },
            RequestKey::SqrtPrice { block, .. } => block.is_some(),
            RequestKey::PositionEvents {
                from_block,
                to_block,
                ..
            } => from_block == to_block,
            RequestKey::PoolAddress { .. }
            | RequestKey::Token { .. }
            | RequestKey::TransactionCount { .. }
            | RequestKey::BlockTimestamp { .. } => true,
        }
    }

    /// Scope this request to one chain.
    pub fn on_chain(self, chain_id: u64) -> CacheKey {
        CacheKey {
            chain_id,
            request: self,
        }
    }
}

/// A request together with the chain it was sent to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub chain_id: u64,
    pub request: RequestKey,
}

impl CacheKey {
    pub fn is_historical(&self) -> bool {
        self.request.is_historical()
    }
}

#[derive(Serialize, Deserialize)]
struct Entry {
    key: CacheKey,
    value: Value,
}

/// Memoized responses keyed by [`CacheKey`], stored as JSON values.
///
/// One cache can serve several chains; keys never collide across them.
#[derive(Clone)]
pub struct RequestCache {
    entries: Cache<CacheKey, Value>,
}

impl Default for RequestCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestCache {
    pub fn new() -> Self {
        Self {
            entries: Cache::builder().name("lpstats-requests").build(),
        }
    }

    /// Cached response for `key`, or the result of `fetch` which is then cached.
    ///
    /// Failed fetches are not cached.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: CacheKey, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let value = self
            .entries
            .try_get_with(key.clone(), async move {
                let response = fetch().await?;
                serde_json::to_value(response).context("Failed to encode response")
            })
            .await
            .map_err(|e| anyhow!("{e:#}"))?;

        serde_json::from_value(value).with_context(|| format!("Cached response for {key:?} has an unexpected shape"))
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of cached responses.
    pub async fn len(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks().await;
    }

    /// Write historical entries to `path` as JSON; returns how many were written.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let entries: Vec<Entry> = self
            .entries
            .iter()
            .filter(|(key, _)| key.is_historical())
            .map(|(key, value)| Entry {
                key: key.as_ref().clone(),
                value,
            })
            .collect();

        let json = serde_json::to_vec(&entries).context("Failed to encode cache")?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write cache file {}", path.display()))?;

        info!("Saved {} cached responses to {}", entries.len(), path.display());
        Ok(entries.len())
    }

    /// Restore entries written by [`RequestCache::save`]; a missing file loads nothing.
    pub async fn load(&self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let json = match tokio::fs::read(path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cache file at {}", path.display());
                return Ok(0);
            },
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read cache file {}", path.display()))
            },
        };

        let entries: Vec<Entry> = serde_json::from_slice(&json)
            .with_context(|| format!("Malformed cache file {}", path.display()))?;
        let count = entries.len();
        for entry in entries {
            self.entries.insert(entry.key, entry.value).await;
        }

        info!("Loaded {count} cached responses from {}", path.display());
        Ok(count)
    }
}
