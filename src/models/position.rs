use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Liquidity position as stored by the position manager.
///
/// `uncollected0`/`uncollected1` are the fees the owner could collect right
/// now (simulated `collect`), which include any `tokens_owed` already credited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: U256,
    pub nonce: u128,
    pub operator: Address,
    pub token0: Address,
    pub token1: Address,
    pub fee: u32,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
    pub tokens_owed0: u128,
    pub tokens_owed1: u128,
    pub uncollected0: U256,
    pub uncollected1: U256,
}

/// Kind of position manager event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// `IncreaseLiquidity`: a deposit.
    Increase,
    /// `DecreaseLiquidity`: a withdrawal of principal (credited, not yet transferred).
    Decrease,
    /// `Collect`: tokens transferred out, principal and fees alike.
    Collect,
}

/// One decoded position manager event.
///
/// `liquidity` is the liquidity delta for increases and decreases and `None`
/// for collects, which only report raw token amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionEvent {
    pub kind: EventKind,
    pub block_number: u64,
    pub log_index: u64,
    pub liquidity: Option<u128>,
    pub amount0: U256,
    pub amount1: U256,
}

impl PositionEvent {
    /// Ordering key used wherever events are folded.
    pub fn sort_key(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}
