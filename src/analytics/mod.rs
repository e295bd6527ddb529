//! Position analytics core.
//!
//! - [`aggregator`] - Liquidity-weighted folds over position events
//! - [`active_blocks`] - Binary search for the blocks an account transacted in
//! - [`events`] - Event history retrieval (direct range or discover-then-scan)
//! - [`stats`] - Orchestration into [`crate::models::PositionStats`]

pub mod active_blocks;
pub mod aggregator;
pub mod events;
pub mod stats;

pub use active_blocks::{default_upper_bound, ActiveBlockFinder};
pub use aggregator::{BlockPrices, WeightedAggregate};
pub use events::{fetch_history, EventHistory, ScanStrategy};
pub use stats::{AnalyticsOptions, PositionAnalytics};
