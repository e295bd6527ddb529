pub mod abis;
pub mod analytics;
pub mod config;
pub mod error;
pub mod models;
pub mod rpc;
pub mod sources;
pub mod utils;

pub use self::config::Settings;
pub use analytics::{AnalyticsOptions, PositionAnalytics};
pub use error::{Result, StatsError};
pub use models::PositionStats;
pub use rpc::{CachedReader, RequestCache, RpcReader};
pub use sources::ChainReader;
