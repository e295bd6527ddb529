#[allow(clippy::module_inception)]
mod config;

pub use self::config::{AnalyticsSettings, CacheSettings, ContractSettings, RpcSettings, Settings};
