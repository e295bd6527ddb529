use alloy::primitives::{address, Address};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::analytics::AnalyticsOptions;

/// JSON-RPC endpoint and per-call resilience.
///
/// Timeouts and retries apply inside the reader; analytics never retry.
#[derive(Debug, Deserialize, Clone)]
pub struct RpcSettings {
    pub url: String,
    /// Whether the endpoint answers `eth_getLogs` over arbitrary block ranges.
    /// When false, events are located through the owner's active blocks.
    #[serde(default = "default_archive")]
    pub archive: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_archive() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    100
}

/// Contract addresses, defaulting to the Ethereum mainnet deployment.
#[derive(Debug, Deserialize, Clone)]
pub struct ContractSettings {
    #[serde(default = "default_position_manager")]
    pub position_manager: Address,
    #[serde(default = "default_factory")]
    pub factory: Address,
}

impl Default for ContractSettings {
    fn default() -> Self {
        Self {
            position_manager: default_position_manager(),
            factory: default_factory(),
        }
    }
}

fn default_position_manager() -> Address {
    address!("C36442b4a4522E871399CD717aBDD847Ab11FE88")
}

fn default_factory() -> Address {
    address!("1F98431c8aD98523631AE4a59f267346ea31F984")
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalyticsSettings {
    /// First block scanned for position events (position manager deployment).
    #[serde(default = "default_from_block")]
    pub from_block: u64,
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            from_block: default_from_block(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

fn default_from_block() -> u64 {
    12_369_651
}

fn default_max_concurrent_requests() -> usize {
    8
}

impl From<&AnalyticsSettings> for AnalyticsOptions {
    fn from(settings: &AnalyticsSettings) -> Self {
        Self {
            from_block: settings.from_block,
            max_concurrent_requests: settings.max_concurrent_requests,
        }
    }
}

/// Request cache persistence. Without a path the cache lives for one run only.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CacheSettings {
    #[serde(default)]
    pub path: Option<String>,
}

/// Root application configuration.
///
/// Loaded from a `config` file (`config.yaml`, `config.toml`, ...) and
/// `LPSTATS_`-prefixed environment variables, e.g. `LPSTATS_RPC__URL`.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub rpc: RpcSettings,
    #[serde(default)]
    pub contracts: ContractSettings,
    #[serde(default)]
    pub analytics: AnalyticsSettings,
    #[serde(default)]
    pub cache: CacheSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_file("config")
    }

    /// Load from the file `name` (extension optional) plus the environment.
    pub fn from_file(name: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(name).required(false))
            .add_source(Environment::with_prefix("LPSTATS").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
