use std::{future::Future, time::Duration};

use alloy::{
    eips::{BlockId, BlockNumberOrTag},
    primitives::{aliases::U24, Address, B256, U256},
    providers::{DynProvider, Provider, ProviderBuilder, MULTICALL3_ADDRESS},
    rpc::types::{Filter, Log},
    sol_types::{SolCall, SolEvent},
};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use url::Url;

use crate::{
    abis::{
        position_manager::INonfungiblePositionManager::{Collect, DecreaseLiquidity, IncreaseLiquidity},
        Call3, CollectParams, IERC20Metadata, IMulticall3, INonfungiblePositionManager,
        IUniswapV3Factory, IUniswapV3Pool,
    },
    config::{ContractSettings, RpcSettings},
    models::{EventKind, Position, PositionEvent, Token},
    sources::{
        BlockReader, EventSource, PoolPriceReader, PoolResolver, PositionReader,
        TokenMetadataReader, TransactionCountOracle,
    },
};

/// Tokens reporting more decimals than this are treated as malformed.
const MAX_TOKEN_DECIMALS: u8 = 36;

/// Upper bound on the wait between two attempts of one call.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// JSON-RPC implementation of every chain capability.
///
/// Each call runs under a timeout and is retried with exponential backoff.
#[derive(Clone)]
pub struct RpcReader {
    provider: DynProvider,
    chain_id: u64,
    position_manager: Address,
    factory: Address,
    archive: bool,
    timeout: Duration,
    max_retries: u32,
    retry_delay_ms: u64,
}

impl RpcReader {
    /// Connect to the endpoint in `rpc` and resolve its chain id.
    pub async fn connect(rpc: &RpcSettings, contracts: &ContractSettings) -> Result<Self> {
        let url = Url::parse(&rpc.url).with_context(|| format!("Invalid RPC URL {}", rpc.url))?;
        let provider = DynProvider::new(ProviderBuilder::new().connect_http(url));

        let mut reader = Self {
            provider,
            chain_id: 0,
            position_manager: contracts.position_manager,
            factory: contracts.factory,
            archive: rpc.archive,
            timeout: Duration::from_secs(rpc.timeout_secs),
            max_retries: rpc.max_retries,
            retry_delay_ms: rpc.retry_delay_ms,
        };

        let chain_id = reader
            .with_retry("eth_chainId", || {
                let provider = reader.provider.clone();
                async move { Ok(provider.get_chain_id().await?) }
            })
            .await?;
        reader.chain_id = chain_id;
        debug!("Connected to chain {} (archive: {})", reader.chain_id, reader.archive);

        Ok(reader)
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Run `call` under the per-call timeout, retrying failures with exponential backoff.
    async fn with_retry<T, F, Fut>(&self, what: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            let error = match tokio::time::timeout(self.timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => e,
                Err(_) => anyhow::anyhow!("timed out after {:?}", self.timeout),
            };

            let attempts = attempt.saturating_add(1);
            if attempt >= self.max_retries {
                return Err(error.context(format!("{what} failed after {attempts} attempts")));
            }

            warn!(
                "{what} failed (attempt {attempts}/{}): {error:#}",
                self.max_retries.saturating_add(1)
            );
            tokio::time::sleep(backoff_delay(self.retry_delay_ms, attempt)).await;
            attempt = attempts;
        }
    }

    fn manager(&self) -> INonfungiblePositionManager::INonfungiblePositionManagerInstance<DynProvider> {
        INonfungiblePositionManager::new(self.position_manager, self.provider.clone())
    }

    /// name, symbol and decimals in one round trip through Multicall3.
    async fn token_via_multicall(&self, address: Address) -> Result<Token> {
        let token = IERC20Metadata::new(address, &self.provider);
        let calls = vec![
            Call3 {
                target: address,
                allowFailure: true,
                callData: token.name().calldata().to_vec().into(),
            },
            Call3 {
                target: address,
                allowFailure: true,
                callData: token.symbol().calldata().to_vec().into(),
            },
            Call3 {
                target: address,
                allowFailure: false,
                callData: token.decimals().calldata().to_vec().into(),
            },
        ];

        let results = self
            .with_retry("multicall aggregate3", || {
                let multicall = IMulticall3::new(MULTICALL3_ADDRESS, self.provider.clone());
                let calls = calls.clone();
                async move { Ok(multicall.aggregate3(calls).call().await?) }
            })
            .await?;

        let [name, symbol, decimals] = results.as_slice() else {
            bail!("Multicall returned {} results for 3 calls", results.len());
        };

        let decimals = IERC20Metadata::decimalsCall::abi_decode_returns(&decimals.returnData)
            .context("Invalid decimals() return data")?;
        let name = name
            .success
            .then(|| IERC20Metadata::nameCall::abi_decode_returns(&name.returnData).ok())
            .flatten()
            .unwrap_or_default();
        let symbol = symbol
            .success
            .then(|| IERC20Metadata::symbolCall::abi_decode_returns(&symbol.returnData).ok())
            .flatten()
            .unwrap_or_default();

        Ok(Token::new(self.chain_id, address, symbol, name, decimals))
    }

    /// Fallback when Multicall3 is unavailable: three direct calls, only decimals required.
    async fn token_via_calls(&self, address: Address) -> Result<Token> {
        let token = IERC20Metadata::new(address, self.provider.clone());

        let decimals = self
            .with_retry("decimals()", || {
                let token = token.clone();
                async move { Ok(token.decimals().call().await?) }
            })
            .await?;

        let name = tokio::time::timeout(self.timeout, token.name().call())
            .await
            .ok()
            .and_then(|r| r.ok())
            .unwrap_or_default();
        let symbol = tokio::time::timeout(self.timeout, token.symbol().call())
            .await
            .ok()
            .and_then(|r| r.ok())
            .unwrap_or_default();

        Ok(Token::new(self.chain_id, address, symbol, name, decimals))
    }
}

#[async_trait]
impl PositionReader for RpcReader {
    async fn position(&self, position_id: U256) -> Result<Position> {
        let record = self
            .with_retry("positions()", || {
                let manager = self.manager();
                async move { Ok(manager.positions(position_id).call().await?) }
            })
            .await
            .with_context(|| format!("Failed to read position {position_id}"))?;

        // Simulated collect from the owner reports fees owed including unsettled growth
        let owner = self.owner_of(position_id).await?;
        let uncollected = self
            .with_retry("collect() simulation", || {
                let manager = self.manager();
                let params = CollectParams {
                    tokenId: position_id,
                    recipient: owner,
                    amount0Max: u128::MAX,
                    amount1Max: u128::MAX,
                };
                async move { Ok(manager.collect(params).from(owner).call().await?) }
            })
            .await
            .with_context(|| format!("Failed to simulate collect for position {position_id}"))?;

        Ok(Position {
            id: position_id,
            nonce: record.nonce.to::<u128>(),
            operator: record.operator,
            token0: record.token0,
            token1: record.token1,
            fee: record.fee.to::<u32>(),
            tick_lower: record.tickLower.as_i32(),
            tick_upper: record.tickUpper.as_i32(),
            liquidity: record.liquidity,
            tokens_owed0: record.tokensOwed0,
            tokens_owed1: record.tokensOwed1,
            uncollected0: uncollected.amount0,
            uncollected1: uncollected.amount1,
        })
    }

    async fn owner_of(&self, position_id: U256) -> Result<Address> {
        self.with_retry("ownerOf()", || {
            let manager = self.manager();
            async move { Ok(manager.ownerOf(position_id).call().await?) }
        })
        .await
        .with_context(|| format!("Failed to read owner of position {position_id}"))
    }
}

#[async_trait]
impl PoolPriceReader for RpcReader {
    async fn sqrt_price_x96(&self, pool: Address, block: Option<u64>) -> Result<U256> {
        let block_id = block.map_or(BlockId::latest(), BlockId::number);
        let slot0 = self
            .with_retry("slot0()", || {
                let pool = IUniswapV3Pool::new(pool, self.provider.clone());
                async move { Ok(pool.slot0().block(block_id).call().await?) }
            })
            .await
            .with_context(|| format!("Failed to read slot0 of {pool} at {block_id:?}"))?;

        Ok(U256::from(slot0.sqrtPriceX96))
    }
}

#[async_trait]
impl PoolResolver for RpcReader {
    async fn pool_address(&self, token0: Address, token1: Address, fee: u32) -> Result<Address> {
        let fee: U24 = fee.try_into().context("Fee tier does not fit uint24")?;
        self.with_retry("getPool()", || {
            let factory = IUniswapV3Factory::new(self.factory, self.provider.clone());
            async move { Ok(factory.getPool(token0, token1, fee).call().await?) }
        })
        .await
        .with_context(|| format!("Failed to resolve pool for {token0}/{token1}"))
    }
}

#[async_trait]
impl TokenMetadataReader for RpcReader {
    async fn token(&self, address: Address) -> Result<Token> {
        let token = match self.token_via_multicall(address).await {
            Ok(token) => token,
            Err(e) => {
                debug!("Multicall metadata for {address} failed ({e:#}), using direct calls");
                self.token_via_calls(address)
                    .await
                    .with_context(|| format!("Failed to read token metadata of {address}"))?
            },
        };

        if token.decimals > MAX_TOKEN_DECIMALS {
            bail!("Token {address} reports {} decimals", token.decimals);
        }
        Ok(token)
    }
}

#[async_trait]
impl EventSource for RpcReader {
    fn supports_range_queries(&self) -> bool {
        self.archive
    }

    async fn position_events(
        &self,
        kind: EventKind,
        position_id: U256,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<PositionEvent>> {
        let signature = match kind {
            EventKind::Increase => IncreaseLiquidity::SIGNATURE_HASH,
            EventKind::Decrease => DecreaseLiquidity::SIGNATURE_HASH,
            EventKind::Collect => Collect::SIGNATURE_HASH,
        };
        let filter = Filter::new()
            .address(self.position_manager)
            .event_signature(signature)
            .topic1(B256::from(position_id))
            .from_block(from_block)
            .to_block(to_block);

        let logs = self
            .with_retry("eth_getLogs", || {
                let provider = self.provider.clone();
                let filter = filter.clone();
                async move { Ok(provider.get_logs(&filter).await?) }
            })
            .await
            .with_context(|| format!("Failed to fetch {kind:?} logs in {from_block}..={to_block}"))?;

        logs.iter().map(|log| decode_position_event(kind, log)).collect()
    }
}

fn decode_position_event(kind: EventKind, log: &Log) -> Result<PositionEvent> {
    let block_number = log.block_number.context("Log without block number")?;
    let log_index = log.log_index.context("Log without log index")?;

    let (liquidity, amount0, amount1) = match kind {
        EventKind::Increase => {
            let event = IncreaseLiquidity::decode_log_data(log.data())?;
            (Some(event.liquidity), event.amount0, event.amount1)
        },
        EventKind::Decrease => {
            let event = DecreaseLiquidity::decode_log_data(log.data())?;
            (Some(event.liquidity), event.amount0, event.amount1)
        },
        EventKind::Collect => {
            let event = Collect::decode_log_data(log.data())?;
            (None, event.amount0, event.amount1)
        },
    };

    Ok(PositionEvent {
        kind,
        block_number,
        log_index,
        liquidity,
        amount0,
        amount1,
    })
}

#[async_trait]
impl TransactionCountOracle for RpcReader {
    async fn transaction_count(&self, account: Address, block: u64) -> Result<u64> {
        self.with_retry("eth_getTransactionCount", || {
            let provider = self.provider.clone();
            async move {
                Ok(provider
                    .get_transaction_count(account)
                    .block_id(BlockId::number(block))
                    .await?)
            }
        })
        .await
        .with_context(|| format!("Failed to read nonce of {account} at block {block}"))
    }
}

#[async_trait]
impl BlockReader for RpcReader {
    async fn latest_block(&self) -> Result<u64> {
        self.with_retry("eth_blockNumber", || {
            let provider = self.provider.clone();
            async move { Ok(provider.get_block_number().await?) }
        })
        .await
    }

    async fn block_timestamp(&self, block: u64) -> Result<DateTime<Utc>> {
        let header = self
            .with_retry("eth_getBlockByNumber", || {
                let provider = self.provider.clone();
                async move {
                    Ok(provider
                        .get_block_by_number(BlockNumberOrTag::Number(block))
                        .await?)
                }
            })
            .await?
            .with_context(|| format!("Block {block} not found"))?
            .header;

        let timestamp = i64::try_from(header.timestamp).context("Block timestamp overflow")?;
        DateTime::from_timestamp(timestamp, 0)
            .with_context(|| format!("Block {block} has invalid timestamp {timestamp}"))
    }
}

/// Exponential backoff before retry number `attempt + 1`, capped at [`MAX_RETRY_DELAY`].
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2_u64.checked_pow(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor)).min(MAX_RETRY_DELAY)
}
