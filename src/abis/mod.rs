//! Contract bindings generated with `alloy::sol!`.

pub mod erc20;
pub mod multicall;
pub mod position_manager;
pub mod v3;

pub use erc20::IERC20Metadata;
pub use multicall::{Call3, IMulticall3};
pub use position_manager::{CollectParams, INonfungiblePositionManager};
pub use v3::{IUniswapV3Factory, IUniswapV3Pool};
