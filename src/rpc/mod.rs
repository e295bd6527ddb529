//! Chain access over JSON-RPC with an optional request cache in front.

mod cache;
mod cached_reader;
mod client;

pub use cache::{CacheKey, RequestCache, RequestKey};
pub use cached_reader::CachedReader;
pub use client::RpcReader;
