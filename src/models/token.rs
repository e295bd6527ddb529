use std::hash::{Hash, Hasher};

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

/// ERC-20 token metadata.
///
/// Identity is `(chain_id, address)`; symbol, name and decimals are descriptive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub chain_id: u64,
    pub address: Address,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

impl Token {
    pub fn new(chain_id: u64, address: Address, symbol: String, name: String, decimals: u8) -> Self {
        Self {
            chain_id,
            address,
            symbol,
            name,
            decimals,
        }
    }

    /// Canonical pair ordering: the token with the lower address is token0.
    pub fn sorts_before(&self, other: &Token) -> bool {
        self.address < other.address
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.chain_id == other.chain_id && self.address == other.address
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.chain_id.hash(state);
        self.address.hash(state);
    }
}
