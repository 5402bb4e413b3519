//! Chain presets: which fork, which pool, which wallets fund the actor.

use serde::{Deserialize, Serialize};

use crate::pool::Rounding;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub symbol: String,
    pub address: String,
    pub decimals: u32,
}

impl TokenInfo {
    fn new(symbol: &str, address: &str, decimals: u32) -> Self {
        Self {
            symbol: symbol.to_string(),
            address: address.to_string(),
            decimals,
        }
    }
}

/// Chain-specific parameters for a campaign against the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub name: String,
    /// Environment variable holding the RPC endpoint.
    pub rpc_env: String,
    pub fork_block: u64,
    pub pool: String,
    pub base: TokenInfo,
    pub quote: TokenInfo,
    /// Wallets the actor is funded from.
    pub base_whale: String,
    pub quote_whale: String,
    /// Extra raw base units approved on every deposit.
    pub add: u128,
    pub rounding: Rounding,
    /// Extra raw base units the pool pulls on every deposit.
    pub surcharge: u128,
}

impl ChainConfig {
    pub fn ethereum() -> Self {
        Self {
            name: "ethereum".into(),
            rpc_env: "ETH_RPC_URL".into(),
            fork_block: 17_774_255,
            pool: "0x8cd86fbC94BeBFD910CaaE7aE4CE374886132c48".into(),
            base: TokenInfo::new("EURS", "0x1aBaEA1f7C830bD89Acc67eC4af516284b1bC33c", 2),
            quote: TokenInfo::new("USDC", "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", 6),
            base_whale: "0x95DBB3C7546F22BCE375900AbFdd64a4E5bD73d6".into(),
            quote_whale: "0xBA12222222228d8Ba445958a75a0704d566BF2C8".into(),
            add: 0,
            rounding: Rounding::Up,
            surcharge: 0,
        }
    }

    /// After the fix: the pool pulls 100 extra base units per deposit.
    pub fn polygon() -> Self {
        Self {
            name: "polygon".into(),
            rpc_env: "POL_RPC_URL".into(),
            fork_block: 45_204_868,
            pool: "0x2385D7aB31F5a470B1723675846cb074988531da".into(),
            base: TokenInfo::new("EURS", "0xE111178A87A3BFf0c8d18DECBa5798827539Ae99", 2),
            quote: TokenInfo::new("USDC", "0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174", 6),
            base_whale: "0x38d693ce1df5aadf7bc62595a37d667ad57922e5".into(),
            quote_whale: "0xBA12222222228d8Ba445958a75a0704d566BF2C8".into(),
            add: 100,
            rounding: Rounding::Down,
            surcharge: 100,
        }
    }

    /// The same chain with the pre-fix pool: deposits round down and pull
    /// nothing extra.
    pub fn vulnerable(mut self) -> Self {
        self.rounding = Rounding::Down;
        self.surcharge = 0;
        self.add = 0;
        self
    }

    pub fn with_add(mut self, add: u128) -> Self {
        self.add = add;
        self
    }

    /// The RPC endpoint from the environment, if set.
    pub fn rpc_url(&self) -> Option<String> {
        std::env::var(&self.rpc_env).ok()
    }

    /// `<rpc>@<block>`, the form fork specifications take.
    pub fn fork_spec(&self) -> String {
        let rpc = self.rpc_url().unwrap_or_else(|| format!("${}", self.rpc_env));
        format!("{rpc}@{}", self.fork_block)
    }
}
