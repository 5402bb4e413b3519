//! Reference system under test: an in-memory two-asset curve pool driven by
//! deposit and withdraw flows, with a per-share utility invariant.

pub mod chain;
pub mod harness;
pub mod ledger;
pub mod pool;

pub use chain::{ChainConfig, TokenInfo};
pub use harness::{dfx_plan, pool_factory, PoolHarness};
pub use ledger::{LedgerError, Token};
pub use pool::{CurvePool, DepositQuote, PoolError, Rounding};
