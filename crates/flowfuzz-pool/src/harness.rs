//! The pool as a system under test: `deposit` and `withdraw` flows plus the
//! `utility` invariant.

use flowfuzz_gen::{ArgSpec, Args};
use flowfuzz_model::{
    FlowDef, FuzzPlan, InvariantDef, Observed, PlanError, StateSnapshot, SutError,
    SystemUnderTest,
};
use serde_json::json;
use tracing::{debug, info};

use crate::chain::ChainConfig;
use crate::ledger::Token;
use crate::pool::{CurvePool, PoolError, MAX_BASE_AMOUNT, MAX_QUOTE_AMOUNT};

/// The account every flow acts as.
pub const ACTOR: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
/// Holder of the shares minted for the initial reserves.
pub const GENESIS_LP: &str = "0x000000000000000000000000000000000000dEaD";

/// 5M EURS and 5M USDC, raw.
pub const INITIAL_BASE_RESERVE: u128 = 500_000_000;
pub const INITIAL_QUOTE_RESERVE: u128 = 5_000_000_000_000;

const WHALE_BASE: u128 = 10_000_000_000;
const WHALE_QUOTE: u128 = 100_000_000_000_000;

/// Deposit amounts, 18-decimal numeraire: 20 to 200 units.
pub const MIN_DEPOSIT: i128 = 20_000_000_000_000_000_000;
pub const MAX_DEPOSIT: i128 = 200_000_000_000_000_000_000;
pub const DEPOSIT_EDGE_BIAS: f64 = 0.05;

const PPB: u128 = 1_000_000_000;

impl From<PoolError> for SutError {
    fn from(err: PoolError) -> Self {
        SutError::new(err.to_string())
    }
}

pub struct PoolHarness {
    chain: ChainConfig,
    pool: CurvePool,
    actor: String,
    utility_deployed: bool,
}

impl PoolHarness {
    /// Fresh pool state at the chain's fork block.
    pub fn fork(chain: ChainConfig) -> Result<Self, PoolError> {
        let mut base = Token::new(&chain.base.symbol, &chain.base.address, chain.base.decimals);
        base.mint(&chain.base_whale, WHALE_BASE)?;
        let mut quote = Token::new(
            &chain.quote.symbol,
            &chain.quote.address,
            chain.quote.decimals,
        );
        quote.mint(&chain.quote_whale, WHALE_QUOTE)?;

        let mut pool = CurvePool::new(&chain.pool, base, quote, chain.rounding, chain.surcharge);
        pool.seed_liquidity(GENESIS_LP, INITIAL_BASE_RESERVE, INITIAL_QUOTE_RESERVE)?;
        debug!(chain = %chain.name, fork = %chain.fork_spec(), "pool forked");

        Ok(Self {
            chain,
            pool,
            actor: ACTOR.to_string(),
            utility_deployed: false,
        })
    }

    pub fn chain(&self) -> &ChainConfig {
        &self.chain
    }

    pub fn pool(&self) -> &CurvePool {
        &self.pool
    }

    /// Quote the deposit, fund and approve the actor as needed, then deposit.
    pub fn deposit(&mut self, amount: u128) -> Result<StateSnapshot, SutError> {
        let actor = self.actor.clone();
        let spender = self.pool.address().to_string();
        let quote = self.pool.view_deposit(amount)?;

        if quote.base > 0 {
            let send = quote
                .base
                .checked_add(self.chain.add)
                .ok_or(PoolError::Overflow("deposit"))?;
            let held = self.pool.base().balance_of(&actor);
            if held < send {
                let whale = self.chain.base_whale.clone();
                self.pool
                    .base_mut()
                    .transfer(&whale, &actor, send - held)
                    .map_err(PoolError::from)?;
            }
            self.pool.base_mut().approve(&actor, &spender, send);
        }
        if quote.quote > 0 {
            if self.pool.quote().balance_of(&actor) < quote.quote {
                let whale = self.chain.quote_whale.clone();
                self.pool
                    .quote_mut()
                    .transfer(&whale, &actor, quote.quote)
                    .map_err(PoolError::from)?;
            }
            self.pool.quote_mut().approve(&actor, &spender, quote.quote);
        }

        let paid = self
            .pool
            .deposit(&actor, amount, MAX_QUOTE_AMOUNT, MAX_BASE_AMOUNT)?;
        debug!(
            shares = paid.shares,
            base = paid.base,
            quote = paid.quote,
            "deposited"
        );
        Ok(self.state())
    }

    /// Withdraw `percent` of the actor's shares. A zero share amount is a
    /// no-op.
    pub fn withdraw(&mut self, percent: f64) -> Result<StateSnapshot, SutError> {
        let actor = self.actor.clone();
        let balance = self.pool.balance_of(&actor);
        let ppb = (percent.clamp(0.0, 1.0) * PPB as f64) as u128;
        let shares = balance
            .checked_mul(ppb)
            .ok_or(PoolError::Overflow("withdraw"))?
            / PPB;
        if shares == 0 {
            debug!(balance, percent, "nothing to withdraw");
            return Ok(self.state());
        }

        let (base, quote) = self.pool.withdraw(&actor, shares)?;
        debug!(shares, base, quote, "withdrew");
        Ok(self.state())
    }

    /// Per-share value of the pool, fixed point.
    pub fn utility(&self) -> Result<Observed, SutError> {
        if !self.utility_deployed {
            return Err(SutError::new("utility calculator not deployed"));
        }
        let value = self.pool.utility()?;
        i128::try_from(value)
            .map(Observed::Int)
            .map_err(|_| SutError::new("utility exceeds i128"))
    }

    fn state(&self) -> StateSnapshot {
        let pool = self.pool.address();
        json!({
            "pool_base": self.pool.base().balance_of(pool).to_string(),
            "pool_quote": self.pool.quote().balance_of(pool).to_string(),
            "total_supply": self.pool.total_supply().to_string(),
            "actor_shares": self.pool.balance_of(&self.actor).to_string(),
            "actor_base": self.pool.base().balance_of(&self.actor).to_string(),
            "actor_quote": self.pool.quote().balance_of(&self.actor).to_string(),
        })
    }
}

impl SystemUnderTest for PoolHarness {
    fn pre_sequence(&mut self) -> Result<(), SutError> {
        self.utility_deployed = true;
        info!(chain = %self.chain.name, fork = %self.chain.fork_spec(), "attached to pool");
        Ok(())
    }

    fn call(&mut self, flow: &str, args: &Args) -> Result<StateSnapshot, SutError> {
        match flow {
            "deposit" => {
                let amount = u128::try_from(args.int("amount")?)
                    .map_err(|_| SutError::new("negative deposit amount"))?;
                self.deposit(amount)
            }
            "withdraw" => self.withdraw(args.float("percent")?),
            other => Err(SutError::unknown_flow(other)),
        }
    }

    fn snapshot(&self) -> StateSnapshot {
        self.state()
    }

    fn post_sequence(&mut self) {
        self.utility_deployed = false;
    }
}

/// `deposit(amount)`, `withdraw(percent)` and `utility` checked after every
/// flow.
pub fn dfx_plan() -> Result<FuzzPlan<PoolHarness>, PlanError> {
    FuzzPlan::builder()
        .flow(FlowDef::new("deposit").arg(
            "amount",
            ArgSpec::int(MIN_DEPOSIT, MAX_DEPOSIT, DEPOSIT_EDGE_BIAS),
        ))
        .flow(FlowDef::new("withdraw").arg("percent", ArgSpec::float(0.0, 1.0)))
        .invariant(InvariantDef::new("utility", |h: &PoolHarness| h.utility()).period(1))
        .build()
}

/// One fresh fork per sequence.
pub fn pool_factory(
    chain: ChainConfig,
) -> impl Fn(u32) -> Result<PoolHarness, SutError> + Sync {
    move |_index| PoolHarness::fork(chain.clone()).map_err(SutError::from)
}
