//! A two-asset 50/50 curve pool with numeraire accounting.
//!
//! Internal accounting is in nano-numeraire (9 decimals). Deposit amounts
//! arrive in 18-decimal numeraire and are truncated to nano before use. Both
//! assets are valued at par, so a raw token amount converts to nano by its
//! decimal scale alone.

use serde::{Deserialize, Serialize};

use crate::ledger::{LedgerError, Token};

pub const NANO_DECIMALS: u32 = 9;
/// 18-decimal numeraire to nano.
pub const DEPOSIT_SCALE: u128 = 1_000_000_000;
/// Fixed-point scale of [`CurvePool::utility`].
pub const UTILITY_SCALE: u128 = 1_000_000_000_000;

pub const MAX_QUOTE_AMOUNT: u128 = 2_852_783_032_400_000_000_000;
pub const MAX_BASE_AMOUNT: u128 = 7_992_005_633_260_983_540_235_600_000_000;

/// How the pool converts a nano amount back into raw base/quote tokens when
/// quoting a deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rounding {
    /// Depositor pays any fraction of a raw unit.
    Up,
    /// Fractions are dropped; the pool absorbs the difference.
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),

    #[error("Curve/zero-deposit")]
    ZeroDeposit,

    #[error("Curve/{side}-amount-exceeds-max ({amount} > {max})")]
    ExceedsMax {
        side: &'static str,
        amount: u128,
        max: u128,
    },

    #[error("Curve/zero-supply")]
    ZeroSupply,
}

/// Shares minted and raw token amounts pulled for a deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositQuote {
    pub shares: u128,
    pub base: u128,
    pub quote: u128,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvePool {
    address: String,
    base: Token,
    quote: Token,
    lp: Token,
    rounding: Rounding,
    /// Extra raw base units pulled on every deposit with a base leg.
    surcharge: u128,
}

fn scale(decimals: u32) -> u128 {
    10u128.pow(NANO_DECIMALS.saturating_sub(decimals))
}

fn to_nano(raw: u128, decimals: u32) -> Result<u128, PoolError> {
    raw.checked_mul(scale(decimals))
        .ok_or(PoolError::Overflow("to_nano"))
}

fn from_nano(nano: u128, decimals: u32, rounding: Rounding) -> u128 {
    let s = scale(decimals);
    match rounding {
        Rounding::Down => nano / s,
        Rounding::Up => nano.div_ceil(s),
    }
}

fn mul_div(a: u128, b: u128, d: u128, what: &'static str) -> Result<u128, PoolError> {
    a.checked_mul(b)
        .map(|p| p / d)
        .ok_or(PoolError::Overflow(what))
}

impl CurvePool {
    pub fn new(
        address: impl Into<String>,
        base: Token,
        quote: Token,
        rounding: Rounding,
        surcharge: u128,
    ) -> Self {
        let address = address.into();
        let lp = Token::new("DFX-LP", address.clone(), 18);
        Self {
            address,
            base,
            quote,
            lp,
            rounding,
            surcharge,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn base(&self) -> &Token {
        &self.base
    }

    pub fn quote(&self) -> &Token {
        &self.quote
    }

    pub fn base_mut(&mut self) -> &mut Token {
        &mut self.base
    }

    pub fn quote_mut(&mut self) -> &mut Token {
        &mut self.quote
    }

    pub fn rounding(&self) -> Rounding {
        self.rounding
    }

    pub fn total_supply(&self) -> u128 {
        self.lp.total_supply()
    }

    pub fn balance_of(&self, account: &str) -> u128 {
        self.lp.balance_of(account)
    }

    /// Mint reserves straight into the pool and shares to `provider`, one
    /// share per nano of value.
    pub fn seed_liquidity(
        &mut self,
        provider: &str,
        base_raw: u128,
        quote_raw: u128,
    ) -> Result<u128, PoolError> {
        let addr = self.address.clone();
        self.base.mint(&addr, base_raw)?;
        self.quote.mint(&addr, quote_raw)?;
        let value = to_nano(base_raw, self.base.decimals())?
            .checked_add(to_nano(quote_raw, self.quote.decimals())?)
            .ok_or(PoolError::Overflow("seed_liquidity"))?;
        self.lp.mint(provider, value)?;
        Ok(value)
    }

    /// Value of the pool's reserves in nano-numeraire.
    pub fn numeraire_total(&self) -> Result<u128, PoolError> {
        let base = to_nano(self.base.balance_of(&self.address), self.base.decimals())?;
        let quote = to_nano(self.quote.balance_of(&self.address), self.quote.decimals())?;
        base.checked_add(quote)
            .ok_or(PoolError::Overflow("numeraire_total"))
    }

    /// Shares and tokens for depositing `amount` (18-decimal numeraire), split
    /// evenly between the two assets. Excludes the surcharge.
    pub fn view_deposit(&self, amount: u128) -> Result<DepositQuote, PoolError> {
        let value = amount / DEPOSIT_SCALE;
        if value == 0 {
            return Err(PoolError::ZeroDeposit);
        }

        let supply = self.total_supply();
        let shares = if supply == 0 {
            value
        } else {
            let total = self.numeraire_total()?;
            if total == 0 {
                return Err(PoolError::ZeroSupply);
            }
            mul_div(value, supply, total, "view_deposit")?
        };

        let base_value = value / 2;
        let quote_value = value - base_value;
        Ok(DepositQuote {
            shares,
            base: from_nano(base_value, self.base.decimals(), self.rounding),
            quote: from_nano(quote_value, self.quote.decimals(), self.rounding),
        })
    }

    /// Pull tokens from `actor` (who must have approved the pool) and mint
    /// shares.
    pub fn deposit(
        &mut self,
        actor: &str,
        amount: u128,
        max_quote: u128,
        max_base: u128,
    ) -> Result<DepositQuote, PoolError> {
        let quote = self.view_deposit(amount)?;
        let base_pull = if quote.base > 0 {
            quote
                .base
                .checked_add(self.surcharge)
                .ok_or(PoolError::Overflow("deposit"))?
        } else {
            0
        };
        if base_pull > max_base {
            return Err(PoolError::ExceedsMax {
                side: "base",
                amount: base_pull,
                max: max_base,
            });
        }
        if quote.quote > max_quote {
            return Err(PoolError::ExceedsMax {
                side: "quote",
                amount: quote.quote,
                max: max_quote,
            });
        }

        let pool = self.address.clone();
        if base_pull > 0 {
            self.base.transfer_from(&pool, actor, &pool, base_pull)?;
        }
        if quote.quote > 0 {
            self.quote.transfer_from(&pool, actor, &pool, quote.quote)?;
        }
        self.lp.mint(actor, quote.shares)?;

        Ok(DepositQuote {
            base: base_pull,
            ..quote
        })
    }

    /// Burn `shares` from `actor` and pay out both reserves pro rata, rounded
    /// down. Returns the raw (base, quote) paid.
    pub fn withdraw(&mut self, actor: &str, shares: u128) -> Result<(u128, u128), PoolError> {
        let supply = self.total_supply();
        if supply == 0 {
            return Err(PoolError::ZeroSupply);
        }
        let pool = self.address.clone();
        let base_out = mul_div(self.base.balance_of(&pool), shares, supply, "withdraw")?;
        let quote_out = mul_div(self.quote.balance_of(&pool), shares, supply, "withdraw")?;

        self.lp.burn(actor, shares)?;
        self.base.transfer(&pool, actor, base_out)?;
        self.quote.transfer(&pool, actor, quote_out)?;
        Ok((base_out, quote_out))
    }

    /// Per-share value of the reserves, `total * 1e12 / supply`.
    pub fn utility(&self) -> Result<u128, PoolError> {
        let supply = self.total_supply();
        if supply == 0 {
            return Err(PoolError::ZeroSupply);
        }
        mul_div(self.numeraire_total()?, UTILITY_SCALE, supply, "utility")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACTOR: &str = "actor";

    fn pool(rounding: Rounding, surcharge: u128) -> CurvePool {
        let mut p = CurvePool::new(
            "pool",
            Token::new("EURS", "0xeurs", 2),
            Token::new("USDC", "0xusdc", 6),
            rounding,
            surcharge,
        );
        p.seed_liquidity("genesis", 500_000_000, 5_000_000_000_000)
            .unwrap();
        p
    }

    fn fund(p: &mut CurvePool, base: u128, quote: u128) {
        p.base_mut().mint(ACTOR, base).unwrap();
        p.quote_mut().mint(ACTOR, quote).unwrap();
        p.base_mut().approve(ACTOR, "pool", base);
        p.quote_mut().approve(ACTOR, "pool", quote);
    }

    #[test]
    fn test_seeded_pool_is_at_par() {
        let p = pool(Rounding::Up, 0);
        assert_eq!(p.numeraire_total().unwrap(), 10_000_000_000_000_000);
        assert_eq!(p.total_supply(), 10_000_000_000_000_000);
        assert_eq!(p.utility().unwrap(), UTILITY_SCALE);
    }

    #[test]
    fn test_view_deposit_rounding() {
        // 25.123456789123 numeraire: 12.5617... per side.
        let amount = 25_123_456_789_123_000_000u128;
        let up = pool(Rounding::Up, 0).view_deposit(amount).unwrap();
        let down = pool(Rounding::Down, 0).view_deposit(amount).unwrap();

        assert_eq!(up.shares, 25_123_456_789);
        assert_eq!(up.base, 1257);
        assert_eq!(down.base, 1256);
        assert_eq!(up.quote, 12_561_729);
        assert_eq!(down.quote, 12_561_728);
    }

    #[test]
    fn test_deposit_rounding_up_keeps_utility() {
        let mut p = pool(Rounding::Up, 0);
        fund(&mut p, 1_000_000, 1_000_000_000);
        let before = p.utility().unwrap();
        p.deposit(ACTOR, 25_123_456_789_123_000_000, MAX_QUOTE_AMOUNT, MAX_BASE_AMOUNT)
            .unwrap();
        assert!(p.utility().unwrap() >= before);
    }

    #[test]
    fn test_deposit_rounding_down_loses_utility() {
        let mut p = pool(Rounding::Down, 0);
        fund(&mut p, 1_000_000, 1_000_000_000);
        let before = p.utility().unwrap();
        p.deposit(ACTOR, 25_123_456_789_123_000_000, MAX_QUOTE_AMOUNT, MAX_BASE_AMOUNT)
            .unwrap();
        assert!(p.utility().unwrap() < before);
    }

    #[test]
    fn test_surcharge_requires_allowance() {
        let mut p = pool(Rounding::Down, 100);
        let q = p.view_deposit(25_123_456_789_123_000_000).unwrap();
        p.base_mut().mint(ACTOR, q.base + 100).unwrap();
        p.quote_mut().mint(ACTOR, q.quote).unwrap();
        p.base_mut().approve(ACTOR, "pool", q.base);
        p.quote_mut().approve(ACTOR, "pool", q.quote);

        let err = p
            .deposit(ACTOR, 25_123_456_789_123_000_000, MAX_QUOTE_AMOUNT, MAX_BASE_AMOUNT)
            .unwrap_err();
        assert!(matches!(
            err,
            PoolError::Ledger(LedgerError::InsufficientAllowance { .. })
        ));

        p.base_mut().approve(ACTOR, "pool", q.base + 100);
        let before = p.utility().unwrap();
        let paid = p
            .deposit(ACTOR, 25_123_456_789_123_000_000, MAX_QUOTE_AMOUNT, MAX_BASE_AMOUNT)
            .unwrap();
        assert_eq!(paid.base, q.base + 100);
        assert!(p.utility().unwrap() >= before);
    }

    #[test]
    fn test_withdraw_pays_pro_rata() {
        let mut p = pool(Rounding::Up, 0);
        fund(&mut p, 1_000_000, 1_000_000_000);
        let q = p
            .deposit(ACTOR, 100_000_000_000_000_000_000, MAX_QUOTE_AMOUNT, MAX_BASE_AMOUNT)
            .unwrap();
        let before = p.utility().unwrap();

        let (base, quote) = p.withdraw(ACTOR, q.shares / 2).unwrap();
        assert!(base > 0 && quote > 0);
        assert_eq!(p.balance_of(ACTOR), q.shares - q.shares / 2);
        assert!(p.utility().unwrap() >= before);
    }

    #[test]
    fn test_withdraw_more_than_owned_fails() {
        let mut p = pool(Rounding::Up, 0);
        assert!(p.withdraw(ACTOR, 1).is_err());
    }

    #[test]
    fn test_zero_deposit_rejected() {
        let p = pool(Rounding::Up, 0);
        assert_eq!(p.view_deposit(999_999_999), Err(PoolError::ZeroDeposit));
    }
}
