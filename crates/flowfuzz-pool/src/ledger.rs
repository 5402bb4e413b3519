//! ERC-20 style token balances and allowances.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("{symbol}: transfer amount exceeds balance of {account} ({available} < {needed})")]
    InsufficientBalance {
        symbol: String,
        account: String,
        needed: u128,
        available: u128,
    },

    #[error("{symbol}: insufficient allowance for {spender} on {owner} ({available} < {needed})")]
    InsufficientAllowance {
        symbol: String,
        owner: String,
        spender: String,
        needed: u128,
        available: u128,
    },

    #[error("{symbol}: supply overflow")]
    Overflow { symbol: String },
}

/// One token's balances, keyed by account address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    symbol: String,
    address: String,
    decimals: u32,
    total_supply: u128,
    balances: BTreeMap<String, u128>,
    /// owner -> spender -> amount
    allowances: BTreeMap<String, BTreeMap<String, u128>>,
}

impl Token {
    pub fn new(symbol: impl Into<String>, address: impl Into<String>, decimals: u32) -> Self {
        Self {
            symbol: symbol.into(),
            address: address.into(),
            decimals,
            total_supply: 0,
            balances: BTreeMap::new(),
            allowances: BTreeMap::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    pub fn balance_of(&self, account: &str) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: &str, spender: &str) -> u128 {
        self.allowances
            .get(owner)
            .and_then(|s| s.get(spender))
            .copied()
            .unwrap_or(0)
    }

    pub fn mint(&mut self, to: &str, amount: u128) -> Result<(), LedgerError> {
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or_else(|| self.overflow())?;
        self.total_supply = supply;
        *self.balances.entry(to.to_string()).or_insert(0) += amount;
        Ok(())
    }

    pub fn burn(&mut self, from: &str, amount: u128) -> Result<(), LedgerError> {
        self.debit(from, amount)?;
        self.total_supply -= amount;
        Ok(())
    }

    pub fn transfer(&mut self, from: &str, to: &str, amount: u128) -> Result<(), LedgerError> {
        self.debit(from, amount)?;
        *self.balances.entry(to.to_string()).or_insert(0) += amount;
        Ok(())
    }

    /// Sets, not adds.
    pub fn approve(&mut self, owner: &str, spender: &str, amount: u128) {
        self.allowances
            .entry(owner.to_string())
            .or_default()
            .insert(spender.to_string(), amount);
    }

    /// Allowance is checked and spent before the balance moves.
    pub fn transfer_from(
        &mut self,
        spender: &str,
        from: &str,
        to: &str,
        amount: u128,
    ) -> Result<(), LedgerError> {
        let available = self.allowance(from, spender);
        if available < amount {
            return Err(LedgerError::InsufficientAllowance {
                symbol: self.symbol.clone(),
                owner: from.to_string(),
                spender: spender.to_string(),
                needed: amount,
                available,
            });
        }
        self.transfer(from, to, amount)?;
        self.approve(from, spender, available - amount);
        Ok(())
    }

    fn debit(&mut self, account: &str, amount: u128) -> Result<(), LedgerError> {
        let available = self.balance_of(account);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                symbol: self.symbol.clone(),
                account: account.to_string(),
                needed: amount,
                available,
            });
        }
        self.balances.insert(account.to_string(), available - amount);
        Ok(())
    }

    fn overflow(&self) -> LedgerError {
        LedgerError::Overflow {
            symbol: self.symbol.clone(),
        }
    }
}
