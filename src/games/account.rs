//! Player balances
//!
//! Rounds never touch money directly: the processor debits the stake before a
//! round exists and credits winnings at settlement through `AccountService`.

use crate::errors::AccountError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// External wallet the processor settles against
#[async_trait]
pub trait AccountService: Send + Sync {
    /// Current balance for a player
    async fn balance(&self, player_id: &str) -> Result<f64, AccountError>;

    /// Remove a stake; fails without side effects when funds are short
    async fn debit(&self, player_id: &str, amount: f64) -> Result<f64, AccountError>;

    /// Add winnings and return the new balance
    async fn credit(&self, player_id: &str, amount: f64) -> Result<f64, AccountError>;
}

/// Thread-safe in-memory wallet
#[derive(Debug, Clone, Default)]
pub struct InMemoryAccounts {
    balances: Arc<DashMap<String, f64>>,
}

impl InMemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open or top up an account
    pub fn deposit(&self, player_id: &str, amount: f64) {
        *self.balances.entry(player_id.to_string()).or_insert(0.0) += amount;
    }

    pub fn player_count(&self) -> usize {
        self.balances.len()
    }
}

#[async_trait]
impl AccountService for InMemoryAccounts {
    async fn balance(&self, player_id: &str) -> Result<f64, AccountError> {
        self.balances
            .get(player_id)
            .map(|b| *b)
            .ok_or_else(|| AccountError::UnknownPlayer(player_id.to_string()))
    }

    async fn debit(&self, player_id: &str, amount: f64) -> Result<f64, AccountError> {
        let mut balance = self
            .balances
            .get_mut(player_id)
            .ok_or_else(|| AccountError::UnknownPlayer(player_id.to_string()))?;

        if *balance < amount {
            return Err(AccountError::InsufficientBalance {
                required: amount,
                available: *balance,
            });
        }

        *balance -= amount;
        debug!("Debited {} from {}, balance {}", amount, player_id, *balance);
        Ok(*balance)
    }

    async fn credit(&self, player_id: &str, amount: f64) -> Result<f64, AccountError> {
        let mut balance = self
            .balances
            .get_mut(player_id)
            .ok_or_else(|| AccountError::UnknownPlayer(player_id.to_string()))?;

        *balance += amount;
        debug!("Credited {} to {}, balance {}", amount, player_id, *balance);
        Ok(*balance)
    }
}
