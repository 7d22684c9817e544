//! Token balance reads.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::ledger::TokenContract;
use crate::types::{Address, BalanceSnapshot};
use crate::units::TokenAmount;
use crate::Result;

/// Reads balances from the token contract and keeps the latest snapshot.
///
/// Reads need no signing capability and are safe to repeat.
pub struct BalanceReader<T> {
    token: Arc<T>,
    latest: RwLock<Option<BalanceSnapshot>>,
}

impl<T: TokenContract> BalanceReader<T> {
    pub fn new(token: Arc<T>) -> Self {
        Self {
            token,
            latest: RwLock::new(None),
        }
    }

    /// Read the balance of `account` without touching the cached snapshot.
    ///
    /// # Errors
    ///
    /// Returns `Rpc` if the token contract cannot be queried.
    pub async fn read_balance(&self, account: Address) -> Result<TokenAmount> {
        let raw = self.token.balance_of(account).await?;
        debug!(%account, %raw, "Read token balance");
        Ok(TokenAmount::from_raw(raw))
    }

    /// Re-read the balance and replace the cached snapshot.
    ///
    /// With no account this is a no-op returning `Ok(None)`. On failure the
    /// previous snapshot is kept.
    ///
    /// # Errors
    ///
    /// Returns `Rpc` if the token contract cannot be queried.
    pub async fn refresh(&self, account: Option<Address>) -> Result<Option<BalanceSnapshot>> {
        let Some(account) = account else {
            return Ok(None);
        };

        let amount = self.read_balance(account).await?;
        let snapshot = BalanceSnapshot { account, amount };
        *self.latest.write().await = Some(snapshot);
        info!(%account, balance = %amount, "Balance refreshed");
        Ok(Some(snapshot))
    }

    /// The last successfully read snapshot.
    pub async fn latest(&self) -> Option<BalanceSnapshot> {
        *self.latest.read().await
    }
}
