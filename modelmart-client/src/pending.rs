//! Tracking of submitted transactions until they are mined.

use std::time::Duration;

use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::ledger::ReceiptSource;
use crate::types::{Receipt, TxHash};
use crate::Result;

/// Default interval between receipt polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default time to wait for a transaction to be mined.
const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

/// How receipts are awaited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        }
    }
}

/// Lifecycle of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    Submitted,
    Confirmed(Receipt),
    Failed(String),
}

/// An in-flight transaction. Never persisted.
///
/// Once broadcast a transaction cannot be withdrawn; dropping this value only
/// stops waiting for it.
#[derive(Debug, Clone)]
pub struct PendingTransaction {
    action: &'static str,
    hash: TxHash,
    status: TxStatus,
}

impl PendingTransaction {
    /// Records a transaction accepted by the node.
    #[must_use]
    pub fn submitted(action: &'static str, hash: TxHash) -> Self {
        info!(action, %hash, "Transaction submitted");
        Self {
            action,
            hash,
            status: TxStatus::Submitted,
        }
    }

    #[must_use]
    pub fn action(&self) -> &'static str {
        self.action
    }

    #[must_use]
    pub fn hash(&self) -> TxHash {
        self.hash
    }

    #[must_use]
    pub fn status(&self) -> &TxStatus {
        &self.status
    }

    /// Waits until the transaction is mined.
    ///
    /// # Errors
    ///
    /// - `TransactionReverted` if the transaction was mined but reverted
    /// - `ConfirmationTimeout` if it was not mined within `policy.timeout`
    /// - `Rpc` if a receipt lookup fails
    pub async fn confirm<R: ReceiptSource>(
        &mut self,
        receipts: &R,
        policy: &ConfirmationPolicy,
    ) -> Result<Receipt> {
        let waited = timeout(policy.timeout, self.poll(receipts, policy.poll_interval)).await;

        let receipt = match waited {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(e)) => {
                self.status = TxStatus::Failed(e.to_string());
                return Err(e);
            }
            Err(_) => {
                let err = ClientError::ConfirmationTimeout {
                    hash: self.hash,
                    waited: policy.timeout,
                };
                warn!(action = self.action, hash = %self.hash, "Gave up waiting for confirmation");
                self.status = TxStatus::Failed(err.to_string());
                return Err(err);
            }
        };

        if !receipt.success {
            warn!(action = self.action, hash = %self.hash, "Transaction reverted");
            self.status = TxStatus::Failed("execution reverted".to_string());
            return Err(ClientError::TransactionReverted {
                action: self.action.to_string(),
                hash: Some(self.hash),
                reason: "execution reverted".to_string(),
            });
        }

        info!(
            action = self.action,
            hash = %self.hash,
            block = ?receipt.block_number,
            "Transaction confirmed"
        );
        self.status = TxStatus::Confirmed(receipt.clone());
        Ok(receipt)
    }

    async fn poll<R: ReceiptSource>(&self, receipts: &R, every: Duration) -> Result<Receipt> {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match receipts.transaction_receipt(self.hash).await? {
                Some(receipt) => return Ok(receipt),
                None => debug!(hash = %self.hash, "Transaction still pending"),
            }
        }
    }
}
