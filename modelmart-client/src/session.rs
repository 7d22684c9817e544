//! Wallet session establishment.

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::ClientError;
use crate::ledger::Wallet;
use crate::types::{Address, Session};
use crate::Result;

/// Owns the connection to the user's wallet and the current [`Session`].
///
/// The session is the source of truth for the current account until
/// [`connect`](Self::connect) is called again. Wallet-side account switches are
/// not followed automatically.
pub struct SessionManager<W> {
    wallet: Option<W>,
    preferred_account: Option<Address>,
    current: RwLock<Session>,
}

impl<W: Wallet> SessionManager<W> {
    /// Create a manager. `None` means no wallet capability is installed.
    pub fn new(wallet: Option<W>) -> Self {
        Self {
            wallet,
            preferred_account: None,
            current: RwLock::new(Session::disconnected()),
        }
    }

    /// Select this account when the wallet authorizes several.
    #[must_use]
    pub fn with_preferred_account(mut self, account: Option<Address>) -> Self {
        self.preferred_account = account;
        self
    }

    /// Whether a wallet capability is present.
    #[must_use]
    pub fn has_wallet(&self) -> bool {
        self.wallet.is_some()
    }

    /// Request account authorization and establish a session.
    ///
    /// This may wait indefinitely for the user to approve in the wallet.
    ///
    /// # Errors
    ///
    /// - `WalletUnavailable` if no wallet capability is present
    /// - `UserRejected` if the user declines or authorizes no account
    /// - `ConnectionError` if the wallet cannot be reached or the preferred
    ///   account is not among those authorized
    pub async fn connect(&self) -> Result<Session> {
        let Some(wallet) = &self.wallet else {
            warn!("No wallet capability present");
            return Err(ClientError::WalletUnavailable);
        };

        let accounts = wallet.request_accounts().await.map_err(|e| match e {
            ClientError::UserRejected(_) | ClientError::ConnectionError(_) => e,
            other => ClientError::ConnectionError(other.to_string()),
        })?;

        let account = match self.preferred_account {
            Some(preferred) if accounts.contains(&preferred) => preferred,
            Some(preferred) => {
                return Err(ClientError::ConnectionError(format!(
                    "account {preferred} is not authorized by the wallet"
                )));
            }
            None => *accounts.first().ok_or_else(|| {
                ClientError::UserRejected("no account was authorized".to_string())
            })?,
        };

        let session = Session::connected(account);
        *self.current.write().await = session.clone();
        info!(%account, "Wallet session established");
        Ok(session)
    }

    /// The current session, disconnected if `connect` has not succeeded.
    pub async fn current(&self) -> Session {
        self.current.read().await.clone()
    }

    /// Drop the current session.
    pub async fn disconnect(&self) {
        let mut current = self.current.write().await;
        if let Some(account) = current.account() {
            info!(%account, "Wallet session closed");
        }
        *current = Session::disconnected();
    }
}
