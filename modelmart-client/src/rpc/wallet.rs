use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use super::RpcTransport;
use crate::ledger::Wallet;
use crate::types::Address;
use crate::Result;

/// Wallet backed by the node's account list.
///
/// Uses `eth_requestAccounts` and falls back to `eth_accounts` on nodes that
/// do not implement the prompt.
#[derive(Debug, Clone)]
pub struct RpcWallet {
    transport: Arc<RpcTransport>,
}

impl RpcWallet {
    pub fn new(transport: Arc<RpcTransport>) -> Self {
        Self { transport }
    }
}

impl Wallet for RpcWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>> {
        match self
            .transport
            .request("eth_requestAccounts", json!([]))
            .await
        {
            Ok(accounts) => Ok(accounts),
            Err(failure) if failure.is_method_not_found() => {
                debug!("eth_requestAccounts unsupported, falling back to eth_accounts");
                self.transport
                    .request("eth_accounts", json!([]))
                    .await
                    .map_err(|f| f.into_wallet_error())
            }
            Err(failure) => Err(failure.into_wallet_error()),
        }
    }
}
