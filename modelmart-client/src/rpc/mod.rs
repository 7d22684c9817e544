//! JSON-RPC backend for the collaborator traits.
//!
//! One [`RpcTransport`] is shared by the wallet and both contracts. The node's
//! unlocked accounts act as the wallet: `eth_sendTransaction` is signed by
//! the node, so the client never holds key material.

mod contracts;
mod wallet;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Bytes, U64};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use crate::error::ClientError;
use crate::ledger::ReceiptSource;
use crate::types::{Address, LogEntry, Receipt, TxHash};
use crate::Result;

pub use contracts::{RpcMarketplace, RpcToken};
pub use wallet::RpcWallet;

/// Provider error code for a request the user declined.
const USER_REJECTED: i64 = 4001;
/// Node error code for an execution revert.
const EXECUTION_REVERTED: i64 = 3;
/// JSON-RPC error code for an unknown method.
const METHOD_NOT_FOUND: i64 = -32601;

/// Unclassified failure of a single JSON-RPC request.
#[derive(Debug, Error)]
pub(crate) enum RpcFailure {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("node error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    #[error("invalid response: {0}")]
    Decode(String),
}

impl RpcFailure {
    pub(crate) fn is_method_not_found(&self) -> bool {
        matches!(self, Self::Rpc { code, .. } if *code == METHOD_NOT_FOUND)
    }

    /// Classification for read calls.
    pub(crate) fn into_read_error(self) -> ClientError {
        ClientError::Rpc(self.to_string())
    }

    /// Classification for account authorization.
    pub(crate) fn into_wallet_error(self) -> ClientError {
        match self {
            Self::Rpc { code, message, .. } if code == USER_REJECTED => {
                ClientError::UserRejected(message)
            }
            other => ClientError::ConnectionError(other.to_string()),
        }
    }

    /// Classification for transaction submission.
    pub(crate) fn into_write_error(self, action: &str) -> ClientError {
        match self {
            Self::Rpc { code, message, .. } if code == USER_REJECTED => {
                ClientError::TransactionRejected(message)
            }
            Self::Rpc { code, message, .. }
                if code == EXECUTION_REVERTED || message.to_lowercase().contains("revert") =>
            {
                ClientError::TransactionReverted {
                    action: action.to_string(),
                    hash: None,
                    reason: message,
                }
            }
            other => ClientError::Rpc(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl JsonRpcResponse {
    fn into_result<R: DeserializeOwned>(self) -> std::result::Result<R, RpcFailure> {
        if let Some(error) = self.error {
            return Err(RpcFailure::Rpc {
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }
        serde_json::from_value(self.result.unwrap_or(Value::Null))
            .map_err(|e| RpcFailure::Decode(e.to_string()))
    }
}

/// HTTP JSON-RPC connection to an Ethereum node.
#[derive(Debug)]
pub struct RpcTransport {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcTransport {
    /// Create a transport for `url`. No request is made until first use.
    ///
    /// # Errors
    ///
    /// Returns `Rpc` if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ClientError::Rpc(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    pub(crate) async fn request<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> std::result::Result<R, RpcFailure> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(id, method, "JSON-RPC request");

        let response = self
            .http
            .post(&self.url)
            .json(&JsonRpcRequest {
                jsonrpc: "2.0",
                id,
                method,
                params,
            })
            .send()
            .await
            .map_err(|e| RpcFailure::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RpcFailure::Transport(format!(
                "HTTP {} from {}",
                response.status(),
                self.url
            )));
        }

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| RpcFailure::Decode(e.to_string()))?;
        body.into_result()
    }

    /// `eth_call` against the latest block.
    pub(crate) async fn call(
        &self,
        to: Address,
        data: Bytes,
    ) -> std::result::Result<Bytes, RpcFailure> {
        self.request("eth_call", json!([{ "to": to, "data": data }, "latest"]))
            .await
    }

    /// `eth_sendTransaction` signed by the node for `from`.
    pub(crate) async fn send_transaction(
        &self,
        from: Address,
        to: Address,
        data: Bytes,
    ) -> std::result::Result<TxHash, RpcFailure> {
        self.request(
            "eth_sendTransaction",
            json!([{ "from": from, "to": to, "data": data }]),
        )
        .await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptJson {
    transaction_hash: TxHash,
    #[serde(default)]
    block_number: Option<U64>,
    /// Absent on pre-Byzantium nodes, which never report reverts here.
    #[serde(default)]
    status: Option<U64>,
    #[serde(default)]
    logs: Vec<LogEntry>,
}

impl From<ReceiptJson> for Receipt {
    fn from(raw: ReceiptJson) -> Self {
        Self {
            hash: raw.transaction_hash,
            block_number: raw.block_number.and_then(|n| u64::try_from(n).ok()),
            success: raw.status.is_none_or(|status| status != U64::ZERO),
            logs: raw.logs,
        }
    }
}

impl ReceiptSource for RpcTransport {
    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<Receipt>> {
        let receipt: Option<ReceiptJson> = self
            .request("eth_getTransactionReceipt", json!([hash]))
            .await
            .map_err(RpcFailure::into_read_error)?;
        Ok(receipt.map(Receipt::from))
    }
}
