use std::sync::Arc;

use alloy_primitives::{Bytes, U256};
use alloy_sol_types::{SolCall, SolEvent};

use super::{RpcFailure, RpcTransport};
use crate::abi::{IModelMarketplace, IModelToken};
use crate::error::ClientError;
use crate::ledger::{ListingRecord, MarketplaceContract, TokenContract};
use crate::types::{Address, ListingDraft, ListingId, LogEntry, Receipt, Signer, TxHash};
use crate::Result;

fn decode_error(call: &str, e: alloy_sol_types::Error) -> ClientError {
    ClientError::Rpc(format!("failed to decode {call} result: {e}"))
}

/// The token contract at a fixed address.
#[derive(Debug, Clone)]
pub struct RpcToken {
    transport: Arc<RpcTransport>,
    address: Address,
}

impl RpcToken {
    pub fn new(transport: Arc<RpcTransport>, address: Address) -> Self {
        Self { transport, address }
    }

    async fn read<C: SolCall>(&self, call: C) -> Result<C::Return> {
        let output = self
            .transport
            .call(self.address, Bytes::from(call.abi_encode()))
            .await
            .map_err(RpcFailure::into_read_error)?;
        C::abi_decode_returns(&output).map_err(|e| decode_error(C::SIGNATURE, e))
    }
}

impl TokenContract for RpcToken {
    fn address(&self) -> Address {
        self.address
    }

    async fn balance_of(&self, owner: Address) -> Result<U256> {
        self.read(IModelToken::balanceOfCall { account: owner })
            .await
    }

    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256> {
        self.read(IModelToken::allowanceCall { owner, spender })
            .await
    }

    async fn approve(&self, signer: &Signer, spender: Address, amount: U256) -> Result<TxHash> {
        let call = IModelToken::approveCall { spender, amount };
        self.transport
            .send_transaction(signer.address(), self.address, Bytes::from(call.abi_encode()))
            .await
            .map_err(|f| f.into_write_error("approve"))
    }
}

/// The marketplace contract at a fixed address.
#[derive(Debug, Clone)]
pub struct RpcMarketplace {
    transport: Arc<RpcTransport>,
    address: Address,
}

impl RpcMarketplace {
    pub fn new(transport: Arc<RpcTransport>, address: Address) -> Self {
        Self { transport, address }
    }

    async fn submit<C: SolCall>(&self, signer: &Signer, action: &str, call: C) -> Result<TxHash> {
        self.transport
            .send_transaction(signer.address(), self.address, Bytes::from(call.abi_encode()))
            .await
            .map_err(|f| f.into_write_error(action))
    }
}

impl MarketplaceContract for RpcMarketplace {
    fn address(&self) -> Address {
        self.address
    }

    async fn get_all_listings(&self) -> Result<Vec<ListingRecord>> {
        let call = IModelMarketplace::getAllListingsCall {};
        let output = self
            .transport
            .call(self.address, Bytes::from(call.abi_encode()))
            .await
            .map_err(RpcFailure::into_read_error)?;
        let listings = IModelMarketplace::getAllListingsCall::abi_decode_returns(&output)
            .map_err(|e| decode_error(IModelMarketplace::getAllListingsCall::SIGNATURE, e))?;

        Ok(listings
            .into_iter()
            .map(|l| ListingRecord {
                id: l.id,
                model_name: l.modelName,
                description: l.description,
                model_link: l.modelLink,
                price: l.price,
                seller: l.seller,
                sold: l.sold,
            })
            .collect())
    }

    async fn create_listing(&self, signer: &Signer, draft: &ListingDraft) -> Result<TxHash> {
        let call = IModelMarketplace::createListingCall {
            modelName: draft.model_name.clone(),
            description: draft.description.clone(),
            modelLink: draft.model_link.clone(),
            price: draft.price.raw(),
        };
        self.submit(signer, "createListing", call).await
    }

    async fn purchase_model(&self, signer: &Signer, listing_id: ListingId) -> Result<TxHash> {
        let call = IModelMarketplace::purchaseModelCall {
            listingId: listing_id.to_raw(),
        };
        self.submit(signer, "purchaseModel", call).await
    }

    fn created_listing_id(&self, receipt: &Receipt) -> Option<ListingId> {
        listing_id_from_logs(self.address, &receipt.logs)
    }
}

/// Id carried by the first `ListingCreated` event the marketplace emitted.
fn listing_id_from_logs(marketplace: Address, logs: &[LogEntry]) -> Option<ListingId> {
    logs.iter()
        .filter(|log| log.address == marketplace)
        .filter(|log| log.topics.first() == Some(&IModelMarketplace::ListingCreated::SIGNATURE_HASH))
        .find_map(|log| log.topics.get(1))
        .map(|topic| ListingId::from_raw(U256::from_be_bytes(topic.0)))
}
