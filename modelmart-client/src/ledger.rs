//! Collaborator interfaces: the wallet, the two contracts and receipt lookup.
//!
//! Implementations classify their own failures:
//! - `Wallet` fails with `UserRejected` or `ConnectionError`.
//! - Reads fail with `Rpc`.
//! - Writes fail with `TransactionRejected`, `TransactionReverted` or `Rpc`.

use std::future::Future;

use alloy_primitives::U256;

use crate::types::{Address, ListingDraft, ListingId, Receipt, Signer, TxHash};
use crate::Result;

/// Account authorization.
pub trait Wallet: Send + Sync {
    /// Requests the accounts the user authorizes. May wait on the user.
    fn request_accounts(&self) -> impl Future<Output = Result<Vec<Address>>> + Send;
}

/// The fungible token contract.
pub trait TokenContract: Send + Sync {
    /// Deployed address of the token.
    fn address(&self) -> Address;

    fn balance_of(&self, owner: Address) -> impl Future<Output = Result<U256>> + Send;

    fn allowance(
        &self,
        owner: Address,
        spender: Address,
    ) -> impl Future<Output = Result<U256>> + Send;

    /// Submits `approve(spender, amount)` from the signer's account.
    fn approve(
        &self,
        signer: &Signer,
        spender: Address,
        amount: U256,
    ) -> impl Future<Output = Result<TxHash>> + Send;
}

/// A listing exactly as the marketplace contract returns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRecord {
    pub id: U256,
    pub model_name: String,
    pub description: String,
    pub model_link: String,
    pub price: U256,
    pub seller: Address,
    pub sold: bool,
}

/// The marketplace contract.
pub trait MarketplaceContract: Send + Sync {
    /// Deployed address of the marketplace, the spender for approvals.
    fn address(&self) -> Address;

    /// Every listing, in contract order.
    fn get_all_listings(&self) -> impl Future<Output = Result<Vec<ListingRecord>>> + Send;

    /// Submits `createListing` from the signer's account.
    fn create_listing(
        &self,
        signer: &Signer,
        draft: &ListingDraft,
    ) -> impl Future<Output = Result<TxHash>> + Send;

    /// Submits `purchaseModel` from the signer's account.
    fn purchase_model(
        &self,
        signer: &Signer,
        listing_id: ListingId,
    ) -> impl Future<Output = Result<TxHash>> + Send;

    /// Extracts the id of a listing created by a confirmed transaction, if the
    /// receipt carries it.
    fn created_listing_id(&self, receipt: &Receipt) -> Option<ListingId>;
}

/// Lookup of mined transactions.
pub trait ReceiptSource: Send + Sync {
    /// Returns `None` while the transaction is still pending.
    fn transaction_receipt(
        &self,
        hash: TxHash,
    ) -> impl Future<Output = Result<Option<Receipt>>> + Send;
}
