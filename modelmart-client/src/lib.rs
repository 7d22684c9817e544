//! Modelmart client - a ledger-backed model marketplace client
//!
//! Connects to a wallet, reads the token balance and the listing catalog, and
//! submits listing and purchase transactions against two deployed contracts:
//! a fungible token and a marketplace that escrows model listings.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     MarketplaceClient                        │
//! │  ┌──────────────┐  ┌───────────────┐  ┌───────────────────┐  │
//! │  │   Session    │  │ BalanceReader │  │  ListingCatalog   │  │
//! │  │   Manager    │  │               │  │                   │  │
//! │  └──────────────┘  └───────────────┘  └───────────────────┘  │
//! │  ┌────────────────────────┐  ┌────────────────────────────┐  │
//! │  │   ListingPublisher     │  │   PurchaseCoordinator      │  │
//! │  └────────────────────────┘  └────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//!         │              │                 │             │
//!         ▼              ▼                 ▼             ▼
//!    ┌────────┐   ┌─────────────┐   ┌─────────────┐  ┌──────────┐
//!    │ Wallet │   │    Token    │   │ Marketplace │  │ Receipts │
//!    └────────┘   └─────────────┘   └─────────────┘  └──────────┘
//! ```
//!
//! The collaborators are traits in [`ledger`]. [`rpc`] implements them over
//! Ethereum JSON-RPC.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use modelmart_client::{Address, ConfirmationPolicy, ListingId, RpcClient, RpcOptions};
//!
//! # async fn example() -> modelmart_client::Result<()> {
//! let client = RpcClient::over_rpc(&RpcOptions {
//!     rpc_url: "http://127.0.0.1:8545".to_string(),
//!     token_address: Address::ZERO,
//!     marketplace_address: Address::repeat_byte(1),
//!     wallet_enabled: true,
//!     account: None,
//!     request_timeout: Duration::from_secs(30),
//!     confirmation: ConfirmationPolicy::default(),
//! })?;
//!
//! let state = client.start().await?;
//! for listing in state.catalog.available() {
//!     println!("{} {} {}", listing.id, listing.model_name, listing.price);
//! }
//! client.purchase_listing(ListingId::from(1)).await?;
//! # Ok(())
//! # }
//! ```

pub mod abi;
pub mod balance;
pub mod catalog;
pub mod client;
pub mod descriptor;
pub mod error;
pub mod ledger;
pub mod pending;
pub mod publish;
pub mod purchase;
pub mod rpc;
pub mod session;
pub mod types;
pub mod units;

#[cfg(test)]
mod mock;

pub use client::{ClientState, MarketplaceClient, RpcClient, RpcOptions};
pub use descriptor::{ContractKind, InterfaceDescriptor};
pub use error::{ClientError, ErrorKind, ValidationError};
pub use pending::{ConfirmationPolicy, PendingTransaction, TxStatus};
pub use purchase::PurchaseOutcome;
pub use types::{
    Address, BalanceSnapshot, CatalogSnapshot, Listing, ListingDraft, ListingId, Receipt, Session,
    TxHash,
};
pub use units::{DECIMALS, TokenAmount};

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
