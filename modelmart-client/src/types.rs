//! Core data model: listing ids, listings, drafts, sessions and receipts.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::{Bytes, B256, U256};
use serde::{Deserialize, Serialize};

pub use alloy_primitives::Address;

use crate::error::{ClientError, ValidationError};
use crate::units::TokenAmount;

/// Hash identifying a submitted transaction.
pub type TxHash = B256;

/// Identifier of a marketplace listing.
///
/// Contract ids are 256-bit integers. They are narrowed to a plain `u64` when
/// they fit and kept at full width otherwise, so no id is ever truncated.
/// Construct through [`ListingId::from_raw`] or `From<u64>` to keep the
/// representation canonical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum ListingId {
    /// An id that fits in 64 bits.
    Index(u64),
    /// An id above `u64::MAX`.
    Wide(U256),
}

impl ListingId {
    /// Normalizes a raw contract id.
    #[must_use]
    pub fn from_raw(raw: U256) -> Self {
        match u64::try_from(raw) {
            Ok(index) => Self::Index(index),
            Err(_) => Self::Wide(raw),
        }
    }

    /// Returns the id as the contract sees it.
    #[must_use]
    pub fn to_raw(self) -> U256 {
        match self {
            Self::Index(index) => U256::from(index),
            Self::Wide(raw) => raw,
        }
    }
}

impl From<u64> for ListingId {
    fn from(index: u64) -> Self {
        Self::Index(index)
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Wide(raw) => write!(f, "{raw}"),
        }
    }
}

impl FromStr for ListingId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        U256::from_str(s.trim())
            .map(Self::from_raw)
            .map_err(|e| format!("invalid listing id '{s}': {e}"))
    }
}

/// A marketplace listing as reported by the contract.
///
/// Only `sold` ever changes, and only as observed through a later catalog
/// refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: ListingId,
    pub model_name: String,
    pub description: String,
    pub model_link: String,
    pub price: TokenAmount,
    pub seller: Address,
    pub sold: bool,
}

impl Listing {
    /// Whether this listing carries exactly the fields of `draft`.
    #[must_use]
    pub fn matches_draft(&self, draft: &ListingDraft) -> bool {
        self.model_name == draft.model_name
            && self.description == draft.description
            && self.model_link == draft.model_link
            && self.price == draft.price
    }
}

/// Validated input for a new listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDraft {
    pub model_name: String,
    pub description: String,
    pub model_link: String,
    pub price: TokenAmount,
}

impl ListingDraft {
    /// Validates listing fields and converts the display-unit price.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if any field is blank or the price is not
    /// a valid token amount. Text fields are kept exactly as given.
    pub fn new(
        model_name: &str,
        description: &str,
        model_link: &str,
        price: &str,
    ) -> Result<Self, ValidationError> {
        let model_name = required("model name", model_name)?;
        let description = required("description", description)?;
        let model_link = required("model link", model_link)?;
        let price = TokenAmount::parse(required("price", price)?.trim())?;

        Ok(Self {
            model_name: model_name.to_string(),
            description: description.to_string(),
            model_link: model_link.to_string(),
            price,
        })
    }
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField { field });
    }
    Ok(value)
}

/// Capability to submit transactions from one authorized account.
///
/// Only obtainable through [`crate::session::SessionManager::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signer {
    address: Address,
}

impl Signer {
    pub(crate) fn new(address: Address) -> Self {
        Self { address }
    }

    /// The account this signer submits from.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }
}

/// The connected account and its signing capability.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    account: Option<Address>,
    signer: Option<Signer>,
}

impl Session {
    /// A session with no connected account.
    #[must_use]
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub(crate) fn connected(account: Address) -> Self {
        Self {
            account: Some(account),
            signer: Some(Signer::new(account)),
        }
    }

    #[must_use]
    pub fn account(&self) -> Option<Address> {
        self.account
    }

    #[must_use]
    pub fn signer(&self) -> Option<&Signer> {
        self.signer.as_ref()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.account.is_some()
    }

    /// Returns the signer or fails with [`ClientError::SigningRequired`].
    ///
    /// # Errors
    ///
    /// Returns `SigningRequired` if no account is connected.
    pub fn require_signer(&self) -> Result<&Signer, ClientError> {
        self.signer.as_ref().ok_or(ClientError::SigningRequired)
    }
}

/// A log entry emitted by a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// Outcome of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub hash: TxHash,
    pub block_number: Option<u64>,
    /// `false` when the transaction reverted.
    pub success: bool,
    pub logs: Vec<LogEntry>,
}

/// Balance of one account at the time it was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BalanceSnapshot {
    pub account: Address,
    pub amount: TokenAmount,
}

/// The full listing set as of one catalog read.
///
/// Snapshots are immutable and cheap to clone. A refresh produces a new
/// snapshot instead of patching an old one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSnapshot {
    listings: Arc<[Listing]>,
}

impl CatalogSnapshot {
    #[must_use]
    pub fn new(listings: Vec<Listing>) -> Self {
        Self {
            listings: listings.into(),
        }
    }

    /// Listings in contract order.
    #[must_use]
    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    pub fn iter(&self) -> impl Iterator<Item = &Listing> {
        self.listings.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: ListingId) -> Option<&Listing> {
        self.listings.iter().find(|listing| listing.id == id)
    }

    /// Listings that have not been sold.
    pub fn available(&self) -> impl Iterator<Item = &Listing> {
        self.listings.iter().filter(|listing| !listing.sold)
    }

    pub fn by_seller(&self, seller: Address) -> impl Iterator<Item = &Listing> {
        self.listings
            .iter()
            .filter(move |listing| listing.seller == seller)
    }

    /// Case-insensitive search over model name and description.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&Listing> {
        let query = query.to_lowercase();
        self.listings
            .iter()
            .filter(|listing| {
                listing.model_name.to_lowercase().contains(&query)
                    || listing.description.to_lowercase().contains(&query)
            })
            .collect()
    }
}
