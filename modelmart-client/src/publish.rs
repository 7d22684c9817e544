//! Listing creation.

use std::sync::Arc;

use tracing::info;

use crate::ledger::{MarketplaceContract, ReceiptSource};
use crate::pending::{ConfirmationPolicy, PendingTransaction};
use crate::types::{ListingDraft, ListingId, Receipt, Session};
use crate::Result;

/// A listing creation that was mined without reverting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedListing {
    pub draft: ListingDraft,
    pub receipt: Receipt,
    /// The new id, when the receipt carries it.
    pub listing_id: Option<ListingId>,
}

/// Submits `createListing` transactions.
///
/// The publisher never touches cached catalog state: the caller refreshes the
/// catalog after a successful publish.
pub struct ListingPublisher<M, R> {
    market: Arc<M>,
    receipts: Arc<R>,
    policy: ConfirmationPolicy,
}

impl<M: MarketplaceContract, R: ReceiptSource> ListingPublisher<M, R> {
    pub fn new(market: Arc<M>, receipts: Arc<R>, policy: ConfirmationPolicy) -> Self {
        Self {
            market,
            receipts,
            policy,
        }
    }

    /// Validate the fields, submit the listing and wait for it to be mined.
    ///
    /// `price` is in display units and is converted with the 18-decimal rule.
    /// Nothing reaches the network unless a signer exists and every field is
    /// valid.
    ///
    /// # Errors
    ///
    /// - `SigningRequired` without a connected account
    /// - `Validation` for empty fields or a malformed price
    /// - `TransactionRejected`, `TransactionReverted`, `ConfirmationTimeout`
    ///   or `Rpc` from submission and confirmation
    pub async fn publish(
        &self,
        session: &Session,
        model_name: &str,
        description: &str,
        model_link: &str,
        price: &str,
    ) -> Result<PublishedListing> {
        session.require_signer()?;
        let draft = ListingDraft::new(model_name, description, model_link, price)?;
        self.publish_draft(session, draft).await
    }

    /// Submit an already validated draft.
    ///
    /// # Errors
    ///
    /// Same as [`publish`](Self::publish), minus validation.
    pub async fn publish_draft(
        &self,
        session: &Session,
        draft: ListingDraft,
    ) -> Result<PublishedListing> {
        let signer = session.require_signer()?;

        info!(
            seller = %signer.address(),
            model = %draft.model_name,
            price = %draft.price,
            "Publishing listing"
        );
        let hash = self.market.create_listing(signer, &draft).await?;
        let mut pending = PendingTransaction::submitted("createListing", hash);
        let receipt = pending.confirm(&*self.receipts, &self.policy).await?;
        let listing_id = self.market.created_listing_id(&receipt);

        Ok(PublishedListing {
            draft,
            receipt,
            listing_id,
        })
    }
}
