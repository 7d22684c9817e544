//! The two-step purchase protocol: approve the marketplace, then buy.
//!
//! ```text
//!  convert price ──▶ approve(marketplace, price) ──▶ wait for receipt
//!                                                        │
//!        refresh balance + catalog ◀── wait ◀── purchaseModel(id)
//! ```
//!
//! The purchase is never submitted before the approval is confirmed and the
//! allowance is visible, because the marketplace pulls payment through the
//! allowance. A failed approval aborts the flow. A granted but unused approval
//! is left in place; allowances are not locally reversible.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use crate::balance::BalanceReader;
use crate::catalog::ListingCatalog;
use crate::error::ClientError;
use crate::ledger::{MarketplaceContract, ReceiptSource, TokenContract};
use crate::pending::{ConfirmationPolicy, PendingTransaction};
use crate::types::{BalanceSnapshot, CatalogSnapshot, ListingId, Receipt, Session};
use crate::units::TokenAmount;
use crate::Result;

/// A confirmed purchase and the state observed right after it.
#[derive(Debug)]
pub struct PurchaseOutcome {
    pub listing_id: ListingId,
    pub price: TokenAmount,
    pub approval: Receipt,
    pub purchase: Receipt,
    /// Balance re-read after the purchase, if that read succeeded.
    pub balance: Option<BalanceSnapshot>,
    /// Catalog re-read after the purchase, if that read succeeded.
    pub catalog: Option<CatalogSnapshot>,
    /// Failures of the post-purchase refreshes. The purchase itself stands.
    pub refresh_errors: Vec<ClientError>,
}

/// Runs purchases, at most one at a time per listing.
pub struct PurchaseCoordinator<T, M, R> {
    token: Arc<T>,
    market: Arc<M>,
    receipts: Arc<R>,
    balance: Arc<BalanceReader<T>>,
    catalog: Arc<ListingCatalog<M>>,
    policy: ConfirmationPolicy,
    in_flight: Mutex<HashSet<ListingId>>,
}

/// Releases a listing's in-flight slot when dropped.
struct InFlightGuard<'a> {
    slots: &'a Mutex<HashSet<ListingId>>,
    listing_id: ListingId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.listing_id);
    }
}

impl<T, M, R> PurchaseCoordinator<T, M, R>
where
    T: TokenContract,
    M: MarketplaceContract,
    R: ReceiptSource,
{
    pub fn new(
        token: Arc<T>,
        market: Arc<M>,
        receipts: Arc<R>,
        balance: Arc<BalanceReader<T>>,
        catalog: Arc<ListingCatalog<M>>,
        policy: ConfirmationPolicy,
    ) -> Self {
        Self {
            token,
            market,
            receipts,
            balance,
            catalog,
            policy,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Whether a purchase of `listing_id` is currently running.
    #[must_use]
    pub fn is_in_flight(&self, listing_id: ListingId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&listing_id)
    }

    /// Buy `listing_id` for `price` display units.
    ///
    /// # Errors
    ///
    /// - `SigningRequired` without a connected account
    /// - `Validation` if `price` is not a valid amount
    /// - `PurchaseInFlight` if this listing is already being purchased
    /// - `TransactionRejected` / `TransactionReverted` from either step
    /// - `InsufficientApproval` if the confirmed allowance is not visible
    /// - `ConfirmationTimeout` or `Rpc` while waiting
    pub async fn purchase(
        &self,
        session: &Session,
        listing_id: ListingId,
        price: &str,
    ) -> Result<PurchaseOutcome> {
        let signer = session.require_signer()?;
        let price = TokenAmount::parse(price)?;
        let _guard = self.claim(listing_id)?;

        let buyer = signer.address();
        let spender = self.market.address();
        info!(listing = %listing_id, %buyer, %price, "Starting purchase");

        let hash = self.token.approve(signer, spender, price.raw()).await?;
        let mut approval = PendingTransaction::submitted("approve", hash);
        let approval = approval.confirm(&*self.receipts, &self.policy).await?;

        let allowance = TokenAmount::from_raw(self.token.allowance(buyer, spender).await?);
        if allowance < price {
            warn!(listing = %listing_id, %allowance, %price, "Approval confirmed but allowance not visible");
            return Err(ClientError::InsufficientApproval {
                required: price,
                allowance,
            });
        }

        let hash = self.market.purchase_model(signer, listing_id).await?;
        let mut purchase = PendingTransaction::submitted("purchaseModel", hash);
        let purchase = purchase.confirm(&*self.receipts, &self.policy).await?;
        info!(listing = %listing_id, %buyer, "Purchase confirmed");

        let mut refresh_errors = Vec::new();
        let balance = match self.balance.refresh(Some(buyer)).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Balance refresh after purchase failed");
                refresh_errors.push(e);
                None
            }
        };
        let catalog = match self.catalog.refresh().await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(error = %e, "Catalog refresh after purchase failed");
                refresh_errors.push(e);
                None
            }
        };

        Ok(PurchaseOutcome {
            listing_id,
            price,
            approval,
            purchase,
            balance,
            catalog,
            refresh_errors,
        })
    }

    fn claim(&self, listing_id: ListingId) -> Result<InFlightGuard<'_>> {
        let mut slots = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !slots.insert(listing_id) {
            return Err(ClientError::PurchaseInFlight(listing_id));
        }
        Ok(InFlightGuard {
            slots: &self.in_flight,
            listing_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Call, Faults, MockLedger, BUYER, SELLER};
    use crate::types::Session;

    type Coordinator = PurchaseCoordinator<MockLedger, MockLedger, MockLedger>;

    struct Fixture {
        ledger: MockLedger,
        balance: Arc<BalanceReader<MockLedger>>,
        coordinator: Coordinator,
        session: Session,
    }

    fn fixture(ledger: MockLedger) -> Fixture {
        let shared = Arc::new(ledger.clone());
        let balance = Arc::new(BalanceReader::new(Arc::clone(&shared)));
        let catalog = Arc::new(ListingCatalog::new(Arc::clone(&shared)));
        let coordinator = PurchaseCoordinator::new(
            Arc::clone(&shared),
            Arc::clone(&shared),
            shared,
            Arc::clone(&balance),
            catalog,
            ConfirmationPolicy::default(),
        );
        Fixture {
            ledger,
            balance,
            coordinator,
            session: Session::connected(BUYER),
        }
    }

    fn two_listings() -> MockLedger {
        MockLedger::new()
            .with_balance(BUYER, "100")
            .with_listing("llama", "40", SELLER, false)
            .with_listing("mistral", "10", SELLER, true)
    }

    fn approval_confirmed(ledger: &MockLedger) -> Option<usize> {
        let calls = ledger.calls();
        let approve_hash = calls.iter().find_map(|c| match c {
            Call::Approve { hash, .. } => Some(*hash),
            _ => None,
        })?;
        ledger.position(|c| *c == Call::Receipt(approve_hash))
    }

    #[tokio::test]
    async fn test_purchase_success_refreshes_state() -> Result<()> {
        let f = fixture(two_listings());
        let before = f.balance.refresh(Some(BUYER)).await?.map(|s| s.amount);

        let outcome = f.coordinator.purchase(&f.session, ListingId::from(1), "40").await?;
        assert!(outcome.approval.success);
        assert!(outcome.purchase.success);
        assert!(outcome.refresh_errors.is_empty());

        let after = outcome.balance.map(|s| s.amount);
        assert_eq!(before.map(|a| a.to_string()).as_deref(), Some("100"));
        assert_eq!(after.map(|a| a.to_string()).as_deref(), Some("60"));

        let catalog = outcome.catalog.ok_or(ClientError::Rpc("no catalog".to_string()))?;
        assert_eq!(catalog.get(ListingId::from(1)).map(|l| l.sold), Some(true));
        assert_eq!(catalog.get(ListingId::from(2)).map(|l| l.sold), Some(true));
        assert_eq!(f.ledger.balance(SELLER), TokenAmount::parse("40")?.raw());
        assert!(!f.coordinator.is_in_flight(ListingId::from(1)));
        Ok(())
    }

    #[tokio::test]
    async fn test_purchase_waits_for_approval_confirmation() -> Result<()> {
        let f = fixture(two_listings());
        f.coordinator.purchase(&f.session, ListingId::from(1), "40").await?;

        let confirmed = approval_confirmed(&f.ledger);
        let purchased = f.ledger.position(|c| matches!(c, Call::PurchaseModel { .. }));
        let (Some(confirmed), Some(purchased)) = (confirmed, purchased) else {
            panic!("expected both approval confirmation and purchase in {:?}", f.ledger.calls());
        };
        assert!(confirmed < purchased);
        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_approval_never_purchases() {
        let f = fixture(two_listings().with_faults(Faults {
            reject_approval: true,
            ..Faults::default()
        }));

        let Err(err) = f.coordinator.purchase(&f.session, ListingId::from(1), "40").await else {
            panic!("rejected approval must abort");
        };
        assert!(matches!(err, ClientError::TransactionRejected(_)));
        assert_eq!(f.ledger.count(|c| matches!(c, Call::PurchaseModel { .. })), 0);
    }

    #[tokio::test]
    async fn test_reverted_approval_never_purchases() {
        let f = fixture(two_listings().with_faults(Faults {
            revert_approval: true,
            ..Faults::default()
        }));

        let Err(err) = f.coordinator.purchase(&f.session, ListingId::from(1), "40").await else {
            panic!("reverted approval must abort");
        };
        assert!(matches!(err, ClientError::TransactionReverted { ref action, .. } if action == "approve"));
        assert_eq!(f.ledger.count(|c| matches!(c, Call::PurchaseModel { .. })), 0);
    }

    #[tokio::test]
    async fn test_declined_purchase_after_confirmed_approval() -> Result<()> {
        let f = fixture(two_listings().with_faults(Faults {
            reject_purchase: true,
            ..Faults::default()
        }));

        let Err(err) = f.coordinator.purchase(&f.session, ListingId::from(1), "40").await else {
            panic!("declined purchase signature must fail");
        };
        assert!(matches!(err, ClientError::TransactionRejected(_)));
        assert!(approval_confirmed(&f.ledger).is_some());
        assert_eq!(f.ledger.count(|c| matches!(c, Call::PurchaseModel { .. })), 0);
        assert_eq!(f.ledger.balance(BUYER), TokenAmount::parse("100")?.raw());
        assert!(!f.coordinator.is_in_flight(ListingId::from(1)));
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_confirmed_purchase() -> Result<()> {
        let f = fixture(two_listings().with_faults(Faults {
            fail_reads_after_purchase: true,
            ..Faults::default()
        }));

        let outcome = f.coordinator.purchase(&f.session, ListingId::from(1), "40").await?;
        assert!(outcome.purchase.success);
        assert_eq!(outcome.refresh_errors.len(), 2);
        assert!(
            outcome
                .refresh_errors
                .iter()
                .all(|e| matches!(e, ClientError::Rpc(_)))
        );
        assert!(outcome.balance.is_none());
        assert!(outcome.catalog.is_none());
        assert_eq!(f.ledger.balance(SELLER), TokenAmount::parse("40")?.raw());
        Ok(())
    }

    #[tokio::test]
    async fn test_invisible_allowance_is_insufficient_approval() {
        let f = fixture(two_listings().with_faults(Faults {
            drop_allowance: true,
            ..Faults::default()
        }));

        let Err(err) = f.coordinator.purchase(&f.session, ListingId::from(1), "40").await else {
            panic!("missing allowance must abort");
        };
        assert!(matches!(err, ClientError::InsufficientApproval { .. }));
        assert_eq!(f.ledger.count(|c| matches!(c, Call::PurchaseModel { .. })), 0);
    }

    #[tokio::test]
    async fn test_sold_listing_reverts_and_keeps_balance() -> Result<()> {
        let f = fixture(two_listings());
        let before = f.balance.refresh(Some(BUYER)).await?;

        let Err(err) = f.coordinator.purchase(&f.session, ListingId::from(2), "10").await else {
            panic!("sold listing must revert");
        };
        assert!(matches!(
            err,
            ClientError::TransactionReverted { ref action, hash: Some(_), .. } if action == "purchaseModel"
        ));
        assert_eq!(f.balance.latest().await, before);
        assert_eq!(f.ledger.balance(BUYER), TokenAmount::parse("100")?.raw());
        assert_eq!(f.ledger.count(|c| matches!(c, Call::PurchaseModel { .. })), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_race_lost_to_other_buyer_reverts() {
        let f = fixture(two_listings());
        f.ledger.sell_elsewhere(1);

        let Err(err) = f.coordinator.purchase(&f.session, ListingId::from(1), "40").await else {
            panic!("listing sold elsewhere must revert");
        };
        assert!(matches!(err, ClientError::TransactionReverted { .. }));
        assert!(!f.coordinator.is_in_flight(ListingId::from(1)));
    }

    #[tokio::test]
    async fn test_purchase_requires_signer_and_valid_price() {
        let f = fixture(two_listings());

        let Err(err) = f
            .coordinator
            .purchase(&Session::disconnected(), ListingId::from(1), "40")
            .await
        else {
            panic!("purchase without signer must fail");
        };
        assert!(matches!(err, ClientError::SigningRequired));

        let Err(err) = f.coordinator.purchase(&f.session, ListingId::from(1), "forty").await else {
            panic!("malformed price must fail");
        };
        assert!(matches!(err, ClientError::Validation(_)));
        assert!(f.ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_purchase_of_same_listing_refused() -> Result<()> {
        let f = fixture(two_listings());

        let guard = f.coordinator.claim(ListingId::from(1))?;
        assert!(f.coordinator.is_in_flight(ListingId::from(1)));

        let Err(err) = f.coordinator.purchase(&f.session, ListingId::from(1), "40").await else {
            panic!("second purchase of the same listing must be refused");
        };
        assert!(matches!(err, ClientError::PurchaseInFlight(id) if id == ListingId::from(1)));
        assert!(f.ledger.calls().is_empty());

        drop(guard);
        assert!(!f.coordinator.is_in_flight(ListingId::from(1)));
        f.coordinator.purchase(&f.session, ListingId::from(1), "40").await?;
        Ok(())
    }
}
