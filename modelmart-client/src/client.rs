//! The marketplace client facade.
//!
//! Wires the session, the two readers and the two writers around one set of
//! collaborators, and applies the control flow between them: connect first,
//! read once an account exists, refresh after every successful write.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::balance::BalanceReader;
use crate::catalog::ListingCatalog;
use crate::error::{ClientError, ValidationError};
use crate::ledger::{MarketplaceContract, ReceiptSource, TokenContract, Wallet};
use crate::pending::ConfirmationPolicy;
use crate::publish::ListingPublisher;
use crate::purchase::{PurchaseCoordinator, PurchaseOutcome};
use crate::rpc::{RpcMarketplace, RpcToken, RpcTransport, RpcWallet};
use crate::session::SessionManager;
use crate::types::{Address, BalanceSnapshot, CatalogSnapshot, ListingId, Session};
use crate::Result;

/// Everything the client currently knows, as immutable snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientState {
    pub session: Session,
    pub balance: Option<BalanceSnapshot>,
    pub catalog: CatalogSnapshot,
}

/// Session-scoped marketplace client.
pub struct MarketplaceClient<W, T, M, R> {
    session: SessionManager<W>,
    balance: Arc<BalanceReader<T>>,
    catalog: Arc<ListingCatalog<M>>,
    publisher: ListingPublisher<M, R>,
    purchases: PurchaseCoordinator<T, M, R>,
}

impl<W, T, M, R> MarketplaceClient<W, T, M, R>
where
    W: Wallet,
    T: TokenContract,
    M: MarketplaceContract,
    R: ReceiptSource,
{
    /// Build a client. `wallet` is `None` when no wallet capability exists.
    pub fn new(
        wallet: Option<W>,
        token: Arc<T>,
        market: Arc<M>,
        receipts: Arc<R>,
        policy: ConfirmationPolicy,
    ) -> Self {
        let balance = Arc::new(BalanceReader::new(Arc::clone(&token)));
        let catalog = Arc::new(ListingCatalog::new(Arc::clone(&market)));
        let publisher = ListingPublisher::new(Arc::clone(&market), Arc::clone(&receipts), policy);
        let purchases = PurchaseCoordinator::new(
            token,
            market,
            receipts,
            Arc::clone(&balance),
            Arc::clone(&catalog),
            policy,
        );
        Self {
            session: SessionManager::new(wallet),
            balance,
            catalog,
            publisher,
            purchases,
        }
    }

    /// Prefer `account` when the wallet authorizes several.
    #[must_use]
    pub fn with_preferred_account(mut self, account: Option<Address>) -> Self {
        self.session = self.session.with_preferred_account(account);
        self
    }

    /// Connect the wallet, then populate balance and catalog.
    ///
    /// Nothing is read if the connection fails.
    ///
    /// # Errors
    ///
    /// Connection errors from [`SessionManager::connect`], then `Rpc` from the
    /// initial reads.
    pub async fn start(&self) -> Result<ClientState> {
        self.session.connect().await?;
        self.refresh().await
    }

    /// Request account authorization again.
    ///
    /// # Errors
    ///
    /// See [`SessionManager::connect`].
    pub async fn connect(&self) -> Result<Session> {
        self.session.connect().await
    }

    /// Re-read the balance of the session account and the full catalog.
    ///
    /// Both reads are attempted even if one fails.
    ///
    /// # Errors
    ///
    /// Returns the first read failure. The failed snapshot keeps its previous
    /// value.
    pub async fn refresh(&self) -> Result<ClientState> {
        let session = self.session.current().await;
        let (balance, catalog) = tokio::join!(
            self.balance.refresh(session.account()),
            self.catalog.refresh()
        );
        Ok(ClientState {
            session,
            balance: balance?,
            catalog: catalog?,
        })
    }

    /// The cached state, without any network call.
    pub async fn state(&self) -> ClientState {
        ClientState {
            session: self.session.current().await,
            balance: self.balance.latest().await,
            catalog: self.catalog.latest().await,
        }
    }

    pub async fn session(&self) -> Session {
        self.session.current().await
    }

    #[must_use]
    pub fn balance_reader(&self) -> &BalanceReader<T> {
        &self.balance
    }

    #[must_use]
    pub fn catalog(&self) -> &ListingCatalog<M> {
        &self.catalog
    }

    /// Whether a purchase of `listing_id` is currently running.
    #[must_use]
    pub fn is_purchase_in_flight(&self, listing_id: ListingId) -> bool {
        self.purchases.is_in_flight(listing_id)
    }

    /// Publish a listing and return its id.
    ///
    /// The catalog is refreshed after confirmation. The id comes from the
    /// creation event when the receipt carries one, otherwise from the newest
    /// listing of the session account with the submitted fields.
    ///
    /// # Errors
    ///
    /// Errors of [`ListingPublisher::publish`], `Rpc` if the id had to be
    /// looked up and the refresh failed, `ListingNotObserved` if the listing
    /// is not in the refreshed catalog.
    pub async fn publish(
        &self,
        model_name: &str,
        description: &str,
        model_link: &str,
        price: &str,
    ) -> Result<ListingId> {
        let session = self.session.current().await;
        let published = self
            .publisher
            .publish(&session, model_name, description, model_link, price)
            .await?;

        let snapshot = match self.catalog.refresh().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(tx = %published.receipt.hash, error = %e, "Catalog refresh after publish failed");
                return published.listing_id.ok_or(e);
            }
        };

        if let Some(id) = published.listing_id {
            info!(listing = %id, tx = %published.receipt.hash, "Listing published");
            return Ok(id);
        }

        let seller = session.require_signer()?.address();
        let id = snapshot
            .iter()
            .filter(|l| l.seller == seller && l.matches_draft(&published.draft))
            .last()
            .map(|l| l.id)
            .ok_or(ClientError::ListingNotObserved(published.receipt.hash))?;
        info!(listing = %id, tx = %published.receipt.hash, "Listing published, id resolved from catalog");
        Ok(id)
    }

    /// Buy `listing_id` for `price` display units.
    ///
    /// # Errors
    ///
    /// See [`PurchaseCoordinator::purchase`].
    pub async fn purchase(&self, listing_id: ListingId, price: &str) -> Result<PurchaseOutcome> {
        let session = self.session.current().await;
        self.purchases.purchase(&session, listing_id, price).await
    }

    /// Buy `listing_id` at the price the catalog shows for it.
    ///
    /// The catalog is fetched first if the listing is not cached.
    ///
    /// # Errors
    ///
    /// `Validation` if the listing does not exist, otherwise see
    /// [`purchase`](Self::purchase).
    pub async fn purchase_listing(&self, listing_id: ListingId) -> Result<PurchaseOutcome> {
        let mut snapshot = self.catalog.latest().await;
        if snapshot.get(listing_id).is_none() {
            snapshot = self.catalog.refresh().await?;
        }
        let price = snapshot
            .get(listing_id)
            .map(|l| l.price.to_string())
            .ok_or(ValidationError::UnknownListing { id: listing_id })?;
        self.purchase(listing_id, &price).await
    }
}

/// A client backed by a JSON-RPC node.
pub type RpcClient = MarketplaceClient<RpcWallet, RpcToken, RpcMarketplace, RpcTransport>;

/// Connection settings for [`RpcClient`].
#[derive(Debug, Clone)]
pub struct RpcOptions {
    pub rpc_url: String,
    pub token_address: Address,
    pub marketplace_address: Address,
    /// `false` behaves as if no wallet were installed.
    pub wallet_enabled: bool,
    pub account: Option<Address>,
    pub request_timeout: Duration,
    pub confirmation: ConfirmationPolicy,
}

impl RpcClient {
    /// Build a client for the node at `options.rpc_url`. No request is made.
    ///
    /// # Errors
    ///
    /// Returns `Rpc` if the HTTP client cannot be built.
    pub fn over_rpc(options: &RpcOptions) -> Result<Self> {
        let transport = Arc::new(RpcTransport::new(
            options.rpc_url.clone(),
            options.request_timeout,
        )?);
        let wallet = options
            .wallet_enabled
            .then(|| RpcWallet::new(Arc::clone(&transport)));
        let token = RpcToken::new(Arc::clone(&transport), options.token_address);
        let market = RpcMarketplace::new(Arc::clone(&transport), options.marketplace_address);

        Ok(Self::new(
            wallet,
            Arc::new(token),
            Arc::new(market),
            transport,
            options.confirmation,
        )
        .with_preferred_account(options.account))
    }
}
