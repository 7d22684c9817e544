//! Marketplace listing catalog.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::ledger::{ListingRecord, MarketplaceContract};
use crate::types::{CatalogSnapshot, Listing, ListingId};
use crate::units::TokenAmount;
use crate::Result;

/// Reads the full listing set from the marketplace contract.
///
/// Every fetch replaces the cached snapshot wholesale; nothing is merged.
/// Listings keep the order the contract returns them in.
pub struct ListingCatalog<M> {
    market: Arc<M>,
    latest: RwLock<CatalogSnapshot>,
}

impl<M: MarketplaceContract> ListingCatalog<M> {
    pub fn new(market: Arc<M>) -> Self {
        Self {
            market,
            latest: RwLock::new(CatalogSnapshot::default()),
        }
    }

    /// Fetch every listing and replace the cached snapshot.
    ///
    /// On failure the previous snapshot is kept.
    ///
    /// # Errors
    ///
    /// Returns `Rpc` if the marketplace contract cannot be queried.
    pub async fn fetch_all(&self) -> Result<CatalogSnapshot> {
        let records = self.market.get_all_listings().await?;
        let listings: Vec<Listing> = records.into_iter().map(normalize).collect();

        if !is_ascending(&listings) {
            warn!("Marketplace returned listings out of id order; keeping contract order");
        }

        let snapshot = CatalogSnapshot::new(listings);
        *self.latest.write().await = snapshot.clone();
        info!(
            listings = snapshot.len(),
            available = snapshot.available().count(),
            "Catalog refreshed"
        );
        Ok(snapshot)
    }

    /// Same as [`fetch_all`](Self::fetch_all); callable from any trigger.
    ///
    /// # Errors
    ///
    /// Returns `Rpc` if the marketplace contract cannot be queried.
    pub async fn refresh(&self) -> Result<CatalogSnapshot> {
        self.fetch_all().await
    }

    /// The last successfully fetched snapshot. Empty before the first fetch.
    pub async fn latest(&self) -> CatalogSnapshot {
        self.latest.read().await.clone()
    }
}

fn normalize(record: ListingRecord) -> Listing {
    Listing {
        id: ListingId::from_raw(record.id),
        model_name: record.model_name,
        description: record.description,
        model_link: record.model_link,
        price: TokenAmount::from_raw(record.price),
        seller: record.seller,
        sold: record.sold,
    }
}

fn is_ascending(listings: &[Listing]) -> bool {
    listings.windows(2).all(|pair| pair[0].id < pair[1].id)
}
