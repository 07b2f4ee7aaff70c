//! Operator actions on listings that already exist: posting a draft to the
//! marketplace later, checking or ending its marketplace side, and deleting
//! it from the shop.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use relic_model::{ItemId, Listing, MarketplaceRef};
use tracing::{info, warn};

use super::pipeline::link_relayed;
use super::records::SideRecords;
use crate::error::{RelicError, Result};
use crate::relay::{ItemStatus, MarketplaceRelay, RelayOutcome};
use crate::store::ListingStore;

/// End reason sent when the caller gives none.
pub const DEFAULT_END_REASON: &str = "NotAvailable";

pub struct ListingManager {
    store: Arc<ListingStore>,
    records: Arc<SideRecords>,
    relay: Option<Arc<MarketplaceRelay>>,
}

impl fmt::Debug for ListingManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListingManager")
            .field("store", &self.store.path())
            .field("relay_configured", &self.relay.is_some())
            .finish_non_exhaustive()
    }
}

impl ListingManager {
    pub fn new(store: Arc<ListingStore>, records: Arc<SideRecords>, relay: Option<Arc<MarketplaceRelay>>) -> Self {
        Self { store, records, relay }
    }

    pub fn relay_configured(&self) -> bool {
        self.relay.is_some()
    }

    /// Post an active, not yet relayed listing using `photos`. On success the
    /// listing is linked to the marketplace and its draft file is removed.
    pub async fn relay_listing(&self, id: ItemId, photos: &[PathBuf]) -> Result<(Listing, RelayOutcome)> {
        let relay = self.relay()?;
        let mut listing = self.existing(id).await?;
        if let Some(marketplace) = &listing.marketplace {
            return Err(RelicError::Conflict(format!(
                "listing {id} is already on the marketplace as {}",
                marketplace.item_id
            )));
        }
        if !listing.is_active() {
            return Err(RelicError::Conflict(format!(
                "listing {id} is {}",
                listing.status.as_str()
            )));
        }

        let outcome = relay.relay(&listing.item, photos).await?;
        link_relayed(&self.store, &self.records, &mut listing, &outcome).await;
        if let Err(err) = self.records.remove_draft(id).await {
            warn!(target: "relic::lifecycle", item_id = %id, error = %err, "could not remove draft");
        }
        Ok((listing, outcome))
    }

    pub async fn marketplace_status(&self, id: ItemId) -> Result<ItemStatus> {
        let relay = self.relay()?;
        let marketplace = self.marketplace_ref(id).await?;
        relay.item_status(&marketplace.item_id).await
    }

    /// End the marketplace listing, then archive the local one.
    pub async fn end_listing(&self, id: ItemId, reason: Option<&str>) -> Result<Listing> {
        let relay = self.relay()?;
        let marketplace = self.marketplace_ref(id).await?;
        relay
            .end_item(&marketplace.item_id, reason.unwrap_or(DEFAULT_END_REASON))
            .await?;
        self.store.archive_listing(id).await?;
        self.existing(id).await
    }

    /// Remove the listing and its draft. The marketplace side is untouched.
    pub async fn delete_listing(&self, id: ItemId) -> Result<Listing> {
        let removed = self
            .store
            .remove_listing(id)
            .await?
            .ok_or_else(|| RelicError::NotFound(format!("listing {id}")))?;
        if let Err(err) = self.records.remove_draft(id).await {
            warn!(target: "relic::lifecycle", item_id = %id, error = %err, "could not remove draft");
        }
        info!(target: "relic::lifecycle", item_id = %id, "listing deleted");
        Ok(removed)
    }

    fn relay(&self) -> Result<&Arc<MarketplaceRelay>> {
        self.relay.as_ref().ok_or(RelicError::MarketplaceUnavailable)
    }

    async fn existing(&self, id: ItemId) -> Result<Listing> {
        self.store
            .listing(id)
            .await
            .ok_or_else(|| RelicError::NotFound(format!("listing {id}")))
    }

    async fn marketplace_ref(&self, id: ItemId) -> Result<MarketplaceRef> {
        self.existing(id)
            .await?
            .marketplace
            .ok_or_else(|| RelicError::NotFound(format!("listing {id} is not on the marketplace")))
    }
}
