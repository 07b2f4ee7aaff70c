use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use relic_model::{ItemId, ShippingNotice, SoldItem};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::records::SideRecords;
use crate::error::Result;
use crate::relay::MarketplaceRelay;
use crate::store::{ListingStore, SoldTransition};

/// Default gap between sold-item checks.
pub const DEFAULT_SALE_POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Periodically asks the marketplace for new sales, marks the matching
/// listings sold and queues a shipping notice per sale.
#[derive(Debug, Clone)]
pub struct SalePoller {
    relay: Arc<MarketplaceRelay>,
    store: Arc<ListingStore>,
    records: Arc<SideRecords>,
    interval: Duration,
}

impl SalePoller {
    pub fn new(
        relay: Arc<MarketplaceRelay>,
        store: Arc<ListingStore>,
        records: Arc<SideRecords>,
        interval: Duration,
    ) -> Self {
        Self {
            relay,
            store,
            records,
            interval,
        }
    }

    /// One check for sales recorded after `since`. The marketplace reports a
    /// sale again whenever it changes (paid, shipped), so only notices for
    /// sales not already in the shipping queue are added and returned.
    pub async fn poll_once(&self, since: DateTime<Utc>) -> Result<Vec<ShippingNotice>> {
        let sold = self.relay.sold_items_since(since).await?;
        if sold.is_empty() {
            debug!(target: "relic::lifecycle", "no new sales");
            return Ok(Vec::new());
        }

        let mut notices = Vec::with_capacity(sold.len());
        for sale in &sold {
            let listing_id = self.settle_listing(sale).await;
            notices.push(ShippingNotice::for_sale(sale, listing_id));
        }
        let queued = self.records.append_shipping_notices(&notices).await?;
        for notice in &queued {
            info!(
                target: "relic::lifecycle",
                marketplace_id = %notice.marketplace_item_id,
                title = %notice.title,
                price = notice.price,
                "item sold; ship it"
            );
        }
        Ok(queued)
    }

    /// Mark the matching local listing sold. A listing that is already sold
    /// keeps its original `sold_at`; its sale still reaches the queue once,
    /// since marking sold by hand does not queue a shipment.
    async fn settle_listing(&self, sale: &SoldItem) -> Option<ItemId> {
        let listing = self.store.find_by_marketplace_id(&sale.marketplace_item_id).await?;
        match self.store.mark_sold(listing.id).await {
            Ok(SoldTransition::Sold { .. }) => {}
            Ok(SoldTransition::Unchanged { status }) => debug!(
                target: "relic::lifecycle",
                listing_id = %listing.id,
                status = status.as_str(),
                "listing already settled"
            ),
            Ok(SoldTransition::NotFound) => return None,
            Err(err) => warn!(
                target: "relic::lifecycle",
                listing_id = %listing.id,
                error = %err,
                "could not mark listing sold"
            ),
        }
        Some(listing.id)
    }

    /// Poll every `interval` until `cancel` fires. The first check happens
    /// one interval after start. A failed check is logged and retried from
    /// the same starting point next time.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut since = Utc::now();
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let checked_at = Utc::now();
                        match self.poll_once(since).await {
                            Ok(_) => since = checked_at,
                            Err(err) => warn!(
                                target: "relic::lifecycle",
                                error = %err,
                                "sold-item check failed"
                            ),
                        }
                    }
                }
            }
            debug!(target: "relic::lifecycle", "sale polling stopped");
        })
    }
}
