//! Durable listing storage backed by a single JSON snapshot.
//!
//! Every mutation is applied to a copy of the in-memory map, written to disk
//! atomically, and only then committed, so memory and disk never diverge.
//! All mutations go through one async mutex.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use relic_model::{ItemId, Listing, ListingStats, ListingStatus, MarketplaceRef, VintageItem};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::error::{RelicError, Result};
use crate::fsutil::write_json_atomic;

/// Outcome of [`ListingStore::mark_sold`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoldTransition {
    /// The listing moved from active to sold.
    Sold { sold_at: DateTime<Utc> },
    /// The listing was not active; nothing changed.
    Unchanged { status: ListingStatus },
    NotFound,
}

type ListingMap = HashMap<ItemId, Listing>;

pub struct ListingStore {
    path: PathBuf,
    listings: Mutex<ListingMap>,
}

impl fmt::Debug for ListingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("ListingStore");
        debug.field("path", &self.path);
        match self.listings.try_lock() {
            Ok(guard) => {
                debug.field("listing_count", &guard.len());
            }
            Err(_) => {
                debug.field("listings", &"<locked>");
            }
        }
        debug.finish()
    }
}

impl ListingStore {
    /// Load the snapshot at `path`, starting empty if it does not exist yet.
    /// A snapshot that exists but cannot be parsed is an error.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let listings = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => ListingMap::new(),
            Ok(bytes) => serde_json::from_slice::<ListingMap>(&bytes).map_err(|err| {
                RelicError::store_io(&path, format!("corrupt listing snapshot: {err}"))
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => ListingMap::new(),
            Err(err) => {
                return Err(RelicError::store_io(
                    &path,
                    format!("failed to read listing snapshot: {err}"),
                ));
            }
        };

        info!(
            target: "relic::store",
            path = %path.display(),
            listings = listings.len(),
            "listing store opened"
        );

        Ok(Self {
            path,
            listings: Mutex::new(listings),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn mutate<R>(&self, apply: impl FnOnce(&mut ListingMap) -> (R, bool)) -> Result<R> {
        let mut guard = self.listings.lock().await;
        let mut next = guard.clone();
        let (result, changed) = apply(&mut next);
        if !changed {
            return Ok(result);
        }

        if let Err(err) = write_json_atomic(&self.path, &next).await {
            error!(
                target: "relic::alert",
                path = %self.path.display(),
                error = %err,
                "listing store write failed; change not applied"
            );
            return Err(err);
        }
        *guard = next;
        Ok(result)
    }

    /// Insert (or overwrite) the listing for `item` as active with zero views.
    pub async fn add_listing(&self, item: VintageItem, marketplace: Option<MarketplaceRef>) -> Result<Listing> {
        let listing = Listing::new(item, marketplace);
        let stored = listing.clone();
        self.mutate(move |map| {
            map.insert(stored.id, stored);
            ((), true)
        })
        .await?;
        debug!(target: "relic::store", id = %listing.id, "listing added");
        Ok(listing)
    }

    /// Active listings, most recently posted first.
    pub async fn active_listings(&self) -> Vec<Listing> {
        let guard = self.listings.lock().await;
        let mut active: Vec<Listing> = guard.values().filter(|l| l.is_active()).cloned().collect();
        active.sort_by(|a, b| b.posted_at.cmp(&a.posted_at).then_with(|| b.id.cmp(&a.id)));
        active
    }

    pub async fn listing(&self, id: ItemId) -> Option<Listing> {
        self.listings.lock().await.get(&id).cloned()
    }

    pub async fn find_by_marketplace_id(&self, marketplace_item_id: &str) -> Option<Listing> {
        self.listings
            .lock()
            .await
            .values()
            .find(|listing| {
                listing
                    .marketplace
                    .as_ref()
                    .is_some_and(|mref| mref.item_id == marketplace_item_id)
            })
            .cloned()
    }

    /// Move an active listing to sold, stamping `sold_at` once. Repeat calls
    /// and unknown ids leave the store untouched.
    pub async fn mark_sold(&self, id: ItemId) -> Result<SoldTransition> {
        self.mutate(|map| match map.get_mut(&id) {
            None => (SoldTransition::NotFound, false),
            Some(listing) if listing.status != ListingStatus::Active => (
                SoldTransition::Unchanged {
                    status: listing.status,
                },
                false,
            ),
            Some(listing) => {
                let sold_at = Utc::now();
                listing.status = ListingStatus::Sold;
                listing.sold_at = Some(sold_at);
                (SoldTransition::Sold { sold_at }, true)
            }
        })
        .await
    }

    /// Returns the new view count, or `None` for an unknown id.
    pub async fn increment_views(&self, id: ItemId) -> Result<Option<u64>> {
        self.mutate(|map| match map.get_mut(&id) {
            Some(listing) => {
                listing.views = listing.views.saturating_add(1);
                (Some(listing.views), true)
            }
            None => (None, false),
        })
        .await
    }

    /// Returns `false` for an unknown id.
    pub async fn set_featured(&self, id: ItemId, featured: bool) -> Result<bool> {
        self.mutate(|map| match map.get_mut(&id) {
            Some(listing) if listing.featured == featured => (true, false),
            Some(listing) => {
                listing.featured = featured;
                (true, true)
            }
            None => (false, false),
        })
        .await
    }

    pub async fn attach_marketplace_ref(&self, id: ItemId, marketplace: MarketplaceRef) -> Result<bool> {
        self.mutate(|map| match map.get_mut(&id) {
            Some(listing) => {
                listing.marketplace = Some(marketplace);
                (true, true)
            }
            None => (false, false),
        })
        .await
    }

    /// Take a listing off the shop without deleting it.
    pub async fn archive_listing(&self, id: ItemId) -> Result<bool> {
        self.mutate(|map| match map.get_mut(&id) {
            Some(listing) if listing.status == ListingStatus::Archived => (true, false),
            Some(listing) => {
                listing.status = ListingStatus::Archived;
                (true, true)
            }
            None => (false, false),
        })
        .await
    }

    pub async fn remove_listing(&self, id: ItemId) -> Result<Option<Listing>> {
        self.mutate(|map| {
            let removed = map.remove(&id);
            let changed = removed.is_some();
            (removed, changed)
        })
        .await
    }

    /// Revenue is the sum of recommended prices over sold listings.
    pub async fn stats(&self) -> ListingStats {
        let guard = self.listings.lock().await;
        guard.values().fold(ListingStats::default(), |mut stats, listing| {
            stats.total += 1;
            stats.total_views += listing.views;
            match listing.status {
                ListingStatus::Active => stats.active += 1,
                ListingStatus::Sold => {
                    stats.sold += 1;
                    stats.total_revenue += listing.item.analysis.suggested_price.recommended;
                }
                ListingStatus::Archived => {}
            }
            stats
        })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::testing::sample_item as item;

    #[tokio::test]
    async fn added_listing_is_active_and_persisted() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("listings.json");
        let store = ListingStore::open(&path).await.unwrap();

        let listing = store.add_listing(item("lamp", 40.0), None).await.unwrap();
        assert_eq!(listing.status, ListingStatus::Active);
        assert_eq!(listing.views, 0);
        assert!(!listing.featured);
        assert_eq!(store.listing(listing.id).await, Some(listing.clone()));
        assert_eq!(store.listing(listing.id).await, store.listing(listing.id).await);

        let reopened = ListingStore::open(&path).await.unwrap();
        assert_eq!(reopened.listing(listing.id).await, Some(listing));
    }

    #[tokio::test]
    async fn active_listings_are_newest_first() {
        let tmp = tempdir().unwrap();
        let store = ListingStore::open(tmp.path().join("listings.json")).await.unwrap();

        let first = store.add_listing(item("first", 10.0), None).await.unwrap();
        let second = store.add_listing(item("second", 10.0), None).await.unwrap();
        let third = store.add_listing(item("third", 10.0), None).await.unwrap();
        store.mark_sold(second.id).await.unwrap();

        let ids: Vec<ItemId> = store.active_listings().await.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![third.id, first.id]);
    }

    #[tokio::test]
    async fn mark_sold_happens_once() {
        let tmp = tempdir().unwrap();
        let store = ListingStore::open(tmp.path().join("listings.json")).await.unwrap();
        let listing = store.add_listing(item("bowl", 25.0), None).await.unwrap();

        let SoldTransition::Sold { sold_at } = store.mark_sold(listing.id).await.unwrap() else {
            panic!("first mark_sold should transition");
        };
        assert_eq!(
            store.mark_sold(listing.id).await.unwrap(),
            SoldTransition::Unchanged {
                status: ListingStatus::Sold
            }
        );
        let stored = store.listing(listing.id).await.unwrap();
        assert_eq!(stored.sold_at, Some(sold_at));
        assert_eq!(stored.status, ListingStatus::Sold);

        assert_eq!(store.mark_sold(ItemId::new()).await.unwrap(), SoldTransition::NotFound);
    }

    #[tokio::test]
    async fn views_increase_monotonically_and_survive_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("listings.json");
        let store = ListingStore::open(&path).await.unwrap();
        let listing = store.add_listing(item("vase", 30.0), None).await.unwrap();

        assert_eq!(store.increment_views(listing.id).await.unwrap(), Some(1));
        assert_eq!(store.increment_views(listing.id).await.unwrap(), Some(2));
        assert_eq!(store.increment_views(ItemId::new()).await.unwrap(), None);

        let reopened = ListingStore::open(&path).await.unwrap();
        assert_eq!(reopened.listing(listing.id).await.unwrap().views, 2);
    }

    #[tokio::test]
    async fn stats_sum_recommended_price_of_sold_items() {
        let tmp = tempdir().unwrap();
        let store = ListingStore::open(tmp.path().join("listings.json")).await.unwrap();
        let a = store.add_listing(item("a", 40.0), None).await.unwrap();
        let b = store.add_listing(item("b", 60.0), None).await.unwrap();
        let _c = store.add_listing(item("c", 99.0), None).await.unwrap();
        store.mark_sold(a.id).await.unwrap();
        store.mark_sold(b.id).await.unwrap();
        store.increment_views(a.id).await.unwrap();
        assert!(store.set_featured(b.id, true).await.unwrap());

        let stats = store.stats().await;
        assert_eq!(stats.total, 3);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.sold, 2);
        assert_eq!(stats.total_views, 1);
        assert_eq!(stats.total_revenue, 100.0);
    }

    #[tokio::test]
    async fn marketplace_refs_archive_and_removal() {
        let tmp = tempdir().unwrap();
        let store = ListingStore::open(tmp.path().join("listings.json")).await.unwrap();
        let listing = store.add_listing(item("clock", 50.0), None).await.unwrap();

        let mref = MarketplaceRef {
            item_id: "110012345".into(),
            url: "https://www.ebay.com/itm/110012345".into(),
        };
        assert!(store.attach_marketplace_ref(listing.id, mref.clone()).await.unwrap());
        assert_eq!(store.find_by_marketplace_id("110012345").await.unwrap().id, listing.id);

        assert!(store.archive_listing(listing.id).await.unwrap());
        assert!(store.active_listings().await.is_empty());

        let removed = store.remove_listing(listing.id).await.unwrap().unwrap();
        assert_eq!(removed.marketplace, Some(mref));
        assert!(store.listing(listing.id).await.is_none());
        assert!(!store.set_featured(listing.id, true).await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_reported_not_replaced() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("listings.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let err = ListingStore::open(&path).await.unwrap_err();
        assert!(matches!(err, RelicError::StoreIo { .. }));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"{ not json");
    }

    #[tokio::test]
    async fn failed_write_leaves_memory_unchanged() {
        let tmp = tempdir().unwrap();
        let data_dir = tmp.path().join("data");
        tokio::fs::create_dir(&data_dir).await.unwrap();
        let store = ListingStore::open(data_dir.join("listings.json")).await.unwrap();
        // Replace the snapshot directory with a regular file so every write fails.
        tokio::fs::remove_dir(&data_dir).await.unwrap();
        tokio::fs::write(&data_dir, b"").await.unwrap();

        let err = store.add_listing(item("doomed", 10.0), None).await.unwrap_err();
        assert!(matches!(err, RelicError::StoreIo { .. }));
        assert_eq!(store.stats().await.total, 0);
    }
}
