//! Publishing appraised items to an external marketplace.
//!
//! [`MarketplaceRelay`] uploads photos, assembles the listing payload and
//! creates the listing through a [`MarketplaceApi`]. Nothing is retried; the
//! caller decides how to recover (the lifecycle saves a local draft).

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use relic_model::{MarketplaceRef, SoldItem, VintageItem};
use tracing::{info, warn};

pub mod api;
pub mod ebay;
pub mod payload;

#[cfg(test)]
pub use api::MockMarketplaceApi;
pub use api::{ItemStatus, MarketplaceApi, SubmittedListing};
pub use ebay::{EbayCredentials, EbayTradingClient};
pub use payload::{ListingPayload, MAX_PICTURES, MAX_TITLE_CHARS, RelaySettings};

use crate::error::{RelicError, Result};

/// Result of a successful relay.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayOutcome {
    pub marketplace: MarketplaceRef,
    pub insertion_fee: f64,
    pub total_fees: f64,
    pub pictures_uploaded: usize,
    pub pictures_skipped: usize,
}

#[derive(Clone)]
pub struct MarketplaceRelay {
    api: Arc<dyn MarketplaceApi>,
    settings: RelaySettings,
}

impl fmt::Debug for MarketplaceRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarketplaceRelay")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl MarketplaceRelay {
    pub fn new(api: Arc<dyn MarketplaceApi>, settings: RelaySettings) -> Self {
        Self { api, settings }
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Upload up to `max_pictures` photos and create the listing. A photo
    /// that fails to upload is logged and left out; creation still proceeds
    /// with whatever was uploaded, even nothing.
    pub async fn relay(&self, item: &VintageItem, photos: &[PathBuf]) -> Result<RelayOutcome> {
        let (picture_urls, skipped) = self.upload_pictures(photos).await;

        let payload = ListingPayload::from_analysis(&item.analysis, picture_urls, &self.settings);
        let pictures_uploaded = payload.picture_urls.len();
        let submitted = self
            .api
            .create_listing(&payload)
            .await
            .map_err(into_relay_error)?;

        info!(
            target: "relic::relay",
            item_id = %item.id,
            marketplace_id = %submitted.item_id,
            pictures = pictures_uploaded,
            total_fees = submitted.total_fees,
            "listing created"
        );

        Ok(RelayOutcome {
            marketplace: MarketplaceRef {
                item_id: submitted.item_id,
                url: submitted.url,
            },
            insertion_fee: submitted.insertion_fee,
            total_fees: submitted.total_fees,
            pictures_uploaded,
            pictures_skipped: skipped,
        })
    }

    async fn upload_pictures(&self, photos: &[PathBuf]) -> (Vec<String>, usize) {
        if photos.len() > self.settings.max_pictures {
            warn!(
                target: "relic::relay",
                photos = photos.len(),
                limit = self.settings.max_pictures,
                "too many photos; extra photos are not uploaded"
            );
        }

        let mut urls = Vec::new();
        let mut skipped = 0;
        for photo in photos.iter().take(self.settings.max_pictures) {
            match self.api.upload_picture(photo).await {
                Ok(url) => urls.push(url),
                Err(err) => {
                    skipped += 1;
                    warn!(
                        target: "relic::relay",
                        photo = %photo.display(),
                        error = %err,
                        "picture upload failed; skipping"
                    );
                }
            }
        }
        (urls, skipped)
    }

    pub async fn item_status(&self, item_id: &str) -> Result<ItemStatus> {
        self.api.item_status(item_id).await.map_err(into_relay_error)
    }

    pub async fn end_item(&self, item_id: &str, reason: &str) -> Result<()> {
        self.api.end_item(item_id, reason).await.map_err(into_relay_error)?;
        info!(target: "relic::relay", marketplace_id = item_id, reason, "listing ended");
        Ok(())
    }

    pub async fn sold_items_since(&self, since: DateTime<Utc>) -> Result<Vec<SoldItem>> {
        self.api.sold_items_since(since).await.map_err(into_relay_error)
    }
}

fn into_relay_error(err: RelicError) -> RelicError {
    match err {
        RelicError::Relay(_) => err,
        other => RelicError::Relay(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use mockall::predicate::*;

    use super::*;
    use crate::testing::sample_item;

    fn submitted(id: &str) -> SubmittedListing {
        SubmittedListing {
            item_id: id.to_string(),
            url: format!("https://www.ebay.com/itm/{id}"),
            insertion_fee: 0.35,
            total_fees: 0.35,
        }
    }

    fn photos(count: usize) -> Vec<PathBuf> {
        (0..count).map(|idx| PathBuf::from(format!("/photos/{idx}.jpg"))).collect()
    }

    #[tokio::test]
    async fn uploads_at_most_twelve_pictures() {
        let mut api = MockMarketplaceApi::new();
        api.expect_upload_picture()
            .times(MAX_PICTURES)
            .returning(|path| Ok(format!("https://img/{}", path.display())));
        let seen = Arc::new(Mutex::new(0usize));
        let seen_in_mock = Arc::clone(&seen);
        api.expect_create_listing().times(1).returning(move |payload| {
            *seen_in_mock.lock().unwrap() = payload.picture_urls.len();
            Ok(submitted("100"))
        });

        let relay = MarketplaceRelay::new(Arc::new(api), RelaySettings::default());
        let outcome = relay.relay(&sample_item("Lamp", 40.0), &photos(15)).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), MAX_PICTURES);
        assert_eq!(outcome.pictures_uploaded, MAX_PICTURES);
        assert_eq!(outcome.marketplace.item_id, "100");
    }

    #[tokio::test]
    async fn failed_uploads_are_skipped() {
        let mut api = MockMarketplaceApi::new();
        api.expect_upload_picture()
            .with(eq(Path::new("/photos/1.jpg")))
            .returning(|_| Err(RelicError::Relay("upload refused".into())));
        api.expect_upload_picture().returning(|_| Ok("https://img/ok".into()));
        api.expect_create_listing().times(1).returning(|_| Ok(submitted("7")));

        let relay = MarketplaceRelay::new(Arc::new(api), RelaySettings::default());
        let outcome = relay.relay(&sample_item("Lamp", 40.0), &photos(3)).await.unwrap();

        assert_eq!(outcome.pictures_uploaded, 2);
        assert_eq!(outcome.pictures_skipped, 1);
    }

    #[tokio::test]
    async fn listing_is_created_even_without_pictures() {
        let mut api = MockMarketplaceApi::new();
        api.expect_upload_picture()
            .returning(|_| Err(RelicError::Relay("down".into())));
        api.expect_create_listing()
            .withf(|payload| payload.picture_urls.is_empty())
            .times(1)
            .returning(|_| Ok(submitted("8")));

        let relay = MarketplaceRelay::new(Arc::new(api), RelaySettings::default());
        let outcome = relay.relay(&sample_item("Lamp", 40.0), &photos(2)).await.unwrap();
        assert_eq!(outcome.pictures_uploaded, 0);
        assert_eq!(outcome.marketplace.url, "https://www.ebay.com/itm/8");
    }

    #[tokio::test]
    async fn creation_failure_surfaces_as_relay_error() {
        let mut api = MockMarketplaceApi::new();
        api.expect_upload_picture().returning(|_| Ok("https://img/ok".into()));
        api.expect_create_listing()
            .returning(|_| Err(RelicError::service("connection reset")));

        let relay = MarketplaceRelay::new(Arc::new(api), RelaySettings::default());
        let err = relay.relay(&sample_item("Lamp", 40.0), &photos(1)).await.unwrap_err();
        assert!(matches!(err, RelicError::Relay(_)));
        assert_eq!(err.user_message(), "The marketplace request failed; nothing was changed there");
    }
}
