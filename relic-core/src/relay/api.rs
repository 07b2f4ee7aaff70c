use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relic_model::SoldItem;

use super::payload::ListingPayload;
use crate::error::Result;

/// A listing the marketplace accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedListing {
    pub item_id: String,
    pub url: String,
    pub insertion_fee: f64,
    pub total_fees: f64,
}

/// Current marketplace-side state of one listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemStatus {
    pub item_id: String,
    pub title: Option<String>,
    /// Provider status string, e.g. `Active` or `Completed`.
    pub listing_status: String,
    pub quantity_sold: u32,
    pub current_price: Option<f64>,
}

/// Port to an external marketplace. Implementations make exactly one remote
/// call per method and never retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketplaceApi: Send + Sync {
    /// Upload one photo, returning the hosted URL.
    async fn upload_picture(&self, path: &Path) -> Result<String>;

    async fn create_listing(&self, payload: &ListingPayload) -> Result<SubmittedListing>;

    async fn item_status(&self, item_id: &str) -> Result<ItemStatus>;

    async fn end_item(&self, item_id: &str, reason: &str) -> Result<()>;

    /// Sales recorded after `since`.
    async fn sold_items_since(&self, since: DateTime<Utc>) -> Result<Vec<SoldItem>>;
}
