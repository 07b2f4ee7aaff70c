use chrono::{DateTime, Utc};

use crate::ids::ItemId;
use crate::item::VintageItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ListingStatus {
    Active,
    Sold,
    Archived,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Sold => "sold",
            ListingStatus::Archived => "archived",
        }
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier and public URL of an item once it exists on the marketplace.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct MarketplaceRef {
    pub item_id: String,
    pub url: String,
}

/// Website listing wrapping one [`VintageItem`], keyed by the item id.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Listing {
    pub id: ItemId,
    pub item: VintageItem,
    pub status: ListingStatus,
    pub posted_at: DateTime<Utc>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub sold_at: Option<DateTime<Utc>>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub marketplace: Option<MarketplaceRef>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub views: u64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub featured: bool,
}

impl Listing {
    pub fn new(item: VintageItem, marketplace: Option<MarketplaceRef>) -> Self {
        Self {
            id: item.id,
            item,
            status: ListingStatus::Active,
            posted_at: Utc::now(),
            sold_at: None,
            marketplace,
            views: 0,
            featured: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ListingStatus::Active
    }
}

/// Aggregate counters over the whole store.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ListingStats {
    pub total: usize,
    pub active: usize,
    pub sold: usize,
    pub total_views: u64,
    pub total_revenue: f64,
}
