use chrono::{DateTime, Utc};

use crate::ids::ItemId;

/// A marketplace sale reported by the sold-item poll.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SoldItem {
    pub marketplace_item_id: String,
    pub title: String,
    pub sold_price: f64,
    pub sold_date: DateTime<Utc>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub order_id: Option<String>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub buyer_address: Option<String>,
}

/// Shipping-needed record written once per sold item.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ShippingNotice {
    pub marketplace_item_id: String,
    pub title: String,
    pub price: f64,
    pub sold_at: DateTime<Utc>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub order_id: Option<String>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub buyer_address: Option<String>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub listing_id: Option<ItemId>,
    pub recorded_at: DateTime<Utc>,
}

impl ShippingNotice {
    /// Whether both notices describe the same marketplace sale. A sale is
    /// the item id plus the order line, so repeat sales of a multi-quantity
    /// listing stay distinct.
    pub fn same_sale(&self, other: &ShippingNotice) -> bool {
        self.marketplace_item_id == other.marketplace_item_id && self.order_id == other.order_id
    }

    pub fn for_sale(sale: &SoldItem, listing_id: Option<ItemId>) -> Self {
        Self {
            marketplace_item_id: sale.marketplace_item_id.clone(),
            title: sale.title.clone(),
            price: sale.sold_price,
            sold_at: sale.sold_date,
            order_id: sale.order_id.clone(),
            buyer_address: sale.buyer_address.clone(),
            listing_id,
            recorded_at: Utc::now(),
        }
    }
}
