//! JSON side records kept next to the listing store: drafts for items that
//! never reached the marketplace, active-listing receipts and the shipping
//! queue.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use relic_model::{ItemId, MarketplaceRef, ShippingNotice, VintageItem};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{RelicError, Result};
use crate::fsutil::write_json_atomic;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRecord {
    pub item: VintageItem,
    pub saved_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveListingRecord {
    pub item_id: String,
    pub url: String,
    pub item: VintageItem,
    pub listed_at: DateTime<Utc>,
}

/// Locations of the side records under the data directory.
#[derive(Debug)]
pub struct SideRecords {
    drafts_dir: PathBuf,
    active_dir: PathBuf,
    shipping_file: PathBuf,
    // Serialises read-modify-write of the shipping queue.
    shipping_lock: Mutex<()>,
}

impl SideRecords {
    pub fn new(drafts_dir: impl Into<PathBuf>, active_dir: impl Into<PathBuf>, shipping_file: impl Into<PathBuf>) -> Self {
        Self {
            drafts_dir: drafts_dir.into(),
            active_dir: active_dir.into(),
            shipping_file: shipping_file.into(),
            shipping_lock: Mutex::new(()),
        }
    }

    pub fn drafts_dir(&self) -> &Path {
        &self.drafts_dir
    }

    pub fn shipping_file(&self) -> &Path {
        &self.shipping_file
    }

    pub async fn save_draft(&self, item: &VintageItem, reason: Option<&str>) -> Result<PathBuf> {
        let path = self.drafts_dir.join(format!("{}.json", item.id));
        let record = DraftRecord {
            item: item.clone(),
            saved_at: Utc::now(),
            reason: reason.map(str::to_string),
        };
        write_json_atomic(&path, &record).await?;
        info!(target: "relic::lifecycle", item_id = %item.id, path = %path.display(), "draft saved");
        Ok(path)
    }

    /// Delete the draft for `id`, if one exists. Returns whether a file was
    /// removed.
    pub async fn remove_draft(&self, id: ItemId) -> Result<bool> {
        let path = self.drafts_dir.join(format!("{id}.json"));
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(target: "relic::lifecycle", item_id = %id, "draft removed");
                Ok(true)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(RelicError::store_io(&path, format!("failed to remove draft: {err}"))),
        }
    }

    pub async fn save_active_listing(&self, marketplace: &MarketplaceRef, item: &VintageItem) -> Result<PathBuf> {
        let file_name = sanitize_file_stem(&marketplace.item_id);
        let path = self.active_dir.join(format!("{file_name}.json"));
        let record = ActiveListingRecord {
            item_id: marketplace.item_id.clone(),
            url: marketplace.url.clone(),
            item: item.clone(),
            listed_at: Utc::now(),
        };
        write_json_atomic(&path, &record).await?;
        Ok(path)
    }

    /// Append the notices not already queued (see
    /// [`ShippingNotice::same_sale`]) and return them. The queue file is only
    /// rewritten when something new was added.
    pub async fn append_shipping_notices(&self, notices: &[ShippingNotice]) -> Result<Vec<ShippingNotice>> {
        if notices.is_empty() {
            return Ok(Vec::new());
        }
        let _guard = self.shipping_lock.lock().await;
        let mut queue = self.shipping_queue_unlocked().await?;
        let mut added = Vec::new();
        for notice in notices {
            if queue.iter().any(|queued| queued.same_sale(notice)) {
                debug!(
                    target: "relic::lifecycle",
                    marketplace_id = %notice.marketplace_item_id,
                    "sale already queued for shipping"
                );
                continue;
            }
            queue.push(notice.clone());
            added.push(notice.clone());
        }
        if !added.is_empty() {
            write_json_atomic(&self.shipping_file, &queue).await?;
        }
        Ok(added)
    }

    pub async fn shipping_queue(&self) -> Result<Vec<ShippingNotice>> {
        let _guard = self.shipping_lock.lock().await;
        self.shipping_queue_unlocked().await
    }

    async fn shipping_queue_unlocked(&self) -> Result<Vec<ShippingNotice>> {
        match tokio::fs::read(&self.shipping_file).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|err| {
                RelicError::store_io(&self.shipping_file, format!("corrupt shipping queue: {err}"))
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(RelicError::store_io(
                &self.shipping_file,
                format!("failed to read shipping queue: {err}"),
            )),
        }
    }
}

fn sanitize_file_stem(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect();
    if cleaned.is_empty() { "unknown".to_string() } else { cleaned }
}

#[cfg(test)]
mod tests {
    use relic_model::SoldItem;

    use super::*;
    use crate::testing::sample_item;

    fn records(root: &Path) -> SideRecords {
        SideRecords::new(root.join("drafts"), root.join("active-listings"), root.join("TO-SHIP.json"))
    }

    fn sale(id: &str, order_id: Option<&str>) -> SoldItem {
        SoldItem {
            marketplace_item_id: id.into(),
            title: "Lamp".into(),
            sold_price: 50.0,
            sold_date: Utc::now(),
            order_id: order_id.map(str::to_string),
            buyer_address: None,
        }
    }

    #[tokio::test]
    async fn draft_is_written_under_item_id() {
        let tmp = tempfile::tempdir().unwrap();
        let records = records(tmp.path());
        let item = sample_item("Lamp", 40.0);

        let path = records.save_draft(&item, Some("relay failed")).await.unwrap();
        assert_eq!(path, tmp.path().join("drafts").join(format!("{}.json", item.id)));

        let stored: DraftRecord = serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        assert_eq!(stored.item.id, item.id);
        assert_eq!(stored.reason.as_deref(), Some("relay failed"));
    }

    #[tokio::test]
    async fn removing_a_draft_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let records = records(tmp.path());
        let item = sample_item("Lamp", 40.0);
        let path = records.save_draft(&item, None).await.unwrap();

        assert!(records.remove_draft(item.id).await.unwrap());
        assert!(!path.exists());
        assert!(!records.remove_draft(item.id).await.unwrap());
    }

    #[tokio::test]
    async fn active_listing_record_is_named_by_marketplace_id() {
        let tmp = tempfile::tempdir().unwrap();
        let records = records(tmp.path());
        let reference = MarketplaceRef {
            item_id: "1105/51".into(),
            url: "https://www.ebay.com/itm/110551".into(),
        };
        let path = records
            .save_active_listing(&reference, &sample_item("Lamp", 40.0))
            .await
            .unwrap();
        assert_eq!(path.file_name().unwrap(), "1105_51.json");
    }

    #[tokio::test]
    async fn shipping_notices_accumulate_once_per_sale() {
        let tmp = tempfile::tempdir().unwrap();
        let records = records(tmp.path());

        assert!(records.append_shipping_notices(&[]).await.unwrap().is_empty());
        records
            .append_shipping_notices(&[ShippingNotice::for_sale(&sale("1", None), None)])
            .await
            .unwrap();
        let added = records
            .append_shipping_notices(&[
                ShippingNotice::for_sale(&sale("1", None), None),
                ShippingNotice::for_sale(&sale("2", None), None),
            ])
            .await
            .unwrap();

        assert_eq!(added.len(), 1);
        assert_eq!(added[0].marketplace_item_id, "2");
        let queue = records.shipping_queue().await.unwrap();
        let ids: Vec<_> = queue.iter().map(|n| n.marketplace_item_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn separate_orders_for_one_item_are_both_queued() {
        let tmp = tempfile::tempdir().unwrap();
        let records = records(tmp.path());

        let added = records
            .append_shipping_notices(&[
                ShippingNotice::for_sale(&sale("7", Some("7-1")), None),
                ShippingNotice::for_sale(&sale("7", Some("7-2")), None),
            ])
            .await
            .unwrap();
        assert_eq!(added.len(), 2);

        let repeat = records
            .append_shipping_notices(&[ShippingNotice::for_sale(&sale("7", Some("7-2")), None)])
            .await
            .unwrap();
        assert!(repeat.is_empty());
        assert_eq!(records.shipping_queue().await.unwrap().len(), 2);
    }
}
