use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use relic_model::{Listing, VintageItem};
use tracing::{error, info, warn};

use super::records::SideRecords;
use crate::analysis::{AnalysisOptions, AnalysisOrchestrator};
use crate::error::Result;
use crate::relay::{MarketplaceRelay, RelayOutcome};
use crate::store::ListingStore;

/// What happened on the marketplace side of one intake.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayStatus {
    Relayed(RelayOutcome),
    /// Not relayed; a draft was written unless `draft` is `None`.
    Draft {
        draft: Option<PathBuf>,
        reason: Option<String>,
    },
}

impl RelayStatus {
    pub fn is_relayed(&self) -> bool {
        matches!(self, RelayStatus::Relayed(_))
    }
}

#[derive(Debug, Clone)]
pub struct IntakeOutcome {
    pub listing: Listing,
    pub relay: RelayStatus,
}

/// Analyse → persist → relay-or-draft for one set of photos. Shared by the
/// folder-driven lifecycle and the HTTP upload route.
pub struct IntakePipeline {
    orchestrator: Arc<AnalysisOrchestrator>,
    store: Arc<ListingStore>,
    relay: Option<Arc<MarketplaceRelay>>,
    records: Arc<SideRecords>,
}

impl fmt::Debug for IntakePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntakePipeline")
            .field("store", &self.store.path())
            .field("relay_configured", &self.relay.is_some())
            .finish_non_exhaustive()
    }
}

impl IntakePipeline {
    pub fn new(
        orchestrator: Arc<AnalysisOrchestrator>,
        store: Arc<ListingStore>,
        relay: Option<Arc<MarketplaceRelay>>,
        records: Arc<SideRecords>,
    ) -> Self {
        Self {
            orchestrator,
            store,
            relay,
            records,
        }
    }

    pub fn store(&self) -> &Arc<ListingStore> {
        &self.store
    }

    pub fn relay(&self) -> Option<&Arc<MarketplaceRelay>> {
        self.relay.as_ref()
    }

    pub fn records(&self) -> &Arc<SideRecords> {
        &self.records
    }

    /// Run one intake. Analysis and store failures are returned and leave
    /// nothing behind; a relay failure is recovered by writing a draft.
    pub async fn process(
        &self,
        photos: &[PathBuf],
        image_refs: Vec<String>,
        options: &AnalysisOptions,
        relay_requested: bool,
    ) -> Result<IntakeOutcome> {
        let analysis = self.orchestrator.analyze(photos, options).await?;
        let item = VintageItem::new(image_refs, analysis);
        info!(
            target: "relic::lifecycle",
            item_id = %item.id,
            title = %item.analysis.title,
            recommended = item.analysis.suggested_price.recommended,
            "item analyzed"
        );

        let mut listing = self.store.add_listing(item.clone(), None).await?;

        let relay_status = match (&self.relay, relay_requested) {
            (Some(relay), true) => match relay.relay(&item, photos).await {
                Ok(outcome) => {
                    link_relayed(&self.store, &self.records, &mut listing, &outcome).await;
                    RelayStatus::Relayed(outcome)
                }
                Err(err) => {
                    warn!(
                        target: "relic::lifecycle",
                        item_id = %item.id,
                        error = %err,
                        "marketplace relay failed; saving draft"
                    );
                    self.draft(&item, Some(err.to_string())).await
                }
            },
            (None, true) => {
                self.draft(&item, Some("marketplace credentials not configured".to_string()))
                    .await
            }
            (_, false) => self.draft(&item, None).await,
        };

        Ok(IntakeOutcome {
            listing,
            relay: relay_status,
        })
    }

    async fn draft(&self, item: &VintageItem, reason: Option<String>) -> RelayStatus {
        let draft = match self.records.save_draft(item, reason.as_deref()).await {
            Ok(path) => Some(path),
            Err(err) => {
                error!(
                    target: "relic::alert",
                    item_id = %item.id,
                    error = %err,
                    "failed to save draft"
                );
                None
            }
        };
        RelayStatus::Draft { draft, reason }
    }
}

/// Record a successful relay: link the marketplace reference on the stored
/// listing and write the active-listing receipt. The listing exists either
/// way, so failures here are logged and only lose the link.
pub(super) async fn link_relayed(
    store: &ListingStore,
    records: &SideRecords,
    listing: &mut Listing,
    outcome: &RelayOutcome,
) {
    match store
        .attach_marketplace_ref(listing.id, outcome.marketplace.clone())
        .await
    {
        Ok(_) => listing.marketplace = Some(outcome.marketplace.clone()),
        Err(err) => warn!(
            target: "relic::lifecycle",
            item_id = %listing.id,
            error = %err,
            "could not attach marketplace reference"
        ),
    }
    if let Err(err) = records.save_active_listing(&outcome.marketplace, &listing.item).await {
        warn!(
            target: "relic::lifecycle",
            item_id = %listing.id,
            error = %err,
            "could not write active-listing record"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::analysis::testing::{ANALYSIS_JSON, ScriptedService};
    use crate::error::RelicError;
    use crate::relay::{MockMarketplaceApi, RelaySettings, SubmittedListing};

    struct Fixture {
        _tmp: tempfile::TempDir,
        root: PathBuf,
        photos: Vec<PathBuf>,
    }

    async fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().to_path_buf();
        let photo = root.join("lamp.jpg");
        tokio::fs::write(&photo, b"jpeg").await.unwrap();
        Fixture {
            _tmp: tmp,
            root,
            photos: vec![photo],
        }
    }

    async fn pipeline(root: &Path, service: ScriptedService, relay: Option<MockMarketplaceApi>) -> IntakePipeline {
        let store = ListingStore::open(root.join("listings.json")).await.unwrap();
        IntakePipeline::new(
            Arc::new(AnalysisOrchestrator::new(Arc::new(service))),
            Arc::new(store),
            relay.map(|api| Arc::new(MarketplaceRelay::new(Arc::new(api), RelaySettings::default()))),
            Arc::new(SideRecords::new(
                root.join("drafts"),
                root.join("active-listings"),
                root.join("TO-SHIP.json"),
            )),
        )
    }

    fn refs(photos: &[PathBuf]) -> Vec<String> {
        photos.iter().map(|p| p.display().to_string()).collect()
    }

    #[tokio::test]
    async fn relay_success_links_listing_and_writes_receipt() {
        let fx = fixture().await;
        let mut api = MockMarketplaceApi::new();
        api.expect_upload_picture().returning(|_| Ok("https://img/1".into()));
        api.expect_create_listing().returning(|_| {
            Ok(SubmittedListing {
                item_id: "555".into(),
                url: "https://www.ebay.com/itm/555".into(),
                insertion_fee: 0.0,
                total_fees: 0.0,
            })
        });
        let pipeline = pipeline(&fx.root, ScriptedService::new().reply(ANALYSIS_JSON), Some(api)).await;

        let outcome = pipeline
            .process(&fx.photos, refs(&fx.photos), &AnalysisOptions::default(), true)
            .await
            .unwrap();

        assert!(outcome.relay.is_relayed());
        let stored = pipeline.store().listing(outcome.listing.id).await.unwrap();
        assert_eq!(stored.marketplace.unwrap().item_id, "555");
        assert!(fx.root.join("active-listings").join("555.json").exists());
        assert!(!fx.root.join("drafts").exists());
    }

    #[tokio::test]
    async fn relay_failure_keeps_listing_and_saves_draft() {
        let fx = fixture().await;
        let mut api = MockMarketplaceApi::new();
        api.expect_upload_picture().returning(|_| Ok("https://img/1".into()));
        api.expect_create_listing()
            .returning(|_| Err(RelicError::Relay("Title too long".into())));
        let pipeline = pipeline(&fx.root, ScriptedService::new().reply(ANALYSIS_JSON), Some(api)).await;

        let outcome = pipeline
            .process(&fx.photos, refs(&fx.photos), &AnalysisOptions::default(), true)
            .await
            .unwrap();

        let RelayStatus::Draft { draft, reason } = &outcome.relay else {
            panic!("expected a draft, got {:?}", outcome.relay);
        };
        assert!(draft.as_ref().unwrap().exists());
        assert!(reason.as_deref().unwrap().contains("Title too long"));
        let stored = pipeline.store().listing(outcome.listing.id).await.unwrap();
        assert!(stored.is_active());
        assert!(stored.marketplace.is_none());
    }

    #[tokio::test]
    async fn relay_not_requested_writes_draft_without_calling_marketplace() {
        let fx = fixture().await;
        let api = MockMarketplaceApi::new();
        let pipeline = pipeline(&fx.root, ScriptedService::new().reply(ANALYSIS_JSON), Some(api)).await;

        let outcome = pipeline
            .process(&fx.photos, refs(&fx.photos), &AnalysisOptions::default(), false)
            .await
            .unwrap();

        assert!(matches!(outcome.relay, RelayStatus::Draft { draft: Some(_), reason: None }));
        assert_eq!(pipeline.store().stats().await.total, 1);
    }

    #[tokio::test]
    async fn relay_requested_without_credentials_saves_draft() {
        let fx = fixture().await;
        let pipeline = pipeline(&fx.root, ScriptedService::new().reply(ANALYSIS_JSON), None).await;

        let outcome = pipeline
            .process(&fx.photos, refs(&fx.photos), &AnalysisOptions::default(), true)
            .await
            .unwrap();

        let RelayStatus::Draft { draft, reason } = &outcome.relay else {
            panic!("expected a draft, got {:?}", outcome.relay);
        };
        let draft = draft.as_ref().unwrap();
        assert_eq!(draft, &fx.root.join("drafts").join(format!("{}.json", outcome.listing.id)));
        assert!(draft.exists());
        assert_eq!(reason.as_deref(), Some("marketplace credentials not configured"));
        assert!(pipeline.store().listing(outcome.listing.id).await.unwrap().is_active());
    }

    #[tokio::test]
    async fn unparseable_analysis_creates_nothing() {
        let fx = fixture().await;
        let pipeline = pipeline(&fx.root, ScriptedService::new().reply("I cannot help with that."), None).await;

        let err = pipeline
            .process(&fx.photos, refs(&fx.photos), &AnalysisOptions::default(), true)
            .await
            .unwrap_err();

        assert!(matches!(err, RelicError::Parse(_)));
        assert_eq!(pipeline.store().stats().await.total, 0);
        assert!(!fx.root.join("drafts").exists());
    }
}
