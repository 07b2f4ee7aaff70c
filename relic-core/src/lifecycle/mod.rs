//! Folder-driven intake lifecycle.
//!
//! Each batch moves through `Detected → Analyzing → Persisted →
//! (Relayed | DraftSaved) → Archived`. [`AutoLister`] owns the folder
//! watcher subscription and the optional sale poll; both are cancelled by
//! [`AutoLister::stop`].

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use relic_model::{ImageBatch, ItemId};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub mod archive;
pub mod manage;
pub mod pipeline;
pub mod records;
pub mod sales;

pub use archive::{ArchiveReport, archive_files};
pub use manage::{DEFAULT_END_REASON, ListingManager};
pub use pipeline::{IntakeOutcome, IntakePipeline, RelayStatus};
pub use records::{ActiveListingRecord, DraftRecord, SideRecords};
pub use sales::{DEFAULT_SALE_POLL_INTERVAL, SalePoller};

use crate::analysis::AnalysisOptions;
use crate::error::{RelicError, Result};
use crate::watch::FolderWatcher;

/// Knobs for the automated lifecycle.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub archive_dir: PathBuf,
    pub analysis: AnalysisOptions,
    /// Relay each batch to the marketplace when credentials exist.
    pub auto_relay: bool,
    /// Run the sold-item poll when credentials exist.
    pub notify_on_sale: bool,
    pub sale_poll_interval: Duration,
}

impl LifecycleConfig {
    pub fn new(archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive_dir: archive_dir.into(),
            analysis: AnalysisOptions::default(),
            auto_relay: false,
            notify_on_sale: true,
            sale_poll_interval: DEFAULT_SALE_POLL_INTERVAL,
        }
    }
}

/// Summary of one processed batch.
#[derive(Debug)]
pub struct BatchReport {
    pub listing_id: ItemId,
    pub relay: RelayStatus,
    pub archive: ArchiveReport,
}

/// Explicit start/stop controller tying the watcher, the intake pipeline
/// and the sale poll together.
pub struct AutoLister {
    watcher: Arc<FolderWatcher>,
    pipeline: Arc<IntakePipeline>,
    config: LifecycleConfig,
    running: Mutex<Option<Running>>,
}

struct Running {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl fmt::Debug for AutoLister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoLister")
            .field("folder", &self.watcher.folder())
            .field("config", &self.config)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

impl AutoLister {
    pub fn new(watcher: Arc<FolderWatcher>, pipeline: Arc<IntakePipeline>, config: LifecycleConfig) -> Self {
        Self {
            watcher,
            pipeline,
            config,
            running: Mutex::new(None),
        }
    }

    pub fn pipeline(&self) -> &Arc<IntakePipeline> {
        &self.pipeline
    }

    pub fn watcher(&self) -> &Arc<FolderWatcher> {
        &self.watcher
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Subscribe to the watcher, start it, and start the sale poll when
    /// enabled. Calling `start` twice is a no-op.
    pub async fn start(&self) {
        let mut guard = self.running.lock().await;
        if guard.is_some() {
            return;
        }

        let cancel = CancellationToken::new();
        // Attach before starting so the first batch cannot be missed.
        let batches = self.watcher.batches();
        let mut tasks = vec![self.spawn_intake(batches, cancel.clone())];
        self.watcher.start().await;

        match (self.config.notify_on_sale, self.pipeline.relay()) {
            (true, Some(relay)) => {
                let poller = SalePoller::new(
                    Arc::clone(relay),
                    Arc::clone(self.pipeline.store()),
                    Arc::clone(self.pipeline.records()),
                    self.config.sale_poll_interval,
                );
                tasks.push(poller.spawn(cancel.clone()));
                info!(
                    target: "relic::lifecycle",
                    interval_secs = self.config.sale_poll_interval.as_secs(),
                    "sale polling enabled"
                );
            }
            (true, None) => {
                info!(target: "relic::lifecycle", "sale polling disabled: marketplace not configured")
            }
            (false, _) => {}
        }

        info!(
            target: "relic::lifecycle",
            folder = %self.watcher.folder().display(),
            auto_relay = self.config.auto_relay,
            "auto-lister started"
        );
        *guard = Some(Running { cancel, tasks });
    }

    /// Stop the watcher, the intake loop and the sale poll. In-flight work is
    /// abandoned rather than awaited. Idempotent.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };
        running.cancel.cancel();
        for task in running.tasks {
            task.abort();
        }
        self.watcher.stop().await;
        info!(target: "relic::lifecycle", "auto-lister stopped");
    }

    /// Batches arrive on an unbounded queue, so a slow analysis delays
    /// later batches but never drops them.
    fn spawn_intake(&self, mut batches: mpsc::UnboundedReceiver<ImageBatch>, cancel: CancellationToken) -> JoinHandle<()> {
        let pipeline = Arc::clone(&self.pipeline);
        let config = self.config.clone();
        tokio::spawn(async move {
            loop {
                let batch = tokio::select! {
                    _ = cancel.cancelled() => break,
                    batch = batches.recv() => batch,
                };
                let Some(batch) = batch else {
                    break;
                };
                // Failures are already logged; the loop keeps going.
                let _ = process_batch(&pipeline, &config, &batch).await;
                if !batches.is_empty() {
                    debug!(target: "relic::lifecycle", queued = batches.len(), "batches waiting");
                }
            }
        })
    }

    /// Run one batch through the lifecycle outside the watcher.
    pub async fn process_batch(&self, batch: &ImageBatch) -> Result<BatchReport> {
        process_batch(&self.pipeline, &self.config, batch).await
    }
}

async fn process_batch(pipeline: &IntakePipeline, config: &LifecycleConfig, batch: &ImageBatch) -> Result<BatchReport> {
    info!(target: "relic::lifecycle", photos = batch.len(), "batch detected");
    if batch.is_empty() {
        return Err(RelicError::Internal("empty batch".to_string()));
    }

    let image_refs = batch
        .paths
        .iter()
        .map(|path| path.display().to_string())
        .collect();
    let outcome = match pipeline
        .process(&batch.paths, image_refs, &config.analysis, config.auto_relay)
        .await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            // Store failures already raised an alert in the store itself.
            error!(
                target: "relic::lifecycle",
                kind = err.kind(),
                error = %err,
                "batch aborted; photos left in place"
            );
            return Err(err);
        }
    };

    let archive = archive_files(&batch.paths, &config.archive_dir).await;
    info!(
        target: "relic::lifecycle",
        listing_id = %outcome.listing.id,
        relayed = outcome.relay.is_relayed(),
        archived = archive.moved.len(),
        archive_failures = archive.failed.len(),
        "batch complete"
    );

    Ok(BatchReport {
        listing_id: outcome.listing.id,
        relay: outcome.relay,
        archive,
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use async_trait::async_trait;

    use super::*;
    use crate::analysis::testing::{ANALYSIS_JSON, ScriptedService};
    use crate::analysis::{AnalysisOrchestrator, ModelTier, ReasoningReply, ReasoningRequest, ReasoningService};
    use crate::relay::{MarketplaceRelay, MockMarketplaceApi, RelaySettings};
    use crate::store::ListingStore;
    use crate::watch::{FolderWatchConfig, WatchEvent};

    /// Answers like the wrapped service, but only after `delay`.
    struct SlowService {
        inner: ScriptedService,
        delay: Duration,
    }

    #[async_trait]
    impl ReasoningService for SlowService {
        async fn complete(&self, request: ReasoningRequest) -> Result<ReasoningReply> {
            tokio::time::sleep(self.delay).await;
            self.inner.complete(request).await
        }

        fn model_name(&self, tier: ModelTier) -> &str {
            self.inner.model_name(tier)
        }
    }

    async fn lister(
        root: &Path,
        service: ScriptedService,
        relay: Option<MockMarketplaceApi>,
        config: LifecycleConfig,
    ) -> AutoLister {
        lister_watching(root, service, relay, config, FolderWatchConfig::default()).await
    }

    async fn lister_watching(
        root: &Path,
        service: impl ReasoningService + 'static,
        relay: Option<MockMarketplaceApi>,
        config: LifecycleConfig,
        watch: FolderWatchConfig,
    ) -> AutoLister {
        let inbox = root.join("inbox");
        tokio::fs::create_dir_all(&inbox).await.unwrap();
        let store = ListingStore::open(root.join("data").join("listings.json")).await.unwrap();
        let pipeline = IntakePipeline::new(
            Arc::new(AnalysisOrchestrator::new(Arc::new(service))),
            Arc::new(store),
            relay.map(|api| Arc::new(MarketplaceRelay::new(Arc::new(api), RelaySettings::default()))),
            Arc::new(SideRecords::new(
                root.join("drafts"),
                root.join("active-listings"),
                root.join("TO-SHIP.json"),
            )),
        );
        AutoLister::new(
            Arc::new(FolderWatcher::new(inbox, watch)),
            Arc::new(pipeline),
            config,
        )
    }

    async fn batch(root: &Path, names: &[&str]) -> ImageBatch {
        let mut paths = Vec::new();
        for name in names {
            let path = root.join(name);
            tokio::fs::write(&path, b"jpeg").await.unwrap();
            paths.push(path);
        }
        ImageBatch::new(paths)
    }

    #[tokio::test]
    async fn successful_batch_is_persisted_drafted_and_archived() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        let lister = lister(
            root,
            ScriptedService::new().reply(ANALYSIS_JSON),
            None,
            LifecycleConfig::new(root.join("processed-photos")),
        )
        .await;
        let batch = batch(root, &["a.jpg", "b.jpg"]).await;

        let report = lister.process_batch(&batch).await.unwrap();

        let listing = lister.pipeline().store().listing(report.listing_id).await.unwrap();
        assert_eq!(listing.item.images.len(), 2);
        assert_eq!(listing.views, 0);
        assert!(matches!(report.relay, RelayStatus::Draft { draft: Some(_), .. }));
        assert!(report.archive.is_complete());
        assert!(root.join("processed-photos").join("a.jpg").exists());
        assert!(!root.join("a.jpg").exists());
    }

    #[tokio::test]
    async fn analysis_failure_leaves_photos_in_place() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        let lister = lister(
            root,
            ScriptedService::new().fail("overloaded"),
            None,
            LifecycleConfig::new(root.join("processed-photos")),
        )
        .await;
        let batch = batch(root, &["a.jpg"]).await;

        let err = lister.process_batch(&batch).await.unwrap_err();

        assert!(matches!(err, RelicError::Service { .. }));
        assert!(root.join("a.jpg").exists());
        assert!(!root.join("processed-photos").exists());
        assert_eq!(lister.pipeline().store().stats().await.total, 0);
    }

    #[tokio::test]
    async fn store_failure_leaves_photos_unarchived() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        let lister = lister(
            root,
            ScriptedService::new().reply(ANALYSIS_JSON),
            None,
            LifecycleConfig::new(root.join("processed-photos")),
        )
        .await;
        // A regular file where the store directory should be makes every write fail.
        tokio::fs::write(root.join("data"), b"").await.unwrap();
        let batch = batch(root, &["a.jpg", "b.jpg"]).await;

        let err = lister.process_batch(&batch).await.unwrap_err();

        assert!(matches!(err, RelicError::StoreIo { .. }));
        assert!(root.join("a.jpg").exists());
        assert!(root.join("b.jpg").exists());
        assert!(!root.join("processed-photos").exists());
        assert!(!root.join("drafts").exists());
    }

    #[tokio::test]
    async fn slow_intake_still_processes_every_batch() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        let service = SlowService {
            inner: ScriptedService::new()
                .reply(ANALYSIS_JSON)
                .reply(ANALYSIS_JSON)
                .reply(ANALYSIS_JSON),
            delay: Duration::from_millis(600),
        };
        let watch = FolderWatchConfig {
            debounce_window: Duration::from_millis(150),
            stability_window: Duration::from_millis(50),
            stability_poll: Duration::from_millis(10),
            event_capacity: 1,
            ..FolderWatchConfig::default()
        };
        let archive = root.join("processed-photos");
        let lister = lister_watching(root, service, None, LifecycleConfig::new(&archive), watch).await;
        let mut events = lister.watcher().subscribe();

        lister.start().await;
        match tokio::time::timeout(Duration::from_secs(5), events.recv()).await {
            Ok(Ok(WatchEvent::Started { .. })) => {}
            other => panic!("expected Started, got {other:?}"),
        }
        let inbox = root.join("inbox");
        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            tokio::fs::write(inbox.join(name), b"jpeg").await.unwrap();
            tokio::time::sleep(Duration::from_millis(400)).await;
        }

        let deadline = tokio::time::Instant::now() + Duration::from_secs(20);
        while !["a.jpg", "b.jpg", "c.jpg"].iter().all(|name| archive.join(name).exists()) {
            assert!(tokio::time::Instant::now() < deadline, "not every photo was processed");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        lister.stop().await;

        assert!(lister.pipeline().store().stats().await.total >= 1);
        assert!(!inbox.join("a.jpg").exists());
    }

    #[tokio::test]
    async fn auto_relay_uses_marketplace_and_still_archives() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        let mut api = MockMarketplaceApi::new();
        api.expect_upload_picture().returning(|_| Ok("https://img/1".into()));
        api.expect_create_listing()
            .returning(|_| Err(RelicError::Relay("service down".into())));
        let mut config = LifecycleConfig::new(root.join("processed-photos"));
        config.auto_relay = true;
        let lister = lister(root, ScriptedService::new().reply(ANALYSIS_JSON), Some(api), config).await;
        let batch = batch(root, &["a.jpg"]).await;

        let report = lister.process_batch(&batch).await.unwrap();

        assert!(matches!(report.relay, RelayStatus::Draft { reason: Some(_), .. }));
        assert!(root.join("processed-photos").join("a.jpg").exists());
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = LifecycleConfig::new(tmp.path().join("processed-photos"));
        config.notify_on_sale = true;
        let api = MockMarketplaceApi::new();
        let lister = lister(tmp.path(), ScriptedService::new(), Some(api), config).await;

        lister.start().await;
        lister.start().await;
        assert!(lister.is_running().await);
        assert!(lister.watcher().is_running().await);

        lister.stop().await;
        lister.stop().await;
        assert!(!lister.is_running().await);
        assert!(!lister.watcher().is_running().await);
    }
}
